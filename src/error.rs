use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while planning or aggregating a pipeline run.
///
/// None of these abort the overall run: a configuration error skips the
/// affected workload, an execution failure skips the rest of that workload's
/// commands, and a parse error zeroes a single stat file's contribution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A workload could not be planned (missing directory, unresolvable path)
    #[error("configuration error for workload '{workload}': {reason}")]
    Configuration { workload: String, reason: String },

    /// An external command exited nonzero or timed out
    #[error("command failed in {}: {command} ({reason})", workdir.display())]
    Execution {
        command: String,
        workdir: PathBuf,
        reason: String,
    },

    /// A stat file could not be parsed
    #[error("failed to parse stat file {}: {reason}", file.display())]
    Parse { file: PathBuf, reason: String },
}

impl PipelineError {
    pub fn configuration(workload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            workload: workload.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
