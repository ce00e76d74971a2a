use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Experiment, Layout, OverrideRegistry};
use crate::error::PipelineError;
use crate::paths;
use crate::pipeline::build::build_artifact;
use crate::pipeline::planner::{ExecutionPlan, ExecutionPlanner};
use crate::pipeline::process::{run_shell, RunOutcome};

/// Per-command timeout for workload builds and benchmark binaries
const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Run a plan's commands in order, stopping at the first failure.
///
/// Returns whether every command completed. Failures are logged with enough
/// context (command, working directory) to reproduce manually.
pub fn execute_plan(plan: &ExecutionPlan, timeout: Option<Duration>) -> Result<bool> {
    for cmd in &plan.commands {
        info!("Running: {cmd} (cwd={})", plan.workdir.display());
        let outcome = run_shell(cmd, &plan.workdir, &plan.env, timeout)?;
        match outcome {
            RunOutcome::Completed => {}
            RunOutcome::Failed(_) | RunOutcome::TimedOut => {
                warn!(
                    "{}",
                    PipelineError::Execution {
                        command: cmd.clone(),
                        workdir: plan.workdir.clone(),
                        reason: outcome.to_string(),
                    }
                );
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Orchestrates a full measurement run: per experiment, rebuild the
/// artifact, run every workload, and namespace the raw stat files.
///
/// Experiments run one at a time, workloads within an experiment one at a
/// time, commands within a workload one at a time; only the workload whose
/// command failed is cut short.
pub struct ExperimentRunner {
    layout: Layout,
    overrides: OverrideRegistry,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ExperimentRunner {
    pub fn new(layout: Layout, overrides: OverrideRegistry, output_dir: PathBuf) -> Result<Self> {
        layout.validate()?;
        paths::ensure_directory(&output_dir)?;
        let output_dir = output_dir.canonicalize()?;
        info!("Results will be stored in: {}", output_dir.display());

        Ok(Self {
            layout,
            overrides,
            output_dir,
            timeout: Some(COMMAND_TIMEOUT),
        })
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    /// Override the per-command timeout (`None` disables it).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the given experiments, in order, over the given workloads.
    pub fn run(&self, experiments: &[&Experiment], workloads: &[String]) -> Result<()> {
        info!(
            "Experiments: {:?}",
            experiments.iter().map(|e| e.id).collect::<Vec<_>>()
        );
        info!("Workloads: {}", workloads.len());

        for experiment in experiments {
            info!("=== Starting experiment: {} ===", experiment.id);

            // Without a freshly built artifact no workload run can produce
            // meaningful telemetry for this experiment.
            if let Err(e) = build_artifact(&self.layout, experiment) {
                error!("Aborting experiment '{}': {e:#}", experiment.id);
                continue;
            }

            let bar = ProgressBar::new(workloads.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=> "),
            );

            for workload in workloads {
                bar.set_message(workload.clone());
                self.run_workload(workload, experiment)?;
                bar.inc(1);
            }
            bar.finish_with_message(format!("{} done", experiment.id));
        }

        Ok(())
    }

    /// Run one workload for one experiment. Planning and execution failures
    /// are logged and skipped; they never abort other workloads.
    fn run_workload(&self, workload: &str, experiment: &Experiment) -> Result<()> {
        info!("Processing workload: {workload} [{}]", experiment.id);

        let planner = ExecutionPlanner::new(&self.layout, &self.overrides, &self.output_dir);
        let plan = match planner.plan(workload, experiment) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                info!("Skipping {workload} as per override");
                return Ok(());
            }
            Err(e) => {
                warn!("{e}");
                return Ok(());
            }
        };

        if execute_plan(&plan, self.timeout)? {
            info!("Success: {}", plan.workload);
            self.relocate_output(&plan.workload, experiment)?;
        }
        Ok(())
    }

    /// Rename the experiment's raw stat file so workloads sharing one
    /// output directory do not overwrite each other.
    fn relocate_output(&self, workload: &str, experiment: &Experiment) -> Result<()> {
        let expected = self.output_dir.join(experiment.output_file);
        if !expected.exists() {
            // Some workloads legitimately write no telemetry, e.g. a binary
            // that runs without touching instrumented code.
            warn!(
                "Expected output file not found: {}",
                expected.display()
            );
            return Ok(());
        }

        let dest = self
            .output_dir
            .join(format!("{workload}_{}", experiment.output_file));
        match std::fs::rename(&expected, &dest) {
            Ok(()) => info!("Saved results to: {}", dest.display()),
            // Only this workload's telemetry is lost; the run goes on.
            Err(e) => error!(
                "Failed to relocate {} to {}: {e}",
                expected.display(),
                dest.display()
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(root: &std::path::Path) -> ExperimentRunner {
        std::fs::create_dir_all(root.join("benchmarks")).unwrap();
        std::fs::create_dir_all(root.join("perf")).unwrap();
        let layout = Layout::new(root);
        let registry = OverrideRegistry { workloads: vec![] };
        ExperimentRunner::new(layout, registry, root.join("out")).unwrap()
    }

    #[test]
    fn test_relocation_failure_is_not_fatal() {
        let tempdir = tempfile::tempdir().unwrap();
        let runner = runner(tempdir.path());
        let experiment = Experiment::find("cpu-cycle").unwrap();

        std::fs::write(runner.output_dir().join("cpu_cycle.stat"), b"x").unwrap();
        // A non-empty directory squatting on the destination makes the
        // rename fail regardless of process privileges.
        let dest = runner.output_dir().join("demo_cpu_cycle.stat");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("occupied"), b"").unwrap();

        runner.relocate_output("demo", experiment).unwrap();
        // The raw file stays behind rather than aborting the run
        assert!(runner.output_dir().join("cpu_cycle.stat").exists());
    }

    #[test]
    fn test_missing_stat_file_is_not_fatal() {
        let tempdir = tempfile::tempdir().unwrap();
        let runner = runner(tempdir.path());
        let experiment = Experiment::find("cpu-cycle").unwrap();

        runner.relocate_output("demo", experiment).unwrap();
    }
}
