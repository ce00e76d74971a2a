use anyhow::{Context, Result};
use log::debug;
use std::path::{Component, Path, PathBuf};

/// Expand environment variables and `~` in a path string
pub fn expand_path_str(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| path.into())
        .into_owned()
}

/// Create a directory and all parent directories if they don't exist
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {path:?}"))?;
        debug!("Created directory: {path:?}");
    }
    Ok(())
}

/// Express `target` relative to `base`.
///
/// Both paths must be absolute and free of `..`/symlink components
/// (canonicalize first). Returns `.` when the paths are equal.
pub fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// The three paths a workload build needs, expressed relative to the
/// directory the external tool will run in.
///
/// Relative paths are not composable across directory changes, so this must
/// be recomputed whenever the effective working directory changes (e.g. a
/// workload override with a custom subdirectory).
#[derive(Debug, Clone)]
pub struct FlagPaths {
    /// Instrumentation artifact rlib, for the `--extern` flag
    pub rlib: PathBuf,
    /// Artifact dependency directory, for the `-L` flag
    pub deps: PathBuf,
    /// Directory the instrumented runtime writes its stat files into
    pub output_dir: PathBuf,
}

impl FlagPaths {
    /// Resolve all inputs to canonical form and re-express them relative to
    /// `workdir`. Fails if any input cannot be resolved on the filesystem
    /// (e.g. the artifact has not been built).
    pub fn resolve(rlib: &Path, deps: &Path, output_dir: &Path, workdir: &Path) -> Result<Self> {
        let workdir = workdir
            .canonicalize()
            .with_context(|| format!("Failed to resolve working directory: {workdir:?}"))?;
        let rlib = rlib
            .canonicalize()
            .with_context(|| format!("Failed to resolve instrumentation artifact: {rlib:?}"))?;
        let deps = deps
            .canonicalize()
            .with_context(|| format!("Failed to resolve artifact deps directory: {deps:?}"))?;
        let output_dir = output_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve output directory: {output_dir:?}"))?;

        Ok(Self {
            rlib: relative_to(&rlib, &workdir),
            deps: relative_to(&deps, &workdir),
            output_dir: relative_to(&output_dir, &workdir),
        })
    }
}
