use anyhow::Result;
use log::info;

use crate::config::{Experiment, Layout};
use crate::pipeline::process::{run_shell, ExecEnv};

/// Rebuild the shared instrumentation artifact with one experiment's
/// feature enabled.
///
/// The clean is mandatory: the artifact is a process-wide resource and two
/// experiments' features must never coexist in one build. RUSTFLAGS is
/// withheld so the artifact itself is not built with workload
/// instrumentation flags.
pub fn build_artifact(layout: &Layout, experiment: &Experiment) -> Result<()> {
    info!(
        "Building instrumentation artifact with feature: {}",
        experiment.feature
    );

    let mut env = ExecEnv::default();
    env.clear_var("RUSTFLAGS");

    let outcome = run_shell("cargo clean", &layout.perf_dir, &env, None)?;
    if !outcome.success() {
        anyhow::bail!(
            "Failed to clean artifact crate in {} ({outcome})",
            layout.perf_dir.display()
        );
    }

    let cmd = format!("cargo build --release --features {}", experiment.feature);
    let outcome = run_shell(&cmd, &layout.perf_dir, &env, None)?;
    if !outcome.success() {
        anyhow::bail!(
            "Failed to build artifact for feature '{}' in {} ({outcome})",
            experiment.feature,
            layout.perf_dir.display()
        );
    }

    Ok(())
}
