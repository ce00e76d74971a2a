use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::config::{Experiment, Layout, OverrideRegistry};
use crate::error::PipelineError;
use crate::paths::FlagPaths;
use crate::pipeline::process::ExecEnv;

/// Environment variable the instrumented runtime reads to find where to
/// write its stat files, as a path relative to the process working directory
pub const OUTPUT_DIR_ENV: &str = "UNSAFE_BENCH_OUTPUT_DIR";

/// Toolchain with the unsafe-instrumentation patches
const TOOLCHAIN: &str = "stage1";

/// Command run when a workload has no explicit override
const DEFAULT_COMMAND: &str = "cargo bench";

/// A fully resolved execution for one (workload, experiment) pair: data
/// only, nothing here touches a process.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Workload directory name (used to namespace the relocated stat file)
    pub workload: String,
    /// Effective working directory all commands run from
    pub workdir: PathBuf,
    /// Environment injections for every command
    pub env: ExecEnv,
    /// Ordered command sequence; each command is opaque shell text
    pub commands: Vec<String>,
}

/// Resolves overrides, paths and environment into an [`ExecutionPlan`].
pub struct ExecutionPlanner<'a> {
    layout: &'a Layout,
    overrides: &'a OverrideRegistry,
    output_dir: &'a Path,
}

impl<'a> ExecutionPlanner<'a> {
    pub fn new(layout: &'a Layout, overrides: &'a OverrideRegistry, output_dir: &'a Path) -> Self {
        Self {
            layout,
            overrides,
            output_dir,
        }
    }

    /// Plan one workload run. Returns `Ok(None)` when the workload's
    /// override says skip.
    pub fn plan(
        &self,
        workload: &str,
        experiment: &Experiment,
    ) -> Result<Option<ExecutionPlan>, PipelineError> {
        let (name, workload_root) = self.resolve_workload_dir(workload)?;

        let entry = self.overrides.lookup(&name);
        if entry.is_some_and(|e| e.skip) {
            return Ok(None);
        }

        // Custom subdirectories change the effective working directory, so
        // every relative path below has to be computed against it.
        let workdir = match entry.and_then(|e| e.cwd.as_deref()) {
            Some(subdir) => {
                let dir = workload_root.join(subdir);
                if !dir.is_dir() {
                    return Err(PipelineError::configuration(
                        &name,
                        format!("override working directory not found: {}", dir.display()),
                    ));
                }
                dir
            }
            None => workload_root,
        };

        let paths = FlagPaths::resolve(
            &self.layout.perf_rlib,
            &self.layout.perf_deps,
            self.output_dir,
            &workdir,
        )
        .map_err(|e| PipelineError::configuration(&name, format!("{e:#}")))?;

        let mut env = ExecEnv::default();
        // Unstable flags need a nightly-capable compiler, and only the
        // patched toolchain understands the instrumentation flags. A shell
        // RUSTC override would bypass the RUSTUP_TOOLCHAIN selection.
        env.set_var("RUSTC_BOOTSTRAP", "1");
        env.set_var("RUSTUP_TOOLCHAIN", TOOLCHAIN);
        env.clear_var("RUSTC");
        env.set_var("RUSTFLAGS", self.build_rustflags(experiment, entry, &paths));
        env.set_var(OUTPUT_DIR_ENV, paths.output_dir.to_string_lossy());
        debug!(
            "{OUTPUT_DIR_ENV}={} (cwd={})",
            paths.output_dir.display(),
            workdir.display()
        );

        let commands = match entry.and_then(|e| e.commands.clone()) {
            Some(commands) => commands,
            None => vec![DEFAULT_COMMAND.to_string()],
        };

        Ok(Some(ExecutionPlan {
            workload: name,
            workdir,
            env,
            commands,
        }))
    }

    /// Locate the workload's root directory, falling back to a prefix match
    /// over the discovered directories.
    fn resolve_workload_dir(&self, workload: &str) -> Result<(String, PathBuf), PipelineError> {
        let exact = self.layout.benchmark_dir.join(workload);
        if exact.is_dir() {
            return Ok((workload.to_string(), exact));
        }

        let mut candidates: Vec<String> = self
            .layout
            .discover_workloads()
            .map_err(|e| PipelineError::configuration(workload, e.to_string()))?
            .into_iter()
            .filter(|name| name.starts_with(workload))
            .collect();
        candidates.sort();

        match candidates.into_iter().next() {
            Some(name) => {
                info!("Found workload directory: {name}");
                let dir = self.layout.benchmark_dir.join(&name);
                Ok((name, dir))
            }
            None => Err(PipelineError::configuration(
                workload,
                format!(
                    "workload directory not found under {}",
                    self.layout.benchmark_dir.display()
                ),
            )),
        }
    }

    /// Assemble RUSTFLAGS: fixed instrumentation-invocation flags, then the
    /// artifact/deps paths, then the experiment's flags, then the workload's
    /// extra flags. Order is fixed; the toolchain lets later flags override
    /// earlier ones.
    fn build_rustflags(
        &self,
        experiment: &Experiment,
        entry: Option<&crate::config::WorkloadOverride>,
        paths: &FlagPaths,
    ) -> String {
        let mut flags: Vec<String> = vec![
            "--emit=llvm-ir,link".into(),
            "-Z".into(),
            "unstable-options".into(),
            "--extern".into(),
            format!("force:unsafe_perf={}", paths.rlib.display()),
            "-L".into(),
            paths.deps.to_string_lossy().into_owned(),
        ];
        flags.extend(experiment.flags.iter().map(|f| f.to_string()));
        if let Some(extra) = entry.and_then(|e| e.extra_flags.as_ref()) {
            flags.extend(extra.iter().cloned());
        }
        flags.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadOverride;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _tempdir: TempDir,
        layout: Layout,
        output_dir: PathBuf,
    }

    fn fixture(workload_dirs: &[&str]) -> Fixture {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path();
        let layout = Layout::new(root);

        std::fs::create_dir_all(layout.perf_rlib.parent().unwrap()).unwrap();
        std::fs::write(&layout.perf_rlib, b"").unwrap();
        std::fs::create_dir_all(&layout.perf_deps).unwrap();
        let output_dir = root.join("results");
        std::fs::create_dir_all(&output_dir).unwrap();
        for dir in workload_dirs {
            std::fs::create_dir_all(layout.benchmark_dir.join(dir)).unwrap();
        }

        Fixture {
            _tempdir: tempdir,
            layout,
            output_dir,
        }
    }

    fn experiment() -> &'static Experiment {
        Experiment::find("cpu-cycle").unwrap()
    }

    #[test]
    fn test_default_plan() {
        let fx = fixture(&["serde-1.0.0"]);
        let registry = OverrideRegistry { workloads: vec![] };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        let plan = planner.plan("serde-1.0.0", experiment()).unwrap().unwrap();
        assert_eq!(plan.commands, vec!["cargo bench".to_string()]);
        assert_eq!(plan.workload, "serde-1.0.0");

        assert_eq!(plan.env.set.get("RUSTC_BOOTSTRAP").unwrap(), "1");
        assert_eq!(plan.env.set.get("RUSTUP_TOOLCHAIN").unwrap(), "stage1");
        assert!(plan.env.clear.contains(&"RUSTC".to_string()));
        assert_eq!(plan.env.set.get(OUTPUT_DIR_ENV).unwrap(), "../../results");

        let rustflags = plan.env.set.get("RUSTFLAGS").unwrap();
        assert!(rustflags.starts_with("--emit=llvm-ir,link -Z unstable-options"));
        assert!(rustflags.contains("--extern force:unsafe_perf=../../perf/target/release/libunsafe_perf.rlib"));
        assert!(rustflags.contains("-L ../../perf/target/release/deps"));
        assert!(rustflags.ends_with("llvm-args=-enable-external-call-tracker"));
    }

    #[test]
    fn test_prefix_fallback() {
        let fx = fixture(&["rayon-1.5.0"]);
        let registry = OverrideRegistry { workloads: vec![] };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        let plan = planner.plan("rayon", experiment()).unwrap().unwrap();
        assert_eq!(plan.workload, "rayon-1.5.0");
    }

    #[test]
    fn test_missing_workload_is_configuration_error() {
        let fx = fixture(&[]);
        let registry = OverrideRegistry { workloads: vec![] };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        let err = planner.plan("ghost", experiment()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_skip_override_produces_no_plan() {
        let fx = fixture(&["rayon-core"]);
        let registry = OverrideRegistry {
            workloads: vec![WorkloadOverride {
                name: "rayon-core".into(),
                skip: true,
                ..Default::default()
            }],
        };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        assert!(planner.plan("rayon-core", experiment()).unwrap().is_none());
    }

    #[test]
    fn test_custom_cwd_recomputes_output_dir() {
        let fx = fixture(&["rayon"]);
        std::fs::create_dir_all(fx.layout.benchmark_dir.join("rayon/rayon-demo")).unwrap();
        let registry = OverrideRegistry {
            workloads: vec![WorkloadOverride {
                name: "rayon".into(),
                cwd: Some("rayon-demo".into()),
                commands: Some(vec!["cargo build --release".into()]),
                ..Default::default()
            }],
        };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        let plan = planner.plan("rayon", experiment()).unwrap().unwrap();
        assert!(plan.workdir.ends_with("rayon/rayon-demo"));
        // One level deeper means one more climb in the relative output path
        assert_eq!(
            plan.env.set.get(OUTPUT_DIR_ENV).unwrap(),
            "../../../results"
        );
        assert_eq!(plan.commands, vec!["cargo build --release".to_string()]);
    }

    #[test]
    fn test_extra_flags_come_last() {
        let fx = fixture(&["memchr"]);
        let registry = OverrideRegistry {
            workloads: vec![WorkloadOverride {
                name: "memchr".into(),
                extra_flags: Some(vec!["-C".into(), "target-feature=-sse2,-avx2".into()]),
                ..Default::default()
            }],
        };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        let plan = planner.plan("memchr", experiment()).unwrap().unwrap();
        let rustflags = plan.env.set.get("RUSTFLAGS").unwrap();
        assert!(rustflags.ends_with("-C target-feature=-sse2,-avx2"));
    }

    #[test]
    fn test_missing_artifact_is_configuration_error() {
        let fx = fixture(&["serde"]);
        std::fs::remove_file(&fx.layout.perf_rlib).unwrap();
        let registry = OverrideRegistry { workloads: vec![] };
        let planner = ExecutionPlanner::new(&fx.layout, &registry, &fx.output_dir);

        let err = planner.plan("serde", experiment()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }
}
