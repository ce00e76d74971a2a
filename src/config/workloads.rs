use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Per-workload execution overrides.
///
/// `name` matches a workload directory either exactly or as a prefix
/// followed by `-` (so `rayon` covers `rayon-1.5.0` but not `rayonx`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkloadOverride {
    /// Workload name or name prefix
    pub name: String,
    /// Subdirectory of the workload root to run commands from
    #[serde(default)]
    pub cwd: Option<String>,
    /// Explicit command sequence, replacing the default `cargo bench`
    #[serde(default)]
    pub commands: Option<Vec<String>>,
    /// Extra compiler flags appended after the experiment's flags
    #[serde(default)]
    pub extra_flags: Option<Vec<String>>,
    /// Skip this workload entirely
    #[serde(default)]
    pub skip: bool,
}

/// The override table, with longest-prefix-match lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRegistry {
    pub workloads: Vec<WorkloadOverride>,
}

impl OverrideRegistry {
    /// The overrides the pipeline ships with.
    pub fn builtin() -> Self {
        let owned = |cmds: &[&str]| Some(cmds.iter().map(|c| c.to_string()).collect());
        Self {
            workloads: vec![
                WorkloadOverride {
                    name: "rayon".into(),
                    cwd: Some("rayon-demo".into()),
                    commands: owned(&[
                        "cargo build --release",
                        "../target/release/rayon-demo nbody bench --bodies 500",
                    ]),
                    ..Default::default()
                },
                WorkloadOverride {
                    name: "parking_lot".into(),
                    cwd: Some("benchmark".into()),
                    commands: owned(&[
                        "cargo build --release",
                        "./target/release/mutex 2 4 10 2 4",
                        "./target/release/rwlock 4 4 4 10 2 4",
                    ]),
                    ..Default::default()
                },
                WorkloadOverride {
                    name: "memchr".into(),
                    // rebar expects to run from the dir holding engines.toml
                    cwd: Some("benchmarks".into()),
                    commands: owned(&[
                        "cd engines/rust-memchr && cargo clean && cargo build --release",
                        "~/.cargo/bin/rebar measure --verify \
                         -e 'rust/memchr/memmem/(oneshot|prebuilt)' -d .",
                    ]),
                    extra_flags: Some(vec![
                        "-C".into(),
                        "target-feature=-sse2,-avx2".into(),
                    ]),
                    ..Default::default()
                },
                WorkloadOverride {
                    name: "jni".into(),
                    commands: owned(&["cargo bench --features invocation"]),
                    ..Default::default()
                },
                WorkloadOverride {
                    name: "ring".into(),
                    commands: owned(&["cargo bench --benches"]),
                    ..Default::default()
                },
                WorkloadOverride {
                    // The rayon checkout already exercises rayon-core
                    name: "rayon-core".into(),
                    skip: true,
                    ..Default::default()
                },
            ],
        }
    }

    /// Find the override for a workload directory name.
    ///
    /// An exact name match wins; otherwise the longest prefix entry whose
    /// `name` plus `-` starts the workload name.
    pub fn lookup(&self, workload: &str) -> Option<&WorkloadOverride> {
        if let Some(exact) = self.workloads.iter().find(|o| o.name == workload) {
            return Some(exact);
        }
        self.workloads
            .iter()
            .filter(|o| workload.starts_with(&format!("{}-", o.name)))
            .max_by_key(|o| o.name.len())
    }
}

/// Load a replacement override table from a YAML file.
pub fn load_overrides(path: &Path) -> Result<OverrideRegistry> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workload override file: {path:?}"))?;
    let registry: OverrideRegistry = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse YAML from file: {path:?}"))?;
    debug!(
        "Loaded {} workload overrides from {path:?}",
        registry.workloads.len()
    );
    Ok(registry)
}
