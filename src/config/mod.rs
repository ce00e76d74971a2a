/// Experiment definitions
pub mod experiments;
pub use experiments::{builtin_experiments, Experiment};

/// Workload override registry
pub mod workloads;
pub use workloads::{load_overrides, OverrideRegistry, WorkloadOverride};

use anyhow::Result;
use std::path::{Path, PathBuf};

/// On-disk layout of a pipeline checkout.
///
/// Everything hangs off a single root: workload checkouts under
/// `benchmarks/`, the instrumentation artifact crate under `perf/`, with the
/// rlib and its deps in the artifact's release target directory.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Pipeline root directory
    pub root: PathBuf,
    /// Directory containing one subdirectory per workload
    pub benchmark_dir: PathBuf,
    /// Instrumentation artifact crate
    pub perf_dir: PathBuf,
    /// Built artifact rlib, linked into every workload build
    pub perf_rlib: PathBuf,
    /// Artifact dependency directory for `-L`
    pub perf_deps: PathBuf,
}

impl Layout {
    pub fn new(root: &Path) -> Self {
        let perf_dir = root.join("perf");
        let target = perf_dir.join("target").join("release");
        Self {
            root: root.to_path_buf(),
            benchmark_dir: root.join("benchmarks"),
            perf_dir,
            perf_rlib: target.join("libunsafe_perf.rlib"),
            perf_deps: target.join("deps"),
        }
    }

    /// Check the directories a run cannot proceed without.
    pub fn validate(&self) -> Result<()> {
        if !self.benchmark_dir.is_dir() {
            anyhow::bail!(
                "Benchmark directory not found: {}",
                self.benchmark_dir.display()
            );
        }
        if !self.perf_dir.is_dir() {
            anyhow::bail!(
                "Instrumentation artifact crate not found: {}",
                self.perf_dir.display()
            );
        }
        Ok(())
    }

    /// Discover workload directories (one subdirectory per workload),
    /// sorted by name for a stable run order.
    pub fn discover_workloads(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.benchmark_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new(Path::new("/pipeline"));
        assert_eq!(layout.benchmark_dir, PathBuf::from("/pipeline/benchmarks"));
        assert_eq!(
            layout.perf_rlib,
            PathBuf::from("/pipeline/perf/target/release/libunsafe_perf.rlib")
        );
        assert_eq!(
            layout.perf_deps,
            PathBuf::from("/pipeline/perf/target/release/deps")
        );
    }

    #[test]
    fn test_discover_workloads_sorted() {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path();
        std::fs::create_dir_all(root.join("benchmarks/rayon-1.5.0")).unwrap();
        std::fs::create_dir_all(root.join("benchmarks/memchr")).unwrap();
        std::fs::create_dir(root.join("perf")).unwrap();
        // Stray files are not workloads
        std::fs::write(root.join("benchmarks/README.md"), b"").unwrap();

        let layout = Layout::new(root);
        layout.validate().unwrap();
        assert_eq!(
            layout.discover_workloads().unwrap(),
            vec!["memchr".to_string(), "rayon-1.5.0".to_string()]
        );
    }
}
