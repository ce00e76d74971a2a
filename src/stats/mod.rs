/// CPU-cycle stat files
pub mod cpu;
/// Heap tracker stat files
pub mod heap;
/// Unsafe-counter stat files
pub mod counter;
/// Coverage stat files
pub mod coverage;
/// Table rendering and JSON export
pub mod report;
pub use report::{print_table, render_table, write_json};

use anyhow::Result;
use log::{error, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Percentage with a zero-denominator default of 0.0, never NaN.
fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Aggregated metrics for one workload, across all stat-file kinds.
///
/// Fields a workload produced no telemetry for keep their zero defaults and
/// are rendered as such, never omitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkloadStats {
    pub name: String,

    pub cpu_unsafe_pct: f64,

    pub heap_total: u64,
    pub heap_unsafe: u64,
    pub heap_unsafe_pct: f64,

    pub inst_total: u64,
    pub inst_unsafe: u64,
    pub inst_unsafe_pct: f64,

    pub loads_unsafe: u64,
    pub stores_unsafe: u64,
    pub calls_unsafe_inst: u64,

    pub func_total: u64,
    pub func_unsafe: u64,
    pub func_unsafe_pct: f64,

    pub calls_total_dyn: u64,
    pub calls_unsafe_dyn: u64,
    pub calls_unsafe_dyn_pct: f64,

    pub cov_registered: usize,
    pub cov_executed: usize,
    pub cov_pct: f64,
}

/// Reconciles all raw stat files in one output directory into per-workload
/// records.
///
/// Four independent passes, one per stat-file kind; a parse failure in one
/// file is logged and zeroes only that file's contribution.
pub struct Aggregator {
    output_dir: PathBuf,
    stats: BTreeMap<String, WorkloadStats>,
}

impl Aggregator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            stats: BTreeMap::new(),
        }
    }

    /// The aggregated records, keyed and ordered by workload name.
    pub fn stats(&self) -> &BTreeMap<String, WorkloadStats> {
        &self.stats
    }

    /// Run all four parsing passes.
    pub fn collect_all(&mut self) {
        if !self.output_dir.is_dir() {
            warn!(
                "Output directory not found: {}",
                self.output_dir.display()
            );
            return;
        }
        self.collect_cpu();
        self.collect_heap();
        self.collect_counters();
        self.collect_coverage();
    }

    fn collect_cpu(&mut self) {
        for (workload, path) in self.files_with_suffix("_cpu_cycle.stat") {
            self.entry(&workload);
            match read_and(&path, cpu::parse) {
                Ok(pct_value) => self.entry(&workload).cpu_unsafe_pct = pct_value,
                Err(e) => error!("{e}"),
            }
        }
    }

    fn collect_heap(&mut self) {
        for (workload, path) in self.files_with_suffix("_heap_stat.stat") {
            self.entry(&workload);
            match read_and(&path, heap::parse) {
                Ok(totals) => {
                    let stats = self.entry(&workload);
                    stats.heap_total = totals.total_bytes;
                    stats.heap_unsafe = totals.unsafe_bytes;
                    stats.heap_unsafe_pct = pct(totals.unsafe_bytes, totals.total_bytes);
                }
                Err(e) => error!("{e}"),
            }
        }
    }

    fn collect_counters(&mut self) {
        for (workload, path) in self.files_with_suffix("_unsafe_counter.stat") {
            self.entry(&workload);
            match read_and(&path, counter::parse) {
                Ok(totals) => {
                    let stats = self.entry(&workload);
                    stats.inst_total = totals.inst_total;
                    stats.inst_unsafe = totals.inst_unsafe;
                    stats.inst_unsafe_pct = pct(totals.inst_unsafe, totals.inst_total);
                    stats.loads_unsafe = totals.loads_unsafe;
                    stats.stores_unsafe = totals.stores_unsafe;
                    stats.calls_unsafe_inst = totals.calls_unsafe_inst;
                    stats.func_total = totals.func_total;
                    stats.func_unsafe = totals.func_unsafe;
                    stats.func_unsafe_pct = pct(totals.func_unsafe, totals.func_total);
                    stats.calls_total_dyn = totals.calls_total_dyn;
                    stats.calls_unsafe_dyn = totals.calls_unsafe_dyn;
                    stats.calls_unsafe_dyn_pct =
                        pct(totals.calls_unsafe_dyn, totals.calls_total_dyn);
                }
                Err(e) => error!("{e}"),
            }
        }
    }

    fn collect_coverage(&mut self) {
        for (workload, path) in self.files_with_suffix("_unsafe_coverage.stat") {
            self.entry(&workload);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let totals = coverage::parse(&content);
                    let stats = self.entry(&workload);
                    stats.cov_registered = totals.registered;
                    stats.cov_executed = totals.executed;
                    stats.cov_pct = pct(totals.executed as u64, totals.registered as u64);
                }
                Err(e) => error!("{}", PipelineError::parse(&path, e.to_string())),
            }
        }
    }

    /// Stat files for one kind, discovered by suffix; the workload name is
    /// the filename with the suffix stripped.
    fn files_with_suffix(&self, suffix: &str) -> Vec<(String, PathBuf)> {
        let entries = match std::fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read {}: {e}", self.output_dir.display());
                return Vec::new();
            }
        };

        let mut files: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let filename = entry.file_name().to_string_lossy().to_string();
                let workload = filename.strip_suffix(suffix)?;
                if workload.is_empty() {
                    return None;
                }
                Some((workload.to_string(), entry.path()))
            })
            .collect();
        files.sort();
        files
    }

    /// Workload records are created lazily on first reference from any pass.
    fn entry(&mut self, workload: &str) -> &mut WorkloadStats {
        self.stats
            .entry(workload.to_string())
            .or_insert_with(|| WorkloadStats {
                name: workload.to_string(),
                ..Default::default()
            })
    }
}

/// Read a file and parse it, mapping any failure to a [`PipelineError::Parse`]
/// carrying the offending filename.
fn read_and<T>(path: &Path, parse: impl Fn(&str) -> Result<T>) -> Result<T, PipelineError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| PipelineError::parse(path, e.to_string()))?;
    parse(&content).map_err(|e| PipelineError::parse(path, format!("{e:#}")))
}
