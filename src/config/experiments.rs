/// One instrumentation configuration: a cargo feature of the artifact plus
/// the compiler flags that switch the matching LLVM instrumentation on, and
/// the fixed name of the raw stat file the runtime writes.
///
/// The flag strings are opaque to this crate; they are handed verbatim to
/// the instrumented toolchain via RUSTFLAGS.
#[derive(Debug, Clone, Copy)]
pub struct Experiment {
    pub id: &'static str,
    pub feature: &'static str,
    pub output_file: &'static str,
    pub flags: &'static [&'static str],
}

const EXPERIMENTS: &[Experiment] = &[
    Experiment {
        id: "cpu-cycle",
        feature: "cpu_cycle_counter",
        output_file: "cpu_cycle.stat",
        flags: &[
            "-C",
            "unsafe_include_native_lib=false",
            "-C",
            "llvm-args=-enable-instmarker",
            "-C",
            "llvm-args=-enable-cpu-cycle-count",
            "-C",
            "llvm-args=-enable-external-call-tracker",
        ],
    },
    Experiment {
        id: "heap-tracker",
        feature: "heap_tracker",
        output_file: "heap_stat.stat",
        flags: &[
            "-C",
            "unsafe_include_native_lib=false",
            "-C",
            "llvm-args=-enable-instmarker",
            "-C",
            "llvm-args=-enable-heap-tracker",
        ],
    },
    Experiment {
        id: "unsafe-counter",
        feature: "unsafe_counter",
        output_file: "unsafe_counter.stat",
        flags: &[
            "-C",
            "unsafe_include_native_lib=false",
            "-C",
            "llvm-args=-enable-instmarker",
            "-C",
            "llvm-args=-enable-unsafe-function-tracker",
            "-C",
            "llvm-args=-enable-unsafe-inst-counter",
        ],
    },
    Experiment {
        id: "coverage",
        feature: "unsafe_coverage",
        output_file: "unsafe_coverage.stat",
        flags: &[
            "-C",
            "unsafe_include_native_lib=false",
            "-C",
            "llvm-args=-enable-instmarker",
            "-C",
            "llvm-args=-enable-dynamic-line-count",
        ],
    },
];

/// All experiments, in declaration order.
pub fn builtin_experiments() -> &'static [Experiment] {
    EXPERIMENTS
}

impl Experiment {
    pub fn find(id: &str) -> Option<&'static Experiment> {
        EXPERIMENTS.iter().find(|e| e.id == id)
    }

    /// Valid `--experiment` values, for CLI error messages.
    pub fn ids() -> Vec<&'static str> {
        EXPERIMENTS.iter().map(|e| e.id).collect()
    }
}
