use std::collections::HashSet;

/// Line sets recorded by one `RUN_<n>` block of a coverage stat file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageRun {
    pub registered: HashSet<String>,
    pub executed: HashSet<String>,
}

/// Unioned line counts after ghost filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageTotals {
    pub registered: usize,
    pub executed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Registered,
    Executed,
}

/// Split a coverage stat file into its per-run line sets.
///
/// Blocks are headed by `=== RUN_<n> ===`; within a block,
/// `=== REGISTERED_LINES ===` and `=== EXECUTED_LINES ===` open the two
/// sections, and any other `===` header (e.g. `=== SUMMARY ===`) closes
/// them. Lines outside a run block are dropped.
pub fn parse_runs(content: &str) -> Vec<CoverageRun> {
    let mut runs: Vec<CoverageRun> = Vec::new();
    let mut section: Option<Section> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("=== RUN_") {
            runs.push(CoverageRun::default());
            section = None;
        } else if line == "=== REGISTERED_LINES ===" {
            section = Some(Section::Registered);
        } else if line == "=== EXECUTED_LINES ===" {
            section = Some(Section::Executed);
        } else if line.starts_with("===") {
            section = None;
        } else if !line.is_empty() {
            if let (Some(section), Some(run)) = (section, runs.last_mut()) {
                let set = match section {
                    Section::Registered => &mut run.registered,
                    Section::Executed => &mut run.executed,
                };
                set.insert(line.to_string());
            }
        }
    }

    runs
}

/// Drop "ghost" runs: runs that registered lines but executed none,
/// presumed to be no-op or aborted executions.
///
/// If every run executed zero lines the file records a genuine 0% coverage
/// result, so all runs are kept.
pub fn filter_ghost_runs(runs: Vec<CoverageRun>) -> Vec<CoverageRun> {
    if runs.iter().any(|r| !r.executed.is_empty()) {
        runs.into_iter()
            .filter(|r| !r.executed.is_empty())
            .collect()
    } else {
        runs
    }
}

/// Parse a coverage stat file down to unioned registered/executed counts.
/// A pure function of the file contents.
pub fn parse(content: &str) -> CoverageTotals {
    let runs = filter_ghost_runs(parse_runs(content));

    let mut registered: HashSet<&str> = HashSet::new();
    let mut executed: HashSet<&str> = HashSet::new();
    for run in &runs {
        registered.extend(run.registered.iter().map(String::as_str));
        executed.extend(run.executed.iter().map(String::as_str));
    }

    CoverageTotals {
        registered: registered.len(),
        executed: executed.len(),
    }
}
