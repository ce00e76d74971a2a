use anyhow::{Context, Result};

/// How repeated occurrences of one key reconcile across appended runs.
///
/// Plain counts accumulate, so they sum. "Unique" counts are per-run set
/// sizes; summing them would double count functions seen by several runs,
/// so the maximum observed value stands in for the union.
#[derive(Debug, Clone, Copy)]
enum Reducer {
    Sum,
    Max,
}

impl Reducer {
    fn apply(self, slot: &mut u64, value: u64) {
        match self {
            Reducer::Sum => *slot += value,
            Reducer::Max => *slot = (*slot).max(value),
        }
    }
}

/// Aggregated values from one unsafe_counter stat file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterTotals {
    pub inst_total: u64,
    pub inst_unsafe: u64,
    pub loads_unsafe: u64,
    pub stores_unsafe: u64,
    pub calls_unsafe_inst: u64,
    pub func_total: u64,
    pub func_unsafe: u64,
    pub calls_total_dyn: u64,
    pub calls_unsafe_dyn: u64,
}

type Slot = fn(&mut CounterTotals) -> &mut u64;

/// Per-key reducer table. Keys absent from the table (e.g. `Unsafe casts`,
/// `Unsafe GEPs`) are ignored.
fn field_for(key: &str) -> Option<(Reducer, Slot)> {
    let entry: (Reducer, Slot) = match key {
        "Total instructions" => (Reducer::Sum, |t| &mut t.inst_total),
        "Unsafe instructions" => (Reducer::Sum, |t| &mut t.inst_unsafe),
        "Unsafe loads" => (Reducer::Sum, |t| &mut t.loads_unsafe),
        "Unsafe stores" => (Reducer::Sum, |t| &mut t.stores_unsafe),
        "Unsafe calls" => (Reducer::Sum, |t| &mut t.calls_unsafe_inst),
        "Unique functions" => (Reducer::Max, |t| &mut t.func_total),
        "Unique unsafe functions" => (Reducer::Max, |t| &mut t.func_unsafe),
        "Total function calls" => (Reducer::Sum, |t| &mut t.calls_total_dyn),
        "Unsafe function calls" => (Reducer::Sum, |t| &mut t.calls_unsafe_dyn),
        _ => return None,
    };
    Some(entry)
}

/// Parse an unsafe_counter stat file: newline-delimited `key: value` pairs,
/// values are integers with optional thousands separators, possibly
/// repeated across appended runs.
pub fn parse(content: &str) -> Result<CounterTotals> {
    let mut totals = CounterTotals::default();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some((reducer, slot)) = field_for(key.trim()) else {
            continue;
        };
        let value: u64 = value
            .trim()
            .replace(',', "")
            .parse()
            .with_context(|| format!("Invalid counter value in line: {line}"))?;
        reducer.apply(slot(&mut totals), value);
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_run() {
        let content = "\
Total instructions: 1,000\n\
Unsafe instructions: 250\n\
Unsafe loads: 40\n\
Unsafe stores: 30\n\
Unsafe calls: 20\n\
Unique functions: 100\n\
Unique unsafe functions: 12\n\
Total function calls: 5,000\n\
Unsafe function calls: 500\n";
        let totals = parse(content).unwrap();
        assert_eq!(totals.inst_total, 1000);
        assert_eq!(totals.inst_unsafe, 250);
        assert_eq!(totals.loads_unsafe, 40);
        assert_eq!(totals.stores_unsafe, 30);
        assert_eq!(totals.calls_unsafe_inst, 20);
        assert_eq!(totals.func_total, 100);
        assert_eq!(totals.func_unsafe, 12);
        assert_eq!(totals.calls_total_dyn, 5000);
        assert_eq!(totals.calls_unsafe_dyn, 500);
    }

    #[test]
    fn test_counts_sum_but_unique_counts_take_max() {
        let content = "\
Total instructions: 100\n\
Unique functions: 10\n\
Total instructions: 50\n\
Unique functions: 7\n";
        let totals = parse(content).unwrap();
        assert_eq!(totals.inst_total, 150);
        assert_eq!(totals.func_total, 10);
    }

    #[test]
    fn test_appended_runs() {
        let content = "\
Total instructions: 1,000\n\
Unsafe instructions: 250\n\
Total instructions: 2,000\n\
Unsafe instructions: 100\n";
        let totals = parse(content).unwrap();
        assert_eq!(totals.inst_total, 3000);
        assert_eq!(totals.inst_unsafe, 350);
    }

    #[test]
    fn test_unrecognized_keys_ignored() {
        let content = "\
Unsafe casts: 5\n\
Unsafe GEPs: 7\n\
Unsafe others: not-a-number\n\
Total instructions: 10\n";
        let totals = parse(content).unwrap();
        assert_eq!(totals.inst_total, 10);
    }

    #[test]
    fn test_malformed_value_is_error() {
        assert!(parse("Total instructions: lots\n").is_err());
    }

    #[test]
    fn test_empty_file_is_zero() {
        assert_eq!(parse("").unwrap(), CounterTotals::default());
    }
}
