use anyhow::{Context, Result};
use regex::Regex;

/// Block header the heap tracker writes on every run (append semantics)
const BLOCK_DELIMITER: &str = "===== Heap Usage Statistics =====";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapTotals {
    pub total_bytes: u64,
    pub unsafe_bytes: u64,
}

/// Sum heap usage over all appended run blocks in a heap stat file.
///
/// A file with zero blocks is valid and yields zero totals.
pub fn parse(content: &str) -> Result<HeapTotals> {
    let total_re = Regex::new(r"Total heap usage:\s*(\d+)").unwrap();
    let unsafe_re = Regex::new(r"Unsafe heap memory:\s*(\d+)").unwrap();

    let mut totals = HeapTotals::default();
    for block in content.split(BLOCK_DELIMITER) {
        if block.trim().is_empty() {
            continue;
        }
        if let Some(capture) = total_re.captures(block) {
            totals.total_bytes += parse_value(&capture[1])?;
        }
        if let Some(capture) = unsafe_re.captures(block) {
            totals.unsafe_bytes += parse_value(&capture[1])?;
        }
    }
    Ok(totals)
}

fn parse_value(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("Invalid heap byte count: {raw}"))
}
