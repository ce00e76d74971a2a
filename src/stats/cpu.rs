use anyhow::{Context, Result};
use regex::Regex;

/// Extract the unsafe CPU-cycle percentage from a cpu_cycle stat file.
///
/// The file is free text containing `Unsafe percentage: <float>`; it is not
/// append-on-run, so the last match wins.
pub fn parse(content: &str) -> Result<f64> {
    let re = Regex::new(r"Unsafe percentage:\s*([\d.]+)").unwrap();
    let capture = re
        .captures_iter(content)
        .last()
        .context("No 'Unsafe percentage' line found")?;
    capture[1]
        .parse::<f64>()
        .with_context(|| format!("Invalid percentage value: {}", &capture[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percentage() {
        let content = "\
Total cycles: 123456\n\
Unsafe cycles: 15234\n\
Unsafe percentage: 12.34\n";
        assert_eq!(parse(content).unwrap(), 12.34);
    }

    #[test]
    fn test_last_match_wins() {
        let content = "Unsafe percentage: 1.00\nUnsafe percentage: 2.50\n";
        assert_eq!(parse(content).unwrap(), 2.50);
    }

    #[test]
    fn test_missing_pattern() {
        assert!(parse("no stats here\n").is_err());
    }

    #[test]
    fn test_malformed_value() {
        assert!(parse("Unsafe percentage: 1.2.3\n").is_err());
    }
}
