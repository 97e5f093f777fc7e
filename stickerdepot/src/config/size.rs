//! Human-readable byte sizes ("512KB", "1MB").

use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size '{0}', expected a byte count or a value like '512KB' or '1MB'")]
pub struct SizeParseError(String);

/// Parse a size string into bytes.
///
/// Accepts bare byte counts and `K`/`KB`, `M`/`MB`, `G`/`GB` suffixes,
/// case-insensitively, with optional whitespace before the suffix.
///
/// ```
/// use stickerdepot::config::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("512kb").unwrap(), 512 * 1024);
/// assert_eq!(parse_size("1 MB").unwrap(), 1024 * 1024);
/// ```
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = [("GB", GB), ("G", GB), ("MB", MB), ("M", MB), ("KB", KB), ("K", KB)]
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|d| (d.trim(), *mult)))
        .unwrap_or((upper.as_str(), 1));

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| SizeParseError(input.to_string()))
}

/// Format a byte count using the largest exact unit.
pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= GB && b % GB == 0 => format!("{}GB", b / GB),
        b if b >= MB && b % MB == 0 => format!("{}MB", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}KB", b / KB),
        b => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("1M").unwrap(), MB);
        assert_eq!(parse_size("  2 MB ").unwrap(), 2 * MB);
        assert_eq!(parse_size("1GB").unwrap(), GB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("1.5MB").is_err());
        assert!(parse_size("-1KB").is_err());
        assert!(parse_size("2TB").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(MB), "1MB");
        assert_eq!(format_size(512 * KB), "512KB");
        assert_eq!(format_size(1000), "1000");
        assert_eq!(format_size(3 * GB), "3GB");
    }
}
