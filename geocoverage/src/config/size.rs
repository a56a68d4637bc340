//! Human-readable byte sizes ("100MB", "2 GB").

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '100MB', '2GB', or '512KB'")]
pub struct SizeParseError {
    input: String,
}

const KIB: usize = 1024;
const MIB: usize = KIB * 1024;
const GIB: usize = MIB * 1024;

/// Suffixes, longest first so "MB" wins over "B".
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// Parses a size into bytes. Units are binary (1KB = 1024 bytes),
/// case-insensitive; a bare number is bytes.
///
/// ```
/// use geocoverage::config::parse_size;
///
/// assert_eq!(parse_size("100MB").unwrap(), 100 * 1024 * 1024);
/// assert_eq!(parse_size("2 gb").unwrap(), 2 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let err = || SizeParseError {
        input: s.to_string(),
    };
    let trimmed = s.trim();
    if !trimmed.is_ascii() {
        return Err(err());
    }
    let upper = trimmed.to_uppercase();

    let (number, multiplier) = SUFFIXES
        .iter()
        .find(|(suffix, _)| upper.ends_with(suffix))
        .map(|(suffix, multiplier)| (&trimmed[..trimmed.len() - suffix.len()], *multiplier))
        .unwrap_or((trimmed, 1));

    let number: usize = number.trim().parse().map_err(|_| err())?;
    number.checked_mul(multiplier).ok_or_else(err)
}

/// Formats bytes with the largest unit that divides evenly.
pub fn format_size(bytes: usize) -> String {
    match bytes {
        0 => "0".to_string(),
        b if b % GIB == 0 => format!("{}GB", b / GIB),
        b if b % MIB == 0 => format!("{}MB", b / MIB),
        b if b % KIB == 0 => format!("{}KB", b / KIB),
        b => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1k").unwrap(), 1024);
        assert_eq!(parse_size(" 3 MB ").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_size("10B").unwrap(), 10);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("-1KB").is_err());
        assert!(parse_size("99999999999999999999GB").is_err());
    }

    #[test]
    fn test_format_roundtrips_even_sizes() {
        for s in ["2GB", "100MB", "512KB", "1000"] {
            assert_eq!(format_size(parse_size(s).unwrap()), s);
        }
        assert_eq!(format_size(0), "0");
    }
}
