//! Prometheus-style durations (`1h30m`, `5m`, `250ms`)

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: u64 = 7 * MS_PER_DAY;
const MS_PER_YEAR: u64 = 365 * MS_PER_DAY;

const UNITS: [(&str, u64); 7] = [
    ("y", MS_PER_YEAR),
    ("w", MS_PER_WEEK),
    ("d", MS_PER_DAY),
    ("h", MS_PER_HOUR),
    ("m", MS_PER_MINUTE),
    ("s", MS_PER_SECOND),
    ("ms", 1),
];

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(\d+)y)?(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$",
        )
        .expect("duration pattern is valid")
    })
}

/// Parse a duration string
pub fn parse(s: &str) -> Result<Duration, DurationError> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(DurationError::Invalid(s.to_string()));
    }

    let caps = duration_regex()
        .captures(s)
        .ok_or_else(|| DurationError::Invalid(s.to_string()))?;

    let mut total_ms: u64 = 0;
    for (i, (_, unit_ms)) in UNITS.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            let n: u64 = m
                .as_str()
                .parse()
                .map_err(|_| DurationError::Overflow(s.to_string()))?;
            total_ms = n
                .checked_mul(*unit_ms)
                .and_then(|v| total_ms.checked_add(v))
                .ok_or_else(|| DurationError::Overflow(s.to_string()))?;
        }
    }

    Ok(Duration::from_millis(total_ms))
}

/// Format a duration using the largest units first, e.g. `1h30m`
pub fn format(d: Duration) -> String {
    let mut ms = d.as_millis() as u64;
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, unit_ms) in UNITS {
        let n = ms / unit_ms;
        if n > 0 {
            out.push_str(&n.to_string());
            out.push_str(unit);
            ms -= n * unit_ms;
        }
    }
    out
}

/// Re-render a duration string in canonical form
pub fn normalize(s: &str) -> Result<String, DurationError> {
    parse(s).map(format)
}

#[derive(Debug, thiserror::Error)]
pub enum DurationError {
    #[error("Invalid duration: {0:?}")]
    Invalid(String),

    #[error("Duration out of range: {0:?}")]
    Overflow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse("1w").unwrap(), Duration::from_secs(7 * 86400));
        assert_eq!(parse("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("5").is_err());
        assert!(parse("m5").is_err());
        assert!(parse("5m1h").is_err());
        assert!(parse("1.5h").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format(Duration::from_secs(300)), "5m");
        assert_eq!(format(Duration::from_secs(90)), "1m30s");
        assert_eq!(format(Duration::from_millis(1500)), "1s500ms");
        assert_eq!(format(Duration::ZERO), "0s");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("60m").unwrap(), "1h");
        assert_eq!(normalize("300s").unwrap(), "5m");
    }
}
