//! Human-readable duration parsing/formatting for the wire format (§6).
//!
//! Accepts an integer followed by a unit suffix in `{ms, s, m, h}`, e.g. `"30s"`, `"10m"`.

use std::time::Duration;

use crate::error::EngineError;

/// Parses a duration string such as `"30s"` or `"10m"`.
pub fn parse_duration(input: &str) -> Result<Duration, EngineError> {
    let input = input.trim();
    let invalid = || EngineError::InvalidRequest(format!("invalid duration: {input:?}"));

    let unit_len = if input.ends_with("ms") {
        2
    } else if input.ends_with(['s', 'm', 'h']) {
        1
    } else {
        return Err(invalid());
    };

    if input.len() <= unit_len {
        return Err(invalid());
    }

    let (number, unit) = input.split_at(input.len() - unit_len);
    let value: u64 = number.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => return Err(invalid()),
    };

    Ok(duration)
}

/// Formats a duration back to the wire representation, choosing the coarsest unit that divides
/// evenly so round-tripped values stay legible (`"10m"` rather than `"600s"`).
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();

    if millis % 3_600_000 == 0 {
        format!("{}h", millis / 3_600_000)
    } else if millis % 60_000 == 0 {
        format!("{}m", millis / 60_000)
    } else if millis % 1_000 == 0 {
        format!("{}s", millis / 1_000)
    } else {
        format!("{millis}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("abcs").is_err());
        assert!(parse_duration("30d").is_err());
    }

    #[test]
    fn formats_coarsest_unit() {
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(600)), "10m");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn roundtrips() {
        for s in ["500ms", "30s", "10m", "2h"] {
            let d = parse_duration(s).unwrap();
            assert_eq!(format_duration(d), s);
        }
    }
}
