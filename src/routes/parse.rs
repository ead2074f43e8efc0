//! Parsers for the suffixed value strings used in route and token
//! configuration.

use chrono::Duration;
use http::Method;

struct SuffixMultiplier {
    suffix: &'static str,
    multiplier: f64,
}

const KIB: f64 = 1024.0;

// longest suffixes first so "kib" is not consumed as "k"
const SIZE_SUFFIXES: &[SuffixMultiplier] = &[
    SuffixMultiplier { suffix: "pib", multiplier: KIB * KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "tib", multiplier: KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "gib", multiplier: KIB * KIB * KIB },
    SuffixMultiplier { suffix: "mib", multiplier: KIB * KIB },
    SuffixMultiplier { suffix: "kib", multiplier: KIB },
    SuffixMultiplier { suffix: "pb", multiplier: KIB * KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "tb", multiplier: KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "gb", multiplier: KIB * KIB * KIB },
    SuffixMultiplier { suffix: "mb", multiplier: KIB * KIB },
    SuffixMultiplier { suffix: "kb", multiplier: KIB },
    SuffixMultiplier { suffix: "pi", multiplier: KIB * KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "ti", multiplier: KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "gi", multiplier: KIB * KIB * KIB },
    SuffixMultiplier { suffix: "mi", multiplier: KIB * KIB },
    SuffixMultiplier { suffix: "ki", multiplier: KIB },
    SuffixMultiplier { suffix: "p", multiplier: KIB * KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "t", multiplier: KIB * KIB * KIB * KIB },
    SuffixMultiplier { suffix: "g", multiplier: KIB * KIB * KIB },
    SuffixMultiplier { suffix: "m", multiplier: KIB * KIB },
    SuffixMultiplier { suffix: "k", multiplier: KIB },
];

// multipliers in milliseconds, longest suffixes first
const TIME_SUFFIXES: &[SuffixMultiplier] = &[
    SuffixMultiplier { suffix: "microseconds", multiplier: 0.001 },
    SuffixMultiplier { suffix: "milliseconds", multiplier: 1.0 },
    SuffixMultiplier { suffix: "microsecond", multiplier: 0.001 },
    SuffixMultiplier { suffix: "millisecond", multiplier: 1.0 },
    SuffixMultiplier { suffix: "seconds", multiplier: 1000.0 },
    SuffixMultiplier { suffix: "minutes", multiplier: 60_000.0 },
    SuffixMultiplier { suffix: "second", multiplier: 1000.0 },
    SuffixMultiplier { suffix: "minute", multiplier: 60_000.0 },
    SuffixMultiplier { suffix: "hours", multiplier: 3_600_000.0 },
    SuffixMultiplier { suffix: "hour", multiplier: 3_600_000.0 },
    SuffixMultiplier { suffix: "days", multiplier: 86_400_000.0 },
    SuffixMultiplier { suffix: "day", multiplier: 86_400_000.0 },
    SuffixMultiplier { suffix: "mks", multiplier: 0.001 },
    SuffixMultiplier { suffix: "ms", multiplier: 1.0 },
    SuffixMultiplier { suffix: "s", multiplier: 1000.0 },
    SuffixMultiplier { suffix: "m", multiplier: 60_000.0 },
    SuffixMultiplier { suffix: "h", multiplier: 3_600_000.0 },
    SuffixMultiplier { suffix: "d", multiplier: 86_400_000.0 },
];

fn parse_suffixed(value: &str, suffixes: &[SuffixMultiplier]) -> Result<f64, String> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return Ok(0.0);
    }
    let (number, multiplier) = suffixes
        .iter()
        .find_map(|sm| {
            value
                .strip_suffix(sm.suffix)
                .map(|rest| (rest.trim_end().to_string(), sm.multiplier))
        })
        .unwrap_or((value.clone(), 1.0));
    let number: f64 = number
        .parse()
        .map_err(|e| format!("invalid number '{number}': {e}"))?;
    Ok(number * multiplier)
}

/// Parses a size string with binary unit suffixes ("100kb", "2mib", "512").
pub fn parse_size(size: &str) -> Result<i64, String> {
    Ok(parse_suffixed(size, SIZE_SUFFIXES)? as i64)
}

/// Parses a duration string with time unit suffixes ("250ms", "3m", "90d").
pub fn parse_duration(duration: &str) -> Result<Duration, String> {
    let millis = parse_suffixed(duration, TIME_SUFFIXES)?;
    Ok(Duration::milliseconds(millis as i64))
}

/// Parses a "<limit>[,<burst>]" rate string; burst defaults to 1.
pub fn parse_rate_limit(rate_limit: &str) -> Result<(f64, u32), String> {
    let parts: Vec<&str> = rate_limit
        .split(|c: char| c == ',' || c == ';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() || parts.len() > 2 {
        return Err("expected limit and optional burst value, comma or semicolon separated".into());
    }
    let limit: f64 = parts[0]
        .parse()
        .map_err(|e| format!("invalid limit value '{}': {e}", parts[0]))?;
    if limit < 0.0 {
        return Err(format!("invalid limit value '{}': negative value not allowed", parts[0]));
    }
    let burst = if parts.len() > 1 {
        parts[1]
            .parse()
            .map_err(|e| format!("invalid burst value '{}': {e}", parts[1]))?
    } else {
        1
    };
    Ok((limit, burst))
}

/// Parses a comma/semicolon/whitespace separated HTTP method list.
pub fn parse_methods(methods: &str) -> Result<Vec<Method>, String> {
    let mut parsed = Vec::new();
    for word in methods
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|w| !w.is_empty())
    {
        let method = Method::from_bytes(word.to_ascii_uppercase().as_bytes())
            .map_err(|_| format!("invalid method '{word}'"))?;
        parsed.push(method);
    }
    if parsed.is_empty() {
        return Err("at least one method must be present".into());
    }
    Ok(parsed)
}

/// Normalizes a configured route path: a leading slash is added and the
/// value must be a bare URI path, without query or fragment parts.
pub fn parse_path(path: &str) -> Result<String, String> {
    let path = if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if path.contains('?') || path.contains('#') || path.chars().any(char::is_whitespace) {
        return Err("path must contain a URI path only".into());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_with_suffixes() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("100kb").unwrap(), 102_400);
        assert_eq!(parse_size("2MiB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1g").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size(" 0.5 kb ").unwrap(), 512);
        assert_eq!(parse_size("").unwrap(), 0);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn durations_with_suffixes() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::milliseconds(250));
        assert_eq!(parse_duration("3m").unwrap(), Duration::minutes(3));
        assert_eq!(parse_duration("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_duration("90d").unwrap(), Duration::days(90));
        assert_eq!(parse_duration("30 seconds").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("-5m").unwrap(), Duration::minutes(-5));
        assert!(parse_duration("later").is_err());
    }

    #[test]
    fn rate_limits() {
        assert_eq!(parse_rate_limit("10").unwrap(), (10.0, 1));
        assert_eq!(parse_rate_limit("5,2").unwrap(), (5.0, 2));
        assert_eq!(parse_rate_limit("0.5; 3").unwrap(), (0.5, 3));
        // a trailing separator is tolerated
        assert_eq!(parse_rate_limit("5,").unwrap(), (5.0, 1));
        assert!(parse_rate_limit("fast").is_err());
        assert!(parse_rate_limit("5,many").is_err());
        assert!(parse_rate_limit("1,2,3").is_err());
        assert!(parse_rate_limit("-1").is_err());
    }

    #[test]
    fn method_lists() {
        let methods = parse_methods("get, post;OPTIONS").unwrap();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::OPTIONS]);
        // "GE T" splits into two valid extension methods; only a
        // non-token character makes a word invalid
        assert_eq!(parse_methods("GE T").unwrap().len(), 2);
        assert!(parse_methods("").is_err());
        assert!(parse_methods("GE/T").is_err());
    }

    #[test]
    fn paths() {
        assert_eq!(parse_path("").unwrap(), "/");
        assert_eq!(parse_path("token").unwrap(), "/token");
        assert_eq!(parse_path("/a/b").unwrap(), "/a/b");
        assert!(parse_path("/a?x=1").is_err());
        assert!(parse_path("/a#frag").is_err());
    }
}
