//! Retention expression parsing.
//!
//! A retention expression looks like `[<days>d]<duration>`, where `<duration>`
//! is a sequence of `<number><unit>` pairs (`2h30m`, `1.5h`, `90s`). The parsed
//! value is always non-positive: it is the offset that, added to "now", yields
//! the cutoff instant before which tags become eligible for deletion.

use crate::error::{ReapError, Result};
use chrono::{DateTime, Duration, Utc};


const NANOS_PER_HOUR: u128 = 3_600_000_000_000;

/// Largest number of fractional digits that still fits the scale arithmetic.
const MAX_FRACTION_DIGITS: u32 = 18;

/// Parses a retention expression into a non-positive duration.
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use libreap::duration::parse_ago;
///
/// assert_eq!(parse_ago("15m").unwrap(), -Duration::minutes(15));
/// assert_eq!(parse_ago("3d").unwrap(), -Duration::hours(72));
/// assert!(parse_ago("15").is_err());
/// ```
pub fn parse_ago(input: &str) -> Result<Duration> {
    if input.is_empty() {
        return Err(ReapError::invalid_duration(input, "expression is empty"));
    }

    let (days, rest) = match input.split_once('d') {
        Some((prefix, rest)) => (parse_days(input, prefix)?, rest),
        None => (0, input),
    };

    let mut nanos = u128::from(days) * 24 * NANOS_PER_HOUR;
    if !rest.is_empty() {
        nanos = nanos
            .checked_add(parse_standard(input, rest)?)
            .ok_or_else(|| ReapError::invalid_duration(input, "duration out of range"))?;
    }

    let nanos = i64::try_from(nanos)
        .map_err(|_| ReapError::invalid_duration(input, "duration out of range"))?;
    Ok(Duration::nanoseconds(-nanos))
}

/// Returns the cutoff instant for a retention expression relative to `now`.
pub fn cutoff(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let ago = parse_ago(input)?;
    now.checked_add_signed(ago)
        .ok_or_else(|| ReapError::invalid_duration(input, "cutoff out of range"))
}

fn parse_days(input: &str, prefix: &str) -> Result<u64> {
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ReapError::invalid_duration(
            input.to_string(),
            format!("invalid day count \"{}\"", prefix),
        ));
    }
    prefix
        .parse::<u64>()
        .map_err(|_| ReapError::invalid_duration(input, "day count out of range"))
}

/// Parses the day-free part, returning its length in nanoseconds.
fn parse_standard(input: &str, s: &str) -> Result<u128> {
    // A lone zero needs no unit.
    if s == "0" {
        return Ok(0);
    }

    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ReapError::invalid_duration(
                input.to_string(),
                format!("expected a number at \"{}\"", rest),
            ));
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map_or(rest.len(), |(idx, _)| idx);
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        if unit.is_empty() {
            return Err(ReapError::invalid_duration(
                input.to_string(),
                format!("missing unit after \"{}{}\"", int_part, dotted(frac_part)),
            ));
        }
        let scale = unit_nanos(unit).ok_or_else(|| {
            ReapError::invalid_duration(input.to_string(), format!("unknown unit \"{}\"", unit))
        })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse::<u128>()
                .map_err(|_| ReapError::invalid_duration(input, "number out of range"))?
        };
        total = whole
            .checked_mul(scale)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| ReapError::invalid_duration(input, "duration out of range"))?;

        let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS as usize)];
        if !digits.is_empty() {
            let numerator: u128 = digits
                .parse()
                .map_err(|_| ReapError::invalid_duration(input, "number out of range"))?;
            let denominator = 10u128.pow(digits.len() as u32);
            total = numerator
                .checked_mul(scale)
                .map(|v| v / denominator)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| ReapError::invalid_duration(input, "duration out of range"))?;
        }
    }

    Ok(total)
}

fn dotted(frac: &str) -> String {
    if frac.is_empty() {
        String::new()
    } else {
        format!(".{}", frac)
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60_000_000_000),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}
