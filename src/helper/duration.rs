//! Go-compatible duration strings.
//!
//! Nomad's API carries durations as integer nanoseconds while users write
//! them as Go duration strings (`"15s"`, `"1h30m"`, `"1.5h"`). Reads must
//! render them exactly as Go's `time.Duration.String` does (`"24h0m0s"`),
//! otherwise every refresh would show drift.

use std::fmt::Write;

use thiserror::Error;

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

/// Errors returned by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The input was not a valid duration.
    #[error("invalid duration {0:?}")]
    Invalid(String),
    /// A number was not followed by a unit.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    /// The unit is not one of ns, us, µs, ms, s, m, h.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The offending unit.
        unit: String,
        /// The full input.
        input: String,
    },
    /// The value does not fit in an i64 of nanoseconds.
    #[error("duration {0:?} out of range")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "µs" | "μs" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

/// Parse a Go duration string into nanoseconds.
///
/// Accepts an optional sign followed by one or more decimal numbers, each
/// with an optional fraction and a mandatory unit. `"0"` is the only value
/// allowed without a unit.
pub fn parse_duration(input: &str) -> Result<i64, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
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
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let overflow = || DurationError::Overflow(input.to_string());
        let whole: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(overflow)?;

        if !frac_part.is_empty() {
            // Only as many fractional digits as the unit can represent matter.
            let mut frac_value: u64 = 0;
            let mut frac_scale: u64 = 1;
            for digit in frac_part.bytes() {
                if frac_scale >= scale {
                    break;
                }
                frac_value = frac_value * 10 + u64::from(digit - b'0');
                frac_scale *= 10;
            }
            value = value
                .checked_add(frac_value * (scale / frac_scale))
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(value).ok_or_else(overflow)?;
    }

    if negative {
        if total > i64::MAX as u64 + 1 {
            return Err(DurationError::Overflow(input.to_string()));
        }
        Ok((total as i128).wrapping_neg() as i64)
    } else {
        i64::try_from(total).map_err(|_| DurationError::Overflow(input.to_string()))
    }
}

/// Render nanoseconds the way Go's `time.Duration.String` does.
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    if nanos < 0 {
        out.push('-');
    }
    let value = nanos.unsigned_abs();

    if value < SECOND {
        let (divisor, unit) = if value < MICROSECOND {
            (NANOSECOND, "ns")
        } else if value < MILLISECOND {
            (MICROSECOND, "µs")
        } else {
            (MILLISECOND, "ms")
        };
        out.push_str(&format_fraction(value, divisor));
        out.push_str(unit);
        return out;
    }

    let hours = value / HOUR;
    let minutes = (value % HOUR) / MINUTE;
    let seconds = value % MINUTE;

    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    out.push_str(&format_fraction(seconds, SECOND));
    out.push('s');
    out
}

fn format_fraction(value: u64, divisor: u64) -> String {
    let whole = value / divisor;
    let frac = value % divisor;
    if frac == 0 {
        return whole.to_string();
    }
    let width = divisor.ilog10() as usize;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
