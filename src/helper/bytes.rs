//! Human-readable byte sizes.
//!
//! Volume capacities are configured as strings such as `"10GiB"` or
//! `"500 MB"` and sent to Nomad as byte counts. Parsing follows go-humanize's
//! `ParseBytes` (SI and IEC suffixes, case-insensitive, optional space,
//! thousands separators); formatting follows `IBytes` (`"10 GiB"`).

use thiserror::Error;

/// Errors returned by [`parse_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ByteSizeError {
    /// The numeric part could not be parsed.
    #[error("invalid byte size {0:?}")]
    InvalidNumber(String),
    /// The suffix is not a known unit.
    #[error("unhandled size name: {0}")]
    UnknownUnit(String),
    /// The value does not fit in a u64.
    #[error("too large: {0}")]
    TooLarge(String),
}

const IEC_SIZES: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

fn unit_multiplier(unit: &str) -> Option<u64> {
    const KIB: u64 = 1 << 10;
    const KB: u64 = 1_000;
    let m = match unit {
        "" | "b" => 1,
        "kib" | "ki" => KIB,
        "kb" | "k" => KB,
        "mib" | "mi" => KIB.pow(2),
        "mb" | "m" => KB.pow(2),
        "gib" | "gi" => KIB.pow(3),
        "gb" | "g" => KB.pow(3),
        "tib" | "ti" => KIB.pow(4),
        "tb" | "t" => KB.pow(4),
        "pib" | "pi" => KIB.pow(5),
        "pb" | "p" => KB.pow(5),
        "eib" | "ei" => KIB.pow(6),
        "eb" | "e" => KB.pow(6),
        _ => return None,
    };
    Some(m)
}

/// Parse a human-readable size into bytes.
pub fn parse_bytes(input: &str) -> Result<u64, ByteSizeError> {
    let number_len = input
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == ','))
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number: String = input[..number_len].chars().filter(|c| *c != ',').collect();
    let value: f64 = number
        .parse()
        .map_err(|_| ByteSizeError::InvalidNumber(input.to_string()))?;

    let unit = input[number_len..].trim().to_lowercase();
    let multiplier =
        unit_multiplier(&unit).ok_or_else(|| ByteSizeError::UnknownUnit(unit.clone()))?;

    let bytes = value * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        return Err(ByteSizeError::TooLarge(input.to_string()));
    }
    Ok(bytes as u64)
}

/// Format bytes with IEC units, rounded to one decimal place below 10.
pub fn humanize_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{} B", bytes);
    }
    let base = 1024_f64;
    let exponent = ((bytes as f64).ln() / base.ln()).floor();
    let suffix = IEC_SIZES[(exponent as usize).min(IEC_SIZES.len() - 1)];
    let value = ((bytes as f64) / base.powf(exponent) * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{:.1} {}", value, suffix)
    } else {
        format!("{:.0} {}", value, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10GiB", 10_737_418_240)]
    #[case("10 GiB", 10_737_418_240)]
    #[case("10gib", 10_737_418_240)]
    #[case("1GB", 1_000_000_000)]
    #[case("1G", 1_000_000_000)]
    #[case("512MiB", 536_870_912)]
    #[case("1.5 KiB", 1_536)]
    #[case("1,024", 1_024)]
    #[case("42", 42)]
    #[case("42 B", 42)]
    fn test_parse_bytes(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_bytes(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_bytes_errors() {
        assert!(matches!(
            parse_bytes("ten GiB"),
            Err(ByteSizeError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_bytes("10 parsecs"),
            Err(ByteSizeError::UnknownUnit(_))
        ));
        assert!(matches!(
            parse_bytes("99999999 EiB"),
            Err(ByteSizeError::TooLarge(_))
        ));
    }

    #[rstest]
    #[case(0, "0 B")]
    #[case(9, "9 B")]
    #[case(1_024, "1.0 KiB")]
    #[case(1_536, "1.5 KiB")]
    #[case(536_870_912, "512 MiB")]
    #[case(10_737_418_240, "10 GiB")]
    fn test_humanize_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(humanize_bytes(bytes), expected);
    }

    #[test]
    fn test_capacity_round_trip() {
        let bytes = parse_bytes("10GiB").unwrap();
        assert_eq!(bytes, 10_737_418_240);
        assert_eq!(humanize_bytes(bytes), "10 GiB");
        assert_eq!(parse_bytes(&humanize_bytes(bytes)).unwrap(), bytes);
    }
}
