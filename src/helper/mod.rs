//! Shared converters and utilities used by resource adapters.

pub mod bytes;
pub mod duration;
pub mod retry;

pub use bytes::{humanize_bytes, parse_bytes};
pub use duration::{format_duration, parse_duration};
pub use retry::RetryPolicy;

use std::collections::HashMap;

/// Drop empty strings from a list, keeping order.
pub fn non_empty(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.is_empty()).cloned().collect()
}

/// Return `None` for an empty string.
pub fn opt_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Return `None` for an empty map.
pub fn opt_map(map: &HashMap<String, String>) -> Option<HashMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map.clone())
    }
}

/// Parse an optional Go duration string, treating `""` as unset.
pub fn parse_opt_duration(
    attribute: &str,
    value: &str,
) -> Result<Option<i64>, crate::ProviderError> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_duration(value).map(Some).map_err(|e| {
        crate::ProviderError::Validation(format!("invalid duration for {}: {}", attribute, e))
    })
}

/// Format optional nanoseconds as a Go duration string, `""` when unset.
pub fn format_opt_duration(nanos: Option<i64>) -> String {
    nanos.map(format_duration).unwrap_or_default()
}

/// Like [`format_opt_duration`], but keep the configured spelling (`"24h"`
/// rather than `"24h0m0s"`) when it denotes the same duration.
pub fn flatten_duration(nanos: Option<i64>, prior: &str) -> String {
    match (nanos, parse_duration(prior)) {
        (Some(nanos), Ok(parsed)) if nanos == parsed => prior.to_string(),
        (nanos, _) => format_opt_duration(nanos),
    }
}
