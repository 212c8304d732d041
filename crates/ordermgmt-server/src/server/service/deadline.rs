use core::time::Duration;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Resolves the lifetime of a streaming call.
///
/// The client deadline comes from the `grpc-timeout` header; the server cap
/// comes from configuration. The shorter of the two wins, and `None` means
/// the call is unbounded.
pub fn effective_deadline(metadata: &MetadataMap, cap: Option<Duration>) -> Option<Duration> {
    let requested = metadata
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_grpc_timeout);

    match (requested, cap) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Parses a `grpc-timeout` value: at most 8 digits followed by a unit.
///
/// Malformed values yield `None` and are ignored.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let mut chars = value.chars();
    let unit = chars.next_back()?;
    let digits = chars.as_str();
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        'H' => Duration::from_secs(amount * 60 * 60),
        'M' => Duration::from_secs(amount * 60),
        'S' => Duration::from_secs(amount),
        'm' => Duration::from_millis(amount),
        'u' => Duration::from_micros(amount),
        'n' => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}
