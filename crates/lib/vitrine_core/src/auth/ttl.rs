//! Token lifetime strings such as `"15m"` or `"7d"`.

use chrono::Duration;
use thiserror::Error;

/// A TTL string that cannot be used as a token lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TtlError {
    #[error("invalid duration '{0}': expected <digits><ms|s|m|h|d>")]
    Unparsable(String),

    #[error("duration '{0}' must be greater than zero")]
    Zero(String),
}

/// Parse `<digits><unit>` with unit one of `ms`, `s`, `m`, `h`, `d`.
///
/// Anything else (whitespace, signs, fractions, unknown units) is rejected,
/// as is a zero duration.
pub fn parse_ttl(raw: &str) -> Result<Duration, TtlError> {
    let unparsable = || TtlError::Unparsable(raw.to_string());

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(unparsable)?;
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        return Err(unparsable());
    }
    let n: i64 = digits.parse().map_err(|_| unparsable())?;

    let millis_per_unit: i64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(unparsable()),
    };

    let millis = n.checked_mul(millis_per_unit).ok_or_else(unparsable)?;
    if millis == 0 {
        return Err(TtlError::Zero(raw.to_string()));
    }
    Ok(Duration::milliseconds(millis))
}
