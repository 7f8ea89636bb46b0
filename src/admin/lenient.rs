//! Forgiving field decoders for list records
//!
//! One odd field in one record must not fail the whole page. These read
//! numbers sent as strings, enums in any case, and fall back to `None`
//! (or zero) for values that do not parse.

use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `Option<T>` from a number, a numeric string, or anything else as `None`
pub(crate) fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        Some(Value::Bool(b)) => b.to_string().parse().ok(),
        _ => None,
    })
}

/// Like `optional`, defaulting to zero
pub(crate) fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional::<D, f64>(deserializer)?.unwrap_or_default())
}
