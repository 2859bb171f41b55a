//! Lenient scalar coercions for server payloads.
//!
//! The backend is loose about types: ids arrive as numbers or strings, missing
//! text arrives as `null`, `"null"` or `"<null>"`. Every helper here falls back
//! to a safe default instead of failing.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    format_description::well_known::Rfc3339, macros::format_description,
};

/// Timestamp layout used by the backend for every date field.
pub const SERVER_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Coerce a JSON value into an integer, defaulting to `0`.
///
/// Fractional numbers are truncated; strings are trimmed and parsed.
pub fn int_value(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or(0),
        Value::String(text) => int_string(text),
        Value::Bool(flag) => i64::from(*flag),
        _ => 0,
    }
}

/// Parse an integer out of a string, defaulting to `0` for anything non-numeric.
pub fn int_string(text: &str) -> i64 {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(|float| float as i64))
        .unwrap_or(0)
}

/// Coerce a JSON value into a float, defaulting to `0.0`.
pub fn double_value(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coerce a JSON value into text; null-ish markers become an empty string.
pub fn string_value(value: &Value) -> String {
    match value {
        Value::String(text) if is_null_marker(text) => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

/// Coerce a JSON value into a flag: non-zero numbers and `"true"` are set.
pub fn bool_value(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) if text.trim().eq_ignore_ascii_case("true") => true,
        other => int_value(other) != 0,
    }
}

/// Parse a server timestamp, defaulting to the Unix epoch.
pub fn date_value(value: &Value) -> Timestamp {
    match value {
        Value::String(text) => Timestamp::parse_server(text).unwrap_or_default(),
        _ => Timestamp::default(),
    }
}

fn is_null_marker(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == "null" || trimmed == "<null>"
}

/// UTC instant stored on cached rows.
///
/// Defaults to the Unix epoch, the value used for blank rows and unparsable
/// server dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Wrap an existing instant.
    pub fn new(instant: OffsetDateTime) -> Self {
        Self(instant)
    }

    /// Current wall clock time.
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parse `YYYY-MM-DD HH:MM:SS` as UTC.
    pub fn parse_server(text: &str) -> Option<Self> {
        PrimitiveDateTime::parse(text.trim(), SERVER_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| Self(naive.assume_utc()))
    }

    /// Render in the backend's timestamp layout.
    pub fn to_server_string(&self) -> String {
        self.0
            .format(SERVER_TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| "1970-01-01 00:00:00".into())
    }

    /// Underlying instant.
    pub fn instant(&self) -> OffsetDateTime {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(OffsetDateTime::UNIX_EPOCH)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_server_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}
