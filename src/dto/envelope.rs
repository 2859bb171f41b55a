use serde_json::{Map, Value};

use crate::{
    dto::parse::string_value,
    error::ApiError,
};

/// Top-level `{status, message, data}` object every endpoint answers with.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `0` on success; anything else is a business failure.
    pub status: i64,
    /// Human readable outcome from the server.
    pub message: String,
    /// Endpoint specific payload, `Null` when absent.
    pub data: Value,
}

impl Envelope {
    /// Decode a response body, enforcing the required keys.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::EmptyBody);
        }

        let value: Value = serde_json::from_slice(body).map_err(ApiError::Decode)?;
        let Value::Object(mut object) = value else {
            return Err(ApiError::MissingKeys("status"));
        };

        let status = status_code(&take_required(&mut object, "status")?)
            .ok_or(ApiError::MissingKeys("status"))?;
        let message = take_required(&mut object, "message")?;
        Ok(Self {
            status,
            message: string_value(&message),
            data: object.remove("data").unwrap_or(Value::Null),
        })
    }

    /// `status == 0`.
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Turn a business failure into an error, keeping successes.
    pub fn into_success(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Rejected(self.message))
        }
    }
}

fn take_required(object: &mut Map<String, Value>, key: &'static str) -> Result<Value, ApiError> {
    match object.remove(key) {
        Some(Value::Null) | None => Err(ApiError::MissingKeys(key)),
        Some(value) => Ok(value),
    }
}

/// The status must be an integer, either as a number or a numeric string.
fn status_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_envelope() {
        let envelope =
            Envelope::parse(br#"{"status": 0, "message": "ok", "data": [1, 2]}"#).unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.data, serde_json::json!([1, 2]));
    }

    #[test]
    fn string_status_is_coerced() {
        let envelope = Envelope::parse(br#"{"status": "1", "message": "denied"}"#).unwrap();
        assert_eq!(envelope.status, 1);
        assert_eq!(envelope.data, Value::Null);
        assert!(matches!(
            envelope.into_success(),
            Err(ApiError::Rejected(message)) if message == "denied"
        ));
    }

    #[test]
    fn non_numeric_status_is_not_success() {
        for body in [
            &br#"{"status": "error", "message": "Server failure"}"#[..],
            br#"{"status": true, "message": "ok"}"#,
            br#"{"status": 0.5, "message": "ok"}"#,
            br#"{"status": "", "message": "ok"}"#,
        ] {
            assert!(matches!(
                Envelope::parse(body),
                Err(ApiError::MissingKeys("status"))
            ));
        }
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(Envelope::parse(b""), Err(ApiError::EmptyBody)));
        assert!(matches!(Envelope::parse(b"  \n"), Err(ApiError::EmptyBody)));
        assert!(matches!(
            Envelope::parse(b"<html>"),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(
            Envelope::parse(br#"{"message": "ok"}"#),
            Err(ApiError::MissingKeys("status"))
        ));
        assert!(matches!(
            Envelope::parse(br#"{"status": 0}"#),
            Err(ApiError::MissingKeys("message"))
        ));
        assert!(matches!(
            Envelope::parse(b"[0]"),
            Err(ApiError::MissingKeys("status"))
        ));
    }
}
