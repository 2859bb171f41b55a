use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::PersistenceError, dto::validation::first_message};

/// Message shown when a failure carries nothing more specific.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
/// Banner title used for every failure.
pub const DEFAULT_ERROR_TITLE: &str = "Oops!";
/// Banner title used for successful operations.
pub const DEFAULT_SUCCESS_TITLE: &str = "Success";

/// Errors produced by a data manager operation, from local validation to the
/// server rejecting the request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("{0}")]
    Transport(#[source] reqwest::Error),
    /// The server answered with an empty body.
    #[error("empty response body")]
    EmptyBody,
    /// The body is not JSON.
    #[error("response is not valid JSON")]
    Decode(#[source] serde_json::Error),
    /// The body lacks a required top-level key.
    #[error("response is missing `{0}`")]
    MissingKeys(&'static str),
    /// The server reported a business failure (`status != 0`).
    #[error("{0}")]
    Rejected(String),
    /// Updating the local cache failed.
    #[error("local cache update failed")]
    Persistence(#[from] PersistenceError),
    /// Local form validation failed before sending.
    #[error("{0}")]
    Validation(String),
    /// A route template was filled with the wrong number of ids.
    #[error("route `{template}` expects {expected} ids, got {actual}")]
    Route {
        /// Template that was filled.
        template: &'static str,
        /// Placeholders in the template.
        expected: usize,
        /// Ids supplied.
        actual: usize,
    },
    /// The operation needs a signed-in account.
    #[error("Please log in first")]
    SignedOut,
    /// A staged attachment could not be read from disk.
    #[error("failed to read attachment `{path}`")]
    Attachment {
        /// Local path of the attachment.
        path: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// A staged attachment carries a MIME type the multipart encoder rejects.
    #[error("invalid attachment type `{mime}`")]
    AttachmentType {
        /// MIME type that was rejected.
        mime: String,
        /// Underlying failure.
        #[source]
        source: reqwest::Error,
    },
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::Validation(first_message(&err))
    }
}

impl ApiError {
    /// Uniform status payload for the flash banner.
    pub fn report(&self) -> StatusReport {
        let message = match self {
            ApiError::Transport(_)
            | ApiError::Rejected(_)
            | ApiError::Validation(_)
            | ApiError::SignedOut => self.to_string(),
            _ => DEFAULT_ERROR_MESSAGE.to_string(),
        };
        StatusReport {
            status: 1,
            title: DEFAULT_ERROR_TITLE.into(),
            message,
            count: None,
        }
    }
}

/// Result of a successful data manager operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Message returned by the server.
    pub message: String,
    /// Rows written to the local cache, `0` for write endpoints.
    pub count: usize,
}

impl Outcome {
    /// Uniform status payload for the flash banner.
    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: 0,
            title: DEFAULT_SUCCESS_TITLE.into(),
            message: self.message.clone(),
            count: Some(self.count),
        }
    }
}

/// `{status, message}` payload handed to presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// `0` on success, `1` on failure.
    pub status: u8,
    /// Banner title.
    pub title: String,
    /// Banner body.
    pub message: String,
    /// Rows cached by a listing refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl From<&Result<Outcome, ApiError>> for StatusReport {
    fn from(result: &Result<Outcome, ApiError>) -> Self {
        match result {
            Ok(outcome) => outcome.report(),
            Err(err) => err.report(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_and_validation_keep_their_message() {
        let report = ApiError::Rejected("Username already taken".into()).report();
        assert_eq!(report.status, 1);
        assert_eq!(report.message, "Username already taken");

        let report = ApiError::Validation("Passwords do not match".into()).report();
        assert_eq!(report.message, "Passwords do not match");
    }

    #[test]
    fn other_failures_use_default_message() {
        assert_eq!(ApiError::EmptyBody.report().message, DEFAULT_ERROR_MESSAGE);
        assert_eq!(
            ApiError::MissingKeys("status").report().message,
            DEFAULT_ERROR_MESSAGE
        );
    }

    #[test]
    fn outcome_reports_success() {
        let result: Result<Outcome, ApiError> = Ok(Outcome {
            message: "Courses retrieved".into(),
            count: 3,
        });
        let report = StatusReport::from(&result);
        assert_eq!(report.status, 0);
        assert_eq!(report.count, Some(3));
    }
}
