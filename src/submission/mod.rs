//! Sending finished check-ins to the remote ledger. [Submitter] is the seam the wizard talks to,
//! [http::HttpSubmissionClient] is the real implementation.

pub mod http;
pub mod retry;

use std::future::Future;

use thiserror::Error;

use crate::wizard::record::CheckinRecord;

pub const GENERIC_FAILURE: &str = "Something went wrong";
pub const REJECTED_FAILURE: &str = "Submission failed";

/// Outcome of a single submission attempt as seen by the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Success { streak: Option<u32> },
    Failure { message: String },
}

impl From<Result<Option<u32>, SubmissionError>> for SubmissionResult {
    fn from(value: Result<Option<u32>, SubmissionError>) -> Self {
        match value {
            Ok(streak) => SubmissionResult::Success { streak },
            Err(e) => SubmissionResult::Failure {
                message: e.user_message(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// No response was obtained.
    #[error("request to the ledger failed: {0}")]
    Network(#[from] reqwest::Error),
    /// A response arrived but its body isn't a JSON object.
    #[error("ledger response isn't valid: {0}")]
    Parse(String),
    /// The ledger answered with a status other than `success`.
    #[error("ledger rejected the check-in: {}", .message.as_deref().unwrap_or(REJECTED_FAILURE))]
    Protocol { message: Option<String> },
}

impl SubmissionError {
    /// Message shown on the review screen. Transport and parse failures share the generic text.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Network(_) | SubmissionError::Parse(_) => GENERIC_FAILURE.into(),
            SubmissionError::Protocol { message } => message
                .clone()
                .unwrap_or_else(|| REJECTED_FAILURE.into()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SubmissionError::Network(_))
    }
}

/// Sends one record and reports how it went. Implementations never keep the record.
pub trait Submitter {
    fn submit(&self, record: &CheckinRecord) -> impl Future<Output = SubmissionResult>;
}

#[cfg(test)]
mod tests {
    use super::{SubmissionError, SubmissionResult, GENERIC_FAILURE};

    #[test]
    fn protocol_errors_keep_ledger_message() {
        let result = SubmissionResult::from(Err(SubmissionError::Protocol {
            message: Some("Duplicate entry".into()),
        }));
        assert_eq!(
            result,
            SubmissionResult::Failure {
                message: "Duplicate entry".into()
            }
        );

        let result = SubmissionResult::from(Err(SubmissionError::Protocol { message: None }));
        assert_eq!(
            result,
            SubmissionResult::Failure {
                message: "Submission failed".into()
            }
        );
    }

    #[test]
    fn parse_errors_use_generic_message() {
        let error = SubmissionError::Parse("expected value at line 1".into());
        assert_eq!(error.user_message(), GENERIC_FAILURE);
        assert!(!error.is_transient());
    }
}
