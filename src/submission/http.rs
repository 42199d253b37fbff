use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::{config::SubmissionSettings, utils::clock::Clock, wizard::record::CheckinRecord};

use super::{retry::RetryPolicy, SubmissionError, SubmissionResult, Submitter};

/// Posts check-ins to the ledger endpoint. The endpoint is passed in at construction so nothing
/// in here depends on process-wide state.
pub struct HttpSubmissionClient {
    endpoint: Url,
    client: Client,
    retry: RetryPolicy,
    clock: Box<dyn Clock>,
}

impl HttpSubmissionClient {
    pub fn new(
        endpoint: Url,
        settings: &SubmissionSettings,
        clock: Box<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder =
            Client::builder().user_agent(format!("dalos/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            endpoint,
            client: builder.build()?,
            retry: settings.retry,
            clock,
        })
    }

    async fn send_once(&self, record: &CheckinRecord) -> Result<Option<u32>, SubmissionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(record)
            .send()
            .await?;
        // The status line is not consulted, the body alone decides.
        debug!("Ledger answered with {}", response.status());
        let body = response.text().await?;
        parse_ledger_response(&body)
    }
}

/// Interprets a ledger response body. Returns the streak on success.
pub fn parse_ledger_response(body: &str) -> Result<Option<u32>, SubmissionError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SubmissionError::Parse(e.to_string()))?;
    let Some(fields) = value.as_object() else {
        return Err(SubmissionError::Parse(format!(
            "expected an object, got {value}"
        )));
    };

    if fields.get("status").and_then(Value::as_str) != Some("success") {
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_owned);
        return Err(SubmissionError::Protocol { message });
    }

    Ok(fields
        .get("streak")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok()))
}

impl Submitter for HttpSubmissionClient {
    async fn submit(&self, record: &CheckinRecord) -> SubmissionResult {
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            let span = info_span!("Submitting check-in", attempt, date = %record.date);
            match self.send_once(record).instrument(span).await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!("Submission attempt failed, retrying in {delay:?}: {e}");
                    self.clock.sleep(delay).await;
                }
                result => {
                    if let Err(e) = &result {
                        error!("Submission failed after {attempt} attempt(s): {e:?}");
                    }
                    return result.into();
                }
            }
        }
    }
}
