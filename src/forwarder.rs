use reqwest::{header::CONTENT_TYPE, Client};

use crate::error::ForwardError;

/// Posts encoded log records to the document store, one request per record
#[derive(Debug, Clone)]
pub struct LogForwarder {
    client: Client,
    endpoint: String,
}

impl LogForwarder {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one JSON-encoded record
    ///
    /// Succeeds only if the store answered with a status below 400. No retries and no
    /// timeout beyond the client's own.
    pub async fn forward(&self, payload: Vec<u8>) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            tracing::debug!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Document store rejected log record"
            );
            return Err(ForwardError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
