// Ships one cycle's payload to the collector in a single POST.

use std::time::Duration;

use tracing::{info, instrument};

use crate::error::TransportError;
use crate::models::Payload;

pub struct Transport {
    endpoint: String,
    client: reqwest::Client,
}

impl Transport {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::version::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POSTs every container's records as one JSON document. No retries: a
    /// non-2xx answer or a timeout loses this cycle's data.
    #[instrument(skip(self, payload), fields(endpoint = %self.endpoint, containers = payload.len()))]
    pub async fn send(&self, payload: &Payload) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status { status });
        }
        info!("sent data to collector");
        Ok(())
    }
}
