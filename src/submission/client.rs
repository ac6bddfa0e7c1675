use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use crate::error::{IntakeError, Result};

/// Status the workflow engine returns for requests it has accepted anyway
pub const DEFAULT_SOFT_SUCCESS_STATUS: u16 = 500;

/// How a delivered request was received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted(u16),
    /// Tolerated non-2xx status
    SoftAccepted(u16),
}

impl Delivery {
    pub fn status(&self) -> u16 {
        match self {
            Delivery::Accepted(s) | Delivery::SoftAccepted(s) => *s,
        }
    }
}

/// Posts multipart payloads to workflow webhooks
///
/// No retries and no client-side timeout: a failure is whatever the network
/// stack reports.
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    soft_success_status: u16,
}

impl WebhookClient {
    pub fn new(client: Client, soft_success_status: u16) -> Self {
        Self {
            client,
            soft_success_status,
        }
    }

    /// Classify a response status
    pub fn classify(&self, status: StatusCode) -> Option<Delivery> {
        if status.is_success() {
            Some(Delivery::Accepted(status.as_u16()))
        } else if status.as_u16() == self.soft_success_status {
            Some(Delivery::SoftAccepted(status.as_u16()))
        } else {
            None
        }
    }

    /// Post a prebuilt form. Build forms with `SubmissionPayload::to_form`
    /// before dispatching so malformed parts never reach the network.
    pub async fn post(&self, endpoint: &str, form: Form) -> Result<Delivery> {
        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IntakeError::DeliveryFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        match self.classify(status) {
            Some(delivery) => {
                if let Delivery::SoftAccepted(code) = delivery {
                    warn!(endpoint, status = code, "delivery soft-accepted");
                } else {
                    info!(endpoint, status = status.as_u16(), "delivery accepted");
                }
                Ok(delivery)
            }
            None => {
                warn!(endpoint, status = status.as_u16(), "delivery rejected");
                Err(IntakeError::DeliveryFailed {
                    endpoint: endpoint.to_string(),
                    reason: format!("HTTP {}", status),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let client = WebhookClient::new(Client::new(), DEFAULT_SOFT_SUCCESS_STATUS);

        assert_eq!(client.classify(StatusCode::OK), Some(Delivery::Accepted(200)));
        assert_eq!(client.classify(StatusCode::NO_CONTENT), Some(Delivery::Accepted(204)));
        assert_eq!(
            client.classify(StatusCode::INTERNAL_SERVER_ERROR),
            Some(Delivery::SoftAccepted(500))
        );
        assert_eq!(client.classify(StatusCode::SERVICE_UNAVAILABLE), None);
        assert_eq!(client.classify(StatusCode::NOT_FOUND), None);
    }
}
