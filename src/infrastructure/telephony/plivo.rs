//! Plivo implementation of the telephony gateway

use super::{OutboundCallRequest, TelephonyGateway};
use crate::config::TelephonyConfig;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Serialize)]
struct CreateCallBody<'a> {
    from: &'a str,
    to: &'a str,
    answer_url: &'a str,
    hangup_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateCallResponse {
    request_uuid: Option<String>,
}

/// Plivo REST gateway
pub struct PlivoGateway {
    client: Client,
    config: TelephonyConfig,
}

impl PlivoGateway {
    pub fn new(config: TelephonyConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }
}

#[async_trait::async_trait]
impl TelephonyGateway for PlivoGateway {
    async fn place_call(&self, request: &OutboundCallRequest) -> Result<String> {
        let (auth_id, auth_token) = match (&self.config.auth_id, &self.config.auth_token) {
            (Some(id), Some(token)) => (id, token),
            _ => {
                return Err(DomainError::Gateway(
                    "Plivo credentials not configured".to_string(),
                ))
            }
        };

        let url = format!(
            "{}/Account/{}/Call/",
            self.config.api_root.trim_end_matches('/'),
            auth_id
        );

        debug!("Placing outbound call {} -> {}", request.from_number, request.to_number);

        let response = self
            .client
            .post(&url)
            .basic_auth(auth_id, Some(auth_token))
            .json(&CreateCallBody {
                from: &request.from_number,
                to: &request.to_number,
                answer_url: &request.answer_url,
                hangup_url: &request.hangup_url,
            })
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("Plivo request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() != 201 {
            let body = response.text().await.unwrap_or_default();
            error!("Plivo rejected call request: {} {}", status, body);
            return Err(DomainError::Gateway(format!("Plivo API error: {}", body)));
        }

        let body: CreateCallResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Gateway(format!("Invalid Plivo response: {}", e)))?;

        let request_uuid = body.request_uuid.ok_or_else(|| {
            DomainError::Gateway("Plivo response missing request_uuid".to_string())
        })?;

        info!("Plivo accepted call request: {}", request_uuid);
        Ok(request_uuid)
    }
}
