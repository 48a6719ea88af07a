//! HTTP validator talking to the purchase validation backend.

use std::time::Duration;

use async_trait::async_trait;
use iapkit_core::{PurchaseRecord, ValidationVerdict};

use crate::config::ValidatorConfig;
use crate::error::ValidationError;
use crate::validator::Validator;
use crate::wire::{ValidationRequest, ValidationResponse};

/// Posts purchase evidence to the backend and interprets its `ack`.
///
/// One request per purchase, no retries: a purchase that cannot be validated
/// stays unacknowledged and the store redelivers it on a later connect.
#[derive(Debug, Clone)]
pub struct HttpValidator {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpValidator {
    pub fn new(config: &ValidatorConfig) -> Result<Self, ValidationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ValidationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url(),
            token: config.token.clone(),
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Validator for HttpValidator {
    async fn validate(
        &self,
        purchase: &PurchaseRecord,
    ) -> Result<ValidationVerdict, ValidationError> {
        let body = ValidationRequest::for_purchase(purchase);
        tracing::debug!(
            platform = %purchase.platform(),
            product_id = %purchase.product_id(),
            transaction_id = %purchase.transaction_id(),
            "validating purchase"
        );

        let mut req = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ValidationError::Timeout(self.timeout)
            } else {
                ValidationError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(ValidationError::Api(status.as_u16(), error_text));
        }

        let response: ValidationResponse = resp
            .json()
            .await
            .map_err(|e| ValidationError::Parse(format!("invalid validation response: {e}")))?;

        if !response.is_success() {
            tracing::info!(
                transaction_id = %purchase.transaction_id(),
                ack = %response.ack,
                "backend rejected purchase"
            );
        }

        Ok(response.into_verdict(purchase.product_id()))
    }
}
