// src/dispatch/push.rs

//! Push delivery channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::error::Result;
use crate::models::PushConfig;
use crate::utils::http;

/// Provider response to one delivery call.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PushReceipt {
    #[serde(default)]
    pub success: u32,

    #[serde(default)]
    pub failure: u32,
}

/// Trait for push delivery backends.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Deliver one notification to a device token.
    async fn send(&self, token: &str, title: &str, body: &str, data: &Value)
    -> Result<PushReceipt>;
}

/// FCM-style HTTP push channel.
pub struct FcmChannel {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl FcmChannel {
    /// Create a channel from push configuration.
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = http::create_client("lawinenwacht-push/1.0", config.timeout_secs)?;
        let endpoint = Url::parse(&config.endpoint)?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PushChannel for FcmChannel {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &Value,
    ) -> Result<PushReceipt> {
        let payload = json!({
            "to": token,
            "notification": {
                "title": title,
                "body": body,
            },
            "data": data,
            "priority": "high",
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", format!("key={}", self.api_key))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let receipt: PushReceipt = response.json().await?;
        log::debug!(
            "Push delivery receipt: success={} failure={}",
            receipt.success,
            receipt.failure
        );
        Ok(receipt)
    }
}
