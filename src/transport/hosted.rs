//! Hosted messaging gateway transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald::transport::HostedGateway;
//!
//! let gateway = HostedGateway::new();
//! let transport = gateway.for_account(&account);
//! let outcome = transport.attempt("201234567890", "Hello").await;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::account::{Account, Credential};
use crate::error::TransportError;

use super::{Outcome, Transport};

const GATEWAY_URL: &str = "https://graph.facebook.com";
const GATEWAY_VERSION: &str = "v17.0";
const PRODUCT_TAG: &str = "whatsapp";

/// Bound on one gateway request.
pub const HOSTED_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared gateway settings and HTTP client.
///
/// One gateway serves every account; [`for_account`](Self::for_account)
/// binds it to a credential.
#[derive(Debug, Clone)]
pub struct HostedGateway {
    client: Client,
    base_url: String,
    version: String,
    product: String,
    timeout: Duration,
}

impl HostedGateway {
    /// Gateway with the default host, version and product tag.
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: GATEWAY_URL.to_string(),
            version: GATEWAY_VERSION.to_string(),
            product: PRODUCT_TAG.to_string(),
            timeout: HOSTED_TIMEOUT,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API version path segment.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the `messaging_product` tag sent in every envelope.
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    /// Override the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind the gateway to an account's credential.
    pub fn for_account(&self, account: &Account) -> HostedTransport {
        HostedTransport {
            gateway: self.clone(),
            credential: account.credential.clone(),
        }
    }

    fn messages_url(&self, endpoint_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.version,
            endpoint_id
        )
    }
}

impl Default for HostedGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway transport bound to one account.
#[derive(Debug, Clone)]
pub struct HostedTransport {
    gateway: HostedGateway,
    credential: Option<Credential>,
}

impl HostedTransport {
    async fn send(&self, destination: &str, message: &str) -> Result<Option<String>, TransportError> {
        let credential = self
            .credential
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or(TransportError::MissingCredentials)?;

        let request = HostedRequest {
            messaging_product: &self.gateway.product,
            to: destination,
            kind: "text",
            text: HostedText { body: message },
        };

        let url = self.gateway.messages_url(&credential.endpoint_id);
        let response = self
            .gateway
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", credential.token))
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("herald/{}", crate::VERSION))
            .timeout(self.gateway.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            // The reference is informational; an unexpected body still counts as sent.
            let reference = response
                .json::<HostedResponse>()
                .await
                .ok()
                .and_then(|r| r.messages.into_iter().next())
                .map(|m| m.id);
            Ok(reference)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Transport for HostedTransport {
    async fn attempt(&self, destination: &str, message: &str) -> Outcome {
        self.send(destination, message).await.into()
    }

    fn name(&self) -> &'static str {
        "hosted"
    }
}

// ============================================================================
// Gateway API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HostedRequest<'a> {
    messaging_product: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: HostedText<'a>,
}

#[derive(Debug, Serialize)]
struct HostedText<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct HostedResponse {
    #[serde(default)]
    messages: Vec<HostedMessage>,
}

#[derive(Debug, Deserialize)]
struct HostedMessage {
    id: String,
}
