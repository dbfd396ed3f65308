//! Client for the upstream payment gateway.
//!
//! The gateway exposes three operations: an OAuth token endpoint
//! (client-credentials grant), order creation, and order status lookup.
//! This crate maps requests and responses only; retry policy and token
//! caching belong to the engine.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

pub mod mock;

/// Errors surfaced by gateway calls.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("gateway response missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// A bearer credential issued by the gateway's OAuth endpoint.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds from issuance.
    pub expires_in: i64,
}

/// Parameters for creating a gateway order.
#[derive(Clone, Debug)]
pub struct OrderRequest {
    /// Caller-generated unique reference; doubles as idempotency key.
    pub merchant_order_id: String,
    /// Amount in the gateway's minor currency unit.
    pub amount_minor: i64,
    pub merchant_user_id: String,
}

/// A successfully created gateway order.
#[derive(Clone, Debug)]
pub struct OrderCreated {
    pub order_id: String,
    pub order_token: String,
    /// Full response body, kept for audit.
    pub raw: serde_json::Value,
}

/// Authoritative order status as reported by the gateway.
#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    /// Raw upstream status string (e.g. `SUCCESS`, `FAILURE`).
    pub status: String,
    /// Full response body, kept for audit.
    pub raw: serde_json::Value,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetch a fresh bearer token with the configured client credentials.
    async fn fetch_token(&self) -> Result<IssuedToken, GatewayError>;

    /// Create an order. Fails on non-2xx or a response missing required
    /// fields. Not safely retriable without checking for an existing
    /// merchant reference first.
    async fn create_order(
        &self,
        request: &OrderRequest,
        token: &str,
    ) -> Result<OrderCreated, GatewayError>;

    /// Fetch the current status of an order. Read-only, safe to retry.
    async fn fetch_status(&self, order_id: &str, token: &str)
    -> Result<StatusSnapshot, GatewayError>;
}

/// Configuration for the HTTP gateway client.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the gateway API (sandbox or production host).
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// URL the gateway calls back with payment results.
    pub callback_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

/// `reqwest`-backed gateway client.
#[derive(Debug)]
pub struct HttpGateway {
    base_url: Url,
    client_id: String,
    client_secret: String,
    callback_url: String,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| GatewayError::InvalidUrl(err.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::InvalidUrl(err.to_string()))
    }
}

async fn failed(res: reqwest::Response) -> GatewayError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_else(|_| "unknown error".to_string());
    GatewayError::RequestFailed { status, body }
}

#[async_trait::async_trait]
impl PaymentGateway for HttpGateway {
    async fn fetch_token(&self) -> Result<IssuedToken, GatewayError> {
        let endpoint = self.endpoint("v1/oauth/token")?;
        let res = self
            .http
            .post(endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("client_version", "1"),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(failed(res).await);
        }

        let body: TokenBody = res.json().await?;
        Ok(IssuedToken {
            access_token: body
                .access_token
                .ok_or(GatewayError::MissingField("access_token"))?,
            token_type: body.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: body.expires_in.ok_or(GatewayError::MissingField("expires_in"))?,
        })
    }

    async fn create_order(
        &self,
        request: &OrderRequest,
        token: &str,
    ) -> Result<OrderCreated, GatewayError> {
        let endpoint = self.endpoint("checkout/v2/sdk/order")?;
        let payload = serde_json::json!({
            "merchantOrderId": request.merchant_order_id,
            "amount": request.amount_minor,
            "paymentFlow": { "type": "PG_CHECKOUT" },
            "merchantUserId": request.merchant_user_id,
            "callbackUrl": self.callback_url,
        });

        let res = self
            .http
            .post(endpoint)
            .header("Authorization", format!("O-Bearer {token}"))
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(failed(res).await);
        }

        let raw: serde_json::Value = res.json().await?;
        let order_id = raw
            .get("orderId")
            .and_then(|v| v.as_str())
            .ok_or(GatewayError::MissingField("orderId"))?
            .to_string();
        let order_token = raw
            .get("token")
            .and_then(|v| v.as_str())
            .ok_or(GatewayError::MissingField("token"))?
            .to_string();

        Ok(OrderCreated {
            order_id,
            order_token,
            raw,
        })
    }

    async fn fetch_status(
        &self,
        order_id: &str,
        token: &str,
    ) -> Result<StatusSnapshot, GatewayError> {
        let endpoint = self.endpoint(&format!("checkout/v2/order/{order_id}/status"))?;
        let res = self
            .http
            .get(endpoint)
            .header("Authorization", format!("O-Bearer {token}"))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(failed(res).await);
        }

        let raw: serde_json::Value = res.json().await?;
        let status = raw
            .get("status")
            .or_else(|| raw.get("state"))
            .and_then(|v| v.as_str())
            .ok_or(GatewayError::MissingField("status"))?
            .to_string();

        Ok(StatusSnapshot { status, raw })
    }
}
