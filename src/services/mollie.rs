//! Mollie payments API client (v2, JSON over HTTPS).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("payment provider timed out")]
    Timeout,

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("payment provider rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("payment not found")]
    NotFound,

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("payment provider not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Open,
    Pending,
    Authorized,
    Paid,
    Canceled,
    Expired,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub currency: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Amount,
    pub description: String,
    pub redirect_url: String,
    pub webhook_url: String,
    pub metadata: serde_json::Value,
}

/// Authoritative payment state as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Option<Amount>,
    pub metadata: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub checkout_url: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<ProviderPayment, ProviderError>;

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ProviderError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MolliePayment {
    id: String,
    status: PaymentStatus,
    amount: Option<Amount>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "_links", default)]
    links: Option<MollieLinks>,
}

#[derive(Debug, Deserialize)]
struct MollieLinks {
    checkout: Option<MollieLink>,
}

#[derive(Debug, Deserialize)]
struct MollieLink {
    href: String,
}

impl From<MolliePayment> for ProviderPayment {
    fn from(p: MolliePayment) -> Self {
        Self {
            id: p.id,
            status: p.status,
            amount: p.amount,
            metadata: p.metadata,
            paid_at: p.paid_at,
            checkout_url: p.links.and_then(|l| l.checkout).map(|c| c.href),
        }
    }
}

#[derive(Clone)]
pub struct MollieClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl MollieClient {
    pub fn new(api_key: String, api_base: String, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured);
        }
        Ok(())
    }

    async fn read_payment(resp: reqwest::Response) -> Result<ProviderPayment, ProviderError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            let detail = body["detail"].as_str().unwrap_or("no detail").to_string();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        // Body read failures are transport errors; only bad JSON is Malformed.
        let body = resp.bytes().await.map_err(transport_error)?;
        decode_payment(&body)
    }
}

fn decode_payment(body: &[u8]) -> Result<ProviderPayment, ProviderError> {
    serde_json::from_slice::<MolliePayment>(body)
        .map(ProviderPayment::from)
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl PaymentProvider for MollieClient {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<ProviderPayment, ProviderError> {
        self.ensure_configured()?;

        let resp = self
            .http
            .post(format!("{}/payments", self.api_base))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_payment(resp).await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ProviderError> {
        self.ensure_configured()?;

        let resp = self
            .http
            .get(format!("{}/payments/{}", self.api_base, payment_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_payment(resp).await
    }
}

/// Provider payment ids are short opaque tokens such as `tr_WDqYK6vllg`.
pub fn is_valid_payment_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
