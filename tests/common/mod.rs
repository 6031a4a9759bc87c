use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use fitcoach_api::auth::jwt::create_access_token;
use fitcoach_api::config::Config;
use fitcoach_api::create_router;
use fitcoach_api::db::MemoryStore;
use fitcoach_api::services::mollie::{
    Amount, PaymentProvider, PaymentRequest, PaymentStatus, ProviderError, ProviderPayment,
};
use fitcoach_api::AppState;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Outage {
    Timeout,
    ServerError,
    /// 200 with a body that is not a payment
    Garbled,
}

/// In-process stand-in for Mollie. Payments are seeded by the test and
/// looked up by id; unknown ids answer 404 like the real API.
#[derive(Default)]
pub struct FakeProvider {
    payments: Mutex<HashMap<String, ProviderPayment>>,
    outage: Mutex<Option<Outage>>,
    created: Mutex<Vec<PaymentRequest>>,
    fetches: AtomicUsize,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn insert(&self, payment: ProviderPayment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id.clone(), payment);
    }

    pub fn set_outage(&self, outage: Option<Outage>) {
        *self.outage.lock().unwrap() = outage;
    }

    pub fn created(&self) -> Vec<PaymentRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_outage(&self) -> Result<(), ProviderError> {
        match *self.outage.lock().unwrap() {
            Some(Outage::Timeout) => Err(ProviderError::Timeout),
            Some(Outage::ServerError) => Err(ProviderError::Unavailable("HTTP 502".into())),
            Some(Outage::Garbled) => Err(ProviderError::Malformed(
                "expected value at line 1 column 1".into(),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<ProviderPayment, ProviderError> {
        self.check_outage()?;

        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("tr_test{}", created.len());

        let payment = ProviderPayment {
            id: id.clone(),
            status: PaymentStatus::Open,
            amount: Some(request.amount.clone()),
            metadata: Some(request.metadata.clone()),
            paid_at: None,
            checkout_url: Some(format!("https://pay.example.test/checkout/{id}")),
        };
        self.insert(payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;

        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    pub provider: Arc<FakeProvider>,
}

/// Create a test app backed by the in-memory store and a fake provider.
pub fn create_test_app() -> TestApp {
    let config = Arc::new(Config::test_default());
    let store = MemoryStore::new();
    let provider = Arc::new(FakeProvider::default());

    let state = AppState::new(config, Arc::new(store.clone()), provider.clone());

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        provider,
    }
}

#[allow(dead_code)]
impl TestApp {
    pub fn token_for(&self, user_id: Uuid) -> String {
        create_access_token(user_id, 3600, &self.state.config.jwt_secret).unwrap()
    }

    pub async fn get(&self, uri: &str, user_id: Uuid) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token_for(user_id)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        user_id: Uuid,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token_for(user_id)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn webhook(&self, payment_id: &str) -> (StatusCode, serde_json::Value) {
        self.webhook_form(&format!("id={payment_id}")).await
    }

    pub async fn webhook_form(&self, form: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/mollie")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

/// A paid payment for `plan` at its list price, as the provider reports it.
#[allow(dead_code)]
pub fn paid_payment(
    id: &str,
    user_id: Uuid,
    plan: &str,
    value: &str,
    paid_at: DateTime<Utc>,
) -> ProviderPayment {
    ProviderPayment {
        id: id.into(),
        status: PaymentStatus::Paid,
        amount: Some(Amount {
            currency: "EUR".into(),
            value: value.into(),
        }),
        metadata: Some(serde_json::json!({
            "userId": user_id.to_string(),
            "plan": plan,
            "type": "subscription",
        })),
        paid_at: Some(paid_at),
        checkout_url: None,
    }
}
