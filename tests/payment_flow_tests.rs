//! Integration tests for payment initiation, webhook reconciliation and the
//! subscription ledger.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{create_test_app, paid_payment, Outage};
use fitcoach_api::db::{EventLogStore, LedgerStore};
use fitcoach_api::models::user::{LedgerRecord, SubscriptionPlan, SubscriptionStatus};
use fitcoach_api::services::mollie::PaymentStatus;
use fitcoach_api::services::payments::WebhookOutcome;

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

// ── Catalog ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plan_catalog_is_public() {
    let app = create_test_app();

    let (status, body) = app
        .send(
            Request::builder()
                .uri("/api/subscription-plans")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let plans = body.as_array().unwrap();
    assert_eq!(plans.len(), 4);
    assert_eq!(plans[0]["id"], "free");
    assert_eq!(plans[1]["price"], "29.99");
}

// ── Initiation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_payment_returns_checkout() {
    let app = create_test_app();
    let user = Uuid::new_v4();

    let (status, body) = app
        .send_json("POST", "/api/create-payment", user, json!({ "plan": "premium" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["checkoutUrl"].as_str().unwrap().starts_with("https://"));
    assert_eq!(body["paymentId"], "tr_test1");

    let created = app.provider.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].amount.value, "49.99");
    assert_eq!(created[0].amount.currency, "EUR");
    assert_eq!(created[0].metadata["plan"], "premium");
    assert_eq!(created[0].metadata["userId"], user.to_string());
    assert_eq!(
        created[0].webhook_url,
        "https://api.example.test/api/webhooks/mollie"
    );

    // initiation alone never touches the ledger
    let (_, subscription) = app.get("/api/user/subscription", user).await;
    assert_eq!(subscription["status"], "inactive");
}

#[tokio::test]
async fn test_unknown_plan_rejected_without_provider_call() {
    let app = create_test_app();
    let user = Uuid::new_v4();

    for plan in ["platinum", "free", ""] {
        let (status, body) = app
            .send_json("POST", "/api/create-payment", user, json!({ "plan": plan }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "plan {plan:?}");
        assert_eq!(body["error"]["code"], 400);
    }

    assert!(app.provider.created().is_empty());
    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.plan, SubscriptionPlan::Free);
    assert_eq!(subscription.status, SubscriptionStatus::Inactive);
}

#[tokio::test]
async fn test_provider_outage_on_create() {
    let app = create_test_app();
    app.provider.set_outage(Some(Outage::Timeout));

    let (status, _) = app
        .send_json(
            "POST",
            "/api/create-payment",
            Uuid::new_v4(),
            json!({ "plan": "essential" }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ── Webhook ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_paid_webhook_activates_subscription() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();

    let paid_at = Utc::now() - Duration::hours(1);
    app.provider
        .insert(paid_payment("tr_paid1", user, "premium", "49.99", paid_at));

    let (status, body) = app.webhook("tr_paid1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "applied");

    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.plan, SubscriptionPlan::Premium);
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.expires_at, Some(paid_at + Duration::days(30)));
    assert!(subscription.entitlements.meal_plans);

    let (_, history) = app.get("/api/user/subscription/history", user).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_webhook_is_idempotent() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();

    let paid_at = at("2026-09-01T10:00:00Z");
    app.provider
        .insert(paid_payment("tr_dup", user, "elite", "79.99", paid_at));

    let (_, first) = app.webhook("tr_dup").await;
    assert_eq!(first["outcome"], "applied");
    let after_first = app.state.ledger.subscription(user).await.unwrap();

    let (status, second) = app.webhook("tr_dup").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "already_applied");

    let after_second = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(after_first, after_second);
    assert_eq!(after_second.expires_at, Some(paid_at + Duration::days(30)));
    assert_eq!(app.state.ledger.history(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_out_of_order_webhook_is_superseded() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();

    let older = at("2026-08-01T09:00:00Z");
    let newer = at("2026-08-20T09:00:00Z");
    app.provider
        .insert(paid_payment("tr_older", user, "essential", "29.99", older));
    app.provider
        .insert(paid_payment("tr_newer", user, "premium", "49.99", newer));

    let (_, body) = app.webhook("tr_newer").await;
    assert_eq!(body["outcome"], "applied");

    let (status, body) = app.webhook("tr_older").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "superseded");

    let record = app.state.store.ledger(user).await.unwrap().unwrap();
    assert_eq!(record.plan, SubscriptionPlan::Premium);
    assert_eq!(record.expires_at, Some(newer + Duration::days(30)));
    assert_eq!(record.last_payment_id.as_deref(), Some("tr_newer"));
}

#[tokio::test]
async fn test_unpaid_webhook_is_acknowledged() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();

    let mut payment = paid_payment("tr_open", user, "premium", "49.99", Utc::now());
    payment.status = PaymentStatus::Open;
    payment.paid_at = None;
    app.provider.insert(payment);

    let (status, body) = app.webhook("tr_open").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "not_paid");

    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Inactive);
}

#[tokio::test]
async fn test_unknown_payment_is_acknowledged() {
    let app = create_test_app();

    let (status, body) = app.webhook("tr_doesnotexist").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unknown_payment");
}

#[tokio::test]
async fn test_transient_failure_is_not_acknowledged() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();
    app.provider
        .insert(paid_payment("tr_retry", user, "premium", "49.99", Utc::now()));

    app.provider.set_outage(Some(Outage::ServerError));
    let (status, body) = app.webhook("tr_retry").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["received"], false);

    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Inactive);

    // redelivery after recovery applies normally
    app.provider.set_outage(None);
    let (status, body) = app.webhook("tr_retry").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
}

#[tokio::test]
async fn test_garbled_provider_response_is_not_acknowledged() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();
    app.provider
        .insert(paid_payment("tr_garbled", user, "elite", "79.99", Utc::now()));

    for outage in [Outage::Garbled, Outage::Timeout] {
        app.provider.set_outage(Some(outage));
        let (status, body) = app.webhook("tr_garbled").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{outage:?}");
        assert_eq!(body["received"], false);
    }
    assert!(app.state.ledger.history(user).await.unwrap().is_empty());

    app.provider.set_outage(None);
    let (_, body) = app.webhook("tr_garbled").await;
    assert_eq!(body["outcome"], "applied");
}

#[tokio::test]
async fn test_percent_encoded_form_id_is_decoded() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();
    app.provider
        .insert(paid_payment("tr_abc", user, "premium", "49.99", Utc::now()));

    let (status, body) = app.webhook_form("id=tr%5Fabc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(app.provider.fetch_count(), 1);

    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.plan, SubscriptionPlan::Premium);
    assert_eq!(subscription.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn test_concurrent_duplicate_deliveries_apply_once() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();

    let paid_at = Utc::now() - Duration::minutes(5);
    app.provider
        .insert(paid_payment("tr_race", user, "premium", "49.99", paid_at));

    let payments = &app.state.payments;
    let (first, second) = tokio::join!(
        payments.handle_webhook("tr_race"),
        payments.handle_webhook("tr_race"),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Applied(_)))
        .count();
    let duplicates = outcomes
        .iter()
        .filter(|o| **o == WebhookOutcome::AlreadyApplied)
        .count();
    assert_eq!((applied, duplicates), (1, 1));

    assert_eq!(app.state.ledger.history(user).await.unwrap().len(), 1);
    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.expires_at, Some(paid_at + Duration::days(30)));
}

#[tokio::test]
async fn test_tampered_amount_is_rejected() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    app.state.store.ensure_user(user).await.unwrap();
    app.provider
        .insert(paid_payment("tr_cheap", user, "elite", "0.01", Utc::now()));

    let (status, body) = app.webhook("tr_cheap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "rejected");

    let subscription = app.state.ledger.subscription(user).await.unwrap();
    assert_eq!(subscription.plan, SubscriptionPlan::Free);
}

#[tokio::test]
async fn test_malformed_payment_id_never_reaches_provider() {
    let app = create_test_app();

    let (status, body) = app.webhook("tr_../../admin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "rejected");
    assert_eq!(app.provider.fetch_count(), 0);
}

#[tokio::test]
async fn test_webhook_accepts_json_body() {
    let app = create_test_app();

    let (status, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/mollie")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "id": "tr_missing" }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unknown_payment");
}

#[tokio::test]
async fn test_webhook_without_id_is_bad_request() {
    let app = create_test_app();

    let (status, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/mollie")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("foo=bar"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Full round trip ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_checkout_then_webhook_round_trip() {
    let app = create_test_app();
    let user = Uuid::new_v4();

    let (_, checkout) = app
        .send_json("POST", "/api/create-payment", user, json!({ "plan": "essential" }))
        .await;
    let payment_id = checkout["paymentId"].as_str().unwrap().to_string();

    // the user pays; the provider flips the payment to paid
    app.provider.insert(paid_payment(
        &payment_id,
        user,
        "essential",
        "29.99",
        Utc::now(),
    ));

    let (_, body) = app.webhook(&payment_id).await;
    assert_eq!(body["outcome"], "applied");

    let (status, subscription) = app.get("/api/user/subscription", user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(subscription["plan"], "essential");
    assert_eq!(subscription["status"], "active");
    assert_eq!(subscription["entitlements"]["progressTracking"], false);
}

// ── Expiry ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_expiry_is_evaluated_at_read_time() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    let expires_at = at("2026-06-30T00:00:00Z");

    app.store
        .set_ledger(
            user,
            LedgerRecord {
                plan: SubscriptionPlan::Elite,
                status: SubscriptionStatus::Active,
                expires_at: Some(expires_at),
                paid_at: Some(expires_at - Duration::days(30)),
                last_payment_id: Some("tr_june".into()),
            },
        )
        .await;

    let before = app
        .state
        .ledger
        .subscription_at(user, expires_at - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(before.status, SubscriptionStatus::Active);
    assert!(before.entitlements.personal_coaching);

    let after = app
        .state
        .ledger
        .subscription_at(user, expires_at + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(after.status, SubscriptionStatus::Expired);
    assert_eq!(after.plan, SubscriptionPlan::Elite);
    assert!(!after.entitlements.personal_coaching);

    // the stored row is never rewritten
    let record = app.state.store.ledger(user).await.unwrap().unwrap();
    assert_eq!(record.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn test_renewal_after_expiry_reactivates() {
    let app = create_test_app();
    let user = Uuid::new_v4();
    let old_paid = Utc::now() - Duration::days(45);

    app.store
        .set_ledger(
            user,
            LedgerRecord {
                plan: SubscriptionPlan::Premium,
                status: SubscriptionStatus::Active,
                expires_at: Some(old_paid + Duration::days(30)),
                paid_at: Some(old_paid),
                last_payment_id: Some("tr_old".into()),
            },
        )
        .await;
    assert_eq!(
        app.state.ledger.subscription(user).await.unwrap().status,
        SubscriptionStatus::Expired
    );

    app.provider
        .insert(paid_payment("tr_renew", user, "premium", "49.99", Utc::now()));
    let (_, body) = app.webhook("tr_renew").await;
    assert_eq!(body["outcome"], "applied");

    assert_eq!(
        app.state.ledger.subscription(user).await.unwrap().status,
        SubscriptionStatus::Active
    );
}
