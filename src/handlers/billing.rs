use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::db::EventLogStore;
use crate::dto::{CreatePaymentRequest, WebhookPayload};
use crate::error::{AppError, AppResult};
use crate::models::subscription::{PlanDetails, Subscription, SubscriptionEvent};
use crate::models::user::SubscriptionPlan;
use crate::services::payments::{Checkout, WebhookOutcome};
use crate::AppState;

pub async fn list_plans() -> Json<Vec<PlanDetails>> {
    Json(SubscriptionPlan::ALL.iter().map(|p| p.details()).collect())
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Subscription>> {
    let subscription = state.ledger.subscription(auth_user.id).await?;
    Ok(Json(subscription))
}

pub async fn subscription_history(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<SubscriptionEvent>>> {
    let events = state.ledger.history(auth_user.id).await?;
    Ok(Json(events))
}

pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreatePaymentRequest>,
) -> AppResult<Json<Checkout>> {
    // The ledger row must exist before the provider calls back.
    state.store.ensure_user(auth_user.id).await?;
    let checkout = state.payments.initiate(auth_user.id, &body.plan).await?;
    Ok(Json(checkout))
}

/// Mollie posts `id=<payment id>` as a form; JSON `{"id": ...}` is also
/// accepted. Any 2xx acknowledges the delivery, anything else makes the
/// provider retry.
pub async fn mollie_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payment_id = match webhook_payment_id(&headers, &body) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.payments.handle_webhook(&payment_id).await {
        Ok(outcome) => {
            if let WebhookOutcome::Applied(tx) = &outcome {
                tracing::info!(
                    payment_id = %payment_id,
                    user_id = %tx.user_id,
                    plan = tx.plan.as_str(),
                    "Subscription activated from webhook"
                );
            }
            (
                StatusCode::OK,
                Json(json!({ "received": true, "outcome": outcome.label() })),
            )
                .into_response()
        }
        Err(e) if e.is_transient() => {
            tracing::warn!(payment_id = %payment_id, error = %e, "Webhook not acknowledged, provider will retry");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "received": false, "error": { "message": "Temporarily unavailable", "code": 503 } })),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn webhook_payment_id(headers: &HeaderMap, body: &[u8]) -> AppResult<String> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let payload = if is_json {
        serde_json::from_slice::<WebhookPayload>(body).ok()
    } else {
        serde_urlencoded::from_bytes::<WebhookPayload>(body).ok()
    };
    let id = payload
        .map(|p| p.id.trim().to_string())
        .ok_or_else(|| AppError::Validation("Missing payment id".into()))?;

    if id.is_empty() {
        return Err(AppError::Validation("Missing payment id".into()));
    }
    Ok(id)
}
