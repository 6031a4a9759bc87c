//! Payment round trip: initiate a provider payment, then reconcile the
//! provider's asynchronous webhook with the subscription ledger.
//!
//! Webhook delivery is at-least-once and may arrive out of order. The
//! webhook body is only trusted for the payment id; status, amount and
//! metadata are always re-fetched from the provider.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::subscription::{LedgerWrite, SubscriptionTransaction, CURRENCY};
use crate::models::user::SubscriptionPlan;
use crate::services::mollie::{
    is_valid_payment_id, Amount, PaymentProvider, PaymentRequest, PaymentStatus, ProviderError,
    ProviderPayment,
};
use crate::services::subscription::SubscriptionLedger;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub checkout_url: String,
    pub payment_id: String,
}

/// What a webhook delivery did. Every variant is acknowledged to the
/// provider; transient failures surface as errors instead.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied(SubscriptionTransaction),
    AlreadyApplied,
    Superseded,
    NotPaid(PaymentStatus),
    UnknownPayment,
    Rejected(String),
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::AlreadyApplied => "already_applied",
            Self::Superseded => "superseded",
            Self::NotPaid(_) => "not_paid",
            Self::UnknownPayment => "unknown_payment",
            Self::Rejected(_) => "rejected",
        }
    }
}

enum Resolution {
    Paid(SubscriptionTransaction),
    NotPaid(PaymentStatus),
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentMetadata {
    user_id: String,
    plan: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Clone)]
pub struct PaymentReconciler {
    provider: Arc<dyn PaymentProvider>,
    ledger: SubscriptionLedger,
    redirect_url: String,
    webhook_url: String,
}

impl PaymentReconciler {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        ledger: SubscriptionLedger,
        redirect_url: String,
        webhook_url: String,
    ) -> Self {
        Self {
            provider,
            ledger,
            redirect_url,
            webhook_url,
        }
    }

    /// Starts a provider payment for `plan`. No internal state changes;
    /// duplicate initiations simply create independent provider payments.
    pub async fn initiate(&self, user_id: Uuid, plan: &str) -> AppResult<Checkout> {
        let plan = SubscriptionPlan::parse(plan)
            .filter(SubscriptionPlan::is_purchasable)
            .ok_or_else(|| AppError::Validation("Invalid subscription plan".into()))?;

        let request = PaymentRequest {
            amount: Amount {
                currency: CURRENCY.into(),
                value: plan.price_value(),
            },
            description: format!("{} - monthly subscription", plan.display_name()),
            redirect_url: self.redirect_url.clone(),
            webhook_url: self.webhook_url.clone(),
            metadata: serde_json::json!({
                "userId": user_id,
                "plan": plan.as_str(),
                "type": "subscription",
            }),
        };

        let payment = self.provider.create_payment(&request).await?;
        let checkout_url = payment
            .checkout_url
            .ok_or_else(|| AppError::Upstream("provider returned no checkout URL".into()))?;

        tracing::info!(
            user_id = %user_id,
            payment_id = %payment.id,
            plan = plan.as_str(),
            "Payment initiated"
        );

        Ok(Checkout {
            checkout_url,
            payment_id: payment.id,
        })
    }

    /// Resolves a provider payment into the ledger change it warrants, if
    /// any. Has no side effects.
    pub async fn confirm(&self, payment_id: &str) -> AppResult<Option<SubscriptionTransaction>> {
        Ok(match self.resolve(payment_id).await? {
            Resolution::Paid(tx) => Some(tx),
            Resolution::NotPaid(_) | Resolution::Unknown => None,
        })
    }

    /// Full webhook handling: confirm, then apply to the ledger.
    /// `Err` means the delivery must not be acknowledged.
    pub async fn handle_webhook(&self, payment_id: &str) -> AppResult<WebhookOutcome> {
        let resolution = match self.resolve(payment_id).await {
            Ok(resolution) => resolution,
            Err(AppError::DataIntegrity(reason)) | Err(AppError::Validation(reason)) => {
                tracing::error!(
                    payment_id = %payment_id,
                    reason = %reason,
                    "Unprocessable payment webhook, needs manual review"
                );
                return Ok(WebhookOutcome::Rejected(reason));
            }
            Err(e) => return Err(e),
        };

        let tx = match resolution {
            Resolution::Paid(tx) => tx,
            Resolution::NotPaid(status) => {
                tracing::debug!(payment_id = %payment_id, status = ?status, "Payment not paid, skipping");
                return Ok(WebhookOutcome::NotPaid(status));
            }
            Resolution::Unknown => {
                tracing::warn!(payment_id = %payment_id, "Webhook for unknown payment");
                return Ok(WebhookOutcome::UnknownPayment);
            }
        };

        Ok(match self.ledger.apply(&tx).await? {
            LedgerWrite::Applied => WebhookOutcome::Applied(tx),
            LedgerWrite::AlreadyApplied => WebhookOutcome::AlreadyApplied,
            LedgerWrite::Superseded => {
                tracing::warn!(
                    payment_id = %payment_id,
                    user_id = %tx.user_id,
                    paid_at = %tx.paid_at,
                    "Paid payment superseded by a newer one, needs manual review"
                );
                WebhookOutcome::Superseded
            }
            LedgerWrite::UnknownUser => {
                tracing::error!(
                    payment_id = %payment_id,
                    user_id = %tx.user_id,
                    "Paid payment references unknown user, needs manual review"
                );
                WebhookOutcome::Rejected(format!("unknown user {}", tx.user_id))
            }
        })
    }

    async fn resolve(&self, payment_id: &str) -> AppResult<Resolution> {
        if !is_valid_payment_id(payment_id) {
            return Err(AppError::Validation("Invalid payment id".into()));
        }

        let payment = match self.provider.get_payment(payment_id).await {
            Ok(payment) => payment,
            Err(ProviderError::NotFound) => return Ok(Resolution::Unknown),
            Err(e) => return Err(e.into()),
        };

        if payment.status != PaymentStatus::Paid {
            return Ok(Resolution::NotPaid(payment.status));
        }

        transaction_for(payment).map(Resolution::Paid)
    }
}

/// Validates a paid payment's metadata and amount and derives the ledger
/// change. Metadata is round-tripped through the provider and treated as
/// untrusted.
fn transaction_for(payment: ProviderPayment) -> AppResult<SubscriptionTransaction> {
    let metadata = payment
        .metadata
        .ok_or_else(|| AppError::DataIntegrity("paid payment has no metadata".into()))?;
    let metadata: PaymentMetadata = serde_json::from_value(metadata)
        .map_err(|e| AppError::DataIntegrity(format!("invalid payment metadata: {e}")))?;

    if metadata.kind.as_deref().is_some_and(|k| k != "subscription") {
        return Err(AppError::DataIntegrity(format!(
            "unexpected payment type {:?}",
            metadata.kind
        )));
    }

    let user_id = Uuid::parse_str(&metadata.user_id)
        .map_err(|_| AppError::DataIntegrity("metadata userId is not a UUID".into()))?;
    let plan = SubscriptionPlan::parse(&metadata.plan)
        .filter(SubscriptionPlan::is_purchasable)
        .ok_or_else(|| {
            AppError::DataIntegrity(format!("metadata plan {:?} is not purchasable", metadata.plan))
        })?;

    let expected = Amount {
        currency: CURRENCY.into(),
        value: plan.price_value(),
    };
    if payment.amount.as_ref() != Some(&expected) {
        return Err(AppError::DataIntegrity(format!(
            "paid amount {:?} does not match {} price",
            payment.amount,
            plan.as_str()
        )));
    }

    let paid_at = payment.paid_at.unwrap_or_else(|| {
        tracing::warn!(payment_id = %payment.id, "Paid payment without paidAt, anchoring to now");
        Utc::now()
    });

    Ok(SubscriptionTransaction::activate(
        user_id,
        plan,
        payment.id,
        paid_at,
    ))
}
