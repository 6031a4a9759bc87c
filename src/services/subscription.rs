//! Subscription ledger: the plan/status/expiry fields on the user row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{LedgerStore, Store};
use crate::error::AppResult;
use crate::models::subscription::{
    LedgerWrite, Subscription, SubscriptionEvent, SubscriptionTransaction,
};
use crate::models::user::{Entitlements, SubscriptionPlan, SubscriptionStatus};

#[derive(Clone)]
pub struct SubscriptionLedger {
    store: Arc<dyn Store>,
}

impl SubscriptionLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn subscription(&self, user_id: Uuid) -> AppResult<Subscription> {
        self.subscription_at(user_id, Utc::now()).await
    }

    /// Expiry is evaluated lazily against `now`; no job ever rewrites the row.
    pub async fn subscription_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let record = self.store.ledger(user_id).await?.unwrap_or_default();
        let status = record.effective_status(now);

        let entitled_plan = if status == SubscriptionStatus::Active {
            record.plan
        } else {
            SubscriptionPlan::Free
        };

        Ok(Subscription {
            plan: record.plan,
            status,
            expires_at: record.expires_at,
            paid_at: record.paid_at,
            entitlements: Entitlements::for_plan(entitled_plan),
        })
    }

    pub async fn history(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionEvent>> {
        self.store.subscription_events(user_id).await
    }

    /// The only ledger mutation. Reachable solely from payment
    /// reconciliation so state changes always follow a confirmed payment.
    pub(crate) async fn apply(&self, tx: &SubscriptionTransaction) -> AppResult<LedgerWrite> {
        let outcome = self.store.apply_subscription(tx).await?;

        tracing::info!(
            user_id = %tx.user_id,
            payment_id = %tx.payment_id,
            plan = tx.plan.as_str(),
            expires_at = %tx.expires_at,
            outcome = ?outcome,
            "Subscription update"
        );

        Ok(outcome)
    }
}
