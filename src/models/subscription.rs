use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::user::{Entitlements, SubscriptionPlan, SubscriptionStatus};

/// Length of one paid subscription period.
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

pub const CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetails {
    pub id: SubscriptionPlan,
    pub name: &'static str,
    pub description: &'static str,
    pub price: String,
    pub currency: &'static str,
    pub purchasable: bool,
    pub entitlements: Entitlements,
}

impl SubscriptionPlan {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Marco Donato Free",
            Self::Essential => "Marco Donato Essential",
            Self::Premium => "Marco Donato Premium",
            Self::Elite => "Marco Donato Elite",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Free => "Basic workouts to get started",
            Self::Essential => "Basic workouts and nutrition advice",
            Self::Premium => "Extended workouts, meal plans and progress tracking",
            Self::Elite => "Full access with personal coaching and premium content",
        }
    }

    pub fn price_cents(&self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Essential => 2999,
            Self::Premium => 4999,
            Self::Elite => 7999,
        }
    }

    /// Price in the provider's decimal string format, e.g. `"29.99"`.
    pub fn price_value(&self) -> String {
        let cents = self.price_cents();
        format!("{}.{:02}", cents / 100, cents % 100)
    }

    pub fn details(&self) -> PlanDetails {
        PlanDetails {
            id: *self,
            name: self.display_name(),
            description: self.description(),
            price: self.price_value(),
            currency: CURRENCY,
            purchasable: self.is_purchasable(),
            entitlements: Entitlements::for_plan(*self),
        }
    }
}

/// Ledger change produced by a confirmed payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTransaction {
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub payment_id: String,
    pub paid_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SubscriptionTransaction {
    pub fn activate(
        user_id: Uuid,
        plan: SubscriptionPlan,
        payment_id: String,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            plan,
            status: SubscriptionStatus::Active,
            payment_id,
            paid_at,
            expires_at: paid_at + Duration::days(SUBSCRIPTION_PERIOD_DAYS),
        }
    }
}

/// Result of the conditional ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerWrite {
    Applied,
    AlreadyApplied,
    /// A newer payment is already reflected in the ledger.
    Superseded,
    UnknownUser,
}

/// Subscription state as reported to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub entitlements: Entitlements,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_id: String,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub paid_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}
