use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "subscription_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Essential,
    Premium,
    Elite,
}

impl SubscriptionPlan {
    pub const ALL: [SubscriptionPlan; 4] = [
        SubscriptionPlan::Free,
        SubscriptionPlan::Essential,
        SubscriptionPlan::Premium,
        SubscriptionPlan::Elite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Essential => "essential",
            Self::Premium => "premium",
            Self::Elite => "elite",
        }
    }

    /// Parses a plan identifier. Accepts the legacy Dutch key for essential.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "essential" | "essentieel" => Some(Self::Essential),
            "premium" => Some(Self::Premium),
            "elite" => Some(Self::Elite),
            _ => None,
        }
    }

    /// Plans that can be bought through the payment provider.
    pub fn is_purchasable(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Expired,
}

/// Raw ledger fields as stored on the user row.
#[derive(Debug, Clone, PartialEq, Default, FromRow)]
pub struct LedgerRecord {
    #[sqlx(rename = "subscription_plan")]
    pub plan: SubscriptionPlan,
    #[sqlx(rename = "subscription_status")]
    pub status: SubscriptionStatus,
    #[sqlx(rename = "subscription_expires_at")]
    pub expires_at: Option<DateTime<Utc>>,
    #[sqlx(rename = "subscription_paid_at")]
    pub paid_at: Option<DateTime<Utc>>,
    pub last_payment_id: Option<String>,
}

impl LedgerRecord {
    /// Status as of `now`. An active subscription whose expiry has passed
    /// reads as expired; the stored value is left untouched.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match (self.status, self.expires_at) {
            (SubscriptionStatus::Active, Some(expires_at)) if expires_at <= now => {
                SubscriptionStatus::Expired
            }
            (SubscriptionStatus::Active, None) => SubscriptionStatus::Expired,
            (status, _) => status,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub workout_library: WorkoutAccess,
    pub meal_plans: bool,
    pub progress_tracking: bool,
    pub personal_coaching: bool,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutAccess {
    Basic,
    Extended,
    Complete,
}

impl Entitlements {
    pub fn for_plan(plan: SubscriptionPlan) -> Self {
        match plan {
            SubscriptionPlan::Free => Self {
                workout_library: WorkoutAccess::Basic,
                meal_plans: false,
                progress_tracking: false,
                personal_coaching: false,
            },
            SubscriptionPlan::Essential => Self {
                workout_library: WorkoutAccess::Basic,
                meal_plans: true,
                progress_tracking: false,
                personal_coaching: false,
            },
            SubscriptionPlan::Premium => Self {
                workout_library: WorkoutAccess::Extended,
                meal_plans: true,
                progress_tracking: true,
                personal_coaching: false,
            },
            SubscriptionPlan::Elite => Self {
                workout_library: WorkoutAccess::Complete,
                meal_plans: true,
                progress_tracking: true,
                personal_coaching: true,
            },
        }
    }
}
