pub mod mollie;
pub mod payments;
pub mod stats;
pub mod subscription;

pub use mollie::{MollieClient, PaymentProvider};
pub use payments::PaymentReconciler;
pub use stats::StatsEngine;
pub use subscription::SubscriptionLedger;
