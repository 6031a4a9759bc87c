pub mod billing;
pub mod health;
pub mod logs;
pub mod stats;
pub mod workouts;
