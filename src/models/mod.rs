pub mod activity;
pub mod stats;
pub mod subscription;
pub mod user;
