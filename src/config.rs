use std::env;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Externally reachable base URL of this service, used for webhooks.
    pub public_url: String,
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,

    pub mollie_api_key: String,
    pub mollie_api_base: String,
    pub payment_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("PORT must be a number")?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            cors_extra_origins: env::var("CORS_EXTRA_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,

            mollie_api_key: env::var("MOLLIE_API_KEY").unwrap_or_default(),
            mollie_api_base: env::var("MOLLIE_API_BASE")
                .unwrap_or_else(|_| "https://api.mollie.com/v2".into()),
            payment_timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .context("PAYMENT_TIMEOUT_SECS must be a number")?,
        })
    }

    /// Configuration for tests and local runs without a database.
    pub fn test_default() -> Self {
        Self {
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:5000".into(),
            public_url: "https://api.example.test".into(),
            cors_extra_origins: Vec::new(),
            jwt_secret: "test-secret-do-not-use-in-production".into(),
            mollie_api_key: "test_key".into(),
            mollie_api_base: "http://127.0.0.1:9/v2".into(),
            payment_timeout_secs: 2,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn payment_redirect_url(&self) -> String {
        format!(
            "{}/subscription?status=success",
            self.frontend_url.trim_end_matches('/')
        )
    }

    pub fn payment_webhook_url(&self) -> String {
        format!("{}/api/webhooks/mollie", self.public_url.trim_end_matches('/'))
    }
}
