use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public domain used to build pairing links and share viewer URLs
    pub app_domain: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Shared secret for the internal escalation trigger, distinct from user auth
    pub cron_secret: String,
    pub media_base_url: String,
    pub media_signing_secret: String,
    pub escalation_grace_minutes: i64,
    pub escalation_batch_limit: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            app_domain: env::var("APP_DOMAIN")
                .unwrap_or_else(|_| "https://carelink.app".to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "carelink".to_string()),
            cron_secret: env::var("CRON_SECRET").context("CRON_SECRET must be set")?,
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| "https://media.carelink.app".to_string()),
            media_signing_secret: env::var("MEDIA_SIGNING_SECRET")
                .context("MEDIA_SIGNING_SECRET must be set")?,
            escalation_grace_minutes: env::var("ESCALATION_GRACE_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("ESCALATION_GRACE_MINUTES must be a valid number")?,
            escalation_batch_limit: env::var("ESCALATION_BATCH_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("ESCALATION_BATCH_LIMIT must be a valid number")?,
        })
    }
}
