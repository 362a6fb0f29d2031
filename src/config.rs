use anyhow::{Context, Result};
use compute::notify::{Mailer, NoopMailer};
use config::{Config, Environment};
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::mailer::SmtpMailer;
use crate::schemas::AppState;

/// Outgoing mail relay.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    #[serde(default)]
    pub tls: bool,
    /// Per-command SMTP timeout; kept below the HTTP request timeout.
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_secs() -> u64 {
    5
}

/// Runtime settings read from `PENNYWISE__*` environment variables.
///
/// `PENNYWISE__CACHE_TTL_SECS=30` or `PENNYWISE__SMTP__HOST=mail.example.com`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cache_ttl_secs: u64,
    pub cache_max_capacity: u64,
    pub smtp: Option<SmtpSettings>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("cache_ttl_secs", 60)?
            .set_default("cache_max_capacity", 1000)?
            .add_source(
                Environment::with_prefix("PENNYWISE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
            .context("Invalid PENNYWISE__ configuration")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            cache_max_capacity: 1000,
            smtp: None,
        }
    }
}

fn build_mailer(settings: &Settings) -> Arc<dyn Mailer> {
    match &settings.smtp {
        Some(smtp) => match SmtpMailer::new(smtp) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                warn!("SMTP configuration rejected, email disabled: {}", e);
                Arc::new(NoopMailer)
            }
        },
        None => {
            debug!("No SMTP relay configured, email disabled");
            Arc::new(NoopMailer)
        }
    }
}

/// Builds the shared handler state around an open connection.
pub fn app_state_from_connection(db: DatabaseConnection) -> Result<AppState> {
    dotenvy::dotenv().ok();
    let settings = Settings::load()?;
    debug!(
        cache_ttl_secs = settings.cache_ttl_secs,
        cache_max_capacity = settings.cache_max_capacity,
        "Settings loaded"
    );

    let cache = Cache::builder()
        .max_capacity(settings.cache_max_capacity)
        .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
        .build();

    Ok(AppState {
        db,
        cache,
        mailer: build_mailer(&settings),
    })
}

/// Connects to the database and builds the shared handler state.
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", database_url))?;

    app_state_from_connection(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_use_noop_mailer() {
        let settings = Settings::default();
        let mailer = build_mailer(&settings);
        assert!(format!("{:?}", mailer).contains("NoopMailer"));
    }

    #[test]
    fn test_smtp_settings_default_port() {
        let smtp: SmtpSettings = serde_json::from_value(serde_json::json!({
            "host": "mail.example.com",
            "from": "noreply@example.com"
        }))
        .unwrap();
        assert_eq!(smtp.port, 587);
        assert!(!smtp.tls);
        assert!(Duration::from_secs(smtp.timeout_secs) < crate::router::REQUEST_TIMEOUT);
    }
}
