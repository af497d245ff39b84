//! Logging setup and the error reporting collaborator used by source clients

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{AppConfig, DeploymentEnvironment, LoggingConfig};

/// Initializes the global tracing subscriber. `RUST_LOG` takes precedence over the config level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    }
    .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))
}

struct Webhook {
    client: Client,
    url: String,
}

/// Receives source failures. Every report is logged; in production it is
/// also forwarded to the configured webhook without waiting for delivery.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    webhook: Option<Arc<Webhook>>,
}

impl ErrorReporter {
    pub fn new(config: &AppConfig, client: Client) -> Self {
        let webhook = match (&config.server.environment, &config.reporting.error_webhook_url) {
            (DeploymentEnvironment::Production, Some(url)) if !url.is_empty() => {
                Some(Arc::new(Webhook {
                    client,
                    url: url.clone(),
                }))
            }
            _ => None,
        };
        Self { webhook }
    }

    /// Reporter that only logs
    #[must_use]
    pub fn log_only() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn forwards_to_webhook(&self) -> bool {
        self.webhook.is_some()
    }

    pub fn report(&self, context: &str, err: &anyhow::Error) {
        let message = format!("{err:#}");
        error!(context, "[WinterReady] {context}: {message}");

        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let payload = json!({
            "context": context,
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        runtime.spawn(async move {
            if let Err(e) = webhook.client.post(&webhook.url).json(&payload).send().await {
                debug!("Error webhook delivery failed: {e}");
            }
        });
    }
}
