//! Configuration management for the `WinterReady` service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WinterReadyError;
use crate::cache::FreshnessPolicy;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// External provider settings
    pub upstream: UpstreamConfig,
    /// Request gatekeeper rate limits
    pub rate_limit: RateLimitConfig,
    /// Per-source freshness policy
    pub freshness: FreshnessConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Error reporting collaborator
    pub reporting: ReportingConfig,
    /// Start auto-refreshing aggregators for the destination catalogue
    pub prewarm: bool,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Development,
    Production,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub environment: DeploymentEnvironment,
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// External provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// User agent sent to every provider (met.no rejects anonymous clients)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
    /// met.no API root, shared by the weather and ocean feeds
    #[serde(default = "default_met_base_url")]
    pub met_base_url: String,
    /// NVE avalanche warning API root
    #[serde(default = "default_avalanche_base_url")]
    pub avalanche_base_url: String,
    /// NOAA planetary Kp forecast document
    #[serde(default = "default_aurora_url")]
    pub aurora_url: String,
    /// Simulated latency of the road status lookup in milliseconds
    #[serde(default = "default_road_latency")]
    pub road_latency_ms: u64,
}

/// Token-bucket parameters of the request gatekeeper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    #[serde(default = "default_rate_limit")]
    pub limit: u32,
    /// Window length in milliseconds
    #[serde(default = "default_rate_window")]
    pub window_ms: u64,
    /// Retry hint sent with 429 responses
    #[serde(default = "default_retry_after")]
    pub retry_after_seconds: u64,
    /// Stricter limits for sensitive operations, keyed by operation name
    #[serde(default = "default_rate_overrides")]
    pub overrides: HashMap<String, u32>,
}

/// Freshness parameters of one source
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceFreshness {
    /// How long a fetched value may be reused; `None` means always revalidate
    pub upstream_cache_seconds: Option<u64>,
    /// How often the aggregator proactively revalidates
    pub refresh_interval_seconds: u64,
}

impl SourceFreshness {
    const fn new(upstream_cache_seconds: Option<u64>, refresh_interval_seconds: u64) -> Self {
        Self {
            upstream_cache_seconds,
            refresh_interval_seconds,
        }
    }

    #[must_use]
    pub fn policy(&self, dedupe_window: Duration) -> FreshnessPolicy {
        FreshnessPolicy {
            max_age: self.upstream_cache_seconds.map(Duration::from_secs),
            refresh_interval: Duration::from_secs(self.refresh_interval_seconds),
            dedupe_window,
        }
    }
}

/// Freshness policy for every source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Window in which repeated reads of one key share a single upstream call
    #[serde(default = "default_dedupe_ms")]
    pub dedupe_ms: u64,
    #[serde(default = "default_weather_freshness")]
    pub weather: SourceFreshness,
    #[serde(default = "default_avalanche_freshness")]
    pub avalanche: SourceFreshness,
    #[serde(default = "default_roads_freshness")]
    pub roads: SourceFreshness,
    #[serde(default = "default_ocean_freshness")]
    pub ocean: SourceFreshness,
    #[serde(default = "default_aurora_freshness")]
    pub aurora: SourceFreshness,
}

impl FreshnessConfig {
    #[must_use]
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_ms)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Error reporting settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Webhook receiving source failures in production
    pub error_webhook_url: Option<String>,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "WinterReady/1.0 github.com/winterready".to_string()
}

fn default_upstream_timeout() -> u64 {
    10
}

fn default_met_base_url() -> String {
    "https://api.met.no/weatherapi".to_string()
}

fn default_avalanche_base_url() -> String {
    "https://api01.nve.no/hydrology/forecast/avalanche/v6.3.0/api".to_string()
}

fn default_aurora_url() -> String {
    "https://services.swpc.noaa.gov/products/noaa-planetary-k-index-forecast.json".to_string()
}

fn default_road_latency() -> u64 {
    500
}

fn default_rate_limit() -> u32 {
    30
}

fn default_rate_window() -> u64 {
    60_000
}

fn default_retry_after() -> u64 {
    60
}

fn default_rate_overrides() -> HashMap<String, u32> {
    HashMap::from([("cache_purge".to_string(), 5)])
}

fn default_dedupe_ms() -> u64 {
    5_000
}

fn default_weather_freshness() -> SourceFreshness {
    SourceFreshness::new(Some(3600), 15 * 60)
}

fn default_avalanche_freshness() -> SourceFreshness {
    SourceFreshness::new(Some(3600), 30 * 60)
}

fn default_roads_freshness() -> SourceFreshness {
    SourceFreshness::new(None, 5 * 60)
}

fn default_ocean_freshness() -> SourceFreshness {
    SourceFreshness::new(Some(3600), 30 * 60)
}

fn default_aurora_freshness() -> SourceFreshness {
    SourceFreshness::new(Some(1800), 15 * 60)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            environment: DeploymentEnvironment::default(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: default_upstream_timeout(),
            met_base_url: default_met_base_url(),
            avalanche_base_url: default_avalanche_base_url(),
            aurora_url: default_aurora_url(),
            road_latency_ms: default_road_latency(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_rate_limit(),
            window_ms: default_rate_window(),
            retry_after_seconds: default_retry_after(),
            overrides: default_rate_overrides(),
        }
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            dedupe_ms: default_dedupe_ms(),
            weather: default_weather_freshness(),
            avalanche: default_avalanche_freshness(),
            roads: default_roads_freshness(),
            ocean: default_ocean_freshness(),
            aurora: default_aurora_freshness(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the given path (or the default location) and environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. WINTERREADY_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("WINTERREADY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("winterready").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.bind_address.is_empty() {
            self.server.bind_address = default_bind_address();
        }
        if self.upstream.user_agent.is_empty() {
            self.upstream.user_agent = default_user_agent();
        }
        if self.upstream.timeout_seconds == 0 {
            self.upstream.timeout_seconds = default_upstream_timeout();
        }
        if self.rate_limit.limit == 0 {
            self.rate_limit.limit = default_rate_limit();
        }
        if self.rate_limit.window_ms == 0 {
            self.rate_limit.window_ms = default_rate_window();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.upstream.timeout_seconds > 120 {
            return Err(WinterReadyError::config("Upstream timeout cannot exceed 120 seconds").into());
        }

        if self.rate_limit.limit > 10_000 {
            return Err(WinterReadyError::config("Rate limit cannot exceed 10000 requests per window").into());
        }

        if let Some((operation, _)) = self.rate_limit.overrides.iter().find(|(_, limit)| **limit == 0) {
            return Err(WinterReadyError::config(format!(
                "Rate limit override for '{operation}' must be at least 1"
            ))
            .into());
        }

        if self.freshness.dedupe_ms > 60_000 {
            return Err(WinterReadyError::config("Dedupe window cannot exceed 60 seconds").into());
        }

        let refresh_intervals = [
            self.freshness.weather,
            self.freshness.avalanche,
            self.freshness.roads,
            self.freshness.ocean,
            self.freshness.aurora,
        ];
        if refresh_intervals.iter().any(|f| f.refresh_interval_seconds == 0) {
            return Err(WinterReadyError::config("Refresh intervals must be at least 1 second").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WinterReadyError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WinterReadyError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("met", &self.upstream.met_base_url),
            ("avalanche", &self.upstream.avalanche_base_url),
            ("aurora", &self.upstream.aurora_url),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WinterReadyError::config(format!(
                    "The {name} provider URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, DeploymentEnvironment::Development);
        assert_eq!(config.rate_limit.limit, 30);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.overrides.get("cache_purge"), Some(&5));
        assert_eq!(config.logging.level, "info");
        assert!(config.reporting.error_webhook_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_freshness_policy() {
        let config = AppConfig::default();
        let dedupe = config.freshness.dedupe_window();
        assert_eq!(dedupe, Duration::from_secs(5));

        let weather = config.freshness.weather.policy(dedupe);
        assert_eq!(weather.max_age, Some(Duration::from_secs(3600)));
        assert_eq!(weather.refresh_interval, Duration::from_secs(900));

        let roads = config.freshness.roads.policy(dedupe);
        assert_eq!(roads.max_age, None);
        assert_eq!(roads.refresh_interval, Duration::from_secs(300));

        let aurora = config.freshness.aurora.policy(dedupe);
        assert_eq!(aurora.max_age, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = AppConfig::default();
        config.upstream.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_zero_override() {
        let mut config = AppConfig::default();
        config.rate_limit.overrides.insert("aurora".to_string(), 0);
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("aurora"));
    }

    #[test]
    fn test_config_validation_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.upstream.aurora_url = "ftp://example.org/kp.json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_defaults_fills_empty_values() {
        let mut config = AppConfig::default();
        config.logging.format = String::new();
        config.rate_limit.window_ms = 0;
        config.apply_defaults();
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.rate_limit.window_ms, 60_000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = Config::builder()
            .add_source(config::File::from_str(
                "[server]\nport = 8080\nenvironment = \"production\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, DeploymentEnvironment::Production);
        assert_eq!(config.upstream.road_latency_ms, 500);
        assert_eq!(config.freshness.ocean.refresh_interval_seconds, 1800);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = AppConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("winterready"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
