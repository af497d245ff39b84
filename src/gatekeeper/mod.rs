//! Request gatekeeper: rate limiting and input validation in front of the sources

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::RateLimitConfig;
use crate::{Result, WinterReadyError};

pub mod rate_limit;
pub mod validation;

pub use rate_limit::{InMemoryRateLimitStore, RateLimitDecision, RateLimitStore};
pub use validation::{client_identity, validate_cloud_cover, validate_coordinates, validate_region};

/// Gated operations. Each may carry its own, stricter limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Weather,
    Avalanche,
    Roads,
    Ocean,
    Aurora,
    Safety,
    Destinations,
    CachePurge,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Weather => "weather",
            Operation::Avalanche => "avalanche",
            Operation::Roads => "roads",
            Operation::Ocean => "ocean",
            Operation::Aurora => "aurora",
            Operation::Safety => "safety",
            Operation::Destinations => "destinations",
            Operation::CachePurge => "cache_purge",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admits or rejects requests per client. The bucket store is injected so it
/// can be shared or replaced without touching the call sites.
#[derive(Clone)]
pub struct Gatekeeper {
    store: Arc<dyn RateLimitStore>,
    limit: u32,
    window: Duration,
    retry_after: Duration,
    overrides: HashMap<String, u32>,
}

impl Gatekeeper {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            limit: config.limit,
            window: Duration::from_millis(config.window_ms),
            retry_after: Duration::from_secs(config.retry_after_seconds),
            overrides: config.overrides.clone(),
        }
    }

    #[must_use]
    pub fn limit_for(&self, operation: Operation) -> u32 {
        self.overrides
            .get(operation.as_str())
            .copied()
            .unwrap_or(self.limit)
    }

    /// Operations with their own limit count against their own bucket;
    /// all others share the client's default bucket.
    fn bucket_key(&self, client: &str, operation: Operation) -> String {
        if self.overrides.contains_key(operation.as_str()) {
            format!("{operation}:{client}")
        } else {
            client.to_string()
        }
    }

    /// Consumes one token for the client or fails with a rate-limit error
    pub fn admit(&self, client: &str, operation: Operation) -> Result<RateLimitDecision> {
        let decision = self.store.check(
            &self.bucket_key(client, operation),
            self.limit_for(operation),
            self.window,
        );

        if decision.allowed {
            Ok(decision)
        } else {
            warn!(client, operation = %operation, "Rate limit exceeded");
            Err(WinterReadyError::rate_limited(self.retry_after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn gatekeeper() -> Gatekeeper {
        Gatekeeper::new(
            &RateLimitConfig::default(),
            Arc::new(InMemoryRateLimitStore::new()),
        )
    }

    #[test]
    fn test_limits_and_overrides() {
        let gatekeeper = gatekeeper();
        assert_eq!(gatekeeper.limit_for(Operation::Weather), 30);
        assert_eq!(gatekeeper.limit_for(Operation::CachePurge), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_carries_retry_after() {
        let gatekeeper = gatekeeper();
        for _ in 0..30 {
            gatekeeper.admit("198.51.100.4", Operation::Weather).unwrap();
        }
        let err = gatekeeper.admit("198.51.100.4", Operation::Roads).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RateLimited);
        assert!(matches!(
            err,
            WinterReadyError::RateLimited { retry_after } if retry_after == Duration::from_secs(60)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_uses_separate_bucket() {
        let gatekeeper = gatekeeper();
        for _ in 0..5 {
            gatekeeper.admit("client", Operation::CachePurge).unwrap();
        }
        assert!(gatekeeper.admit("client", Operation::CachePurge).is_err());
        assert!(gatekeeper.admit("client", Operation::Weather).is_ok());
    }
}
