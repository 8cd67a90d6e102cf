use crate::credentials::Credentials;
use crate::crypto::DigestAlgorithm;
use crate::error::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// The production Sync 1.5 token server.
pub const DEFAULT_TOKEN_SERVER_URL: &str = "https://token.services.mozilla.com/1.0/sync/1.5";

/// Settings for token exchange and request signing.
///
/// Every field has a default, so a JSON document only needs to name what it changes:
///
/// ```
/// let config = hawk_session::Config::from_json(r#"{"request_timeout_ms": 5000}"#).unwrap();
/// assert_eq!(config.request_timeout(), std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub token_server_url: String,
    /// Bound on a single token server exchange.
    pub request_timeout_ms: u64,
    /// Allowed difference between a Hawk timestamp and the verifier's clock.
    pub clock_skew_secs: u64,
    /// Known offset of the local clock from the server's, added to Hawk timestamps.
    pub localtime_offset_ms: i64,
    /// Algorithm for credentials built from configuration rather than a token response.
    pub algorithm: DigestAlgorithm,
    /// Whether request bodies are covered by the Hawk `hash` attribute.
    pub hash_payloads: bool,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            token_server_url: DEFAULT_TOKEN_SERVER_URL.to_string(),
            request_timeout_ms: 30_000,
            clock_skew_secs: 60,
            localtime_offset_ms: 0,
            algorithm: DigestAlgorithm::Sha256,
            hash_payloads: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Config> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.token_server_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(format!(
                "token server url must be http or https, got {}",
                url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        self.retry.validate()
    }

    pub fn token_server_url(&self) -> Result<Url> {
        Url::parse(&self.token_server_url)
            .map_err(|e| Error::Config(format!("token server url: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// How far a Hawk timestamp may stray from the verifier's clock.
    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    /// Pre-shared credentials using the configured algorithm.
    pub fn credentials<S, B>(&self, id: S, key: B) -> Result<Credentials>
    where
        S: Into<String>,
        B: AsRef<[u8]>,
    {
        Credentials::new(id, key, self.algorithm.name())
    }
}

/// How token fetches that fail in transport are retried.  Rejections by the server are never
/// retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            initial_backoff_ms: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The delay before retry number `retry` (1 for the first retry), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.clock_skew(), Duration::from_secs(60));
        assert_eq!(config.algorithm, DigestAlgorithm::Sha256);
    }

    #[test]
    fn partial_json() {
        let config = Config::from_json(
            r#"{"token_server_url": "http://localhost:5000/1.0/sync/1.5",
                "algorithm": "sha1",
                "retry": {"max_attempts": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.token_server_url, "http://localhost:5000/1.0/sync/1.5");
        assert_eq!(config.algorithm, DigestAlgorithm::Sha1);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn credentials_use_configured_algorithm() {
        let config = Config::from_json(r#"{"algorithm": "sha1"}"#).unwrap();
        let credentials = config.credentials("me", "secret").unwrap();
        assert_eq!(credentials.id, "me");
        assert_eq!(credentials.key.algorithm(), DigestAlgorithm::Sha1);
    }

    #[test]
    fn bad_algorithm() {
        assert!(Config::from_json(r#"{"algorithm": "sha512"}"#).is_err());
    }

    #[test]
    fn bad_url() {
        match Config::from_json(r#"{"token_server_url": "not a url"}"#) {
            Err(Error::Config(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(Config::from_json(r#"{"token_server_url": "ftp://example.com/"}"#).is_err());
    }

    #[test]
    fn zero_attempts() {
        assert!(Config::from_json(r#"{"retry": {"max_attempts": 0}}"#).is_err());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff_ms: 100,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
