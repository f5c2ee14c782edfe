use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ─── Defaults ────────────────────────────────────────────────────

/// Flush period used when the host configuration omits one.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

// ─── Configuration ───────────────────────────────────────────────

/// Immutable batcher configuration.
///
/// Deserializable so hosts can embed it in their own config files. All
/// checks live in [`BatcherConfig::validate`], which [`crate::Batcher::start`]
/// runs before anything is spawned: a bad endpoint fails at wiring time,
/// not on the first flush.
#[derive(Debug, Clone, Deserialize)]
pub struct BatcherConfig {
    /// Collector endpoint receiving `POST {"logs": [...]}`.
    pub endpoint: String,

    /// Tenant credential stamped onto every record.
    pub api_token: String,

    /// Account id stamped onto every record.
    pub user_id: String,

    /// Period between automatic flushes, in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl BatcherConfig {
    /// Config with the default flush interval; override the field directly
    /// for a different period.
    pub fn new(
        endpoint: impl Into<String>,
        api_token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            user_id: user_id.into(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
        }
    }

    /// Fail-fast validation; returns the parsed endpoint on success.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|source| ConfigError::InvalidEndpoint {
            url: self.endpoint.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(self.endpoint.clone()));
        }
        if self.api_token.is_empty() {
            return Err(ConfigError::EmptyApiToken);
        }
        if self.user_id.is_empty() {
            return Err(ConfigError::EmptyUserId);
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::ZeroFlushInterval);
        }
        Ok(url)
    }
}

// ─── Errors ──────────────────────────────────────────────────────

/// Construction-time failures surfaced by [`crate::Batcher::start`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint url `{url}`: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint `{0}` must be http or https")]
    UnsupportedScheme(String),
    #[error("api_token must not be empty")]
    EmptyApiToken,
    #[error("user_id must not be empty")]
    EmptyUserId,
    #[error("flush_interval_ms must be positive")]
    ZeroFlushInterval,
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// ─── Tests ───────────────────────────────────────────────────────
