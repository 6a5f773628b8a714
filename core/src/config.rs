//! Router configuration.
//!
//! Values should be provided by the application's configuration layer, not
//! hardcoded; the defaults here match a local development deployment.

use std::time::Duration;

/// Process-wide routing configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Default transport timeout for routes that configure none.
    ///
    /// Default: 60 seconds
    pub timeout: Duration,

    /// Broker endpoints (`host:port`) for bus routes.
    ///
    /// Default: `["localhost:9092"]`
    pub kafka_brokers: Vec<String>,

    /// Connection string for the persistence collaborator. Opaque to the
    /// router; forwarded as-is.
    ///
    /// Default: `mongodb://localhost:27017/hie`
    pub db_url: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            kafka_brokers: vec!["localhost:9092".to_string()],
            db_url: "mongodb://localhost:27017/hie".to_string(),
        }
    }
}

impl RouterConfig {
    /// Set the default transport timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bus broker endpoints.
    #[must_use]
    pub fn with_kafka_brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kafka_brokers = brokers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the persistence connection string.
    #[must_use]
    pub fn with_db_url(mut self, url: impl Into<String>) -> Self {
        self.db_url = url.into();
        self
    }
}
