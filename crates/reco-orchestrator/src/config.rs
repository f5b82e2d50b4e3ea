//! Orchestrator configuration

use reco_core::{worker_count, ListingOptions, DEFAULT_PROJECT_CONCURRENCY, DEFAULT_QUERY_CONCURRENCY, DEFAULT_RECOMMENDERS};
use serde::{Deserialize, Serialize};

/// Default length of generated request ids
pub const DEFAULT_REQUEST_ID_LEN: usize = 20;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid TOML or has fields of the wrong type
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field has an unusable value
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Workers for the location × recommender queries of one project; non-positive means default
    pub query_concurrency: i64,
    /// Workers for project-level fan-out; non-positive means default
    pub project_concurrency: i64,
    /// Length of generated request ids
    pub request_id_len: usize,
    /// Recommenders queried in every location
    pub recommenders: Vec<String>,
}

impl OrchestratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing fields keep their defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed documents and
    /// `ConfigError::Invalid` for values that cannot be used.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field is usable
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first unusable field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_id_len == 0 {
            return Err(ConfigError::Invalid {
                field: "request_id_len",
                reason: "must be positive".to_string(),
            });
        }
        if self.recommenders.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid {
                field: "recommenders",
                reason: "recommender ids must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// With query concurrency
    #[inline]
    #[must_use]
    pub fn with_query_concurrency(mut self, workers: i64) -> Self {
        self.query_concurrency = workers;
        self
    }

    /// With project concurrency
    #[inline]
    #[must_use]
    pub fn with_project_concurrency(mut self, workers: i64) -> Self {
        self.project_concurrency = workers;
        self
    }

    /// With request id length
    #[inline]
    #[must_use]
    pub fn with_request_id_len(mut self, len: usize) -> Self {
        self.request_id_len = len;
        self
    }

    /// With recommenders
    #[must_use]
    pub fn with_recommenders<I, S>(mut self, recommenders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommenders = recommenders.into_iter().map(Into::into).collect();
        self
    }

    /// Effective project-level worker count
    #[must_use]
    pub fn project_workers(&self) -> usize {
        worker_count(self.project_concurrency, DEFAULT_PROJECT_CONCURRENCY)
    }

    /// Effective per-project query worker count
    #[must_use]
    pub fn query_workers(&self) -> usize {
        worker_count(self.query_concurrency, DEFAULT_QUERY_CONCURRENCY)
    }

    /// Options for a listing run
    #[must_use]
    pub fn listing_options(&self) -> ListingOptions {
        ListingOptions {
            recommenders: self.recommenders.clone(),
            query_concurrency: self.query_workers(),
            project_concurrency: self.project_workers(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            query_concurrency: 0,
            project_concurrency: 0,
            request_id_len: DEFAULT_REQUEST_ID_LEN,
            recommenders: DEFAULT_RECOMMENDERS.iter().map(ToString::to_string).collect(),
        }
    }
}
