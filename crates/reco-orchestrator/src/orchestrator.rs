//! Orchestration context
//!
//! [`Orchestrator`] owns one ledger per request kind and exposes the
//! start/poll pairs used by the edge layer. Every start call takes the
//! [`CloudService`] bound to the requester's credentials.

use crate::config::OrchestratorConfig;
use crate::handle::{ApplyHandle, ListingHandle, Poll, RequirementsHandle};
use crate::ledger::{RequestKey, RequestLedger, SharedHandle};
use reco_core::{
    CloudService, ListResult, Progress, ProjectRequirements, RecommendationState, RecoResult,
};
use serde::Serialize;
use std::sync::Arc;

/// Status of an apply request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyStatus {
    /// Apply is running
    InProgress {
        /// Progress of the apply
        progress: Progress,
    },
    /// Every operation was applied
    Succeeded,
    /// Apply was aborted
    Failed {
        /// Why the apply failed
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
    /// No apply is tracked here; state as reported by the recommender
    Reported {
        /// Remote lifecycle state
        state: RecommendationState,
    },
}

impl ApplyStatus {
    /// Short status label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::InProgress { .. } => "IN PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed { .. } => "FAILED",
            Self::Reported { state } => state.as_str(),
        }
    }
}

impl std::fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress { progress } => write!(f, "{} ({})", self.label(), progress),
            Self::Failed { error_message } => write!(f, "{}: {}", self.label(), error_message),
            _ => f.write_str(self.label()),
        }
    }
}

/// Entry point for long-running listing, requirement and apply requests
pub struct Orchestrator {
    config: OrchestratorConfig,
    listings: RequestLedger<ListResult>,
    requirement_checks: RequestLedger<Vec<ProjectRequirements>>,
    applies: RequestLedger<()>,
}

impl Orchestrator {
    /// Create an orchestrator with empty ledgers
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            listings: RequestLedger::new(),
            requirement_checks: RequestLedger::new(),
            applies: RequestLedger::new(),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start listing recommendations of `projects`; returns the request id
    pub fn start_listing(
        &self,
        requester: &str,
        service: Arc<dyn CloudService>,
        projects: Vec<String>,
    ) -> String {
        let count = projects.len();
        let handle: SharedHandle<ListResult> = Arc::new(ListingHandle::new(
            service,
            projects,
            self.config.listing_options(),
        ));
        let request_id = self
            .listings
            .start_with_new_id(requester, handle, self.config.request_id_len);
        tracing::info!("Started listing {} for {} ({} projects)", request_id, requester, count);
        request_id
    }

    /// Progress or result of a listing request
    ///
    /// The result is delivered once; the request is forgotten afterwards.
    ///
    /// # Errors
    /// `RecoError::RequestNotFound` for unknown or already delivered requests.
    pub fn poll_listing(&self, requester: &str, request_id: &str) -> RecoResult<Poll<ListResult>> {
        let key = RequestKey::new(requester, request_id);
        self.listings
            .get_response(&key)
            .ok_or_else(|| key.not_found())
    }

    /// Start checking requirements of `projects`; returns the request id
    pub fn start_requirements_check(
        &self,
        requester: &str,
        service: Arc<dyn CloudService>,
        projects: Vec<String>,
    ) -> String {
        let count = projects.len();
        let handle: SharedHandle<Vec<ProjectRequirements>> = Arc::new(RequirementsHandle::new(
            service,
            projects,
            self.config.project_workers(),
        ));
        let request_id =
            self.requirement_checks
                .start_with_new_id(requester, handle, self.config.request_id_len);
        tracing::info!(
            "Started requirements check {} for {} ({} projects)",
            request_id,
            requester,
            count
        );
        request_id
    }

    /// Progress or result of a requirements check
    ///
    /// # Errors
    /// `RecoError::RequestNotFound` for unknown or already delivered requests.
    pub fn poll_requirements_check(
        &self,
        requester: &str,
        request_id: &str,
    ) -> RecoResult<Poll<Vec<ProjectRequirements>>> {
        let key = RequestKey::new(requester, request_id);
        self.requirement_checks
            .get_response(&key)
            .ok_or_else(|| key.not_found())
    }

    /// Start applying the recommendation called `name`
    ///
    /// # Errors
    /// `RecoError::DuplicateRequest` if `requester` is already applying it.
    pub fn start_apply(
        &self,
        requester: &str,
        service: Arc<dyn CloudService>,
        name: &str,
    ) -> RecoResult<()> {
        let handle: SharedHandle<()> = Arc::new(ApplyHandle::new(service, name));
        self.applies
            .start_processing(RequestKey::new(requester, name), handle)?;
        tracing::info!("Started applying {} for {}", name, requester);
        Ok(())
    }

    /// Status of applying the recommendation called `name`
    ///
    /// Without a tracked apply (never started here, or its result was
    /// already delivered) the recommendation is fetched and its remote state
    /// reported.
    ///
    /// # Errors
    /// Remote errors of the fallback fetch.
    pub async fn poll_apply_status(
        &self,
        requester: &str,
        service: &dyn CloudService,
        name: &str,
    ) -> RecoResult<ApplyStatus> {
        let key = RequestKey::new(requester, name);
        match self.applies.get_response(&key) {
            Some(Poll::InProgress(progress)) => Ok(ApplyStatus::InProgress { progress }),
            Some(Poll::Done(Ok(()))) => Ok(ApplyStatus::Succeeded),
            Some(Poll::Done(Err(e))) => Ok(ApplyStatus::Failed {
                error_message: e.to_string(),
            }),
            None => {
                let recommendation = service.get_recommendation(name).await?;
                Ok(ApplyStatus::Reported {
                    state: recommendation.state(),
                })
            }
        }
    }

    /// Number of tracked requests across all kinds
    #[must_use]
    pub fn tracked_requests(&self) -> usize {
        self.listings.len() + self.requirement_checks.len() + self.applies.len()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(ApplyStatus::Succeeded.to_string(), "SUCCEEDED");
        let failed = ApplyStatus::Failed {
            error_message: "status is not as expected".to_string(),
        };
        assert_eq!(failed.to_string(), "FAILED: status is not as expected");
        let reported = ApplyStatus::Reported {
            state: RecommendationState::Claimed,
        };
        assert_eq!(reported.label(), "CLAIMED");
    }

    #[test]
    fn status_serializes_with_tag() {
        let failed = ApplyStatus::Failed {
            error_message: "boom".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["errorMessage"], "boom");
    }
}
