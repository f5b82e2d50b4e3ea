//! Reco Core - recommendation orchestration core
//!
//! The pieces needed to discover and apply cost-saving recommendations across
//! many projects:
//! - Hierarchical progress tracking shared by every long-running request
//! - Bounded fan-out of remote queries with all-or-nothing merging
//! - Requirement gating of projects before listing
//! - An interpreter driving recommendations through claim, apply and finalize
//!
//! Remote calls go through the [`CloudService`] capability trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use reco_core::{list_projects_recommendations, ListingOptions, Task};
//!
//! # async fn example(service: std::sync::Arc<dyn reco_core::CloudService>) -> reco_core::RecoResult<()> {
//! let task = Task::root();
//! let projects = vec!["project-a".to_string(), "project-b".to_string()];
//! let result =
//!     list_projects_recommendations(service, projects, &ListingOptions::default(), &task).await?;
//!
//! println!("{} recommendations", result.recommendations.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod apply;
pub mod error;
pub mod fanout;
pub mod listing;
pub mod operation;
pub mod path;
pub mod progress;
pub mod requirements;
pub mod service;
pub mod snapshot;
pub mod types;

pub use apply::{apply_by_name, apply_recommendation, run_step};
pub use error::{RecoError, RecoResult};
pub use fanout::{
    fan_out, merge_results, worker_count, DEFAULT_PROJECT_CONCURRENCY, DEFAULT_QUERY_CONCURRENCY,
};
pub use listing::{
    list_locations, list_project_recommendations, list_projects_recommendations, ListingOptions,
    DEFAULT_RECOMMENDERS,
};
pub use operation::{plan_recommendation, Expectation, InstanceField, Step};
pub use path::{extract_segment, DiskRef, InstanceRef};
pub use progress::{NodeId, Progress, ProgressTree, Task, PROGRESS_DENOMINATOR};
pub use requirements::{
    check_project, list_project_requirements, list_requirements, REQUIRED_APIS,
    REQUIRED_PERMISSIONS,
};
pub use service::CloudService;
pub use snapshot::{random_snapshot_name, snapshot_name_at, MAX_SNAPSHOT_NAME_LEN};
pub use types::{
    Instance, ListResult, Operation, OperationGroup, ProjectRequirements, Recommendation,
    RecommendationContent, RecommendationState, Requirement, StateInfo, ValueMatcher,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Reco Core
    pub use crate::{
        CloudService, ListResult, ListingOptions, Progress, ProjectRequirements, Recommendation,
        RecommendationState, RecoError, RecoResult, Task,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
