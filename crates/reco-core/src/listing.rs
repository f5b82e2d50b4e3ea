//! Recommendation listing across projects
//!
//! Each project is gated on its requirements before any recommender is
//! queried. Projects with unsatisfied requirements are reported back as data;
//! any remote error fails the whole listing.

use crate::error::RecoResult;
use crate::fanout::{fan_out, DEFAULT_PROJECT_CONCURRENCY, DEFAULT_QUERY_CONCURRENCY};
use crate::progress::Task;
use crate::requirements::list_project_requirements;
use crate::service::CloudService;
use crate::types::{ListResult, ProjectRequirements, Recommendation};
use std::sync::Arc;

/// Recommenders queried in every location by default
pub const DEFAULT_RECOMMENDERS: &[&str] = &[
    "google.compute.disk.IdleResourceRecommender",
    "google.compute.instance.IdleResourceRecommender",
    "google.compute.instance.MachineTypeRecommender",
];

/// Tuning for a listing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOptions {
    /// Recommender ids queried in each location
    pub recommenders: Vec<String>,
    /// Workers for the location × recommender queries of one project; zero means default
    pub query_concurrency: usize,
    /// Workers for the project-level fan-out; zero means default
    pub project_concurrency: usize,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            recommenders: DEFAULT_RECOMMENDERS.iter().map(ToString::to_string).collect(),
            query_concurrency: DEFAULT_QUERY_CONCURRENCY,
            project_concurrency: DEFAULT_PROJECT_CONCURRENCY,
        }
    }
}

/// Zones of `project` followed by its regions
///
/// # Errors
/// Remote errors from either listing call.
pub async fn list_locations(service: &dyn CloudService, project: &str) -> RecoResult<Vec<String>> {
    let mut locations = service.list_zone_names(project).await?;
    locations.extend(service.list_region_names(project).await?);
    Ok(locations)
}

/// Recommendations of every recommender in every location of `project`
///
/// `task` gets one subtask per (recommender, location) query and is marked
/// done on success. A `concurrency` of zero uses
/// [`DEFAULT_QUERY_CONCURRENCY`] workers.
///
/// # Errors
/// The last error of any query; partial results are discarded.
pub async fn list_project_recommendations(
    service: Arc<dyn CloudService>,
    project: &str,
    recommenders: &[String],
    concurrency: usize,
    task: &Task,
) -> RecoResult<Vec<Recommendation>> {
    let locations = list_locations(service.as_ref(), project).await?;
    let queries: Vec<(String, String)> = recommenders
        .iter()
        .flat_map(|recommender| {
            locations
                .iter()
                .map(move |location| (location.clone(), recommender.clone()))
        })
        .collect();
    tracing::debug!(
        "Listing {} recommender queries for project {}",
        queries.len(),
        project
    );

    let project = project.to_string();
    let recommendations = fan_out(
        queries,
        concurrency,
        DEFAULT_QUERY_CONCURRENCY,
        task,
        move |(location, recommender), _subtask| {
            let service = Arc::clone(&service);
            let project = project.clone();
            async move {
                service
                    .list_recommendations(&project, &location, &recommender)
                    .await
            }
        },
    )
    .await?;

    task.mark_all_done();
    Ok(recommendations)
}

/// Result of listing a single project
#[derive(Debug)]
enum ProjectOutcome {
    Listed(Vec<Recommendation>),
    Blocked(ProjectRequirements),
}

/// Check requirements of `project`, then list it if they are all satisfied
async fn list_if_requirements_satisfied(
    service: Arc<dyn CloudService>,
    project: String,
    options: Arc<ListingOptions>,
    task: Task,
) -> RecoResult<ProjectOutcome> {
    // requirement check, then listing
    task.set_subtask_count(2);

    let _check = task.next_subtask();
    let requirements = list_project_requirements(service.as_ref(), &project).await?;
    task.mark_child_done();

    if requirements.iter().any(|r| !r.satisfied) {
        tracing::info!("Project {} does not meet requirements, skipping", project);
        task.mark_all_done();
        return Ok(ProjectOutcome::Blocked(ProjectRequirements {
            project,
            requirements,
        }));
    }

    let listing = task.next_subtask().unwrap_or_else(Task::root);
    let recommendations = list_project_recommendations(
        service,
        &project,
        &options.recommenders,
        options.query_concurrency,
        &listing,
    )
    .await?;
    task.mark_child_done();
    task.mark_all_done();
    Ok(ProjectOutcome::Listed(recommendations))
}

/// Recommendations of every project whose requirements are satisfied
///
/// Projects with unsatisfied requirements appear in
/// [`ListResult::failed_projects`] and contribute no recommendations. `task`
/// gets one subtask per project.
///
/// # Errors
/// The last remote error of any project; partial results are discarded.
pub async fn list_projects_recommendations(
    service: Arc<dyn CloudService>,
    projects: Vec<String>,
    options: &ListingOptions,
    task: &Task,
) -> RecoResult<ListResult> {
    tracing::info!("Listing recommendations for {} projects", projects.len());
    let options = Arc::new(options.clone());
    let concurrency = options.project_concurrency;
    let outcomes = fan_out(
        projects,
        concurrency,
        DEFAULT_PROJECT_CONCURRENCY,
        task,
        move |project, subtask| {
            let service = Arc::clone(&service);
            let options = Arc::clone(&options);
            async move {
                let outcome = list_if_requirements_satisfied(service, project, options, subtask).await?;
                Ok(vec![outcome])
            }
        },
    )
    .await?;

    let mut result = ListResult::default();
    for outcome in outcomes {
        match outcome {
            ProjectOutcome::Listed(recommendations) => result.recommendations.extend(recommendations),
            ProjectOutcome::Blocked(requirements) => result.failed_projects.push(requirements),
        }
    }
    task.mark_all_done();
    Ok(result)
}
