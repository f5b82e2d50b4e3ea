//! Project requirement checks
//!
//! A project is usable when the requester holds every required permission
//! group and every required API is enabled. API checks are skipped while any
//! permission is missing, since the API status cannot be read without them.

use crate::error::RecoResult;
use crate::fanout::{fan_out, DEFAULT_PROJECT_CONCURRENCY};
use crate::progress::Task;
use crate::service::CloudService;
use crate::types::{ProjectRequirements, Requirement};
use std::sync::Arc;

/// APIs that must be enabled in every project
pub const REQUIRED_APIS: &[&str] = &[
    "compute.googleapis.com",
    "recommender.googleapis.com",
    "cloudresourcemanager.googleapis.com",
];

/// Permission groups the requester must hold; any one member satisfies a group
pub const REQUIRED_PERMISSIONS: &[&[&str]] = &[
    &["compute.instances.setMachineType"],
    &["compute.disks.createSnapshot", "compute.snapshots.create"],
    &["compute.disks.delete"],
    &["compute.instances.get"],
    &["recommender.computeDiskIdleResourceRecommendations.list"],
    &["recommender.computeInstanceIdleResourceRecommendations.list"],
    &["recommender.computeInstanceMachineTypeRecommendations.list"],
    &["recommender.computeDiskIdleResourceRecommendations.get"],
    &["recommender.computeInstanceIdleResourceRecommendations.get"],
    &["recommender.computeInstanceMachineTypeRecommendations.get"],
    &["recommender.computeDiskIdleResourceRecommendations.update"],
    &["recommender.computeInstanceIdleResourceRecommendations.update"],
    &["recommender.computeInstanceMachineTypeRecommendations.update"],
    &["compute.regions.list"],
    &["compute.zones.list"],
    &["compute.instances.start"],
    &["compute.instances.stop"],
    &["serviceusage.services.get"],
];

/// Name of a permission-group requirement
#[must_use]
pub fn permission_group_name(group: &[&str]) -> String {
    group.join(" or ")
}

/// Every requirement of `project` with its status
///
/// Permissions come first. When one of them is unsatisfied only the
/// permission requirements are returned.
///
/// # Errors
/// Remote errors from either capability call.
pub async fn list_project_requirements(
    service: &dyn CloudService,
    project: &str,
) -> RecoResult<Vec<Requirement>> {
    let mut requirements = service
        .list_permission_requirements(project, REQUIRED_PERMISSIONS)
        .await?;
    if requirements.iter().any(|r| !r.satisfied) {
        tracing::debug!("Project {} lacks permissions, skipping API checks", project);
        return Ok(requirements);
    }

    let apis = service.list_api_requirements(project, REQUIRED_APIS).await?;
    requirements.extend(apis);
    Ok(requirements)
}

/// Requirement statuses of `project`
///
/// # Errors
/// See [`list_project_requirements`].
pub async fn check_project(
    service: &dyn CloudService,
    project: &str,
) -> RecoResult<ProjectRequirements> {
    Ok(ProjectRequirements {
        project: project.to_string(),
        requirements: list_project_requirements(service, project).await?,
    })
}

/// Requirement statuses of every project, in the order given
///
/// `task` gets one subtask per project and is marked done on success. A
/// `concurrency` of zero uses [`DEFAULT_PROJECT_CONCURRENCY`] workers.
///
/// # Errors
/// The last remote error of any project; no partial result is returned.
pub async fn list_requirements(
    service: Arc<dyn CloudService>,
    projects: Vec<String>,
    concurrency: usize,
    task: &Task,
) -> RecoResult<Vec<ProjectRequirements>> {
    let indexed: Vec<(usize, String)> = projects.into_iter().enumerate().collect();
    let mut checked = fan_out(
        indexed,
        concurrency,
        DEFAULT_PROJECT_CONCURRENCY,
        task,
        move |(index, project), _subtask| {
            let service = Arc::clone(&service);
            async move {
                let requirements = check_project(service.as_ref(), &project).await?;
                Ok(vec![(index, requirements)])
            }
        },
    )
    .await?;

    checked.sort_unstable_by_key(|(index, _)| *index);
    task.mark_all_done();
    Ok(checked.into_iter().map(|(_, requirements)| requirements).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_names_join_alternatives() {
        assert_eq!(
            permission_group_name(&["compute.disks.createSnapshot", "compute.snapshots.create"]),
            "compute.disks.createSnapshot or compute.snapshots.create"
        );
        assert_eq!(permission_group_name(&["compute.zones.list"]), "compute.zones.list");
    }

    #[test]
    fn required_lists_are_distinct() {
        let mut names: Vec<_> = REQUIRED_PERMISSIONS
            .iter()
            .map(|g| permission_group_name(g))
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), REQUIRED_PERMISSIONS.len());
        assert!(REQUIRED_APIS.contains(&"recommender.googleapis.com"));
    }
}
