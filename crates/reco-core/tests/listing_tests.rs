//! Listing and Requirements Tests
//!
//! Project gating, fan-out failure semantics and requirement ordering against
//! the in-memory cloud service.
//!
use pretty_assertions::assert_eq;
use reco_core::prelude::*;
use reco_core::{
    list_project_recommendations, list_project_requirements, list_projects_recommendations,
    list_requirements, REQUIRED_APIS, REQUIRED_PERMISSIONS,
};
use reco_fake::{fixtures, FakeCloudService, FakeProject};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ZONES: [&str; 2] = ["us-east1-b", "europe-west1-d"];
const REGIONS: [&str; 1] = ["us-east1"];

fn fleet(projects: &[&str]) -> Arc<FakeCloudService> {
    let service = FakeCloudService::new();
    for project in projects {
        service.add_project(FakeProject::new(*project).with_zones(ZONES).with_regions(REGIONS));
        service.add_recommendation(fixtures::resize_recommendation(
            project, "us-east1-b", "vm", "r1", "n1-standard-4", "e2-small",
        ));
        service.add_recommendation(fixtures::idle_disk_recommendation(project, "europe-west1-d", "disk", "d1"));
    }
    Arc::new(service)
}

fn names(result: &ListResult) -> Vec<String> {
    let mut names: Vec<_> = result.recommendations.iter().map(|r| r.name.clone()).collect();
    names.sort();
    names
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lists_every_location_and_recommender() {
    let service = fleet(&["p1"]);
    let recommenders: Vec<String> = reco_core::DEFAULT_RECOMMENDERS.iter().map(ToString::to_string).collect();

    let task = Task::root();
    let recs = list_project_recommendations(service.clone(), "p1", &recommenders, 2, &task)
        .await
        .unwrap();

    assert_eq!(recs.len(), 2);
    assert_eq!(
        service.calls_to("list_recommendations"),
        recommenders.len() * (ZONES.len() + REGIONS.len())
    );
    assert_eq!(task.subtask_count(), 9);
    assert_eq!(task.progress(), Progress::COMPLETE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocked_project_reports_all_requirements() {
    let service = fleet(&["p1", "p2", "p3"]);
    service.add_project(
        FakeProject::new("p2")
            .with_zones(ZONES)
            .with_regions(REGIONS)
            .deny_permission("compute.disks.delete"),
    );

    let projects = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
    let result = list_projects_recommendations(service.clone(), projects, &ListingOptions::default(), &Task::root())
        .await
        .unwrap();

    assert_eq!(result.failed_projects.len(), 1);
    let blocked = &result.failed_projects[0];
    assert_eq!(blocked.project, "p2");
    assert_eq!(blocked.requirements.len(), REQUIRED_PERMISSIONS.len());
    assert_eq!(blocked.requirements.iter().filter(|r| !r.satisfied).count(), 1);
    assert!(result.recommendations.iter().all(|r| !r.name.starts_with("projects/p2/")));
    assert_eq!(result.recommendations.len(), 4);
    assert!(service
        .calls()
        .iter()
        .filter(|call| call.method == "list_recommendations")
        .all(|call| call.args[0] != "p2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_failing_query_fails_whole_listing() {
    let service = fleet(&["p1", "p2"]);
    service.fail_on("list_recommendations", "us-east1", RecoError::remote(503, "backend unavailable"));

    let result = list_projects_recommendations(
        service.clone(),
        vec!["p1".to_string(), "p2".to_string()],
        &ListingOptions::default(),
        &Task::root(),
    )
    .await;

    assert_eq!(result, Err(RecoError::remote(503, "backend unavailable")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_listing_result_independent_of_concurrency() {
    let projects = ["a", "b", "c", "d", "e"];
    let mut expected = None;
    for workers in [1, 2, 5, 16] {
        let service = fleet(&projects);
        let options = ListingOptions {
            query_concurrency: workers,
            project_concurrency: workers,
            ..ListingOptions::default()
        };
        let result = list_projects_recommendations(
            service.clone(),
            projects.iter().map(ToString::to_string).collect(),
            &options,
            &Task::root(),
        )
        .await
        .unwrap();

        assert_eq!(service.calls_to("list_recommendations"), projects.len() * 3 * 3);

        let names = names(&result);
        match &expected {
            None => expected = Some(names),
            Some(expected) => assert_eq!(&names, expected),
        }
    }
}

#[tokio::test]
async fn test_api_checks_skipped_while_permissions_missing() {
    let service = FakeCloudService::new();
    service.add_project(FakeProject::new("p1").deny_permission("compute.zones.list"));

    let requirements = list_project_requirements(&service, "p1").await.unwrap();

    assert_eq!(requirements.len(), REQUIRED_PERMISSIONS.len());
    assert_eq!(service.calls_to("list_api_requirements"), 0);
}

#[tokio::test]
async fn test_api_requirements_follow_permissions() {
    let service = FakeCloudService::new();
    service.add_project(FakeProject::new("p1").disable_api("recommender.googleapis.com"));

    let requirements = list_project_requirements(&service, "p1").await.unwrap();

    assert_eq!(requirements.len(), REQUIRED_PERMISSIONS.len() + REQUIRED_APIS.len());
    let unsatisfied: Vec<_> = requirements.iter().filter(|r| !r.satisfied).map(|r| r.name.as_str()).collect();
    assert_eq!(unsatisfied, vec!["recommender.googleapis.com"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requirements_keep_project_order() {
    let projects: Vec<String> = (0..20).map(|i| format!("p{i}")).collect();
    let service = FakeCloudService::new();
    for project in &projects {
        service.add_project(FakeProject::new(project));
    }

    let task = Task::root();
    let checked = list_requirements(Arc::new(service), projects.clone(), 4, &task)
        .await
        .unwrap();

    let order: Vec<_> = checked.iter().map(|p| p.project.clone()).collect();
    assert_eq!(order, projects);
    assert!(checked.iter().all(ProjectRequirements::all_satisfied));
    assert_eq!(task.progress(), Progress::COMPLETE);
}

#[tokio::test]
async fn test_requirements_error_fails_check() {
    let service = FakeCloudService::new();
    service.add_project(FakeProject::new("p1"));

    let result = list_requirements(
        Arc::new(service),
        vec!["p1".to_string(), "unknown".to_string()],
        0,
        &Task::root(),
    )
    .await;

    assert_eq!(result.unwrap_err().status_code(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_zero_concurrency_runs_projects_in_parallel() {
    let latency = Duration::from_millis(20);
    let projects: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
    let service = FakeCloudService::new().with_latency(latency);
    for project in &projects {
        service.add_project(FakeProject::new(project));
    }

    let started = Instant::now();
    let checked = list_requirements(Arc::new(service), projects.clone(), 0, &Task::root())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(checked.len(), projects.len());
    // two calls per project, one after the other when run serially
    let serial = latency * 2 * u32::try_from(projects.len()).unwrap();
    assert!(elapsed < serial / 2, "took {elapsed:?}, serial would be {serial:?}");
}
