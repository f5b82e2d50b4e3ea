//! Apply Tests
//!
//! Drives recommendations through claim, execute and finalize against the
//! in-memory cloud service.
//!
use pretty_assertions::assert_eq;
use reco_core::prelude::*;
use reco_core::{apply_by_name, apply_recommendation, snapshot::MAX_SNAPSHOT_NAME_LEN};
use reco_fake::fixtures::{self, machine_type_url};
use reco_fake::{FakeCloudService, RUNNING, TERMINATED};

const PROJECT: &str = "rightsizer-test";
const ZONE: &str = "us-east1-b";

fn service_with_instance(machine_type: &str) -> FakeCloudService {
    let service = FakeCloudService::new();
    service.add_instance(
        PROJECT,
        ZONE,
        reco_core::Instance {
            name: "alicja-test".to_string(),
            machine_type: machine_type_url(PROJECT, ZONE, machine_type),
            status: RUNNING.to_string(),
        },
    );
    service
}

fn side_effects(service: &FakeCloudService) -> usize {
    ["stop_instance", "start_instance", "change_machine_type", "create_snapshot", "delete_disk"]
        .iter()
        .map(|method| service.calls_to(method))
        .sum()
}

#[tokio::test]
async fn test_resize_succeeds() {
    let service = service_with_instance("n1-standard-4");
    let rec = fixtures::resize_recommendation(PROJECT, ZONE, "alicja-test", "r1", "n1-standard-4", "custom-2-5120");
    service.add_recommendation(rec.clone());

    let task = Task::root();
    apply_by_name(&service, &rec.name, &task).await.unwrap();

    let instance = service.instance(PROJECT, ZONE, "alicja-test").unwrap();
    assert_eq!(instance.machine_type, machine_type_url(PROJECT, ZONE, "custom-2-5120"));
    assert_eq!(instance.status, RUNNING);
    assert_eq!(service.recommendation(&rec.name).unwrap().state(), RecommendationState::Succeeded);
    assert_eq!(task.progress(), Progress::COMPLETE);

    let order: Vec<_> = service
        .calls()
        .into_iter()
        .map(|call| call.method)
        .filter(|method| method.ends_with("_instance") || *method == "change_machine_type")
        .collect();
    assert_eq!(order, vec!["get_instance", "stop_instance", "change_machine_type", "start_instance"]);
}

#[tokio::test]
async fn test_failed_test_operation_marks_failed_without_side_effects() {
    let service = service_with_instance("e2-standard-2");
    let rec = fixtures::resize_recommendation(PROJECT, ZONE, "alicja-test", "r1", "n1-standard-4", "custom-2-5120");
    service.add_recommendation(rec.clone());

    let err = apply_by_name(&service, &rec.name, &Task::root()).await.unwrap_err();

    assert_eq!(err, RecoError::TestFailed { field: "machine type".to_string() });
    assert_eq!(service.recommendation(&rec.name).unwrap().state(), RecommendationState::Failed);
    assert_eq!(side_effects(&service), 0);
}

#[tokio::test]
async fn test_claim_failure_is_returned_without_marking_failed() {
    let service = service_with_instance("n1-standard-4");
    let rec = fixtures::resize_recommendation(PROJECT, ZONE, "alicja-test", "r1", "n1-standard-4", "e2-small");
    service.add_recommendation(rec.clone());
    service.fail_on("mark_recommendation_claimed", "", RecoError::remote(409, "already claimed"));

    let task = Task::root();
    let err = apply_recommendation(&service, &rec, &task).await.unwrap_err();

    assert_eq!(err, RecoError::remote(409, "already claimed"));
    assert_eq!(service.calls_to("mark_recommendation_failed"), 0);
    assert_eq!(service.calls_to("get_instance"), 0);
    assert_eq!(task.progress(), Progress::COMPLETE);
}

#[tokio::test]
async fn test_mark_failed_error_does_not_mask_cause() {
    let service = service_with_instance("n1-standard-4");
    let rec = fixtures::resize_recommendation(PROJECT, ZONE, "alicja-test", "r1", "n1-standard-4", "e2-small");
    service.add_recommendation(rec.clone());
    service.fail_on("stop_instance", "alicja-test", RecoError::remote(500, "stop failed"));
    service.fail_on("mark_recommendation_failed", "", RecoError::remote(503, "recommender down"));

    let err = apply_by_name(&service, &rec.name, &Task::root()).await.unwrap_err();

    assert_eq!(err, RecoError::remote(500, "stop failed"));
    assert_eq!(service.calls_to("mark_recommendation_failed"), 1);
    assert_eq!(service.calls_to("change_machine_type"), 0);
}

#[tokio::test]
async fn test_unsupported_operation_fails_apply() {
    let service = FakeCloudService::new();
    let mut operation = fixtures::stop_instance(&fixtures::instance_resource(PROJECT, ZONE, "vm"));
    operation.path = "/labels".to_string();
    let rec = fixtures::recommendation("projects/p/locations/l/recommenders/r/recommendations/x", vec![operation]);
    service.add_recommendation(rec.clone());

    let err = apply_by_name(&service, &rec.name, &Task::root()).await.unwrap_err();

    assert!(matches!(err, RecoError::UnsupportedOperation { .. }));
    assert_eq!(err.status_code(), 400);
    assert_eq!(service.recommendation(&rec.name).unwrap().state(), RecommendationState::Failed);
}

#[tokio::test]
async fn test_idle_disk_is_snapshotted_then_deleted() {
    let service = FakeCloudService::new();
    let disk = "vertical-scaling-krzysztofk-wordpress";
    service.add_disk(PROJECT, "europe-west1-d", disk);
    let rec = fixtures::idle_disk_recommendation(PROJECT, "europe-west1-d", disk, "d1");
    service.add_recommendation(rec.clone());

    apply_by_name(&service, &rec.name, &Task::root()).await.unwrap();

    assert!(!service.has_disk(PROJECT, "europe-west1-d", disk));
    let snapshots = service.snapshot_names();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].starts_with("vertical-scaling-krz-europe-west1-d-"));
    assert!(snapshots[0].len() <= MAX_SNAPSHOT_NAME_LEN);
}

#[tokio::test]
async fn test_idle_instance_is_stopped() {
    let service = service_with_instance("n1-standard-4");
    let rec = fixtures::idle_instance_recommendation(PROJECT, ZONE, "alicja-test", "i1");
    service.add_recommendation(rec.clone());

    apply_by_name(&service, &rec.name, &Task::root()).await.unwrap();

    assert_eq!(service.instance(PROJECT, ZONE, "alicja-test").unwrap().status, TERMINATED);
    assert_eq!(service.calls_to("start_instance"), 0);
}

#[tokio::test]
async fn test_missing_recommendation_is_remote_error() {
    let service = FakeCloudService::new();
    let err = apply_by_name(&service, "projects/p/recommendations/none", &Task::root())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(service.calls_to("mark_recommendation_claimed"), 0);
}
