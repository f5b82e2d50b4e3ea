//! Builders for recommendations and operations in the recommender wire shape

use reco_core::{Operation, OperationGroup, Recommendation, RecommendationContent, StateInfo, ValueMatcher};
use serde_json::json;

pub const INSTANCE_TYPE: &str = "compute.googleapis.com/Instance";
pub const DISK_TYPE: &str = "compute.googleapis.com/Disk";
pub const SNAPSHOT_TYPE: &str = "compute.googleapis.com/Snapshot";

pub const MACHINE_TYPE_RECOMMENDER: &str = "google.compute.instance.MachineTypeRecommender";
pub const IDLE_INSTANCE_RECOMMENDER: &str = "google.compute.instance.IdleResourceRecommender";
pub const IDLE_DISK_RECOMMENDER: &str = "google.compute.disk.IdleResourceRecommender";

pub fn recommendation_name(project: &str, location: &str, recommender: &str, id: &str) -> String {
    format!("projects/{project}/locations/{location}/recommenders/{recommender}/recommendations/{id}")
}

/// Listing prefix shared by every recommendation of one recommender in one location
pub fn recommendation_parent(project: &str, location: &str, recommender: &str) -> String {
    format!("projects/{project}/locations/{location}/recommenders/{recommender}/recommendations/")
}

pub fn instance_resource(project: &str, zone: &str, instance: &str) -> String {
    format!("//compute.googleapis.com/projects/{project}/zones/{zone}/instances/{instance}")
}

pub fn disk_resource(project: &str, zone: &str, disk: &str) -> String {
    format!("//compute.googleapis.com/projects/{project}/zones/{zone}/disks/{disk}")
}

/// Machine type as reported on a live instance
pub fn machine_type_url(project: &str, zone: &str, machine_type: &str) -> String {
    format!("https://www.googleapis.com/compute/v1/projects/{project}/zones/{zone}/machineTypes/{machine_type}")
}

pub fn test_machine_type(resource: &str, zone: &str, machine_type: &str) -> Operation {
    Operation {
        action: "test".to_string(),
        resource: resource.to_string(),
        resource_type: INSTANCE_TYPE.to_string(),
        path: "/machineType".to_string(),
        value: None,
        value_matcher: Some(ValueMatcher {
            matches_pattern: format!(".*zones/{zone}/machineTypes/{machine_type}"),
        }),
    }
}

pub fn test_status(resource: &str, status: &str) -> Operation {
    Operation {
        action: "test".to_string(),
        resource: resource.to_string(),
        resource_type: INSTANCE_TYPE.to_string(),
        path: "/status".to_string(),
        value: Some(json!(status)),
        value_matcher: None,
    }
}

pub fn replace_machine_type(resource: &str, zone: &str, machine_type: &str) -> Operation {
    Operation {
        action: "replace".to_string(),
        resource: resource.to_string(),
        resource_type: INSTANCE_TYPE.to_string(),
        path: "/machineType".to_string(),
        value: Some(json!(format!("zones/{zone}/machineTypes/{machine_type}"))),
        value_matcher: None,
    }
}

pub fn stop_instance(resource: &str) -> Operation {
    Operation {
        action: "replace".to_string(),
        resource: resource.to_string(),
        resource_type: INSTANCE_TYPE.to_string(),
        path: "/status".to_string(),
        value: Some(json!("TERMINATED")),
        value_matcher: None,
    }
}

pub fn add_snapshot(disk_resource: &str) -> Operation {
    Operation {
        action: "add".to_string(),
        resource: "//compute.googleapis.com/projects/-/global/snapshots/$snapshot-name".to_string(),
        resource_type: SNAPSHOT_TYPE.to_string(),
        path: "/".to_string(),
        value: Some(json!({
            "name": "$snapshot-name",
            "source_disk": disk_resource,
            "storage_locations": ["us"]
        })),
        value_matcher: None,
    }
}

pub fn remove_disk(disk_resource: &str) -> Operation {
    Operation {
        action: "remove".to_string(),
        resource: disk_resource.to_string(),
        resource_type: DISK_TYPE.to_string(),
        path: "/".to_string(),
        value: None,
        value_matcher: None,
    }
}

/// An `ACTIVE` recommendation with a single operation group
pub fn recommendation(name: &str, operations: Vec<Operation>) -> Recommendation {
    Recommendation {
        name: name.to_string(),
        description: String::new(),
        recommender_subtype: String::new(),
        etag: "\"0\"".to_string(),
        state_info: StateInfo::default(),
        content: RecommendationContent {
            operation_groups: vec![OperationGroup { operations }],
        },
    }
}

/// Machine-type change: test the current type, then replace it
pub fn resize_recommendation(
    project: &str,
    zone: &str,
    instance: &str,
    id: &str,
    from: &str,
    to: &str,
) -> Recommendation {
    let resource = instance_resource(project, zone, instance);
    recommendation(
        &recommendation_name(project, zone, MACHINE_TYPE_RECOMMENDER, id),
        vec![
            test_machine_type(&resource, zone, from),
            replace_machine_type(&resource, zone, to),
        ],
    )
}

/// Idle disk clean-up: snapshot the disk, then delete it
pub fn idle_disk_recommendation(project: &str, zone: &str, disk: &str, id: &str) -> Recommendation {
    let resource = disk_resource(project, zone, disk);
    recommendation(
        &recommendation_name(project, zone, IDLE_DISK_RECOMMENDER, id),
        vec![add_snapshot(&resource), remove_disk(&resource)],
    )
}

/// Idle instance: check it is running, then stop it
pub fn idle_instance_recommendation(project: &str, zone: &str, instance: &str, id: &str) -> Recommendation {
    let resource = instance_resource(project, zone, instance);
    recommendation(
        &recommendation_name(project, zone, IDLE_INSTANCE_RECOMMENDER, id),
        vec![test_status(&resource, "RUNNING"), stop_instance(&resource)],
    )
}
