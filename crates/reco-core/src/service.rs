//! Capability interface to the cloud APIs
//!
//! Every remote call the orchestration core makes goes through
//! [`CloudService`]. Implementations are expected to be bound to a single
//! requester's credentials and to perform their own retries.

use crate::error::RecoResult;
use crate::types::{Instance, Recommendation, Requirement};
use async_trait::async_trait;

/// Remote operations used to list, check and apply recommendations
#[async_trait]
pub trait CloudService: Send + Sync {
    /// Fetch a recommendation by its full name
    async fn get_recommendation(&self, name: &str) -> RecoResult<Recommendation>;

    /// List recommendations of one recommender in one location of a project
    async fn list_recommendations(
        &self,
        project: &str,
        location: &str,
        recommender_id: &str,
    ) -> RecoResult<Vec<Recommendation>>;

    /// Names of every zone available to the project
    async fn list_zone_names(&self, project: &str) -> RecoResult<Vec<String>>;

    /// Names of every region available to the project
    async fn list_region_names(&self, project: &str) -> RecoResult<Vec<String>>;

    /// Status of each required API
    async fn list_api_requirements(
        &self,
        project: &str,
        apis: &[&str],
    ) -> RecoResult<Vec<Requirement>>;

    /// Status of each permission group; a group is satisfied by any one member
    async fn list_permission_requirements(
        &self,
        project: &str,
        permission_groups: &[&[&str]],
    ) -> RecoResult<Vec<Requirement>>;

    /// Fetch a compute instance
    async fn get_instance(&self, project: &str, zone: &str, instance: &str)
        -> RecoResult<Instance>;

    /// Stop a compute instance and wait for it to terminate
    async fn stop_instance(&self, project: &str, zone: &str, instance: &str) -> RecoResult<()>;

    /// Start a compute instance and wait for it to run
    async fn start_instance(&self, project: &str, zone: &str, instance: &str) -> RecoResult<()>;

    /// Change the machine type of a stopped instance
    async fn change_machine_type(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        machine_type: &str,
    ) -> RecoResult<()>;

    /// Create a snapshot of a disk under the given name
    async fn create_snapshot(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        name: &str,
    ) -> RecoResult<()>;

    /// Delete a persistent disk
    async fn delete_disk(&self, project: &str, zone: &str, disk: &str) -> RecoResult<()>;

    /// Mark a recommendation claimed; returns it with a fresh etag
    async fn mark_recommendation_claimed(
        &self,
        name: &str,
        etag: &str,
    ) -> RecoResult<Recommendation>;

    /// Mark a recommendation succeeded
    async fn mark_recommendation_succeeded(
        &self,
        name: &str,
        etag: &str,
    ) -> RecoResult<Recommendation>;

    /// Mark a recommendation failed
    async fn mark_recommendation_failed(
        &self,
        name: &str,
        etag: &str,
    ) -> RecoResult<Recommendation>;
}
