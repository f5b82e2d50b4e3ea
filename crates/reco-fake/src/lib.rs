//! In-memory cloud service for the Reco workspace
//!
//! [`FakeCloudService`] implements [`CloudService`] over plain maps. Every call
//! is journaled, failures can be injected per method, and an optional latency
//! makes progress observable while a request runs.

#![allow(missing_docs)]

pub mod fixtures;

use async_trait::async_trait;
use parking_lot::Mutex;
use reco_core::requirements::permission_group_name;
use reco_core::{CloudService, Instance, Recommendation, RecommendationState, RecoError, RecoResult, Requirement};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

pub const RUNNING: &str = "RUNNING";
pub const TERMINATED: &str = "TERMINATED";

/// One recorded capability call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub args: Vec<String>,
}

impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.method, self.args.join(", "))
    }
}

/// Project as seen by the fake
#[derive(Debug, Clone, Default)]
pub struct FakeProject {
    pub id: String,
    pub zones: Vec<String>,
    pub regions: Vec<String>,
    pub denied_permissions: HashSet<String>,
    pub disabled_apis: HashSet<String>,
}

impl FakeProject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn deny_permission(mut self, permission: impl Into<String>) -> Self {
        self.denied_permissions.insert(permission.into());
        self
    }

    #[must_use]
    pub fn disable_api(mut self, api: impl Into<String>) -> Self {
        self.disabled_apis.insert(api.into());
        self
    }
}

#[derive(Debug, Clone)]
struct Failure {
    method: &'static str,
    needle: String,
    error: RecoError,
}

type ZonalKey = (String, String, String);

#[derive(Debug, Default)]
struct FakeState {
    projects: HashMap<String, FakeProject>,
    recommendations: BTreeMap<String, Recommendation>,
    instances: HashMap<ZonalKey, Instance>,
    disks: HashSet<ZonalKey>,
    snapshots: Vec<(String, String, String, String)>,
    failures: Vec<Failure>,
    calls: Vec<Call>,
    etag_counter: u64,
}

/// In-memory [`CloudService`]
#[derive(Debug, Default)]
pub struct FakeCloudService {
    state: Mutex<FakeState>,
    latency: Option<Duration>,
}

impl FakeCloudService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn add_project(&self, project: FakeProject) {
        self.state.lock().projects.insert(project.id.clone(), project);
    }

    pub fn add_recommendation(&self, recommendation: Recommendation) {
        self.state
            .lock()
            .recommendations
            .insert(recommendation.name.clone(), recommendation);
    }

    pub fn add_instance(&self, project: &str, zone: &str, instance: Instance) {
        let key = (project.to_string(), zone.to_string(), instance.name.clone());
        self.state.lock().instances.insert(key, instance);
    }

    pub fn add_disk(&self, project: &str, zone: &str, disk: &str) {
        self.state
            .lock()
            .disks
            .insert((project.to_string(), zone.to_string(), disk.to_string()));
    }

    /// Fail every call to `method` that has `needle` as one of its arguments
    ///
    /// An empty needle matches every call to `method`.
    pub fn fail_on(&self, method: &'static str, needle: impl Into<String>, error: RecoError) {
        self.state.lock().failures.push(Failure {
            method,
            needle: needle.into(),
            error,
        });
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn recommendation(&self, name: &str) -> Option<Recommendation> {
        self.state.lock().recommendations.get(name).cloned()
    }

    pub fn instance(&self, project: &str, zone: &str, instance: &str) -> Option<Instance> {
        let key = (project.to_string(), zone.to_string(), instance.to_string());
        self.state.lock().instances.get(&key).cloned()
    }

    pub fn has_disk(&self, project: &str, zone: &str, disk: &str) -> bool {
        let key = (project.to_string(), zone.to_string(), disk.to_string());
        self.state.lock().disks.contains(&key)
    }

    /// Snapshot names created so far, in creation order
    pub fn snapshot_names(&self) -> Vec<String> {
        self.state
            .lock()
            .snapshots
            .iter()
            .map(|(_, _, _, name)| name.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Journal the call and return the injected failure, if any
    async fn enter(&self, method: &'static str, args: &[&str]) -> RecoResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock();
        state.calls.push(Call {
            method,
            args: args.iter().map(ToString::to_string).collect(),
        });
        let failure = state.failures.iter().find(|failure| {
            failure.method == method
                && (failure.needle.is_empty() || args.iter().any(|arg| *arg == failure.needle))
        });
        match failure {
            Some(failure) => {
                tracing::debug!("Injected failure for {}", method);
                Err(failure.error.clone())
            }
            None => Ok(()),
        }
    }

    fn project(&self, project: &str) -> RecoResult<FakeProject> {
        self.state
            .lock()
            .projects
            .get(project)
            .cloned()
            .ok_or_else(|| not_found(format!("project {project}")))
    }

    fn transition(
        &self,
        name: &str,
        etag: &str,
        allowed: &[RecommendationState],
        target: RecommendationState,
    ) -> RecoResult<Recommendation> {
        let mut state = self.state.lock();
        state.etag_counter += 1;
        let next_etag = format!("\"{}\"", state.etag_counter);
        let recommendation = state
            .recommendations
            .get_mut(name)
            .ok_or_else(|| not_found(format!("recommendation {name}")))?;
        if recommendation.etag != etag {
            return Err(RecoError::remote(400, format!("etag mismatch for {name}")));
        }
        if !allowed.contains(&recommendation.state()) {
            return Err(RecoError::remote(
                400,
                format!("recommendation {name} is {}", recommendation.state()),
            ));
        }
        recommendation.state_info.state = target;
        recommendation.etag = next_etag;
        Ok(recommendation.clone())
    }

    fn with_instance<T>(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        update: impl FnOnce(&mut Instance) -> T,
    ) -> RecoResult<T> {
        let key = (project.to_string(), zone.to_string(), instance.to_string());
        let mut state = self.state.lock();
        let instance = state
            .instances
            .get_mut(&key)
            .ok_or_else(|| not_found(format!("instance {instance}")))?;
        Ok(update(instance))
    }
}

fn not_found(what: String) -> RecoError {
    RecoError::remote(404, format!("{what} was not found"))
}

#[async_trait]
impl CloudService for FakeCloudService {
    async fn get_recommendation(&self, name: &str) -> RecoResult<Recommendation> {
        self.enter("get_recommendation", &[name]).await?;
        self.recommendation(name)
            .ok_or_else(|| not_found(format!("recommendation {name}")))
    }

    async fn list_recommendations(
        &self,
        project: &str,
        location: &str,
        recommender_id: &str,
    ) -> RecoResult<Vec<Recommendation>> {
        self.enter("list_recommendations", &[project, location, recommender_id])
            .await?;
        let parent = fixtures::recommendation_parent(project, location, recommender_id);
        Ok(self
            .state
            .lock()
            .recommendations
            .values()
            .filter(|r| r.name.starts_with(&parent))
            .cloned()
            .collect())
    }

    async fn list_zone_names(&self, project: &str) -> RecoResult<Vec<String>> {
        self.enter("list_zone_names", &[project]).await?;
        Ok(self.project(project)?.zones)
    }

    async fn list_region_names(&self, project: &str) -> RecoResult<Vec<String>> {
        self.enter("list_region_names", &[project]).await?;
        Ok(self.project(project)?.regions)
    }

    async fn list_api_requirements(
        &self,
        project: &str,
        apis: &[&str],
    ) -> RecoResult<Vec<Requirement>> {
        self.enter("list_api_requirements", &[project]).await?;
        let fake = self.project(project)?;
        Ok(apis
            .iter()
            .map(|api| {
                if fake.disabled_apis.contains(*api) {
                    Requirement::unsatisfied(*api, format!("{api} is disabled in project {project}"))
                } else {
                    Requirement::satisfied(*api)
                }
            })
            .collect())
    }

    async fn list_permission_requirements(
        &self,
        project: &str,
        permission_groups: &[&[&str]],
    ) -> RecoResult<Vec<Requirement>> {
        self.enter("list_permission_requirements", &[project]).await?;
        let fake = self.project(project)?;
        Ok(permission_groups
            .iter()
            .map(|group| {
                let name = permission_group_name(group);
                if group.iter().any(|p| !fake.denied_permissions.contains(*p)) {
                    Requirement::satisfied(name)
                } else {
                    Requirement::unsatisfied(name, "At least one of these permissions is needed. None found.")
                }
            })
            .collect())
    }

    async fn get_instance(&self, project: &str, zone: &str, instance: &str) -> RecoResult<Instance> {
        self.enter("get_instance", &[project, zone, instance]).await?;
        self.with_instance(project, zone, instance, |i| i.clone())
    }

    async fn stop_instance(&self, project: &str, zone: &str, instance: &str) -> RecoResult<()> {
        self.enter("stop_instance", &[project, zone, instance]).await?;
        self.with_instance(project, zone, instance, |i| i.status = TERMINATED.to_string())
    }

    async fn start_instance(&self, project: &str, zone: &str, instance: &str) -> RecoResult<()> {
        self.enter("start_instance", &[project, zone, instance]).await?;
        self.with_instance(project, zone, instance, |i| i.status = RUNNING.to_string())
    }

    async fn change_machine_type(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        machine_type: &str,
    ) -> RecoResult<()> {
        self.enter("change_machine_type", &[project, zone, instance, machine_type])
            .await?;
        let url = fixtures::machine_type_url(project, zone, machine_type);
        self.with_instance(project, zone, instance, |i| i.machine_type = url)
    }

    async fn create_snapshot(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        name: &str,
    ) -> RecoResult<()> {
        self.enter("create_snapshot", &[project, zone, disk, name]).await?;
        if !self.has_disk(project, zone, disk) {
            return Err(not_found(format!("disk {disk}")));
        }
        self.state.lock().snapshots.push((
            project.to_string(),
            zone.to_string(),
            disk.to_string(),
            name.to_string(),
        ));
        Ok(())
    }

    async fn delete_disk(&self, project: &str, zone: &str, disk: &str) -> RecoResult<()> {
        self.enter("delete_disk", &[project, zone, disk]).await?;
        let key = (project.to_string(), zone.to_string(), disk.to_string());
        if self.state.lock().disks.remove(&key) {
            Ok(())
        } else {
            Err(not_found(format!("disk {disk}")))
        }
    }

    async fn mark_recommendation_claimed(&self, name: &str, etag: &str) -> RecoResult<Recommendation> {
        self.enter("mark_recommendation_claimed", &[name, etag]).await?;
        self.transition(
            name,
            etag,
            &[RecommendationState::Active, RecommendationState::Claimed],
            RecommendationState::Claimed,
        )
    }

    async fn mark_recommendation_succeeded(&self, name: &str, etag: &str) -> RecoResult<Recommendation> {
        self.enter("mark_recommendation_succeeded", &[name, etag]).await?;
        self.transition(
            name,
            etag,
            &[RecommendationState::Claimed],
            RecommendationState::Succeeded,
        )
    }

    async fn mark_recommendation_failed(&self, name: &str, etag: &str) -> RecoResult<Recommendation> {
        self.enter("mark_recommendation_failed", &[name, etag]).await?;
        self.transition(
            name,
            etag,
            &[RecommendationState::Claimed],
            RecommendationState::Failed,
        )
    }
}
