//! End-to-end simulator over the in-memory cloud service
//!
//! Builds a fleet of fake projects, then drives a requirements check, a
//! listing and one apply through the [`Orchestrator`], polling each request
//! the way a client would.

use crate::config::OrchestratorConfig;
use crate::handle::Poll;
use crate::orchestrator::{ApplyStatus, Orchestrator};
use reco_core::{CloudService, Instance, RecoError, RecoResult};
use reco_fake::{fixtures, FakeCloudService, FakeProject, RUNNING};
use std::sync::Arc;
use std::time::Duration;

/// Requester identity used by the simulator
pub const SIMULATED_REQUESTER: &str = "simulator@example.com";

const RESIZE_ZONE: &str = "us-east1-b";
const DISK_ZONE: &str = "europe-west1-d";
const REGION: &str = "us-east1";

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Number of fake projects
    pub projects: usize,
    /// How many of them lack a required permission
    pub blocked: usize,
    /// Index of a project whose recommender queries fail
    pub fail_project: Option<usize>,
    /// Latency of every fake capability call
    pub latency: Duration,
    /// Delay between polls
    pub poll_interval: Duration,
    /// Orchestrator configuration
    pub orchestrator: OrchestratorConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            projects: 5,
            blocked: 1,
            fail_project: None,
            latency: Duration::from_millis(5),
            poll_interval: Duration::from_millis(20),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Outcome of a simulator run
#[derive(Debug, Clone, Default)]
pub struct SimulatorReport {
    /// Projects simulated
    pub projects: usize,
    /// Projects the requirements check found blocked
    pub blocked_by_check: usize,
    /// Recommendations listed
    pub recommendations: usize,
    /// Projects skipped by the listing
    pub failed_projects: usize,
    /// Error of the listing, if it failed
    pub listing_error: Option<String>,
    /// Recommendation applied and its final status
    pub applied: Option<(String, ApplyStatus)>,
    /// Polls issued across every request
    pub polls: usize,
    /// Expected number of blocked projects
    pub expected_blocked: usize,
    /// Whether the listing was expected to fail
    pub expect_listing_failure: bool,
}

impl SimulatorReport {
    /// Whether every observation matches what the fleet was built to produce
    #[must_use]
    pub fn passed(&self) -> bool {
        let listing_ok = if self.expect_listing_failure {
            self.listing_error.is_some() && self.recommendations == 0
        } else {
            self.listing_error.is_none() && self.failed_projects == self.expected_blocked
        };
        let apply_ok = match &self.applied {
            Some((_, status)) => *status == ApplyStatus::Succeeded,
            None => self.expect_listing_failure || self.expected_blocked == self.projects,
        };
        self.blocked_by_check == self.expected_blocked && listing_ok && apply_ok
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Reco Simulator Report ===\n\n");
        report.push_str(&format!("Projects: {}\n", self.projects));
        report.push_str(&format!(
            "Blocked by requirements check: {} (expected {})\n",
            self.blocked_by_check, self.expected_blocked
        ));
        match &self.listing_error {
            Some(error) => report.push_str(&format!("Listing failed: {error}\n")),
            None => {
                report.push_str(&format!("Recommendations listed: {}\n", self.recommendations));
                report.push_str(&format!("Projects skipped: {}\n", self.failed_projects));
            }
        }
        if let Some((name, status)) = &self.applied {
            report.push_str(&format!("Applied {name}: {status}\n"));
        }
        report.push_str(&format!("Polls: {}\n", self.polls));
        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

fn project_id(index: usize) -> String {
    format!("sim-project-{index}")
}

/// Populate a fake service according to `config`
#[must_use]
pub fn build_fleet(config: &SimulatorConfig) -> FakeCloudService {
    let service = FakeCloudService::new().with_latency(config.latency);
    for index in 0..config.projects {
        let id = project_id(index);
        let mut project = FakeProject::new(&id)
            .with_zones([RESIZE_ZONE, DISK_ZONE])
            .with_regions([REGION]);
        if index < config.blocked {
            project = project.deny_permission("compute.instances.setMachineType");
        }
        service.add_project(project);

        let instance = format!("vm-{index}");
        service.add_instance(
            &id,
            RESIZE_ZONE,
            Instance {
                name: instance.clone(),
                machine_type: fixtures::machine_type_url(&id, RESIZE_ZONE, "n1-standard-4"),
                status: RUNNING.to_string(),
            },
        );
        service.add_recommendation(fixtures::resize_recommendation(
            &id,
            RESIZE_ZONE,
            &instance,
            &format!("resize-{index}"),
            "n1-standard-4",
            "e2-small",
        ));

        let disk = format!("disk-{index}");
        service.add_disk(&id, DISK_ZONE, &disk);
        service.add_recommendation(fixtures::idle_disk_recommendation(
            &id,
            DISK_ZONE,
            &disk,
            &format!("idle-disk-{index}"),
        ));
    }
    if let Some(index) = config.fail_project {
        service.fail_on(
            "list_recommendations",
            project_id(index),
            RecoError::remote(503, "recommender backend unavailable"),
        );
    }
    service
}

/// Poll until the request finishes; returns the result and the number of polls
async fn wait_for<T>(
    label: &str,
    interval: Duration,
    mut poll: impl FnMut() -> RecoResult<Poll<T>>,
) -> RecoResult<(RecoResult<T>, usize)> {
    let mut polls = 0;
    loop {
        polls += 1;
        match poll()? {
            Poll::InProgress(progress) => {
                tracing::info!("{} progress {}", label, progress);
                tokio::time::sleep(interval).await;
            }
            Poll::Done(result) => return Ok((result, polls)),
        }
    }
}

/// Run the full scenario
///
/// # Errors
/// Errors of the orchestrator itself, such as a request vanishing while it
/// is polled. Failures of the simulated requests are part of the report.
pub async fn run_simulator(config: SimulatorConfig) -> RecoResult<SimulatorReport> {
    let service: Arc<dyn CloudService> = Arc::new(build_fleet(&config));
    let orchestrator = Orchestrator::new(config.orchestrator.clone());
    let projects: Vec<String> = (0..config.projects).map(project_id).collect();

    let expected_blocked = config.blocked.min(config.projects);
    let mut report = SimulatorReport {
        projects: config.projects,
        expected_blocked,
        expect_listing_failure: config
            .fail_project
            .is_some_and(|index| index >= config.blocked && index < config.projects),
        ..SimulatorReport::default()
    };

    let check_id =
        orchestrator.start_requirements_check(SIMULATED_REQUESTER, Arc::clone(&service), projects.clone());
    let (checked, polls) = wait_for("requirements", config.poll_interval, || {
        orchestrator.poll_requirements_check(SIMULATED_REQUESTER, &check_id)
    })
    .await?;
    report.polls += polls;
    report.blocked_by_check = checked?.iter().filter(|p| !p.all_satisfied()).count();

    let listing_id = orchestrator.start_listing(SIMULATED_REQUESTER, Arc::clone(&service), projects);
    let (listed, polls) = wait_for("listing", config.poll_interval, || {
        orchestrator.poll_listing(SIMULATED_REQUESTER, &listing_id)
    })
    .await?;
    report.polls += polls;

    let listed = match listed {
        Ok(listed) => listed,
        Err(e) => {
            report.listing_error = Some(e.to_string());
            return Ok(report);
        }
    };
    report.recommendations = listed.recommendations.len();
    report.failed_projects = listed.failed_projects.len();

    let Some(target) = listed
        .recommendations
        .iter()
        .find(|r| r.name.contains(fixtures::MACHINE_TYPE_RECOMMENDER))
    else {
        return Ok(report);
    };

    orchestrator.start_apply(SIMULATED_REQUESTER, Arc::clone(&service), &target.name)?;
    loop {
        report.polls += 1;
        let status = orchestrator
            .poll_apply_status(SIMULATED_REQUESTER, service.as_ref(), &target.name)
            .await?;
        if let ApplyStatus::InProgress { progress } = status {
            tracing::info!("apply progress {}", progress);
            tokio::time::sleep(config.poll_interval).await;
            continue;
        }
        report.applied = Some((target.name.clone(), status));
        break;
    }

    Ok(report)
}
