//! Recommendation apply state machine
//!
//! `ACTIVE → CLAIMED → SUCCEEDED | FAILED`. The recommendation is claimed with
//! its current etag, every operation is resolved into a [`Step`] and then run
//! in order. The first failing step aborts the rest; the recommendation is
//! then marked failed on a best-effort basis and the step's error is returned.

use crate::error::{RecoError, RecoResult};
use crate::operation::{plan_recommendation, Step};
use crate::progress::Task;
use crate::service::CloudService;
use crate::snapshot::random_snapshot_name;
use crate::types::Recommendation;

/// Fetch the recommendation called `name` and apply it
///
/// # Errors
/// See [`apply_recommendation`]; also fails if the fetch fails.
pub async fn apply_by_name(service: &dyn CloudService, name: &str, task: &Task) -> RecoResult<()> {
    let recommendation = match service.get_recommendation(name).await {
        Ok(recommendation) => recommendation,
        Err(e) => {
            task.mark_all_done();
            return Err(e);
        }
    };
    apply_recommendation(service, &recommendation, task).await
}

/// Claim, execute and finalize a recommendation
///
/// `task` gets one subtask per operation and is marked done when the apply
/// finishes either way.
///
/// # Errors
/// - The claim error, in which case the recommendation is left untouched
/// - The first step error; the recommendation is marked failed
/// - The mark-succeeded error
pub async fn apply_recommendation(
    service: &dyn CloudService,
    recommendation: &Recommendation,
    task: &Task,
) -> RecoResult<()> {
    let name = recommendation.name.as_str();
    tracing::info!("Claiming recommendation {}", name);
    let claimed = match service
        .mark_recommendation_claimed(name, &recommendation.etag)
        .await
    {
        Ok(claimed) => claimed,
        Err(e) => {
            task.mark_all_done();
            return Err(e);
        }
    };

    let outcome = run_operations(service, recommendation, task).await;
    task.mark_all_done();

    match outcome {
        Ok(()) => {
            service
                .mark_recommendation_succeeded(name, &claimed.etag)
                .await?;
            tracing::info!("Recommendation {} applied", name);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Applying recommendation {} failed: {}", name, e);
            if let Err(mark_error) = service.mark_recommendation_failed(name, &claimed.etag).await {
                tracing::warn!("Could not mark recommendation {} failed: {}", name, mark_error);
            }
            Err(e)
        }
    }
}

async fn run_operations(
    service: &dyn CloudService,
    recommendation: &Recommendation,
    task: &Task,
) -> RecoResult<()> {
    let steps = plan_recommendation(recommendation)?;
    task.set_subtask_count(steps.len());
    for step in &steps {
        let _subtask = task.next_subtask();
        tracing::debug!("Running step: {}", step);
        run_step(service, step).await?;
        task.mark_child_done();
    }
    Ok(())
}

/// Perform the remote calls of a single step
///
/// # Errors
/// - `RecoError::TestFailed` when a tested field does not match
/// - Any remote error
pub async fn run_step(service: &dyn CloudService, step: &Step) -> RecoResult<()> {
    match step {
        Step::Test {
            target,
            field,
            expected,
        } => {
            let instance = service
                .get_instance(&target.project, &target.zone, &target.instance)
                .await?;
            if expected.matches(field.read(&instance)) {
                Ok(())
            } else {
                Err(RecoError::TestFailed {
                    field: field.label().to_string(),
                })
            }
        }
        Step::ReplaceMachineType {
            target,
            machine_type,
        } => {
            service
                .stop_instance(&target.project, &target.zone, &target.instance)
                .await?;
            service
                .change_machine_type(&target.project, &target.zone, &target.instance, machine_type)
                .await?;
            service
                .start_instance(&target.project, &target.zone, &target.instance)
                .await
        }
        Step::StopInstance { target } => {
            service
                .stop_instance(&target.project, &target.zone, &target.instance)
                .await
        }
        Step::AddSnapshot { disk } => {
            let name = {
                let mut rng = rand::rng();
                random_snapshot_name(&disk.zone, &disk.disk, &mut rng)
            };
            service
                .create_snapshot(&disk.project, &disk.zone, &disk.disk, &name)
                .await
        }
        Step::RemoveDisk { disk } => {
            service
                .delete_disk(&disk.project, &disk.zone, &disk.disk)
                .await
        }
    }
}
