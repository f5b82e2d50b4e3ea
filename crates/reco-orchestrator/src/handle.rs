//! Long-running request handles
//!
//! A handle owns the progress tree of one request and the slot its terminal
//! result lands in. `start` runs the work to completion; `response` inspects
//! the handle without blocking.

use async_trait::async_trait;
use parking_lot::Mutex;
use reco_core::{
    apply_by_name, list_projects_recommendations, list_requirements, CloudService, ListResult,
    ListingOptions, Progress, ProjectRequirements, RecoResult, Task,
};
use std::sync::Arc;

/// Snapshot of a request as seen by a poller
#[derive(Debug, Clone, PartialEq)]
pub enum Poll<T> {
    /// Work is still running
    InProgress(Progress),
    /// Work finished with this result
    Done(RecoResult<T>),
}

impl<T> Poll<T> {
    /// Whether the request reached its terminal result
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Unit of asynchronous work tracked by a [`crate::RequestLedger`]
#[async_trait]
pub trait RequestHandle: Send + Sync {
    /// Terminal result type
    type Output: Send;

    /// Run the work; invoked at most once, on its own task
    async fn start(&self);

    /// Current progress, or the result once finished
    fn response(&self) -> Poll<Self::Output>;
}

/// Progress tree plus the terminal result slot
///
/// The work runs under the single child of the root, so the root only
/// reaches 1/1 once the result is stored.
#[derive(Debug)]
struct Completion<T> {
    root: Task,
    work: Task,
    result: Mutex<Option<RecoResult<T>>>,
}

impl<T: Clone> Completion<T> {
    fn new() -> Self {
        let root = Task::root();
        root.set_subtask_count(1);
        let work = root.next_subtask().unwrap_or_else(Task::root);
        Self {
            root,
            work,
            result: Mutex::new(None),
        }
    }

    fn finish(&self, result: RecoResult<T>) {
        *self.result.lock() = Some(result);
        self.root.mark_child_done();
        self.root.mark_all_done();
    }

    fn poll(&self) -> Poll<T> {
        if let Some(result) = self.result.lock().as_ref() {
            return Poll::Done(result.clone());
        }
        Poll::InProgress(self.root.progress())
    }
}

/// Lists recommendations across projects
pub struct ListingHandle {
    service: Arc<dyn CloudService>,
    projects: Vec<String>,
    options: ListingOptions,
    completion: Completion<ListResult>,
}

impl ListingHandle {
    /// Handle listing `projects` through `service`
    #[must_use]
    pub fn new(service: Arc<dyn CloudService>, projects: Vec<String>, options: ListingOptions) -> Self {
        Self {
            service,
            projects,
            options,
            completion: Completion::new(),
        }
    }
}

#[async_trait]
impl RequestHandle for ListingHandle {
    type Output = ListResult;

    async fn start(&self) {
        let result = list_projects_recommendations(
            Arc::clone(&self.service),
            self.projects.clone(),
            &self.options,
            &self.completion.work,
        )
        .await;
        match &result {
            Ok(listed) => tracing::info!(
                "Listed {} recommendations, {} projects blocked",
                listed.recommendations.len(),
                listed.failed_projects.len()
            ),
            Err(e) => tracing::error!("Listing recommendations failed: {}", e),
        }
        self.completion.finish(result);
    }

    fn response(&self) -> Poll<ListResult> {
        self.completion.poll()
    }
}

/// Checks requirements of every project
pub struct RequirementsHandle {
    service: Arc<dyn CloudService>,
    projects: Vec<String>,
    concurrency: usize,
    completion: Completion<Vec<ProjectRequirements>>,
}

impl RequirementsHandle {
    /// Handle checking `projects` with `concurrency` workers
    #[must_use]
    pub fn new(service: Arc<dyn CloudService>, projects: Vec<String>, concurrency: usize) -> Self {
        Self {
            service,
            projects,
            concurrency,
            completion: Completion::new(),
        }
    }
}

#[async_trait]
impl RequestHandle for RequirementsHandle {
    type Output = Vec<ProjectRequirements>;

    async fn start(&self) {
        let result = list_requirements(
            Arc::clone(&self.service),
            self.projects.clone(),
            self.concurrency,
            &self.completion.work,
        )
        .await;
        if let Err(e) = &result {
            tracing::error!("Requirements check failed: {}", e);
        }
        self.completion.finish(result);
    }

    fn response(&self) -> Poll<Vec<ProjectRequirements>> {
        self.completion.poll()
    }
}

/// Applies one recommendation
pub struct ApplyHandle {
    service: Arc<dyn CloudService>,
    name: String,
    completion: Completion<()>,
}

impl ApplyHandle {
    /// Handle applying the recommendation called `name`
    #[must_use]
    pub fn new(service: Arc<dyn CloudService>, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            completion: Completion::new(),
        }
    }
}

#[async_trait]
impl RequestHandle for ApplyHandle {
    type Output = ();

    async fn start(&self) {
        let result = apply_by_name(self.service.as_ref(), &self.name, &self.completion.work).await;
        self.completion.finish(result);
    }

    fn response(&self) -> Poll<()> {
        self.completion.poll()
    }
}
