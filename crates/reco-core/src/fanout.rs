//! Bounded-concurrency fan-out
//!
//! Runs a batch of independent queries over a fixed pool of workers sharing
//! one queue. Each query gets its own progress subtask; the parent task is
//! credited as soon as a query returns. Results are merged all-or-nothing: a
//! single failed query fails the whole batch.

use crate::error::{RecoError, RecoResult};
use crate::progress::Task;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default workers for the (location × recommender) queries of one project
pub const DEFAULT_QUERY_CONCURRENCY: usize = 16;

/// Default workers for project-level fan-out
pub const DEFAULT_PROJECT_CONCURRENCY: usize = 200;

/// Worker count for a caller-supplied limit; non-positive limits use `default`
#[must_use]
pub fn worker_count(requested: i64, default: usize) -> usize {
    if requested <= 0 {
        return default;
    }
    usize::try_from(requested).unwrap_or(default)
}

/// Concatenate successful results, or return the last error seen
///
/// Partial successes are dropped whenever any result is an error.
///
/// # Errors
/// The last error in `results`, if any.
pub fn merge_results<T>(results: impl IntoIterator<Item = RecoResult<Vec<T>>>) -> RecoResult<Vec<T>> {
    let mut items = Vec::new();
    let mut last_error = None;
    for result in results {
        match result {
            Ok(batch) => items.extend(batch),
            Err(e) => last_error = Some(e),
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => Ok(items),
    }
}

/// Run `work` once per query on at most `concurrency` workers
///
/// A `concurrency` of zero uses `default_concurrency` instead. `parent` gets
/// one subtask per query, handed to `work` alongside the query
/// so that nested work can report its own progress. Must be called from
/// within a tokio runtime.
///
/// # Errors
/// The last error returned by any query; see [`merge_results`].
pub async fn fan_out<Q, T, F, Fut>(
    queries: Vec<Q>,
    concurrency: usize,
    default_concurrency: usize,
    parent: &Task,
    work: F,
) -> RecoResult<Vec<T>>
where
    Q: Send + 'static,
    T: Send + 'static,
    F: Fn(Q, Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RecoResult<Vec<T>>> + Send + 'static,
{
    let total = queries.len();
    parent.set_subtask_count(total);
    let queue: VecDeque<(Q, Task)> = queries
        .into_iter()
        .map(|query| (query, parent.next_subtask().unwrap_or_else(Task::root)))
        .collect();
    let queue = Arc::new(Mutex::new(queue));
    let work = Arc::new(work);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let limit = if concurrency == 0 {
        default_concurrency
    } else {
        concurrency
    };
    let workers = limit.clamp(1, total.max(1));
    tracing::debug!("Fanning out {} queries over {} workers", total, workers);

    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let work = Arc::clone(&work);
        let parent = parent.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                let next = queue.lock().pop_front();
                let Some((query, subtask)) = next else {
                    break;
                };
                let result = work(query, subtask).await;
                parent.mark_child_done();
                if tx.send(result).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while results.len() < total {
        match rx.recv().await {
            Some(result) => results.push(result),
            None => {
                return Err(RecoError::transport(format!(
                    "fan-out workers stopped after {} of {} queries",
                    results.len(),
                    total
                )))
            }
        }
    }

    merge_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn non_positive_limits_use_default() {
        assert_eq!(worker_count(0, 16), 16);
        assert_eq!(worker_count(-3, 200), 200);
        assert_eq!(worker_count(5, 16), 5);
    }

    #[test]
    fn merge_keeps_last_error_and_drops_items() {
        let results = vec![
            Ok(vec![1, 2]),
            Err(RecoError::remote(500, "first")),
            Ok(vec![3]),
            Err(RecoError::remote(503, "second")),
        ];
        assert_eq!(merge_results(results), Err(RecoError::remote(503, "second")));
    }

    #[test]
    fn merge_concatenates_successes() {
        let results: Vec<RecoResult<Vec<i32>>> = vec![Ok(vec![1]), Ok(vec![]), Ok(vec![2, 3])];
        assert_eq!(merge_results(results), Ok(vec![1, 2, 3]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_query_runs_exactly_once() {
        let total = 12;
        for workers in 1..=total {
            let calls: Arc<Vec<AtomicUsize>> = Arc::new((0..total).map(|_| AtomicUsize::new(0)).collect());
            let task = Task::root();
            let counter = Arc::clone(&calls);
            let mut items = fan_out((0..total).collect(), workers, 1, &task, move |query: usize, _subtask| {
                let counter = Arc::clone(&counter);
                async move {
                    counter[query].fetch_add(1, Ordering::SeqCst);
                    Ok(vec![query * 10])
                }
            })
            .await
            .unwrap();

            items.sort_unstable();
            assert_eq!(items, (0..total).map(|q| q * 10).collect::<Vec<_>>());
            assert!(calls.iter().all(|c| c.load(Ordering::SeqCst) == 1));
            assert_eq!(task.subtask_count(), total);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_failure_fails_the_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = Task::root();
        let result = fan_out((0..8).collect(), 3, 1, &task, move |query: usize, _subtask| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if query == 5 {
                    Err(RecoError::remote(500, "backend unavailable"))
                } else {
                    Ok(vec![query])
                }
            }
        })
        .await;

        assert_eq!(result, Err(RecoError::remote(500, "backend unavailable")));
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn empty_batch_succeeds_immediately() {
        let task = Task::root();
        let result: RecoResult<Vec<u8>> =
            fan_out(Vec::<u8>::new(), 4, 1, &task, |_q, _t| async { Ok(vec![]) }).await;
        assert_eq!(result, Ok(vec![]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parent_is_credited_per_query() {
        let task = Task::root();
        fan_out((0..4).collect(), 2, 1, &task, |q: u32, _subtask| async move { Ok(vec![q]) })
            .await
            .unwrap();
        let progress = task.progress();
        assert!(!progress.is_complete());
        assert_eq!(progress.done, crate::progress::PROGRESS_DENOMINATOR - 1);
    }

    async fn peak_workers(concurrency: usize, default_concurrency: usize) -> usize {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (running_in, peak_in) = (Arc::clone(&running), Arc::clone(&peak));
        fan_out((0..8).collect(), concurrency, default_concurrency, &Task::root(), move |q: u32, _subtask| {
            let running = Arc::clone(&running_in);
            let peak = Arc::clone(&peak_in);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![q])
            }
        })
        .await
        .unwrap();
        peak.load(Ordering::SeqCst)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn zero_concurrency_uses_call_site_default() {
        let peak = peak_workers(0, 4).await;
        assert!(peak > 1, "ran serially with concurrency 0");
        assert!(peak <= 4);
        assert_eq!(peak_workers(1, 4).await, 1);
    }
}
