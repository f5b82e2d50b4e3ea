//! Hierarchical progress tracking
//!
//! A [`ProgressTree`] is an arena of nodes addressed by index. Each node knows
//! how many subtasks it has, how many were handed out and how many are done.
//! [`Task`] is the handle through which workers claim subtasks and report
//! completion.
//!
//! Progress is estimated assuming subtasks finish in the order they were
//! handed out: the fraction is the done subtasks plus the partial progress of
//! the first unfinished one. Workers finishing out of order only make the
//! estimate conservative, never decreasing.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Denominator of every non-terminal progress value
pub const PROGRESS_DENOMINATOR: u32 = 1_000_000;

/// Completed fraction of work as an integer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Numerator
    pub done: u32,
    /// Denominator, never zero
    pub all: u32,
}

impl Progress {
    /// Progress of finished work
    pub const COMPLETE: Self = Self { done: 1, all: 1 };

    /// Whether the work is finished
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done >= self.all
    }

    /// Fraction in `[0, 1]`
    #[inline]
    #[must_use]
    pub fn fraction(&self) -> f64 {
        f64::from(self.done) / f64::from(self.all)
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.fraction() * 100.0)
    }
}

/// Index of a node inside a [`ProgressTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct Node {
    /// Children occupy `first_child..first_child + child_count`
    first_child: usize,
    child_count: usize,
    allocated: bool,
    started: usize,
    done: usize,
    all_done: bool,
}

/// Arena holding every node of one progress hierarchy
#[derive(Debug)]
pub struct ProgressTree {
    nodes: Mutex<Vec<Node>>,
}

impl ProgressTree {
    /// Create a tree with a single root node
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(vec![Node::default()]),
        })
    }

    /// Handle to the root node
    #[must_use]
    pub fn root(self: &Arc<Self>) -> Task {
        Task {
            tree: Arc::clone(self),
            id: NodeId(0),
        }
    }

    /// Total number of nodes allocated so far
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }
}

/// Handle to one node of a [`ProgressTree`]
///
/// Cloning the handle does not duplicate the node; each child is still handed
/// out exactly once by [`Task::next_subtask`].
#[derive(Debug, Clone)]
pub struct Task {
    tree: Arc<ProgressTree>,
    id: NodeId,
}

impl Task {
    /// Root of a fresh tree
    #[must_use]
    pub fn root() -> Self {
        ProgressTree::new().root()
    }

    /// Node this handle points to
    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Allocate `count` children
    ///
    /// Children are allocated once; later calls leave the existing children
    /// untouched and return `false`.
    pub fn set_subtask_count(&self, count: usize) -> bool {
        let mut nodes = self.tree.nodes.lock();
        if nodes[self.id.0].allocated {
            tracing::debug!("Subtasks of node {:?} already allocated", self.id);
            return false;
        }
        let first_child = nodes.len();
        nodes.resize_with(first_child + count, Node::default);
        let node = &mut nodes[self.id.0];
        node.first_child = first_child;
        node.child_count = count;
        node.allocated = true;
        true
    }

    /// Number of children, zero until allocated
    #[must_use]
    pub fn subtask_count(&self) -> usize {
        self.tree.nodes.lock()[self.id.0].child_count
    }

    /// Claim the next child in order, `None` once every child was claimed
    #[must_use]
    pub fn next_subtask(&self) -> Option<Task> {
        let mut nodes = self.tree.nodes.lock();
        let node = &mut nodes[self.id.0];
        if node.started >= node.child_count {
            return None;
        }
        let child = node.first_child + node.started;
        node.started += 1;
        Some(Task {
            tree: Arc::clone(&self.tree),
            id: NodeId(child),
        })
    }

    /// Record that one more child finished
    pub fn mark_child_done(&self) {
        self.tree.nodes.lock()[self.id.0].done += 1;
    }

    /// Mark this node finished regardless of its children
    pub fn mark_all_done(&self) {
        self.tree.nodes.lock()[self.id.0].all_done = true;
    }

    /// Whether [`Task::mark_all_done`] was called
    #[must_use]
    pub fn is_all_done(&self) -> bool {
        self.tree.nodes.lock()[self.id.0].all_done
    }

    /// Estimated progress of this node
    ///
    /// Exactly `1/1` once the node is marked done; otherwise the numerator is
    /// strictly below the denominator.
    #[must_use]
    pub fn progress(&self) -> Progress {
        let nodes = self.tree.nodes.lock();
        if nodes[self.id.0].all_done {
            return Progress::COMPLETE;
        }
        let done = numerator(&nodes, self.id.0).min(PROGRESS_DENOMINATOR - 1);
        Progress {
            done,
            all: PROGRESS_DENOMINATOR,
        }
    }
}

/// Progress of `index` scaled to [`PROGRESS_DENOMINATOR`]
fn numerator(nodes: &[Node], index: usize) -> u32 {
    let node = &nodes[index];
    if node.all_done {
        return PROGRESS_DENOMINATOR;
    }
    if node.child_count == 0 {
        return 0;
    }
    let done = node.done.min(node.child_count);
    let mut scaled = done as u64 * u64::from(PROGRESS_DENOMINATOR);
    if done < node.child_count {
        scaled += u64::from(numerator(nodes, node.first_child + done));
    }
    let value = scaled / node.child_count as u64;
    // a fully counted node that was never marked done stays just below one
    u32::try_from(value)
        .unwrap_or(PROGRESS_DENOMINATOR)
        .min(PROGRESS_DENOMINATOR - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_subtask_count_allocates_once() {
        let task = Task::root();
        assert!(task.set_subtask_count(3));
        assert!(!task.set_subtask_count(5));
        assert_eq!(task.subtask_count(), 3);
    }

    #[test]
    fn next_subtask_hands_out_children_in_order() {
        let tree = ProgressTree::new();
        let task = tree.root();
        task.set_subtask_count(3);

        let ids: Vec<_> = std::iter::from_fn(|| task.next_subtask().map(|t| t.id())).collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(task.next_subtask().is_none());
    }

    #[test]
    fn leaf_reports_zero_until_done() {
        let task = Task::root();
        assert_eq!(task.progress().done, 0);
        task.mark_all_done();
        assert_eq!(task.progress(), Progress::COMPLETE);
    }

    #[test]
    fn progress_increases_with_done_children() {
        let task = Task::root();
        let count = 10;
        task.set_subtask_count(count);

        let mut fractions = Vec::new();
        for _ in 0..count {
            fractions.push(task.progress().fraction());
            task.mark_child_done();
        }
        fractions.push(task.progress().fraction());
        task.mark_all_done();
        fractions.push(task.progress().fraction());

        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions[..count].windows(2).all(|w| w[0] < w[1]));
        assert_eq!(task.progress(), Progress::COMPLETE);
    }

    #[test]
    fn all_children_done_is_still_below_one() {
        let task = Task::root();
        task.set_subtask_count(2);
        task.mark_child_done();
        task.mark_child_done();
        let progress = task.progress();
        assert!(progress.done < progress.all);
    }

    #[test]
    fn nested_progress_is_weighted() {
        for count in 2..=5u32 {
            let task = Task::root();
            task.set_subtask_count(count as usize);
            let subtask = task.next_subtask().unwrap();
            subtask.set_subtask_count(count as usize);
            subtask.mark_child_done();

            let expected_sub = 1.0 / f64::from(count);
            assert!((subtask.progress().fraction() - expected_sub).abs() < 1e-4);

            let expected = expected_sub / f64::from(count);
            assert!((task.progress().fraction() - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn mark_all_done_short_circuits_children() {
        let task = Task::root();
        task.set_subtask_count(100);
        task.mark_child_done();
        task.mark_all_done();
        assert_eq!(task.progress(), Progress::COMPLETE);
    }

    #[test]
    fn concurrent_workers_claim_each_child_once() {
        for workers in 1..8 {
            for count in 0..6 {
                let task = Task::root();
                task.set_subtask_count(count);
                let claimed = std::sync::atomic::AtomicUsize::new(0);
                std::thread::scope(|scope| {
                    for _ in 0..workers {
                        scope.spawn(|| {
                            while task.next_subtask().is_some() {
                                task.mark_child_done();
                                claimed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            }
                        });
                    }
                });
                task.mark_all_done();
                assert_eq!(claimed.into_inner(), count);
                assert_eq!(task.progress(), Progress::COMPLETE);
            }
        }
    }

    #[derive(Debug, Clone)]
    enum Step {
        ChildDone(usize),
        ClaimAndSplit(usize, usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..4).prop_map(Step::ChildDone),
            (0usize..4, 1usize..5).prop_map(|(d, n)| Step::ClaimAndSplit(d, n)),
        ]
    }

    proptest! {
        #[test]
        fn prop_progress_never_decreases(
            count in 1usize..8,
            steps in proptest::collection::vec(step(), 0..40),
        ) {
            let tree = ProgressTree::new();
            let root = tree.root();
            root.set_subtask_count(count);
            let mut nodes = vec![root.clone()];
            let mut last = root.progress();

            for step in steps {
                match step {
                    Step::ChildDone(pick) => {
                        let node = &nodes[pick % nodes.len()];
                        if node.subtask_count() > 0 {
                            node.mark_child_done();
                        }
                    }
                    Step::ClaimAndSplit(pick, n) => {
                        let parent = nodes[pick % nodes.len()].clone();
                        if let Some(child) = parent.next_subtask() {
                            child.set_subtask_count(n);
                            nodes.push(child);
                        }
                    }
                }
                let now = root.progress();
                prop_assert!(now.done < now.all);
                prop_assert!(
                    u64::from(now.done) * u64::from(last.all)
                        >= u64::from(last.done) * u64::from(now.all)
                );
                last = now;
            }

            root.mark_all_done();
            prop_assert_eq!(root.progress(), Progress::COMPLETE);
        }
    }
}
