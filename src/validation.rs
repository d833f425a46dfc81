use crate::task::{TaskId, TaskRecord};
use crate::tree::{NodeId, TaskTree};
use chrono::NaiveDate;
use std::collections::HashSet;
use thiserror::Error;

/// Deepest containment nesting a well-formed chart is expected to reach.
pub const MAX_STRUCTURE_DEPTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("duplicate task id {0}")]
    DuplicateId(TaskId),
    #[error("task {0} is its own parent")]
    SelfParent(TaskId),
    #[error("task {id} starts on {start} after it ends on {end}")]
    StartAfterEnd {
        id: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("task {id} has non-finite duration {duration}")]
    NonFiniteDuration { id: TaskId, duration: f64 },
    #[error("task {id} has progress {progress} (must be between 0 and 100)")]
    ProgressOutOfRange { id: TaskId, progress: i32 },
}

/// Reject records that cannot be loaded at all.
///
/// Explicit dates in the wrong order are not among them: they load with a
/// warning (see [`validate_records`]) and only [`check_date_order`] refuses
/// them.
pub fn validate_record(record: &TaskRecord) -> Result<(), ValidationError> {
    if record.parent_id == Some(record.id) {
        return Err(ValidationError::SelfParent(record.id));
    }
    if let Some(duration) = record.duration {
        if !duration.is_finite() {
            return Err(ValidationError::NonFiniteDuration {
                id: record.id,
                duration,
            });
        }
    }
    if let Some(progress) = record.progress {
        if !(0..=100).contains(&progress) {
            return Err(ValidationError::ProgressOutOfRange {
                id: record.id,
                progress,
            });
        }
    }
    Ok(())
}

pub fn validate_records(records: &[TaskRecord]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            return Err(ValidationError::DuplicateId(record.id));
        }
        validate_record(record)?;
        if let (Some(start), Some(end)) = (record.start_date, record.end_date) {
            if start > end {
                tracing::warn!(task_id = record.id, %start, %end, "task starts after it ends");
            }
        }
    }
    Ok(())
}

/// First task in `tree` whose explicit start lies after its explicit end.
pub fn check_date_order(tree: &TaskTree) -> Result<(), ValidationError> {
    for id in tree.node_ids() {
        let node = tree.node(id);
        if let (Some(start), Some(end)) = (node.explicit_start(), node.explicit_end()) {
            if start > end {
                return Err(ValidationError::StartAfterEnd {
                    id: node.id(),
                    start,
                    end,
                });
            }
        }
    }
    Ok(())
}

/// Check that the containment tree below the root is a proper tree no deeper
/// than [`MAX_STRUCTURE_DEPTH`].
pub fn check_structure(tree: &TaskTree) -> bool {
    check_structure_with_limit(tree, tree.root(), MAX_STRUCTURE_DEPTH)
}

/// Depth-first check below `root`. Fails as soon as the depth exceeds
/// `max_depth`, a node shows up again on its own path, or a node is reached
/// through two parents.
pub fn check_structure_with_limit(tree: &TaskTree, root: NodeId, max_depth: usize) -> bool {
    let mut on_path = HashSet::new();
    let mut seen = HashSet::new();
    visit(tree, root, 0, max_depth, &mut on_path, &mut seen)
}

fn visit(
    tree: &TaskTree,
    node: NodeId,
    depth: usize,
    max_depth: usize,
    on_path: &mut HashSet<NodeId>,
    seen: &mut HashSet<NodeId>,
) -> bool {
    if depth > max_depth {
        tracing::error!(
            task_id = tree.node(node).id(),
            max_depth,
            "task hierarchy exceeds maximum depth"
        );
        return false;
    }
    if !on_path.insert(node) {
        tracing::error!(task_id = tree.node(node).id(), "task hierarchy contains a cycle");
        return false;
    }
    if !seen.insert(node) {
        tracing::error!(task_id = tree.node(node).id(), "task is reachable through two parents");
        return false;
    }
    for &child in tree.node(node).children() {
        if !visit(tree, child, depth + 1, max_depth, on_path, seen) {
            return false;
        }
    }
    on_path.remove(&node);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TaskNode;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn chain(length: usize) -> TaskTree {
        let mut tree = TaskTree::new(TaskNode::new(0, "root"));
        let mut parent = tree.root();
        for id in 1..=length {
            parent = tree.add_child(parent, TaskNode::new(id as TaskId, format!("level {id}")));
        }
        tree
    }

    #[test]
    fn chain_at_the_limit_passes() {
        assert!(check_structure(&chain(MAX_STRUCTURE_DEPTH)));
    }

    #[test]
    fn chain_past_the_limit_fails() {
        assert!(!check_structure(&chain(MAX_STRUCTURE_DEPTH + 1)));
    }

    #[test]
    fn custom_limit_is_honored() {
        let tree = chain(3);
        assert!(check_structure_with_limit(&tree, tree.root(), 3));
        assert!(!check_structure_with_limit(&tree, tree.root(), 2));
    }

    #[test]
    fn moving_a_node_below_its_descendant_is_caught() {
        let mut tree = TaskTree::new(TaskNode::new(1, "root"));
        let a = tree.add_child(tree.root(), TaskNode::new(2, "a"));
        let b = tree.add_child(a, TaskNode::new(3, "b"));
        let c = tree.add_child(b, TaskNode::new(4, "c"));
        assert!(check_structure(&tree));

        // a -> b -> c -> a, detached from the root
        tree.move_node(a, c);
        assert!(check_structure(&tree));
        assert!(!check_structure_with_limit(&tree, a, MAX_STRUCTURE_DEPTH));
    }

    #[test]
    fn record_checks() {
        let mut record = TaskRecord::new(1, "a");
        record.start_date = Some(d(2024, 2, 1));
        record.end_date = Some(d(2024, 1, 1));
        assert_eq!(validate_record(&record), Ok(()));
        assert_eq!(validate_records(&[record]), Ok(()));

        let mut record = TaskRecord::new(2, "b");
        record.parent_id = Some(2);
        assert_eq!(validate_record(&record), Err(ValidationError::SelfParent(2)));

        let mut record = TaskRecord::new(3, "c");
        record.progress = Some(101);
        assert!(validate_record(&record).is_err());

        let mut record = TaskRecord::new(4, "d");
        record.duration = Some(-2.0);
        record.progress = Some(100);
        assert_eq!(validate_record(&record), Ok(()));
    }

    #[test]
    fn inverted_dates_fail_the_date_order_check() {
        let mut tree = TaskTree::new(TaskNode::new(1, "root"));
        let root = tree.root();
        tree.add_child(root, TaskNode::new(2, "ok").with_dates(Some(d(2024, 1, 1)), Some(d(2024, 1, 2))));
        assert_eq!(check_date_order(&tree), Ok(()));

        tree.add_child(root, TaskNode::new(3, "backwards").with_dates(Some(d(2024, 2, 1)), Some(d(2024, 1, 1))));
        assert_eq!(
            check_date_order(&tree),
            Err(ValidationError::StartAfterEnd {
                id: 3,
                start: d(2024, 2, 1),
                end: d(2024, 1, 1),
            })
        );
    }
}
