use super::{NodeId, TaskNode, TaskTree};
use crate::persistence::{RepositoryError, TaskRepository};
use crate::task::TaskId;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("root task {0} not found")]
    RootNotFound(TaskId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Turns a persisted task hierarchy into a [`TaskTree`].
///
/// Every predecessor link in the result points either into the tree or at an
/// external stand-in; ids with no record at all are logged and dropped.
pub struct TreeBuilder<'a, R: TaskRepository + ?Sized> {
    repository: &'a R,
}

impl<'a, R: TaskRepository + ?Sized> TreeBuilder<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    pub fn build(&self, root_id: TaskId) -> Result<TaskTree, BuildError> {
        // Step 1: mirror the containment structure
        let (mut tree, pending_links) = self.build_structure(root_id)?;

        // Step 2: wire predecessors, materializing stand-ins on demand
        for (node, predecessor_id) in pending_links {
            let target = self.resolve_predecessor(&mut tree, node, predecessor_id)?;
            tree.set_predecessor(node, target);
        }

        tracing::debug!(
            root_id,
            nodes = tree.len(),
            externals = tree.externals().len(),
            "built task tree"
        );
        Ok(tree)
    }

    /// One tree per repository root.
    pub fn build_all(&self) -> Result<Vec<TaskTree>, BuildError> {
        self.repository
            .root_ids()?
            .into_iter()
            .map(|root_id| self.build(root_id))
            .collect()
    }

    fn build_structure(
        &self,
        root_id: TaskId,
    ) -> Result<(TaskTree, Vec<(NodeId, TaskId)>), BuildError> {
        let root_record = self
            .repository
            .task(root_id)?
            .ok_or(BuildError::RootNotFound(root_id))?;

        let mut pending_links = Vec::new();
        let mut tree = TaskTree::new(TaskNode::from_record(&root_record));
        if let Some(predecessor_id) = root_record.predecessor_id {
            pending_links.push((tree.root(), predecessor_id));
        }

        let mut placed: HashSet<TaskId> = HashSet::from([root_id]);
        let mut stack = vec![(tree.root(), root_id)];

        while let Some((parent_node, parent_id)) = stack.pop() {
            let mut added = Vec::new();
            for child_id in self.repository.child_ids(parent_id)? {
                if !placed.insert(child_id) {
                    tracing::error!(
                        task_id = child_id,
                        parent_id,
                        "task already placed in hierarchy, skipping repeated containment"
                    );
                    continue;
                }
                let Some(record) = self.repository.task(child_id)? else {
                    tracing::warn!(task_id = child_id, parent_id, "child task not found");
                    continue;
                };
                let node = tree.add_child(parent_node, TaskNode::from_record(&record));
                if let Some(predecessor_id) = record.predecessor_id {
                    pending_links.push((node, predecessor_id));
                }
                added.push((node, child_id));
            }
            // Reverse so siblings are expanded in display order.
            stack.extend(added.into_iter().rev());
        }

        Ok((tree, pending_links))
    }

    fn resolve_predecessor(
        &self,
        tree: &mut TaskTree,
        node: NodeId,
        predecessor_id: TaskId,
    ) -> Result<Option<NodeId>, BuildError> {
        if let Some(internal) = tree.find_internal(predecessor_id) {
            return Ok(Some(internal));
        }
        if let Some(external) = tree.externals().get(predecessor_id) {
            return Ok(Some(external));
        }
        match self.repository.task(predecessor_id)? {
            Some(record) => {
                tracing::debug!(
                    task_id = tree.node(node).id(),
                    predecessor_id,
                    "materializing external predecessor"
                );
                Ok(Some(tree.add_external(TaskNode::external_from_record(&record))))
            }
            None => {
                tracing::warn!(
                    task_id = tree.node(node).id(),
                    predecessor_id,
                    "predecessor not found, ignoring dependency"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryRepository, RepositoryResult};
    use crate::task::TaskRecord;
    use std::collections::HashMap;

    fn record(id: TaskId, parent: Option<TaskId>, predecessor: Option<TaskId>) -> TaskRecord {
        let mut record = TaskRecord::new(id, format!("task {id}"));
        record.parent_id = parent;
        record.predecessor_id = predecessor;
        record
    }

    #[test]
    fn missing_root_is_an_error() {
        let repo = InMemoryRepository::from_records(vec![record(1, None, None)]).unwrap();
        let result = TreeBuilder::new(&repo).build(42);
        assert!(matches!(result, Err(BuildError::RootNotFound(42))));
    }

    #[test]
    fn dangling_predecessor_is_dropped() {
        let repo = InMemoryRepository::from_records(vec![
            record(1, None, None),
            record(2, Some(1), Some(99)),
        ])
        .unwrap();
        let tree = TreeBuilder::new(&repo).build(1).unwrap();
        let node = tree.find(2).unwrap();
        assert_eq!(tree.node(node).predecessor(), None);
        assert!(tree.externals().is_empty());
    }

    /// A repository whose parent links loop: 1 -> 2 -> 3 -> 2.
    struct LoopingRepository {
        tasks: HashMap<TaskId, TaskRecord>,
    }

    impl TaskRepository for LoopingRepository {
        fn task(&self, id: TaskId) -> RepositoryResult<Option<TaskRecord>> {
            Ok(self.tasks.get(&id).cloned())
        }

        fn child_ids(&self, id: TaskId) -> RepositoryResult<Vec<TaskId>> {
            Ok(match id {
                1 => vec![2],
                2 => vec![3],
                3 => vec![2],
                _ => Vec::new(),
            })
        }

        fn root_ids(&self) -> RepositoryResult<Vec<TaskId>> {
            Ok(vec![1])
        }
    }

    #[test]
    fn containment_loop_in_repository_terminates() {
        let repo = LoopingRepository {
            tasks: (1..=3).map(|id| (id, record(id, None, None))).collect(),
        };
        let tree = TreeBuilder::new(&repo).build(1).unwrap();
        assert_eq!(tree.len(), 3);
        assert!(crate::validation::check_structure(&tree));
    }
}
