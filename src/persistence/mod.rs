use crate::task::{TaskId, TaskRecord};
use crate::validation::{self, ValidationError};
use std::collections::HashMap;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid data: {0}")]
    InvalidData(#[from] ValidationError),
    #[error("repository lock poisoned")]
    LockPoisoned,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Read-only access to the persisted task hierarchy.
pub trait TaskRepository {
    fn task(&self, id: TaskId) -> RepositoryResult<Option<TaskRecord>>;

    /// Children of `id` in display order.
    fn child_ids(&self, id: TaskId) -> RepositoryResult<Vec<TaskId>>;

    /// Tasks without a parent, in display order.
    fn root_ids(&self) -> RepositoryResult<Vec<TaskId>>;
}

/// Repository over records held in memory, e.g. a loaded JSON snapshot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    tasks: HashMap<TaskId, TaskRecord>,
    children: HashMap<TaskId, Vec<TaskId>>,
    roots: Vec<TaskId>,
}

impl InMemoryRepository {
    /// Validate and index `records`; children keep the order the records
    /// came in.
    pub fn from_records(records: Vec<TaskRecord>) -> RepositoryResult<Self> {
        validation::validate_records(&records)?;
        let mut repository = Self::default();
        for record in records {
            match record.parent_id {
                Some(parent) => repository.children.entry(parent).or_default().push(record.id),
                None => repository.roots.push(record.id),
            }
            repository.tasks.insert(record.id, record);
        }
        Ok(repository)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All records, roots first, each followed by its subtree.
    pub fn records(&self) -> Vec<TaskRecord> {
        let mut out = Vec::with_capacity(self.tasks.len());
        let mut stack: Vec<TaskId> = self.roots.iter().rev().copied().collect();
        let mut emitted = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if !emitted.insert(id) {
                continue;
            }
            if let Some(record) = self.tasks.get(&id) {
                out.push(record.clone());
            }
            if let Some(children) = self.children.get(&id) {
                stack.extend(children.iter().rev().copied());
            }
        }
        // Orphans whose parent id has no record, and tasks only reachable
        // through a containment cycle.
        let mut rest: Vec<&TaskRecord> = self
            .tasks
            .values()
            .filter(|record| !emitted.contains(&record.id))
            .collect();
        rest.sort_by_key(|record| record.id);
        out.extend(rest.into_iter().cloned());
        out
    }
}

impl TaskRepository for InMemoryRepository {
    fn task(&self, id: TaskId) -> RepositoryResult<Option<TaskRecord>> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn child_ids(&self, id: TaskId) -> RepositoryResult<Vec<TaskId>> {
        Ok(self.children.get(&id).cloned().unwrap_or_default())
    }

    fn root_ids(&self) -> RepositoryResult<Vec<TaskId>> {
        Ok(self.roots.clone())
    }
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    ExportError, TaskSnapshot, load_snapshot_from_json, save_rows_to_csv, save_rows_to_json,
    save_snapshot_to_json, write_rows_csv,
};
