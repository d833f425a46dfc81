use super::{RepositoryError, RepositoryResult, TaskRepository};
use crate::task::{TaskId, TaskRecord};
use crate::validation;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};

/// Task hierarchy stored in SQLite, one JSON-encoded record per row.
pub struct SqliteTaskRepository {
    connection: Mutex<Connection>,
}

impl SqliteTaskRepository {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> RepositoryResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> RepositoryResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> RepositoryResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER,
                position INTEGER NOT NULL,
                task_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS tasks_parent ON tasks (parent_id, position);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)
    }

    /// Replace the stored hierarchy with `records`. Record order becomes
    /// sibling order.
    pub fn save_records(&self, records: &[TaskRecord]) -> RepositoryResult<()> {
        validation::validate_records(records)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (id, parent_id, position, task_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, record) in records.iter().enumerate() {
                let json = serde_json::to_string(record)?;
                stmt.execute(params![record.id, record.parent_id, position as i64, json])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_records(&self) -> RepositoryResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT task_json FROM tasks ORDER BY position ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for json in rows {
            records.push(serde_json::from_str(&json?)?);
        }
        Ok(records)
    }

    fn ids_where(&self, sql: &str, parent: Option<TaskId>) -> RepositoryResult<Vec<TaskId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let ids = match parent {
            Some(parent) => stmt
                .query_map(params![parent], |row| row.get::<_, TaskId>(0))?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], |row| row.get::<_, TaskId>(0))?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(ids)
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn task(&self, id: TaskId) -> RepositoryResult<Option<TaskRecord>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT task_json FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn child_ids(&self, id: TaskId) -> RepositoryResult<Vec<TaskId>> {
        self.ids_where(
            "SELECT id FROM tasks WHERE parent_id = ?1 ORDER BY position ASC",
            Some(id),
        )
    }

    fn root_ids(&self) -> RepositoryResult<Vec<TaskId>> {
        self.ids_where(
            "SELECT id FROM tasks WHERE parent_id IS NULL ORDER BY position ASC",
            None,
        )
    }
}
