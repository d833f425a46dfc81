use super::{InMemoryRepository, RepositoryResult};
use crate::calendar::WorkCalendarConfig;
use crate::rows::GanttRow;
use crate::task::TaskRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk form of a task universe: the records plus, optionally, the
/// calendar they were planned against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<WorkCalendarConfig>,
    pub tasks: Vec<TaskRecord>,
}

impl TaskSnapshot {
    pub fn into_repository(self) -> RepositoryResult<InMemoryRepository> {
        InMemoryRepository::from_records(self.tasks)
    }
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> RepositoryResult<TaskSnapshot> {
    let file = File::open(path)?;
    let snapshot: TaskSnapshot = serde_json::from_reader(BufReader::new(file))?;
    crate::validation::validate_records(&snapshot.tasks)?;
    Ok(snapshot)
}

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &TaskSnapshot,
    path: P,
) -> RepositoryResult<()> {
    crate::validation::validate_records(&snapshot.tasks)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), snapshot)?;
    Ok(())
}

/// Flat CSV record; dates as `YYYY-MM-DD`, missing values as empty cells.
#[derive(Serialize)]
struct GanttCsvRecord<'a> {
    id: i32,
    title: &'a str,
    kind: &'static str,
    depth: usize,
    start: String,
    end: String,
    working_days: String,
    progress: String,
    predecessor_id: String,
    relation_type: &'static str,
    external_predecessor: bool,
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl<'a> From<&'a GanttRow> for GanttCsvRecord<'a> {
    fn from(row: &'a GanttRow) -> Self {
        Self {
            id: row.id,
            title: &row.title,
            kind: row.kind.as_str(),
            depth: row.depth,
            start: optional(row.start),
            end: optional(row.end),
            working_days: optional(row.working_days),
            progress: optional(row.progress),
            predecessor_id: optional(row.predecessor_id),
            relation_type: row.relation_type.map(|t| t.as_str()).unwrap_or(""),
            external_predecessor: row.external_predecessor,
        }
    }
}

pub fn write_rows_csv<W: io::Write>(rows: &[GanttRow], writer: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(GanttCsvRecord::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_rows_to_csv<P: AsRef<Path>>(rows: &[GanttRow], path: P) -> Result<(), ExportError> {
    write_rows_csv(rows, File::create(path)?)
}

pub fn save_rows_to_json<P: AsRef<Path>>(rows: &[GanttRow], path: P) -> Result<(), ExportError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), rows)?;
    Ok(())
}
