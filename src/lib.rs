pub mod calculations;
pub mod calendar;
pub mod config;
pub mod graph;
pub mod ordering;
pub mod persistence;
pub mod rows;
pub mod table;
pub mod task;
pub mod tree;
pub mod validation;

pub use calculations::{DateResolver, resolve_trees};
pub use calendar::{CalendarError, WorkCalendar, WorkCalendarConfig, WorkingDayCalendar};
pub use config::{ConfigError, ResolverConfig, load_config};
pub use graph::PredecessorGraph;
pub use ordering::{compare, sorted_visible};
pub use persistence::{
    ExportError, InMemoryRepository, RepositoryError, RepositoryResult, TaskRepository,
    TaskSnapshot, load_snapshot_from_json, save_rows_to_csv, save_rows_to_json,
    save_snapshot_to_json,
};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteTaskRepository;
pub use rows::{GanttRow, RowOrder, gantt_rows};
pub use table::rows_to_dataframe;
pub use task::{RelationType, TaskId, TaskKind, TaskRecord};
pub use tree::builder::{BuildError, TreeBuilder};
pub use tree::{ExternalRegistry, NodeId, TaskNode, TaskTree};
pub use validation::{MAX_STRUCTURE_DEPTH, ValidationError, check_structure};
