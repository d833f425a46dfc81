use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TaskId = i32;

/// Which endpoint of a task a dependency attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    Finish,
}

/// How a task is tied to its predecessor. The first word names the
/// predecessor's endpoint, the second the successor's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    #[default]
    FinishStart,
    StartStart,
    FinishFinish,
    StartFinish,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        RelationType::FinishStart,
        RelationType::StartStart,
        RelationType::FinishFinish,
        RelationType::StartFinish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::FinishStart => "FINISH_START",
            RelationType::StartStart => "START_START",
            RelationType::FinishFinish => "FINISH_FINISH",
            RelationType::StartFinish => "START_FINISH",
        }
    }

    pub fn predecessor_endpoint(self) -> Endpoint {
        match self {
            RelationType::StartStart | RelationType::StartFinish => Endpoint::Start,
            RelationType::FinishStart | RelationType::FinishFinish => Endpoint::Finish,
        }
    }

    pub fn successor_endpoint(self) -> Endpoint {
        match self {
            RelationType::FinishStart | RelationType::StartStart => Endpoint::Start,
            RelationType::FinishFinish | RelationType::StartFinish => Endpoint::Finish,
        }
    }

    /// Parse a stored value, falling back to `FinishStart` for anything
    /// missing or unrecognized.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => RelationType::default(),
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(relation_type = value, "unrecognized relation type, using FINISH_START");
                RelationType::default()
            }),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for RelationType {
    type Err = UnknownVariant;

    /// Accepts `FINISH_START`, `finish-start`, `FinishStart` and the short
    /// MS-Project style codes `FS`, `SS`, `FF`, `SF`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "finishstart" | "fs" => Ok(RelationType::FinishStart),
            "startstart" | "ss" => Ok(RelationType::StartStart),
            "finishfinish" | "ff" => Ok(RelationType::FinishFinish),
            "startfinish" | "sf" => Ok(RelationType::StartFinish),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Display classification only; resolution never looks at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    #[default]
    Activity,
    Summary,
    Milestone,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Activity => "ACTIVITY",
            TaskKind::Summary => "SUMMARY",
            TaskKind::Milestone => "MILESTONE",
        }
    }

    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => TaskKind::default(),
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(kind = value, "unrecognized task kind, using ACTIVITY");
                TaskKind::default()
            }),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "activity" => Ok(TaskKind::Activity),
            "summary" => Ok(TaskKind::Summary),
            "milestone" => Ok(TaskKind::Milestone),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Round a stored duration to whole working days (half-up).
///
/// Negative and non-finite values carry no constraint.
pub fn round_duration(duration: f64) -> Option<i64> {
    if !duration.is_finite() || duration < 0.0 {
        return None;
    }
    Some((duration + 0.5).floor() as i64)
}

fn default_visible() -> bool {
    true
}

/// A task as it is persisted: explicit fields only, never calculated dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Working days, possibly fractional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_offset: Option<i32>,
    /// Kept as text: unknown values fall back to `FINISH_START` when the
    /// record becomes a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskRecord {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            title: title.into(),
            start_date: None,
            end_date: None,
            duration: None,
            predecessor_id: None,
            predecessor_offset: None,
            relation_type: None,
            kind: None,
            visible: true,
            progress: None,
            description: None,
        }
    }

    pub fn duration_days(&self) -> Option<i64> {
        self.duration.and_then(round_duration)
    }

    pub fn relation(&self) -> RelationType {
        RelationType::parse_or_default(self.relation_type.as_deref())
    }

    pub fn task_kind(&self) -> TaskKind {
        TaskKind::parse_or_default(self.kind.as_deref())
    }
}
