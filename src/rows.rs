use crate::calendar::{WorkingDayCalendar, count_working_days};
use crate::ordering::{SortKey, sorted_visible};
use crate::task::{RelationType, TaskId, TaskKind};
use crate::tree::{NodeId, TaskTree};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One line of a Gantt chart: a visible task with its calculated dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanttRow {
    pub id: TaskId,
    pub title: String,
    pub kind: TaskKind,
    pub depth: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Working days in `[start, end]`, when both are known.
    pub working_days: Option<i64>,
    pub progress: Option<i32>,
    pub predecessor_id: Option<TaskId>,
    pub relation_type: Option<RelationType>,
    pub external_predecessor: bool,
}

impl GanttRow {
    pub fn sort_key(&self) -> SortKey<'_> {
        SortKey {
            start: self.start,
            end: self.end,
            title: Some(&self.title),
            id: self.id,
        }
    }
}

/// Same order as [`compare`](crate::ordering::compare) on nodes.
pub fn compare_rows(a: &GanttRow, b: &GanttRow) -> Ordering {
    a.sort_key().cmp_key(&b.sort_key())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowOrder {
    /// Parent before children, siblings in stored order.
    Hierarchy,
    /// Comparator order: start, end, title, id.
    #[default]
    Schedule,
}

/// Resolve the whole tree and list its visible tasks.
pub fn gantt_rows<C: WorkingDayCalendar + ?Sized>(
    tree: &mut TaskTree,
    calendar: &C,
    order: RowOrder,
) -> Vec<GanttRow> {
    tree.resolve_all(calendar);
    let ids = match order {
        RowOrder::Hierarchy => tree.visible_nodes(),
        RowOrder::Schedule => sorted_visible(tree),
    };
    ids.into_iter().map(|id| row(tree, id, calendar)).collect()
}

fn row<C: WorkingDayCalendar + ?Sized>(tree: &TaskTree, id: NodeId, calendar: &C) -> GanttRow {
    let node = tree.node(id);
    let start = node.calculated_start();
    let end = node.calculated_end();
    let predecessor = node.predecessor().map(|p| tree.node(p));
    GanttRow {
        id: node.id(),
        title: node.title().to_string(),
        kind: node.kind(),
        depth: tree.depth(id),
        start,
        end,
        working_days: match (start, end) {
            (Some(start), Some(end)) if start <= end => {
                Some(count_working_days(calendar, start, end))
            }
            _ => None,
        },
        progress: node.progress(),
        predecessor_id: predecessor.map(|p| p.id()),
        relation_type: predecessor.map(|_| node.relation_type()),
        external_predecessor: predecessor.is_some_and(|p| p.is_external()),
    }
}
