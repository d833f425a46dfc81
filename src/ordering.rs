//! Deterministic order over resolved tasks for layout and export.
//!
//! The order reads already-calculated dates only. Resolve a tree first
//! (e.g. with [`TaskTree::resolve_all`]); unresolved dates compare as missing.

use crate::task::TaskId;
use crate::tree::{NodeId, TaskNode, TaskTree};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// The fields the order looks at, borrowed from a node or a row.
#[derive(Debug, Clone, Copy)]
pub struct SortKey<'a> {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub title: Option<&'a str>,
    pub id: TaskId,
}

impl<'a> SortKey<'a> {
    pub fn of_node(node: &'a TaskNode) -> Self {
        Self {
            start: node.calculated_start(),
            end: node.calculated_end(),
            title: Some(node.title()),
            id: node.id(),
        }
    }

    /// Start, then end (missing dates last), then title, then id as text.
    pub fn cmp_key(&self, other: &SortKey<'_>) -> Ordering {
        nulls_last(self.start, other.start)
            .then_with(|| nulls_last(self.end, other.end))
            .then_with(|| self.title.unwrap_or("").cmp(other.title.unwrap_or("")))
            .then_with(|| self.id.to_string().cmp(&other.id.to_string()))
    }
}

fn nulls_last(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare(a: &TaskNode, b: &TaskNode) -> Ordering {
    SortKey::of_node(a).cmp_key(&SortKey::of_node(b))
}

/// Visible nodes of the subtree in comparator order.
pub fn sorted_visible(tree: &TaskTree) -> Vec<NodeId> {
    let mut ids = tree.visible_nodes();
    ids.sort_by(|a, b| compare(tree.node(*a), tree.node(*b)));
    ids
}
