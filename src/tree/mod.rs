use crate::task::{RelationType, TaskId, TaskKind, TaskRecord};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

pub mod builder;

/// Index of a node inside its [`TaskTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrigin {
    /// Part of the subtree being displayed.
    Internal,
    /// Stand-in for a predecessor that lives outside the subtree.
    External,
}

/// Lazily filled resolution result for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CachedDate {
    pub(crate) value: Option<NaiveDate>,
    pub(crate) resolved: bool,
}

impl CachedDate {
    pub(crate) fn store(&mut self, value: Option<NaiveDate>) -> Option<NaiveDate> {
        self.value = value;
        self.resolved = true;
        value
    }

    fn clear(&mut self) {
        *self = CachedDate::default();
    }
}

/// One schedulable unit.
///
/// Explicit fields are what the user or an import set. The calculated dates
/// are filled on first access by the resolver and stay fixed until
/// [`TaskTree::recalculate`] clears them. Changing an explicit field does not
/// invalidate anything by itself.
#[derive(Debug, Clone)]
pub struct TaskNode {
    id: TaskId,
    title: String,
    description: Option<String>,
    progress: Option<i32>,
    kind: TaskKind,
    visible: bool,
    explicit_start: Option<NaiveDate>,
    explicit_end: Option<NaiveDate>,
    duration: Option<i64>,
    relation_type: RelationType,
    predecessor_offset: i32,
    pub(crate) predecessor: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    origin: NodeOrigin,
    pub(crate) start_cache: CachedDate,
    pub(crate) end_cache: CachedDate,
}

impl TaskNode {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            progress: None,
            kind: TaskKind::default(),
            visible: true,
            explicit_start: None,
            explicit_end: None,
            duration: None,
            relation_type: RelationType::default(),
            predecessor_offset: 0,
            predecessor: None,
            parent: None,
            children: Vec::new(),
            origin: NodeOrigin::Internal,
            start_cache: CachedDate::default(),
            end_cache: CachedDate::default(),
        }
    }

    /// Node for a record inside the visible subtree. The predecessor link is
    /// wired separately once every node exists.
    pub fn from_record(record: &TaskRecord) -> Self {
        let mut node = Self::new(record.id, record.title.clone())
            .with_dates(record.start_date, record.end_date)
            .with_relation(
                record.relation(),
                record.predecessor_offset.unwrap_or_default(),
            )
            .with_kind(record.task_kind());
        node.duration = record.duration_days();
        node.description = record.description.clone();
        node.progress = record.progress;
        node.visible = record.visible;
        node
    }

    /// Stand-in for a task outside the subtree: own explicit fields only, no
    /// predecessor and no children, so the walk stops at the boundary.
    pub fn external_from_record(record: &TaskRecord) -> Self {
        let mut node = Self::new(record.id, record.title.clone())
            .with_dates(record.start_date, record.end_date)
            .with_kind(record.task_kind());
        node.duration = record.duration_days();
        node.visible = false;
        node.origin = NodeOrigin::External;
        node
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.explicit_start = start;
        self.explicit_end = end;
        self
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.explicit_start = Some(start);
        self
    }

    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.explicit_end = Some(end);
        self
    }

    /// Working-day duration. Negative values carry no constraint.
    pub fn with_duration(mut self, days: i64) -> Self {
        self.set_duration(Some(days));
        self
    }

    pub fn with_relation(mut self, relation_type: RelationType, offset: i32) -> Self {
        self.relation_type = relation_type;
        self.predecessor_offset = offset;
        self
    }

    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn progress(&self) -> Option<i32> {
        self.progress
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn origin(&self) -> NodeOrigin {
        self.origin
    }

    pub fn is_external(&self) -> bool {
        self.origin == NodeOrigin::External
    }

    pub fn explicit_start(&self) -> Option<NaiveDate> {
        self.explicit_start
    }

    pub fn explicit_end(&self) -> Option<NaiveDate> {
        self.explicit_end
    }

    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    pub fn predecessor_offset(&self) -> i32 {
        self.predecessor_offset
    }

    pub fn predecessor(&self) -> Option<NodeId> {
        self.predecessor
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Explicit start, else whatever the resolver cached. Never resolves.
    pub fn calculated_start(&self) -> Option<NaiveDate> {
        self.explicit_start.or(self.start_cache.value)
    }

    /// Explicit end, else whatever the resolver cached. Never resolves.
    pub fn calculated_end(&self) -> Option<NaiveDate> {
        self.explicit_end.or(self.end_cache.value)
    }

    pub fn is_start_resolved(&self) -> bool {
        self.explicit_start.is_some() || self.start_cache.resolved
    }

    pub fn is_end_resolved(&self) -> bool {
        self.explicit_end.is_some() || self.end_cache.resolved
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_explicit_start(&mut self, start: Option<NaiveDate>) {
        self.explicit_start = start;
    }

    pub fn set_explicit_end(&mut self, end: Option<NaiveDate>) {
        self.explicit_end = end;
    }

    pub fn set_duration(&mut self, days: Option<i64>) {
        self.duration = days.filter(|d| *d >= 0);
    }

    pub fn set_relation(&mut self, relation_type: RelationType, offset: i32) {
        self.relation_type = relation_type;
        self.predecessor_offset = offset;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn clear_cache(&mut self) {
        self.start_cache.clear();
        self.end_cache.clear();
    }
}

/// Stand-ins created for predecessors outside the visible subtree, keyed by
/// task id so every reference to the same task shares one node.
#[derive(Debug, Clone, Default)]
pub struct ExternalRegistry {
    by_task: HashMap<TaskId, NodeId>,
}

impl ExternalRegistry {
    pub fn get(&self, task_id: TaskId) -> Option<NodeId> {
        self.by_task.get(&task_id).copied()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.by_task.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.by_task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, NodeId)> + '_ {
        self.by_task.iter().map(|(task, node)| (*task, *node))
    }
}

/// Arena holding one visible subtree plus its external stand-ins.
///
/// A tree is built per rendering/export session and resolved in place.
/// Resolution needs `&mut self`, so a tree is never resolved from two threads
/// at once; independent trees can be resolved in parallel.
#[derive(Debug, Clone)]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    root: NodeId,
    internal: HashMap<TaskId, NodeId>,
    externals: ExternalRegistry,
}

impl TaskTree {
    pub fn new(root: TaskNode) -> Self {
        let root_id = NodeId(0);
        let mut internal = HashMap::new();
        internal.insert(root.id, root_id);
        let mut root = root;
        root.parent = None;
        root.children.clear();
        root.origin = NodeOrigin::Internal;
        Self {
            nodes: vec![root],
            root: root_id,
            internal,
            externals: ExternalRegistry::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TaskNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TaskNode> {
        self.nodes.get(id.0)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn externals(&self) -> &ExternalRegistry {
        &self.externals
    }

    /// Look a task up by id, preferring the visible subtree over stand-ins.
    pub fn find(&self, task_id: TaskId) -> Option<NodeId> {
        self.internal
            .get(&task_id)
            .copied()
            .or_else(|| self.externals.get(task_id))
    }

    pub fn find_internal(&self, task_id: TaskId) -> Option<NodeId> {
        self.internal.get(&task_id).copied()
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: TaskNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = Some(parent);
        node.children.clear();
        node.origin = NodeOrigin::Internal;
        if let Some(previous) = self.internal.insert(node.id, id) {
            tracing::warn!(task_id = node.id, ?previous, "task id added twice, lookups now see the newer node");
        }
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Register a stand-in, or return the one already registered for its id.
    pub fn add_external(&mut self, node: TaskNode) -> NodeId {
        if let Some(existing) = self.externals.get(node.id) {
            return existing;
        }
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = None;
        node.children.clear();
        node.predecessor = None;
        node.origin = NodeOrigin::External;
        self.externals.by_task.insert(node.id, id);
        self.nodes.push(node);
        id
    }

    pub fn set_predecessor(&mut self, node: NodeId, predecessor: Option<NodeId>) {
        self.nodes[node.0].predecessor = predecessor;
    }

    /// Move `node` under `new_parent` as its last child.
    ///
    /// Containment is not checked here; moving a node below one of its own
    /// descendants produces a structural cycle that
    /// [`check_structure`](crate::validation::check_structure) reports.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) {
        if let Some(old_parent) = self.nodes[node.0].parent {
            self.nodes[old_parent.0].children.retain(|child| *child != node);
        }
        self.nodes[node.0].parent = Some(new_parent);
        self.nodes[new_parent.0].children.push(node);
    }

    /// Pre-order walk of `from` and everything below it. Each node appears
    /// once even if the containment links are malformed.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Number of parent links between `node` and the top of its subtree.
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[node.0].parent;
        while let Some(parent) = current {
            depth += 1;
            if depth > self.nodes.len() {
                break;
            }
            current = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Visible internal nodes in tree order.
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.nodes[id.0].visible)
            .collect()
    }

    /// Forget calculated dates for `node` and all of its descendants.
    pub fn recalculate(&mut self, node: NodeId) {
        for id in self.descendants(node) {
            self.nodes[id.0].clear_cache();
        }
    }

    /// Forget every calculated date in the arena, stand-ins included.
    pub fn recalculate_all(&mut self) {
        for node in &mut self.nodes {
            node.clear_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_external_reuses_registered_node() {
        let mut tree = TaskTree::new(TaskNode::new(1, "root"));
        let first = tree.add_external(TaskNode::new(9, "outside"));
        let second = tree.add_external(TaskNode::new(9, "outside again"));
        assert_eq!(first, second);
        assert_eq!(tree.len(), 2);
        assert!(tree.node(first).is_external());
        assert_eq!(tree.find(9), Some(first));
        assert_eq!(tree.find_internal(9), None);
    }

    #[test]
    fn recalculate_clears_whole_subtree() {
        let mut tree = TaskTree::new(TaskNode::new(1, "root"));
        let child = tree.add_child(tree.root(), TaskNode::new(2, "child"));
        let grandchild = tree.add_child(child, TaskNode::new(3, "grandchild"));
        for id in [tree.root(), child, grandchild] {
            let node = tree.node_mut(id);
            node.start_cache.store(Some(d(2024, 1, 1)));
            node.end_cache.store(None);
        }

        tree.recalculate(child);

        assert!(tree.node(tree.root()).is_start_resolved());
        for id in [child, grandchild] {
            let node = tree.node(id);
            assert!(!node.is_start_resolved());
            assert!(!node.is_end_resolved());
            assert_eq!(node.calculated_start(), None);
        }
    }

    #[test]
    fn negative_duration_is_dropped() {
        let node = TaskNode::new(1, "t").with_duration(-3);
        assert_eq!(node.duration(), None);
    }

    #[test]
    fn depth_counts_parent_links() {
        let mut tree = TaskTree::new(TaskNode::new(1, "root"));
        let a = tree.add_child(tree.root(), TaskNode::new(2, "a"));
        let b = tree.add_child(a, TaskNode::new(3, "b"));
        assert_eq!(tree.depth(tree.root()), 0);
        assert_eq!(tree.depth(b), 2);
        assert_eq!(tree.descendants(tree.root()), vec![tree.root(), a, b]);
    }

    #[test]
    fn from_record_rounds_duration_and_parses_relation() {
        let mut record = TaskRecord::new(4, "Build");
        record.duration = Some(2.5);
        record.relation_type = Some("SS".into());
        record.predecessor_offset = Some(-1);
        let node = TaskNode::from_record(&record);
        assert_eq!(node.duration(), Some(3));
        assert_eq!(node.relation_type(), RelationType::StartStart);
        assert_eq!(node.predecessor_offset(), -1);
    }
}
