use crate::calendar::WorkingDayCalendar;
use crate::task::{Endpoint, RelationType};
use crate::tree::{NodeId, TaskTree};
use chrono::NaiveDate;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Nodes whose start or end is being worked out further up the current call.
///
/// One context per top-level `resolved_start`/`resolved_end` call; it is
/// threaded through the recursion and dropped afterwards.
#[derive(Debug, Default)]
struct ResolutionContext {
    visiting_start: HashSet<NodeId>,
    visiting_end: HashSet<NodeId>,
}

impl ResolutionContext {
    fn visiting(&mut self, endpoint: Endpoint) -> &mut HashSet<NodeId> {
        match endpoint {
            Endpoint::Start => &mut self.visiting_start,
            Endpoint::Finish => &mut self.visiting_end,
        }
    }

    fn is_visiting(&self, endpoint: Endpoint, node: NodeId) -> bool {
        match endpoint {
            Endpoint::Start => self.visiting_start.contains(&node),
            Endpoint::Finish => self.visiting_end.contains(&node),
        }
    }
}

/// The inputs of one node that resolution reads, copied out so the tree can
/// be borrowed mutably while recursing.
struct NodeInputs {
    task_id: i32,
    explicit_start: Option<NaiveDate>,
    explicit_end: Option<NaiveDate>,
    duration: Option<i64>,
    predecessor: Option<NodeId>,
    relation_type: RelationType,
    offset: i32,
    children: Vec<NodeId>,
}

impl NodeInputs {
    fn explicit(&self, endpoint: Endpoint) -> Option<NaiveDate> {
        match endpoint {
            Endpoint::Start => self.explicit_start,
            Endpoint::Finish => self.explicit_end,
        }
    }
}

fn opposite(endpoint: Endpoint) -> Endpoint {
    match endpoint {
        Endpoint::Start => Endpoint::Finish,
        Endpoint::Finish => Endpoint::Start,
    }
}

/// Direction a duration is applied in to get from one endpoint to the other:
/// the end lies `duration` working days after the start.
fn duration_sign(towards: Endpoint) -> i64 {
    match towards {
        Endpoint::Start => -1,
        Endpoint::Finish => 1,
    }
}

/// Calculates effective start and end dates over a [`TaskTree`].
///
/// Results are cached on the nodes; a second query for the same endpoint
/// returns the cached value without touching the graph or the calendar.
pub struct DateResolver<'a, C: WorkingDayCalendar + ?Sized> {
    tree: &'a mut TaskTree,
    calendar: &'a C,
}

impl<'a, C: WorkingDayCalendar + ?Sized> DateResolver<'a, C> {
    pub fn new(tree: &'a mut TaskTree, calendar: &'a C) -> Self {
        Self { tree, calendar }
    }

    pub fn resolved_start(&mut self, node: NodeId) -> Option<NaiveDate> {
        self.resolve_query(node, Endpoint::Start)
    }

    pub fn resolved_end(&mut self, node: NodeId) -> Option<NaiveDate> {
        self.resolve_query(node, Endpoint::Finish)
    }

    fn resolve_query(&mut self, node: NodeId, endpoint: Endpoint) -> Option<NaiveDate> {
        if let Some(value) = self.cached(node, endpoint) {
            return value;
        }
        let n = self.tree.node(node);
        let explicit = match endpoint {
            Endpoint::Start => n.explicit_start(),
            Endpoint::Finish => n.explicit_end(),
        };
        if explicit.is_some() {
            let mut ctx = ResolutionContext::default();
            return self.resolve(node, endpoint, &mut ctx);
        }
        // Dependencies first, so the recursion below only ever meets cached
        // values outside of predecessor cycles.
        for dependency in self.dependency_order(node) {
            for side in [Endpoint::Start, Endpoint::Finish] {
                let mut ctx = ResolutionContext::default();
                self.resolve(dependency, side, &mut ctx);
            }
        }
        let mut ctx = ResolutionContext::default();
        self.resolve(node, endpoint, &mut ctx)
    }

    /// Not yet resolved nodes `node` depends on through predecessor and child
    /// links, every node after the ones it depends on.
    ///
    /// Nodes that take part in a cycle are left out and `node` itself is
    /// excluded. The walk and the ordering are both iterative, so chains of
    /// any length are fine.
    fn dependency_order(&self, node: NodeId) -> Vec<NodeId> {
        let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
        let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
        index.insert(node, graph.add_node(node));
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            let Some(&from) = index.get(&current) else {
                continue;
            };
            let n = self.tree.node(current);
            let dependencies = n.predecessor().into_iter().chain(n.children().iter().copied());
            for dependency in dependencies {
                let d = self.tree.node(dependency);
                if d.is_start_resolved() && d.is_end_resolved() {
                    continue;
                }
                let to = match index.get(&dependency) {
                    Some(&ix) => ix,
                    None => {
                        let ix = graph.add_node(dependency);
                        index.insert(dependency, ix);
                        stack.push(dependency);
                        ix
                    }
                };
                graph.add_edge(from, to, ());
            }
        }

        // Components come out with dependencies before their dependents.
        kosaraju_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() == 1 && graph.find_edge(component[0], component[0]).is_none()
            })
            .map(|component| graph[component[0]])
            .filter(|id| *id != node)
            .collect()
    }

    /// Resolve both endpoints of every node in the arena, stand-ins included.
    /// Returns how many nodes ended up with both dates.
    pub fn resolve_all(&mut self) -> usize {
        let ids: Vec<NodeId> = self.tree.node_ids().collect();
        let mut complete = 0;
        for id in ids {
            let start = self.resolved_start(id);
            let end = self.resolved_end(id);
            if start.is_some() && end.is_some() {
                complete += 1;
            }
        }
        complete
    }

    fn inputs(&self, node: NodeId) -> NodeInputs {
        let n = self.tree.node(node);
        NodeInputs {
            task_id: n.id(),
            explicit_start: n.explicit_start(),
            explicit_end: n.explicit_end(),
            duration: n.duration(),
            predecessor: n.predecessor(),
            relation_type: n.relation_type(),
            offset: n.predecessor_offset(),
            children: n.children().to_vec(),
        }
    }

    fn cached(&self, node: NodeId, endpoint: Endpoint) -> Option<Option<NaiveDate>> {
        let n = self.tree.node(node);
        let cache = match endpoint {
            Endpoint::Start => n.start_cache,
            Endpoint::Finish => n.end_cache,
        };
        cache.resolved.then_some(cache.value)
    }

    fn store(&mut self, node: NodeId, endpoint: Endpoint, value: Option<NaiveDate>) -> Option<NaiveDate> {
        let n = self.tree.node_mut(node);
        match endpoint {
            Endpoint::Start => n.start_cache.store(value),
            Endpoint::Finish => n.end_cache.store(value),
        }
    }

    fn shift(&self, date: NaiveDate, days: i64) -> Option<NaiveDate> {
        if days == 0 {
            return Some(date);
        }
        self.calendar.shift(date, days)
    }

    /// Start resolution and its mirror image for the end.
    fn resolve(
        &mut self,
        node: NodeId,
        endpoint: Endpoint,
        ctx: &mut ResolutionContext,
    ) -> Option<NaiveDate> {
        let inputs = self.inputs(node);
        let other = opposite(endpoint);

        // 1. explicit value
        if let Some(date) = inputs.explicit(endpoint) {
            return self.store(node, endpoint, Some(date));
        }

        // 2. memoized
        if let Some(value) = self.cached(node, endpoint) {
            return value;
        }

        // 3. explicit partner plus duration
        if let (Some(duration), Some(partner)) = (inputs.duration, inputs.explicit(other)) {
            let value = self.shift(partner, duration_sign(endpoint) * duration);
            return self.store(node, endpoint, value);
        }

        // 4. cycle guard
        if !ctx.visiting(endpoint).insert(node) {
            tracing::error!(
                task_id = inputs.task_id,
                endpoint = ?endpoint,
                "predecessor cycle detected, leaving date unresolved"
            );
            return None;
        }

        // 5. predecessor
        let mut value = match inputs.predecessor {
            Some(predecessor) => self.from_predecessor(&inputs, predecessor, endpoint, ctx),
            None => None,
        };

        // 6. rollup over children
        if value.is_none() && !inputs.children.is_empty() {
            value = self.rollup(&inputs.children, endpoint, ctx);
        }

        // 7. the other endpoint plus duration
        if value.is_none() {
            if let Some(duration) = inputs.duration {
                // The other endpoint is already deriving itself from this one.
                if !ctx.is_visiting(other, node) {
                    value = self
                        .resolve(node, other, ctx)
                        .and_then(|date| self.shift(date, duration_sign(endpoint) * duration));
                }
            }
        }

        // 8. cache whatever came out
        ctx.visiting(endpoint).remove(&node);
        self.store(node, endpoint, value)
    }

    fn from_predecessor(
        &mut self,
        inputs: &NodeInputs,
        predecessor: NodeId,
        endpoint: Endpoint,
        ctx: &mut ResolutionContext,
    ) -> Option<NaiveDate> {
        let relation = inputs.relation_type;
        let anchor = self.resolve(predecessor, relation.predecessor_endpoint(), ctx)?;
        let linked = self.shift(anchor, i64::from(inputs.offset))?;

        // `linked` is the successor endpoint named by the relation; the
        // other endpoint needs a duration to get there.
        if relation.successor_endpoint() == endpoint {
            Some(linked)
        } else {
            let duration = inputs.duration.filter(|days| *days > 0)?;
            self.shift(linked, duration_sign(endpoint) * duration)
        }
    }

    fn rollup(
        &mut self,
        children: &[NodeId],
        endpoint: Endpoint,
        ctx: &mut ResolutionContext,
    ) -> Option<NaiveDate> {
        let dates = children
            .iter()
            .filter_map(|child| self.resolve(*child, endpoint, ctx))
            .collect::<Vec<_>>();
        match endpoint {
            Endpoint::Start => dates.into_iter().min(),
            Endpoint::Finish => dates.into_iter().max(),
        }
    }
}

impl TaskTree {
    /// Effective start of `node`, resolving and caching on first access.
    pub fn resolved_start<C: WorkingDayCalendar + ?Sized>(
        &mut self,
        node: NodeId,
        calendar: &C,
    ) -> Option<NaiveDate> {
        DateResolver::new(self, calendar).resolved_start(node)
    }

    /// Effective end of `node`, resolving and caching on first access.
    pub fn resolved_end<C: WorkingDayCalendar + ?Sized>(
        &mut self,
        node: NodeId,
        calendar: &C,
    ) -> Option<NaiveDate> {
        DateResolver::new(self, calendar).resolved_end(node)
    }

    pub fn resolve_all<C: WorkingDayCalendar + ?Sized>(&mut self, calendar: &C) -> usize {
        DateResolver::new(self, calendar).resolve_all()
    }
}
