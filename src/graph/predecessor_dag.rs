use crate::task::{RelationType, TaskId};
use crate::tree::{NodeId, TaskTree};
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Predecessor links of a tree as a directed graph, edges pointing from
/// predecessor to successor.
///
/// Resolution copes with cycles on its own; this view exists to report them
/// up front, for callers that would rather reject such a chart.
pub struct PredecessorGraph {
    pub graph: DiGraph<TaskId, RelationType>,
    pub node_to_index: HashMap<NodeId, NodeIndex>,
}

impl PredecessorGraph {
    pub fn build(tree: &TaskTree) -> Self {
        let mut graph: DiGraph<TaskId, RelationType> = DiGraph::new();
        let mut node_to_index: HashMap<NodeId, NodeIndex> = HashMap::new();

        // Add nodes first
        for id in tree.node_ids() {
            let ix = graph.add_node(tree.node(id).id());
            node_to_index.insert(id, ix);
        }

        // Add edges: predecessor -> task
        for id in tree.node_ids() {
            let node = tree.node(id);
            if let Some(predecessor) = node.predecessor() {
                if let (Some(&from), Some(&to)) =
                    (node_to_index.get(&predecessor), node_to_index.get(&id))
                {
                    graph.add_edge(from, to, node.relation_type());
                }
            }
        }

        Self {
            graph,
            node_to_index,
        }
    }

    /// Every predecessor cycle as the task ids taking part in it, sorted.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.find_edge(component[0], component[0]).is_some()
            })
            .map(|component| {
                let mut ids: Vec<TaskId> = component.iter().map(|ix| self.graph[*ix]).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn has_cycles(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    /// Tasks in an order where every predecessor comes before its
    /// successors, or `None` if there is a cycle.
    pub fn dependency_order(&self) -> Option<Vec<TaskId>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(|ix| self.graph[ix]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TaskNode;

    fn tree_with_links(links: &[(TaskId, TaskId)]) -> TaskTree {
        let mut tree = TaskTree::new(TaskNode::new(0, "root"));
        let root = tree.root();
        for id in 1..=4 {
            tree.add_child(root, TaskNode::new(id, format!("t{id}")));
        }
        for (task, predecessor) in links {
            let node = tree.find(*task).unwrap();
            let pred = tree.find(*predecessor);
            tree.set_predecessor(node, pred);
        }
        tree
    }

    #[test]
    fn acyclic_links_have_an_order() {
        let tree = tree_with_links(&[(2, 1), (3, 2), (4, 2)]);
        let graph = PredecessorGraph::build(&tree);
        assert_eq!(graph.graph.edge_count(), 3);
        assert!(!graph.has_cycles());
        assert!(graph.cycles().is_empty());
        let order = graph.dependency_order().unwrap();
        let pos = |id: TaskId| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(1) < pos(2));
        assert!(pos(2) < pos(3));
        assert!(pos(2) < pos(4));
    }

    #[test]
    fn cycles_and_self_loops_are_reported() {
        let tree = tree_with_links(&[(1, 2), (2, 1), (3, 3)]);
        let graph = PredecessorGraph::build(&tree);
        assert!(graph.has_cycles());
        assert_eq!(graph.cycles(), vec![vec![1, 2], vec![3]]);
        assert_eq!(graph.dependency_order(), None);
    }
}
