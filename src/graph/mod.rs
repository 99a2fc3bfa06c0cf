//! Undirected planar graph model: nodes and edges keyed by opaque string
//! ids, owned exclusively by the path manager.

pub mod path_manager;

pub use path_manager::PathManager;

use crate::types::{next_id, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub position: Vec2,
    pub edges: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub start_id: String,
    pub end_id: String,
}

/// Two maps keyed by id. Nodes list their incident edges, edges name their
/// endpoint nodes; this is a classic graph represented without direct
/// pointers so the invariants (endpoint existence, incidence-list
/// consistency) are trivial to check.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: HashMap<String, Node>,
    pub edges: HashMap<String, Edge>,
    /// Node ids in insertion order, kept only so Dijkstra tie-breaks are
    /// stable; the maps above are the source of truth for membership.
    node_order: Vec<String>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Node ids in the order they were created.
    pub fn node_order(&self) -> &[String] {
        &self.node_order
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn add_node(&mut self, position: Vec2) -> String {
        let id = next_id("n");
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                position,
                edges: Vec::new(),
            },
        );
        self.node_order.push(id.clone());
        id
    }

    /// Adds an undirected edge between two existing nodes. Panics if either
    /// endpoint is missing or if it would create a self-loop — callers are
    /// expected to have already validated both.
    pub fn add_edge(&mut self, start_id: &str, end_id: &str) -> String {
        assert_ne!(start_id, end_id, "self-loops are prohibited");
        assert!(self.nodes.contains_key(start_id));
        assert!(self.nodes.contains_key(end_id));

        let id = next_id("e");
        self.edges.insert(
            id.clone(),
            Edge {
                id: id.clone(),
                start_id: start_id.to_string(),
                end_id: end_id.to_string(),
            },
        );
        self.nodes.get_mut(start_id).unwrap().edges.push(id.clone());
        self.nodes.get_mut(end_id).unwrap().edges.push(id.clone());
        id
    }

    /// Removes an edge and its id from both endpoints' incidence lists.
    pub fn remove_edge(&mut self, edge_id: &str) {
        let Some(edge) = self.edges.remove(edge_id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&edge.start_id) {
            node.edges.retain(|e| e != edge_id);
        }
        if let Some(node) = self.nodes.get_mut(&edge.end_id) {
            node.edges.retain(|e| e != edge_id);
        }
    }

    pub fn edge_endpoints(&self, edge: &Edge) -> (Vec2, Vec2) {
        (
            self.nodes[&edge.start_id].position,
            self.nodes[&edge.end_id].position,
        )
    }

    /// Validates the two graph invariants: every edge's endpoints exist and
    /// list the edge back, and every node's incidence entries refer to
    /// existing edges naming that node. Used by tests.
    pub fn check_invariants(&self) -> bool {
        for edge in self.edges.values() {
            let Some(start) = self.nodes.get(&edge.start_id) else {
                return false;
            };
            let Some(end) = self.nodes.get(&edge.end_id) else {
                return false;
            };
            if !start.edges.contains(&edge.id) || !end.edges.contains(&edge.id) {
                return false;
            }
        }
        for node in self.nodes.values() {
            for edge_id in &node.edges {
                let Some(edge) = self.edges.get(edge_id) else {
                    return false;
                };
                if edge.start_id != node.id && edge.end_id != node.id {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_updates_incidence_lists() {
        let mut g = Graph::new();
        let a = g.add_node(Vec2::new(0.0, 0.0));
        let b = g.add_node(Vec2::new(1.0, 0.0));
        let e = g.add_edge(&a, &b);
        assert!(g.nodes[&a].edges.contains(&e));
        assert!(g.nodes[&b].edges.contains(&e));
        assert!(g.check_invariants());
    }

    #[test]
    fn remove_edge_cleans_up_incidence_lists() {
        let mut g = Graph::new();
        let a = g.add_node(Vec2::new(0.0, 0.0));
        let b = g.add_node(Vec2::new(1.0, 0.0));
        let e = g.add_edge(&a, &b);
        g.remove_edge(&e);
        assert!(g.nodes[&a].edges.is_empty());
        assert!(g.nodes[&b].edges.is_empty());
        assert!(!g.edges.contains_key(&e));
        assert!(g.check_invariants());
    }

    #[test]
    #[should_panic]
    fn self_loop_panics() {
        let mut g = Graph::new();
        let a = g.add_node(Vec2::new(0.0, 0.0));
        g.add_edge(&a, &a);
    }
}
