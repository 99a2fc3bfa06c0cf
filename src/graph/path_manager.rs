//! Online construction of the walkable-path graph: recording, PCA-based
//! finalize, snap, split, and Dijkstra routing.

use super::{Edge, Graph};
use crate::types::Vec2;
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Projects `point` onto the segment `s..e` and returns the clamped
/// parameter, the foot of the projection, and the distance from `point` to
/// that foot. A zero-length edge degenerates to its single endpoint.
fn project_onto_segment(point: Vec2, s: Vec2, e: Vec2) -> (Vec2, f64) {
    let v = e.sub(s);
    let len_sq = v.length_squared();
    if len_sq == 0.0 {
        return (s, point.distance(s));
    }
    let t = ((point.sub(s)).dot(v) / len_sq).clamp(0.0, 1.0);
    let foot = s.add(v.scale(t));
    (foot, point.distance(foot))
}

pub struct PathManager {
    graph: Graph,
    recording_buffer: Vec<Vec2>,
    anchor: Option<String>,
    inactivity_deadline_ms: Option<i64>,

    snap_threshold_m: f64,
    node_snap_threshold_m: f64,
    min_finalize_length_m: f64,
    inactivity_timeout_ms: i64,
}

impl PathManager {
    pub fn new(
        snap_threshold_m: f64,
        node_snap_threshold_m: f64,
        min_finalize_length_m: f64,
        inactivity_timeout_ms: i64,
    ) -> Self {
        PathManager {
            graph: Graph::new(),
            recording_buffer: Vec::new(),
            anchor: None,
            inactivity_deadline_ms: None,
            snap_threshold_m,
            node_snap_threshold_m,
            min_finalize_length_m,
            inactivity_timeout_ms,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn has_path(&self) -> bool {
        !self.graph.is_empty()
    }

    pub fn recording_buffer(&self) -> &[Vec2] {
        &self.recording_buffer
    }

    /// §4.5.1 start: attempts a split at `position`; if one occurs the new
    /// node becomes the anchor, otherwise (if no path exists yet) any stale
    /// buffer is cleared and the anchor stays null.
    pub fn start_recording(&mut self, position: Vec2) {
        if let Some(node_id) = self.split_edge_at_point(position) {
            self.anchor = Some(node_id);
        } else if !self.has_path() {
            self.recording_buffer.clear();
            self.anchor = None;
        }
        self.inactivity_deadline_ms = None;
    }

    /// §4.5.1 stop: cancels the timer, finalizes the current segment, and
    /// reports whether the graph changed so the caller can emit
    /// `path_changed`.
    pub fn stop_recording(&mut self) -> bool {
        self.inactivity_deadline_ms = None;
        self.finalize()
    }

    /// §4.4 recording side-effect: appends a dead-reckoned position to the
    /// buffer and resets the one-shot inactivity timer.
    pub fn record_step(&mut self, position: Vec2, now_ms: i64) {
        self.recording_buffer.push(position);
        self.inactivity_deadline_ms = Some(now_ms + self.inactivity_timeout_ms);
    }

    /// §4.5.2: advances the inactivity timer. Returns `true` (and finalizes)
    /// if the timer fired, while remaining in recording mode.
    pub fn tick(&mut self, now_ms: i64) -> bool {
        match self.inactivity_deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.inactivity_deadline_ms = None;
                self.finalize()
            }
            _ => false,
        }
    }

    /// §4.5.3: PCA-regresses the recording buffer into a single line-segment
    /// edge. Returns `true` if the graph changed.
    pub fn finalize(&mut self) -> bool {
        let points = std::mem::take(&mut self.recording_buffer);

        if points.len() < 2 {
            warn!("finalize rejected: fewer than 2 points");
            self.recording_buffer = points;
            return false;
        }
        let total_length: f64 = points.windows(2).map(|w| w[1].distance(w[0])).sum();
        if total_length < self.min_finalize_length_m {
            warn!("finalize rejected: polyline length {total_length:.3}m below minimum");
            self.recording_buffer = points;
            return false;
        }

        let n = points.len() as f64;
        let centroid = points
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc.add(*p))
            .scale(1.0 / n);

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for p in &points {
            let d = p.sub(centroid);
            sxx += d.x * d.x;
            sxy += d.x * d.y;
            syy += d.y * d.y;
        }

        let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        let dir = Vec2::new(theta.cos(), theta.sin());

        let projections: Vec<f64> = points.iter().map(|p| p.sub(centroid).dot(dir)).collect();
        let pi_min = projections.iter().cloned().fold(f64::INFINITY, f64::min);
        let pi_max = projections.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let a = centroid.add(dir.scale(pi_min));
        let b = centroid.add(dir.scale(pi_max));

        match self.anchor.clone() {
            None => {
                let node_a = self.graph.add_node(a);
                let node_b = self.graph.add_node(b);
                self.graph.add_edge(&node_a, &node_b);
                self.anchor = Some(node_b);
                info!("finalized first segment: {node_a} -> {} nodes added", self.anchor.clone().unwrap());
            }
            Some(anchor_id) => {
                let anchor_pos = self.graph.nodes[&anchor_id].position;
                let far = if a.distance(anchor_pos) <= b.distance(anchor_pos) { b } else { a };
                let far_node = self.graph.add_node(far);
                self.graph.add_edge(&anchor_id, &far_node);
                self.anchor = Some(far_node.clone());
                info!("finalized segment anchored at {anchor_id} -> {far_node}");
            }
        }

        true
    }

    fn nearest_edge(&self, point: Vec2) -> Option<(Edge, Vec2, f64)> {
        let mut best: Option<(Edge, Vec2, f64)> = None;
        for edge in self.graph.edges.values() {
            let (s, e) = self.graph.edge_endpoints(edge);
            let (foot, dist) = project_onto_segment(point, s, e);
            if best.as_ref().map(|(_, _, d)| dist < *d).unwrap_or(true) {
                best = Some((edge.clone(), foot, dist));
            }
        }
        best
    }

    /// §4.5.4: projects `point` onto the nearest edge. Returns the foot when
    /// `strict` or within threshold; otherwise returns `point` unchanged.
    pub fn snap(&self, point: Vec2, strict: bool) -> Vec2 {
        if self.graph.is_empty() {
            return point;
        }
        let Some((_, foot, dist)) = self.nearest_edge(point) else {
            return point;
        };
        if strict || dist <= self.snap_threshold_m {
            foot
        } else {
            point
        }
    }

    /// §4.5.5: splits the nearest edge at `point` if within threshold,
    /// inserting a new node there and rewiring the two halves. Sets the
    /// anchor to the new node. Returns the new node's id, or `None` if no
    /// edge was within threshold (no mutation in that case).
    pub fn split_edge_at_point(&mut self, point: Vec2) -> Option<String> {
        let (edge, foot, dist) = self.nearest_edge(point)?;
        if dist > self.snap_threshold_m {
            return None;
        }

        let (s, e) = self.graph.edge_endpoints(&edge);
        // Skip split if the projection coincides with an existing endpoint;
        // that would create a zero-length edge.
        if foot.distance(s) < 1e-9 {
            return Some(edge.start_id.clone());
        }
        if foot.distance(e) < 1e-9 {
            return Some(edge.end_id.clone());
        }

        let new_node = self.graph.add_node(foot);
        let start_id = edge.start_id.clone();
        let end_id = edge.end_id.clone();
        self.graph.remove_edge(&edge.id);
        self.graph.add_edge(&start_id, &new_node);
        self.graph.add_edge(&new_node, &end_id);
        debug!("split edge {} at {:?} -> node {new_node}", edge.id, foot);
        Some(new_node)
    }

    fn nearest_node(&self, point: Vec2) -> Option<(String, f64)> {
        let mut best: Option<(String, f64)> = None;
        for id in &self.graph.node_order {
            let node = &self.graph.nodes[id];
            let dist = node.position.distance(point);
            if best.as_ref().map(|(_, d)| dist < *d).unwrap_or(true) {
                best = Some((id.clone(), dist));
            }
        }
        best
    }

    /// §4.5.6: Dijkstra shortest path between the nodes nearest `start` and
    /// `end`, falling back to `[end]` whenever routing is not possible.
    pub fn find_path(&self, start: Vec2, end: Vec2) -> Vec<Vec2> {
        let fallback = vec![end];

        let Some((start_id, start_dist)) = self.nearest_node(start) else {
            return fallback;
        };
        let Some((end_id, end_dist)) = self.nearest_node(end) else {
            return fallback;
        };
        if start_dist > self.node_snap_threshold_m || end_dist > self.node_snap_threshold_m {
            return fallback;
        }
        if start_id == end_id {
            return fallback;
        }

        match self.dijkstra(&start_id, &end_id) {
            Some(mut node_path) => {
                node_path.push(end);
                node_path
            }
            None => fallback,
        }
    }

    fn dijkstra(&self, start_id: &str, end_id: &str) -> Option<Vec<Vec2>> {
        #[derive(PartialEq)]
        struct HeapEntry {
            dist: f64,
            order: usize,
            node: String,
        }
        impl Eq for HeapEntry {}
        impl Ord for HeapEntry {
            fn cmp(&self, other: &Self) -> Ordering {
                // Min-heap by distance, ties broken by insertion order.
                other
                    .dist
                    .partial_cmp(&self.dist)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| other.order.cmp(&self.order))
            }
        }
        impl PartialOrd for HeapEntry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let order_index: HashMap<&str, usize> = self
            .graph
            .node_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut dist: HashMap<String, f64> = HashMap::new();
        let mut prev: HashMap<String, String> = HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(start_id.to_string(), 0.0);
        heap.push(HeapEntry {
            dist: 0.0,
            order: order_index[start_id],
            node: start_id.to_string(),
        });

        while let Some(HeapEntry { dist: d, node, .. }) = heap.pop() {
            if node == end_id {
                break;
            }
            if d > *dist.get(&node).unwrap_or(&f64::INFINITY) {
                continue;
            }
            let current_pos = self.graph.nodes[&node].position;
            for edge_id in &self.graph.nodes[&node].edges {
                let edge = &self.graph.edges[edge_id];
                let neighbor = if edge.start_id == node { &edge.end_id } else { &edge.start_id };
                let weight = self.graph.nodes[neighbor].position.distance(current_pos);
                let next_dist = d + weight;
                if next_dist < *dist.get(neighbor).unwrap_or(&f64::INFINITY) {
                    dist.insert(neighbor.clone(), next_dist);
                    prev.insert(neighbor.clone(), node.clone());
                    heap.push(HeapEntry {
                        dist: next_dist,
                        order: order_index[neighbor.as_str()],
                        node: neighbor.clone(),
                    });
                }
            }
        }

        if !dist.contains_key(end_id) {
            return None;
        }

        let mut path_ids = vec![end_id.to_string()];
        let mut cur = end_id.to_string();
        while cur != start_id {
            let p = prev.get(&cur)?;
            path_ids.push(p.clone());
            cur = p.clone();
        }
        path_ids.reverse();

        Some(path_ids.iter().map(|id| self.graph.nodes[id].position).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm() -> PathManager {
        PathManager::new(2.0, 5.0, 1.0, 2_000)
    }

    #[test]
    fn split_far_from_endpoint_creates_three_nodes_two_edges() {
        let mut mgr = pm();
        let a = mgr.graph.add_node(Vec2::new(0.0, 0.0));
        let b = mgr.graph.add_node(Vec2::new(10.0, 0.0));
        mgr.graph.add_edge(&a, &b);

        let new_node = mgr.split_edge_at_point(Vec2::new(1.5, 0.0)).unwrap();
        assert_eq!(mgr.graph.nodes.len(), 3);
        assert_eq!(mgr.graph.edges.len(), 2);
        let pos = mgr.graph.nodes[&new_node].position;
        assert!((pos.x - 1.5).abs() < 1e-3);
        assert!(pos.y.abs() < 1e-3);
        assert!(mgr.graph.check_invariants());
    }

    #[test]
    fn split_idempotent_when_called_twice() {
        let mut mgr = pm();
        let a = mgr.graph.add_node(Vec2::new(0.0, 0.0));
        let b = mgr.graph.add_node(Vec2::new(10.0, 0.0));
        mgr.graph.add_edge(&a, &b);

        let n1 = mgr.split_edge_at_point(Vec2::new(1.5, 0.0));
        let nodes_after_first = mgr.graph.nodes.len();
        let edges_after_first = mgr.graph.edges.len();

        let n2 = mgr.split_edge_at_point(Vec2::new(1.5, 0.0));
        assert_eq!(n1, n2);
        assert_eq!(mgr.graph.nodes.len(), nodes_after_first);
        assert_eq!(mgr.graph.edges.len(), edges_after_first);
    }

    #[test]
    fn snap_idempotent() {
        let mut mgr = pm();
        let a = mgr.graph.add_node(Vec2::new(0.0, 0.0));
        let b = mgr.graph.add_node(Vec2::new(10.0, 0.0));
        mgr.graph.add_edge(&a, &b);

        let p = Vec2::new(3.0, 1.0);
        let once = mgr.snap(p, true);
        let twice = mgr.snap(once, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn snap_returns_input_when_graph_empty() {
        let mgr = pm();
        let p = Vec2::new(3.0, 1.0);
        assert_eq!(mgr.snap(p, true), p);
    }

    #[test]
    fn finalize_collinear_points_yields_one_edge_along_x_axis() {
        let mut mgr = pm();
        for p in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)] {
            mgr.record_step(Vec2::new(p.0, p.1), 0);
        }
        assert!(mgr.finalize());
        assert_eq!(mgr.graph.edges.len(), 1);
        let edge = mgr.graph.edges.values().next().unwrap();
        let (s, e) = mgr.graph.edge_endpoints(edge);
        assert!((s.distance(e) - 4.0).abs() < 1e-6);
        let min_x = s.x.min(e.x);
        let max_x = s.x.max(e.x);
        assert!(min_x.abs() < 1e-6);
        assert!((max_x - 4.0).abs() < 1e-6);
    }

    #[test]
    fn finalize_rejects_short_segment_and_keeps_buffer() {
        let mut mgr = pm();
        for p in [(0.0, 0.0), (0.2, 0.0), (0.3, 0.0)] {
            mgr.record_step(Vec2::new(p.0, p.1), 0);
        }
        assert!(!mgr.finalize());
        assert_eq!(mgr.graph.nodes.len(), 0);
        assert_eq!(mgr.graph.edges.len(), 0);
    }

    #[test]
    fn finalize_conservation_with_anchor() {
        let mut mgr = pm();
        for p in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)] {
            mgr.record_step(Vec2::new(p.0, p.1), 0);
        }
        mgr.finalize();
        let nodes_before = mgr.graph.nodes.len();
        let edges_before = mgr.graph.edges.len();

        for p in [(4.0, 0.0), (5.0, 0.0), (6.0, 0.0)] {
            mgr.record_step(Vec2::new(p.0, p.1), 0);
        }
        mgr.finalize();
        assert_eq!(mgr.graph.nodes.len(), nodes_before + 1);
        assert_eq!(mgr.graph.edges.len(), edges_before + 1);
    }

    #[test]
    fn dijkstra_routes_around_a_square() {
        let mut mgr = pm();
        let n00 = mgr.graph.add_node(Vec2::new(0.0, 0.0));
        let n10 = mgr.graph.add_node(Vec2::new(10.0, 0.0));
        let n11 = mgr.graph.add_node(Vec2::new(10.0, 10.0));
        let n01 = mgr.graph.add_node(Vec2::new(0.0, 10.0));
        mgr.graph.add_edge(&n00, &n10);
        mgr.graph.add_edge(&n10, &n11);
        mgr.graph.add_edge(&n11, &n01);
        mgr.graph.add_edge(&n01, &n00);

        let path = mgr.find_path(Vec2::new(0.1, 0.1), Vec2::new(9.9, 9.9));
        assert!(path.len() == 3 || path.len() == 4);
        assert_eq!(*path.last().unwrap(), Vec2::new(9.9, 9.9));
    }

    #[test]
    fn find_path_falls_back_when_no_node_nearby() {
        let mgr = pm();
        let path = mgr.find_path(Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0));
        assert_eq!(path, vec![Vec2::new(5.0, 5.0)]);
    }

    #[test]
    fn tick_auto_finalizes_after_inactivity_timeout() {
        let mut mgr = pm();
        mgr.record_step(Vec2::new(0.0, 0.0), 0);
        mgr.record_step(Vec2::new(2.0, 0.0), 100);
        assert!(!mgr.tick(1_000));
        assert!(mgr.tick(2_101));
        assert_eq!(mgr.graph.edges.len(), 1);
    }

    #[test]
    fn stop_recording_clears_buffer() {
        let mut mgr = pm();
        mgr.record_step(Vec2::new(0.0, 0.0), 0);
        mgr.record_step(Vec2::new(2.0, 0.0), 100);
        mgr.stop_recording();
        assert!(mgr.recording_buffer().is_empty());
    }
}
