//! Bounded graph traversal: k-hop subgraph extraction and simple-path enumeration.
//!
//! Both operations are exponential in the worst case, so every entry point takes
//! explicit bounds. Orders are derived from relation insertion order (see
//! [`KnowledgeGraph::neighbors`]), which makes results reproducible.

use std::collections::{HashMap, HashSet};

use petgraph::Direction as PgDirection;

use super::index::KnowledgeGraph;
use super::{Direction, Triple};

/// Bounds for a k-hop extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopBounds {
    /// Number of BFS layers to expand.
    pub hops: usize,
    /// Maximum number of entities in the result.
    pub max_nodes: usize,
}

/// Bounds for simple-path enumeration. Both are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathBounds {
    /// Maximum number of edges per path.
    pub max_length: usize,
    /// Maximum number of paths returned.
    pub max_paths: usize,
}

/// Extract the k-hop neighbourhood of `seeds` as a new graph.
///
/// Seeds that are not entities are ignored; duplicates collapse. Each layer is
/// expanded in full (both directions) until adding it would exceed `max_nodes`,
/// in which case the layer is cut in neighbour-discovery order and expansion
/// stops. Only relations with both endpoints in the visited set are copied;
/// with zero hops the result holds the seeds alone, without relations.
pub fn k_hop_subgraph(graph: &KnowledgeGraph, seeds: &[String], bounds: HopBounds) -> KnowledgeGraph {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order: Vec<&str> = Vec::new();

    for seed in seeds {
        if order.len() >= bounds.max_nodes {
            break;
        }
        if graph.contains_entity(seed) && visited.insert(seed.as_str()) {
            order.push(seed.as_str());
        }
    }

    let mut frontier: Vec<&str> = order.clone();
    for _ in 0..bounds.hops {
        let mut layer: Vec<&str> = Vec::new();
        for node in &frontier {
            for neighbor in graph.neighbors(node, Direction::Both) {
                let Some(entity) = graph.entity(&neighbor) else {
                    continue;
                };
                let id = entity.id.as_str();
                if !visited.contains(id) && !layer.contains(&id) {
                    layer.push(id);
                }
            }
        }
        if layer.is_empty() {
            break;
        }

        let room = bounds.max_nodes.saturating_sub(order.len());
        let truncated = layer.len() > room;
        layer.truncate(room);
        for id in &layer {
            visited.insert(*id);
            order.push(*id);
        }
        if truncated {
            tracing::debug!(max_nodes = bounds.max_nodes, "k-hop expansion truncated");
            break;
        }
        frontier = layer;
    }

    let mut subgraph = KnowledgeGraph::new();
    for id in &order {
        if let Some(entity) = graph.entity(id) {
            subgraph.add_entity(entity.clone());
        }
    }

    if bounds.hops == 0 {
        return subgraph;
    }

    let mut positions: Vec<usize> = order
        .iter()
        .flat_map(|id| graph.edge_positions(id, PgDirection::Outgoing))
        .filter(|&p| visited.contains(graph.relation_at(p).tail.as_str()))
        .collect();
    positions.sort_unstable();
    positions.dedup();
    for p in positions {
        subgraph.add_relation(graph.relation_at(p).clone());
    }
    subgraph
}

/// Enumerate simple directed paths from `source` to `target`.
///
/// Paths follow outgoing edges, never repeat a node, have at most
/// `bounds.max_length` edges, and are returned in depth-first discovery order,
/// at most `bounds.max_paths` of them. Between two adjacent nodes the earliest
/// inserted relation is used.
pub fn find_paths(
    graph: &KnowledgeGraph,
    source: &str,
    target: &str,
    bounds: PathBounds,
) -> Vec<Vec<Triple>> {
    if source == target
        || bounds.max_length == 0
        || bounds.max_paths == 0
        || !graph.has_node(source)
        || !graph.has_node(target)
    {
        return vec![];
    }

    let mut search = PathSearch {
        graph,
        target,
        bounds,
        adjacency: HashMap::new(),
        visited: HashSet::from([source.to_string()]),
        stack: Vec::new(),
        found: Vec::new(),
    };
    search.descend(source);

    search
        .found
        .into_iter()
        .map(|positions| {
            positions
                .into_iter()
                .map(|p| graph.relation_at(p).as_triple())
                .collect()
        })
        .collect()
}

/// Depth-first search state for [`find_paths`].
struct PathSearch<'a> {
    graph: &'a KnowledgeGraph,
    target: &'a str,
    bounds: PathBounds,
    /// Memoized outgoing adjacency: node → (neighbour, earliest relation position).
    adjacency: HashMap<String, Vec<(String, usize)>>,
    visited: HashSet<String>,
    stack: Vec<usize>,
    found: Vec<Vec<usize>>,
}

impl PathSearch<'_> {
    fn successors(&mut self, node: &str) -> Vec<(String, usize)> {
        if let Some(cached) = self.adjacency.get(node) {
            return cached.clone();
        }
        let graph = self.graph;
        let mut seen: HashSet<&str> = HashSet::new();
        let next: Vec<(String, usize)> = graph
            .edge_positions(node, PgDirection::Outgoing)
            .into_iter()
            .filter_map(|p| {
                let tail = graph.relation_at(p).tail.as_str();
                (tail != node && seen.insert(tail)).then(|| (tail.to_string(), p))
            })
            .collect();
        self.adjacency.insert(node.to_string(), next.clone());
        next
    }

    fn full(&self) -> bool {
        self.found.len() >= self.bounds.max_paths
    }

    fn descend(&mut self, node: &str) {
        for (next, position) in self.successors(node) {
            if self.full() {
                return;
            }
            if self.visited.contains(&next) {
                continue;
            }
            self.stack.push(position);
            if next == self.target {
                self.found.push(self.stack.clone());
            } else if self.stack.len() < self.bounds.max_length {
                self.visited.insert(next.clone());
                self.descend(&next);
                self.visited.remove(&next);
            }
            self.stack.pop();
        }
    }
}

impl KnowledgeGraph {
    /// Extract the `k`-hop neighbourhood of `seeds`, capped at `max_nodes` entities.
    pub fn k_hop_subgraph(&self, seeds: &[String], k: usize, max_nodes: usize) -> KnowledgeGraph {
        k_hop_subgraph(
            self,
            seeds,
            HopBounds {
                hops: k,
                max_nodes,
            },
        )
    }

    /// Enumerate at most `max_paths` simple paths of at most `max_length` edges.
    pub fn find_paths(
        &self,
        source: &str,
        target: &str,
        max_length: usize,
        max_paths: usize,
    ) -> Vec<Vec<Triple>> {
        find_paths(
            self,
            source,
            target,
            PathBounds {
                max_length,
                max_paths,
            },
        )
    }
}
