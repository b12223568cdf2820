//! Layered layout for the service graph
//!
//! A compact Sugiyama-style pass:
//!
//! 1. **Acyclic** - reverse the back edges found by a depth-first search
//! 2. **Ranking** - longest path from the sources over the acyclic graph
//! 3. **Ordering** - barycenter sweeps to reduce crossings between adjacent ranks
//! 4. **Positioning** - ranks spaced by `rank_sep`, nodes within a rank by `node_sep`
//!
//! Ranks run along the configured [`RankDir`]; left-to-right by default.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, depth_first_search};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::{ServiceEdge, ServiceGraph};

/// Approximate advance of one label character, in layout units
const CHAR_WIDTH: f64 = 7.5;
/// Horizontal padding inside a node box on each side
const NODE_PADDING: f64 = 10.0;
const NODE_HEIGHT: f64 = 30.0;
/// Blank border around the whole diagram
const MARGIN: f64 = 20.0;
const ORDERING_SWEEPS: usize = 4;

/// Axis along which ranks are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum RankDir {
    /// Sources on the left, sinks on the right
    #[default]
    #[serde(rename = "LR")]
    #[value(name = "LR")]
    LeftRight,
    /// Sources on top, sinks at the bottom
    #[serde(rename = "TB")]
    #[value(name = "TB")]
    TopBottom,
}

/// Spacing and orientation of the layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between neighbouring nodes of the same rank
    #[serde(default = "default_node_sep")]
    pub node_sep: f64,

    /// Gap between neighbouring ranks
    #[serde(default = "default_rank_sep")]
    pub rank_sep: f64,

    #[serde(default)]
    pub rank_dir: RankDir,
}

fn default_node_sep() -> f64 {
    30.0
}

fn default_rank_sep() -> f64 {
    200.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_sep: default_node_sep(),
            rank_sep: default_rank_sep(),
            rank_dir: RankDir::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Placed node; `x`/`y` is the center of the box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeBox {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rank: usize,
    /// Position within the rank
    pub order: usize,
}

/// Routed edge: start, two Bézier control points, end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgePath {
    pub key: String,
    pub from: String,
    pub to: String,
    pub points: [Point; 4],
    /// The edge was reversed to break a cycle and points against the rank direction
    pub reversed: bool,
}

impl EdgePath {
    /// SVG path data for the curve
    pub fn path_data(&self) -> String {
        let [s, c1, c2, e] = self.points;
        format!(
            "M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
            s.x, s.y, c1.x, c1.y, c2.x, c2.y, e.x, e.y
        )
    }
}

/// Result of a layout pass, indexed like the graph's nodes; edges follow the
/// graph's edge order, minus any whose endpoints are not nodes of the graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub nodes: Vec<NodeBox>,
    pub edges: Vec<EdgePath>,
    pub width: f64,
    pub height: f64,
}

/// Size of a node box for a label
pub fn node_size(label: &str) -> (f64, f64) {
    let chars = label.chars().count().max(1) as f64;
    (chars * CHAR_WIDTH + 2.0 * NODE_PADDING, NODE_HEIGHT)
}

/// Lay out a service graph
pub fn layout(graph: &ServiceGraph, config: &LayoutConfig) -> Layout {
    if graph.is_empty() {
        return Layout::default();
    }

    let endpoints = edge_endpoints(graph);
    let (dag, reversed) = acyclic(graph.node_count(), &endpoints);
    let ranks = assign_ranks(&dag);
    let layers = order_layers(&dag, &ranks);

    let placed = Placement::new(graph, config, &layers);
    let nodes: Vec<NodeBox> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| placed.node_box(i, &node.name, &layers, &ranks))
        .collect();

    let edges = endpoints
        .iter()
        .map(|&(i, from, to)| {
            let edge = &graph.edges[i];
            let (from, to) = (&nodes[from], &nodes[to]);
            EdgePath {
                key: edge.key.clone(),
                from: edge.from.clone(),
                to: edge.to.clone(),
                points: placed.route(from, to),
                reversed: reversed.contains(&i),
            }
        })
        .collect();

    let (width, height) = placed.extent();
    debug!(
        ranks = layers.len(),
        reversed = reversed.len(),
        width,
        height,
        "laid out service graph"
    );

    Layout {
        nodes,
        edges,
        width,
        height,
    }
}

/// `(edge position, from node position, to node position)` for every edge
/// whose endpoints are both nodes of the graph
fn edge_endpoints(graph: &ServiceGraph) -> Vec<(usize, usize, usize)> {
    graph
        .edges
        .iter()
        .enumerate()
        .filter_map(|(i, edge)| match node_positions(graph, edge) {
            Some((from, to)) => Some((i, from, to)),
            None => {
                warn!(edge = %edge.key, "edge endpoint is not a node, not laid out");
                None
            }
        })
        .collect()
}

fn node_positions(graph: &ServiceGraph, edge: &ServiceEdge) -> Option<(usize, usize)> {
    Some((graph.node_position(&edge.from)?, graph.node_position(&edge.to)?))
}

/// Build an acyclic copy of the graph; returns it with the positions of the
/// edges that were reversed.
///
/// Node weights are node positions in the service graph.
fn acyclic(
    node_count: usize,
    endpoints: &[(usize, usize, usize)],
) -> (DiGraph<usize, ()>, HashSet<usize>) {
    let mut full: DiGraph<usize, usize> = DiGraph::new();
    let indices: Vec<NodeIndex> = (0..node_count).map(|i| full.add_node(i)).collect();

    for &(i, from, to) in endpoints {
        full.add_edge(indices[from], indices[to], i);
    }

    let mut back_edges: HashSet<(usize, usize)> = HashSet::new();
    depth_first_search(&full, indices.iter().copied(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back_edges.insert((u.index(), v.index()));
        }
        Control::<()>::Continue
    });

    let mut dag: DiGraph<usize, ()> = DiGraph::new();
    for i in 0..node_count {
        dag.add_node(i);
    }

    let mut reversed = HashSet::new();
    for &(i, from, to) in endpoints {
        if back_edges.contains(&(from, to)) {
            reversed.insert(i);
            dag.update_edge(NodeIndex::new(to), NodeIndex::new(from), ());
        } else {
            dag.update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        }
    }

    (dag, reversed)
}

/// Longest-path ranking: every edge spans at least one rank
fn assign_ranks(dag: &DiGraph<usize, ()>) -> Vec<usize> {
    let order = toposort(dag, None).unwrap_or_else(|_| dag.node_indices().collect());

    let mut ranks = vec![0usize; dag.node_count()];
    for node in order {
        let rank = dag
            .neighbors_directed(node, Direction::Incoming)
            .map(|pred| ranks[pred.index()] + 1)
            .max()
            .unwrap_or(0);
        ranks[node.index()] = rank;
    }
    ranks
}

/// Group nodes by rank and order each rank by the barycenter of its neighbours
/// in the adjacent rank.
fn order_layers(dag: &DiGraph<usize, ()>, ranks: &[usize]) -> Vec<Vec<usize>> {
    let rank_count = ranks.iter().max().map_or(0, |r| r + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (node, &rank) in ranks.iter().enumerate() {
        layers[rank].push(node);
    }

    let mut position = vec![0usize; ranks.len()];
    for layer in &layers {
        for (i, &node) in layer.iter().enumerate() {
            position[node] = i;
        }
    }

    for sweep in 0..ORDERING_SWEEPS {
        let downward = sweep % 2 == 0;
        let direction = if downward {
            Direction::Incoming
        } else {
            Direction::Outgoing
        };
        let adjacent = |rank: usize, other: usize| {
            if downward {
                other + 1 == rank
            } else {
                other == rank + 1
            }
        };

        let rank_order: Vec<usize> = if downward {
            (1..rank_count).collect()
        } else {
            (0..rank_count.saturating_sub(1)).rev().collect()
        };

        for rank in rank_order {
            let mut keyed: Vec<(f64, usize)> = layers[rank]
                .iter()
                .map(|&node| {
                    let neighbours: Vec<usize> = dag
                        .neighbors_directed(NodeIndex::new(node), direction)
                        .map(|n| n.index())
                        .filter(|&n| adjacent(rank, ranks[n]))
                        .collect();
                    let barycenter = if neighbours.is_empty() {
                        position[node] as f64
                    } else {
                        neighbours.iter().map(|&n| position[n] as f64).sum::<f64>()
                            / neighbours.len() as f64
                    };
                    (barycenter, node)
                })
                .collect();

            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            layers[rank] = keyed.into_iter().map(|(_, node)| node).collect();
            for (i, &node) in layers[rank].iter().enumerate() {
                position[node] = i;
            }
        }
    }

    layers
}

/// Coordinates along the rank axis and the cross axis
struct Placement {
    rank_dir: RankDir,
    node_sep: f64,
    /// Start of each rank along the rank axis
    rank_start: Vec<f64>,
    /// Size of each rank along the rank axis
    rank_size: Vec<f64>,
    /// Start of each layer along the cross axis (layers are centered)
    layer_start: Vec<f64>,
    sizes: Vec<(f64, f64)>,
    total_rank: f64,
    total_cross: f64,
}

impl Placement {
    fn new(graph: &ServiceGraph, config: &LayoutConfig, layers: &[Vec<usize>]) -> Self {
        let sizes: Vec<(f64, f64)> = graph.nodes.iter().map(|n| node_size(&n.label)).collect();
        let along = |size: (f64, f64)| match config.rank_dir {
            RankDir::LeftRight => size.0,
            RankDir::TopBottom => size.1,
        };
        let across = |size: (f64, f64)| match config.rank_dir {
            RankDir::LeftRight => size.1,
            RankDir::TopBottom => size.0,
        };

        let rank_size: Vec<f64> = layers
            .iter()
            .map(|layer| layer.iter().map(|&n| along(sizes[n])).fold(0.0, f64::max))
            .collect();

        let mut rank_start = Vec::with_capacity(layers.len());
        let mut cursor = MARGIN;
        for size in &rank_size {
            rank_start.push(cursor);
            cursor += size + config.rank_sep;
        }
        let total_rank = cursor - config.rank_sep + MARGIN;

        let layer_len: Vec<f64> = layers
            .iter()
            .map(|layer| {
                let sum: f64 = layer.iter().map(|&n| across(sizes[n])).sum();
                sum + config.node_sep * layer.len().saturating_sub(1) as f64
            })
            .collect();
        let widest = layer_len.iter().copied().fold(0.0, f64::max);
        let layer_start = layer_len
            .iter()
            .map(|len| MARGIN + (widest - len) / 2.0)
            .collect();

        Self {
            rank_dir: config.rank_dir,
            node_sep: config.node_sep,
            rank_start,
            rank_size,
            layer_start,
            sizes,
            total_rank,
            total_cross: widest + 2.0 * MARGIN,
        }
    }

    fn across(&self, node: usize) -> f64 {
        let (w, h) = self.sizes[node];
        match self.rank_dir {
            RankDir::LeftRight => h,
            RankDir::TopBottom => w,
        }
    }

    fn point(&self, along: f64, across: f64) -> Point {
        match self.rank_dir {
            RankDir::LeftRight => Point {
                x: along,
                y: across,
            },
            RankDir::TopBottom => Point {
                x: across,
                y: along,
            },
        }
    }

    fn node_box(&self, node: usize, name: &str, layers: &[Vec<usize>], ranks: &[usize]) -> NodeBox {
        let rank = ranks[node];
        let layer = &layers[rank];
        // order_layers puts every node in the layer of its rank
        let order = layer.iter().position(|&n| n == node).unwrap_or_default();

        let mut cross = self.layer_start[rank];
        for &before in &layer[..order] {
            cross += self.across(before) + self.node_sep;
        }
        cross += self.across(node) / 2.0;

        let along = self.rank_start[rank] + self.rank_size[rank] / 2.0;
        let center = self.point(along, cross);
        let (width, height) = self.sizes[node];

        NodeBox {
            name: name.to_string(),
            x: center.x,
            y: center.y,
            width,
            height,
            rank,
            order,
        }
    }

    /// Route from the side of `from` facing `to` into the side of `to` facing `from`
    fn route(&self, from: &NodeBox, to: &NodeBox) -> [Point; 4] {
        let (from_along, from_across, from_half) = self.axes(from);
        let (to_along, to_across, to_half) = self.axes(to);

        let forward = from_along <= to_along;
        let (start, end) = if forward {
            (from_along + from_half, to_along - to_half)
        } else {
            (from_along - from_half, to_along + to_half)
        };
        let mid = (start + end) / 2.0;

        [
            self.point(start, from_across),
            self.point(mid, from_across),
            self.point(mid, to_across),
            self.point(end, to_across),
        ]
    }

    /// Center along the rank axis, center across it, half size along it
    fn axes(&self, node: &NodeBox) -> (f64, f64, f64) {
        match self.rank_dir {
            RankDir::LeftRight => (node.x, node.y, node.width / 2.0),
            RankDir::TopBottom => (node.y, node.x, node.height / 2.0),
        }
    }

    fn extent(&self) -> (f64, f64) {
        match self.rank_dir {
            RankDir::LeftRight => (self.total_rank, self.total_cross),
            RankDir::TopBottom => (self.total_cross, self.total_rank),
        }
    }
}
