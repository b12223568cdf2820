//! Service graph assembly
//!
//! Turns the links of one data event into a directed graph of services.
//! Every participant becomes a node (parents first, then children, in first-seen
//! order); every link between two different services becomes an edge annotated
//! with its latency statistics. Self-calls never become edges.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::moments::{MomentAnnotations, Moments, MomentsError};

/// One observed parent -> child call relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub parent: String,
    pub child: String,
    #[serde(rename = "durationMoments", default)]
    pub duration_moments: Moments,
}

impl Link {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, moments: Moments) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            duration_moments: moments,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.parent == self.child
    }

    pub fn key(&self) -> String {
        edge_key(&self.parent, &self.child)
    }
}

/// Payload of one data-arrival event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinksEvent {
    #[serde(default)]
    pub links: Vec<Link>,
}

impl LinksEvent {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }
}

/// Display key of the edge between two services.
///
/// Not unique when service names contain `->`; edges are identified by their
/// `(from, to)` pair.
pub fn edge_key(from: &str, to: &str) -> String {
    format!("{}->{}", from, to)
}

/// Distinct participant names, parents before children, in first-occurrence order
pub fn unique_names(links: &[Link]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let parents = links.iter().map(|l| l.parent.as_str());
    let children = links.iter().map(|l| l.child.as_str());

    parents
        .chain(children)
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// What to do when the same parent -> child pair appears more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateEdgePolicy {
    /// Merge the moments of all occurrences into one edge
    #[default]
    Aggregate,
    /// The last occurrence replaces earlier ones
    Overwrite,
    /// Keep the first occurrence and skip the rest
    Reject,
}

impl fmt::Display for DuplicateEdgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DuplicateEdgePolicy::Aggregate => "aggregate",
            DuplicateEdgePolicy::Overwrite => "overwrite",
            DuplicateEdgePolicy::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// Why a link did not become an edge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("invalid duration moments: {0}")]
    InvalidMoments(#[from] MomentsError),

    #[error("duplicate edge rejected")]
    DuplicateEdge,
}

/// A link left out of the graph, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLink {
    pub key: String,
    pub reason: SkipReason,
}

/// A service in the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceNode {
    pub name: String,
    pub label: String,
}

/// A call relationship between two services
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEdge {
    pub key: String,
    pub from: String,
    pub to: String,
    #[serde(skip)]
    pub moments: Moments,
    pub annotations: MomentAnnotations,
}

/// Directed service graph built from one data event
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceGraph {
    pub nodes: Vec<ServiceNode>,
    pub edges: Vec<ServiceEdge>,
    #[serde(skip)]
    pub skipped: Vec<SkippedLink>,
    #[serde(skip)]
    node_index: HashMap<String, usize>,
    #[serde(skip)]
    edge_index: HashMap<(String, String), usize>,
}

impl ServiceGraph {
    /// Build the graph for one set of links.
    ///
    /// All participants are registered as nodes before any edge is added, so a
    /// link skipped for bad moments still leaves its services on the diagram.
    pub fn build(links: &[Link], policy: DuplicateEdgePolicy) -> Self {
        let mut graph = Self::default();

        for name in unique_names(links) {
            graph.add_node(name);
        }

        for link in links.iter().filter(|l| !l.is_self_loop()) {
            graph.add_link(link, policy);
        }

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            skipped = graph.skipped.len(),
            "built service graph"
        );

        graph
    }

    fn add_node(&mut self, name: String) {
        if self.node_index.contains_key(&name) {
            return;
        }
        self.node_index.insert(name.clone(), self.nodes.len());
        self.nodes.push(ServiceNode {
            label: name.clone(),
            name,
        });
    }

    fn add_link(&mut self, link: &Link, policy: DuplicateEdgePolicy) {
        let key = link.key();
        let pair = (link.parent.clone(), link.child.clone());

        let annotations = match MomentAnnotations::summarize(&link.duration_moments) {
            Ok(annotations) => annotations,
            Err(e) => {
                warn!(edge = %key, error = %e, "skipping link with invalid moments");
                self.skipped.push(SkippedLink {
                    key,
                    reason: e.into(),
                });
                return;
            }
        };

        let existing = match self.edge_index.get(&pair).copied() {
            Some(existing) => existing,
            None => {
                self.edge_index.insert(pair, self.edges.len());
                self.edges.push(ServiceEdge {
                    key,
                    from: link.parent.clone(),
                    to: link.child.clone(),
                    moments: link.duration_moments,
                    annotations,
                });
                return;
            }
        };

        let edge = &mut self.edges[existing];
        match policy {
            DuplicateEdgePolicy::Aggregate => {
                let merged = edge.moments.merge(&link.duration_moments);
                match MomentAnnotations::summarize(&merged) {
                    Ok(merged_annotations) => {
                        debug!(edge = %key, count = merged.m0, "aggregated duplicate edge");
                        edge.moments = merged;
                        edge.annotations = merged_annotations;
                    }
                    Err(e) => {
                        warn!(edge = %key, error = %e, "merged moments invalid, keeping earlier edge");
                        self.skipped.push(SkippedLink {
                            key,
                            reason: e.into(),
                        });
                    }
                }
            }
            DuplicateEdgePolicy::Overwrite => {
                debug!(edge = %key, "overwriting duplicate edge");
                edge.moments = link.duration_moments;
                edge.annotations = annotations;
            }
            DuplicateEdgePolicy::Reject => {
                warn!(edge = %key, "rejecting duplicate edge");
                self.skipped.push(SkippedLink {
                    key,
                    reason: SkipReason::DuplicateEdge,
                });
            }
        }
    }

    pub fn node(&self, name: &str) -> Option<&ServiceNode> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    /// The edge from `from` to `to`
    pub fn edge(&self, from: &str, to: &str) -> Option<&ServiceEdge> {
        self.edge_index
            .get(&(from.to_string(), to.to_string()))
            .map(|&i| &self.edges[i])
    }

    /// Position of a node in [`ServiceGraph::nodes`]
    pub fn node_position(&self, name: &str) -> Option<usize> {
        self.node_index.get(name).copied()
    }

    /// Edges that start or end at `name`
    pub fn incident_edges<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ServiceEdge> {
        self.edges
            .iter()
            .filter(move |e| e.from == name || e.to == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments() -> Moments {
        Moments::new(10.0, 5.0, 20.0, 0.0, 40.0)
    }

    fn link(parent: &str, child: &str) -> Link {
        Link::new(parent, child, moments())
    }

    #[test]
    fn test_unique_names_first_occurrence_order() {
        let links = [link("A", "B"), link("A", "C"), link("B", "C")];
        assert_eq!(unique_names(&links), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_unique_names_parents_before_children() {
        let links = [link("web", "db"), link("api", "web")];
        assert_eq!(unique_names(&links), vec!["web", "api", "db"]);
    }

    #[test]
    fn test_unique_names_empty() {
        assert!(unique_names(&[]).is_empty());
    }

    #[test]
    fn test_self_loop_is_node_without_edge() {
        let graph = ServiceGraph::build(&[link("A", "A")], DuplicateEdgePolicy::default());

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.nodes[0].name, "A");
        assert_eq!(graph.nodes[0].label, "A");
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.skipped.is_empty());
    }

    #[test]
    fn test_edge_annotations() {
        let graph = ServiceGraph::build(&[link("A", "B")], DuplicateEdgePolicy::default());
        let edge = graph.edge("A", "B").unwrap();

        assert_eq!(edge.from, "A");
        assert_eq!(edge.to, "B");
        assert_eq!(edge.annotations.count, 10.0);
        assert_eq!(edge.annotations.mean, 5.0);
        assert_eq!(edge.annotations.variance, 2.0);
        assert!((edge.annotations.stddev - 1.414).abs() < 1e-3);
        assert_eq!(edge.annotations.skewness, Some(0.0));
        assert_eq!(edge.annotations.kurtosis, Some(-2.0));
    }

    #[test]
    fn test_edges_follow_input_order() {
        let links = [link("A", "B"), link("C", "C"), link("B", "C"), link("A", "C")];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::default());

        let keys: Vec<&str> = graph.edges.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["A->B", "B->C", "A->C"]);
    }

    #[test]
    fn test_invalid_moments_skip_edge_keep_nodes() {
        let links = [
            Link::new("A", "B", Moments::new(0.0, 0.0, 0.0, 0.0, 0.0)),
            link("B", "C"),
        ];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::default());

        assert_eq!(graph.node_count(), 3);
        assert!(graph.edge("A", "B").is_none());
        assert!(graph.edge("B", "C").is_some());
        assert_eq!(graph.skipped.len(), 1);
        assert_eq!(graph.skipped[0].key, "A->B");
        assert!(matches!(
            graph.skipped[0].reason,
            SkipReason::InvalidMoments(MomentsError::NonPositiveCount(_))
        ));
    }

    #[test]
    fn test_duplicate_aggregate_merges_moments() {
        let first = Moments::from_samples(&[1.0, 2.0, 3.0]);
        let second = Moments::from_samples(&[10.0, 11.0]);
        let links = [
            Link::new("A", "B", first),
            link("B", "C"),
            Link::new("A", "B", second),
        ];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::Aggregate);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges[0].key, "A->B");
        let edge = graph.edge("A", "B").unwrap();
        assert_eq!(edge.annotations.count, 5.0);
        assert!((edge.annotations.mean - 27.0 / 5.0).abs() < 1e-9);
        assert!(graph.skipped.is_empty());
    }

    #[test]
    fn test_duplicate_overwrite_last_wins() {
        let links = [
            Link::new("A", "B", Moments::new(1.0, 1.0, 0.0, 0.0, 0.0)),
            link("B", "C"),
            Link::new("A", "B", Moments::new(4.0, 9.0, 8.0, 0.0, 16.0)),
        ];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::Overwrite);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges[0].key, "A->B");
        let edge = graph.edge("A", "B").unwrap();
        assert_eq!(edge.annotations.count, 4.0);
        assert_eq!(edge.annotations.mean, 9.0);
        assert!(graph.skipped.is_empty());
    }

    #[test]
    fn test_duplicate_reject_keeps_first() {
        let links = [
            Link::new("A", "B", Moments::new(1.0, 1.0, 0.0, 0.0, 0.0)),
            Link::new("A", "B", Moments::new(4.0, 9.0, 8.0, 0.0, 16.0)),
        ];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::Reject);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge("A", "B").unwrap().annotations.mean, 1.0);
        assert_eq!(
            graph.skipped,
            vec![SkippedLink {
                key: "A->B".to_string(),
                reason: SkipReason::DuplicateEdge,
            }]
        );
    }

    #[test]
    fn test_reverse_direction_is_distinct_edge() {
        let graph = ServiceGraph::build(
            &[link("A", "B"), link("B", "A")],
            DuplicateEdgePolicy::Reject,
        );
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.skipped.is_empty());
    }

    #[test]
    fn test_arrow_in_service_names_keeps_edges_apart() {
        let links = [
            Link::new("a->b", "c", Moments::of(10.0)),
            Link::new("a", "b->c", Moments::of(100.0)),
        ];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::Aggregate);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edge("a->b", "c").unwrap().annotations.mean, 10.0);
        assert_eq!(graph.edge("a", "b->c").unwrap().annotations.mean, 100.0);
        assert_eq!(graph.incident_edges("a").count(), 1);
        assert!(graph.skipped.is_empty());
    }

    #[test]
    fn test_incident_edges() {
        let links = [link("A", "B"), link("B", "C"), link("C", "D")];
        let graph = ServiceGraph::build(&links, DuplicateEdgePolicy::default());

        let keys: Vec<&str> = graph.incident_edges("B").map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["A->B", "B->C"]);
        assert_eq!(graph.incident_edges("Z").count(), 0);
    }

    #[test]
    fn test_deserialize_event() {
        let json = r#"{"links":[
            {"parent":"web","child":"auth","durationMoments":{"m0":3,"m1":1.5,"m2":2,"m3":0,"m4":4}},
            {"parent":"web","child":"db"}
        ]}"#;
        let event: LinksEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.links.len(), 2);
        assert_eq!(event.links[0].duration_moments.m0, 3.0);
        assert_eq!(event.links[1].duration_moments, Moments::default());

        let graph = ServiceGraph::build(&event.links, DuplicateEdgePolicy::default());
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
    }
}
