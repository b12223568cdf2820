//! Hover interaction for rendered diagrams
//!
//! The [`InteractionIndex`] is filled during the draw pass: for every service it
//! records the rendered node element and the elements of its incident edges, and
//! for every edge the elements of its two endpoints. Hover handlers read the
//! index instead of searching the rendered tree.
//!
//! Handlers only add or remove classes, so entering twice or leaving an element
//! that was never entered is harmless.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anything whose elements carry a class list
pub trait ClassTarget {
    fn add_class(&mut self, element_id: &str, class: &str);
    fn remove_class(&mut self, element_id: &str, class: &str);
}

/// CSS classes toggled by hover handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNames {
    /// Set on the diagram container while anything is hovered
    #[serde(default = "default_dimmed")]
    pub dimmed: String,

    /// Set on highlighted node elements
    #[serde(default = "default_node_highlight")]
    pub node_highlight: String,

    /// Set on highlighted edge elements
    #[serde(default = "default_edge_highlight")]
    pub edge_highlight: String,
}

fn default_dimmed() -> String {
    "dark".to_string()
}

fn default_node_highlight() -> String {
    "hover".to_string()
}

fn default_edge_highlight() -> String {
    "hover-edge".to_string()
}

impl Default for ClassNames {
    fn default() -> Self {
        Self {
            dimmed: default_dimmed(),
            node_highlight: default_node_highlight(),
            edge_highlight: default_edge_highlight(),
        }
    }
}

/// Rendered elements belonging to one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub element: String,
    /// Elements of edges starting or ending at this service
    pub edges: Vec<String>,
}

/// Rendered elements belonging to one edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub element: String,
    pub from: String,
    pub to: String,
    pub from_element: String,
    pub to_element: String,
}

/// Name -> element lookup tables for one rendered diagram
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionIndex {
    /// Element that receives the dimmed class
    pub container: String,
    pub nodes: BTreeMap<String, NodeEntry>,
    /// Keyed by edge element id
    pub edges: BTreeMap<String, EdgeEntry>,
}

impl InteractionIndex {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    pub fn add_node(&mut self, name: &str, element: &str) {
        self.nodes
            .entry(name.to_string())
            .or_insert_with(|| NodeEntry {
                element: String::new(),
                edges: Vec::new(),
            })
            .element = element.to_string();
    }

    /// Register an edge; both endpoints must already be registered
    pub fn add_edge(&mut self, from: &str, to: &str, element: &str) {
        let (Some(from_element), Some(to_element)) = (
            self.node_element(from).map(str::to_string),
            self.node_element(to).map(str::to_string),
        ) else {
            debug!(from, to, "edge endpoints not drawn, not indexed");
            return;
        };

        for endpoint in [from, to] {
            if let Some(node) = self.nodes.get_mut(endpoint) {
                node.edges.push(element.to_string());
            }
        }

        self.edges.insert(
            element.to_string(),
            EdgeEntry {
                element: element.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                from_element,
                to_element,
            },
        );
    }

    pub fn node_element(&self, name: &str) -> Option<&str> {
        self.nodes.get(name).map(|n| n.element.as_str())
    }

    /// Elements of every edge incident to `name`
    pub fn incident_edge_elements(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.edges.as_slice())
            .unwrap_or_default()
    }

    /// Element of the edge from `from` to `to`
    pub fn edge_element(&self, from: &str, to: &str) -> Option<&str> {
        self.edges
            .values()
            .find(|e| e.from == from && e.to == to)
            .map(|e| e.element.as_str())
    }

    /// Node elements of an edge's two endpoints
    pub fn endpoint_elements(&self, element: &str) -> Option<(&str, &str)> {
        self.edges
            .get(element)
            .map(|e| (e.from_element.as_str(), e.to_element.as_str()))
    }
}

/// Hover handlers over an [`InteractionIndex`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoverController {
    pub index: InteractionIndex,
    pub classes: ClassNames,
}

impl HoverController {
    pub fn new(index: InteractionIndex, classes: ClassNames) -> Self {
        Self { index, classes }
    }

    /// Pointer entered a node: highlight it and its incident edges, dim the rest
    pub fn node_enter(&self, name: &str, target: &mut impl ClassTarget) {
        self.toggle_node(name, target, true);
    }

    pub fn node_leave(&self, name: &str, target: &mut impl ClassTarget) {
        self.toggle_node(name, target, false);
    }

    /// Pointer entered an edge: highlight it and both endpoints, dim the rest
    pub fn edge_enter(&self, element: &str, target: &mut impl ClassTarget) {
        self.toggle_edge(element, target, true);
    }

    pub fn edge_leave(&self, element: &str, target: &mut impl ClassTarget) {
        self.toggle_edge(element, target, false);
    }

    fn toggle_node(&self, name: &str, target: &mut impl ClassTarget, on: bool) {
        let Some(node) = self.index.nodes.get(name) else {
            debug!(node = name, "hover on unknown node ignored");
            return;
        };

        set_class(target, &node.element, &self.classes.node_highlight, on);
        for edge in &node.edges {
            set_class(target, edge, &self.classes.edge_highlight, on);
        }
        set_class(target, &self.index.container, &self.classes.dimmed, on);
    }

    fn toggle_edge(&self, element: &str, target: &mut impl ClassTarget, on: bool) {
        let Some(edge) = self.index.edges.get(element) else {
            debug!(edge = element, "hover on unknown edge ignored");
            return;
        };

        set_class(target, &edge.element, &self.classes.edge_highlight, on);
        set_class(target, &edge.from_element, &self.classes.node_highlight, on);
        set_class(target, &edge.to_element, &self.classes.node_highlight, on);
        set_class(target, &self.index.container, &self.classes.dimmed, on);
    }
}

fn set_class(target: &mut impl ClassTarget, element: &str, class: &str, on: bool) {
    if on {
        target.add_class(element, class);
    } else {
        target.remove_class(element, class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    /// Records class lists per element
    #[derive(Default)]
    struct Recorder {
        classes: BTreeMap<String, BTreeSet<String>>,
    }

    impl Recorder {
        fn has(&self, element: &str, class: &str) -> bool {
            self.classes
                .get(element)
                .is_some_and(|set| set.contains(class))
        }

        fn is_clean(&self) -> bool {
            self.classes.values().all(BTreeSet::is_empty)
        }
    }

    impl ClassTarget for Recorder {
        fn add_class(&mut self, element_id: &str, class: &str) {
            self.classes
                .entry(element_id.to_string())
                .or_default()
                .insert(class.to_string());
        }

        fn remove_class(&mut self, element_id: &str, class: &str) {
            if let Some(set) = self.classes.get_mut(element_id) {
                set.remove(class);
            }
        }
    }

    /// A -> B, B -> C, A -> C
    fn controller() -> HoverController {
        let mut index = InteractionIndex::new("svg");
        index.add_node("A", "n0");
        index.add_node("B", "n1");
        index.add_node("C", "n2");
        index.add_edge("A", "B", "e0");
        index.add_edge("B", "C", "e1");
        index.add_edge("A", "C", "e2");
        HoverController::new(index, ClassNames::default())
    }

    #[test]
    fn test_index_lookup() {
        let hover = controller();
        assert_eq!(hover.index.node_element("B"), Some("n1"));
        assert_eq!(hover.index.incident_edge_elements("B"), ["e0", "e1"]);
        assert_eq!(hover.index.endpoint_elements("e2"), Some(("n0", "n2")));
        assert_eq!(hover.index.edge_element("B", "C"), Some("e1"));
        assert!(hover.index.incident_edge_elements("Z").is_empty());
        assert!(hover.index.endpoint_elements("e9").is_none());
        assert!(hover.index.edge_element("C", "B").is_none());
    }

    #[test]
    fn test_edge_with_undrawn_endpoint_is_not_indexed() {
        let mut index = InteractionIndex::new("svg");
        index.add_node("A", "n0");
        index.add_edge("A", "B", "e0");

        assert!(index.edges.is_empty());
        assert!(index.incident_edge_elements("A").is_empty());
    }

    #[test]
    fn test_node_hover_highlights_incident_edges() {
        let hover = controller();
        let mut target = Recorder::default();

        hover.node_enter("B", &mut target);

        assert!(target.has("n1", "hover"));
        assert!(target.has("e0", "hover-edge"));
        assert!(target.has("e1", "hover-edge"));
        assert!(!target.has("e2", "hover-edge"));
        assert!(!target.has("n0", "hover"));
        assert!(!target.has("n2", "hover"));
        assert!(target.has("svg", "dark"));

        hover.node_leave("B", &mut target);
        assert!(target.is_clean());
    }

    #[test]
    fn test_edge_hover_highlights_endpoints() {
        let hover = controller();
        let mut target = Recorder::default();

        hover.edge_enter("e2", &mut target);

        assert!(target.has("e2", "hover-edge"));
        assert!(target.has("n0", "hover"));
        assert!(target.has("n2", "hover"));
        assert!(!target.has("n1", "hover"));
        assert!(!target.has("e0", "hover-edge"));
        assert!(target.has("svg", "dark"));

        hover.edge_leave("e2", &mut target);
        assert!(target.is_clean());
    }

    #[test]
    fn test_repeated_hover_cycles_leave_no_state() {
        let hover = controller();
        let mut target = Recorder::default();

        for _ in 0..5 {
            hover.node_enter("A", &mut target);
            hover.node_enter("A", &mut target);
            hover.node_leave("A", &mut target);
            hover.edge_enter("e1", &mut target);
            hover.edge_leave("e1", &mut target);
            hover.edge_leave("e1", &mut target);
        }

        assert!(target.is_clean());
    }

    #[test]
    fn test_unknown_targets_are_ignored() {
        let hover = controller();
        let mut target = Recorder::default();

        hover.node_enter("Z", &mut target);
        hover.edge_enter("e9", &mut target);
        assert!(target.classes.is_empty());
    }

    #[test]
    fn test_custom_class_names() {
        let classes = ClassNames {
            dimmed: "dimmed".to_string(),
            node_highlight: "highlighted".to_string(),
            edge_highlight: "highlighted".to_string(),
        };
        let hover = HoverController::new(controller().index, classes);
        let mut target = Recorder::default();

        hover.edge_enter("e0", &mut target);
        assert!(target.has("e0", "highlighted"));
        assert!(target.has("n1", "highlighted"));
        assert!(target.has("svg", "dimmed"));
    }

    #[test]
    fn test_index_serializes_for_the_browser() {
        let hover = controller();
        let json = serde_json::to_value(&hover).unwrap();

        assert_eq!(json["index"]["container"], "svg");
        assert_eq!(json["index"]["nodes"]["A"]["element"], "n0");
        assert_eq!(json["index"]["edges"]["e1"]["to_element"], "n2");
        assert_eq!(json["classes"]["edge_highlight"], "hover-edge");
    }
}
