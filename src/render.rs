//! Draw pipeline
//!
//! [`Renderer::render`] lays out a [`ServiceGraph`], draws one element per node
//! and per edge, and hands each set to the registered [`DrawHook`]s before the
//! elements are assembled into the diagram. The interaction index is built
//! from the drawn elements at the same time.

use tracing::debug;

use crate::graph::{ServiceEdge, ServiceGraph};
use crate::interaction::{ClassNames, HoverController, InteractionIndex};
use crate::layout::{self, LayoutConfig};
use crate::svg::{Element, SvgDocument};

/// Default id of the `<svg>` element the diagram is drawn into
pub const DEFAULT_TARGET_ID: &str = "dependency-graph";

const ARROWHEAD_ID: &str = "arrowhead";

/// A drawn node element together with the service it represents
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnNode {
    pub name: String,
    pub element: Element,
}

/// A drawn edge element together with its endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnEdge {
    pub key: String,
    pub from: String,
    pub to: String,
    pub element: Element,
}

/// Post-processing step run after nodes or edges are drawn
pub trait DrawHook {
    fn on_nodes_drawn(&mut self, _graph: &ServiceGraph, _nodes: &mut [DrawnNode]) {}

    fn on_edges_drawn(&mut self, _graph: &ServiceGraph, _edges: &mut [DrawnEdge]) {}
}

/// Tags node elements with `data-node` and edge elements with `data-from`/`data-to`
#[derive(Debug, Clone, Copy, Default)]
pub struct DataAttributeHook;

impl DrawHook for DataAttributeHook {
    fn on_nodes_drawn(&mut self, _graph: &ServiceGraph, nodes: &mut [DrawnNode]) {
        for node in nodes {
            node.element.set_attr("data-node", &node.name);
        }
    }

    fn on_edges_drawn(&mut self, _graph: &ServiceGraph, edges: &mut [DrawnEdge]) {
        for edge in edges {
            edge.element.set_attr("data-from", &edge.from);
            edge.element.set_attr("data-to", &edge.to);
        }
    }
}

/// Adds a `<title>` tooltip: the service name on nodes, latency statistics on edges
#[derive(Debug, Clone, Copy, Default)]
pub struct TooltipHook;

impl DrawHook for TooltipHook {
    fn on_nodes_drawn(&mut self, _graph: &ServiceGraph, nodes: &mut [DrawnNode]) {
        for node in nodes {
            node.element.push(Element::new("title").text(node.name.clone()));
        }
    }

    fn on_edges_drawn(&mut self, graph: &ServiceGraph, edges: &mut [DrawnEdge]) {
        for drawn in edges {
            if let Some(edge) = graph.edge(&drawn.from, &drawn.to) {
                drawn.element.push(Element::new("title").text(edge_tooltip(edge)));
            }
        }
    }
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

/// Multi-line statistics summary of an edge
pub fn edge_tooltip(edge: &ServiceEdge) -> String {
    let a = &edge.annotations;
    format!(
        "{} -> {}\ncount: {}\nmean: {:.3}\nvariance: {:.3}\nstddev: {:.3}\nskewness: {}\nkurtosis: {}",
        edge.from,
        edge.to,
        a.count,
        a.mean,
        a.variance,
        a.stddev,
        fmt_optional(a.skewness),
        fmt_optional(a.kurtosis),
    )
}

/// A rendered diagram: the SVG tree plus its hover handlers
#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    pub document: SvgDocument,
    pub hover: HoverController,
    pub width: f64,
    pub height: f64,
}

impl Diagram {
    pub fn node_enter(&mut self, name: &str) {
        self.hover.node_enter(name, &mut self.document);
    }

    pub fn node_leave(&mut self, name: &str) {
        self.hover.node_leave(name, &mut self.document);
    }

    pub fn edge_enter(&mut self, from: &str, to: &str) {
        if let Some(element) = self.hover.index.edge_element(from, to) {
            self.hover.edge_enter(element, &mut self.document);
        }
    }

    pub fn edge_leave(&mut self, from: &str, to: &str) {
        if let Some(element) = self.hover.index.edge_element(from, to) {
            self.hover.edge_leave(element, &mut self.document);
        }
    }

    /// Rendered node element of a service
    pub fn node_element(&self, name: &str) -> Option<&Element> {
        self.document.element(self.hover.index.node_element(name)?)
    }

    /// Rendered edge element
    pub fn edge_element(&self, from: &str, to: &str) -> Option<&Element> {
        self.document.element(self.hover.index.edge_element(from, to)?)
    }

    pub fn container(&self) -> &Element {
        self.document.root()
    }

    pub fn to_svg_string(&self) -> String {
        self.document.to_svg_string()
    }
}

/// Lays out and draws service graphs
pub struct Renderer {
    layout: LayoutConfig,
    classes: ClassNames,
    target_id: String,
    hooks: Vec<Box<dyn DrawHook>>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(LayoutConfig::default(), ClassNames::default())
    }
}

impl Renderer {
    /// Renderer with the data-attribute and tooltip hooks installed
    pub fn new(layout: LayoutConfig, classes: ClassNames) -> Self {
        Self::bare(layout, classes)
            .with_hook(DataAttributeHook)
            .with_hook(TooltipHook)
    }

    /// Renderer without any hooks
    pub fn bare(layout: LayoutConfig, classes: ClassNames) -> Self {
        Self {
            layout,
            classes,
            target_id: DEFAULT_TARGET_ID.to_string(),
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: impl DrawHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn with_target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = id.into();
        self
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn render(&mut self, graph: &ServiceGraph) -> Diagram {
        let placed = layout::layout(graph, &self.layout);

        let mut nodes: Vec<DrawnNode> = graph
            .nodes
            .iter()
            .zip(&placed.nodes)
            .enumerate()
            .map(|(i, (node, slot))| {
                let element = Element::new("g")
                    .attr("id", format!("{}-node-{}", self.target_id, i))
                    .class("node")
                    .attr("transform", format!("translate({:.1},{:.1})", slot.x, slot.y))
                    .child(
                        Element::new("rect")
                            .attr("rx", 5)
                            .attr("ry", 5)
                            .attr("x", format!("{:.1}", -slot.width / 2.0))
                            .attr("y", format!("{:.1}", -slot.height / 2.0))
                            .attr("width", format!("{:.1}", slot.width))
                            .attr("height", format!("{:.1}", slot.height)),
                    )
                    .child(
                        Element::new("text")
                            .attr("text-anchor", "middle")
                            .attr("dominant-baseline", "central")
                            .text(node.label.clone()),
                    );
                DrawnNode {
                    name: node.name.clone(),
                    element,
                }
            })
            .collect();

        for hook in &mut self.hooks {
            hook.on_nodes_drawn(graph, &mut nodes);
        }

        let mut edges: Vec<DrawnEdge> = placed
            .edges
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let mut element = Element::new("g")
                    .attr("id", format!("{}-edge-{}", self.target_id, i))
                    .class("edgePath")
                    .child(
                        Element::new("path")
                            .attr("d", path.path_data())
                            .attr("marker-end", format!("url(#{})", self.marker_id())),
                    );
                if path.reversed {
                    element.add_class("reversed");
                }
                DrawnEdge {
                    key: path.key.clone(),
                    from: path.from.clone(),
                    to: path.to.clone(),
                    element,
                }
            })
            .collect();

        for hook in &mut self.hooks {
            hook.on_edges_drawn(graph, &mut edges);
        }

        let mut index = InteractionIndex::new(self.target_id.clone());
        for node in &nodes {
            if let Some(id) = node.element.id() {
                index.add_node(&node.name, id);
            }
        }
        for edge in &edges {
            if let Some(id) = edge.element.id() {
                index.add_edge(&edge.from, &edge.to, id);
            }
        }

        let mut edge_group = Element::new("g").class("edgePaths");
        for edge in edges {
            edge_group.push(edge.element);
        }
        let mut node_group = Element::new("g").class("nodes");
        for node in nodes {
            node_group.push(node.element);
        }

        let root = Element::new("svg")
            .attr("id", &self.target_id)
            .attr("xmlns", "http://www.w3.org/2000/svg")
            .attr("width", format!("{:.0}", placed.width))
            .attr("height", format!("{:.0}", placed.height))
            .attr(
                "viewBox",
                format!("0 0 {:.0} {:.0}", placed.width, placed.height),
            )
            .child(Element::new("defs").child(self.arrowhead()))
            .child(
                Element::new("g")
                    .class("output")
                    .child(edge_group)
                    .child(node_group),
            );

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            hooks = self.hooks.len(),
            "rendered diagram"
        );

        Diagram {
            document: SvgDocument::new(root),
            hover: HoverController::new(index, self.classes.clone()),
            width: placed.width,
            height: placed.height,
        }
    }

    fn marker_id(&self) -> String {
        format!("{}-{}", self.target_id, ARROWHEAD_ID)
    }

    fn arrowhead(&self) -> Element {
        Element::new("marker")
            .attr("id", self.marker_id())
            .attr("viewBox", "0 0 10 10")
            .attr("refX", 9)
            .attr("refY", 5)
            .attr("markerUnits", "strokeWidth")
            .attr("markerWidth", 8)
            .attr("markerHeight", 6)
            .attr("orient", "auto")
            .child(Element::new("path").attr("d", "M 0 0 L 10 5 L 0 10 z"))
    }
}
