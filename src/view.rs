//! Event-driven dependency graph view
//!
//! The view sits idle until it is given a [`LinksEvent`]. Each event builds a
//! fresh [`ServiceGraph`], renders it, and replaces whatever diagram the view
//! held before, so nothing from an earlier event survives a re-render.

use tracing::{debug, info};

use crate::graph::{DuplicateEdgePolicy, LinksEvent, ServiceGraph};
use crate::render::{Diagram, Renderer};
use crate::source::EventSource;

/// Holds the graph and diagram of the most recent event
pub struct DependencyGraphView {
    renderer: Renderer,
    policy: DuplicateEdgePolicy,
    current: Option<(ServiceGraph, Diagram)>,
    renders: usize,
}

impl DependencyGraphView {
    pub fn new(renderer: Renderer, policy: DuplicateEdgePolicy) -> Self {
        Self {
            renderer,
            policy,
            current: None,
            renders: 0,
        }
    }

    /// Handle one data event, replacing the previous diagram
    pub fn on_data(&mut self, event: &LinksEvent) -> &mut Diagram {
        let graph = ServiceGraph::build(&event.links, self.policy);
        let diagram = self.renderer.render(&graph);
        self.renders += 1;

        debug!(
            render = self.renders,
            links = event.links.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "replaced diagram"
        );

        let (_, diagram) = self.current.insert((graph, diagram));
        diagram
    }

    /// Handle every event the source currently has; returns how many were handled
    pub fn drain(&mut self, source: &mut dyn EventSource) -> usize {
        let mut handled = 0;
        while let Some(event) = source.poll() {
            self.on_data(&event);
            handled += 1;
        }
        if handled > 0 {
            info!(events = handled, source = source.description(), "rendered events");
        }
        handled
    }

    pub fn graph(&self) -> Option<&ServiceGraph> {
        self.current.as_ref().map(|(graph, _)| graph)
    }

    pub fn diagram(&self) -> Option<&Diagram> {
        self.current.as_ref().map(|(_, diagram)| diagram)
    }

    pub fn diagram_mut(&mut self) -> Option<&mut Diagram> {
        self.current.as_mut().map(|(_, diagram)| diagram)
    }

    /// Number of events rendered so far
    pub fn renders(&self) -> usize {
        self.renders
    }
}
