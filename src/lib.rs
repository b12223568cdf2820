//! # service-depgraph - Service Dependency Graph Renderer
//!
//! Draws the call graph between services as an interactive SVG diagram.
//! Each input link is one parent -> child call relationship carrying the
//! moments of its latency distribution.
//!
//! ## Overview
//!
//! 1. **Summarize** - moments become count, mean, variance, stddev, skewness, kurtosis
//! 2. **Assemble** - services become nodes, calls become edges; self-calls are dropped
//! 3. **Lay out** - ranked left to right, 30 units between nodes, 200 between ranks
//! 4. **Draw** - SVG elements tagged with `data-node` / `data-from` / `data-to`
//! 5. **Interact** - hovering a node highlights its calls, hovering a call its services
//!
//! ## Usage
//!
//! ```bash
//! # Render links to an HTML page
//! service-depgraph render links.json -o deps.html
//!
//! # Print per-call latency statistics
//! service-depgraph stats links.json
//! ```
//!
//! ## Library
//!
//! ```
//! use service_depgraph::{DependencyGraphView, DuplicateEdgePolicy, LinksEvent, Renderer};
//!
//! let event: LinksEvent = serde_json::from_str(
//!     r#"{"links":[{"parent":"web","child":"db","durationMoments":{"m0":10,"m1":5,"m2":20,"m3":0,"m4":40}}]}"#,
//! ).unwrap();
//!
//! let mut view = DependencyGraphView::new(Renderer::default(), DuplicateEdgePolicy::Aggregate);
//! let diagram = view.on_data(&event);
//! diagram.node_enter("web");
//!
//! assert!(diagram.container().has_class("dark"));
//! ```

pub mod config;
pub mod graph;
pub mod interaction;
pub mod layout;
pub mod moments;
pub mod page;
pub mod render;
pub mod report;
pub mod source;
pub mod svg;
pub mod view;

pub use config::{ConfigError, DepgraphConfig, GraphConfig, PageConfig, load_config, load_config_file};
pub use graph::{
    DuplicateEdgePolicy, Link, LinksEvent, ServiceEdge, ServiceGraph, ServiceNode, SkipReason,
    SkippedLink, edge_key, unique_names,
};
pub use interaction::{ClassNames, ClassTarget, HoverController, InteractionIndex};
pub use layout::{Layout, LayoutConfig, RankDir, layout};
pub use moments::{MomentAnnotations, Moments, MomentsError};
pub use page::{PageError, PageWriter};
pub use render::{DataAttributeHook, Diagram, DrawHook, DrawnEdge, DrawnNode, Renderer, TooltipHook};
pub use report::{generate_stats, generate_stats_json};
pub use source::{ChannelSource, EventSource, FileSource, SourceError};
pub use view::DependencyGraphView;
