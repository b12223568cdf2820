//! Edge statistics reports
//!
//! Text and JSON listings of a service graph's edges with their latency
//! statistics, plus the links that were left out of the graph.

use std::io::{self, Write};

use serde::Serialize;

use crate::graph::{ServiceEdge, ServiceGraph};
use crate::moments::MomentAnnotations;

/// Skipped link entry for JSON output
#[derive(Serialize)]
struct SkippedEntry<'a> {
    key: &'a str,
    reason: String,
}

/// Full JSON report
#[derive(Serialize)]
struct StatsReport<'a> {
    nodes: Vec<&'a str>,
    edges: Vec<EdgeEntry<'a>>,
    skipped: Vec<SkippedEntry<'a>>,
}

#[derive(Serialize)]
struct EdgeEntry<'a> {
    key: &'a str,
    from: &'a str,
    to: &'a str,
    #[serde(flatten)]
    stats: &'a MomentAnnotations,
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Edges sorted by descending mean latency
fn slowest_first(graph: &ServiceGraph) -> Vec<&ServiceEdge> {
    let mut edges: Vec<&ServiceEdge> = graph.edges.iter().collect();
    edges.sort_by(|a, b| b.annotations.mean.total_cmp(&a.annotations.mean));
    edges
}

/// Write a text table of edge statistics
pub fn generate_stats<W: Write>(graph: &ServiceGraph, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "Service Dependencies")?;
    writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(
        writer,
        "Services: {} | Calls: {} | Skipped: {}",
        graph.node_count(),
        graph.edge_count(),
        graph.skipped.len()
    )?;
    writeln!(writer)?;

    if graph.edges.is_empty() {
        writeln!(writer, "No calls between services.")?;
    } else {
        let width = graph
            .edges
            .iter()
            .map(|e| e.key.chars().count())
            .max()
            .unwrap_or(0)
            .max("Call".len());

        writeln!(
            writer,
            "{:<width$}  {:>10}  {:>12}  {:>12}  {:>10}  {:>10}",
            "Call",
            "Count",
            "Mean",
            "Stddev",
            "Skewness",
            "Kurtosis",
            width = width
        )?;
        writeln!(writer, "{}", "─".repeat(width + 64))?;

        for edge in slowest_first(graph) {
            let a = &edge.annotations;
            writeln!(
                writer,
                "{:<width$}  {:>10}  {:>12.3}  {:>12.3}  {:>10}  {:>10}",
                edge.key,
                a.count,
                a.mean,
                a.stddev,
                fmt_optional(a.skewness),
                fmt_optional(a.kurtosis),
                width = width
            )?;
        }
    }

    if !graph.skipped.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Skipped links:")?;
        for skipped in &graph.skipped {
            writeln!(writer, "  - {}: {}", skipped.key, skipped.reason)?;
        }
    }

    Ok(())
}

/// Write the edge statistics as pretty-printed JSON
pub fn generate_stats_json<W: Write>(graph: &ServiceGraph, writer: &mut W) -> io::Result<()> {
    let report = StatsReport {
        nodes: graph.nodes.iter().map(|n| n.name.as_str()).collect(),
        edges: graph
            .edges
            .iter()
            .map(|e| EdgeEntry {
                key: &e.key,
                from: &e.from,
                to: &e.to,
                stats: &e.annotations,
            })
            .collect(),
        skipped: graph
            .skipped
            .iter()
            .map(|s| SkippedEntry {
                key: &s.key,
                reason: s.reason.to_string(),
            })
            .collect(),
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)
}
