//! service-depgraph CLI - Service Dependency Graph Renderer
//!
//! Reads link events (JSON) and renders the service dependency graph of the
//! last event as an interactive HTML page or standalone SVG, or prints its
//! per-call latency statistics.
//!
//! Usage:
//!   service-depgraph render [OPTIONS] [INPUT]
//!   service-depgraph stats [OPTIONS] [INPUT]

use std::fs;
use std::io::{BufWriter, Write, stdin, stdout};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use service_depgraph::{
    DependencyGraphView, DepgraphConfig, DuplicateEdgePolicy, FileSource, PageWriter, RankDir,
    Renderer, ServiceGraph, generate_stats, generate_stats_json, load_config, load_config_file,
};

/// service-depgraph - Draw the call graph between services
#[derive(Parser, Debug)]
#[command(name = "service-depgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the dependency graph of the last event to HTML or SVG
    Render(RenderArgs),
    /// Print latency statistics for every call of the last event
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Events file: one event, a JSON array of events, or JSON lines ("-" for stdin)
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Config file path (default: search for .depgraph.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How to treat repeated parent -> child links
    #[arg(long, value_enum)]
    duplicates: Option<DuplicateEdgePolicy>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a standalone SVG instead of an HTML page
    #[arg(long)]
    svg: bool,

    /// Open the written file in a browser
    #[arg(long, requires = "output")]
    open: bool,

    /// Gap between nodes of the same rank
    #[arg(long)]
    node_sep: Option<f64>,

    /// Gap between ranks
    #[arg(long)]
    rank_sep: Option<f64>,

    /// Rank direction
    #[arg(long, value_enum)]
    rank_dir: Option<RankDir>,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => render(args),
        Commands::Stats(args) => stats(args),
    }
}

/// Config from `--config`, else searched from the input location, CLI flags applied on top
fn resolve_config(input: &InputArgs) -> Result<DepgraphConfig, Box<dyn std::error::Error>> {
    let mut config = match &input.config {
        Some(path) => load_config_file(path)?,
        None if is_stdin(&input.input) => load_config(Path::new("."))?,
        None => load_config(&input.input)?,
    };

    if let Some(policy) = input.duplicates {
        config.graph.duplicate_edges = policy;
    }

    Ok(config)
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Feed every event of the input through a view; the view keeps the last one
fn load_view(
    input: &InputArgs,
    renderer: Renderer,
    policy: DuplicateEdgePolicy,
) -> Result<DependencyGraphView, Box<dyn std::error::Error>> {
    let mut source = if is_stdin(&input.input) {
        FileSource::from_reader(stdin().lock(), "stdin")?
    } else {
        FileSource::open(&input.input)?
    };

    let mut view = DependencyGraphView::new(renderer, policy);
    let handled = view.drain(&mut source);
    if handled == 0 {
        return Err(format!("no events found in {}", input.input.display()).into());
    }

    if input.verbose {
        eprintln!("Rendered {} event(s), showing the last one", handled);
    }

    Ok(view)
}

fn report_skipped(graph: &ServiceGraph) {
    if !graph.skipped.is_empty() {
        eprintln!(
            "Warning: {} link(s) left out of the graph (see log for details)",
            graph.skipped.len()
        );
    }
}

fn render(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.input.verbose);

    let mut config = resolve_config(&args.input)?;
    if let Some(node_sep) = args.node_sep {
        config.layout.node_sep = node_sep;
    }
    if let Some(rank_sep) = args.rank_sep {
        config.layout.rank_sep = rank_sep;
    }
    if let Some(rank_dir) = args.rank_dir {
        config.layout.rank_dir = rank_dir;
    }
    config.validate()?;

    let renderer = Renderer::new(config.layout, config.classes.clone())
        .with_target_id(config.page.target_id.clone());
    let view = load_view(&args.input, renderer, config.graph.duplicate_edges)?;

    let (Some(graph), Some(diagram)) = (view.graph(), view.diagram()) else {
        return Err("no diagram rendered".into());
    };
    report_skipped(graph);

    let content = if args.svg {
        diagram.to_svg_string()
    } else {
        PageWriter::new(&config.page).render(diagram)?
    };

    match &args.output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!(
                "Diagram written to: {} ({} services, {} calls)",
                path.display(),
                graph.node_count(),
                graph.edge_count()
            );

            if args.open {
                if let Err(e) = open::that(path) {
                    eprintln!("Warning: Could not open browser: {}", e);
                    eprintln!("Please open {} manually", path.display());
                }
            }
        }
        None => {
            let mut out = stdout().lock();
            out.write_all(content.as_bytes())?;
            out.flush()?;
        }
    }

    Ok(())
}

fn stats(args: StatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.input.verbose);

    let config = resolve_config(&args.input)?;
    let view = load_view(&args.input, Renderer::default(), config.graph.duplicate_edges)?;
    let graph = view.graph().ok_or("no graph built")?;

    let mut writer = BufWriter::new(stdout().lock());
    if args.json {
        generate_stats_json(graph, &mut writer)?;
    } else {
        generate_stats(graph, &mut writer)?;
    }
    writer.flush()?;

    Ok(())
}
