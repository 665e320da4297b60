//! datamap CLI
//!
//! Builds and grows a similarity graph of tabular datasets:
//! - `build`: link every resource of a data directory (batch)
//! - `insert`: add one dataset to the latest snapshot (incremental)
//! - `render` / `convert` / `stats`: inspect and export snapshots

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use datamap_graph::build_graph;
use datamap_ingest::{scan_resources, AttributeKind};
use datamap_storage::{
    insert_dataset, load_graph, save_graph, InsertRequest, SnapshotFormat, SnapshotStore,
};

mod config;
mod viz;

use config::DatamapConfig;
use viz::{HtmlRenderer, VizFormat};

#[derive(Parser)]
#[command(name = "datamap")]
#[command(
    author,
    version,
    about = "datamap: link tabular datasets that share variables or HXL tags"
)]
struct Cli {
    /// JSON configuration file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct StoreArgs {
    /// Snapshot and asset directory.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Base name of the graph snapshots.
    #[arg(long)]
    name: Option<String>,
    /// Format of written snapshots (json|gexf).
    #[arg(long)]
    format: Option<SnapshotFormat>,
}

impl StoreArgs {
    fn apply(&self, config: &mut DatamapConfig) {
        if let Some(dir) = &self.store {
            config.store_dir = dir.clone();
        }
        if let Some(name) = &self.name {
            config.graph_name = name.clone();
        }
        if let Some(format) = self.format {
            config.snapshot_format = format;
        }
    }
}

#[derive(Args, Debug, Default)]
struct WeightArgs {
    /// Tag weight table (CSV or spreadsheet with a `Weight` column).
    #[arg(long)]
    tag_weights: Option<PathBuf>,
    /// Variable weight table.
    #[arg(long)]
    variable_weights: Option<PathBuf>,
    /// Give every edge weight 1.0 instead of judged weights.
    #[arg(long)]
    unweighted: bool,
}

impl WeightArgs {
    fn apply(&self, config: &mut DatamapConfig) {
        if let Some(path) = &self.tag_weights {
            config.tag_weights = Some(path.clone());
        }
        if let Some(path) = &self.variable_weights {
            config.variable_weights = Some(path.clone());
        }
        if self.unweighted {
            config.include_weights = false;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph from every resource in a data directory.
    Build {
        /// Resource directory.
        #[arg(long)]
        data: Option<PathBuf>,
        /// Maximum number of resources.
        #[arg(long)]
        max: Option<usize>,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        weights: WeightArgs,
    },

    /// Insert one dataset into the latest snapshot, writing a new one.
    ///
    /// Without FILE nothing is inserted and the latest snapshot is reported.
    Insert {
        file: Option<PathBuf>,
        /// Insert into this snapshot instead of the latest one.
        #[arg(long)]
        from: Option<PathBuf>,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        weights: WeightArgs,
    },

    /// Render a snapshot as HTML, DOT or JSON.
    Render {
        snapshot: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// html|dot|json (default: from the output extension, else html).
        #[arg(long)]
        format: Option<String>,
    },

    /// Summarize a snapshot (default: the latest one).
    Stats {
        snapshot: Option<PathBuf>,
        /// How many attributes and links to list.
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Convert a snapshot between JSON and GEXF (by output extension).
    Convert {
        snapshot: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let mut config = DatamapConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            data,
            max,
            store,
            weights,
        } => {
            if let Some(dir) = data {
                config.data_dir = dir;
            }
            if let Some(max) = max {
                config.max_datasets = max;
            }
            store.apply(&mut config);
            weights.apply(&mut config);
            cmd_build(&config)
        }
        Commands::Insert {
            file,
            from,
            store,
            weights,
        } => {
            store.apply(&mut config);
            weights.apply(&mut config);
            cmd_insert(&config, file.as_deref(), from.as_deref())
        }
        Commands::Render {
            snapshot,
            out,
            format,
        } => cmd_render(&snapshot, &out, format.as_deref()),
        Commands::Stats {
            snapshot,
            top,
            store,
        } => {
            store.apply(&mut config);
            cmd_stats(&config, snapshot.as_deref(), top)
        }
        Commands::Convert { snapshot, out } => cmd_convert(&snapshot, &out),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_build(config: &DatamapConfig) -> Result<()> {
    println!(
        "{} {}",
        "Building".green().bold(),
        config.data_dir.display()
    );
    let resources = scan_resources(&config.data_dir, &config.scan_options())
        .with_context(|| format!("failed to list resources in {}", config.data_dir.display()))?;
    let weighting = config.weighting()?;
    let outcome = build_graph(&resources, &weighting)?;

    let store = SnapshotStore::new(config.store());
    let snapshot = store.write_base(&outcome.graph)?;
    let asset = store.render(&outcome.graph, &snapshot, &HtmlRenderer)?;

    println!(
        "  {} datasets, {} links, {} skipped",
        outcome.graph.node_count(),
        outcome.graph.edge_count(),
        outcome.skipped.len()
    );
    for skipped in &outcome.skipped {
        println!("  {} {}: {}", "skipped".yellow(), skipped.title, skipped.error);
    }
    println!("  {} {}", "→".cyan(), snapshot.display());
    println!("  {} {}", "→".cyan(), asset.display());
    Ok(())
}

fn cmd_insert(config: &DatamapConfig, file: Option<&Path>, from: Option<&Path>) -> Result<()> {
    let store = SnapshotStore::new(config.store());
    let weighting = config.weighting()?;

    let bytes = file
        .map(|path| fs::read(path).with_context(|| format!("failed to read {}", path.display())))
        .transpose()?;
    let file_name = file
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let request = InsertRequest {
        file_name: &file_name,
        bytes: bytes.as_deref(),
        received_at: Utc::now(),
    };

    let report = insert_dataset(&store, from, &request, &weighting, &HtmlRenderer)?;

    if report.node_id.is_none() {
        println!(
            "{} latest snapshot {}",
            "Nothing to insert;".yellow(),
            report.snapshot.display()
        );
        return Ok(());
    }

    let s = &report.summary;
    println!(
        "{} {} linked to {} dataset(s)",
        "Inserted".green().bold(),
        file_name,
        s.connected_datasets
    );
    for title in &report.connected {
        println!("  {} {}", "~".cyan(), title);
    }
    println!(
        "  tags: {} dataset(s), {} shared, {:.2} on average",
        s.datasets_sharing_tags,
        s.tags_shared,
        s.average_tags_shared()
    );
    println!(
        "  variables: {} dataset(s), {} shared, {:.2} on average",
        s.datasets_sharing_variables,
        s.variables_shared,
        s.average_variables_shared()
    );
    println!("  total link weight: {:.2}", s.total_edge_weight);
    println!("  {} {}", "→".cyan(), report.snapshot.display());
    if let Some(asset) = &report.asset {
        println!("  {} {}", "→".cyan(), asset.display());
    }
    Ok(())
}

fn cmd_render(snapshot: &Path, out: &Path, format: Option<&str>) -> Result<()> {
    let format = match format {
        Some(name) => VizFormat::parse(name)?,
        None => VizFormat::from_path(out).unwrap_or(VizFormat::Html),
    };
    let graph = load_graph(snapshot)?;
    let text = viz::render(&graph, format)?;
    fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
    println!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}

fn cmd_stats(config: &DatamapConfig, snapshot: Option<&Path>, top: usize) -> Result<()> {
    let (path, graph) = match snapshot {
        Some(path) => (path.to_path_buf(), load_graph(path)?),
        None => SnapshotStore::new(config.store()).load_latest()?,
    };

    println!("{} {}", "Snapshot".green().bold(), path.display());
    let isolated = graph
        .nodes()
        .filter(|n| graph.incident_edges(n.id).next().is_none())
        .count();
    println!(
        "  {} datasets ({} isolated), {} links, total weight {:.2}",
        graph.node_count(),
        isolated,
        graph.edge_count(),
        graph.total_weight()
    );

    for (kind, heading) in [
        (AttributeKind::Tag, "Most common tags"),
        (AttributeKind::Variable, "Most common variables"),
    ] {
        let freq = graph.attribute_frequencies(kind);
        if freq.is_empty() {
            continue;
        }
        println!("{}", heading.bold());
        for (attr, count) in freq.into_iter().take(top) {
            println!("  {count:>5}  {attr}");
        }
    }

    let mut edges: Vec<_> = graph.edges().collect();
    edges.sort_by(|a, b| b.weight.total_cmp(&a.weight).then(a.key().cmp(&b.key())));
    if !edges.is_empty() {
        println!("{}", "Strongest links".bold());
    }
    for e in edges.into_iter().take(top) {
        let title = |id| graph.node(id).map_or("?", |n| n.title.as_str());
        println!(
            "  {:>6.2}  {} {} {}  [{}]",
            e.weight,
            title(e.source),
            "↔".cyan(),
            title(e.target),
            e.label
        );
    }
    Ok(())
}

fn cmd_convert(snapshot: &Path, out: &Path) -> Result<()> {
    let graph = load_graph(snapshot)?;
    save_graph(&graph, out)?;
    println!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}
