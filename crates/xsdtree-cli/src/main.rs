//! xsdtree CLI
//!
//! Thin driver over the workspace controller:
//! - `resolve`: fragment dictionary → final schema JSON (for code generation)
//! - `tree`: print the selection tree with node ids and chosen flags
//! - `inspect`: print one LEAF's candidate tables

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use xsdtree_fragments::NodeKind;
use xsdtree_graph::NodeId;
use xsdtree_session::{WorkspaceConfig, WorkspaceController};

#[derive(Parser)]
#[command(name = "xsdtree")]
#[command(author, version, about = "Resolve recognized XML-schema fragments into a final schema")]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WorkspaceArgs {
    /// Fragment dictionary (JSON)
    input: PathBuf,
    /// Workspace config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the attribute probability threshold
    #[arg(long)]
    threshold: Option<f64>,
    /// Manually select these node ids, in order, after the automatic pass
    #[arg(long = "select", value_name = "ID")]
    select: Vec<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the fragment dictionary and emit the final schema JSON.
    Resolve {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the selection tree.
    Tree {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Hide unchosen branches
        #[arg(long)]
        chosen_only: bool,
    },

    /// Show the candidate tables of one LEAF node.
    Inspect {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Node id (see `xsdtree tree`)
        node: u32,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_workspace(args: &WorkspaceArgs) -> Result<WorkspaceController> {
    let mut config = match &args.config {
        Some(path) => WorkspaceConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => WorkspaceConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.selection = config.selection.with_threshold(threshold);
        config.validate()?;
    }

    let mut workspace = WorkspaceController::from_path(&args.input, config)
        .with_context(|| format!("failed to load fragments from {}", args.input.display()))?;
    for &raw in &args.select {
        let outcome = workspace
            .select_subtree(NodeId::new(raw))
            .with_context(|| format!("cannot select node #{raw}"))?;
        tracing::info!(node = raw, changed = outcome.changed, "manual selection applied");
    }
    Ok(workspace)
}

fn cmd_resolve(args: &WorkspaceArgs, out: Option<&Path>) -> Result<()> {
    let workspace = open_workspace(args)?;
    let json = workspace.build_final_schema()?.to_json_pretty()?;
    match out {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "✓ Wrote".green(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_tree(args: &WorkspaceArgs, chosen_only: bool) -> Result<()> {
    let workspace = open_workspace(args)?;
    let model = workspace.model();

    let mut stack = vec![(model.root_id(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let node = model.node(id)?;
        let data = node.data();
        if chosen_only && !data.chosen {
            continue;
        }

        let marker = if data.chosen { "[x]".green() } else { "[ ]".dimmed() };
        let label = match data.kind {
            NodeKind::Leaf => format!("{} : {}", data.name.bold(), data.chosen_type),
            kind => kind.to_string().cyan().to_string(),
        };
        let mut line = format!(
            "{}{} {} {} p={:.2} [{}..{}]",
            "  ".repeat(depth),
            marker,
            id.to_string().dimmed(),
            label,
            data.probability,
            data.min_occurs,
            data.max_occurs
        );
        if !data.chosen_attributes.is_empty() {
            line.push_str(&format!(" @{}", data.chosen_attributes.join(" @")));
        }
        println!("{line}");

        stack.extend(node.children().iter().rev().map(|&child| (child, depth + 1)));
    }
    Ok(())
}

fn cmd_inspect(args: &WorkspaceArgs, node: u32) -> Result<()> {
    let mut workspace = open_workspace(args)?;
    let id = NodeId::new(node);
    if !workspace.inspect(id)? {
        anyhow::bail!("node {id} is not a LEAF; only LEAF nodes can be inspected");
    }
    let detail = workspace
        .inspection()
        .context("inspection cursor was not set")?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Resolve { workspace, out } => cmd_resolve(&workspace, out.as_deref()),
        Commands::Tree {
            workspace,
            chosen_only,
        } => cmd_tree(&workspace, chosen_only),
        Commands::Inspect { workspace, node } => cmd_inspect(&workspace, node),
    }
}
