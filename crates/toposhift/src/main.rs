//! Toposhift - Diff infrastructure topologies and plan the migration between them.

mod io;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use io::OutputFormat;
use std::path::{Path, PathBuf};
use toposhift_engine::{
    apply_answers, compute_diff, generate_plan, render_runbook, unanswered_required,
};
use toposhift_topology::Topology;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "toposhift")]
#[command(
    author,
    version,
    about = "Compare two infrastructure topologies and generate a migration plan"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a source topology against a target and list required decisions
    Diff {
        /// Source topology file (.json, .yaml)
        #[arg(long)]
        source: PathBuf,

        /// Target topology file (.json, .yaml)
        #[arg(long)]
        target: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Generate a phased migration plan
    Plan {
        /// Source topology file (.json, .yaml)
        #[arg(long)]
        source: PathBuf,

        /// Target topology file (.json, .yaml)
        #[arg(long)]
        target: PathBuf,

        /// Decision answers, a map of decision id to option key or value
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Fail if any required decision is unanswered
        #[arg(long)]
        strict: bool,
    },

    /// Check a topology file for schema and wiring errors
    Validate {
        /// Topology file (.json, .yaml)
        #[arg(long)]
        topology: PathBuf,
    },
}

fn load(path: &Path, role: &str) -> anyhow::Result<Topology> {
    io::load_topology(path)
        .with_context(|| format!("Failed to load {} topology {:?}", role, path))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Diff {
            source,
            target,
            format,
            out,
        } => {
            let source = load(&source, "source")?;
            let target = load(&target, "target")?;

            let diff = compute_diff(&source, &target);
            let content = io::to_document(&diff, format)?;
            io::write_output(&content, out.as_deref())?;

            info!(
                "{} decisions, {} required",
                diff.decisions.len(),
                diff.decisions.iter().filter(|d| d.required).count()
            );
        }

        Commands::Plan {
            source,
            target,
            answers,
            format,
            out,
            strict,
        } => {
            let source = load(&source, "source")?;
            let target = load(&target, "target")?;

            let diff = compute_diff(&source, &target);
            let mut decisions = diff.decisions.clone();

            if let Some(path) = answers {
                let answers = io::load_answers(&path)
                    .with_context(|| format!("Failed to load answers {:?}", path))?;
                for id in apply_answers(&mut decisions, &answers) {
                    warn!("Ignoring answer for unknown decision: {}", id);
                }
            }

            let pending: Vec<String> = unanswered_required(&decisions)
                .iter()
                .map(|d| d.id.clone())
                .collect();
            if !pending.is_empty() {
                if strict {
                    bail!(
                        "{} required decisions unanswered: {}",
                        pending.len(),
                        pending.join(", ")
                    );
                }
                warn!(
                    "Unanswered required decisions, their steps are omitted: {}",
                    pending.join(", ")
                );
            }

            let plan = generate_plan(&source, &target, diff, decisions);
            let content = match format {
                OutputFormat::Markdown => render_runbook(&plan, &target),
                other => io::to_document(&plan, other)?,
            };
            io::write_output(&content, out.as_deref())?;

            info!("Plan {} complete: {} steps", plan.id, plan.step_count());
        }

        Commands::Validate { topology } => {
            let topology = load(&topology, "input")?;
            info!(
                "Topology {} is valid: {} hosts, {} images, {} wires",
                topology.name,
                topology.hosts().len(),
                topology.image_count(),
                topology.wires.len()
            );
        }
    }

    Ok(())
}
