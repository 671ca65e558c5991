//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Quay - resolve aspect-emitted build metadata into a project graph
#[derive(Parser)]
#[command(name = "quay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve aspect output files into a project graph
    Resolve(ResolveArgs),

    /// Print the transitive dependencies of a target
    Deps(DepsArgs),
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Aspect output files (JSON, one target record or an array each)
    #[arg(required = true)]
    pub aspect_outputs: Vec<PathBuf>,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace_root: PathBuf,

    /// Execution root for generated and external files
    #[arg(long)]
    pub execution_root: Option<PathBuf>,

    /// Root targets to sync; defaults to every target in the input
    #[arg(long = "target")]
    pub targets: Vec<String>,

    /// Transitive import depth (negative means unbounded)
    #[arg(long, default_value_t = -1)]
    pub import_depth: i32,

    /// Keep the full transitive compile-time jar set for these kinds
    #[arg(long = "transitive-jars-kind")]
    pub transitive_jars_kinds: Vec<String>,

    /// Write the resolved project to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DepsArgs {
    /// Aspect output files (JSON)
    #[arg(required = true)]
    pub aspect_outputs: Vec<PathBuf>,

    /// Target to query
    #[arg(long)]
    pub target: String,
}
