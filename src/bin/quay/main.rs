//! Quay CLI - diagnostic front-end over the resolution engine
//!
//! Loads already-emitted aspect output from disk and prints the resolved
//! project; it never invokes a build tool itself.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quay::core::target_info::{PathsResolver, TargetInfo};
use quay::core::workspace::{RepoMapping, WorkspaceContext};
use quay::resolver::{self, DependencyGraph, ResolveCaches};
use quay::{CancellationToken, Label};

mod cli;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("quay=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quay=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Resolve(args) => resolve(args),
        Commands::Deps(args) => deps(args),
    }
}

/// Read aspect output files; each file holds one target record or an
/// array of them.
fn load_targets(files: &[PathBuf]) -> Result<Vec<TargetInfo>> {
    let mut targets = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read aspect output {}", file.display()))?;
        if content.trim_start().starts_with('[') {
            let batch: Vec<TargetInfo> = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse aspect output {}", file.display()))?;
            targets.extend(batch);
        } else {
            let single: TargetInfo = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse aspect output {}", file.display()))?;
            targets.push(single);
        }
    }
    Ok(targets)
}

fn parse_labels(raw: &[String]) -> Result<HashSet<Label>> {
    raw.iter()
        .map(|t| Label::parse(t).with_context(|| format!("invalid target label `{t}`")))
        .collect()
}

fn resolve(args: cli::ResolveArgs) -> Result<()> {
    let targets = load_targets(&args.aspect_outputs)?;

    let roots: HashSet<Label> = if args.targets.is_empty() {
        targets.iter().map(|t| t.id).collect()
    } else {
        parse_labels(&args.targets)?
    };

    let mut ctx = WorkspaceContext {
        import_depth: args.import_depth,
        ..WorkspaceContext::default()
    };
    if !args.transitive_jars_kinds.is_empty() {
        ctx.experimental_add_transitive_compile_time_jars = true;
        ctx.transitive_compile_time_jars_target_kinds
            .extend(args.transitive_jars_kinds.iter().cloned());
    }

    let execution_root = args
        .execution_root
        .unwrap_or_else(|| args.workspace_root.clone());
    let paths = PathsResolver::new(&args.workspace_root, &execution_root);

    let project = resolver::resolve_project(
        targets,
        &roots,
        &ctx,
        &RepoMapping::default(),
        &paths,
        "unknown",
        &ResolveCaches::new(),
        &CancellationToken::new(),
    )?;

    let json = serde_json::to_string_pretty(&project)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn deps(args: cli::DepsArgs) -> Result<()> {
    let raw = load_targets(&args.aspect_outputs)?;
    let target = Label::parse(&args.target).context("invalid target label")?;

    let targets = resolver::ingest_targets(raw, &RepoMapping::default());
    let graph = DependencyGraph::new(&targets);
    anyhow::ensure!(graph.contains(&target), "unknown target `{target}`");

    let mut closure: Vec<Label> = graph.transitive_dependencies(&target).iter().copied().collect();
    closure.sort();
    for label in closure {
        println!("{label}");
    }
    Ok(())
}
