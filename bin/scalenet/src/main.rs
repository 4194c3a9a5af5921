//! scalenet plans multi-host deployments of scale testbed nodes.

mod cli;
mod summary;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

use cli::{Cli, Command, OutputFormat, PlanArgs, TopologyCommand};
use scalenet_deploy::{Manifest, Plan, PlannerBuilder, PlannerConfig, Topology};

/// Prefix of the environment variables overriding values of a loaded Scalenet.toml.
const CONFIG_ENV_PREFIX: &str = "SCALENET_CONF_";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger. Stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Plan(args) => run_plan(args).await,
        Command::Topology(TopologyCommand::Complete { nodes, output }) => {
            generate_complete(nodes, output)
        }
        Command::Manifest { path, format } => print_manifest(&path, format),
    }
}

/// Load a saved configuration, letting `SCALENET_CONF_*` variables override its values.
fn load_config(path: &Path) -> Result<PlannerConfig> {
    let config_path = PlannerConfig::resolve_path(path)?;
    let config: PlannerConfig = Figment::new()
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed(CONFIG_ENV_PREFIX).split("__"))
        .extract()
        .context(format!("Failed to load config from {}", config_path.display()))?;

    tracing::info!(
        config_path = %config_path.display(),
        out_dir = %config.out_dir.display(),
        scale_bound = config.scale_bound,
        "Loaded planner configuration"
    );
    Ok(config)
}

fn build_config(args: &PlanArgs) -> Result<PlannerConfig> {
    let (Some(hosts), Some(topology), Some(contract)) = (&args.hosts, &args.topology, &args.contract)
    else {
        anyhow::bail!("--hosts, --topology and --contract are required without --config");
    };
    let (Some(scale), Some(slot_time), Some(start_time)) =
        (args.scale, args.slot_time, &args.start_time)
    else {
        anyhow::bail!("--scale, --slot-time and --start-time are required without --config");
    };

    let mut builder = PlannerBuilder::new(hosts, topology, contract)
        .scale_bound(scale)
        .slot_time(slot_time)
        .start_time(start_time)
        .account_width(args.account_width)
        .base_port(args.base_port)
        .credentials(&args.accounts_dir, &args.keyfile_dir)
        .archive(args.archive);

    if let Some(out) = &args.out {
        builder = builder.out_dir(out);
    }

    builder.build()
}

async fn run_plan(args: PlanArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => build_config(&args)?,
    };

    let outcome = config.run(args.dry_run).await?;

    if let Some(written) = &outcome.written {
        // Only persist the configuration once the run it describes has succeeded.
        if args.config.is_none() {
            config.save_config()?;
        }

        if outcome.unchanged() {
            tracing::info!(plan_hash = %written.version.plan_hash, "Plan unchanged since the previous run");
        } else if let Some(previous) = &outcome.previous {
            tracing::info!(
                previous = %previous.plan_hash,
                current = %written.version.plan_hash,
                "Plan changed since the previous run"
            );
        }

        tracing::info!(
            manifest = %written.manifest_path.display(),
            files = written.files.len(),
            archives = outcome.archives.len(),
            "✓ Deployment plan written"
        );
    }

    print_plan(&outcome.plan, args.format)
}

fn print_plan(plan: &Plan, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", summary::plan_table(plan)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary::plan_json(plan))?),
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn generate_complete(nodes: u32, output: Option<PathBuf>) -> Result<()> {
    let topology = Topology::complete(nodes);

    match topology.path_stats() {
        Some(stats) => tracing::info!(
            nodes,
            connections = topology.connections.len(),
            diameter = stats.diameter,
            avg_shortest_path = stats.average_shortest_path,
            "Generated complete topology"
        ),
        None => tracing::info!(nodes, "Generated complete topology"),
    }

    let json = serde_json::to_string_pretty(&topology).context("Failed to serialize topology")?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .context(format!("Failed to write topology to {}", path.display()))?;
            tracing::info!(path = %path.display(), "Topology saved");
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn print_manifest(path: &Path, format: OutputFormat) -> Result<()> {
    let manifest = Manifest::load_from_file(path)?;
    match format {
        OutputFormat::Table => println!("{}", summary::manifest_table(&manifest)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary::manifest_json(&manifest))?
        ),
        OutputFormat::Quiet => {}
    }
    Ok(())
}
