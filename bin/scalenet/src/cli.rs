use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scalenet_deploy::{DEFAULT_ACCOUNT_WIDTH, DEFAULT_BASE_PORT};
use tracing::level_filters::LevelFilter;

/// How results are printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    /// A human readable table.
    #[default]
    Table,
    /// One JSON document.
    Json,
    /// Nothing besides logs.
    Quiet,
}

#[derive(Parser)]
#[command(name = "scalenet")]
#[command(
    author,
    version,
    about = "Plan multi-host deployments of scale testbed nodes"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "SCALENET_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Assign hosts, ports and roles, render startup commands and stage the payload.
    Plan(PlanArgs),

    /// Generate topology files.
    #[command(subcommand)]
    Topology(TopologyCommand),

    /// Print a manifest written by a previous run.
    Manifest {
        /// Path to the manifest file.
        #[arg(default_value = "nodes.txt")]
        path: PathBuf,

        /// Output format.
        #[arg(long, env = "SCALENET_FORMAT", default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum TopologyCommand {
    /// A complete graph over node_1..node_N with both directions of every edge.
    Complete {
        /// Number of nodes.
        nodes: u32,

        /// Write the topology to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Path to an existing Scalenet.toml (or the directory holding it) to plan from.
    ///
    /// Values in the file can be overridden with `SCALENET_CONF_<FIELD>` environment
    /// variables, e.g. `SCALENET_CONF_START_TIME`.
    #[arg(long, alias = "conf", env = "SCALENET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Instances file, one `internal,external` host per line.
    #[arg(long, alias = "instances", env = "SCALENET_HOSTS", required_unless_present = "config")]
    pub hosts: Option<PathBuf>,

    /// Topology JSON file.
    #[arg(long, alias = "topo", env = "SCALENET_TOPOLOGY", required_unless_present = "config")]
    pub topology: Option<PathBuf>,

    /// Contract JSON file with `contract_address` and `rpc_url`.
    #[arg(long, env = "SCALENET_CONTRACT", required_unless_present = "config")]
    pub contract: Option<PathBuf>,

    /// Number of nodes holding a scale tier. Nodes with a larger ordinal become side nodes.
    #[arg(long, alias = "num-scale", env = "SCALENET_SCALE", required_unless_present = "config")]
    pub scale: Option<u32>,

    /// Slot duration in seconds.
    #[arg(long, env = "SCALENET_SLOT_TIME", required_unless_present = "config")]
    pub slot_time: Option<f64>,

    /// Start time handed verbatim to every node.
    #[arg(long, env = "SCALENET_START_TIME", required_unless_present = "config")]
    pub start_time: Option<String>,

    /// Number of account slots nodes rotate through.
    #[arg(long, env = "SCALENET_ACCOUNT_WIDTH", default_value_t = DEFAULT_ACCOUNT_WIDTH)]
    pub account_width: u32,

    /// First port allocated on every host.
    #[arg(long, env = "SCALENET_BASE_PORT", default_value_t = DEFAULT_BASE_PORT)]
    pub base_port: u16,

    /// Directory holding the `account<N>` files.
    #[arg(long, env = "SCALENET_ACCOUNTS_DIR", default_value = "accounts")]
    pub accounts_dir: PathBuf,

    /// Directory holding the `node<ordinal>` keyfiles.
    #[arg(long, env = "SCALENET_KEYFILE_DIR", default_value = "keyfile")]
    pub keyfile_dir: PathBuf,

    /// The output directory for the payload and the manifest.
    ///
    /// If not provided, the current directory is used.
    #[arg(short, long, env = "SCALENET_OUT")]
    pub out: Option<PathBuf>,

    /// Bundle each host's payload into payload/<host>.tar.gz.
    #[arg(long, env = "SCALENET_ARCHIVE")]
    pub archive: bool,

    /// Plan and print the result without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Output format of the plan summary.
    #[arg(long, env = "SCALENET_FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}
