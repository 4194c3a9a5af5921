use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    ContractConfig, CredentialSource, DEFAULT_ACCOUNT_WIDTH, DEFAULT_BASE_PORT, DeploymentParams,
    MANIFEST_FILENAME, PayloadWriter, Plan, PlanFingerprint, PlanVersion, RemoteLayout, Topology,
    WrittenPayload, load_hosts, plan,
};

/// The default name for the scalenet configuration file.
pub const SCALENET_CONF_FILENAME: &str = "Scalenet.toml";

/// Everything needed to reproduce a planning run.
///
/// Serialised to/from TOML so a run can be repeated with `--config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Instances file: one `internal,external` host per line.
    pub hosts_file: PathBuf,
    /// Topology JSON file.
    pub topology_file: PathBuf,
    /// Contract JSON file (`contract_address`, `rpc_url`).
    pub contract_file: PathBuf,
    /// Output directory for the payload, manifest and this configuration.
    pub out_dir: PathBuf,

    /// Number of nodes eligible for a scale tier.
    pub scale_bound: u32,
    /// Slot duration in seconds.
    pub slot_time: f64,
    /// Start time passed verbatim to every node.
    pub start_time: String,
    #[serde(default = "default_account_width")]
    pub account_width: u32,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// Bundle each host's payload into a tarball, committed with the payload.
    #[serde(default)]
    pub archive: bool,

    /// Credential source directories.
    #[serde(default)]
    pub credentials: CredentialSource,
    #[serde(default)]
    pub layout: RemoteLayout,
}

fn default_account_width() -> u32 {
    DEFAULT_ACCOUNT_WIDTH
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

/// Outcome of [`PlannerConfig::run`].
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    /// `None` for dry runs.
    pub written: Option<WrittenPayload>,
    /// Version of the previous run in the same output directory, if any.
    pub previous: Option<PlanVersion>,
    pub archives: Vec<PathBuf>,
}

impl PlanOutcome {
    /// Whether the previous run in the output directory produced the same plan.
    pub fn unchanged(&self) -> bool {
        let hash = PlanFingerprint::compute_hash(&self.plan);
        self.previous.as_ref().is_some_and(|v| v.plan_hash == hash)
    }
}

impl PlannerConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize planner config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Scalenet.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_path = Self::resolve_path(path)?;
        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Resolve a `--config` argument to the configuration file it designates.
    pub fn resolve_path(path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }
        Ok(if path.is_dir() {
            path.join(SCALENET_CONF_FILENAME)
        } else {
            path.to_path_buf()
        })
    }

    /// Save the configuration to the default location (`Scalenet.toml` in the output directory).
    pub fn save_config(&self) -> Result<PathBuf> {
        let config_path = self.out_dir.join(SCALENET_CONF_FILENAME);
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Deployment parameters for this configuration, with the contract loaded from disk.
    pub fn params(&self) -> Result<DeploymentParams> {
        let contract = ContractConfig::load_from_file(&self.contract_file)?;
        Ok(DeploymentParams {
            slot_time: self.slot_time,
            contract,
            start_time: self.start_time.clone(),
            account_width: self.account_width,
            base_port: self.base_port,
            layout: self.layout.clone(),
        })
    }

    /// Load the inputs and compute the plan without touching the output directory.
    pub fn plan(&self) -> Result<Plan> {
        let hosts = load_hosts(&self.hosts_file)?;
        let topology = Topology::load_from_file(&self.topology_file)?;
        let params = self.params()?;

        tracing::info!(
            hosts = hosts.len(),
            nodes = topology.nodes.len(),
            scale_bound = self.scale_bound,
            slot_time = self.slot_time,
            "Planning deployment..."
        );

        Ok(plan(&hosts, &topology, self.scale_bound, &params)?)
    }

    /// Plan the deployment and, unless `dry_run`, write every artifact to the output directory.
    pub async fn run(&self, dry_run: bool) -> Result<PlanOutcome> {
        let plan = self.plan()?;

        if dry_run {
            tracing::info!("Dry run, nothing written");
            return Ok(PlanOutcome {
                plan,
                written: None,
                previous: None,
                archives: Vec::new(),
            });
        }

        let writer =
            PayloadWriter::new(&self.out_dir, self.credentials.clone()).with_archives(self.archive);
        let previous = PlanVersion::load_from_file(&writer.version_path()).ok();
        if previous.is_none() && self.out_dir.join(MANIFEST_FILENAME).exists() {
            tracing::warn!(out_dir = %self.out_dir.display(), "Found a manifest without plan version, overwriting");
        }

        let written = writer
            .write(&plan)
            .await
            .context("Failed to write deployment payload")?;

        let archives = written.archives.clone();

        Ok(PlanOutcome {
            plan,
            written: Some(written),
            previous,
            archives,
        })
    }
}
