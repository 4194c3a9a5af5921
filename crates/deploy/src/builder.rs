//! Builder module for creating a [`PlannerConfig`].
//!
//! This module provides the [`PlannerBuilder`] struct which fills in defaults for the optional
//! parameters and resolves the output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    CredentialSource, DEFAULT_ACCOUNT_WIDTH, DEFAULT_BASE_PORT, PlannerConfig, RemoteLayout,
};

/// Builder for creating a [`PlannerConfig`].
///
/// # Example
///
/// ```no_run
/// use scalenet_deploy::PlannerBuilder;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = PlannerBuilder::new("instances.txt", "topo.json", "contract.json")
///     .scale_bound(5)
///     .slot_time(2.0)
///     .start_time("1700000000")
///     .out_dir("deploy")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PlannerBuilder {
    hosts_file: PathBuf,
    topology_file: PathBuf,
    contract_file: PathBuf,
    credentials: CredentialSource,
    /// The output directory (defaults to the current directory).
    out_dir: Option<PathBuf>,
    scale_bound: u32,
    slot_time: f64,
    start_time: String,
    account_width: u32,
    base_port: u16,
    layout: RemoteLayout,
    archive: bool,
}

impl PlannerBuilder {
    /// Create a new [`PlannerBuilder`] from the three required input files.
    pub fn new(
        hosts_file: impl Into<PathBuf>,
        topology_file: impl Into<PathBuf>,
        contract_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hosts_file: hosts_file.into(),
            topology_file: topology_file.into(),
            contract_file: contract_file.into(),
            credentials: CredentialSource::default(),
            out_dir: None,
            scale_bound: 1,
            slot_time: 1.0,
            start_time: String::new(),
            account_width: DEFAULT_ACCOUNT_WIDTH,
            base_port: DEFAULT_BASE_PORT,
            layout: RemoteLayout::default(),
            archive: false,
        }
    }

    pub fn scale_bound(mut self, scale_bound: u32) -> Self {
        self.scale_bound = scale_bound;
        self
    }

    pub fn slot_time(mut self, slot_time: f64) -> Self {
        self.slot_time = slot_time;
        self
    }

    /// Set the start time handed verbatim to every node.
    pub fn start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = start_time.into();
        self
    }

    /// Set the number of account slots nodes rotate through.
    pub fn account_width(mut self, account_width: u32) -> Self {
        self.account_width = account_width;
        self
    }

    pub fn base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    /// Set the directories credential files are read from.
    pub fn credentials(mut self, accounts_dir: impl Into<PathBuf>, keyfile_dir: impl Into<PathBuf>) -> Self {
        self.credentials = CredentialSource {
            accounts_dir: accounts_dir.into(),
            keyfile_dir: keyfile_dir.into(),
        };
        self
    }

    pub fn layout(mut self, layout: RemoteLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the output directory.
    ///
    /// If not set, defaults to the current directory.
    pub fn out_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(path.into());
        self
    }

    /// Bundle each host's payload into a tarball after writing it.
    pub fn archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    /// Build the [`PlannerConfig`].
    ///
    /// Resolves the output directory to an absolute path. The directory itself is created by the
    /// first run that writes to it, so dry runs leave the filesystem untouched.
    pub fn build(self) -> Result<PlannerConfig> {
        let out_dir = self.out_dir.unwrap_or_else(|| PathBuf::from("."));

        let out_dir = if out_dir.try_exists().context(format!(
            "Failed to check if output directory exists at path {}. Ensure you provided valid permissions to the directory.",
            out_dir.display()
        ))? {
            out_dir
                .canonicalize()
                .context("Failed to canonicalize output directory path")?
        } else {
            std::path::absolute(&out_dir).context("Failed to resolve output directory path")?
        };

        tracing::debug!(
            out_dir = %out_dir.display(),
            scale_bound = self.scale_bound,
            account_width = self.account_width,
            "Building planner configuration..."
        );

        Ok(PlannerConfig {
            hosts_file: self.hosts_file,
            topology_file: self.topology_file,
            contract_file: self.contract_file,
            credentials: self.credentials,
            out_dir,
            scale_bound: self.scale_bound,
            slot_time: self.slot_time,
            start_time: self.start_time,
            account_width: self.account_width,
            base_port: self.base_port,
            layout: self.layout,
            archive: self.archive,
        })
    }
}
