//! Per-deployment parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_BASE_PORT, PlanError, PlanResult};

/// Default number of account slots nodes rotate through.
pub const DEFAULT_ACCOUNT_WIDTH: u32 = 10;

/// Contract deployment the nodes talk to, as written by the contract deploy step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub contract_address: String,
    pub rpc_url: String,
}

impl ContractConfig {
    /// Load the contract configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> PlanResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlanError::resource("contract config", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| PlanError::config("contract", format!("{}: {}", path.display(), e)))
    }
}

/// Where the payload is unpacked on every target host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteLayout {
    /// Directory holding the node binary; also the working directory of the node.
    pub binary_dir: String,
    /// File name of the node binary inside `binary_dir`.
    pub binary_name: String,
    /// Directory the staged credentials end up in.
    pub payload_dir: String,
    /// Directory holding the LDPC code tables.
    pub codes_dir: String,
    /// Contract ABI file.
    pub abi_path: String,
    /// Value of `RUST_LOG` for the node.
    pub log_filter: String,
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            binary_dir: "/root/payload/binary".to_string(),
            binary_name: "system_rust".to_string(),
            payload_dir: "/root/payload/scale-payload".to_string(),
            codes_dir: "/root/payload/LDPC_codes".to_string(),
            abi_path: "/root/payload/binary/abi.json".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl RemoteLayout {
    pub fn binary_path(&self) -> String {
        format!("{}/{}", self.binary_dir, self.binary_name)
    }

    pub fn account_path(&self, slot: u32) -> String {
        format!("{}/{}", self.payload_dir, account_file_name(slot))
    }

    pub fn key_path(&self, ordinal: u32) -> String {
        format!("{}/{}", self.payload_dir, key_file_name(ordinal))
    }
}

/// Parameters shared by every node of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentParams {
    /// Slot duration in seconds.
    pub slot_time: f64,
    pub contract: ContractConfig,
    /// Start time handed to every node verbatim.
    pub start_time: String,
    /// Number of account slots nodes rotate through.
    pub account_width: u32,
    /// First port allocated on each host.
    pub base_port: u16,
    pub layout: RemoteLayout,
}

impl DeploymentParams {
    pub fn new(slot_time: f64, contract: ContractConfig, start_time: impl Into<String>) -> Self {
        Self {
            slot_time,
            contract,
            start_time: start_time.into(),
            account_width: DEFAULT_ACCOUNT_WIDTH,
            base_port: DEFAULT_BASE_PORT,
            layout: RemoteLayout::default(),
        }
    }

    pub fn validate(&self) -> PlanResult<()> {
        if !self.slot_time.is_finite() || self.slot_time <= 0.0 {
            return Err(PlanError::config(
                "slot_time",
                format!("must be a positive number of seconds, got {}", self.slot_time),
            ));
        }
        if self.account_width == 0 {
            return Err(PlanError::config("account_width", "must be positive"));
        }
        if self.base_port == 0 {
            return Err(PlanError::config("base_port", "must be positive"));
        }
        Ok(())
    }

    /// Account slot used by the node with the given ordinal.
    pub fn account_slot(&self, ordinal: u32) -> u32 {
        rotation_slot(ordinal, self.account_width)
    }
}

/// `((ordinal - 1) mod width) + 1`, with ordinal 0 mapped to `width`.
pub fn rotation_slot(ordinal: u32, width: u32) -> u32 {
    match ordinal % width {
        0 => width,
        slot => slot,
    }
}

pub fn account_file_name(slot: u32) -> String {
    format!("account{}", slot)
}

pub fn key_file_name(ordinal: u32) -> String {
    format!("node{}", ordinal)
}
