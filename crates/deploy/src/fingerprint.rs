use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Plan, PlanError, PlanResult};

/// The default name of the plan version file, written next to the manifest.
pub const PLAN_VERSION_FILENAME: &str = "plan-version.json";

/// Content hash of a plan.
///
/// Covers the manifest and every rendered startup command, so two plans hash equal exactly when
/// they would produce the same artifacts.
pub struct PlanFingerprint;

impl PlanFingerprint {
    /// Compute a hex-encoded SHA-256 of the plan's artifacts.
    pub fn compute_hash(plan: &Plan) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plan.manifest.to_text().as_bytes());
        for node in &plan.nodes {
            hasher.update(node.assignment.node.name.as_bytes());
            hasher.update([0]);
            hasher.update(node.command.as_bytes());
            hasher.update([0]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Version metadata of the last successful planning run in an output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanVersion {
    /// SHA-256 of the plan artifacts.
    pub plan_hash: String,
    /// Unix timestamp of the run.
    pub planned_at: i64,
    /// Version of scalenet that produced the plan.
    pub scalenet_version: String,
}

impl PlanVersion {
    /// Create a new version record stamped with the current time.
    pub fn new(plan_hash: String) -> Self {
        Self {
            plan_hash,
            planned_at: chrono::Utc::now().timestamp(),
            scalenet_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> PlanResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PlanError::config("plan version", e.to_string()))?;
        std::fs::write(path, json).map_err(|e| PlanError::resource("plan version", path, e))
    }

    /// Load version metadata. Fails if the file is missing or malformed.
    pub fn load_from_file(path: &Path) -> PlanResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PlanError::resource("plan version", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| PlanError::config("plan version", format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContractConfig, DeploymentParams, HostAddr, Topology, plan};
    use tempdir::TempDir;

    fn sample_plan(start_time: &str) -> Plan {
        let hosts = vec![HostAddr::new("10.0.0.1", "54.0.0.1"), HostAddr::new("10.0.0.2", "54.0.0.2")];
        let params = DeploymentParams::new(
            2.0,
            ContractConfig {
                contract_address: "0xabc".to_string(),
                rpc_url: "http://10.0.0.100:8545".to_string(),
            },
            start_time,
        );
        plan(&hosts, &Topology::complete(4), 2, &params).unwrap()
    }

    #[test]
    fn test_hash_determinism() {
        let hash1 = PlanFingerprint::compute_hash(&sample_plan("1700000000"));
        let hash2 = PlanFingerprint::compute_hash(&sample_plan("1700000000"));

        assert_eq!(hash1, hash2, "Hash should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_hash_changes_with_commands() {
        assert_ne!(
            PlanFingerprint::compute_hash(&sample_plan("1700000000")),
            PlanFingerprint::compute_hash(&sample_plan("1700000060")),
            "Hash should change when a startup command changes"
        );
    }

    #[test]
    fn test_version_save_and_load() {
        let temp_dir = TempDir::new("scalenet-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(PLAN_VERSION_FILENAME);

        let version = PlanVersion {
            plan_hash: "a7f3c2b1d8e5f4a9".to_string(),
            planned_at: 1737316800,
            scalenet_version: "0.1.0".to_string(),
        };
        version.save_to_file(&path).expect("Failed to save version");

        assert_eq!(PlanVersion::load_from_file(&path).unwrap(), version);
    }

    #[test]
    fn test_version_load_missing_or_corrupted() {
        let temp_dir = TempDir::new("scalenet-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(PLAN_VERSION_FILENAME);

        assert!(PlanVersion::load_from_file(&path).unwrap_err().is_resource());

        std::fs::write(&path, "{ invalid json }").unwrap();
        assert!(PlanVersion::load_from_file(&path).unwrap_err().is_configuration());
    }
}
