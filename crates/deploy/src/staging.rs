//! Payload staging.
//!
//! Every artifact of a run (startup scripts, credential copies, plan version, manifest) is first
//! written into a temporary directory inside the output directory, then renamed into place.
//! Per-host archives, when requested, are bundled inside the staging directory too. The manifest
//! is renamed last: its presence marks a complete run.

use std::{
    collections::BTreeMap,
    io,
    path::{Component, Path, PathBuf},
};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tempdir::TempDir;

use crate::{
    HostAddr, MANIFEST_FILENAME, PLAN_VERSION_FILENAME, Plan, PlanError, PlanFingerprint,
    PlanResult, PlanVersion, account_file_name, archive, key_file_name,
};

/// Directory under the output directory holding one sub-directory per host.
pub const PAYLOAD_DIR: &str = "payload";
/// Directory inside each host directory holding its scripts and credentials.
pub const HOST_PAYLOAD_DIR: &str = "scale-payload";

const STAGING_PREFIX: &str = ".scalenet-staging";

/// Where credential source files are read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialSource {
    /// Directory holding `account<N>` files, one per account slot.
    pub accounts_dir: PathBuf,
    /// Directory holding `node<ordinal>` keyfiles, one per node.
    pub keyfile_dir: PathBuf,
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self {
            accounts_dir: PathBuf::from("accounts"),
            keyfile_dir: PathBuf::from("keyfile"),
        }
    }
}

impl CredentialSource {
    pub fn account_file(&self, slot: u32) -> PathBuf {
        self.accounts_dir.join(account_file_name(slot))
    }

    pub fn key_file(&self, ordinal: u32) -> PathBuf {
        self.keyfile_dir.join(key_file_name(ordinal))
    }

    /// Verify that every credential file the plan needs exists.
    pub fn check(&self, plan: &Plan) -> PlanResult<()> {
        for node in &plan.nodes {
            let name = &node.assignment.node.name;
            for path in [
                self.account_file(node.account_slot),
                self.key_file(node.assignment.node.ordinal),
            ] {
                match std::fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => {
                        return Err(PlanError::resource(
                            name,
                            &path,
                            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
                        ));
                    }
                    Err(e) => return Err(PlanError::resource(name, &path, e)),
                }
            }
        }
        Ok(())
    }
}

/// Directory of a host's payload, relative to the output directory.
pub fn host_payload_dir(host: &HostAddr) -> PathBuf {
    Path::new(PAYLOAD_DIR).join(&host.internal).join(HOST_PAYLOAD_DIR)
}

/// A file to produce, relative to the output directory.
#[derive(Debug)]
struct Artifact {
    /// Node the file belongs to, for error reports.
    subject: String,
    content: ArtifactContent,
}

#[derive(Debug)]
enum ArtifactContent {
    Text(String),
    CopyOf(PathBuf),
}

impl Artifact {
    async fn stage(&self, root: &Path, rel: &Path) -> PlanResult<()> {
        let dest = root.join(rel);
        match &self.content {
            ArtifactContent::Text(text) => tokio::fs::write(&dest, text)
                .await
                .map_err(|e| PlanError::resource(&self.subject, &dest, e)),
            ArtifactContent::CopyOf(src) => tokio::fs::copy(src, &dest)
                .await
                .map(|_| ())
                .map_err(|e| PlanError::resource(&self.subject, src, e)),
        }
    }
}

/// Files produced by a successful [`PayloadWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPayload {
    /// Payload files, relative to the output directory, in path order.
    pub files: Vec<PathBuf>,
    /// Per-host archives under the output directory, empty unless requested.
    pub archives: Vec<PathBuf>,
    pub version: PlanVersion,
    pub version_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Writes a plan's artifacts into an output directory.
#[derive(Debug, Clone)]
pub struct PayloadWriter {
    out_dir: PathBuf,
    credentials: CredentialSource,
    archives: bool,
}

impl PayloadWriter {
    pub fn new(out_dir: impl Into<PathBuf>, credentials: CredentialSource) -> Self {
        Self {
            out_dir: out_dir.into(),
            credentials,
            archives: false,
        }
    }

    /// Also bundle each host's payload into `payload/<internal>.tar.gz`.
    pub fn with_archives(mut self, archives: bool) -> Self {
        self.archives = archives;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILENAME)
    }

    pub fn version_path(&self) -> PathBuf {
        self.out_dir.join(PLAN_VERSION_FILENAME)
    }

    /// Map every payload file to what it should contain.
    ///
    /// Nodes on one host that share an account slot share one copy of the account file.
    /// Every path must stay `payload/<host>/scale-payload/<file>`.
    fn artifacts(&self, plan: &Plan) -> PlanResult<BTreeMap<PathBuf, Artifact>> {
        let mut artifacts = BTreeMap::new();

        for node in &plan.nodes {
            let id = &node.assignment.node;
            let dir = host_payload_dir(&node.assignment.host);

            artifacts.insert(
                dir.join(format!("{}.sh", id.name)),
                Artifact {
                    subject: id.name.clone(),
                    content: ArtifactContent::Text(node.command.clone()),
                },
            );
            artifacts
                .entry(dir.join(account_file_name(node.account_slot)))
                .or_insert_with(|| Artifact {
                    subject: id.name.clone(),
                    content: ArtifactContent::CopyOf(self.credentials.account_file(node.account_slot)),
                });
            artifacts.insert(
                dir.join(key_file_name(id.ordinal)),
                Artifact {
                    subject: id.name.clone(),
                    content: ArtifactContent::CopyOf(self.credentials.key_file(id.ordinal)),
                },
            );
        }

        for (rel, artifact) in &artifacts {
            let depth = rel.components().count();
            if depth != 4 || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(PlanError::config(
                    "topology.nodes",
                    format!(
                        "payload file `{}` of {} escapes its host directory",
                        rel.display(),
                        artifact.subject
                    ),
                ));
            }
        }

        Ok(artifacts)
    }

    /// Write the plan's scripts, credentials, version file and manifest.
    ///
    /// Credentials are checked before anything is written. On failure nothing is committed and
    /// no manifest is left behind.
    pub async fn write(&self, plan: &Plan) -> PlanResult<WrittenPayload> {
        let artifacts = self.artifacts(plan)?;
        self.credentials.check(plan)?;

        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|e| PlanError::resource("output directory", &self.out_dir, e))?;
        let staging = TempDir::new_in(&self.out_dir, STAGING_PREFIX)
            .map_err(|e| PlanError::resource("staging directory", &self.out_dir, e))?;
        let root = staging.path();

        for host in plan.hosts() {
            let dir = root.join(host_payload_dir(host));
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| PlanError::resource("staging directory", &dir, e))?;
        }

        try_join_all(artifacts.iter().map(|(rel, artifact)| artifact.stage(root, rel))).await?;

        let archives = if self.archives {
            archive::bundle_hosts(root, plan)?
        } else {
            Vec::new()
        };

        let version = PlanVersion::new(PlanFingerprint::compute_hash(plan));
        version.save_to_file(&root.join(PLAN_VERSION_FILENAME))?;

        let staged_manifest = root.join(MANIFEST_FILENAME);
        tokio::fs::write(&staged_manifest, plan.manifest.to_text())
            .await
            .map_err(|e| PlanError::resource("manifest", &staged_manifest, e))?;

        tracing::debug!(
            staging = %root.display(),
            files = artifacts.len(),
            "Payload staged, committing"
        );

        // A stale manifest from an earlier run must not outlive a failed commit.
        let manifest_path = self.manifest_path();
        match tokio::fs::remove_file(&manifest_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PlanError::resource("manifest", &manifest_path, e)),
        }

        for (rel, artifact) in &artifacts {
            let dest = self.out_dir.join(rel);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PlanError::resource(&artifact.subject, parent, e))?;
            }
            tokio::fs::rename(root.join(rel), &dest)
                .await
                .map_err(|e| PlanError::resource(&artifact.subject, &dest, e))?;
        }

        let mut committed_archives = Vec::with_capacity(archives.len());
        for rel in &archives {
            let dest = self.out_dir.join(rel);
            tokio::fs::rename(root.join(rel), &dest)
                .await
                .map_err(|e| PlanError::resource("archive", &dest, e))?;
            committed_archives.push(dest);
        }

        let version_path = self.version_path();
        tokio::fs::rename(root.join(PLAN_VERSION_FILENAME), &version_path)
            .await
            .map_err(|e| PlanError::resource("plan version", &version_path, e))?;
        tokio::fs::rename(&staged_manifest, &manifest_path)
            .await
            .map_err(|e| PlanError::resource("manifest", &manifest_path, e))?;

        tracing::info!(
            out_dir = %self.out_dir.display(),
            files = artifacts.len(),
            archives = committed_archives.len(),
            manifest = %manifest_path.display(),
            "Payload written"
        );

        Ok(WrittenPayload {
            files: artifacts.into_keys().collect(),
            archives: committed_archives,
            version,
            version_path,
            manifest_path,
        })
    }
}
