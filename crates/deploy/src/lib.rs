//! scalenet-deploy - Deployment planning library for scale testbeds.
//!
//! This crate turns a pool of hosts and an abstract node topology into a fully resolved
//! deployment: a host, two ports and a role for every node, the startup command each node runs,
//! per-host credential payloads and a manifest for log collection tooling.

mod error;
pub use error::{PlanError, PlanResult};

mod host;
pub use host::{DEFAULT_BASE_PORT, Endpoint, Host, HostAddr, NodePorts, PortAllocator, load_hosts};

mod topology;
pub use topology::{Connection, NodeId, PathStats, Topology};

mod role;
pub use role::Role;

mod params;
pub use params::{
    ContractConfig, DEFAULT_ACCOUNT_WIDTH, DeploymentParams, RemoteLayout, account_file_name,
    key_file_name, rotation_slot,
};

mod cmd;
pub use cmd::NodeCmdBuilder;

mod plan;
pub use plan::{Assignment, AssignmentTable, NodePlan, Plan, assign, plan, resolve};

mod manifest;
pub use manifest::{MANIFEST_FILENAME, Manifest, ManifestEntry};

mod fingerprint;
pub use fingerprint::{PLAN_VERSION_FILENAME, PlanFingerprint, PlanVersion};

mod staging;
pub use staging::{
    CredentialSource, HOST_PAYLOAD_DIR, PAYLOAD_DIR, PayloadWriter, WrittenPayload,
    host_payload_dir,
};

pub mod archive;

mod config;
pub use config::{PlanOutcome, PlannerConfig, SCALENET_CONF_FILENAME};

mod builder;
pub use builder::PlannerBuilder;
