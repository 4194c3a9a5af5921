//! Physical hosts and their port allocators.

use std::{collections::HashSet, fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{PlanError, PlanResult};

/// First port handed out on every host.
pub const DEFAULT_BASE_PORT: u16 = 6000;

/// A physical machine in the host pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    /// Address used inside the testbed network. Also names the host's staging directory.
    pub internal: String,
    /// Externally reachable address advertised to peers.
    pub external: String,
}

impl HostAddr {
    pub fn new(internal: impl Into<String>, external: impl Into<String>) -> Self {
        Self {
            internal: internal.into(),
            external: external.into(),
        }
    }
}

impl FromStr for HostAddr {
    type Err = PlanError;

    /// Parses an instances-file line: `internal,external`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split(',').map(str::trim);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(internal), Some(external), None) if !internal.is_empty() && !external.is_empty() => {
                Ok(Self::new(internal, external))
            }
            _ => Err(PlanError::config(
                "hosts",
                format!("expected `internal,external`, got `{}`", line),
            )),
        }
    }
}

/// Load the host pool from an instances file.
///
/// One host per line. Blank lines and lines starting with `#` are skipped.
pub fn load_hosts(path: &Path) -> PlanResult<Vec<HostAddr>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| PlanError::resource("host pool", path, e))?;

    let mut hosts = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let host = line.parse::<HostAddr>().map_err(|e| match e {
            PlanError::Configuration { field, reason } => PlanError::Configuration {
                field,
                reason: format!("{}:{}: {}", path.display(), lineno + 1, reason),
            },
            other => other,
        })?;
        hosts.push(host);
    }

    tracing::debug!(path = %path.display(), hosts = hosts.len(), "Loaded host pool");
    Ok(hosts)
}

/// Check that the pool can be planned against.
pub(crate) fn validate_pool(hosts: &[HostAddr]) -> PlanResult<()> {
    if hosts.is_empty() {
        return Err(PlanError::config("hosts", "host pool is empty"));
    }

    let mut seen = HashSet::new();
    for host in hosts {
        let internal = host.internal.as_str();
        if internal.is_empty() || internal == "." || internal == ".." || internal.contains('/') {
            return Err(PlanError::config(
                "hosts",
                format!("internal address `{}` cannot name a staging directory", internal),
            ));
        }
        if [internal, host.external.as_str()]
            .iter()
            .any(|field| field.contains([',', '\n', '\r']))
        {
            return Err(PlanError::config(
                "hosts",
                format!("host `{}` contains a manifest separator", internal.escape_debug()),
            ));
        }
        if host.external.is_empty() {
            return Err(PlanError::config(
                "hosts",
                format!("host `{}` has no external address", internal),
            ));
        }
        // Two entries for one machine would get independent counters and hand out the same ports.
        if !seen.insert(internal) {
            return Err(PlanError::config(
                "hosts",
                format!("duplicate internal address `{}`", internal),
            ));
        }
    }

    Ok(())
}

/// An address paired with a port.
///
/// Ports are only unique per host, so a port is never transmitted without its address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Monotonic port cursor owned by a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAllocator {
    next: Option<u16>,
}

impl PortAllocator {
    pub fn new(base: u16) -> Self {
        Self { next: Some(base) }
    }

    /// Hand out the next free port, or `None` once the port range is exhausted.
    pub fn allocate(&mut self) -> Option<u16> {
        let port = self.next?;
        self.next = port.checked_add(1);
        Some(port)
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT)
    }
}

/// The two ports a node listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodePorts {
    pub p2p: u16,
    pub api: u16,
}

/// A host taking part in a planning run, with its own port allocator.
#[derive(Debug, Clone)]
pub struct Host {
    pub addr: HostAddr,
    ports: PortAllocator,
}

impl Host {
    pub fn new(addr: HostAddr, base_port: u16) -> Self {
        Self {
            addr,
            ports: PortAllocator::new(base_port),
        }
    }

    /// Draw the p2p port, then the API port.
    pub fn allocate_node_ports(&mut self) -> PlanResult<NodePorts> {
        let exhausted = || {
            PlanError::config(
                "base_port",
                format!("ran out of ports on host `{}`", self.addr.internal),
            )
        };
        let p2p = self.ports.allocate().ok_or_else(exhausted)?;
        let api = self.ports.allocate().ok_or_else(exhausted)?;
        Ok(NodePorts { p2p, api })
    }
}
