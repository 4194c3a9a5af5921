//! Node manifest consumed by log collection and analysis tooling.
//!
//! One comma-separated line per node, in declaration order:
//! `name,host,external_address,p2p_port,api_port,role`, where `role` is the tier id
//! (0 for side nodes).

use std::{fmt, path::Path, str::FromStr};

use derive_more::Deref;

use crate::{PlanError, PlanResult, Role};

/// The default name of the manifest file.
pub const MANIFEST_FILENAME: &str = "nodes.txt";

/// Resolved deployment coordinates of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    pub name: String,
    pub host: String,
    pub external_address: String,
    pub p2p_port: u16,
    pub api_port: u16,
    pub role: Role,
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.name,
            self.host,
            self.external_address,
            self.p2p_port,
            self.api_port,
            self.role.tier_id()
        )
    }
}

impl FromStr for ManifestEntry {
    type Err = PlanError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| PlanError::config("manifest", format!("{}: `{}`", reason, line));

        let fields: Vec<&str> = line.split(',').collect();
        let [name, host, external_address, p2p_port, api_port, role] = fields.as_slice() else {
            return Err(invalid("expected 6 comma-separated fields"));
        };

        Ok(Self {
            name: name.to_string(),
            host: host.to_string(),
            external_address: external_address.to_string(),
            p2p_port: p2p_port.parse().map_err(|_| invalid("invalid p2p port"))?,
            api_port: api_port.parse().map_err(|_| invalid("invalid api port"))?,
            role: Role::from_tier_id(role.parse().map_err(|_| invalid("invalid role"))?),
        })
    }
}

/// All manifest entries of a run, in node declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct Manifest(Vec<ManifestEntry>);

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self(entries)
    }

    pub fn into_entries(self) -> Vec<ManifestEntry> {
        self.0
    }

    /// Look up the entry of a node by name.
    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.0.iter().find(|e| e.name == name)
    }

    /// The manifest file content, one line per node with a trailing newline.
    pub fn to_text(&self) -> String {
        self.0.iter().map(|e| format!("{}\n", e)).collect()
    }

    /// Parse manifest file content. Blank lines are ignored.
    pub fn parse(text: &str) -> PlanResult<Self> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::parse::<ManifestEntry>)
            .collect::<PlanResult<Vec<_>>>()
            .map(Self)
    }

    pub fn load_from_file(path: &Path) -> PlanResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PlanError::resource("manifest", path, e))?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ManifestEntry {
        ManifestEntry {
            name: "node_3".to_string(),
            host: "10.0.0.1".to_string(),
            external_address: "54.0.0.1".to_string(),
            p2p_port: 6004,
            api_port: 6005,
            role: Role::Scale(3),
        }
    }

    #[test]
    fn test_entry_line_format() {
        assert_eq!(entry().to_string(), "node_3,10.0.0.1,54.0.0.1,6004,6005,3");

        let side = ManifestEntry {
            role: Role::Side,
            ..entry()
        };
        assert_eq!(side.to_string(), "node_3,10.0.0.1,54.0.0.1,6004,6005,0");
    }

    #[test]
    fn test_entry_parses_back() {
        let line = entry().to_string();
        assert_eq!(line.parse::<ManifestEntry>().unwrap(), entry());
    }

    #[test]
    fn test_entry_rejects_malformed_lines() {
        assert!("node_3,10.0.0.1,54.0.0.1,6004,6005".parse::<ManifestEntry>().is_err());
        assert!("node_3,10.0.0.1,54.0.0.1,port,6005,3".parse::<ManifestEntry>().is_err());
        assert!("node_3,10.0.0.1,54.0.0.1,6004,6005,-1".parse::<ManifestEntry>().is_err());
    }

    #[test]
    fn test_manifest_text_keeps_order() {
        let second = ManifestEntry {
            name: "node_1".to_string(),
            ..entry()
        };
        let manifest = Manifest::new(vec![entry(), second]);
        let text = manifest.to_text();

        assert!(text.starts_with("node_3,"));
        assert!(text.ends_with('\n'));
        assert_eq!(Manifest::parse(&text).unwrap(), manifest);
        assert_eq!(manifest.entry("node_1").unwrap().name, "node_1");
        assert_eq!(manifest.len(), 2);
    }
}
