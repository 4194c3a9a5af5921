//! Abstract node graph the deployment is planned from.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{PlanError, PlanResult};

/// A node of the topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Display name, used for file names and in the manifest.
    pub name: String,
    /// Numeric identity: selects the role, the keyfile and the account slot.
    pub ordinal: u32,
}

impl NodeId {
    pub fn new(name: impl Into<String>, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }

    /// Build a node from a bare name such as `node_12`, reading the ordinal from its trailing digits.
    pub fn from_name(name: impl Into<String>) -> PlanResult<Self> {
        let name = name.into();
        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let ordinal = name[name.len() - digits..].parse::<u32>().map_err(|_| {
            PlanError::config(
                "topology.nodes",
                format!("node `{}` has no numeric suffix to derive its ordinal from", name),
            )
        })?;
        Ok(Self { name, ordinal })
    }
}

/// A directed edge: `from` dials `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Node declaration as found in a topology file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeDecl {
    Name(String),
    Tagged(NodeId),
}

#[derive(Debug, Deserialize)]
struct TopologyFile {
    nodes: Vec<NodeDecl>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl TryFrom<TopologyFile> for Topology {
    type Error = PlanError;

    fn try_from(file: TopologyFile) -> Result<Self, Self::Error> {
        let nodes = file
            .nodes
            .into_iter()
            .map(|decl| match decl {
                NodeDecl::Name(name) => NodeId::from_name(name),
                NodeDecl::Tagged(node) => Ok(node),
            })
            .collect::<PlanResult<Vec<_>>>()?;

        Ok(Self {
            nodes,
            connections: file.connections,
        })
    }
}

/// Shortest-path statistics of a topology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStats {
    pub diameter: usize,
    pub average_shortest_path: f64,
}

/// Node names plus directed connections, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TopologyFile")]
pub struct Topology {
    pub nodes: Vec<NodeId>,
    pub connections: Vec<Connection>,
}

impl Topology {
    pub fn new(nodes: Vec<NodeId>, connections: Vec<Connection>) -> Self {
        Self { nodes, connections }
    }

    /// Complete graph over `node_1..=node_n`, both directions of every edge.
    pub fn complete(n: u32) -> Self {
        let nodes: Vec<NodeId> = (1..=n).map(|i| NodeId::new(format!("node_{}", i), i)).collect();

        let mut connections = Vec::new();
        for a in &nodes {
            for b in nodes.iter().filter(|b| b.ordinal > a.ordinal) {
                connections.push(Connection::new(&a.name, &b.name));
                connections.push(Connection::new(&b.name, &a.name));
            }
        }

        Self { nodes, connections }
    }

    /// Load a topology from a JSON file.
    ///
    /// Nodes may be bare names (`"node_3"`) or tagged records (`{"name": "a", "ordinal": 3}`).
    pub fn load_from_file(path: &Path) -> PlanResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PlanError::resource("topology", path, e))?;
        let topology: Self = serde_json::from_str(&content)
            .map_err(|e| PlanError::config("topology", format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            path = %path.display(),
            nodes = topology.nodes.len(),
            connections = topology.connections.len(),
            "Loaded topology"
        );
        Ok(topology)
    }

    /// Reject unusable or duplicate names, duplicate ordinals and edges to undeclared nodes.
    pub fn validate(&self) -> PlanResult<()> {
        let mut names = HashSet::new();
        let mut ordinals = HashSet::new();
        for node in &self.nodes {
            if let Some(reason) = unusable_name(&node.name) {
                return Err(PlanError::config(
                    "topology.nodes",
                    format!("node name `{}` {}", node.name.escape_debug(), reason),
                ));
            }
            if !names.insert(node.name.as_str()) {
                return Err(PlanError::config(
                    "topology.nodes",
                    format!("duplicate node name `{}`", node.name),
                ));
            }
            if !ordinals.insert(node.ordinal) {
                return Err(PlanError::config(
                    "topology.nodes",
                    format!("node `{}` reuses ordinal {}", node.name, node.ordinal),
                ));
            }
        }

        for (i, edge) in self.connections.iter().enumerate() {
            for end in [&edge.from, &edge.to] {
                if !names.contains(end.as_str()) {
                    return Err(PlanError::config(
                        "topology.connections",
                        format!("connection #{} references undeclared node `{}`", i, end),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Diameter and average shortest-path length over the directed graph.
    ///
    /// `None` when there are fewer than two nodes or some node cannot reach another.
    pub fn path_stats(&self) -> Option<PathStats> {
        let n = self.nodes.len();
        if n < 2 {
            return None;
        }

        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.as_str(), i))
            .collect();
        let mut adjacency = vec![Vec::new(); n];
        for edge in &self.connections {
            let (from, to) = (*index.get(edge.from.as_str())?, *index.get(edge.to.as_str())?);
            adjacency[from].push(to);
        }

        let mut diameter = 0;
        let mut total = 0usize;
        for source in 0..n {
            let mut dist = vec![usize::MAX; n];
            dist[source] = 0;
            let mut queue = VecDeque::from([source]);
            while let Some(u) = queue.pop_front() {
                for &v in &adjacency[u] {
                    if dist[v] == usize::MAX {
                        dist[v] = dist[u] + 1;
                        queue.push_back(v);
                    }
                }
            }
            for &d in &dist {
                if d == usize::MAX {
                    return None;
                }
                diameter = diameter.max(d);
                total += d;
            }
        }

        Some(PathStats {
            diameter,
            average_shortest_path: total as f64 / (n * (n - 1)) as f64,
        })
    }
}

/// Names end up as a manifest field and as a script file name.
fn unusable_name(name: &str) -> Option<&'static str> {
    if name.is_empty() || name == "." || name == ".." {
        Some("cannot name a file")
    } else if name.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if name.contains([',', '\n', '\r']) {
        Some("contains a manifest separator")
    } else {
        None
    }
}
