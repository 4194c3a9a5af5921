//! Deployment planning: host packing, port allocation, role assignment and peer resolution.
//!
//! Planning runs in two stages. [`assign`] walks the nodes in declaration order and gives each
//! one a host (round-robin), a p2p port, an API port and a role. The resulting
//! [`AssignmentTable`] is frozen; [`resolve`] then reads it to turn every outgoing connection
//! into a peer endpoint, builds the shared side-node list and renders each startup command.

use std::collections::HashMap;

use crate::{
    DeploymentParams, Endpoint, Host, HostAddr, Manifest, ManifestEntry, NodeCmdBuilder, NodeId,
    PlanError, PlanResult, Role, Topology, host,
};

/// Placement of a single node. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub node: NodeId,
    /// Index of the host in the pool.
    pub host_index: usize,
    pub host: HostAddr,
    pub p2p_port: u16,
    pub api_port: u16,
    pub role: Role,
}

impl Assignment {
    /// Address and port peers dial.
    pub fn p2p_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host.external, self.p2p_port)
    }

    pub fn api_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host.external, self.api_port)
    }

    pub fn manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            name: self.node.name.clone(),
            host: self.host.internal.clone(),
            external_address: self.host.external.clone(),
            p2p_port: self.p2p_port,
            api_port: self.api_port,
            role: self.role,
        }
    }
}

/// Arena of assignments in declaration order, indexed by node name.
#[derive(Debug, Clone, Default)]
pub struct AssignmentTable {
    entries: Vec<Assignment>,
    index: HashMap<String, usize>,
}

impl AssignmentTable {
    pub fn get(&self, name: &str) -> Option<&Assignment> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Declaration index of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, assignment: Assignment) {
        self.index.insert(assignment.node.name.clone(), self.entries.len());
        self.entries.push(assignment);
    }
}

/// Everything planned for a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePlan {
    pub assignment: Assignment,
    /// One endpoint per outgoing connection, in connection order.
    pub peers: Vec<Endpoint>,
    /// Account slot the node's credentials come from.
    pub account_slot: u32,
    /// Rendered startup command.
    pub command: String,
}

/// A fully resolved deployment plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Per-node plans, in node declaration order.
    pub nodes: Vec<NodePlan>,
    /// Endpoints of every side node, announced identically to all nodes.
    pub side_nodes: Vec<Endpoint>,
    pub manifest: Manifest,
}

impl Plan {
    pub fn node(&self, name: &str) -> Option<&NodePlan> {
        self.nodes.iter().find(|n| n.assignment.node.name == name)
    }

    /// Internal addresses of the hosts that received at least one node, in first-use order.
    pub fn hosts(&self) -> Vec<&HostAddr> {
        let mut hosts: Vec<&HostAddr> = Vec::new();
        for node in &self.nodes {
            if !hosts.contains(&&node.assignment.host) {
                hosts.push(&node.assignment.host);
            }
        }
        hosts
    }
}

/// Plan a deployment of `topology` onto `hosts`.
///
/// All inputs are validated before anything is computed; the result is a pure function of the
/// inputs.
pub fn plan(
    hosts: &[HostAddr],
    topology: &Topology,
    scale_bound: u32,
    params: &DeploymentParams,
) -> PlanResult<Plan> {
    host::validate_pool(hosts)?;
    topology.validate()?;
    params.validate()?;
    if scale_bound == 0 {
        return Err(PlanError::config("scale_bound", "must be positive"));
    }

    let table = assign(hosts, topology, scale_bound, params.base_port)?;
    let plan = resolve(&table, topology, scale_bound, params)?;

    tracing::info!(
        nodes = plan.nodes.len(),
        hosts = hosts.len(),
        side_nodes = plan.side_nodes.len(),
        connections = topology.connections.len(),
        "Deployment planned"
    );

    Ok(plan)
}

/// First stage: host, ports and role for every node, in declaration order.
pub fn assign(
    hosts: &[HostAddr],
    topology: &Topology,
    scale_bound: u32,
    base_port: u16,
) -> PlanResult<AssignmentTable> {
    if hosts.is_empty() {
        return Err(PlanError::config("hosts", "host pool is empty"));
    }

    let mut pool: Vec<Host> = hosts
        .iter()
        .cloned()
        .map(|addr| Host::new(addr, base_port))
        .collect();
    let mut table = AssignmentTable::default();

    for (i, node) in topology.nodes.iter().enumerate() {
        let host_index = i % pool.len();
        let host = &mut pool[host_index];
        let ports = host.allocate_node_ports()?;
        let role = Role::assign(node.ordinal, scale_bound);

        tracing::debug!(
            node = %node.name,
            host = %host.addr.internal,
            p2p_port = ports.p2p,
            api_port = ports.api,
            %role,
            "Assigned node"
        );

        table.push(Assignment {
            node: node.clone(),
            host_index,
            host: host.addr.clone(),
            p2p_port: ports.p2p,
            api_port: ports.api,
            role,
        });
    }

    Ok(table)
}

/// Second stage: peers, side list, startup commands and manifest, from a complete table.
///
/// A connection naming a node absent from `table` is a `Configuration` error.
pub fn resolve(
    table: &AssignmentTable,
    topology: &Topology,
    scale_bound: u32,
    params: &DeploymentParams,
) -> PlanResult<Plan> {
    let mut outgoing: Vec<Vec<Endpoint>> = vec![Vec::new(); table.len()];
    for (i, edge) in topology.connections.iter().enumerate() {
        let (Some(from), Some(to)) = (table.position(&edge.from), table.get(&edge.to)) else {
            return Err(PlanError::config(
                "topology.connections",
                format!("connection #{} ({} -> {}) leaves the assignment table", i, edge.from, edge.to),
            ));
        };
        outgoing[from].push(to.p2p_endpoint());
    }

    let side_nodes: Vec<Endpoint> = table
        .iter()
        .filter(|a| a.role.is_side())
        .map(Assignment::p2p_endpoint)
        .collect();

    let nodes = table
        .iter()
        .zip(outgoing)
        .map(|(assignment, peers)| {
            let account_slot = params.account_slot(assignment.node.ordinal);

            let command = NodeCmdBuilder::new(
                params.layout.clone(),
                assignment.p2p_endpoint(),
                assignment.api_port,
            )
            .peers(peers.clone())
            .side_nodes(side_nodes.clone())
            .credentials(account_slot, assignment.node.ordinal)
            .scale(assignment.role.tier_id(), scale_bound)
            .slot_time(params.slot_time)
            .contract(&params.contract.contract_address, &params.contract.rpc_url)
            .start_time(&params.start_time)
            .render();

            NodePlan {
                assignment: assignment.clone(),
                peers,
                account_slot,
                command,
            }
        })
        .collect::<Vec<_>>();

    let manifest = Manifest::new(
        nodes
            .iter()
            .map(|n| n.assignment.manifest_entry())
            .collect(),
    );

    Ok(Plan {
        nodes,
        side_nodes,
        manifest,
    })
}
