//! Command builder for the node startup invocation.

use crate::{Endpoint, RemoteLayout};

/// Builder for a node's startup command.
#[derive(Debug, Clone)]
pub struct NodeCmdBuilder {
    layout: RemoteLayout,
    listen: Endpoint,
    api_port: u16,
    peers: Vec<Endpoint>,
    side_nodes: Vec<Endpoint>,
    account_path: String,
    key_path: String,
    scale_id: u32,
    num_scale: u32,
    slot_time: f64,
    contract_address: String,
    rpc_url: String,
    start_time: String,
    extra_args: Vec<String>,
}

impl NodeCmdBuilder {
    /// Create a new builder for a node listening on `listen` (external address and p2p port).
    pub fn new(layout: RemoteLayout, listen: Endpoint, api_port: u16) -> Self {
        Self {
            account_path: layout.account_path(1),
            key_path: layout.key_path(1),
            layout,
            listen,
            api_port,
            peers: Vec::new(),
            side_nodes: Vec::new(),
            scale_id: 0,
            num_scale: 0,
            slot_time: 1.0,
            contract_address: String::new(),
            rpc_url: String::new(),
            start_time: String::new(),
            extra_args: Vec::new(),
        }
    }

    /// Set the peers this node dials on startup.
    pub fn peers(mut self, peers: Vec<Endpoint>) -> Self {
        self.peers = peers;
        self
    }

    /// Set the side nodes announced to this node.
    pub fn side_nodes(mut self, side_nodes: Vec<Endpoint>) -> Self {
        self.side_nodes = side_nodes;
        self
    }

    /// Use the credentials of the given account slot and node ordinal.
    pub fn credentials(mut self, account_slot: u32, ordinal: u32) -> Self {
        self.account_path = self.layout.account_path(account_slot);
        self.key_path = self.layout.key_path(ordinal);
        self
    }

    /// Set the scale tier of this node and the total number of tiers.
    pub fn scale(mut self, scale_id: u32, num_scale: u32) -> Self {
        self.scale_id = scale_id;
        self.num_scale = num_scale;
        self
    }

    /// Set the slot duration in seconds.
    pub fn slot_time(mut self, slot_time: f64) -> Self {
        self.slot_time = slot_time;
        self
    }

    /// Set the contract address and the chain endpoint serving it.
    pub fn contract(mut self, address: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        self.contract_address = address.into();
        self.rpc_url = rpc_url.into();
        self
    }

    /// Set the start time, passed through verbatim.
    pub fn start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = start_time.into();
        self
    }

    /// Add extra arguments.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Build the node arguments as a vector of strings.
    pub fn build(self) -> Vec<String> {
        let mut cmd = Vec::new();

        cmd.push("-i".to_string());
        cmd.push(self.listen.to_string());

        for peer in &self.peers {
            cmd.push("-c".to_string());
            cmd.push(peer.to_string());
        }

        for side in &self.side_nodes {
            cmd.push("-r".to_string());
            cmd.push(side.to_string());
        }

        cmd.push("--api_addr".to_string());
        cmd.push(Endpoint::new(&self.listen.address, self.api_port).to_string());

        // Credentials
        cmd.push("--account".to_string());
        cmd.push(self.account_path);
        cmd.push("--key".to_string());
        cmd.push(self.key_path);

        // Scaling tiers
        cmd.push("--scale_id".to_string());
        cmd.push(self.scale_id.to_string());
        cmd.push("-l".to_string());
        cmd.push(self.layout.codes_dir.clone());
        cmd.push("-n".to_string());
        cmd.push(self.num_scale.to_string());
        cmd.push("-t".to_string());
        cmd.push(format_seconds(self.slot_time));

        cmd.push("-b".to_string());
        cmd.push(self.layout.binary_dir.clone());
        cmd.push("-j".to_string());
        cmd.push(self.layout.abi_path.clone());

        // Chain
        cmd.push("--contract_addr".to_string());
        cmd.push(self.contract_address);
        cmd.push("--node_url".to_string());
        cmd.push(self.rpc_url);
        cmd.push("--start_time".to_string());
        cmd.push(self.start_time);

        cmd.extend(self.extra_args);

        cmd
    }

    /// Render the full shell line: change into the binary directory and exec the node.
    pub fn render(self) -> String {
        let prefix = format!(
            "cd {} && RUST_LOG={} {}",
            self.layout.binary_dir,
            self.layout.log_filter,
            self.layout.binary_path()
        );
        let args = self.build();
        format!("{} {}", prefix, args.join(" "))
    }
}

/// Seconds with a decimal point, so `2` renders as `2.0`.
fn format_seconds(secs: f64) -> String {
    format!("{:?}", secs)
}
