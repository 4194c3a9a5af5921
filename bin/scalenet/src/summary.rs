//! Plan and manifest rendering for the terminal.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use scalenet_deploy::{Manifest, Plan};
use serde_json::{Value, json};

pub fn plan_table(plan: &Plan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["node", "host", "p2p", "api", "role", "peers", "account"]);

    for node in &plan.nodes {
        let a = &node.assignment;
        table.add_row(vec![
            a.node.name.clone(),
            a.host.internal.clone(),
            a.p2p_endpoint().to_string(),
            a.api_endpoint().to_string(),
            a.role.to_string(),
            node.peers.len().to_string(),
            node.account_slot.to_string(),
        ]);
    }

    table
}

pub fn manifest_table(manifest: &Manifest) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["node", "host", "external", "p2p", "api", "role"]);

    for entry in manifest.iter() {
        table.add_row(vec![
            entry.name.clone(),
            entry.host.clone(),
            entry.external_address.clone(),
            entry.p2p_port.to_string(),
            entry.api_port.to_string(),
            entry.role.to_string(),
        ]);
    }

    table
}

pub fn manifest_json(manifest: &Manifest) -> Value {
    Value::Array(
        manifest
            .iter()
            .map(|e| {
                json!({
                    "name": e.name,
                    "host": e.host,
                    "external_address": e.external_address,
                    "p2p_port": e.p2p_port,
                    "api_port": e.api_port,
                    "role": e.role.to_string(),
                    "scale_id": e.role.tier_id(),
                })
            })
            .collect(),
    )
}

pub fn plan_json(plan: &Plan) -> Value {
    json!({
        "nodes": manifest_json(&plan.manifest),
        "side_nodes": plan.side_nodes.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "commands": plan
            .nodes
            .iter()
            .map(|n| (n.assignment.node.name.clone(), Value::from(n.command.clone())))
            .collect::<serde_json::Map<_, _>>(),
    })
}
