//! End-to-end planning runs against a temporary working directory.
//!
//! Each test lays out the inputs a testbed operator would have (instances file, topology,
//! contract config, account files and keyfiles), runs the planner and inspects the output
//! directory.
//! Run with: cargo test --test integration_test

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scalenet_deploy::{
    MANIFEST_FILENAME, Manifest, PLAN_VERSION_FILENAME, PlanError, PlannerBuilder, PlannerConfig,
    Role,
};
use tempdir::TempDir;

const CONTRACT_JSON: &str =
    r#"{"contract_address": "0x5fbdb2315678afecb367f032d93f642f64180aa3", "rpc_url": "http://10.0.0.100:8545"}"#;

/// Test setup context containing the planner inputs.
struct TestContext {
    dir: TempDir,
}

impl TestContext {
    /// Lay out inputs for `hosts` hosts and a complete topology of `nodes` nodes.
    fn new(hosts: usize, nodes: u32) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let dir = TempDir::new("scalenet-it").context("Failed to create temp dir")?;
        let root = dir.path();

        let instances: String = (0..hosts)
            .map(|i| format!("10.0.0.{},54.0.0.{}\n", i + 1, i + 1))
            .collect();
        std::fs::write(root.join("instances.txt"), instances)?;

        let names: Vec<String> = (1..=nodes).map(|i| format!("node_{}", i)).collect();
        let mut connections = Vec::new();
        for a in &names {
            for b in &names {
                if a != b {
                    connections.push(serde_json::json!({"from": a, "to": b}));
                }
            }
        }
        std::fs::write(
            root.join("topo.json"),
            serde_json::to_string_pretty(&serde_json::json!({
                "nodes": names,
                "connections": connections,
            }))?,
        )?;

        std::fs::write(root.join("contract.json"), CONTRACT_JSON)?;

        std::fs::create_dir_all(root.join("accounts"))?;
        for slot in 1..=10 {
            std::fs::write(root.join(format!("accounts/account{}", slot)), format!("account-{}", slot))?;
        }
        std::fs::create_dir_all(root.join("keyfile"))?;
        for ordinal in 1..=nodes {
            std::fs::write(root.join(format!("keyfile/node{}", ordinal)), format!("key-{}", ordinal))?;
        }

        Ok(Self { dir })
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn out(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    fn builder(&self, out: &str) -> PlannerBuilder {
        let root = self.root();
        PlannerBuilder::new(
            root.join("instances.txt"),
            root.join("topo.json"),
            root.join("contract.json"),
        )
        .scale_bound(5)
        .slot_time(2.0)
        .start_time("1700000000")
        .credentials(root.join("accounts"), root.join("keyfile"))
        .out_dir(self.out(out))
    }

    fn config(&self, out: &str) -> Result<PlannerConfig> {
        self.builder(out).build()
    }
}

/// All files under `dir`, relative to it, sorted.
fn list_files(dir: &Path) -> Vec<PathBuf> {
    fn walk(base: &Path, dir: &Path, files: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, files);
            } else {
                files.push(path.strip_prefix(base).unwrap().to_path_buf());
            }
        }
    }

    let mut files = Vec::new();
    walk(dir, dir, &mut files);
    files.sort();
    files
}

fn plan_error(err: &anyhow::Error) -> &PlanError {
    err.downcast_ref::<PlanError>()
        .unwrap_or_else(|| panic!("expected a PlanError, got: {:#}", err))
}

#[tokio::test]
async fn test_full_run_writes_payload_and_manifest() -> Result<()> {
    let ctx = TestContext::new(3, 7)?;
    let config = ctx.config("out")?;
    let outcome = config.run(false).await?;
    let out = ctx.out("out");

    // Manifest: one line per node, declaration order, round-robin hosts.
    let manifest_text = std::fs::read_to_string(out.join(MANIFEST_FILENAME))?;
    let lines: Vec<&str> = manifest_text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "node_1,10.0.0.1,54.0.0.1,6000,6001,1",
            "node_2,10.0.0.2,54.0.0.2,6000,6001,2",
            "node_3,10.0.0.3,54.0.0.3,6000,6001,3",
            "node_4,10.0.0.1,54.0.0.1,6002,6003,4",
            "node_5,10.0.0.2,54.0.0.2,6002,6003,5",
            "node_6,10.0.0.3,54.0.0.3,6002,6003,0",
            "node_7,10.0.0.1,54.0.0.1,6004,6005,0",
        ]
    );

    // Payload layout.
    let host_1 = out.join("payload/10.0.0.1/scale-payload");
    for file in ["node_1.sh", "node_4.sh", "node_7.sh", "account1", "account4", "account7", "node1", "node4", "node7"] {
        assert!(host_1.join(file).is_file(), "missing {}", file);
    }
    assert_eq!(std::fs::read_to_string(host_1.join("account4"))?, "account-4");
    assert_eq!(std::fs::read_to_string(host_1.join("node7"))?, "key-7");
    assert!(!host_1.join("node_2.sh").exists());

    // Startup script of node_4.
    let script = std::fs::read_to_string(host_1.join("node_4.sh"))?;
    assert!(script.starts_with("cd /root/payload/binary && RUST_LOG=info /root/payload/binary/system_rust -i 54.0.0.1:6002 "));
    assert!(script.contains("--api_addr 54.0.0.1:6003"));
    assert!(script.contains("-c 54.0.0.1:6000"));
    assert!(script.contains("-c 54.0.0.3:6002"));
    assert!(script.contains("-r 54.0.0.3:6002 -r 54.0.0.1:6004"));
    assert!(script.contains("--scale_id 4 "));
    assert!(script.contains("-n 5 -t 2.0 "));
    assert!(script.contains("--contract_addr 0x5fbdb2315678afecb367f032d93f642f64180aa3"));
    assert!(script.ends_with("--start_time 1700000000"));

    // Version file, no leftover staging directory.
    assert!(out.join(PLAN_VERSION_FILENAME).is_file());
    let leftovers: Vec<_> = std::fs::read_dir(&out)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(".scalenet-staging"))
        .collect();
    assert!(leftovers.is_empty());

    let written = outcome.written.expect("payload should be written");
    assert_eq!(written.files.len(), 7 * 3);
    assert!(outcome.previous.is_none());

    Ok(())
}

#[tokio::test]
async fn test_manifest_matches_startup_commands() -> Result<()> {
    let ctx = TestContext::new(2, 6)?;
    let outcome = ctx.config("out")?.run(false).await?;
    let out = ctx.out("out");

    let manifest = Manifest::load_from_file(&out.join(MANIFEST_FILENAME))?;
    assert_eq!(manifest, outcome.plan.manifest);

    for entry in manifest.iter() {
        let script = std::fs::read_to_string(
            out.join("payload")
                .join(&entry.host)
                .join("scale-payload")
                .join(format!("{}.sh", entry.name)),
        )?;
        assert!(script.contains(&format!("-i {}:{} ", entry.external_address, entry.p2p_port)));
        assert!(script.contains(&format!("--api_addr {}:{} ", entry.external_address, entry.api_port)));
        assert!(script.contains(&format!("--scale_id {} ", entry.role.tier_id())));
    }

    assert_eq!(manifest.entry("node_5").unwrap().role, Role::Scale(5));
    assert_eq!(manifest.entry("node_6").unwrap().role, Role::Side);

    Ok(())
}

#[tokio::test]
async fn test_runs_are_deterministic() -> Result<()> {
    let ctx = TestContext::new(3, 9)?;
    ctx.config("first")?.run(false).await?;
    ctx.config("second")?.run(false).await?;

    let first = list_files(&ctx.out("first"));
    let second = list_files(&ctx.out("second"));
    assert_eq!(first, second);

    for rel in first.iter().filter(|p| !p.ends_with(PLAN_VERSION_FILENAME)) {
        assert_eq!(
            std::fs::read(ctx.out("first").join(rel))?,
            std::fs::read(ctx.out("second").join(rel))?,
            "{} differs between runs",
            rel.display()
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_rerun_detects_unchanged_plan() -> Result<()> {
    let ctx = TestContext::new(2, 4)?;
    let config = ctx.config("out")?;

    let first = config.run(false).await?;
    assert!(!first.unchanged());

    let second = config.run(false).await?;
    assert!(second.unchanged());
    assert_eq!(
        second.previous.map(|v| v.plan_hash),
        first.written.map(|w| w.version.plan_hash)
    );

    Ok(())
}

#[tokio::test]
async fn test_empty_host_pool_writes_nothing() -> Result<()> {
    let ctx = TestContext::new(1, 3)?;
    std::fs::write(ctx.root().join("instances.txt"), "# no hosts yet\n")?;

    let err = ctx.config("out")?.run(false).await.unwrap_err();
    assert!(plan_error(&err).is_configuration());
    assert!(list_files(&ctx.out("out")).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_dangling_edge_writes_nothing() -> Result<()> {
    let ctx = TestContext::new(2, 2)?;
    std::fs::write(
        ctx.root().join("topo.json"),
        r#"{"nodes": ["node_1", "node_2"], "connections": [{"from": "node_1", "to": "node_3"}]}"#,
    )?;

    let err = ctx.config("out")?.run(false).await.unwrap_err();
    let plan_err = plan_error(&err);
    assert!(plan_err.is_configuration());
    assert!(plan_err.to_string().contains("node_3"));
    assert!(list_files(&ctx.out("out")).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unusable_node_names_write_nothing() -> Result<()> {
    let ctx = TestContext::new(2, 2)?;

    for name in ["node,1", "../../../../escaped_1"] {
        std::fs::write(
            ctx.root().join("topo.json"),
            serde_json::to_string(&serde_json::json!({
                "nodes": [name, "node_2"],
                "connections": [{"from": name, "to": "node_2"}],
            }))?,
        )?;

        let err = ctx.config("out")?.run(false).await.unwrap_err();
        let plan_err = plan_error(&err);
        assert!(plan_err.is_configuration(), "{} accepted", name);
        assert!(plan_err.to_string().contains("topology.nodes"));
        assert!(!ctx.out("out").exists());
        assert!(!ctx.root().join("escaped_1.sh").exists());
    }

    Ok(())
}

#[tokio::test]
async fn test_missing_keyfile_is_resource_error() -> Result<()> {
    let ctx = TestContext::new(2, 4)?;
    std::fs::remove_file(ctx.root().join("keyfile/node3"))?;

    let err = ctx.config("out")?.run(false).await.unwrap_err();
    let plan_err = plan_error(&err);
    assert!(plan_err.is_resource());
    assert!(plan_err.to_string().contains("node_3"));
    assert!(list_files(&ctx.out("out")).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> Result<()> {
    let ctx = TestContext::new(2, 4)?;
    let outcome = ctx.config("out")?.run(true).await?;

    assert_eq!(outcome.plan.nodes.len(), 4);
    assert!(outcome.written.is_none());
    assert!(!ctx.out("out").exists());

    Ok(())
}

#[tokio::test]
async fn test_archive_bundles_each_host() -> Result<()> {
    let ctx = TestContext::new(3, 4)?;
    let config = ctx.builder("out").archive(true).build()?;
    let outcome = config.run(false).await?;

    let out = &config.out_dir;
    assert_eq!(
        outcome.archives,
        vec![
            out.join("payload/10.0.0.1.tar.gz"),
            out.join("payload/10.0.0.2.tar.gz"),
            out.join("payload/10.0.0.3.tar.gz"),
        ]
    );
    for archive in &outcome.archives {
        assert!(archive.is_file());
    }
    assert!(out.join(MANIFEST_FILENAME).is_file());
    let leftovers: Vec<_> = std::fs::read_dir(out.join("payload"))?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());

    Ok(())
}

#[test]
fn test_load_hosts_reports_line() -> Result<()> {
    let dir = TempDir::new("scalenet-it")?;
    let path = dir.path().join("instances.txt");
    std::fs::write(&path, "10.0.0.1,54.0.0.1\n\n10.0.0.2\n")?;

    let err = scalenet_deploy::load_hosts(&path).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains(":3:"));

    Ok(())
}
