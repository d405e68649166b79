use crate::output::{print_json, print_section};
use anyhow::Result;
use rollout_core::cluster::KubeCluster;
use rollout_core::config::Config;
use rollout_core::status::{report, StatusSnapshot};
use std::path::Path;

/// Print a read-only view of the stack. Succeeds even when the cluster
/// cannot be reached; the reason is shown as a note.
pub fn run(root: &Path, config: &Config, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let snapshot = rt.block_on(async {
        match KubeCluster::connect(config, config.manifest_root(root)).await {
            Ok(client) => report(&client, config).await,
            Err(e) => StatusSnapshot::unreachable(config, e.to_string()),
        }
    });

    emit(&snapshot, json)
}

/// Report for a configuration that could not be loaded or validated: the
/// cluster is not queried and the reason becomes the only note.
pub fn run_unconfigured(config: &Config, reason: &str, json: bool) -> Result<()> {
    let snapshot = StatusSnapshot::unreachable(config, format!("configuration unusable: {reason}"));
    emit(&snapshot, json)
}

fn emit(snapshot: &StatusSnapshot, json: bool) -> Result<()> {
    if json {
        return print_json(snapshot);
    }
    print_snapshot(snapshot);
    Ok(())
}

fn print_snapshot(s: &StatusSnapshot) {
    println!(
        "Namespace: {}    GitOps: {}    ({})\n",
        s.namespace,
        s.argo_namespace,
        s.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    print_section(
        "Pods",
        &["NAME", "PHASE", "READY", "RESTARTS"],
        s.pods
            .iter()
            .map(|p| {
                vec![
                    p.name.clone(),
                    p.phase.clone(),
                    p.ready.clone(),
                    p.restarts.to_string(),
                ]
            })
            .collect(),
    );

    print_section(
        "Services",
        &["NAME", "TYPE", "CLUSTER-IP", "PORTS"],
        s.services
            .iter()
            .map(|svc| {
                vec![
                    svc.name.clone(),
                    svc.service_type.clone(),
                    svc.cluster_ip.clone(),
                    svc.ports.join(","),
                ]
            })
            .collect(),
    );

    print_section(
        "Mesh routes",
        &["KIND", "NAME", "HOSTS"],
        s.routes
            .iter()
            .map(|r| vec![r.kind.clone(), r.name.clone(), r.hosts.join(",")])
            .collect(),
    );

    print_section(
        "Autoscalers",
        &["NAME", "TARGET", "MIN", "MAX", "CURRENT", "DESIRED"],
        s.autoscalers
            .iter()
            .map(|a| {
                vec![
                    a.name.clone(),
                    a.target.clone(),
                    a.min_replicas.to_string(),
                    a.max_replicas.to_string(),
                    a.current_replicas.to_string(),
                    a.desired_replicas.to_string(),
                ]
            })
            .collect(),
    );

    print_section(
        "GitOps application",
        &["NAME", "SYNC", "HEALTH"],
        s.application
            .iter()
            .map(|a| vec![a.name.clone(), a.sync.clone(), a.health.clone()])
            .collect(),
    );

    if !s.notes.is_empty() {
        println!("Notes");
        for note in &s.notes {
            println!("  {note}");
        }
    }
}
