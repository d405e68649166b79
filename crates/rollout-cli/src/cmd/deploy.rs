use crate::output::{print_json, print_table};
use anyhow::Result;
use rollout_core::catalog::{Catalog, Wave};
use rollout_core::cluster::{ClusterClient, KubeCluster};
use rollout_core::config::Config;
use rollout_core::deploy::{apply_waves, DeployReport, RunState};
use rollout_core::error::{DeployError, PrereqError, PrereqKind};
use rollout_core::prereq::check_prerequisites;
use rollout_core::readiness::ReadinessWaiter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(root: &Path, config: &Config, dry_run: bool, json: bool) -> Result<()> {
    let catalog = Catalog::standard(&config.namespace);
    let manifest_root = config.manifest_root(root);

    if dry_run {
        return print_plan(config, &catalog, &manifest_root, json);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let mut state = RunState::new(config);
    let result = rt.block_on(async {
        match KubeCluster::connect(config, manifest_root.clone()).await {
            Ok(client) => execute(&client, config, &catalog, &manifest_root, &mut state).await,
            Err(e) => {
                let err = PrereqError::new(PrereqKind::ClientUnreachable, e.to_string());
                Err(state.fail(err.into()))
            }
        }
    });

    finish(&state, result, json)
}

/// Prerequisite check, then every wave in order.
async fn execute(
    client: &dyn ClusterClient,
    config: &Config,
    catalog: &Catalog,
    manifest_root: &Path,
    state: &mut RunState,
) -> Result<DeployReport, DeployError> {
    info!(namespace = %config.namespace, "starting deploy");

    if let Err(e) = check_prerequisites(client, config, catalog, manifest_root).await {
        return Err(state.fail(e.into()));
    }

    let waiter = ReadinessWaiter::new(client, &config.readiness);
    info!(
        timeout_secs = waiter.timeout().as_secs(),
        "prerequisites satisfied"
    );
    apply_waves(client, catalog, &waiter, state).await
}

/// Print the outcome and turn a failed run into the command's error.
fn finish(state: &RunState, result: Result<DeployReport, DeployError>, json: bool) -> Result<()> {
    if json {
        print_json(&DeployOutcome {
            state,
            report: result.as_ref().ok(),
        })?;
    }

    let report = result?;
    if !json {
        print_report(&report);
    }
    Ok(())
}

#[derive(Serialize)]
struct DeployOutcome<'a> {
    state: &'a RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a DeployReport>,
}

fn print_report(report: &DeployReport) {
    let rows = report
        .waves
        .iter()
        .map(|w| {
            vec![
                w.number.to_string(),
                w.applied.join(", "),
                if w.ready.is_empty() {
                    "-".to_string()
                } else {
                    w.ready.join(", ")
                },
            ]
        })
        .collect();
    print_table(&["WAVE", "APPLIED", "READY"], rows);
    println!(
        "\nApplied {} manifest(s) across {} wave(s).",
        report.applied_count(),
        report.waves.len()
    );
}

// ---------------------------------------------------------------------------
// dry run
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Plan<'a> {
    namespace: &'a str,
    manifest_root: &'a Path,
    timeout_seconds: u64,
    waves: Vec<Wave<'a>>,
    missing: Vec<PathBuf>,
}

fn print_plan(config: &Config, catalog: &Catalog, manifest_root: &Path, json: bool) -> Result<()> {
    let plan = Plan {
        namespace: &config.namespace,
        manifest_root,
        timeout_seconds: config.readiness.timeout_seconds,
        waves: catalog.waves(),
        missing: catalog.missing_files(manifest_root),
    };

    if json {
        return print_json(&plan);
    }

    println!(
        "Deploy plan for namespace '{}' from {}\n",
        plan.namespace,
        manifest_root.display()
    );

    let mut rows = Vec::new();
    for wave in &plan.waves {
        for manifest in &wave.manifests {
            let mut file = manifest.path.display().to_string();
            if plan.missing.contains(&manifest_root.join(&manifest.path)) {
                file.push_str(" (missing)");
            }
            let gate = manifest
                .target
                .as_ref()
                .map(|t| format!("wait for {t}"))
                .unwrap_or_default();
            rows.push(vec![
                wave.number.to_string(),
                manifest.id.clone(),
                file,
                gate,
            ]);
        }
    }
    print_table(&["WAVE", "MANIFEST", "FILE", "GATE"], rows);

    println!(
        "\nEach gate waits up to {}s, polling every {}s.",
        config.readiness.timeout_seconds, config.readiness.poll_interval_seconds
    );
    if !plan.missing.is_empty() {
        println!(
            "{} manifest file(s) missing; a real deploy would stop at the prerequisite check.",
            plan.missing.len()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
