use crate::output::{print_json, print_table};
use anyhow::Result;
use rollout_core::catalog::Catalog;
use rollout_core::cluster::KubeCluster;
use rollout_core::config::Config;
use rollout_core::teardown::{teardown, TeardownOutcome, TeardownReport};
use std::path::Path;

/// Tear the stack down in reverse wave order.
///
/// Absent objects are warnings. Failed deletes, including every manifest when
/// the cluster cannot be reached, are reported as errors but only change the
/// exit status under `--strict`.
pub fn run(root: &Path, config: &Config, strict: bool, json: bool) -> Result<()> {
    let catalog = Catalog::standard(&config.namespace);
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        match KubeCluster::connect(config, config.manifest_root(root)).await {
            Ok(client) => teardown(&client, &catalog).await,
            Err(e) => TeardownReport::unreachable(&catalog, &format!("cannot reach cluster: {e}")),
        }
    });

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    let failed = report.failures().count();
    if strict && failed > 0 {
        anyhow::bail!("{failed} manifest(s) could not be deleted");
    }
    Ok(())
}

fn print_report(report: &TeardownReport) {
    let rows = report
        .entries
        .iter()
        .map(|e| {
            let outcome = match &e.outcome {
                TeardownOutcome::Deleted => "deleted",
                TeardownOutcome::Absent => "absent",
                TeardownOutcome::Failed(_) => "FAILED",
            };
            vec![e.wave.to_string(), e.manifest.clone(), outcome.to_string()]
        })
        .collect();
    print_table(&["WAVE", "MANIFEST", "OUTCOME"], rows);

    for entry in report.warnings() {
        eprintln!("warning: '{}' was already absent", entry.manifest);
    }
    for entry in report.failures() {
        if let TeardownOutcome::Failed(reason) = &entry.outcome {
            eprintln!("error: failed to delete '{}': {reason}", entry.manifest);
        }
    }

    let deleted = report
        .entries
        .iter()
        .filter(|e| e.outcome == TeardownOutcome::Deleted)
        .count();
    println!(
        "\nDeleted {deleted}, already absent {}, failed {}.",
        report.warnings().count(),
        report.failures().count()
    );
}
