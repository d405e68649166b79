use crate::catalog::Catalog;
use crate::cluster::{ClusterClient, DeleteOutcome};
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// TeardownOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TeardownOutcome {
    Deleted,
    /// Already gone. Expected on re-runs; reported as a warning.
    Absent,
    /// The request itself failed (permissions, connectivity, bad manifest).
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownEntry {
    pub manifest: String,
    pub wave: u32,
    #[serde(flatten)]
    pub outcome: TeardownOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub entries: Vec<TeardownEntry>,
}

impl TeardownReport {
    pub fn warnings(&self) -> impl Iterator<Item = &TeardownEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome == TeardownOutcome::Absent)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TeardownEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, TeardownOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Report for a run that never got a client: every manifest failed for
    /// the same reason, listed in teardown order.
    pub fn unreachable(catalog: &Catalog, reason: &str) -> Self {
        let entries = catalog
            .teardown_order()
            .into_iter()
            .map(|m| TeardownEntry {
                manifest: m.id.clone(),
                wave: m.wave,
                outcome: TeardownOutcome::Failed(reason.to_string()),
            })
            .collect();
        Self { entries }
    }
}

// ---------------------------------------------------------------------------
// teardown
// ---------------------------------------------------------------------------

/// Delete the catalog in exact reverse apply order: GitOps objects first,
/// the namespace (wave 0) last.
///
/// Never aborts. Each manifest gets an outcome; "already absent" and
/// "request failed" are kept apart so callers can decide how strict to be.
pub async fn teardown(client: &dyn ClusterClient, catalog: &Catalog) -> TeardownReport {
    let mut report = TeardownReport::default();

    for manifest in catalog.teardown_order() {
        let outcome = match client.delete(manifest).await {
            Ok(DeleteOutcome::Deleted) => {
                info!(wave = manifest.wave, manifest = %manifest.id, "deleted");
                TeardownOutcome::Deleted
            }
            Ok(DeleteOutcome::Absent) => {
                info!(wave = manifest.wave, manifest = %manifest.id, "already absent");
                TeardownOutcome::Absent
            }
            Err(e) if e.is_not_found() => {
                info!(wave = manifest.wave, manifest = %manifest.id, "already absent");
                TeardownOutcome::Absent
            }
            Err(e) => {
                warn!(wave = manifest.wave, manifest = %manifest.id, error = %e, "delete failed");
                TeardownOutcome::Failed(format!("{e:#}"))
            }
        };
        report.entries.push(TeardownEntry {
            manifest: manifest.id.clone(),
            wave: manifest.wave,
            outcome,
        });
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
