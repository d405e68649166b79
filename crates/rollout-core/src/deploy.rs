use crate::catalog::Catalog;
use crate::cluster::ClusterClient;
use crate::config::Config;
use crate::error::{ApplyError, DeployError};
use crate::readiness::ReadinessWaiter;
use serde::Serialize;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Progress of one invocation. Lives for a single run and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub namespace: String,
    pub argo_namespace: String,
    pub current_wave: Option<u32>,
    pub last_error: Option<String>,
}

impl RunState {
    pub fn new(config: &Config) -> Self {
        Self {
            namespace: config.namespace.clone(),
            argo_namespace: config.gitops.namespace.clone(),
            current_wave: None,
            last_error: None,
        }
    }

    /// Record `err` as the run's last error and hand it back.
    pub fn fail(&mut self, err: DeployError) -> DeployError {
        self.last_error = Some(format!("{err:#}"));
        err
    }
}

// ---------------------------------------------------------------------------
// DeployReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaveReport {
    pub number: u32,
    pub applied: Vec<String>,
    pub ready: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeployReport {
    pub waves: Vec<WaveReport>,
}

impl DeployReport {
    pub fn applied_count(&self) -> usize {
        self.waves.iter().map(|w| w.applied.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// apply_waves
// ---------------------------------------------------------------------------

/// Submit the catalog wave by wave.
///
/// Within a wave manifests are applied in declaration order; once all are
/// submitted, every readiness target in the wave must report available
/// before the next wave starts. The first failure stops the run. Waves that
/// already went out stay applied.
pub async fn apply_waves(
    client: &dyn ClusterClient,
    catalog: &Catalog,
    waiter: &ReadinessWaiter<'_>,
    state: &mut RunState,
) -> Result<DeployReport, DeployError> {
    let mut report = DeployReport::default();

    for wave in catalog.waves() {
        state.current_wave = Some(wave.number);
        info!(wave = wave.number, manifests = wave.manifests.len(), "applying wave");
        let mut wave_report = WaveReport {
            number: wave.number,
            ..Default::default()
        };

        for manifest in &wave.manifests {
            match client.apply(manifest).await {
                Ok(objects) => {
                    info!(wave = wave.number, manifest = %manifest.id, objects, "applied");
                    wave_report.applied.push(manifest.id.clone());
                }
                Err(source) => {
                    error!(wave = wave.number, manifest = %manifest.id, error = %source, "apply rejected");
                    let err = ApplyError {
                        manifest: manifest.id.clone(),
                        wave: wave.number,
                        source,
                    };
                    return Err(state.fail(err.into()));
                }
            }
        }

        for target in wave.targets() {
            if let Err(err) = waiter.await_ready(target).await {
                return Err(state.fail(err.into()));
            }
            wave_report.ready.push(target.name.clone());
        }

        report.waves.push(wave_report);
    }

    info!(applied = report.applied_count(), "all waves applied");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
