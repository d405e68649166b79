use crate::cluster::{
    ApplicationState, AutoscalerSummary, ClusterClient, PodSummary, RouteSummary, ServiceSummary,
};
use crate::config::Config;
use crate::error::ClusterError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Read-only view of the stack. Sections that could not be read are left
/// empty and explained in `notes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub captured_at: DateTime<Utc>,
    pub namespace: String,
    pub argo_namespace: String,
    pub pods: Vec<PodSummary>,
    pub services: Vec<ServiceSummary>,
    pub routes: Vec<RouteSummary>,
    pub autoscalers: Vec<AutoscalerSummary>,
    pub application: Option<ApplicationState>,
    pub notes: Vec<String>,
}

impl StatusSnapshot {
    pub fn empty(config: &Config) -> Self {
        Self {
            captured_at: Utc::now(),
            namespace: config.namespace.clone(),
            argo_namespace: config.gitops.namespace.clone(),
            pods: Vec::new(),
            services: Vec::new(),
            routes: Vec::new(),
            autoscalers: Vec::new(),
            application: None,
            notes: Vec::new(),
        }
    }

    /// Snapshot for a cluster that could not be reached at all.
    pub fn unreachable(config: &Config, reason: impl Into<String>) -> Self {
        let mut snapshot = Self::empty(config);
        snapshot.notes.push(reason.into());
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
            && self.services.is_empty()
            && self.routes.is_empty()
            && self.autoscalers.is_empty()
            && self.application.is_none()
    }
}

/// Gather the snapshot. Never fails: a missing namespace or kind yields an
/// empty section, any other error becomes a note.
pub async fn report(client: &dyn ClusterClient, config: &Config) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot::empty(config);
    let namespace = config.namespace.as_str();

    snapshot.pods = section(&mut snapshot.notes, "pods", client.pods(namespace).await);
    snapshot.services = section(
        &mut snapshot.notes,
        "services",
        client.services(namespace).await,
    );
    snapshot.routes = section(
        &mut snapshot.notes,
        "mesh routes",
        client.routes(namespace).await,
    );
    snapshot.autoscalers = section(
        &mut snapshot.notes,
        "autoscalers",
        client.autoscalers(namespace).await,
    );
    snapshot.application = section(
        &mut snapshot.notes,
        "gitops application",
        client
            .application(&config.gitops.namespace, &config.gitops.application)
            .await,
    );

    snapshot
}

fn section<T: Default>(notes: &mut Vec<String>, what: &str, result: Result<T, ClusterError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) if e.is_not_found() => {
            debug!(section = what, "not found");
            T::default()
        }
        Err(e) => {
            debug!(section = what, error = %e, "query failed");
            notes.push(format!("{what}: {e}"));
            T::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
