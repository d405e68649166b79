//! The single seam between the orchestrator and the control plane.
//!
//! Every component talks to the cluster through [`ClusterClient`]; the
//! production implementation is [`KubeCluster`], tests use an in-memory fake.

mod kube_cluster;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use kube_cluster::{parse_documents, KubeCluster};

use crate::catalog::{DeploymentTarget, Manifest};
use crate::error::ClusterError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// ClusterClient
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Reports the API server version; doubles as a reachability check.
    async fn server_version(&self) -> Result<String, ClusterError>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError>;

    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    /// Create-or-update every object in the manifest. Returns the number of
    /// objects submitted.
    async fn apply(&self, manifest: &Manifest) -> Result<usize, ClusterError>;

    /// Delete every object in the manifest if it exists.
    async fn delete(&self, manifest: &Manifest) -> Result<DeleteOutcome, ClusterError>;

    async fn readiness(&self, target: &DeploymentTarget) -> Result<Readiness, ClusterError>;

    async fn diagnose(&self, target: &DeploymentTarget) -> Result<Diagnostics, ClusterError>;

    async fn pods(&self, namespace: &str) -> Result<Vec<PodSummary>, ClusterError>;

    async fn services(&self, namespace: &str) -> Result<Vec<ServiceSummary>, ClusterError>;

    async fn routes(&self, namespace: &str) -> Result<Vec<RouteSummary>, ClusterError>;

    async fn autoscalers(&self, namespace: &str) -> Result<Vec<AutoscalerSummary>, ClusterError>;

    async fn application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ApplicationState>, ClusterError>;
}

// ---------------------------------------------------------------------------
// DeleteOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete; every object was already gone.
    Absent,
}

// ---------------------------------------------------------------------------
// Readiness / Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub available: bool,
    pub detail: String,
}

impl Readiness {
    pub fn ready(detail: impl Into<String>) -> Self {
        Self {
            available: true,
            detail: detail.into(),
        }
    }

    pub fn pending(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            detail: detail.into(),
        }
    }
}

/// Snapshot attached to a readiness timeout for the operator to read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub summary: String,
    pub conditions: Vec<String>,
    pub pods: Vec<PodSummary>,
}

impl Diagnostics {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            summary: format!("diagnostics unavailable: {}", reason.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  status: {}", self.summary)?;
        for condition in &self.conditions {
            write!(f, "\n  condition: {condition}")?;
        }
        if self.pods.is_empty() {
            write!(f, "\n  pods: none matched")?;
        }
        for pod in &self.pods {
            write!(
                f,
                "\n  pod {}: {} (ready {}, restarts {})",
                pod.name, pod.phase, pod.ready, pod.restarts
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodSummary {
    pub name: String,
    pub phase: String,
    /// Ready containers over total, e.g. `1/2`.
    pub ready: String,
    pub restarts: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub service_type: String,
    pub cluster_ip: String,
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub kind: String,
    pub name: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoscalerSummary {
    pub name: String,
    pub target: String,
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub current_replicas: i32,
    pub desired_replicas: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationState {
    pub name: String,
    pub sync: String,
    pub health: String,
}
