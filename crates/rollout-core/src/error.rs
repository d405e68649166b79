use crate::cluster::Diagnostics;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ClusterError — anything the control plane (or reading a manifest) rejects
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("failed to connect to cluster: {0}")]
    Connect(String),

    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid object in {path}: {reason}")]
    InvalidObject { path: PathBuf, reason: String },

    #[error("request failed: {0}")]
    Request(String),
}

impl ClusterError {
    /// True when the object (or its whole kind) does not exist on the cluster.
    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            ClusterError::Kube(kube::Error::Discovery(_)) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// PrereqError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrereqKind {
    ClientUnreachable,
    MeshNamespaceMissing,
    MeshGatewayMissing,
    GitOpsNamespaceMissing,
    GitOpsServerMissing,
    ManifestMissing,
}

impl fmt::Display for PrereqKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrereqKind::ClientUnreachable => "cluster API unreachable",
            PrereqKind::MeshNamespaceMissing => "service mesh namespace missing",
            PrereqKind::MeshGatewayMissing => "service mesh ingress gateway missing",
            PrereqKind::GitOpsNamespaceMissing => "GitOps controller namespace missing",
            PrereqKind::GitOpsServerMissing => "GitOps server missing",
            PrereqKind::ManifestMissing => "manifest file missing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("prerequisite failed ({kind}): {detail}")]
pub struct PrereqError {
    pub kind: PrereqKind,
    pub detail: String,
}

impl PrereqError {
    pub fn new(kind: PrereqKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApplyError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("wave {wave}: failed to apply '{manifest}'")]
pub struct ApplyError {
    pub manifest: String,
    pub wave: u32,
    #[source]
    pub source: ClusterError,
}

// ---------------------------------------------------------------------------
// ReadinessError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("{target} did not become available within {secs}s\n{diagnostics}", secs = .waited.as_secs())]
pub struct ReadinessError {
    pub target: String,
    pub waited: Duration,
    pub diagnostics: Diagnostics,
}

// ---------------------------------------------------------------------------
// DeployError — everything that aborts a deploy run
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Prereq(#[from] PrereqError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Readiness(#[from] ReadinessError),
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
