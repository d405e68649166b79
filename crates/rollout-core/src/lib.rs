//! `rollout-core` — dependency-ordered rollout of the platform manifests.
//!
//! ```text
//! Catalog ──► check_prerequisites ──► apply_waves ──► ReadinessWaiter
//!    │                                     (wave N ready before N+1)
//!    └──────► teardown (reverse order)
//! status::report  (read-only)
//! ```
//!
//! All cluster access goes through [`cluster::ClusterClient`].

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod deploy;
pub mod error;
pub mod prereq;
pub mod readiness;
pub mod status;
pub mod teardown;

pub use error::{ApplyError, ClusterError, DeployError, PrereqError, ReadinessError};
