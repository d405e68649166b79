//! In-memory cluster for tests. Built with `cfg(test)` or the `test-utils`
//! feature.

use super::{
    ApplicationState, AutoscalerSummary, ClusterClient, DeleteOutcome, Diagnostics, PodSummary,
    Readiness, RouteSummary, ServiceSummary,
};
use crate::catalog::{DeploymentTarget, Manifest};
use crate::error::ClusterError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct FakeState {
    reachable: bool,
    namespaces: HashSet<String>,
    workloads: HashSet<(String, String)>,
    /// Manifest ids whose objects currently exist.
    existing: HashSet<String>,
    /// Ordered log: `apply:<id>`, `ready:<target>`, `delete:<id>`.
    events: Vec<String>,
    fail_apply: HashSet<String>,
    fail_delete: HashSet<String>,
    ready_after: HashMap<String, usize>,
    never_ready: HashSet<String>,
    polls: HashMap<String, usize>,
    pods: HashMap<String, Vec<PodSummary>>,
    status_broken: bool,
    application: Option<ApplicationState>,
    readiness_delay: Option<Duration>,
    diagnose_delay: Option<Duration>,
}

pub struct FakeCluster {
    state: Mutex<FakeState>,
}

impl FakeCluster {
    /// A reachable cluster with the mesh and GitOps controllers installed.
    pub fn healthy() -> Self {
        let mut state = FakeState {
            reachable: true,
            ..Default::default()
        };
        for ns in ["istio-system", "argocd"] {
            state.namespaces.insert(ns.to_string());
        }
        state
            .workloads
            .insert(("istio-system".to_string(), "istio-ingressgateway".to_string()));
        state
            .workloads
            .insert(("argocd".to_string(), "argocd-server".to_string()));
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn unreachable(self) -> Self {
        self.lock().reachable = false;
        self
    }

    pub fn without_namespace(self, name: &str) -> Self {
        self.lock().namespaces.remove(name);
        self
    }

    pub fn without_workload(self, namespace: &str, name: &str) -> Self {
        self.lock()
            .workloads
            .remove(&(namespace.to_string(), name.to_string()));
        self
    }

    pub fn failing_apply(self, id: &str) -> Self {
        self.lock().fail_apply.insert(id.to_string());
        self
    }

    pub fn failing_delete(self, id: &str) -> Self {
        self.lock().fail_delete.insert(id.to_string());
        self
    }

    /// Target reports available from its `polls + 1`-th readiness query on.
    pub fn ready_after(self, target: &str, polls: usize) -> Self {
        self.lock().ready_after.insert(target.to_string(), polls);
        self
    }

    pub fn never_ready(self, target: &str) -> Self {
        self.lock().never_ready.insert(target.to_string());
        self
    }

    /// Every readiness query takes `delay` before answering.
    pub fn slow_readiness(self, delay: Duration) -> Self {
        self.lock().readiness_delay = Some(delay);
        self
    }

    pub fn slow_diagnose(self, delay: Duration) -> Self {
        self.lock().diagnose_delay = Some(delay);
        self
    }

    pub fn with_existing(self, ids: &[&str]) -> Self {
        self.lock()
            .existing
            .extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_pods(self, namespace: &str, pods: Vec<PodSummary>) -> Self {
        self.lock().pods.insert(namespace.to_string(), pods);
        self
    }

    pub fn with_application(self, app: ApplicationState) -> Self {
        self.lock().application = Some(app);
        self
    }

    pub fn with_broken_status_queries(self) -> Self {
        self.lock().status_broken = true;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    /// Manifest ids in the order they were applied.
    pub fn applied(&self) -> Vec<String> {
        self.events_with("apply:")
    }

    /// Manifest ids in the order deletes were attempted.
    pub fn deleted(&self) -> Vec<String> {
        self.events_with("delete:")
    }

    pub fn polls(&self, target: &str) -> usize {
        self.lock().polls.get(target).copied().unwrap_or(0)
    }

    fn events_with(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    fn check_reachable(&self) -> Result<(), ClusterError> {
        if self.lock().reachable {
            Ok(())
        } else {
            Err(ClusterError::Request("connection refused".to_string()))
        }
    }

    fn check_status(&self) -> Result<(), ClusterError> {
        self.check_reachable()?;
        if self.lock().status_broken {
            return Err(ClusterError::Request(
                "the server is currently unable to handle the request".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn server_version(&self) -> Result<String, ClusterError> {
        self.check_reachable()?;
        Ok("v1.32.0".to_string())
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.check_reachable()?;
        Ok(self.lock().namespaces.contains(name))
    }

    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.check_reachable()?;
        Ok(self
            .lock()
            .workloads
            .contains(&(namespace.to_string(), name.to_string())))
    }

    async fn apply(&self, manifest: &Manifest) -> Result<usize, ClusterError> {
        self.check_reachable()?;
        let mut state = self.lock();
        if state.fail_apply.contains(&manifest.id) {
            return Err(ClusterError::Request(format!(
                "admission webhook denied {}",
                manifest.id
            )));
        }
        state.events.push(format!("apply:{}", manifest.id));
        state.existing.insert(manifest.id.clone());
        Ok(1)
    }

    async fn delete(&self, manifest: &Manifest) -> Result<DeleteOutcome, ClusterError> {
        self.check_reachable()?;
        let mut state = self.lock();
        state.events.push(format!("delete:{}", manifest.id));
        if state.fail_delete.contains(&manifest.id) {
            return Err(ClusterError::Request(format!(
                "forbidden: cannot delete {}",
                manifest.id
            )));
        }
        if state.existing.remove(&manifest.id) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::Absent)
        }
    }

    async fn readiness(&self, target: &DeploymentTarget) -> Result<Readiness, ClusterError> {
        self.check_reachable()?;
        let delay = self.lock().readiness_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        let polls = {
            let count = state.polls.entry(target.name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if state.never_ready.contains(&target.name) {
            return Ok(Readiness::pending("0/1 replicas available"));
        }
        let needed = state.ready_after.get(&target.name).copied().unwrap_or(0);
        if polls > needed {
            state.events.push(format!("ready:{}", target.name));
            Ok(Readiness::ready("1/1 replicas available"))
        } else {
            Ok(Readiness::pending("0/1 replicas available"))
        }
    }

    async fn diagnose(&self, target: &DeploymentTarget) -> Result<Diagnostics, ClusterError> {
        self.check_reachable()?;
        let delay = self.lock().diagnose_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Diagnostics {
            summary: "replicas desired 1, updated 1, ready 0, available 0".to_string(),
            conditions: vec!["Available=False (MinimumReplicasUnavailable)".to_string()],
            pods: vec![PodSummary {
                name: format!("{}-0", target.name),
                phase: "Pending".to_string(),
                ready: "0/1".to_string(),
                restarts: 0,
            }],
        })
    }

    async fn pods(&self, namespace: &str) -> Result<Vec<PodSummary>, ClusterError> {
        self.check_status()?;
        Ok(self.lock().pods.get(namespace).cloned().unwrap_or_default())
    }

    async fn services(&self, _namespace: &str) -> Result<Vec<ServiceSummary>, ClusterError> {
        self.check_status()?;
        Ok(Vec::new())
    }

    async fn routes(&self, _namespace: &str) -> Result<Vec<RouteSummary>, ClusterError> {
        self.check_status()?;
        Ok(Vec::new())
    }

    async fn autoscalers(&self, _namespace: &str) -> Result<Vec<AutoscalerSummary>, ClusterError> {
        self.check_status()?;
        Ok(Vec::new())
    }

    async fn application(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<ApplicationState>, ClusterError> {
        self.check_status()?;
        Ok(self.lock().application.clone())
    }
}
