use super::{
    ApplicationState, AutoscalerSummary, ClusterClient, DeleteOutcome, Diagnostics, PodSummary,
    Readiness, RouteSummary, ServiceSummary,
};
use crate::catalog::{DeploymentTarget, Manifest};
use crate::config::Config;
use crate::error::ClusterError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::discovery::{self, Scope};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MESH_GROUP: &str = "networking.istio.io";
const MESH_VERSION: &str = "v1beta1";
const ROUTE_KINDS: [&str; 2] = ["VirtualService", "DestinationRule"];

// ---------------------------------------------------------------------------
// KubeCluster
// ---------------------------------------------------------------------------

/// [`ClusterClient`] backed by the Kubernetes API.
pub struct KubeCluster {
    client: Client,
    manifest_root: PathBuf,
    namespace: String,
    field_manager: String,
}

impl KubeCluster {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn connect(config: &Config, manifest_root: PathBuf) -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Connect(e.to_string()))?;
        Ok(Self::new(client, config, manifest_root))
    }

    pub fn new(client: Client, config: &Config, manifest_root: PathBuf) -> Self {
        Self {
            client,
            manifest_root,
            namespace: config.namespace.clone(),
            field_manager: config.field_manager.clone(),
        }
    }

    fn load(&self, manifest: &Manifest) -> Result<(PathBuf, Vec<DynamicObject>), ClusterError> {
        let path = self.manifest_root.join(&manifest.path);
        let text = std::fs::read_to_string(&path).map_err(|source| ClusterError::Read {
            path: path.clone(),
            source,
        })?;
        let objects = parse_documents(&path, &text)?;
        Ok((path, objects))
    }

    /// Discover the object's resource and build an API handle scoped the
    /// way the kind requires.
    async fn resolve(
        &self,
        object: &DynamicObject,
        path: &Path,
    ) -> Result<(Api<DynamicObject>, String), ClusterError> {
        let invalid = |reason: String| ClusterError::InvalidObject {
            path: path.to_path_buf(),
            reason,
        };
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| invalid("missing apiVersion or kind".to_string()))?;
        let gvk = GroupVersionKind::try_from(types).map_err(|e| invalid(e.to_string()))?;
        let (resource, caps) = discovery::pinned_kind(&self.client, &gvk).await?;
        let api = match caps.scope {
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
            Scope::Namespaced => {
                let namespace = object
                    .metadata
                    .namespace
                    .as_deref()
                    .unwrap_or(&self.namespace);
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
        };
        Ok((api, object.name_any()))
    }

    async fn delete_object(&self, object: &DynamicObject, path: &Path) -> Result<(), ClusterError> {
        let (api, name) = self.resolve(object, path).await?;
        api.delete(&name, &DeleteParams::background()).await?;
        Ok(())
    }

    fn mesh_api(&self, namespace: &str, kind: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(MESH_GROUP, MESH_VERSION, kind);
        Api::namespaced_with(self.client.clone(), namespace, &ApiResource::from_gvk(&gvk))
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn server_version(&self) -> Result<String, ClusterError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?.is_some())
    }

    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.is_some())
    }

    async fn apply(&self, manifest: &Manifest) -> Result<usize, ClusterError> {
        let (path, objects) = self.load(manifest)?;
        let params = PatchParams::apply(&self.field_manager).force();
        for object in &objects {
            let (api, name) = self.resolve(object, &path).await?;
            debug!(manifest = %manifest.id, object = %name, "server-side apply");
            api.patch(&name, &params, &Patch::Apply(object)).await?;
        }
        Ok(objects.len())
    }

    async fn delete(&self, manifest: &Manifest) -> Result<DeleteOutcome, ClusterError> {
        let (path, objects) = self.load(manifest)?;
        let mut deleted = false;
        let mut first_error = None;

        for object in objects.iter().rev() {
            match self.delete_object(object, &path).await {
                Ok(()) => deleted = true,
                Err(e) if e.is_not_found() => {
                    debug!(manifest = %manifest.id, object = %object.name_any(), "already absent");
                }
                Err(e) => {
                    warn!(manifest = %manifest.id, object = %object.name_any(), error = %e, "delete failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if deleted => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::Absent),
        }
    }

    async fn readiness(&self, target: &DeploymentTarget) -> Result<Readiness, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &target.namespace);
        let readiness = api
            .get_opt(&target.name)
            .await?
            .map(|d| deployment_readiness(&d));
        Ok(readiness.unwrap_or_else(|| Readiness::pending("not found")))
    }

    async fn diagnose(&self, target: &DeploymentTarget) -> Result<Diagnostics, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &target.namespace);
        let found = api.get_opt(&target.name).await?.map(|d| {
            let selector = d.spec.as_ref().and_then(|s| selector_string(&s.selector));
            (deployment_diagnostics(&d), selector)
        });

        let Some((mut diagnostics, selector)) = found else {
            return Ok(Diagnostics {
                summary: format!("{target} not found"),
                ..Default::default()
            });
        };

        if let Some(selector) = selector {
            let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
            let list = pods.list(&ListParams::default().labels(&selector)).await?;
            diagnostics.pods = list.items.iter().map(pod_summary).collect();
        }
        Ok(diagnostics)
    }

    async fn pods(&self, namespace: &str) -> Result<Vec<PodSummary>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(pod_summary).collect())
    }

    async fn services(&self, namespace: &str) -> Result<Vec<ServiceSummary>, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(service_summary).collect())
    }

    async fn routes(&self, namespace: &str) -> Result<Vec<RouteSummary>, ClusterError> {
        let mut rows = Vec::new();
        for kind in ROUTE_KINDS {
            match self.mesh_api(namespace, kind).list(&ListParams::default()).await {
                Ok(list) => rows.extend(list.items.iter().map(|o| route_summary(kind, o))),
                Err(e) => {
                    let e = ClusterError::from(e);
                    if !e.is_not_found() {
                        return Err(e);
                    }
                    debug!(kind, "mesh resource kind not installed");
                }
            }
        }
        Ok(rows)
    }

    async fn autoscalers(&self, namespace: &str) -> Result<Vec<AutoscalerSummary>, ClusterError> {
        let api: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(autoscaler_summary).collect())
    }

    async fn application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ApplicationState>, ClusterError> {
        let gvk = GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application");
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &ApiResource::from_gvk(&gvk));
        match api.get_opt(name).await {
            Ok(app) => Ok(app.as_ref().map(application_state)),
            Err(e) => {
                let e = ClusterError::from(e);
                if e.is_not_found() {
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest documents
// ---------------------------------------------------------------------------

/// Split a multi-document YAML file into objects. Empty documents are
/// skipped; every object must name its apiVersion, kind, and metadata.name.
pub fn parse_documents(path: &Path, text: &str) -> Result<Vec<DynamicObject>, ClusterError> {
    let parse_error = |source| ClusterError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document).map_err(parse_error)?;
        if value.is_null() {
            continue;
        }
        let object: DynamicObject = serde_yaml::from_value(value).map_err(parse_error)?;
        if object.types.is_none() {
            return Err(ClusterError::InvalidObject {
                path: path.to_path_buf(),
                reason: "missing apiVersion or kind".to_string(),
            });
        }
        if object.metadata.name.is_none() {
            return Err(ClusterError::InvalidObject {
                path: path.to_path_buf(),
                reason: "missing metadata.name".to_string(),
            });
        }
        objects.push(object);
    }
    Ok(objects)
}

// ---------------------------------------------------------------------------
// Object summaries
// ---------------------------------------------------------------------------

fn deployment_readiness(deployment: &Deployment) -> Readiness {
    let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let status = deployment.status.as_ref();
    let available_replicas = status.and_then(|s| s.available_replicas).unwrap_or(0);
    let available = status
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|cs| {
            cs.iter()
                .any(|c| c.type_ == "Available" && c.status == "True")
        });
    let detail = format!("{available_replicas}/{desired} replicas available");
    if available {
        Readiness::ready(detail)
    } else {
        Readiness::pending(detail)
    }
}

fn deployment_diagnostics(deployment: &Deployment) -> Diagnostics {
    let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let status = deployment.status.as_ref();
    let summary = format!(
        "replicas desired {desired}, updated {}, ready {}, available {}",
        status.and_then(|s| s.updated_replicas).unwrap_or(0),
        status.and_then(|s| s.ready_replicas).unwrap_or(0),
        status.and_then(|s| s.available_replicas).unwrap_or(0),
    );
    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|cs| {
            cs.iter()
                .map(|c| {
                    describe_condition(
                        &c.type_,
                        &c.status,
                        c.reason.as_deref(),
                        c.message.as_deref(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    Diagnostics {
        summary,
        conditions,
        pods: Vec::new(),
    }
}

fn describe_condition(
    kind: &str,
    status: &str,
    reason: Option<&str>,
    message: Option<&str>,
) -> String {
    let mut line = format!("{kind}={status}");
    if let Some(reason) = reason {
        line.push_str(&format!(" ({reason})"));
    }
    if let Some(message) = message {
        line.push_str(&format!(": {message}"));
    }
    line
}

fn selector_string(selector: &LabelSelector) -> Option<String> {
    let labels = selector.match_labels.as_ref()?;
    if labels.is_empty() {
        return None;
    }
    let pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    Some(pairs.join(","))
}

fn pod_summary(pod: &Pod) -> PodSummary {
    let status = pod.status.as_ref();
    let containers = status.and_then(|s| s.container_statuses.as_ref());
    let total = pod.spec.as_ref().map(|s| s.containers.len()).unwrap_or(0);
    let ready = containers
        .map(|cs| cs.iter().filter(|c| c.ready).count())
        .unwrap_or(0);
    let restarts = containers
        .map(|cs| cs.iter().map(|c| c.restart_count).sum())
        .unwrap_or(0);
    PodSummary {
        name: pod.name_any(),
        phase: status
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        ready: format!("{ready}/{total}"),
        restarts,
    }
}

fn service_summary(service: &Service) -> ServiceSummary {
    let spec = service.spec.as_ref();
    let ports = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| format!("{}/{}", p.port, p.protocol.as_deref().unwrap_or("TCP")))
                .collect()
        })
        .unwrap_or_default();
    ServiceSummary {
        name: service.name_any(),
        service_type: spec
            .and_then(|s| s.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string()),
        cluster_ip: spec
            .and_then(|s| s.cluster_ip.clone())
            .unwrap_or_else(|| "-".to_string()),
        ports,
    }
}

fn route_summary(kind: &str, object: &DynamicObject) -> RouteSummary {
    let spec = &object.data["spec"];
    let hosts = match spec.get("hosts").and_then(|h| h.as_array()) {
        Some(hosts) => hosts
            .iter()
            .filter_map(|h| h.as_str().map(str::to_string))
            .collect(),
        None => spec
            .get("host")
            .and_then(|h| h.as_str())
            .map(|h| vec![h.to_string()])
            .unwrap_or_default(),
    };
    RouteSummary {
        kind: kind.to_string(),
        name: object.name_any(),
        hosts,
    }
}

fn autoscaler_summary(hpa: &HorizontalPodAutoscaler) -> AutoscalerSummary {
    let spec = hpa.spec.as_ref();
    let status = hpa.status.as_ref();
    AutoscalerSummary {
        name: hpa.name_any(),
        target: spec
            .map(|s| format!("{}/{}", s.scale_target_ref.kind, s.scale_target_ref.name))
            .unwrap_or_default(),
        min_replicas: spec.and_then(|s| s.min_replicas).unwrap_or(1),
        max_replicas: spec.map(|s| s.max_replicas).unwrap_or(0),
        current_replicas: status.and_then(|s| s.current_replicas).unwrap_or(0),
        desired_replicas: status.map(|s| s.desired_replicas).unwrap_or(0),
    }
}

fn application_state(app: &DynamicObject) -> ApplicationState {
    let status = &app.data["status"];
    let field = |value: &serde_json::Value| value.as_str().unwrap_or("Unknown").to_string();
    ApplicationState {
        name: app.name_any(),
        sync: field(&status["sync"]["status"]),
        health: field(&status["health"]["status"]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path() -> PathBuf {
        PathBuf::from("k8s/services.yaml")
    }

    #[test]
    fn parse_multi_document_manifest() {
        let text = "\
apiVersion: v1
kind: Service
metadata:
  name: admin-service
spec:
  ports:
    - port: 8080
---
---
# only a comment
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: admin-service
  namespace: university
";
        let objects = parse_documents(&path(), text).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].name_any(), "admin-service");
        assert_eq!(objects[0].types.as_ref().unwrap().kind, "Service");
        assert_eq!(objects[1].metadata.namespace.as_deref(), Some("university"));
        assert_eq!(objects[0].data["spec"]["ports"][0]["port"], 8080);
    }

    #[test]
    fn parse_rejects_object_without_name() {
        let text = "apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n";
        let err = parse_documents(&path(), text).unwrap_err();
        assert!(err.to_string().contains("metadata.name"), "{err}");
    }

    #[test]
    fn parse_rejects_object_without_kind() {
        let text = "metadata:\n  name: orphan\n";
        let err = parse_documents(&path(), text).unwrap_err();
        assert!(err.to_string().contains("apiVersion or kind"), "{err}");
    }

    #[test]
    fn parse_reports_yaml_errors_with_path() {
        let err = parse_documents(&path(), "kind: [unclosed\n").unwrap_err();
        assert!(matches!(err, ClusterError::Parse { .. }));
        assert!(err.to_string().contains("services.yaml"));
    }

    #[test]
    fn deployment_ready_only_when_available_condition_true() {
        let ready: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "postgres"},
            "spec": {"replicas": 1, "selector": {"matchLabels": {"app": "postgres"}}, "template": {}},
            "status": {
                "availableReplicas": 1,
                "conditions": [{"type": "Available", "status": "True"}]
            }
        }))
        .unwrap();
        let readiness = deployment_readiness(&ready);
        assert!(readiness.available);
        assert_eq!(readiness.detail, "1/1 replicas available");

        let pending: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "postgres"},
            "status": {
                "conditions": [
                    {"type": "Progressing", "status": "True"},
                    {"type": "Available", "status": "False", "reason": "MinimumReplicasUnavailable"}
                ]
            }
        }))
        .unwrap();
        assert!(!deployment_readiness(&pending).available);

        let fresh: Deployment =
            serde_json::from_value(json!({"metadata": {"name": "postgres"}})).unwrap();
        assert!(!deployment_readiness(&fresh).available);
    }

    #[test]
    fn deployment_diagnostics_lists_conditions() {
        let deployment: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "api-gateway"},
            "spec": {"replicas": 2, "selector": {}, "template": {}},
            "status": {
                "updatedReplicas": 2,
                "readyReplicas": 0,
                "conditions": [{
                    "type": "Available",
                    "status": "False",
                    "reason": "MinimumReplicasUnavailable",
                    "message": "Deployment does not have minimum availability."
                }]
            }
        }))
        .unwrap();
        let diagnostics = deployment_diagnostics(&deployment);
        assert_eq!(
            diagnostics.summary,
            "replicas desired 2, updated 2, ready 0, available 0"
        );
        assert_eq!(
            diagnostics.conditions,
            vec![
                "Available=False (MinimumReplicasUnavailable): Deployment does not have minimum availability."
                    .to_string()
            ]
        );
    }

    #[test]
    fn selector_joins_match_labels() {
        let selector: LabelSelector =
            serde_json::from_value(json!({"matchLabels": {"app": "gateway", "tier": "edge"}}))
                .unwrap();
        assert_eq!(selector_string(&selector).as_deref(), Some("app=gateway,tier=edge"));
        assert_eq!(selector_string(&LabelSelector::default()), None);
    }

    #[test]
    fn pod_summary_counts_ready_containers_and_restarts() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": {"name": "api-gateway-7d9f"},
            "spec": {"containers": [{"name": "app"}, {"name": "istio-proxy"}]},
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {"name": "app", "ready": false, "restartCount": 4, "image": "", "imageID": ""},
                    {"name": "istio-proxy", "ready": true, "restartCount": 0, "image": "", "imageID": ""}
                ]
            }
        }))
        .unwrap();
        let summary = pod_summary(&pod);
        assert_eq!(summary.name, "api-gateway-7d9f");
        assert_eq!(summary.phase, "Running");
        assert_eq!(summary.ready, "1/2");
        assert_eq!(summary.restarts, 4);
    }

    #[test]
    fn route_summary_reads_hosts_or_host() {
        let vs: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "networking.istio.io/v1beta1",
            "kind": "VirtualService",
            "metadata": {"name": "student-routes"},
            "spec": {"hosts": ["student-service", "*.university.local"]}
        }))
        .unwrap();
        assert_eq!(
            route_summary("VirtualService", &vs).hosts,
            vec!["student-service", "*.university.local"]
        );

        let dr: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "networking.istio.io/v1beta1",
            "kind": "DestinationRule",
            "metadata": {"name": "student-policy"},
            "spec": {"host": "student-service"}
        }))
        .unwrap();
        let summary = route_summary("DestinationRule", &dr);
        assert_eq!(summary.kind, "DestinationRule");
        assert_eq!(summary.hosts, vec!["student-service"]);
    }

    #[test]
    fn application_state_defaults_to_unknown() {
        let app: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": {"name": "university-platform"},
            "status": {"sync": {"status": "Synced"}}
        }))
        .unwrap();
        let state = application_state(&app);
        assert_eq!(state.sync, "Synced");
        assert_eq!(state.health, "Unknown");
    }

    #[test]
    fn autoscaler_summary_reads_bounds() {
        let hpa: HorizontalPodAutoscaler = serde_json::from_value(json!({
            "metadata": {"name": "student-service"},
            "spec": {
                "scaleTargetRef": {"kind": "Deployment", "name": "student-service", "apiVersion": "apps/v1"},
                "minReplicas": 2,
                "maxReplicas": 50
            },
            "status": {"currentReplicas": 3, "desiredReplicas": 4}
        }))
        .unwrap();
        let summary = autoscaler_summary(&hpa);
        assert_eq!(summary.target, "Deployment/student-service");
        assert_eq!((summary.min_replicas, summary.max_replicas), (2, 50));
        assert_eq!((summary.current_replicas, summary.desired_replicas), (3, 4));
    }
}
