use crate::catalog::Catalog;
use crate::cluster::ClusterClient;
use crate::config::Config;
use crate::error::{PrereqError, PrereqKind};
use std::path::Path;
use tracing::info;

/// Verify everything a deploy depends on before the first mutation.
///
/// Checks run in order and the first failure aborts:
/// 1. the cluster API answers
/// 2. the mesh namespace and its ingress gateway exist
/// 3. the GitOps namespace and its server exist
/// 4. every manifest file in the catalog is present under `manifest_root`
pub async fn check_prerequisites(
    client: &dyn ClusterClient,
    config: &Config,
    catalog: &Catalog,
    manifest_root: &Path,
) -> Result<(), PrereqError> {
    let version = client
        .server_version()
        .await
        .map_err(|e| PrereqError::new(PrereqKind::ClientUnreachable, e.to_string()))?;
    info!(version = %version, "cluster reachable");

    require_controller(
        client,
        &config.mesh.namespace,
        &config.mesh.gateway,
        PrereqKind::MeshNamespaceMissing,
        PrereqKind::MeshGatewayMissing,
    )
    .await?;

    require_controller(
        client,
        &config.gitops.namespace,
        &config.gitops.server,
        PrereqKind::GitOpsNamespaceMissing,
        PrereqKind::GitOpsServerMissing,
    )
    .await?;

    let missing = catalog.missing_files(manifest_root);
    if !missing.is_empty() {
        let paths: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        return Err(PrereqError::new(
            PrereqKind::ManifestMissing,
            paths.join(", "),
        ));
    }

    Ok(())
}

async fn require_controller(
    client: &dyn ClusterClient,
    namespace: &str,
    workload: &str,
    namespace_missing: PrereqKind,
    workload_missing: PrereqKind,
) -> Result<(), PrereqError> {
    let unreachable = |e: crate::error::ClusterError| {
        PrereqError::new(PrereqKind::ClientUnreachable, e.to_string())
    };

    if !client.namespace_exists(namespace).await.map_err(unreachable)? {
        return Err(PrereqError::new(
            namespace_missing,
            format!("namespace '{namespace}' not found"),
        ));
    }

    let present = client
        .deployment_exists(namespace, workload)
        .await
        .map_err(unreachable)?;
    if !present {
        return Err(PrereqError::new(
            workload_missing,
            format!("deployment '{workload}' not found in namespace '{namespace}'"),
        ));
    }

    info!(namespace, workload, "controller present");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Manifest;
    use crate::cluster::fake::FakeCluster;
    use tempfile::TempDir;

    fn catalog_with_files(dir: &TempDir) -> Catalog {
        std::fs::write(dir.path().join("namespace.yaml"), "").unwrap();
        Catalog::new(vec![Manifest::new("namespace", "", 0, "namespace.yaml")])
    }

    #[tokio::test]
    async fn healthy_cluster_passes() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_files(&dir);
        let client = FakeCluster::healthy();
        check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_cluster_fails_first() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_files(&dir);
        let client = FakeCluster::healthy().unreachable().without_namespace("istio-system");
        let err = check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind, PrereqKind::ClientUnreachable);
    }

    #[tokio::test]
    async fn missing_mesh_namespace() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_files(&dir);
        let client = FakeCluster::healthy()
            .without_namespace("istio-system")
            .without_namespace("argocd");
        let err = check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind, PrereqKind::MeshNamespaceMissing);
        assert!(err.detail.contains("istio-system"));
    }

    #[tokio::test]
    async fn missing_mesh_gateway() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_files(&dir);
        let client =
            FakeCluster::healthy().without_workload("istio-system", "istio-ingressgateway");
        let err = check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind, PrereqKind::MeshGatewayMissing);
    }

    #[tokio::test]
    async fn missing_gitops_namespace_and_server() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_with_files(&dir);

        let client = FakeCluster::healthy().without_namespace("argocd");
        let err = check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind, PrereqKind::GitOpsNamespaceMissing);

        let client = FakeCluster::healthy().without_workload("argocd", "argocd-server");
        let err = check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind, PrereqKind::GitOpsServerMissing);
    }

    #[tokio::test]
    async fn missing_manifest_file_is_reported_without_mutation() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(vec![
            Manifest::new("namespace", "", 0, "namespace.yaml"),
            Manifest::new("config", "", 1, "configmap.yaml"),
        ]);
        std::fs::write(dir.path().join("namespace.yaml"), "").unwrap();
        let client = FakeCluster::healthy();
        let err = check_prerequisites(&client, &Config::default(), &catalog, dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind, PrereqKind::ManifestMissing);
        assert!(err.detail.contains("configmap.yaml"));
        assert!(client.applied().is_empty());
    }
}
