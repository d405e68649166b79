use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Wave holding the GitOps project and application, submitted after every
/// workload wave.
pub const GITOPS_WAVE: u32 = 6;

// ---------------------------------------------------------------------------
// DeploymentTarget
// ---------------------------------------------------------------------------

/// A Deployment whose availability gates progression to the next wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    pub name: String,
    pub namespace: String,
}

impl DeploymentTarget {
    pub fn deployment(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deployment/{} in {}", self.name, self.namespace)
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub id: String,
    pub description: String,
    pub wave: u32,
    /// File path relative to the manifest directory.
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<DeploymentTarget>,
}

impl Manifest {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        wave: u32,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            wave,
            path: path.into(),
            target: None,
        }
    }

    pub fn gated_by(mut self, target: DeploymentTarget) -> Self {
        self.target = Some(target);
        self
    }
}

// ---------------------------------------------------------------------------
// Wave
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Wave<'a> {
    pub number: u32,
    pub manifests: Vec<&'a Manifest>,
}

impl<'a> Wave<'a> {
    /// Readiness gates for this wave, in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &'a DeploymentTarget> + '_ {
        self.manifests.iter().copied().filter_map(|m| m.target.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ordered, read-only set of manifests. Apply order is ascending wave, then
/// declaration order; teardown order is its exact reverse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    manifests: Vec<Manifest>,
}

impl Catalog {
    pub fn new(manifests: Vec<Manifest>) -> Self {
        Self { manifests }
    }

    /// The platform stack: namespace, config and database, services, mesh
    /// policy, autoscalers, monitoring, then the GitOps objects.
    pub fn standard(namespace: &str) -> Self {
        let deployment = |name: &str| DeploymentTarget::deployment(name, namespace);
        Self::new(vec![
            Manifest::new("namespace", "Platform namespace", 0, "namespace.yaml"),
            Manifest::new("config", "Shared application config", 1, "configmap.yaml"),
            Manifest::new("secrets", "Database and service credentials", 1, "secrets.yaml"),
            Manifest::new("database", "PostgreSQL database", 1, "database.yaml")
                .gated_by(deployment("postgres")),
            Manifest::new("services", "Cluster services", 2, "services.yaml"),
            Manifest::new("service-registry", "Service registry", 2, "service-registry.yaml")
                .gated_by(deployment("service-registry")),
            Manifest::new("gateway", "API gateway", 2, "api-gateway.yaml")
                .gated_by(deployment("api-gateway")),
            Manifest::new("admin-service", "Admin domain service", 2, "admin-service.yaml"),
            Manifest::new("faculty-service", "Faculty domain service", 2, "faculty-service.yaml"),
            Manifest::new("student-service", "Student domain service", 2, "student-service.yaml"),
            Manifest::new("mesh-gateway", "Istio ingress gateway", 3, "istio/gateway.yaml"),
            Manifest::new("routing", "Istio virtual services", 3, "istio/virtual-services.yaml"),
            Manifest::new(
                "traffic-policy",
                "Istio destination rules",
                3,
                "istio/destination-rules.yaml",
            ),
            Manifest::new(
                "security-policy",
                "Istio peer authentication",
                3,
                "istio/peer-authentication.yaml",
            ),
            Manifest::new("mesh-config", "Mesh-wide configuration", 3, "istio/mesh-config.yaml"),
            Manifest::new("autoscalers", "Horizontal pod autoscalers", 4, "hpa.yaml"),
            Manifest::new(
                "monitoring",
                "Service monitors and dashboards",
                5,
                "monitoring/service-monitor.yaml",
            ),
            Manifest::new("gitops-project", "Argo CD project", GITOPS_WAVE, "argocd/project.yaml"),
            Manifest::new(
                "gitops-application",
                "Argo CD application",
                GITOPS_WAVE,
                "argocd/application.yaml",
            ),
        ])
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Group by wave number, ascending. Declaration order is kept within a wave.
    pub fn waves(&self) -> Vec<Wave<'_>> {
        let mut grouped: BTreeMap<u32, Vec<&Manifest>> = BTreeMap::new();
        for manifest in &self.manifests {
            grouped.entry(manifest.wave).or_default().push(manifest);
        }
        grouped
            .into_iter()
            .map(|(number, manifests)| Wave { number, manifests })
            .collect()
    }

    pub fn apply_order(&self) -> Vec<&Manifest> {
        self.waves()
            .into_iter()
            .flat_map(|w| w.manifests)
            .collect()
    }

    pub fn teardown_order(&self) -> Vec<&Manifest> {
        let mut order = self.apply_order();
        order.reverse();
        order
    }

    /// Manifest files that do not exist under `dir`.
    pub fn missing_files(&self, dir: &Path) -> Vec<PathBuf> {
        self.manifests
            .iter()
            .map(|m| dir.join(&m.path))
            .filter(|p| !p.is_file())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(manifests: &[&Manifest]) -> Vec<String> {
        manifests.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn standard_waves_match_platform_layout() {
        let catalog = Catalog::standard("university");
        let waves = catalog.waves();
        let numbers: Vec<u32> = waves.iter().map(|w| w.number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4, 5, GITOPS_WAVE]);

        assert_eq!(ids(&waves[0].manifests), vec!["namespace"]);
        assert_eq!(ids(&waves[1].manifests), vec!["config", "secrets", "database"]);
        assert_eq!(
            ids(&waves[2].manifests),
            vec![
                "services",
                "service-registry",
                "gateway",
                "admin-service",
                "faculty-service",
                "student-service"
            ]
        );
        assert_eq!(waves[3].manifests.len(), 5);
        assert_eq!(ids(&waves[4].manifests), vec!["autoscalers"]);
        assert_eq!(ids(&waves[5].manifests), vec!["monitoring"]);
        assert_eq!(
            ids(&waves[6].manifests),
            vec!["gitops-project", "gitops-application"]
        );
    }

    #[test]
    fn readiness_gates_are_database_and_two_services() {
        let catalog = Catalog::standard("university");
        let gates: Vec<(u32, String)> = catalog
            .waves()
            .iter()
            .flat_map(|w| w.targets().map(move |t| (w.number, t.name.clone())))
            .collect();
        assert_eq!(
            gates,
            vec![
                (1, "postgres".to_string()),
                (2, "service-registry".to_string()),
                (2, "api-gateway".to_string()),
            ]
        );
        assert!(catalog
            .manifests()
            .iter()
            .filter_map(|m| m.target.as_ref())
            .all(|t| t.namespace == "university"));
    }

    #[test]
    fn waves_sort_ascending_and_keep_declaration_order() {
        let catalog = Catalog::new(vec![
            Manifest::new("c", "", 7, "c.yaml"),
            Manifest::new("a", "", 2, "a.yaml"),
            Manifest::new("d", "", 7, "d.yaml"),
            Manifest::new("b", "", 2, "b.yaml"),
            Manifest::new("z", "", 0, "z.yaml"),
        ]);
        assert_eq!(ids(&catalog.apply_order()), vec!["z", "a", "b", "c", "d"]);
        let numbers: Vec<u32> = catalog.waves().iter().map(|w| w.number).collect();
        assert_eq!(numbers, vec![0, 2, 7]);
    }

    #[test]
    fn teardown_is_exact_reverse_of_apply() {
        let catalog = Catalog::standard("university");
        let mut apply = ids(&catalog.apply_order());
        apply.reverse();
        let teardown = ids(&catalog.teardown_order());
        assert_eq!(teardown, apply);
        assert_eq!(teardown.first().map(String::as_str), Some("gitops-application"));
        assert_eq!(teardown.last().map(String::as_str), Some("namespace"));

        let waves: Vec<u32> = catalog.teardown_order().iter().map(|m| m.wave).collect();
        assert!(waves.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn empty_catalog_has_no_waves() {
        let catalog = Catalog::new(Vec::new());
        assert!(catalog.is_empty());
        assert!(catalog.waves().is_empty());
        assert!(catalog.teardown_order().is_empty());
    }

    #[test]
    fn missing_files_reports_only_absent_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("istio")).unwrap();
        std::fs::write(dir.path().join("namespace.yaml"), "").unwrap();
        std::fs::write(dir.path().join("istio/gateway.yaml"), "").unwrap();

        let catalog = Catalog::new(vec![
            Manifest::new("namespace", "", 0, "namespace.yaml"),
            Manifest::new("config", "", 1, "configmap.yaml"),
            Manifest::new("mesh-gateway", "", 3, "istio/gateway.yaml"),
        ]);
        let missing = catalog.missing_files(dir.path());
        assert_eq!(missing, vec![dir.path().join("configmap.yaml")]);
    }

    #[test]
    fn target_display_names_deployment_and_namespace() {
        let target = DeploymentTarget::deployment("postgres", "university");
        assert_eq!(target.to_string(), "deployment/postgres in university");
    }
}
