use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "rollout.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// MeshConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default = "default_mesh_namespace")]
    pub namespace: String,
    /// Ingress gateway deployment that must exist before anything is applied.
    #[serde(default = "default_mesh_gateway")]
    pub gateway: String,
}

fn default_mesh_namespace() -> String {
    "istio-system".to_string()
}

fn default_mesh_gateway() -> String {
    "istio-ingressgateway".to_string()
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            namespace: default_mesh_namespace(),
            gateway: default_mesh_gateway(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitOpsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitOpsConfig {
    #[serde(default = "default_gitops_namespace")]
    pub namespace: String,
    #[serde(default = "default_gitops_server")]
    pub server: String,
    /// Name of the Application object whose sync/health `status` reports.
    #[serde(default = "default_application")]
    pub application: String,
}

fn default_gitops_namespace() -> String {
    "argocd".to_string()
}

fn default_gitops_server() -> String {
    "argocd-server".to_string()
}

fn default_application() -> String {
    "university-platform".to_string()
}

impl Default for GitOpsConfig {
    fn default() -> Self {
        Self {
            namespace: default_gitops_namespace(),
            server: default_gitops_server(),
            application: default_application(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReadinessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl ReadinessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "readiness.timeout_seconds must be greater than zero".to_string(),
            });
        }

        if self.poll_interval_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "readiness.poll_interval_seconds must be greater than zero".to_string(),
            });
        } else if self.timeout_seconds > 0 && self.poll_interval_seconds > self.timeout_seconds {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "readiness.poll_interval_seconds ({}) exceeds timeout_seconds ({}); \
                     each workload is checked only at start and at the deadline",
                    self.poll_interval_seconds, self.timeout_seconds
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

/// Settings for one invocation. Built once and shared by reference; nothing
/// mutates it after `load`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Directory holding the manifest files, relative to the project root.
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,
    /// Field owner recorded by server-side apply.
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub gitops: GitOpsConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

fn default_namespace() -> String {
    "university".to_string()
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from("k8s")
}

fn default_field_manager() -> String {
    "rollout".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            manifest_dir: default_manifest_dir(),
            field_manager: default_field_manager(),
            mesh: MeshConfig::default(),
            gitops: GitOpsConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Config {
    /// Load `rollout.yaml` from `root`, falling back to defaults when the file
    /// does not exist.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.readiness.timeout_seconds = seconds;
        self
    }

    /// Absolute manifest directory for a project root.
    pub fn manifest_root(&self, root: &Path) -> PathBuf {
        root.join(&self.manifest_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Checks every command depends on. Readiness settings are checked
    /// separately by [`ReadinessConfig::validate`] since only deploy waits.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.namespace.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "namespace must not be empty".to_string(),
            });
        }

        if self.namespace == self.gitops.namespace {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "namespace '{}' is shared with the GitOps controller; cleanup will delete it",
                    self.namespace
                ),
            });
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.namespace, "university");
        assert_eq!(cfg.gitops.namespace, "argocd");
        assert_eq!(cfg.readiness.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "namespace: staging\nreadiness:\n  timeout_seconds: 60\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.namespace, "staging");
        assert_eq!(cfg.readiness.timeout_seconds, 60);
        assert_eq!(cfg.readiness.poll_interval_seconds, 5);
        assert_eq!(cfg.mesh.gateway, "istio-ingressgateway");
        assert_eq!(cfg.manifest_dir, PathBuf::from("k8s"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "namespace: [unclosed\n").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let cfg = Config::default()
            .with_namespace("preview")
            .with_timeout_seconds(30);
        assert_eq!(cfg.namespace, "preview");
        assert_eq!(cfg.readiness.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn default_readiness_is_valid() {
        assert!(ReadinessConfig::default().validate().is_empty());
    }

    #[test]
    fn zero_timeout_is_a_single_error() {
        let cfg = Config::default().with_timeout_seconds(0);
        let warnings = cfg.readiness.validate();
        assert!(Config::has_errors(&warnings));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("timeout_seconds must be greater than zero"));
    }

    #[test]
    fn readiness_errors_do_not_affect_general_validation() {
        let cfg = Config::default().with_timeout_seconds(0);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn long_poll_interval_only_warns() {
        let mut cfg = Config::default().with_timeout_seconds(10);
        cfg.readiness.poll_interval_seconds = 30;
        let warnings = cfg.readiness.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }

    #[test]
    fn shared_gitops_namespace_warns() {
        let cfg = Config::default().with_namespace("argocd");
        let warnings = cfg.validate();
        assert!(!Config::has_errors(&warnings));
        assert!(warnings.iter().any(|w| w.message.contains("shared")));
    }
}
