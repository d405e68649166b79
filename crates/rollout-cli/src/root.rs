use rollout_core::config::CONFIG_FILE;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `ROLLOUT_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `rollout.yaml`
/// 3. Walk upward from `cwd` looking for a `k8s/` directory
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root(&cwd)
}

fn find_root(start: &Path) -> PathBuf {
    find_ancestor(start, |dir| dir.join(CONFIG_FILE).is_file())
        .or_else(|| find_ancestor(start, |dir| dir.join("k8s").is_dir()))
        .unwrap_or_else(|| start.to_path_buf())
}

fn find_ancestor(start: &Path, matches: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| matches(dir))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_config_file_above_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "namespace: staging\n").unwrap();
        let deep = dir.path().join("k8s/istio");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_root(&deep), dir.path());
    }

    #[test]
    fn config_file_beats_nearer_manifest_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let nested = dir.path().join("platform");
        std::fs::create_dir_all(nested.join("k8s")).unwrap();

        assert_eq!(find_root(&nested), dir.path());
    }

    #[test]
    fn falls_back_to_manifest_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("k8s")).unwrap();
        let sub = dir.path().join("docs");
        std::fs::create_dir_all(&sub).unwrap();

        assert_eq!(find_root(&sub), dir.path());
    }
}
