//! Loading bundles from `bundle.yaml` manifests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundle::command::{CommandHandler, CommandSpec};
use crate::error::{EngineError, EngineResult};
use crate::registry::{BundleLoader, Handler, HandlerBundle};

/// Manifest file looked up inside a bundle directory.
pub const MANIFEST_FILE: &str = "bundle.yaml";

/// On-disk bundle description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub name: String,

    /// Exported `action -> command` entries.
    #[serde(default)]
    pub steps: BTreeMap<String, CommandSpec>,
}

/// Resolves identifiers to manifest files.
///
/// An identifier is a bundle directory holding `bundle.yaml` or a path to a
/// YAML manifest. Relative identifiers are looked up under `base_dir` when
/// one is set.
#[derive(Debug, Clone, Default)]
pub struct ManifestBundleLoader {
    base_dir: Option<PathBuf>,
}

impl ManifestBundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Path of the manifest an identifier points at.
    pub fn manifest_path(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        let path = match self.base_dir {
            Some(ref base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };
        if path.is_dir() {
            path.join(MANIFEST_FILE)
        } else {
            path
        }
    }

    /// Read and parse the manifest behind an identifier.
    pub fn read_manifest(&self, identifier: &str) -> EngineResult<BundleManifest> {
        let path = self.manifest_path(identifier);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Bundle(format!("cannot read {}: {}", path.display(), e)))?;
        let manifest: BundleManifest = serde_yaml::from_str(&content)
            .map_err(|e| EngineError::Bundle(format!("invalid manifest {}: {}", path.display(), e)))?;
        if manifest.name.trim().is_empty() {
            return Err(EngineError::Bundle(format!("{}: bundle name must not be empty", path.display())));
        }
        Ok(manifest)
    }
}

impl BundleLoader for ManifestBundleLoader {
    fn load(&self, identifier: &str) -> EngineResult<HandlerBundle> {
        let manifest = self.read_manifest(identifier)?;
        let steps = manifest
            .steps
            .into_iter()
            .map(|(action, spec)| {
                let handler: Arc<dyn Handler> = Arc::new(CommandHandler::new(action.clone(), spec));
                (action, handler)
            })
            .collect();
        Ok(HandlerBundle {
            name: manifest.name,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::create_default_registry;

    const MANIFEST: &str = r#"
name: greetings
steps:
  greet.hello:
    command: "echo hello {{ with.name }}"
    inputs: [name]
  local.log:
    command: "echo shadowed"
"#;

    #[test]
    fn test_load_directory_bundle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), MANIFEST).unwrap();

        let bundle = ManifestBundleLoader::new()
            .load(&dir.path().display().to_string())
            .unwrap();
        assert_eq!(bundle.name, "greetings");
        let actions: Vec<&str> = bundle.steps.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(actions, vec!["greet.hello", "local.log"]);
    }

    #[test]
    fn test_relative_identifier_uses_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extra.yaml"), MANIFEST).unwrap();

        let loader = ManifestBundleLoader::with_base_dir(dir.path());
        assert_eq!(loader.manifest_path("extra.yaml"), dir.path().join("extra.yaml"));
        assert!(loader.load("extra.yaml").is_ok());
    }

    #[test]
    fn test_missing_manifest() {
        let err = ManifestBundleLoader::new().load("/no/such/bundle").unwrap_err();
        assert!(matches!(err, EngineError::Bundle(_)));
    }

    #[test]
    fn test_builtins_win_over_bundle_actions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), MANIFEST).unwrap();

        let mut registry = create_default_registry();
        let before = registry.actions().len();
        let added = registry.load_external(
            &ManifestBundleLoader::new(),
            &[dir.path().display().to_string(), "/no/such/bundle".to_string()],
        );

        assert_eq!(added, 1);
        assert!(registry.has("greet.hello"));
        assert_eq!(registry.actions().len(), before + 1);
    }
}
