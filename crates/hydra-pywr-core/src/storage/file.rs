use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::error::StorageError;
use super::Storage;

/// File-based storage rooted at an output directory.
///
/// ```text
/// output_dir/
///   <title>.json                   # Exported Pywr network
///   hydra_pywr_custom_module.py    # Custom rules
///   pynsim_model.json              # Integrated model config
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Creates a new FileStorage writing into `base_path`.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Returns the output directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolves an artifact name, refusing names that leave the output
    /// directory.
    fn artifact_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let candidate = Path::new(name);
        let inside = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if name.trim().is_empty() || !inside {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(candidate))
    }

    /// Ensures the parent directory of `path` exists.
    fn ensure_parent(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn write_json(&self, name: &str, value: &Value) -> Result<PathBuf, StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_text(name, &json)
    }

    fn write_text(&self, name: &str, content: &str) -> Result<PathBuf, StorageError> {
        let path = self.artifact_path(name)?;
        self.ensure_parent(&path)?;

        fs::write(&path, content).map_err(|e| StorageError::io(&path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "wrote artifact");

        Ok(path)
    }

    fn read_json(&self, name: &str) -> Result<Value, StorageError> {
        let path = self.artifact_path(name)?;
        if !path.exists() {
            return Err(StorageError::NotFound(path));
        }

        let json = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn path_of(&self, name: &str) -> PathBuf {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_path.join(candidate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_json() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path());

        let doc = json!({"nodes": [], "edges": []});
        let path = storage.write_json("network.json", &doc).unwrap();

        assert!(path.exists());
        assert_eq!(storage.read_json("network.json").unwrap(), doc);
    }

    #[test]
    fn test_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path().join("out").join("nested"));

        let path = storage.write_text("rules.py", "x = 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path());

        let result = storage.read_json("missing.json");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_absolute_names_bypass_base() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new("relative/base");
        let absolute = temp.path().join("abs.json");

        assert_eq!(storage.path_of(absolute.to_str().unwrap()), absolute);
    }

    #[test]
    fn test_writes_stay_inside_base() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path().join("out"));
        let outside = temp.path().join("escaped.json");

        for name in [outside.to_str().unwrap(), "../escaped.json", "a/../../escaped.json", ""] {
            let err = storage.write_text(name, "x").unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{name}");
        }
        assert!(!outside.exists());
        assert!(matches!(
            storage.read_json("../escaped.json"),
            Err(StorageError::InvalidName(_))
        ));
    }
}
