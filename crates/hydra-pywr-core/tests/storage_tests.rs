use hydra_pywr_core::storage::StorageError;
use hydra_pywr_core::{FileStorage, Storage};
use serde_json::json;
use tempfile::TempDir;

fn create_test_storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path().join("output"));
    (storage, temp_dir)
}

#[test]
fn test_write_and_read_json() {
    let (storage, _temp) = create_test_storage();

    let doc = json!({"metadata": {"title": "Demo"}, "nodes": []});
    let path = storage.write_json("Demo.json", &doc).unwrap();
    assert!(path.exists());

    let loaded = storage.read_json("Demo.json").unwrap();
    assert_eq!(loaded, doc);
}

#[test]
fn test_write_creates_nested_directories() {
    let (storage, _temp) = create_test_storage();

    let path = storage.write_text("rules/custom.py", "x = 1\n").unwrap();
    assert_eq!(path, storage.path_of("rules/custom.py"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "x = 1\n");
}

#[test]
fn test_read_missing_file() {
    let (storage, _temp) = create_test_storage();
    let err = storage.read_json("missing.json").unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn test_read_invalid_json() {
    let (storage, _temp) = create_test_storage();
    storage.write_text("broken.json", "{not json").unwrap();
    let err = storage.read_json("broken.json").unwrap_err();
    assert!(matches!(err, StorageError::Json(_)));
}
