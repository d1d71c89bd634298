mod error;
mod file;

pub use error::StorageError;
pub use file::FileStorage;

use serde_json::Value;
use std::path::PathBuf;

/// Trait for artifact storage backends.
///
/// Exporters write Pywr documents, pynsim configs and rules modules
/// through this trait so they can be redirected in tests.
pub trait Storage {
    /// Writes a JSON document, pretty-printed, under the given relative name.
    fn write_json(&self, name: &str, value: &Value) -> Result<PathBuf, StorageError>;

    /// Writes a text artifact under the given relative name.
    fn write_text(&self, name: &str, content: &str) -> Result<PathBuf, StorageError>;

    /// Reads a JSON document previously written under the given name.
    fn read_json(&self, name: &str) -> Result<Value, StorageError>;

    /// Resolves a relative artifact name to its full path.
    fn path_of(&self, name: &str) -> PathBuf;
}

const UNSAFE_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reduces a network title to a single file name.
///
/// Path separators and characters that are not allowed in file names
/// become `_`. Spaces are kept.
pub fn file_name_for(title: &str) -> String {
    let name: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || UNSAFE_FILE_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        "network".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_keeps_plain_titles() {
        assert_eq!(file_name_for("Thames demo"), "Thames demo");
    }

    #[test]
    fn test_file_name_flattens_paths() {
        assert_eq!(file_name_for("/tmp/x"), "_tmp_x");
        assert_eq!(file_name_for("../../etc/foo"), ".._.._etc_foo");
        assert_eq!(file_name_for("a\\b:c"), "a_b_c");
    }

    #[test]
    fn test_file_name_for_dot_titles() {
        assert_eq!(file_name_for(".."), "network");
        assert_eq!(file_name_for("   "), "network");
    }
}
