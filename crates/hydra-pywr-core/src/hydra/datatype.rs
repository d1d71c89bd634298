//! Mapping from JSON values to Hydra dataset types.

use serde_json::Value;
use thiserror::Error;

use crate::network::{is_recorder_type, ParameterKind, RecorderKind};

pub const SCALAR: &str = "SCALAR";
pub const ARRAY: &str = "ARRAY";
pub const DESCRIPTOR: &str = "DESCRIPTOR";
pub const DATAFRAME: &str = "DATAFRAME";
pub const PYWR_SCENARIOS: &str = "PYWR_SCENARIOS";

/// A value that has no dataset representation.
#[derive(Debug, Error)]
#[error("Cannot store a {0} value as a dataset")]
pub struct UnsupportedValue(pub &'static str);

/// Hydra dataset type for a node or network attribute value.
///
/// Objects carrying a string `type` are inline Pywr components and get the
/// parameter or recorder datatype of that component.
pub fn infer(value: &Value) -> Result<&'static str, UnsupportedValue> {
    match value {
        Value::Number(_) | Value::Bool(_) => Ok(SCALAR),
        Value::Array(_) => Ok(ARRAY),
        Value::String(_) => Ok(DESCRIPTOR),
        Value::Object(map) => Ok(match map.get("type").and_then(Value::as_str) {
            Some(t) if is_recorder_type(t) => RecorderKind::from_type(t).hydra_datatype(),
            Some(t) => ParameterKind::from_type(t).hydra_datatype(),
            None => DATAFRAME,
        }),
        Value::Null => Err(UnsupportedValue("null")),
    }
}

/// Whether datasets of this type hold a global parameter.
pub fn is_parameter(data_type: &str) -> bool {
    data_type.starts_with("PYWR_PARAMETER") || data_type == "PYWR_DATAFRAME"
}

/// Whether datasets of this type hold a global recorder.
pub fn is_recorder(data_type: &str) -> bool {
    data_type.starts_with("PYWR_RECORDER")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_primitive_types() {
        assert_eq!(infer(&json!(1)).unwrap(), SCALAR);
        assert_eq!(infer(&json!(true)).unwrap(), SCALAR);
        assert_eq!(infer(&json!([1, 2])).unwrap(), ARRAY);
        assert_eq!(infer(&json!("x")).unwrap(), DESCRIPTOR);
        assert_eq!(infer(&json!({"a": 1})).unwrap(), DATAFRAME);
    }

    #[test]
    fn test_infer_inline_components() {
        assert_eq!(
            infer(&json!({"type": "monthlyprofile", "values": []})).unwrap(),
            "PYWR_PARAMETER_MONTHLY_PROFILE"
        );
        assert_eq!(infer(&json!({"type": "constant"})).unwrap(), "PYWR_PARAMETER");
        assert_eq!(
            infer(&json!({"type": "numpyarraynoderecorder"})).unwrap(),
            "PYWR_RECORDER"
        );
    }

    #[test]
    fn test_infer_rejects_null() {
        assert!(infer(&Value::Null).is_err());
    }

    #[test]
    fn test_parameter_and_recorder_classification() {
        assert!(is_parameter("PYWR_PARAMETER_AGGREGATED"));
        assert!(is_parameter("PYWR_DATAFRAME"));
        assert!(!is_parameter("DATAFRAME"));
        assert!(is_recorder("PYWR_RECORDER_FDC_DEVIATION"));
        assert!(!is_recorder("PYWR_PARAMETER"));
    }
}
