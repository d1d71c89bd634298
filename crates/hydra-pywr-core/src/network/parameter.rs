use serde_json::{Map, Value};

use super::error::NetworkError;

/// Type written for every dataframe parameter handed to the engine.
pub const DATAFRAME_PARAMETER_TYPE: &str = "dataframeparameter";

/// Known parameter families that map to a dedicated Hydra datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterKind {
    Aggregated,
    ConstantScenario,
    ControlCurveIndex,
    ControlCurveInterpolated,
    Dataframe,
    IndexedArray,
    MonthlyProfile,
    Other(String),
}

impl ParameterKind {
    /// Classifies a Pywr type name such as `monthlyprofile` or
    /// `MonthlyProfileParameter`.
    pub fn from_type(type_name: &str) -> Self {
        let lowered = type_name.to_lowercase();
        let base = lowered.strip_suffix("parameter").unwrap_or(&lowered);
        match base {
            "aggregated" => ParameterKind::Aggregated,
            "constantscenario" => ParameterKind::ConstantScenario,
            "controlcurveindex" => ParameterKind::ControlCurveIndex,
            "controlcurveinterpolated" => ParameterKind::ControlCurveInterpolated,
            "dataframe" => ParameterKind::Dataframe,
            "indexedarray" => ParameterKind::IndexedArray,
            "monthlyprofile" => ParameterKind::MonthlyProfile,
            _ => ParameterKind::Other(type_name.to_string()),
        }
    }

    pub fn hydra_datatype(&self) -> &'static str {
        match self {
            ParameterKind::Aggregated => "PYWR_PARAMETER_AGGREGATED",
            ParameterKind::ConstantScenario => "PYWR_PARAMETER_CONSTANT_SCENARIO",
            ParameterKind::ControlCurveIndex => "PYWR_PARAMETER_CONTROL_CURVE_INDEX",
            ParameterKind::ControlCurveInterpolated => "PYWR_PARAMETER_CONTROL_CURVE_INTERPOLATED",
            ParameterKind::Dataframe => "PYWR_DATAFRAME",
            ParameterKind::IndexedArray => "PYWR_PARAMETER_INDEXED_ARRAY",
            ParameterKind::MonthlyProfile => "PYWR_PARAMETER_MONTHLY_PROFILE",
            ParameterKind::Other(_) => "PYWR_PARAMETER",
        }
    }
}

/// A named Pywr parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub data: Map<String, Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Value) -> Result<Self, NetworkError> {
        let name = name.into();
        let data = component_data("Parameter", &name, value)?;
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .map(ParameterKind::from_type)
            .ok_or_else(|| NetworkError::MissingType {
                kind: "Parameter",
                name: name.clone(),
            })?;

        Ok(Self { name, kind, data })
    }

    /// Builds a parameter from an object whose `type` is already known.
    pub(crate) fn from_typed(name: String, type_name: &str, data: Map<String, Value>) -> Self {
        Self {
            name,
            kind: ParameterKind::from_type(type_name),
            data,
        }
    }

    /// The Pywr `type` string as written in the source.
    pub fn type_name(&self) -> &str {
        self.data.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn hydra_datatype(&self) -> &'static str {
        self.kind.hydra_datatype()
    }

    /// The form handed to the engine.
    ///
    /// Dataframe parameters are normalized: the type becomes
    /// `dataframeparameter`, inline data is reduced to its first series,
    /// `parse_dates` is always set and `pandas_kwargs` is never emitted.
    pub fn value(&self) -> Value {
        if self.kind != ParameterKind::Dataframe {
            return Value::Object(self.data.clone());
        }

        let inline = self
            .data
            .get("data")
            .and_then(Value::as_object)
            .and_then(|inner| inner.iter().next());

        let mut out = match inline {
            Some((basekey, series)) => {
                let mut out = Map::new();
                out.insert(
                    "type".to_string(),
                    Value::String(DATAFRAME_PARAMETER_TYPE.to_string()),
                );
                let mut data = Map::new();
                data.insert(basekey.clone(), series.clone());
                out.insert("data".to_string(), Value::Object(data));
                out
            }
            None => self.data.clone(),
        };

        out.insert(
            "type".to_string(),
            Value::String(DATAFRAME_PARAMETER_TYPE.to_string()),
        );
        out.insert("parse_dates".to_string(), Value::Bool(true));
        out.remove("pandas_kwargs");
        Value::Object(out)
    }
}

/// Known recorder families that map to a dedicated Hydra datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderKind {
    FlowDurationCurveDeviation,
    Other(String),
}

impl RecorderKind {
    pub fn from_type(type_name: &str) -> Self {
        let lowered = type_name.to_lowercase();
        let base = lowered.strip_suffix("recorder").unwrap_or(&lowered);
        match base {
            "flowdurationcurvedeviation" => RecorderKind::FlowDurationCurveDeviation,
            _ => RecorderKind::Other(type_name.to_string()),
        }
    }

    pub fn hydra_datatype(&self) -> &'static str {
        match self {
            RecorderKind::FlowDurationCurveDeviation => "PYWR_RECORDER_FDC_DEVIATION",
            RecorderKind::Other(_) => "PYWR_RECORDER",
        }
    }
}

/// A named Pywr recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorder {
    pub name: String,
    pub kind: RecorderKind,
    pub data: Map<String, Value>,
}

impl Recorder {
    pub fn new(name: impl Into<String>, value: Value) -> Result<Self, NetworkError> {
        let name = name.into();
        let data = component_data("Recorder", &name, value)?;
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .map(RecorderKind::from_type)
            .ok_or_else(|| NetworkError::MissingType {
                kind: "Recorder",
                name: name.clone(),
            })?;

        Ok(Self { name, kind, data })
    }

    pub(crate) fn from_typed(name: String, type_name: &str, data: Map<String, Value>) -> Self {
        Self {
            name,
            kind: RecorderKind::from_type(type_name),
            data,
        }
    }

    pub fn hydra_datatype(&self) -> &'static str {
        self.kind.hydra_datatype()
    }

    pub fn value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

/// Whether an inline component of the given Pywr type is a recorder.
pub fn is_recorder_type(type_name: &str) -> bool {
    type_name.to_lowercase().ends_with("recorder")
}

fn component_data(
    kind: &'static str,
    name: &str,
    value: Value,
) -> Result<Map<String, Value>, NetworkError> {
    match value {
        Value::Object(data) => Ok(data),
        _ => Err(NetworkError::MissingType {
            kind,
            name: name.to_string(),
        }),
    }
}
