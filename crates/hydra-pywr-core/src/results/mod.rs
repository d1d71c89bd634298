//! Posting simulation results back to a Hydra scenario.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::client::{ClientError, HydraClient};
use crate::hydra::datatype::{DATAFRAME, SCALAR};
use crate::hydra::{Dataset, HydraNetwork, HydraNode, HydraScenario, ResourceScenario};

const STORAGE_TYPES: &[&str] = &["reservoir", "storage"];
const ENERGY_TYPES: &[&str] = &["generator", "bus", "line", "load", "battery"];
const EXCLUDED_METRIC: &str = "hydropowerrecorder";

const FLOW_DIMENSION: &str = "Volumetric flow rate";
const FLOW_UNIT: &str = "Mm³/day";

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("Invalid result date {0:?}")]
    InvalidDate([i64; 4]),

    #[error("No attribute `{name}` with dimension `{dimension}`")]
    MissingAttribute { name: String, dimension: String },

    #[error("Scenario {0} does not name its network")]
    MissingNetworkId(i64),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One metric group, indexed by period label.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetricSeries {
    #[serde(default)]
    pub index: Vec<String>,
    #[serde(default)]
    pub values: Vec<f64>,
}

/// Output of a simulation run.
///
/// `time` rows are `[year, hour_index, month, day]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationResults {
    #[serde(default)]
    pub time: Vec<[i64; 4]>,
    #[serde(default)]
    pub nodes: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricSeries>,
}

impl SimulationResults {
    pub fn from_json_str(json: &str) -> Result<Self, ResultsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ResultsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}

/// Formats result rows as timestamps.
///
/// Rows are treated as hourly when the first two or the last two fall on
/// the same date.
pub fn build_times(rows: &[[i64; 4]]) -> Result<Vec<String>, ResultsError> {
    let dates = rows
        .iter()
        .map(|row| {
            let [year, _, month, day] = *row;
            i32::try_from(year)
                .ok()
                .zip(u32::try_from(month).ok())
                .zip(u32::try_from(day).ok())
                .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
                .ok_or(ResultsError::InvalidDate(*row))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let n = dates.len();
    let hourly = n > 1 && (dates[0] == dates[1] || dates[n - 2] == dates[n - 1]);

    rows.iter()
        .zip(&dates)
        .map(|(row, date)| {
            if hourly {
                let hour = row[1].rem_euclid(24) as u32;
                date.and_hms_opt(hour, 0, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .ok_or(ResultsError::InvalidDate(*row))
            } else {
                Ok(date.format("%Y-%m-%d").to_string())
            }
        })
        .collect()
}

/// Where a node's result is stored, by node type.
fn node_output(node_type: &str) -> (&'static str, &'static str, &'static str) {
    let node_type = node_type.to_lowercase();
    if STORAGE_TYPES.contains(&node_type.as_str()) {
        ("simulated_volume", "Volume", "Mm³")
    } else if ENERGY_TYPES.contains(&node_type.as_str()) {
        ("flow", "Power", "MW")
    } else {
        ("simulated_flow", FLOW_DIMENSION, FLOW_UNIT)
    }
}

/// Splits a metric group such as `/__node__:attr` into `(node, attr)`.
pub fn parse_metric_group(group: &str) -> Option<(&str, &str)> {
    let group = group.strip_prefix('/').unwrap_or(group);
    let (node, attr) = group.split_once(':')?;
    Some((node.trim_matches('_'), attr))
}

/// Writes [`SimulationResults`] into the scenario they were run from.
pub struct ResultsWriter<'c, C: HydraClient + ?Sized> {
    client: &'c C,
    scenario: HydraScenario,
    network: HydraNetwork,
    results: SimulationResults,
}

impl<'c, C: HydraClient + ?Sized> ResultsWriter<'c, C> {
    /// Fetches the scenario and its network, restricted to `template_id`
    /// when given.
    pub async fn new(
        client: &'c C,
        scenario_id: i64,
        template_id: Option<i64>,
        results: SimulationResults,
    ) -> Result<Self, ResultsError> {
        let scenario = client.get_scenario(scenario_id, true).await?;
        let network_id = scenario
            .network_id
            .ok_or(ResultsError::MissingNetworkId(scenario_id))?;
        let network = client.get_network(network_id, false, template_id).await?;
        Ok(Self {
            client,
            scenario,
            network,
            results,
        })
    }

    /// Adds node and metric results to a copy of the scenario and posts it.
    #[instrument(skip(self), fields(scenario_id = ?self.scenario.id))]
    pub async fn build_hydra_output(&self) -> Result<HydraScenario, ResultsError> {
        let times = build_times(&self.results.time)?;

        let mut output = self.scenario.clone();
        output.resourcescenarios.clear();

        for (name, values) in &self.results.nodes {
            let Some(node) = self.network.node(name) else {
                warn!(node = %name, "skipping results for unknown node");
                continue;
            };
            let (attr, dimension, unit) = node_output(node.type_name().unwrap_or_default());

            let series: Map<String, Value> = times
                .iter()
                .zip(values)
                .map(|(t, v)| (t.clone(), json!(v)))
                .collect();
            let value = serde_json::to_string(&json!({"value": series}))?;

            output.resourcescenarios.push(
                self.result_scenario(node, attr, dimension, unit, DATAFRAME, value)
                    .await?,
            );
        }

        for (group, series) in &self.results.metrics {
            if group.to_lowercase().contains(EXCLUDED_METRIC) {
                continue;
            }
            let Some((name, attr)) = parse_metric_group(group) else {
                warn!(group = %group, "skipping metric group without an attribute");
                continue;
            };
            let Some(node) = self.network.node(name) else {
                warn!(node = name, attr, "skipping metric for unknown node");
                continue;
            };

            let rs = if attr.to_lowercase().ends_with("_values") {
                let Some(first) = series.values.first() else {
                    warn!(group = %group, "skipping empty metric");
                    continue;
                };
                self.result_scenario(
                    node,
                    "Curtailment_value",
                    FLOW_DIMENSION,
                    FLOW_UNIT,
                    SCALAR,
                    serde_json::to_string(first)?,
                )
                .await?
            } else {
                let data: Map<String, Value> = series
                    .index
                    .iter()
                    .zip(&series.values)
                    .map(|(t, v)| (t.clone(), json!(v)))
                    .collect();
                self.result_scenario(
                    node,
                    "simulated_Curtailment",
                    FLOW_DIMENSION,
                    FLOW_UNIT,
                    DATAFRAME,
                    serde_json::to_string(&data)?,
                )
                .await?
            };
            output.resourcescenarios.push(rs);
        }

        info!(
            resource_scenarios = output.resourcescenarios.len(),
            "posting results"
        );
        Ok(self.client.update_scenario(&output).await?)
    }

    async fn result_scenario(
        &self,
        node: &HydraNode,
        attr_name: &str,
        dimension: &str,
        unit: &str,
        data_type: &str,
        value: String,
    ) -> Result<ResourceScenario, ResultsError> {
        let dim = self.client.get_dimension_by_name(dimension).await?;
        let attr = self
            .client
            .get_attribute_by_name_and_dimension(attr_name, Some(dim.id))
            .await?
            .ok_or_else(|| ResultsError::MissingAttribute {
                name: attr_name.to_string(),
                dimension: dimension.to_string(),
            })?;
        let unit_id = self
            .client
            .get_unit_by_abbreviation(unit)
            .await?
            .map(|u| u.id);

        let ra = self
            .client
            .add_resource_attribute("NODE", node.id, attr.id, true)
            .await?;
        debug!(node = %node.name, attr = attr_name, resource_attr_id = ra.id, "result attribute");

        Ok(ResourceScenario::new(
            ra.id,
            Dataset::new(attr.name, data_type, value).with_unit_id(unit_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_times() {
        let times = build_times(&[[2020, 0, 1, 1], [2020, 24, 1, 2], [2020, 48, 1, 3]]).unwrap();
        assert_eq!(times, vec!["2020-01-01", "2020-01-02", "2020-01-03"]);
    }

    #[test]
    fn test_hourly_times() {
        let times = build_times(&[[2020, 0, 1, 1], [2020, 1, 1, 1], [2020, 25, 1, 2]]).unwrap();
        assert_eq!(
            times,
            vec!["2020-01-01 00:00:00", "2020-01-01 01:00:00", "2020-01-02 01:00:00"]
        );
    }

    #[test]
    fn test_single_row_is_daily() {
        assert_eq!(build_times(&[[2021, 5, 3, 9]]).unwrap(), vec!["2021-03-09"]);
    }

    #[test]
    fn test_invalid_date() {
        let err = build_times(&[[2021, 0, 2, 30]]).unwrap_err();
        assert!(matches!(err, ResultsError::InvalidDate([2021, 0, 2, 30])));
    }

    #[test]
    fn test_node_output_by_type() {
        assert_eq!(node_output("Reservoir").0, "simulated_volume");
        assert_eq!(node_output("generator").1, "Power");
        assert_eq!(node_output("link"), ("simulated_flow", FLOW_DIMENSION, FLOW_UNIT));
    }

    #[test]
    fn test_parse_metric_group() {
        assert_eq!(
            parse_metric_group("/__Irrigation south__:Curtailment"),
            Some(("Irrigation south", "Curtailment"))
        );
        assert_eq!(parse_metric_group("/no_separator"), None);
    }

    #[test]
    fn test_results_from_json() {
        let results = SimulationResults::from_json_str(
            r#"{"time": [[2020, 0, 1, 1]], "nodes": {"a": [1.5]},
                "metrics": {"/__a__:x": {"index": ["2020-01"], "values": [2.0]}}}"#,
        )
        .unwrap();
        assert_eq!(results.nodes["a"], vec![1.5]);
        assert_eq!(results.metrics["/__a__:x"].values, vec![2.0]);
    }
}
