//! Shared fixtures for unit tests.

use serde_json::json;

use crate::hydra::Template;
use crate::network::PywrNetwork;

pub const TEMPLATE_ID: i64 = 1;
pub const ENERGY_TEMPLATE_ID: i64 = 2;

pub fn sample_template() -> Template {
    serde_json::from_value(json!({
        "id": TEMPLATE_ID,
        "name": "Pywr",
        "templatetypes": [
            {"id": 10, "name": "pywr_network", "resource_type": "NETWORK", "typeattrs": []},
            {"id": 11, "name": "catchment", "resource_type": "NODE", "typeattrs": []},
            {"id": 12, "name": "Storage", "resource_type": "NODE", "typeattrs": [
                {"attr_id": 100, "attr": {"id": 100, "name": "max_volume"}}
            ]},
            {"id": 13, "name": "output", "resource_type": "NODE", "typeattrs": []},
            {"id": 14, "name": "input", "resource_type": "NODE", "typeattrs": []},
            {"id": 15, "name": "edge", "resource_type": "LINK", "typeattrs": []}
        ]
    }))
    .unwrap()
}

pub fn energy_template() -> Template {
    serde_json::from_value(json!({
        "id": ENERGY_TEMPLATE_ID,
        "name": "Pywr energy",
        "templatetypes": [
            {"id": 20, "name": "energy_network", "resource_type": "NETWORK", "typeattrs": []},
            {"id": 21, "name": "generator", "resource_type": "NODE", "typeattrs": []},
            {"id": 22, "name": "load", "resource_type": "NODE", "typeattrs": []},
            {"id": 23, "name": "edge", "resource_type": "LINK", "typeattrs": []}
        ]
    }))
    .unwrap()
}

pub fn sample_network() -> PywrNetwork {
    PywrNetwork::from_value(json!({
        "metadata": {"title": "Demo", "description": "demo network", "minimum_version": "1.0"},
        "timestepper": {"start": "2020-01-01", "end": "2020-12-31", "timestep": 1},
        "nodes": [
            {"name": "catchment", "type": "catchment", "flow": "__catchment__:flow",
             "position": {"schematic": [1, 2]}},
            {"name": "reservoir", "type": "storage", "comment": "main store",
             "max_volume": 100, "initial_volume": 50, "position": {"geographic": [10, 20]}},
            {"name": "demand", "type": "output", "max_flow": 10, "cost": -10}
        ],
        "edges": [["catchment", "reservoir"], ["reservoir", "demand"]],
        "parameters": {
            "__catchment__:flow": {"type": "constant", "value": 5},
            "shared": {"type": "monthlyprofile", "values": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]}
        },
        "recorders": {
            "demand_flow": {"type": "numpyarraynoderecorder", "node": "demand"}
        },
        "tables": {
            "demands": {"url": "demands.csv", "index_col": 0}
        },
        "scenarios": [{"name": "climate", "size": 2}]
    }))
    .unwrap()
}

pub fn energy_network() -> PywrNetwork {
    PywrNetwork::from_value(json!({
        "metadata": {"title": "Grid", "description": "energy side"},
        "timestepper": {"start": "2020-01-01", "end": "2020-12-31", "timestep": 1},
        "nodes": [
            {"name": "turbine", "type": "generator", "max_flow": 40},
            {"name": "city", "type": "load", "max_flow": 30}
        ],
        "edges": [["turbine", "city"]]
    }))
    .unwrap()
}
