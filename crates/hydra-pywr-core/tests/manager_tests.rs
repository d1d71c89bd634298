use hydra_pywr_core::hydra::Template;
use hydra_pywr_core::manager::ManagerError;
use hydra_pywr_core::{Config, FileStorage, MemoryClient, NetworkManager, PywrNetwork, Storage};
use serde_json::json;
use tempfile::TempDir;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn template(id: i64, network_type: &str, node_types: &[&str]) -> Template {
    let mut types = vec![json!({"id": id * 10, "name": network_type, "resource_type": "NETWORK"})];
    for (i, name) in node_types.iter().enumerate() {
        types.push(json!({"id": id * 10 + 1 + i as i64, "name": name, "resource_type": "NODE"}));
    }
    types.push(json!({"id": id * 10 + 9, "name": "edge", "resource_type": "LINK"}));
    serde_json::from_value(json!({"id": id, "name": network_type, "templatetypes": types})).unwrap()
}

fn create_test_manager() -> (NetworkManager<MemoryClient, FileStorage>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let client = MemoryClient::new();
    client.add_template(
        serde_json::from_str(&std::fs::read_to_string(fixture("template.json")).unwrap()).unwrap(),
    );
    client.add_template(template(7, "water", &["catchment", "storage", "output"]));
    client.add_template(template(8, "energy", &["generator", "load"]));

    let mut config = Config::default();
    config.network.template_id = Some(5);
    config.network.water_template_id = Some(7);
    config.network.energy_template_id = Some(8);
    config.network.project_id = Some(3);

    let storage = FileStorage::new(temp_dir.path().join("out"));
    (NetworkManager::new(client, storage, config), temp_dir)
}

fn write_integrated_inputs(dir: &std::path::Path) -> std::path::PathBuf {
    std::fs::copy(fixture("demo_network.json"), dir.join("water.json")).unwrap();
    std::fs::write(
        dir.join("energy.json"),
        json!({
            "metadata": {"title": "Grid"},
            "timestepper": {"start": "2015-01-01", "end": "2015-12-31", "timestep": 7},
            "nodes": [
                {"name": "turbine", "type": "generator", "max_flow": 40},
                {"name": "city", "type": "load", "max_flow": 30}
            ],
            "edges": [["turbine", "city"]],
            "parameters": {"tariff": {"type": "constant", "value": 2}}
        })
        .to_string(),
    )
    .unwrap();

    let config_path = dir.join("pynsim.json");
    std::fs::write(
        &config_path,
        json!({
            "name": "Coupled",
            "engines": [
                {"name": "water", "engine": "PywrEngine", "args": ["water.json"]},
                {"name": "energy", "engine": "PywrEngine", "args": ["energy.json"]}
            ]
        })
        .to_string(),
    )
    .unwrap();
    config_path
}

#[tokio::test]
async fn test_import_file_uses_configured_template() {
    let (manager, _temp) = create_test_manager();

    let stored = manager
        .import_file(fixture("demo_network.json"), None, None)
        .await
        .unwrap();
    assert_eq!(stored.name, "Thames demo");
    assert_eq!(stored.project_id, Some(3));
    assert_eq!(stored.types[0].template_id, Some(5));
    assert_eq!(manager.client().network_ids(), vec![stored.id.unwrap()]);
}

#[tokio::test]
async fn test_export_writes_title_named_file() {
    let (manager, _temp) = create_test_manager();
    let stored = manager
        .import_file(fixture("demo_network.json"), None, None)
        .await
        .unwrap();

    let outcome = manager
        .export_network(stored.scenarios[0].id.unwrap(), 0)
        .await
        .unwrap();
    assert!(outcome.network_file.ends_with("Thames demo.json"));
    assert_eq!(outcome.rules_module, None);

    let doc = manager.storage().read_json("Thames demo.json").unwrap();
    assert_eq!(doc["metadata"]["title"], json!("Thames demo"));
    assert_eq!(doc["nodes"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_forbidden_rule_fails_export() {
    let (manager, _temp) = create_test_manager();
    let stored = manager
        .import_file(fixture("demo_network.json"), None, None)
        .await
        .unwrap();
    manager
        .client()
        .add_rule(stored.id.unwrap(), "sneaky", "import os\nos.remove('x')");

    let err = manager
        .export_network(stored.scenarios[0].id.unwrap(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Reader(_)));
}

#[tokio::test]
async fn test_integrated_round_trip() {
    let (manager, temp) = create_test_manager();
    let config_path = write_integrated_inputs(temp.path());

    let stored = manager.import_integrated(&config_path, None).await.unwrap();
    assert_eq!(stored.name, "Coupled");
    assert_eq!(stored.nodes.len(), 6);
    assert_eq!(stored.projection, None);

    let manifest = manager
        .export_integrated(stored.scenarios[0].id.unwrap())
        .await
        .unwrap();
    assert_eq!(manifest["water"]["file"], json!("water.json"));
    assert_eq!(manifest["config"], json!("pynsim_model.json"));

    let storage = manager.storage();
    let water = PywrNetwork::from_value(storage.read_json("water.json").unwrap()).unwrap();
    let energy = PywrNetwork::from_value(storage.read_json("energy.json").unwrap()).unwrap();
    assert_eq!(water.nodes.len(), 4);
    assert_eq!(energy.nodes.len(), 2);
    assert_eq!(energy.title(), "Grid");

    // each domain only gets its own global components
    assert!(energy.parameter("tariff").is_some());
    assert!(energy.parameter("reservoir_cost").is_none());
    assert!(water.parameter("tariff").is_none());
    assert_eq!(water.tables.len(), 1);

    let config = storage.read_json("pynsim_model.json").unwrap();
    assert_eq!(config["name"], json!("Coupled"));
}

#[tokio::test]
async fn test_integrated_requires_template_ids() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_integrated_inputs(temp_dir.path());
    let manager = NetworkManager::new(
        MemoryClient::new(),
        FileStorage::new(temp_dir.path()),
        Config::default(),
    );

    let err = manager.import_integrated(&config_path, None).await.unwrap_err();
    assert!(matches!(err, ManagerError::MissingTemplateId("network.water_template_id")));
}
