use hydra_pywr_core::config::{
    DEFAULT_HYDRA_URL, DEFAULT_PYNSIM_FILE, DEFAULT_RULES_MODULE, DEFAULT_RUNNER_EXECUTABLE,
};
use hydra_pywr_core::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.hydra.url, DEFAULT_HYDRA_URL);
    assert_eq!(config.runner.executable, DEFAULT_RUNNER_EXECUTABLE);
    assert_eq!(config.output.pynsim_file, DEFAULT_PYNSIM_FILE);
    assert_eq!(config.output.rules_module, DEFAULT_RULES_MODULE);
    assert_eq!(config.network.template_id, None);
}

#[test]
fn test_config_to_toml() {
    let toml_str = Config::default_config_string();
    assert!(toml_str.contains("[hydra]"));
    assert!(toml_str.contains("[runner]"));
    assert!(toml_str.contains("[output]"));
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
[hydra]
url = "https://hydra.example.org"
user_id = 7

[network]
template_id = 12
water_template_id = 3
energy_template_id = 4
default_projection = "EPSG:27700"

[runner]
executable = "/opt/fdf/bin/fdf"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.hydra.url, "https://hydra.example.org");
    assert_eq!(config.hydra.user_id, Some(7));
    assert_eq!(config.network.template_id, Some(12));
    assert_eq!(config.network.default_projection.as_deref(), Some("EPSG:27700"));
    assert_eq!(config.runner.executable, "/opt/fdf/bin/fdf");
    assert_eq!(config.runner.command, "run");
}

#[test]
fn test_from_file_rejects_empty_url() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[hydra]\nurl = \"\"").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_password_not_serialized() {
    let mut config = Config::default();
    config.hydra.password = Some("secret".to_string());
    let toml_str = toml::to_string_pretty(&config).unwrap();
    assert!(!toml_str.contains("secret"));
}
