use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::client::{ClientError, HydraClient};
use crate::config::Config;
use crate::hydra::{HydraNetwork, HydraScenario};
use crate::network::{IntegratedNetwork, NetworkError, PywrNetwork};
use crate::reader::{read_integrated, HydraToPywrNetwork, ReaderError};
use crate::results::{ResultsError, ResultsWriter, SimulationResults};
use crate::runner::{ModelRunner, RunOutcome, RunnerError};
use crate::storage::{file_name_for, Storage, StorageError};
use crate::tools::{self, MultiEntry, ToolsError};
use crate::writer::{HydraIntegratedWriter, IntegratedJsonWriter, PywrHydraWriter, WriterError};

/// Files written by an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub network_file: PathBuf,
    pub rules_module: Option<PathBuf>,
}

/// Runs conversion workflows against a Hydra client.
///
/// Artifacts go to the storage backend; template, project and runner
/// settings come from the [`Config`].
pub struct NetworkManager<C: HydraClient, S: Storage> {
    client: C,
    storage: S,
    config: Config,
}

impl<C: HydraClient, S: Storage> NetworkManager<C, S> {
    pub fn new(client: C, storage: S, config: Config) -> Self {
        Self {
            client,
            storage,
            config,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn template_id(&self, template_id: Option<i64>) -> Result<i64, ManagerError> {
        template_id
            .or(self.config.network.template_id)
            .ok_or(ManagerError::MissingTemplateId("network.template_id"))
    }

    fn writer(&self, network: PywrNetwork, template_id: i64) -> PywrHydraWriter<'_, C> {
        PywrHydraWriter::new(&self.client, network, template_id)
            .with_project(self.config.network.project_id)
            .with_default_projection(self.config.network.default_projection.clone())
    }

    /// Builds the Hydra form of a network without posting it.
    pub async fn convert_network(
        &self,
        network: PywrNetwork,
        template_id: Option<i64>,
        projection: Option<&str>,
    ) -> Result<HydraNetwork, ManagerError> {
        let template_id = self.template_id(template_id)?;
        let mut writer = self.writer(network, template_id);
        Ok(writer.build_hydra_network(projection, None).await?)
    }

    /// Builds a network and posts it to Hydra.
    pub async fn import_network(
        &self,
        network: PywrNetwork,
        template_id: Option<i64>,
        projection: Option<&str>,
    ) -> Result<HydraNetwork, ManagerError> {
        let template_id = self.template_id(template_id)?;
        let mut writer = self.writer(network, template_id);
        writer.build_hydra_network(projection, None).await?;
        let stored = writer.add_network_to_hydra().await?;
        info!(network_id = ?stored.id, name = %stored.name, "imported network");
        Ok(stored)
    }

    /// Imports a Pywr document from a file.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        template_id: Option<i64>,
        projection: Option<&str>,
    ) -> Result<HydraNetwork, ManagerError> {
        let network = PywrNetwork::from_file(path)?;
        self.import_network(network, template_id, projection).await
    }

    /// Reads a scenario back and writes it as `<title>.json`, plus the
    /// rules module when the network has rules. The title is reduced to a
    /// single file name inside the output directory.
    pub async fn export_network(
        &self,
        scenario_id: i64,
        index: usize,
    ) -> Result<ExportOutcome, ManagerError> {
        let reader = HydraToPywrNetwork::from_scenario_id(&self.client, scenario_id, index).await?;
        let network = reader.build_pywr_network(None)?;

        let file = format!("{}.json", file_name_for(network.title()));
        let network_file = self.storage.write_json(&file, &network.as_dict())?;

        let rules_module = if reader.has_rules() {
            Some(reader.write_rules_module(&self.storage, &self.config.output.rules_module)?)
        } else {
            None
        };

        info!(scenario_id, file = %network_file.display(), "exported network");
        Ok(ExportOutcome {
            network_file,
            rules_module,
        })
    }

    /// Imports a pynsim config and the networks it names.
    pub async fn import_integrated(
        &self,
        config_path: impl AsRef<Path>,
        projection: Option<&str>,
    ) -> Result<HydraNetwork, ManagerError> {
        let network = IntegratedNetwork::from_config_file(config_path)?;
        let water = self
            .config
            .network
            .water_template_id
            .ok_or(ManagerError::MissingTemplateId("network.water_template_id"))?;
        let energy = self
            .config
            .network
            .energy_template_id
            .ok_or(ManagerError::MissingTemplateId("network.energy_template_id"))?;

        let mut writer = HydraIntegratedWriter::new(&self.client, network, water, energy)
            .with_project(self.config.network.project_id);
        writer.build_hydra_integrated_network(projection).await?;
        let stored = writer.add_network_to_hydra().await?;
        info!(network_id = ?stored.id, "imported integrated network");
        Ok(stored)
    }

    /// Exports an integrated scenario as pynsim config plus one document
    /// per domain. Returns the manifest of written files.
    pub async fn export_integrated(&self, scenario_id: i64) -> Result<Value, ManagerError> {
        let (network, rules) = read_integrated(&self.client, scenario_id).await?;
        let manifest = IntegratedJsonWriter::new(&network)
            .write_as_pynsim(&self.storage, &self.config.output.pynsim_file)?;

        if !rules.is_empty() {
            let module = crate::reader::render_rules_module(&rules)?;
            self.storage
                .write_text(&self.config.output.rules_module, &module)?;
        }
        Ok(manifest)
    }

    /// Launches the configured model runner on a written config.
    pub async fn run_network(&self, config_path: impl AsRef<Path>) -> Result<RunOutcome, ManagerError> {
        let path = self.storage.path_of(&config_path.as_ref().to_string_lossy());
        Ok(ModelRunner::from_config(&self.config.runner).run(path).await?)
    }

    /// Posts simulation results into the scenario they were run from.
    pub async fn write_results(
        &self,
        scenario_id: i64,
        template_id: Option<i64>,
        results_path: impl AsRef<Path>,
    ) -> Result<HydraScenario, ManagerError> {
        let results = SimulationResults::from_file(results_path)?;
        let writer = ResultsWriter::new(&self.client, scenario_id, template_id, results).await?;
        Ok(writer.build_hydra_output().await?)
    }

    pub async fn export_multi(&self, scenario_id: i64, network_id: i64) -> Result<Vec<PathBuf>, ManagerError> {
        Ok(tools::export_multi(
            &self.client,
            scenario_id,
            network_id,
            &self.storage,
            &self.config.output.multi_config_file,
        )
        .await?)
    }

    pub async fn merge_multi(
        &self,
        entries: &[MultiEntry],
        name: &str,
        description: &str,
    ) -> Result<HydraNetwork, ManagerError> {
        Ok(tools::merge_multi(
            &self.client,
            entries,
            self.config.network.project_id,
            name,
            description,
        )
        .await?)
    }
}

/// Errors that can occur in NetworkManager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("No template id given and `{0}` is not configured")]
    MissingTemplateId(&'static str),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Tools error: {0}")]
    Tools(#[from] ToolsError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::storage::FileStorage;
    use crate::test_support::{sample_network, sample_template, TEMPLATE_ID};
    use tempfile::TempDir;

    fn create_test_manager() -> (NetworkManager<MemoryClient, FileStorage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let client = MemoryClient::new();
        client.add_template(sample_template());
        let storage = FileStorage::new(temp_dir.path());
        let mut config = Config::default();
        config.network.template_id = Some(TEMPLATE_ID);
        (NetworkManager::new(client, storage, config), temp_dir)
    }

    #[tokio::test]
    async fn test_convert_does_not_post() {
        let (manager, _temp) = create_test_manager();
        let network = manager
            .convert_network(sample_network(), None, None)
            .await
            .unwrap();
        assert_eq!(network.id, None);
        assert!(manager.client().network_ids().is_empty());
    }

    #[tokio::test]
    async fn test_import_then_export() {
        let (manager, temp) = create_test_manager();
        let stored = manager
            .import_network(sample_network(), None, None)
            .await
            .unwrap();
        let network_id = stored.id.unwrap();
        manager
            .client()
            .add_rule(network_id, "custom", "class Custom:\n    pass");

        let outcome = manager
            .export_network(stored.scenarios[0].id.unwrap(), 0)
            .await
            .unwrap();
        assert_eq!(outcome.network_file, temp.path().join("Demo.json"));
        assert_eq!(
            outcome.rules_module,
            Some(temp.path().join("hydra_pywr_custom_module.py"))
        );

        let exported = PywrNetwork::from_file(&outcome.network_file).unwrap();
        assert_eq!(exported.nodes.len(), 3);
    }

    #[tokio::test]
    async fn test_export_keeps_titles_inside_output_dir() {
        let (manager, temp) = create_test_manager();

        for (title, file) in [
            ("../../escape/x", ".._.._escape_x.json"),
            ("/tmp/x", "_tmp_x.json"),
        ] {
            let mut network = sample_network();
            network.metadata.insert("title", serde_json::json!(title));
            let stored = manager.import_network(network, None, None).await.unwrap();

            let outcome = manager
                .export_network(stored.scenarios[0].id.unwrap(), 0)
                .await
                .unwrap();
            assert_eq!(outcome.network_file, temp.path().join(file));
            assert!(outcome.network_file.exists());
        }
        assert!(!temp.path().join("..").join("..").join("escape").exists());
    }

    #[tokio::test]
    async fn test_missing_template_id() {
        let (mut manager, _temp) = create_test_manager();
        manager.config.network.template_id = None;
        let err = manager
            .convert_network(sample_network(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::MissingTemplateId(_)));
    }
}
