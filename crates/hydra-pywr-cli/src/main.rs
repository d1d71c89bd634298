use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hydra_pywr_core::hydra::Template;
use hydra_pywr_core::storage::file_name_for;
use hydra_pywr_core::tools::MultiEntry;
use hydra_pywr_core::{
    Config, FileStorage, HydraClient, HydraToPywrNetwork, JsonConnection, MemoryClient,
    NetworkManager, PywrNetwork, Storage,
};

#[derive(Parser)]
#[command(name = "hydra-pywr")]
#[command(about = "Move Pywr networks in and out of a Hydra server", long_about = None)]
struct Cli {
    /// Config file to use instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hydra server URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Existing Hydra session id
    #[arg(long, global = true)]
    session_id: Option<String>,

    #[arg(long, global = true)]
    user_id: Option<i64>,

    /// Directory that exported files are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a Pywr JSON file to Hydra JSON without a server
    Convert {
        /// Pywr network file
        network: PathBuf,

        /// Hydra template exported as JSON
        #[arg(long)]
        template: PathBuf,

        /// Output file name, relative to the output directory
        #[arg(short, long)]
        output: Option<String>,

        #[arg(long)]
        projection: Option<String>,
    },
    /// Import a Pywr JSON file into Hydra
    Import {
        network: PathBuf,

        #[arg(long)]
        template_id: Option<i64>,

        #[arg(long)]
        projection: Option<String>,
    },
    /// Export a Hydra scenario as a Pywr JSON file
    Export {
        scenario_id: i64,

        /// Which template type to read the network with
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// Run the model on a Pywr JSON file
    Run {
        /// Config file, relative to the output directory
        config_file: PathBuf,
    },
    /// Import a water-energy pynsim config and its networks
    ImportIntegrated {
        pynsim_config: PathBuf,

        #[arg(long)]
        projection: Option<String>,
    },
    /// Export a water-energy scenario as a pynsim config
    ExportIntegrated { scenario_id: i64 },
    /// Write simulation results into a Hydra scenario
    WriteResults {
        scenario_id: i64,

        /// Results file in JSON form
        results: PathBuf,

        #[arg(long)]
        template_id: Option<i64>,
    },
    /// Export every network of a multi-network model
    ExportMulti { scenario_id: i64, network_id: i64 },
    /// Merge several Hydra scenarios into one multi-network model
    MergeMulti {
        /// Networks to merge, as TEMPLATE_ID:SCENARIO_ID
        #[arg(required = true)]
        entries: Vec<String>,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        print!("{}", Config::default_config_string());
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_logging(&config, cli.verbose);
    debug!(url = %config.hydra.url, output_dir = %config.output.output_dir, "loaded config");

    let storage = FileStorage::new(config.output.output_path());

    if let Commands::Convert {
        network,
        template,
        output,
        projection,
    } = &cli.command
    {
        return convert(config, storage, network, template, output.as_deref(), projection.as_deref()).await;
    }

    let client = JsonConnection::connect(&config.hydra)
        .await
        .wrap_err_with(|| format!("connecting to {}", config.hydra.url))?;
    let manager = NetworkManager::new(client, storage, config);

    match cli.command {
        Commands::Import {
            network,
            template_id,
            projection,
        } => {
            let stored = manager
                .import_file(&network, template_id, projection.as_deref())
                .await?;
            println!("Imported network: {}", stored.name);
            println!("  Network ID: {}", display_id(stored.id));
            if let Some(scenario) = stored.scenarios.first() {
                println!("  Scenario ID: {}", display_id(scenario.id));
            }
        }
        Commands::Export { scenario_id, index } => {
            let outcome = manager.export_network(scenario_id, index).await?;
            println!("Exported: {}", outcome.network_file.display());
            if let Some(module) = outcome.rules_module {
                println!("Rules: {}", module.display());
            }
        }
        Commands::Run { config_file } => {
            let spinner = spinner(format!("Running {}", config_file.display()));
            let result = manager.run_network(&config_file).await;
            spinner.finish_and_clear();
            let outcome = result?;
            print!("{}", outcome.stdout);
            info!(code = ?outcome.status.code(), "run finished");
        }
        Commands::ImportIntegrated {
            pynsim_config,
            projection,
        } => {
            let stored = manager
                .import_integrated(&pynsim_config, projection.as_deref())
                .await?;
            println!("Imported integrated network: {}", stored.name);
            println!("  Network ID: {}", display_id(stored.id));
        }
        Commands::ExportIntegrated { scenario_id } => {
            let manifest = manager.export_integrated(scenario_id).await?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Commands::WriteResults {
            scenario_id,
            results,
            template_id,
        } => {
            let spinner = spinner(format!("Writing results to scenario {scenario_id}"));
            let result = manager.write_results(scenario_id, template_id, &results).await;
            spinner.finish_and_clear();
            let scenario = result?;
            println!(
                "Updated scenario {} with {} datasets",
                display_id(scenario.id),
                scenario.resourcescenarios.len()
            );
        }
        Commands::ExportMulti {
            scenario_id,
            network_id,
        } => {
            for path in manager.export_multi(scenario_id, network_id).await? {
                println!("Exported: {}", path.display());
            }
        }
        Commands::MergeMulti {
            entries,
            name,
            description,
        } => {
            let entries = read_entries(manager.client(), &entries).await?;
            let merged = manager.merge_multi(&entries, &name, &description).await?;
            println!("Merged {} networks into: {}", entries.len(), merged.name);
            println!("  Network ID: {}", display_id(merged.id));
        }
        Commands::Convert { .. } | Commands::Config => unreachable!("handled above"),
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .wrap_err_with(|| format!("loading config from {}", path.display()))?,
        None => Config::load()?,
    };

    if let Some(url) = &cli.url {
        config.hydra.url = url.clone();
    }
    if let Some(session_id) = &cli.session_id {
        config.hydra.session_id = Some(session_id.clone());
    }
    if let Some(user_id) = cli.user_id {
        config.hydra.user_id = Some(user_id);
    }
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.to_string_lossy().into_owned();
    }
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn display_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

/// Converts offline: the template comes from a file and the Hydra form is
/// written next to the other outputs instead of being posted.
async fn convert(
    config: Config,
    storage: FileStorage,
    network: &Path,
    template: &Path,
    output: Option<&str>,
    projection: Option<&str>,
) -> Result<()> {
    let content = std::fs::read_to_string(template)
        .wrap_err_with(|| format!("reading template {}", template.display()))?;
    let template: Template = serde_json::from_str(&content)
        .wrap_err_with(|| format!("parsing template {}", template.display()))?;
    let template_id = template.id;

    let client = MemoryClient::new();
    client.add_template(template);

    let network = PywrNetwork::from_file(network)?;
    let file = output.map_or_else(|| format!("{}.hydra.json", file_name_for(network.title())), str::to_string);

    let manager = NetworkManager::new(client, storage, config);
    let hydra = manager
        .convert_network(network, Some(template_id), projection)
        .await?;
    let path = manager
        .storage()
        .write_json(&file, &serde_json::to_value(&hydra)?)?;

    println!("Converted: {}", path.display());
    println!("  Nodes: {}  Links: {}", hydra.nodes.len(), hydra.links.len());
    Ok(())
}

/// Reads the networks named by `TEMPLATE_ID:SCENARIO_ID` pairs.
async fn read_entries<C: HydraClient>(client: &C, args: &[String]) -> Result<Vec<MultiEntry>> {
    let mut entries = Vec::with_capacity(args.len());
    for arg in args {
        let (template_id, scenario_id) = arg
            .split_once(':')
            .and_then(|(t, s)| Some((t.trim().parse().ok()?, s.trim().parse().ok()?)))
            .ok_or_else(|| eyre!("invalid entry `{arg}`, expected TEMPLATE_ID:SCENARIO_ID"))?;

        let reader = HydraToPywrNetwork::from_scenario_id(client, scenario_id, 0).await?;
        let network = reader.build_pywr_network(None)?;
        entries.push(MultiEntry {
            template_id,
            scenario_id,
            network,
        });
    }
    Ok(entries)
}
