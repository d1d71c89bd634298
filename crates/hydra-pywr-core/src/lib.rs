pub mod client;
pub mod config;
pub mod hydra;
pub mod manager;
pub mod network;
pub mod reader;
pub mod results;
pub mod runner;
pub mod storage;
pub mod tools;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use client::{HydraClient, JsonConnection, MemoryClient};
pub use config::Config;
pub use manager::{ManagerError, NetworkManager};
pub use network::{IntegratedNetwork, PywrNetwork};
pub use reader::HydraToPywrNetwork;
pub use results::{ResultsWriter, SimulationResults};
pub use runner::ModelRunner;
pub use storage::{FileStorage, Storage};
pub use writer::{HydraIntegratedWriter, IntegratedJsonWriter, PywrHydraWriter, PywrJsonWriter};
