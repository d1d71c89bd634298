//! Default values for hydra-pywr configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Hydra Connection Defaults
// ============================================================================

/// Default Hydra server URL.
pub const DEFAULT_HYDRA_URL: &str = "http://localhost:8080";

/// Application name sent with every Hydra request.
pub const DEFAULT_APP_NAME: &str = "hydra-pywr";

/// Default HTTP timeout for Hydra requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Cookie carrying the Hydra session.
pub const SESSION_COOKIE: &str = "beaker.session.id";

// ============================================================================
// Network Defaults
// ============================================================================

/// Projection used by the integrated water/energy writers.
pub const INTEGRATED_PROJECTION: &str = "EPSG:4326";

/// Name of the baseline scenario created for every imported network.
pub const BASELINE_SCENARIO_NAME: &str = "Baseline";

/// Description of the baseline scenario.
pub const BASELINE_SCENARIO_DESCRIPTION: &str = "hydra-pywr Baseline scenario";

/// Template type name used for links.
pub const EDGE_TYPE_NAME: &str = "edge";

/// Domains of an integrated water/energy network, in template order.
pub const INTEGRATED_DOMAINS: &[&str] = &["water", "energy"];

// ============================================================================
// Runner Defaults
// ============================================================================

/// Executable used to run integrated models.
pub const DEFAULT_RUNNER_EXECUTABLE: &str = "fdf";

/// Sub-command passed to the runner executable.
pub const DEFAULT_RUNNER_COMMAND: &str = "run";

/// Prefix prepended to PYTHONPATH for the model process.
pub const DEFAULT_PYTHON_PATH_PREFIX: &str = ".:/app:";

// ============================================================================
// Output Defaults
// ============================================================================

/// Default output directory for written artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// Default pynsim configuration file name.
pub const DEFAULT_PYNSIM_FILE: &str = "pynsim_model.json";

/// Default file name of the custom rules module.
pub const DEFAULT_RULES_MODULE: &str = "hydra_pywr_custom_module.py";

/// Default file name for the multi-network config.
pub const DEFAULT_MULTI_CONFIG_FILE: &str = "multiconfig.json";

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";
