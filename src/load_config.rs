use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{error, info};

use crate::config::DeployConfig;

/// Loads and validates a YAML deploy configuration. Any failure here is
/// fatal and happens before a single remote call is issued.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DeployConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: DeployConfig = match serde_yaml::from_str(&config_content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            config
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Err(reason) = config.validate() {
        error!(reason = %reason, "Config validation failed");
        anyhow::bail!("Invalid configuration: {reason}");
    }

    config.trace_loaded();
    Ok(config)
}
