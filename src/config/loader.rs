use std::{fs, fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use config::{Config, Environment};
use log::{info, trace};

use super::GatewayConfig;
use crate::address::Network;

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub network: Option<Network>,
    pub indexer_host: Option<String>,
    pub indexer_port: Option<u16>,
    pub api_port: Option<u16>,
}

impl ConfigOverrides {
    fn properties(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(network) = self.network {
            overrides.push(("network", network.to_string()));
        }
        if let Some(host) = &self.indexer_host {
            overrides.push(("indexer.host", host.clone()));
        }
        if let Some(port) = self.indexer_port {
            overrides.push(("indexer.port", port.to_string()));
        }
        if let Some(port) = self.api_port {
            overrides.push(("api.port", port.to_string()));
        }
        overrides
    }
}

pub fn get_default_config() -> &'static str {
    include_str!("../../config/config.toml")
}

/// Loads `path` (writing the default template first if it does not exist),
/// layers `GATEWAY_*` environment variables and then `overrides` on top.
pub fn load_configuration(path: &Path, overrides: &ConfigOverrides) -> Result<GatewayConfig> {
    if !path.exists() {
        write_config_to(path, get_default_config()).context("Could not create default config")?;
        info!(path:% = path.display(); "Created new configuration file");
    }

    let filename = path.to_str().context("Invalid config file path")?;

    let cfg = Config::builder()
        .add_source(config::File::with_name(filename))
        .add_source(Environment::with_prefix("GATEWAY").prefix_separator("_").separator("__"))
        .build()
        .context("Could not build initial config")?;

    let overrides_list = overrides.properties();
    let cfg = if overrides_list.is_empty() {
        cfg
    } else {
        let mut builder = Config::builder().add_source(cfg);
        for (key, value) in overrides_list {
            trace!("Set override: ({key}, {value})");
            builder = builder
                .set_override(key, value)
                .context("Could not override config property")?;
        }
        builder.build().context("Could not build final config")?
    };

    cfg.try_deserialize::<GatewayConfig>()
        .context("Invalid gateway configuration")
}

pub fn write_config_to(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create parent directories")?;
    };

    let mut file = File::create(path).context("Failed to create config file")?;
    file.write_all(source.as_bytes())
        .context("Failed to write config content")?;
    file.write_all(b"\n").context("Failed to write newline")?;
    Ok(())
}
