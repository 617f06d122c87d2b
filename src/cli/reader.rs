use serde::Deserialize;

use crate::error::ConfigError;

/// The YAML configuration file, every key optional so the command line can fill the gaps.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub source_org: Option<String>,
    pub target_org: Option<String>,
    pub source_token: Option<String>,
    pub target_token: Option<String>,
    pub max_retries: Option<u32>,
    pub workers: Option<usize>,
    pub debug: Option<bool>,
    pub settle_delay_secs: Option<u64>,
    pub retry_base_delay_ms: Option<u64>,
    pub report_path: Option<String>,
    pub gh_path: Option<String>,
    pub exclude: Option<Vec<String>>,
}

pub fn read_config(config: &str) -> Result<Config, ConfigError> {
    if config.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(config)?;
    Ok(config)
}
