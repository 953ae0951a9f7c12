use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub netfile: NetfileConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetfileConfig {
    /// Root URL of the NetFile Connect2 public API.
    pub api_root: String,
    /// Agency id used for filing list queries.
    pub aid: String,
    /// FPPC Form 700 Statement of Economic Interests (2018-2019).
    pub form_type: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory for manifests, downloaded filings, and extracts.
    pub data_root: PathBuf,
    /// Location of the per-run relational store.
    pub database_path: PathBuf,
    /// Destination directory of the local warehouse loader.
    pub warehouse_root: PathBuf,
}

impl Default for NetfileConfig {
    fn default() -> Self {
        Self {
            api_root: "https://netfile.com/Connect2/api".to_string(),
            aid: "coak".to_string(),
            form_type: 254,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            database_path: PathBuf::from("data/reporting.db"),
            warehouse_root: PathBuf::from("data/warehouse"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            netfile: NetfileConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        match fs::read_to_string(config_path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}
