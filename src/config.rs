//! Load the configuration
use std::path::{Path, PathBuf};

use envconfig::Envconfig;
use serde::Deserialize;
use thiserror::Error;

use crate::{adapter, logging, sources::bridge};

/// Where to find the configuration.
#[derive(Envconfig)]
pub struct Environment {
    /// YAML file with the configuration
    #[envconfig(from = "CONFIG_FILE")]
    pub config_file: PathBuf,

    /// Optional YAML file layered over the configuration, e.g. for the token
    #[envconfig(from = "SECRETS_FILE")]
    pub secrets_file: Option<PathBuf>,
}

impl Environment {
    /// Load the environment from the environment variables.
    ///
    /// # Errors
    ///
    /// If `CONFIG_FILE` is not set.
    pub fn load() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }

    /// Load the configuration files named by the environment.
    ///
    /// # Errors
    ///
    /// If a file cannot be read or parsed.
    pub fn config(&self) -> Result<Config, Error> {
        load(&self.config_file, self.secrets_file.as_deref())
    }
}

/// The complete configuration
#[derive(Deserialize, Debug)]
pub struct Config {
    /// The bridge to poll
    pub bridge: bridge::Config,

    /// Polling behaviour
    #[serde(default)]
    pub adapter: adapter::Config,

    /// Logging setup
    #[serde(default)]
    pub logging: logging::Config,
}

/// An error loading the Config
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading the file
    #[error("Error reading file {0}: {1}")]
    File(PathBuf, std::io::Error),

    /// Error parsing the file
    #[error("Error parsing file {0}: {1}")]
    Yaml(PathBuf, serde_yml::Error),

    /// Error merging the files
    #[error("Error merging files: {0}")]
    Merge(#[from] crate::serde::Error),
}

fn load_file(filename: &Path) -> Result<serde_yml::Value, Error> {
    let f = std::fs::File::open(filename).map_err(|e| Error::File(filename.to_path_buf(), e))?;
    serde_yml::from_reader(f).map_err(|e| Error::Yaml(filename.to_path_buf(), e))
}

/// Load `config_file`, with `secrets_file` layered over it if given.
///
/// # Errors
///
/// If a file cannot be read or parsed, or the two do not fit together.
pub fn load(config_file: &Path, secrets_file: Option<&Path>) -> Result<Config, Error> {
    let config = load_file(config_file)?;

    let config = if let Some(secrets_file) = secrets_file {
        let secrets = load_file(secrets_file)?;
        crate::serde::merge_yaml(config, secrets)?
    } else {
        config
    };

    serde_yml::from_value(config).map_err(|e| Error::Yaml(config_file.to_path_buf(), e))
}
