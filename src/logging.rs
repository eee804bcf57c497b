//! Set up the tracing subscriber
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

fn default_filter() -> String {
    "info".to_string()
}

const fn default_ansi() -> bool {
    true
}

/// Logging configuration
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Default filter directives, used if `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Use colours in the output.
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: default_ansi(),
        }
    }
}

/// An error setting up logging
#[derive(Error, Debug)]
pub enum Error {
    /// A filter directive could not be parsed.
    #[error("Invalid filter directive: {0}")]
    Filter(#[from] ParseError),

    /// A global subscriber was already installed.
    #[error("TryInitError error: {0}")]
    TryInit(#[from] tracing_subscriber::util::TryInitError),
}

fn build_filter(config: &Config) -> Result<EnvFilter, Error> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(&config.filter)?,
    };

    // The HTTP client logs every connection at debug level.
    let filter = filter
        .add_directive("hyper=error".parse()?)
        .add_directive("reqwest=error".parse()?);

    Ok(filter)
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// If the filter is invalid or a subscriber was already installed.
pub fn init_tracing_subscriber(config: &Config) -> Result<(), Error> {
    let filter = build_filter(config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(config.ansi))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yml::from_str("{}").unwrap();
        assert_eq!(config.filter, "info");
        assert!(config.ansi);
    }

    #[test]
    fn test_bad_filter() {
        let config = Config {
            filter: "nuki_bridge=loud".to_string(),
            ansi: false,
        };
        if std::env::var(EnvFilter::DEFAULT_ENV).is_err() {
            assert!(matches!(build_filter(&config), Err(Error::Filter(_))));
        }
    }
}
