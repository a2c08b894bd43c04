use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::env;

/// Port used when neither `PORT` nor `APP__PORT` is set.
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    /// Load the common settings.
    ///
    /// Precedence, lowest first: built-in default, the platform-supplied
    /// `PORT` variable, an optional `configuration` file, `APP__*` variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let port = resolve_default_port(env::var("PORT").ok().as_deref())?;

        let config = Cfg::builder()
            .set_default("port", i64::from(port))?
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Interpret the bare `PORT` variable handed to us by hosting platforms.
pub fn resolve_default_port(raw: Option<&str>) -> Result<u16, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PORT),
        Some(value) => value.parse::<u16>().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "PORT must be a valid port number, got '{}': {}",
                value,
                e
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_uses_default() {
        assert_eq!(resolve_default_port(None).unwrap(), DEFAULT_PORT);
        assert_eq!(resolve_default_port(Some("  ")).unwrap(), DEFAULT_PORT);
    }

    #[test]
    fn platform_port_is_parsed() {
        assert_eq!(resolve_default_port(Some("10000")).unwrap(), 10000);
    }

    #[test]
    fn garbage_port_is_a_config_error() {
        let err = resolve_default_port(Some("eighty")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
