use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_TARGET_FORMAT: &str = "docx";
pub const DEFAULT_SOFFICE_PATH: &str = "soffice";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_CONCURRENT: usize = 4;
pub const DEFAULT_QUEUE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub workspace: WorkspaceConfig,
    pub conversion: ConversionConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Scratch space for uploads and converted files.
    pub upload_dir: PathBuf,
    /// Static assets; `index.html` here is the landing page.
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    pub default_format: String,
    pub soffice_path: String,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub queue_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_format: DEFAULT_TARGET_FORMAT.to_string(),
            soffice_path: DEFAULT_SOFFICE_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            queue_timeout_secs: DEFAULT_QUEUE_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl ConversionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrent == 0 {
            return Err(config_error("MAX_CONCURRENT_CONVERSIONS must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(config_error("CONVERSION_TIMEOUT_SECS must be at least 1"));
        }
        if self.max_upload_bytes == 0 {
            return Err(config_error("MAX_UPLOAD_BYTES must be at least 1"));
        }
        if self.soffice_path.trim().is_empty() {
            return Err(config_error("SOFFICE_PATH must not be empty"));
        }
        Ok(())
    }
}

impl ConvertConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env, PORT and the APP__ prefix)
        let common = core_config::Config::load()?;

        let config = ConvertConfig {
            common,
            workspace: WorkspaceConfig {
                upload_dir: PathBuf::from(get_env("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
                public_dir: PathBuf::from(get_env("PUBLIC_DIR", DEFAULT_PUBLIC_DIR)),
            },
            conversion: ConversionConfig {
                default_format: get_env("DEFAULT_TARGET_FORMAT", DEFAULT_TARGET_FORMAT),
                soffice_path: get_env("SOFFICE_PATH", DEFAULT_SOFFICE_PATH),
                timeout_secs: get_parsed("CONVERSION_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
                max_concurrent: get_parsed("MAX_CONCURRENT_CONVERSIONS", DEFAULT_MAX_CONCURRENT)?,
                queue_timeout_secs: get_parsed("QUEUE_TIMEOUT_SECS", DEFAULT_QUEUE_TIMEOUT_SECS)?,
                max_upload_bytes: get_parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
            telemetry: TelemetryConfig {
                log_level: get_env("LOG_LEVEL", "info"),
                otlp_endpoint: env::var("OTLP_ENDPOINT")
                    .ok()
                    .filter(|v| !v.trim().is_empty()),
            },
        };

        config.conversion.validate()?;
        Ok(config)
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(format!(
            "{} has invalid value '{}': {}",
            key, raw, e
        )))
    })
}
