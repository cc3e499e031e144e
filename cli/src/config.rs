use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Runtime settings for the `allocate` binary, read from the environment
/// (and a `.env` file when present). Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
    pub telemetry: TelemetryConfig,
}

impl CliConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let output_dir = env::var("ALLOC_OUTPUT_DIR").unwrap_or_else(|_| "out".to_string());

        let seed = match env::var("ALLOC_SEED") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidSeed(raw.clone()))?,
            ),
            _ => None,
        };

        let log_level = env::var("ALLOC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            output_dir: PathBuf::from(output_dir),
            seed,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ALLOC_SEED must be a valid u64, got '{0}'")]
    InvalidSeed(String),
}
