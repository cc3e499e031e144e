use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use mobility_allocation_core::{AllocationError, SnapshotError, TableError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table error: {0}")]
    Table(#[from] TableError),

    #[error("allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
