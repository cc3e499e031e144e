//! Checkpoint - Save/Load Run State
//!
//! A run snapshot carries everything needed to re-examine an allocation
//! without re-running it: the config (and its hash), both input tables and
//! the ledger entries.
//!
//! # Critical Invariants
//!
//! - **Config Matching**: a snapshot is only accepted if its config hashes to
//!   the stamped `config_hash`
//! - **Referential Integrity**: every entry names a known destination and
//!   candidate
//! - **Capacity / Single Seat / Disqualification**: re-checked on load

use crate::allocation::{
    check_invariants, project, reconcile, FinalAssignment, ReconcileMode, ReconciliationReport,
};
use crate::models::{
    Candidate, CapacityLedger, Destination, LedgerEntry, LedgerError, Roster, RosterError,
};
use crate::orchestrator::engine::EngineConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config hash mismatch: snapshot stamped {stamped}, config hashes to {computed}")]
    ConfigMismatch { stamped: String, computed: String },

    #[error("Snapshot inputs invalid: {0}")]
    Roster(#[from] RosterError),

    #[error("Snapshot ledger invalid: {0}")]
    Ledger(#[from] LedgerError),
}

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete run snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// SHA256 hash of `config` (for validation)
    pub config_hash: String,

    pub config: EngineConfig,

    pub destinations: Vec<Destination>,

    pub candidates: Vec<Candidate>,

    /// Ledger entries in sequence order
    pub entries: Vec<LedgerEntry>,
}

impl RunSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SnapshotError::Serialization(format!("Snapshot serialization failed: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| {
            SnapshotError::Serialization(format!("Snapshot deserialization failed: {}", e))
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn roster(&self) -> Result<Roster, SnapshotError> {
        Ok(Roster::new(
            self.destinations.clone(),
            self.candidates.clone(),
        )?)
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// SHA256 of the canonical JSON form of `value`.
///
/// Object keys are sorted recursively so the hash does not depend on map
/// iteration order.
fn canonical_sha256<T: Serialize>(value: &T) -> Result<String, SnapshotError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(value).map_err(|e| {
        SnapshotError::Serialization(format!("Canonical serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SnapshotError::Serialization(format!("Canonical serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Deterministic hash of an engine config, stamped on every snapshot.
pub fn compute_config_hash(config: &EngineConfig) -> Result<String, SnapshotError> {
    canonical_sha256(config)
}

/// Deterministic digest of a ledger; equal digests mean identical runs.
pub fn compute_ledger_digest(entries: &[LedgerEntry]) -> Result<String, SnapshotError> {
    canonical_sha256(&entries)
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validate snapshot integrity
///
/// Checks, in order:
/// - the config hash matches the config
/// - the input tables are consistent
/// - every entry references a known destination and candidate
/// - no disqualified candidate appears and nobody holds two seats
/// - no destination nets more holders than its capacity
pub fn validate_snapshot(snapshot: &RunSnapshot) -> Result<(), SnapshotError> {
    let computed = compute_config_hash(&snapshot.config)?;
    if computed != snapshot.config_hash {
        return Err(SnapshotError::ConfigMismatch {
            stamped: snapshot.config_hash.clone(),
            computed,
        });
    }

    let roster = snapshot.roster()?;
    let mut ledger = CapacityLedger::restore(roster.destinations(), snapshot.entries.clone())?;
    check_invariants(&ledger, &roster)?;
    reconcile(&mut ledger, &roster, ReconcileMode::Verify)?;
    Ok(())
}

/// A snapshot after reconciliation, with its projected outcome.
#[derive(Debug, Clone)]
pub struct ReconciledSnapshot {
    pub snapshot: RunSnapshot,
    pub report: ReconciliationReport,
    pub assignments: Vec<FinalAssignment>,
}

/// Restore the snapshot's ledger, reconcile it in `mode` and project final
/// statuses. In `Repair` mode the returned snapshot carries the trimmed
/// entries.
pub fn reconcile_snapshot(
    snapshot: &RunSnapshot,
    mode: ReconcileMode,
) -> Result<ReconciledSnapshot, SnapshotError> {
    let computed = compute_config_hash(&snapshot.config)?;
    if computed != snapshot.config_hash {
        return Err(SnapshotError::ConfigMismatch {
            stamped: snapshot.config_hash.clone(),
            computed,
        });
    }

    let roster = snapshot.roster()?;
    let mut ledger = CapacityLedger::restore(roster.destinations(), snapshot.entries.clone())?;
    let report = reconcile(&mut ledger, &roster, mode)?;
    let assignments = project(&ledger, &roster);

    Ok(ReconciledSnapshot {
        snapshot: RunSnapshot {
            entries: ledger.into_entries(),
            ..snapshot.clone()
        },
        report,
        assignments,
    })
}
