//! Orchestrator - round loop and run persistence
//!
//! See `engine.rs` for the round loop and `checkpoint.rs` for snapshots.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use engine::{AllocationEngine, AllocationError, AllocationOutcome, EngineConfig, RoundResult};

// Re-export checkpoint types
pub use checkpoint::{
    compute_config_hash, compute_ledger_digest, reconcile_snapshot, validate_snapshot,
    ReconciledSnapshot, RunSnapshot, SnapshotError,
};
