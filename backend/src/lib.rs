//! Mobility Allocation Core - Rust Engine
//!
//! Multi-round seat allocation for student exchange programmes, with
//! deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Round schedule
//! - **models**: Domain types (Destination, Candidate, CapacityLedger, events)
//! - **allocation**: Eligibility, ranking, withdrawals, promotion, reconciliation
//! - **policy**: Void-destination re-routing policies
//! - **orchestrator**: Round loop and run snapshots
//! - **report**: Occupancy report
//! - **tables**: CSV input and output tables
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. No destination nets more active holders than its capacity
//! 2. A candidate holds at most one active seat
//! 3. Disqualified candidates never reach the ledger
//! 4. All randomness is deterministic (injected, seeded source)

// Module declarations
pub mod allocation;
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod report;
pub mod rng;
pub mod tables;

// Re-exports for convenience
pub use allocation::{
    AssignmentKind, AssignmentRecord, AssignmentState, FinalAssignment, FinalStatus,
    ReconcileMode, ReconciliationReport, WithdrawalTable,
};
pub use crate::core::rounds::{Round, RoundIndex, RoundSchedule};
pub use models::{
    candidate::Candidate,
    destination::Destination,
    event::{EngineEvent, EventLog, VoidResolution},
    ledger::{CapacityLedger, EntryOrigin, LedgerEntry, LedgerError, Role},
    roster::{Roster, RosterError},
};
pub use orchestrator::{
    AllocationEngine, AllocationError, AllocationOutcome, EngineConfig, RoundResult, RunSnapshot,
    SnapshotError,
};
pub use policy::{CompatibilityRule, ReroutePolicy, VoidPolicyConfig};
pub use report::{OccupancyReport, OccupancyRow};
pub use rng::{RandomSource, SeededRng};
pub use tables::TableError;
