//! Allocation Module
//!
//! The per-round pipeline and the post-run passes:
//! - Eligibility filtering against ledger state
//! - Ranking and seating one destination at a time
//! - Probabilistic withdrawals from an injected random source
//! - Promotion of waitlisted candidates into released seats
//! - Reconciliation and final status projection
//!
//! # Critical Invariants
//!
//! 1. **Capacity**: no destination nets more active holders than seats
//! 2. **Single Seat**: a candidate holds at most one active seat
//! 3. **Rank Order**: priority score descending, ties by id ascending; promotion
//!    follows waitlist order
//!
//! # Example
//!
//! ```rust
//! use mobility_allocation_core::allocation::{allocate_destination, project, FinalStatus};
//! use mobility_allocation_core::{Candidate, CapacityLedger, Destination, Roster};
//!
//! let roster = Roster::new(
//!     vec![Destination::new("X", 1)],
//!     vec![Candidate::new("A", 9.0, "X"), Candidate::new("B", 7.0, "X")],
//! )
//! .unwrap();
//!
//! let mut ledger = CapacityLedger::new(roster.destinations());
//! ledger.begin_round(0).unwrap();
//! let pool: Vec<&Candidate> = roster.candidates().iter().collect();
//! allocate_destination(&mut ledger, "X", 0, &pool).unwrap();
//!
//! let outcome = project(&ledger, &roster);
//! assert_eq!(outcome[0].status, FinalStatus::Assigned);
//! assert_eq!(outcome[1].status, FinalStatus::Unplaced);
//! ```

pub mod allocator;
pub mod eligibility;
pub mod projection;
pub mod promotion;
pub mod reconcile;
pub mod withdrawal;

pub use allocator::{allocate_destination, DestinationAllocation};
pub use eligibility::{check, filter_round, EligibilityRules, EligiblePool, Ineligibility};
pub use projection::{
    assignment_history, project, AssignmentKind, AssignmentRecord, AssignmentState,
    FinalAssignment, FinalStatus,
};
pub use promotion::{promote_waitlisted, SeatRelease};
pub use reconcile::{check_invariants, reconcile, ReconcileMode, ReconciliationReport, Trim};
pub use withdrawal::{simulate_withdrawals, Withdrawal, WithdrawalRule, WithdrawalTable};
