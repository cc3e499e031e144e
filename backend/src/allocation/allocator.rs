//! Round allocator
//!
//! Ranks one destination's eligible pool and seats the top of it.
//!
//! # Algorithm
//!
//! ```text
//! 1. Stable-sort pool by (priority desc, id asc)
//! 2. seats = remaining_capacity(destination, round)
//! 3. first `seats` candidates -> Holder
//! 4. everyone else -> Waitlisted, in rank order
//! ```
//!
//! The allocator never asks the ledger for more seats than
//! `remaining_capacity` reports, so a `CapacityExceeded` from here means the
//! ledger itself is inconsistent.

use crate::core::rounds::RoundIndex;
use crate::models::{rank_order, Candidate, CapacityLedger, EntryOrigin, LedgerError};

/// What the allocator decided for one destination in one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationAllocation {
    pub destination_id: String,
    pub holders: Vec<String>,
    pub waitlisted: Vec<String>,
}

/// Rank `pool` and record holders and waitlisted candidates at
/// `destination_id` in `round`.
///
/// # Example
///
/// ```rust
/// use mobility_allocation_core::allocation::allocator::allocate_destination;
/// use mobility_allocation_core::{Candidate, CapacityLedger, Destination};
///
/// let mut ledger = CapacityLedger::new(&[Destination::new("X", 2)]);
/// ledger.begin_round(0).unwrap();
///
/// let a = Candidate::new("A", 9.0, "X");
/// let b = Candidate::new("B", 8.5, "X");
/// let c = Candidate::new("C", 7.0, "X");
///
/// let result = allocate_destination(&mut ledger, "X", 0, &[&c, &a, &b]).unwrap();
/// assert_eq!(result.holders, vec!["A", "B"]);
/// assert_eq!(result.waitlisted, vec!["C"]);
/// ```
pub fn allocate_destination(
    ledger: &mut CapacityLedger,
    destination_id: &str,
    round: RoundIndex,
    pool: &[&Candidate],
) -> Result<DestinationAllocation, LedgerError> {
    let mut ranked: Vec<&Candidate> = pool.to_vec();
    ranked.sort_by(|a, b| rank_order(a, b));

    let seats = ledger.remaining_capacity(destination_id, round)? as usize;
    let split = seats.min(ranked.len());
    let (winners, rest) = ranked.split_at(split);

    let mut allocation = DestinationAllocation {
        destination_id: destination_id.to_string(),
        ..Default::default()
    };

    for candidate in winners {
        ledger.record_holder(destination_id, round, candidate.id(), EntryOrigin::Ranked)?;
        allocation.holders.push(candidate.id().to_string());
    }

    for candidate in rest {
        ledger.record_waitlisted(destination_id, round, candidate.id())?;
        allocation.waitlisted.push(candidate.id().to_string());
    }

    Ok(allocation)
}
