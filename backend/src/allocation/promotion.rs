//! Promotion engine
//!
//! Runs between rounds, after the closing round's withdrawals are final and
//! the next round has been opened on the ledger. For each destination with
//! frozen seats:
//!
//! ```text
//! 1. release every frozen seat into the next round
//! 2. walk the closing round's waitlist in rank order
//! 3. seat the first candidate still eligible in the next round, once per
//!    released seat
//! 4. unfilled released seats carry forward as remaining capacity
//! ```
//!
//! Promotion only fills seats that were just released, so it can never push
//! a destination past capacity.

use crate::allocation::eligibility::{self, EligibilityRules};
use crate::core::rounds::{Round, RoundIndex};
use crate::models::{CapacityLedger, EntryOrigin, LedgerError, Roster};
use std::collections::HashSet;

/// Seats released at one destination and who filled them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatRelease {
    pub destination_id: String,
    pub released: u32,
    /// Promoted candidates, in rank order
    pub promoted: Vec<String>,
}

impl SeatRelease {
    /// Released seats left for the next round's allocator.
    pub fn carried_forward(&self) -> u32 {
        self.released - self.promoted.len() as u32
    }
}

/// Release seats frozen during `closed_round` and promote waitlisted
/// candidates into `next_index`.
pub fn promote_waitlisted(
    ledger: &mut CapacityLedger,
    roster: &Roster,
    closed_round: RoundIndex,
    next_round: &Round,
    next_index: RoundIndex,
    rules: &EligibilityRules,
) -> Result<Vec<SeatRelease>, LedgerError> {
    let mut releases = Vec::new();
    let mut promoted_anywhere: HashSet<String> = HashSet::new();

    for destination in roster.destinations_by_id() {
        let released = ledger.frozen_seats(destination.id());
        if released == 0 {
            continue;
        }
        ledger.release_for_next_round(destination.id(), released)?;

        let waitlist: Vec<String> = ledger
            .waitlist_at(destination.id(), closed_round)
            .into_iter()
            .map(|e| e.candidate_id.clone())
            .collect();

        let mut promoted = Vec::new();
        for candidate_id in waitlist {
            if promoted.len() as u32 == released {
                break;
            }
            if promoted_anywhere.contains(&candidate_id) {
                continue;
            }
            let Some(candidate) = roster.candidate(&candidate_id) else {
                continue;
            };
            let eligible = eligibility::check(
                candidate,
                destination,
                next_round,
                next_index,
                ledger,
                rules,
            );
            if eligible.is_err() {
                continue;
            }

            ledger.record_holder(
                destination.id(),
                next_index,
                &candidate_id,
                EntryOrigin::Promoted,
            )?;
            promoted_anywhere.insert(candidate_id.clone());
            promoted.push(candidate_id);
        }

        releases.push(SeatRelease {
            destination_id: destination.id().to_string(),
            released,
            promoted,
        });
    }

    Ok(releases)
}
