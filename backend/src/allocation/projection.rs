//! Status projection
//!
//! Pure functions of a reconciled ledger. Nothing here is stored by the
//! engine; outcomes are rebuilt from entries whenever they are needed.

use crate::core::rounds::RoundIndex;
use crate::models::{CapacityLedger, EntryOrigin, LedgerEntry, Role, Roster};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalStatus {
    Assigned,
    Withdrawn,
    Unplaced,
    Disqualified,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Assigned => "Assigned",
            FinalStatus::Withdrawn => "Withdrawn",
            FinalStatus::Unplaced => "Unplaced",
            FinalStatus::Disqualified => "Disqualified",
        }
    }
}

/// A candidate's outcome after the final round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAssignment {
    pub candidate_id: String,
    pub status: FinalStatus,
    /// Set only for `Assigned`
    pub destination_id: Option<String>,
}

/// Project every roster candidate to a final status, in roster order.
pub fn project(ledger: &CapacityLedger, roster: &Roster) -> Vec<FinalAssignment> {
    roster
        .candidates()
        .iter()
        .map(|candidate| {
            let id = candidate.id();
            if candidate.disqualified() {
                return FinalAssignment {
                    candidate_id: id.to_string(),
                    status: FinalStatus::Disqualified,
                    destination_id: None,
                };
            }

            let entries: Vec<&LedgerEntry> = ledger.entries_for_candidate(id).collect();
            let last = entries.iter().max_by_key(|e| e.seq);

            let (status, destination_id) = match last {
                Some(entry) if entry.is_active_holder() => {
                    (FinalStatus::Assigned, Some(entry.destination_id.clone()))
                }
                _ if entries.iter().any(|e| e.withdrawn()) => (FinalStatus::Withdrawn, None),
                _ => (FinalStatus::Unplaced, None),
            };

            FinalAssignment {
                candidate_id: id.to_string(),
                status,
                destination_id,
            }
        })
        .collect()
}

/// How a seat was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentKind {
    Initial,
    Promoted,
    Rerouted,
}

impl From<EntryOrigin> for AssignmentKind {
    fn from(origin: EntryOrigin) -> Self {
        match origin {
            EntryOrigin::Ranked => AssignmentKind::Initial,
            EntryOrigin::Promoted => AssignmentKind::Promoted,
            EntryOrigin::Rerouted => AssignmentKind::Rerouted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentState {
    Accepted,
    Renounced,
}

/// One seat ever granted, with how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub seq: u64,
    pub candidate_id: String,
    pub destination_id: String,
    pub round: RoundIndex,
    pub kind: AssignmentKind,
    pub state: AssignmentState,
    pub renounced_in: Option<RoundIndex>,
}

/// Every holder entry as an assignment record, in ledger order.
pub fn assignment_history(ledger: &CapacityLedger) -> Vec<AssignmentRecord> {
    ledger
        .entries()
        .iter()
        .filter(|e| e.role == Role::Holder)
        .map(|e| AssignmentRecord {
            seq: e.seq,
            candidate_id: e.candidate_id.clone(),
            destination_id: e.destination_id.clone(),
            round: e.round,
            kind: e.origin.into(),
            state: if e.withdrawn() {
                AssignmentState::Renounced
            } else {
                AssignmentState::Accepted
            },
            renounced_in: e.withdrawn_in,
        })
        .collect()
}
