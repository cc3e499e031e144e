//! Reconciler
//!
//! Global post-pass over the finished ledger. Allocation enforces capacity at
//! every assignment, so on a healthy run this is a pure assertion. `Repair`
//! mode exists for ledgers restored from elsewhere (snapshots, imports) and
//! trims overruns lowest-priority first, reporting every trim.

use crate::models::{CapacityLedger, LedgerError, Roster};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// What to do when a destination nets more holders than seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Overruns are fatal
    #[default]
    Verify,
    /// Overruns are trimmed and reported
    Repair,
}

/// One holder removed by the repair pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trim {
    pub destination_id: String,
    pub candidate_id: String,
    pub priority_score: f64,
    pub entries_pruned: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub mode: ReconcileMode,
    pub trims: Vec<Trim>,
}

impl ReconciliationReport {
    pub fn trimmed_at(&self, destination_id: &str) -> usize {
        self.trims
            .iter()
            .filter(|t| t.destination_id == destination_id)
            .count()
    }
}

/// Check the invariants no repair can fix: disqualified candidates in the
/// ledger and candidates holding two active seats.
pub fn check_invariants(ledger: &CapacityLedger, roster: &Roster) -> Result<(), LedgerError> {
    let mut active: BTreeMap<&str, &str> = BTreeMap::new();

    for entry in ledger.entries() {
        let candidate = roster.candidate(&entry.candidate_id).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "entry {} references unknown candidate {}",
                entry.seq, entry.candidate_id
            ))
        })?;
        if candidate.disqualified() {
            return Err(LedgerError::InvalidState(format!(
                "disqualified candidate {} appears in the ledger at {}",
                entry.candidate_id, entry.destination_id
            )));
        }

        if entry.is_active_holder() {
            if let Some(other) = active.insert(&entry.candidate_id, &entry.destination_id) {
                return Err(LedgerError::InvalidState(format!(
                    "candidate {} holds active seats at {} and {}",
                    entry.candidate_id, other, entry.destination_id
                )));
            }
        }
    }

    Ok(())
}

/// Verify (and in `Repair` mode, enforce) the capacity invariant.
pub fn reconcile(
    ledger: &mut CapacityLedger,
    roster: &Roster,
    mode: ReconcileMode,
) -> Result<ReconciliationReport, LedgerError> {
    check_invariants(ledger, roster)?;

    let mut report = ReconciliationReport {
        mode,
        trims: Vec::new(),
    };
    let destination_ids: Vec<String> = ledger.destination_ids().map(str::to_string).collect();
    let final_round = ledger.current_round().unwrap_or(0);

    for destination_id in destination_ids {
        let capacity = ledger.capacity(&destination_id).unwrap_or(0);
        let holders: Vec<String> = ledger
            .net_holders(&destination_id)
            .into_iter()
            .map(|e| e.candidate_id.clone())
            .collect();
        let committed = holders.len() as u32;
        if committed <= capacity {
            continue;
        }

        if mode == ReconcileMode::Verify {
            return Err(LedgerError::CapacityExceeded {
                destination_id,
                round: final_round,
                capacity,
                committed,
            });
        }

        let mut ranked: Vec<(&str, f64)> = holders
            .iter()
            .map(|id| {
                let score = roster
                    .candidate(id)
                    .map_or(f64::NEG_INFINITY, |c| c.priority_score());
                (id.as_str(), score)
            })
            .collect();
        // Lowest priority first; among equal scores the larger id loses
        ranked.sort_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => b.0.cmp(a.0),
            other => other,
        });

        let excess = (committed - capacity) as usize;
        for (candidate_id, priority_score) in ranked.into_iter().take(excess) {
            let entries_pruned = ledger.prune_holder(&destination_id, candidate_id);
            warn!(
                destination = %destination_id,
                candidate = %candidate_id,
                priority_score,
                "trimmed holder over capacity"
            );
            report.trims.push(Trim {
                destination_id: destination_id.clone(),
                candidate_id: candidate_id.to_string(),
                priority_score,
                entries_pruned,
            });
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Destination, EntryOrigin, LedgerEntry, Role};

    fn holder(seq: u64, dest: &str, cand: &str) -> LedgerEntry {
        LedgerEntry {
            seq,
            destination_id: dest.to_string(),
            round: 3,
            candidate_id: cand.to_string(),
            role: Role::Holder,
            origin: EntryOrigin::Rerouted,
            withdrawn_in: None,
        }
    }

    fn overrun() -> (Roster, CapacityLedger) {
        let roster = Roster::new(
            vec![Destination::new("Y", 1)],
            vec![
                Candidate::new("P", 6.0, "Y"),
                Candidate::new("Q", 8.0, "Y"),
            ],
        )
        .unwrap();
        let ledger = CapacityLedger::restore(
            roster.destinations(),
            vec![holder(0, "Y", "P"), holder(1, "Y", "Q")],
        )
        .unwrap();
        (roster, ledger)
    }

    #[test]
    fn test_verify_rejects_overrun() {
        let (roster, mut ledger) = overrun();
        let err = reconcile(&mut ledger, &roster, ReconcileMode::Verify).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::CapacityExceeded { capacity: 1, committed: 2, .. }
        ));
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn test_repair_trims_lowest_priority() {
        let (roster, mut ledger) = overrun();
        let report = reconcile(&mut ledger, &roster, ReconcileMode::Repair).unwrap();

        assert_eq!(report.trims.len(), 1);
        assert_eq!(report.trims[0].candidate_id, "P");
        assert_eq!(report.trims[0].entries_pruned, 1);
        assert_eq!(report.trimmed_at("Y"), 1);

        let net: Vec<_> = ledger.net_holders("Y").iter().map(|e| e.candidate_id.clone()).collect();
        assert_eq!(net, vec!["Q"]);
    }

    #[test]
    fn test_tie_trims_larger_id() {
        let roster = Roster::new(
            vec![Destination::new("Y", 1)],
            vec![Candidate::new("a", 5.0, "Y"), Candidate::new("b", 5.0, "Y")],
        )
        .unwrap();
        let mut ledger = CapacityLedger::restore(
            roster.destinations(),
            vec![holder(0, "Y", "a"), holder(1, "Y", "b")],
        )
        .unwrap();
        let report = reconcile(&mut ledger, &roster, ReconcileMode::Repair).unwrap();
        assert_eq!(report.trims[0].candidate_id, "b");
    }

    #[test]
    fn test_double_holding_is_invalid_state() {
        let roster = Roster::new(
            vec![Destination::new("X", 1), Destination::new("Y", 1)],
            vec![Candidate::new("A", 5.0, "X")],
        )
        .unwrap();
        let mut ledger = CapacityLedger::restore(
            roster.destinations(),
            vec![holder(0, "X", "A"), holder(1, "Y", "A")],
        )
        .unwrap();
        let err = reconcile(&mut ledger, &roster, ReconcileMode::Repair).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn test_disqualified_in_ledger_is_invalid_state() {
        let roster = Roster::new(
            vec![Destination::new("X", 1)],
            vec![Candidate::new("A", 5.0, "X").disqualify()],
        )
        .unwrap();
        let ledger =
            CapacityLedger::restore(roster.destinations(), vec![holder(0, "X", "A")]).unwrap();
        assert!(check_invariants(&ledger, &roster).is_err());
    }

    #[test]
    fn test_healthy_ledger_passes_unchanged() {
        let roster = Roster::new(
            vec![Destination::new("X", 2)],
            vec![Candidate::new("A", 5.0, "X")],
        )
        .unwrap();
        let mut ledger =
            CapacityLedger::restore(roster.destinations(), vec![holder(0, "X", "A")]).unwrap();
        let report = reconcile(&mut ledger, &roster, ReconcileMode::Verify).unwrap();
        assert!(report.trims.is_empty());
        assert_eq!(ledger.entries().len(), 1);
    }
}
