//! Per-destination, per-round occupancy
//!
//! One row per `(destination, round)` pair, destinations in id order and
//! rounds in schedule order. Non-fatal conditions (void destination, empty
//! pool, reconciler trims) are carried as row flags rather than errors.

use crate::allocation::ReconciliationReport;
use crate::core::rounds::{Round, RoundIndex};
use crate::models::{CapacityLedger, EntryOrigin, EventLog, Role, Roster};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRow {
    pub destination_id: String,
    pub round: RoundIndex,
    pub round_label: String,
    pub capacity: u32,
    /// Standing holders at the end of the round
    pub holders: u32,
    pub waitlisted: u32,
    pub withdrawals: u32,
    pub promoted: u32,
    pub rerouted_in: u32,
    /// Holders removed by the reconciler; only set on the final round
    pub trimmed: u32,
    /// `holders / capacity`, 0.0 for zero-capacity destinations
    pub occupancy_rate: f64,
    pub void: bool,
    pub no_eligible_candidates: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyReport {
    pub rows: Vec<OccupancyRow>,
}

impl OccupancyReport {
    /// Build the report for every round the ledger reached.
    pub fn build(
        ledger: &CapacityLedger,
        roster: &Roster,
        rounds: &[Round],
        events: &EventLog,
        reconciliation: &ReconciliationReport,
    ) -> Self {
        let Some(last_round) = ledger.current_round() else {
            return Self::default();
        };
        let played = rounds.len().min(last_round + 1);

        let mut rows = Vec::new();
        for destination in roster.destinations_by_id() {
            let id = destination.id();
            let empty_rounds: Vec<RoundIndex> = events
                .events_for_destination(id)
                .iter()
                .filter(|e| e.event_type() == "NoEligibleCandidates")
                .map(|e| e.round())
                .collect();

            for (index, round) in rounds.iter().enumerate().take(played) {
                let origin_count = |origin: EntryOrigin| {
                    ledger
                        .entries_at(id)
                        .filter(|e| {
                            e.role == Role::Holder && e.round == index && e.origin == origin
                        })
                        .count() as u32
                };

                let holders = ledger.holders_at(id, index).len() as u32;
                let capacity = destination.capacity();
                let occupancy_rate = if capacity == 0 {
                    0.0
                } else {
                    holders as f64 / capacity as f64
                };
                let no_eligible_candidates = empty_rounds.contains(&index);
                let trimmed = if index == last_round {
                    reconciliation.trimmed_at(id) as u32
                } else {
                    0
                };

                rows.push(OccupancyRow {
                    destination_id: id.to_string(),
                    round: index,
                    round_label: round.label.clone(),
                    capacity,
                    holders,
                    waitlisted: ledger.waitlist_at(id, index).len() as u32,
                    withdrawals: ledger.withdrawals_at(id, index).len() as u32,
                    promoted: origin_count(EntryOrigin::Promoted),
                    rerouted_in: origin_count(EntryOrigin::Rerouted),
                    trimmed,
                    occupancy_rate,
                    void: destination.is_void_for(round),
                    no_eligible_candidates,
                });
            }
        }

        Self { rows }
    }

    pub fn row(&self, destination_id: &str, round: RoundIndex) -> Option<&OccupancyRow> {
        self.rows
            .iter()
            .find(|r| r.destination_id == destination_id && r.round == round)
    }

    pub fn rows_for(&self, destination_id: &str) -> impl Iterator<Item = &OccupancyRow> + '_ {
        let destination_id = destination_id.to_string();
        self.rows
            .iter()
            .filter(move |r| r.destination_id == destination_id)
    }

    /// Rows carrying any non-fatal flag.
    pub fn flagged(&self) -> Vec<&OccupancyRow> {
        self.rows
            .iter()
            .filter(|r| r.void || r.no_eligible_candidates || r.trimmed > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rounds::standard_rounds;
    use crate::models::{Candidate, Destination, EngineEvent};

    #[test]
    fn test_rows_follow_ledger() {
        let roster = Roster::new(
            vec![Destination::new("X", 2), Destination::new("Y", 1)],
            vec![
                Candidate::new("A", 9.0, "X"),
                Candidate::new("B", 8.0, "X"),
                Candidate::new("C", 7.0, "X"),
            ],
        )
        .unwrap();
        let mut ledger = CapacityLedger::new(roster.destinations());
        ledger.begin_round(0).unwrap();
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        ledger.record_holder("X", 0, "B", EntryOrigin::Ranked).unwrap();
        ledger.record_waitlisted("X", 0, "C").unwrap();
        ledger.record_withdrawal("X", 0, "A").unwrap();
        ledger.begin_round(1).unwrap();
        ledger.release_for_next_round("X", 1).unwrap();
        ledger.record_holder("X", 1, "C", EntryOrigin::Promoted).unwrap();

        let mut events = EventLog::new();
        events.log(EngineEvent::NoEligibleCandidates {
            round: 0,
            destination_id: "Y".to_string(),
        });

        let report = OccupancyReport::build(
            &ledger,
            &roster,
            &standard_rounds(),
            &events,
            &ReconciliationReport::default(),
        );

        assert_eq!(report.rows.len(), 4);
        let x0 = report.row("X", 0).unwrap();
        assert_eq!((x0.holders, x0.waitlisted, x0.withdrawals), (1, 1, 1));
        assert_eq!(x0.occupancy_rate, 0.5);

        let x1 = report.row("X", 1).unwrap();
        assert_eq!((x1.holders, x1.promoted), (2, 1));
        assert_eq!(x1.occupancy_rate, 1.0);

        assert!(report.row("Y", 0).unwrap().no_eligible_candidates);
        assert_eq!(report.flagged().len(), 1);
        assert_eq!(report.rows_for("X").count(), 2);
    }

    #[test]
    fn test_empty_ledger_has_no_rows() {
        let roster = Roster::new(vec![Destination::new("X", 1)], vec![]).unwrap();
        let ledger = CapacityLedger::new(roster.destinations());
        let report = OccupancyReport::build(
            &ledger,
            &roster,
            &standard_rounds(),
            &EventLog::new(),
            &ReconciliationReport::default(),
        );
        assert!(report.rows.is_empty());
    }
}
