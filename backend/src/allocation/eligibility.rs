//! Eligibility filter
//!
//! Pure predicate over ledger state plus static candidate data. Nothing here
//! mutates the ledger.

use crate::core::rounds::{Round, RoundIndex};
use crate::models::{Candidate, CapacityLedger, Destination, Roster};
use std::collections::BTreeMap;

/// Tunables for the eligibility predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityRules {
    /// Candidates who withdrew from a seat re-enter later rounds
    pub readmit_withdrawn: bool,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            readmit_withdrawn: true,
        }
    }
}

/// Why a candidate sits out a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    Disqualified,
    /// Holds an active seat somewhere
    ActiveHolder,
    /// Withdrew earlier and withdrawn candidates are not readmitted
    Withdrawn,
    /// Requested destination is void for this round
    VoidDestination,
    /// Destination requires a language credential the candidate lacks
    MissingCredential,
}

/// Check a candidate against `destination` for the given round.
///
/// `destination` is normally the requested one; promotion and re-routing use
/// the same predicate against the seat they are about to fill.
pub fn check(
    candidate: &Candidate,
    destination: &Destination,
    round: &Round,
    round_index: RoundIndex,
    ledger: &CapacityLedger,
    rules: &EligibilityRules,
) -> Result<(), Ineligibility> {
    if candidate.disqualified() {
        return Err(Ineligibility::Disqualified);
    }

    if ledger.active_holding(candidate.id()).is_some() {
        return Err(Ineligibility::ActiveHolder);
    }

    if round_index > 0 && !rules.readmit_withdrawn && ledger.has_withdrawn(candidate.id()) {
        return Err(Ineligibility::Withdrawn);
    }

    if destination.is_void_for(round) {
        return Err(Ineligibility::VoidDestination);
    }

    if destination.language_required() && !candidate.language_credential() {
        return Err(Ineligibility::MissingCredential);
    }

    Ok(())
}

/// Result of filtering the roster for one round.
#[derive(Debug, Default)]
pub struct EligiblePool<'a> {
    /// Eligible candidates per requested destination, in roster order
    pub by_destination: BTreeMap<&'a str, Vec<&'a Candidate>>,

    /// Otherwise-eligible candidates whose requested destination is void
    pub void_conflicts: Vec<&'a Candidate>,

    /// Candidates excluded for any other reason
    pub excluded: Vec<(&'a Candidate, Ineligibility)>,
}

impl<'a> EligiblePool<'a> {
    pub fn eligible_count(&self) -> usize {
        self.by_destination.values().map(Vec::len).sum()
    }

    pub fn for_destination(&self, destination_id: &str) -> &[&'a Candidate] {
        self.by_destination
            .get(destination_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Partition the roster for `round`.
pub fn filter_round<'a>(
    roster: &'a Roster,
    round: &Round,
    round_index: RoundIndex,
    ledger: &CapacityLedger,
    rules: &EligibilityRules,
) -> EligiblePool<'a> {
    let mut pool = EligiblePool::default();

    for candidate in roster.candidates() {
        let Some(destination) = roster.destination(candidate.requested_destination_id()) else {
            continue;
        };

        match check(candidate, destination, round, round_index, ledger, rules) {
            Ok(()) => pool
                .by_destination
                .entry(destination.id())
                .or_default()
                .push(candidate),
            Err(Ineligibility::VoidDestination) => pool.void_conflicts.push(candidate),
            Err(reason) => pool.excluded.push((candidate, reason)),
        }
    }

    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryOrigin;

    fn roster() -> Roster {
        Roster::new(
            vec![
                Destination::new("X", 2),
                Destination::new("Z", 0),
                Destination::new("L", 1).with_language_requirement(),
            ],
            vec![
                Candidate::new("A", 9.0, "X"),
                Candidate::new("B", 8.0, "X").disqualify(),
                Candidate::new("C", 7.0, "Z"),
                Candidate::new("D", 6.0, "L"),
                Candidate::new("E", 5.0, "L").with_language_credential(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_filter_partitions_roster() {
        let roster = roster();
        let mut ledger = CapacityLedger::new(roster.destinations());
        ledger.begin_round(0).unwrap();

        let rules = EligibilityRules::default();
        let pool = filter_round(&roster, &Round::new("R1"), 0, &ledger, &rules);

        let x: Vec<&str> = pool.for_destination("X").iter().map(|c| c.id()).collect();
        assert_eq!(x, vec!["A"]);
        let l: Vec<&str> = pool.for_destination("L").iter().map(|c| c.id()).collect();
        assert_eq!(l, vec!["E"]);
        assert_eq!(pool.void_conflicts.len(), 1);
        assert_eq!(pool.void_conflicts[0].id(), "C");
        assert!(pool
            .excluded
            .iter()
            .any(|(c, r)| c.id() == "B" && *r == Ineligibility::Disqualified));
        assert!(pool
            .excluded
            .iter()
            .any(|(c, r)| c.id() == "D" && *r == Ineligibility::MissingCredential));
        assert_eq!(pool.eligible_count(), 2);
    }

    #[test]
    fn test_active_holder_is_not_eligible() {
        let roster = roster();
        let mut ledger = CapacityLedger::new(roster.destinations());
        ledger.begin_round(0).unwrap();
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        ledger.begin_round(1).unwrap();

        let rules = EligibilityRules::default();
        let pool = filter_round(&roster, &Round::new("R2"), 1, &ledger, &rules);
        assert!(pool.for_destination("X").is_empty());
    }

    #[test]
    fn test_withdrawn_readmission_is_configurable() {
        let roster = roster();
        let mut ledger = CapacityLedger::new(roster.destinations());
        ledger.begin_round(0).unwrap();
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        ledger.record_withdrawal("X", 0, "A").unwrap();
        ledger.begin_round(1).unwrap();

        let round = Round::new("R2");
        let readmit = filter_round(&roster, &round, 1, &ledger, &EligibilityRules::default());
        assert_eq!(readmit.for_destination("X").len(), 1);

        let strict = EligibilityRules {
            readmit_withdrawn: false,
        };
        let pool = filter_round(&roster, &round, 1, &ledger, &strict);
        assert!(pool.for_destination("X").is_empty());
    }
}
