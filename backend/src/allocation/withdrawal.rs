//! Withdrawal simulator
//!
//! Every holder seated in the current round gets exactly one draw. The
//! probability comes from a configured `(round, outcome class)` table; the
//! randomness comes from the injected [`RandomSource`].

use crate::core::rounds::RoundIndex;
use crate::models::{CapacityLedger, LedgerError, Roster};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};

/// One row of the withdrawal-probability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRule {
    /// Round label (e.g. `"R1"`)
    pub round: String,
    pub outcome_class: String,
    pub probability: f64,
}

/// `{round, outcome class} -> probability` lookup with a fallback.
///
/// # Example
/// ```
/// use mobility_allocation_core::WithdrawalTable;
///
/// let table = WithdrawalTable::new(0.05)
///     .with_rule("R1", "renounce", 0.6)
///     .with_rule("R2", "renounce", 0.3);
///
/// assert_eq!(table.probability("R1", "renounce"), 0.6);
/// assert_eq!(table.probability("R1", "accept"), 0.05);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalTable {
    /// Probability for pairs with no explicit rule
    #[serde(default)]
    pub default_probability: f64,

    #[serde(default)]
    pub rules: Vec<WithdrawalRule>,
}

impl WithdrawalTable {
    pub fn new(default_probability: f64) -> Self {
        Self {
            default_probability,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(
        mut self,
        round: impl Into<String>,
        outcome_class: impl Into<String>,
        probability: f64,
    ) -> Self {
        self.rules.push(WithdrawalRule {
            round: round.into(),
            outcome_class: outcome_class.into(),
            probability,
        });
        self
    }

    /// Probability for the pair. The last matching rule wins.
    pub fn probability(&self, round_label: &str, outcome_class: &str) -> f64 {
        self.rules
            .iter()
            .rev()
            .find(|r| r.round == round_label && r.outcome_class == outcome_class)
            .map_or(self.default_probability, |r| r.probability)
    }

    /// Check every probability lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |p: f64| (0.0..=1.0).contains(&p);
        if !in_range(self.default_probability) {
            return Err(format!(
                "default withdrawal probability {} outside [0, 1]",
                self.default_probability
            ));
        }
        for rule in &self.rules {
            if !in_range(rule.probability) {
                return Err(format!(
                    "withdrawal probability {} for ({}, {}) outside [0, 1]",
                    rule.probability, rule.round, rule.outcome_class
                ));
            }
        }
        Ok(())
    }
}

/// A holder who withdrew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub destination_id: String,
    pub candidate_id: String,
}

/// Draw withdrawals for the holders recorded in `round`, in ledger order.
pub fn simulate_withdrawals(
    ledger: &mut CapacityLedger,
    roster: &Roster,
    round: RoundIndex,
    round_label: &str,
    table: &WithdrawalTable,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Withdrawal>, LedgerError> {
    let seated: Vec<(String, String)> = ledger
        .holders_recorded_in(round)
        .into_iter()
        .map(|e| (e.destination_id.clone(), e.candidate_id.clone()))
        .collect();

    let mut withdrawals = Vec::new();
    for (destination_id, candidate_id) in seated {
        let candidate = roster.candidate(&candidate_id).ok_or_else(|| {
            LedgerError::InvalidState(format!("holder {} is not on the roster", candidate_id))
        })?;

        let probability = table.probability(round_label, candidate.outcome_class());
        if rng.chance(probability) {
            ledger.record_withdrawal(&destination_id, round, &candidate_id)?;
            withdrawals.push(Withdrawal {
                destination_id,
                candidate_id,
            });
        }
    }

    Ok(withdrawals)
}
