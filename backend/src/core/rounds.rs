//! Round schedule for the allocation process
//!
//! Allocation proceeds in discrete rounds processed strictly in order. The
//! schedule is an ordered, configurable list; rounds are addressed by their
//! position (`RoundIndex`) and carry a label for reporting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Position of a round within the schedule (0-based).
pub type RoundIndex = usize;

/// One allocation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Label used in reports and configuration (e.g. `"R1"`, `"R_final"`)
    pub label: String,

    /// Date on which candidates enter this round. Destinations voided on or
    /// before this date are closed for the round. `None` means any void date
    /// already applies.
    #[serde(default)]
    pub opens_on: Option<NaiveDate>,
}

impl Round {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            opens_on: None,
        }
    }

    pub fn opening_on(mut self, date: NaiveDate) -> Self {
        self.opens_on = Some(date);
        self
    }
}

/// Ordered list of rounds with a cursor on the round being processed.
///
/// # Example
/// ```
/// use mobility_allocation_core::RoundSchedule;
///
/// let mut schedule = RoundSchedule::standard();
/// assert_eq!(schedule.len(), 4);
/// assert_eq!(schedule.current().label, "R1");
///
/// assert!(schedule.advance());
/// assert_eq!(schedule.current_index(), 1);
/// assert_eq!(schedule.label(3), Some("R_final"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSchedule {
    rounds: Vec<Round>,
    current: RoundIndex,
}

impl RoundSchedule {
    /// Create a schedule from an ordered list of rounds.
    ///
    /// # Panics
    /// Panics if `rounds` is empty; configuration validation rejects that
    /// case before a schedule is built.
    pub fn new(rounds: Vec<Round>) -> Self {
        assert!(!rounds.is_empty(), "round schedule must not be empty");
        Self { rounds, current: 0 }
    }

    /// The four-round calendar used by the exchange programme:
    /// `R1, R2, R3, R_final`.
    pub fn standard() -> Self {
        Self::new(standard_rounds())
    }

    pub fn current_index(&self) -> RoundIndex {
        self.current
    }

    pub fn current(&self) -> &Round {
        &self.rounds[self.current]
    }

    /// Move to the next round. Returns `false` when already at the last one.
    pub fn advance(&mut self) -> bool {
        if self.is_final() {
            return false;
        }
        self.current += 1;
        true
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_final(&self) -> bool {
        self.current + 1 == self.rounds.len()
    }

    pub fn next_index(&self) -> Option<RoundIndex> {
        (!self.is_final()).then_some(self.current + 1)
    }

    pub fn get(&self, index: RoundIndex) -> Option<&Round> {
        self.rounds.get(index)
    }

    pub fn label(&self, index: RoundIndex) -> Option<&str> {
        self.rounds.get(index).map(|round| round.label.as_str())
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

pub fn standard_rounds() -> Vec<Round> {
    ["R1", "R2", "R3", "R_final"]
        .into_iter()
        .map(Round::new)
        .collect()
}
