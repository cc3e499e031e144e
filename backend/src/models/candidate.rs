//! Candidate model
//!
//! Immutable intake record for a student requesting one destination.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Outcome class used when a candidate carries none.
pub const DEFAULT_OUTCOME_CLASS: &str = "default";

fn default_outcome_class() -> String {
    DEFAULT_OUTCOME_CLASS.to_string()
}

/// Candidate competing for a seat.
///
/// # Example
/// ```
/// use mobility_allocation_core::Candidate;
///
/// let cand = Candidate::new("S-001", 8.7, "BOLOGNA").with_language_credential();
/// assert_eq!(cand.requested_destination_id(), "BOLOGNA");
/// assert!(cand.language_credential());
/// assert!(!cand.disqualified());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    id: String,

    /// Academic record; higher ranks first
    priority_score: f64,

    requested_destination_id: String,

    #[serde(default)]
    language_credential: bool,

    #[serde(default)]
    disqualified: bool,

    /// Eventual-outcome class keying the withdrawal probability table
    #[serde(default = "default_outcome_class")]
    outcome_class: String,
}

impl Candidate {
    pub fn new(
        id: impl Into<String>,
        priority_score: f64,
        requested_destination_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            priority_score,
            requested_destination_id: requested_destination_id.into(),
            language_credential: false,
            disqualified: false,
            outcome_class: default_outcome_class(),
        }
    }

    pub fn with_language_credential(mut self) -> Self {
        self.language_credential = true;
        self
    }

    pub fn disqualify(mut self) -> Self {
        self.disqualified = true;
        self
    }

    pub fn with_outcome_class(mut self, class: impl Into<String>) -> Self {
        self.outcome_class = class.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority_score(&self) -> f64 {
        self.priority_score
    }

    pub fn requested_destination_id(&self) -> &str {
        &self.requested_destination_id
    }

    pub fn language_credential(&self) -> bool {
        self.language_credential
    }

    pub fn disqualified(&self) -> bool {
        self.disqualified
    }

    pub fn outcome_class(&self) -> &str {
        &self.outcome_class
    }
}

/// Ranking order: priority score descending, then id ascending.
///
/// `total_cmp` keeps the order total even for NaN scores, so ranking never
/// depends on input iteration order.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.priority_score
        .total_cmp(&a.priority_score)
        .then_with(|| a.id.cmp(&b.id))
}
