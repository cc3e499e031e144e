//! Engine events for auditing and downstream narration.
//!
//! The ledger records *decisions*; events record the conditions around them
//! that the ledger cannot express: void-destination conflicts and how they
//! were resolved, destinations with an empty pool, seat releases and
//! reconciliation trims. Reports read both streams.
//!
//! # Example
//!
//! ```rust
//! use mobility_allocation_core::models::event::{EngineEvent, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(EngineEvent::NoEligibleCandidates {
//!     round: 1,
//!     destination_id: "LISBOA".to_string(),
//! });
//!
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.events()[0].event_type(), "NoEligibleCandidates");
//! ```

use crate::core::rounds::RoundIndex;
use serde::Serialize;

/// How a void-destination conflict was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoidResolution {
    /// Candidate left out of the void destination's pool (default policy)
    Excluded,
    /// Candidate seated at a compatible destination with spare capacity
    Rerouted { destination_id: String },
}

/// Simulation event. Every event carries the round it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A round was opened
    RoundStarted {
        round: RoundIndex,
        label: String,
        eligible: usize,
    },

    /// The candidate's requested destination is void for this round
    VoidDestinationConflict {
        round: RoundIndex,
        candidate_id: String,
        destination_id: String,
        resolution: VoidResolution,
    },

    /// A destination had nobody eligible this round (warning, not an error)
    NoEligibleCandidates {
        round: RoundIndex,
        destination_id: String,
    },

    /// Seats frozen by withdrawals in `round` were released for the next one
    SeatsReleased {
        round: RoundIndex,
        destination_id: String,
        released: u32,
        promoted: u32,
    },

    /// Reconciler removed an over-capacity holder
    HolderTrimmed {
        round: RoundIndex,
        destination_id: String,
        candidate_id: String,
        priority_score: f64,
    },
}

impl EngineEvent {
    pub fn round(&self) -> RoundIndex {
        match self {
            EngineEvent::RoundStarted { round, .. } => *round,
            EngineEvent::VoidDestinationConflict { round, .. } => *round,
            EngineEvent::NoEligibleCandidates { round, .. } => *round,
            EngineEvent::SeatsReleased { round, .. } => *round,
            EngineEvent::HolderTrimmed { round, .. } => *round,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::RoundStarted { .. } => "RoundStarted",
            EngineEvent::VoidDestinationConflict { .. } => "VoidDestinationConflict",
            EngineEvent::NoEligibleCandidates { .. } => "NoEligibleCandidates",
            EngineEvent::SeatsReleased { .. } => "SeatsReleased",
            EngineEvent::HolderTrimmed { .. } => "HolderTrimmed",
        }
    }

    pub fn destination_id(&self) -> Option<&str> {
        match self {
            EngineEvent::VoidDestinationConflict { destination_id, .. } => Some(destination_id),
            EngineEvent::NoEligibleCandidates { destination_id, .. } => Some(destination_id),
            EngineEvent::SeatsReleased { destination_id, .. } => Some(destination_id),
            EngineEvent::HolderTrimmed { destination_id, .. } => Some(destination_id),
            EngineEvent::RoundStarted { .. } => None,
        }
    }

    pub fn candidate_id(&self) -> Option<&str> {
        match self {
            EngineEvent::VoidDestinationConflict { candidate_id, .. } => Some(candidate_id),
            EngineEvent::HolderTrimmed { candidate_id, .. } => Some(candidate_id),
            _ => None,
        }
    }
}

/// Ordered event storage with simple queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    events: Vec<EngineEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn events_in_round(&self, round: RoundIndex) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.round() == round).collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_destination(&self, destination_id: &str) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.destination_id() == Some(destination_id))
            .collect()
    }

    pub fn events_for_candidate(&self, candidate_id: &str) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.candidate_id() == Some(candidate_id))
            .collect()
    }
}
