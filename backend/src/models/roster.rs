//! Validated input tables
//!
//! The roster owns the destination and candidate tables for a run and
//! provides id lookups. Building one checks referential integrity once so the
//! allocation components can assume it.

use crate::models::candidate::Candidate;
use crate::models::destination::Destination;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("Duplicate destination ID: {0}")]
    DuplicateDestination(String),

    #[error("Duplicate candidate ID: {0}")]
    DuplicateCandidate(String),

    #[error("Candidate {candidate_id} requests unknown destination {destination_id}")]
    UnknownDestination {
        candidate_id: String,
        destination_id: String,
    },

    #[error("Candidate {0} has a non-finite priority score")]
    NonFiniteScore(String),
}

/// Destinations and candidates for one run, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    destinations: Vec<Destination>,
    candidates: Vec<Candidate>,
    destination_index: HashMap<String, usize>,
    candidate_index: HashMap<String, usize>,
}

impl Roster {
    pub fn new(
        destinations: Vec<Destination>,
        candidates: Vec<Candidate>,
    ) -> Result<Self, RosterError> {
        let mut destination_index = HashMap::with_capacity(destinations.len());
        for (idx, destination) in destinations.iter().enumerate() {
            if destination_index
                .insert(destination.id().to_string(), idx)
                .is_some()
            {
                return Err(RosterError::DuplicateDestination(
                    destination.id().to_string(),
                ));
            }
        }

        let mut candidate_index = HashMap::with_capacity(candidates.len());
        for (idx, candidate) in candidates.iter().enumerate() {
            if !candidate.priority_score().is_finite() {
                return Err(RosterError::NonFiniteScore(candidate.id().to_string()));
            }
            if !destination_index.contains_key(candidate.requested_destination_id()) {
                return Err(RosterError::UnknownDestination {
                    candidate_id: candidate.id().to_string(),
                    destination_id: candidate.requested_destination_id().to_string(),
                });
            }
            if candidate_index
                .insert(candidate.id().to_string(), idx)
                .is_some()
            {
                return Err(RosterError::DuplicateCandidate(candidate.id().to_string()));
            }
        }

        Ok(Self {
            destinations,
            candidates,
            destination_index,
            candidate_index,
        })
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destination_index
            .get(id)
            .map(|&idx| &self.destinations[idx])
    }

    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidate_index
            .get(id)
            .map(|&idx| &self.candidates[idx])
    }

    /// Destinations sorted by id, the iteration order used by every
    /// per-destination pass.
    pub fn destinations_by_id(&self) -> Vec<&Destination> {
        let mut sorted: Vec<&Destination> = self.destinations.iter().collect();
        sorted.sort_by(|a, b| a.id().cmp(b.id()));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_requested_destination() {
        let err = Roster::new(
            vec![Destination::new("X", 1)],
            vec![Candidate::new("A", 9.0, "Y")],
        )
        .unwrap_err();
        assert!(matches!(err, RosterError::UnknownDestination { .. }));
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = Roster::new(
            vec![Destination::new("X", 1), Destination::new("X", 2)],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, RosterError::DuplicateDestination("X".to_string()));

        let err = Roster::new(
            vec![Destination::new("X", 1)],
            vec![Candidate::new("A", 9.0, "X"), Candidate::new("A", 8.0, "X")],
        )
        .unwrap_err();
        assert_eq!(err, RosterError::DuplicateCandidate("A".to_string()));
    }

    #[test]
    fn test_rejects_nan_score() {
        let err = Roster::new(
            vec![Destination::new("X", 1)],
            vec![Candidate::new("A", f64::NAN, "X")],
        )
        .unwrap_err();
        assert_eq!(err, RosterError::NonFiniteScore("A".to_string()));
    }

    #[test]
    fn test_lookup_and_sorted_destinations() {
        let roster = Roster::new(
            vec![Destination::new("Z", 1), Destination::new("A", 1)],
            vec![Candidate::new("S1", 7.5, "Z")],
        )
        .unwrap();
        assert_eq!(roster.candidate("S1").unwrap().requested_destination_id(), "Z");
        let ids: Vec<&str> = roster.destinations_by_id().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["A", "Z"]);
    }
}
