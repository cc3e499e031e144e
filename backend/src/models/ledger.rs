//! Capacity ledger
//!
//! Append-only record of every allocation decision plus the per-destination
//! seat accounts derived from it. The ledger is an owned value: the engine
//! holds one per run and nothing else mutates it.
//!
//! # Seat accounting
//!
//! Each destination keeps three integers:
//!
//! ```text
//! capacity  fixed at creation
//! occupied  active (non-withdrawn) holders
//! frozen    seats released by a withdrawal this round, not yet usable
//! remaining = capacity - occupied - frozen
//! ```
//!
//! A withdrawal in round r moves one seat from `occupied` to `frozen`; the
//! seat only becomes assignable after [`CapacityLedger::release_for_next_round`].
//!
//! # Critical Invariants
//!
//! 1. `remaining` never goes negative: an assignment into a full destination
//!    fails with [`LedgerError::CapacityExceeded`] instead of clamping
//! 2. A candidate has at most one active holder entry across all destinations
//! 3. Entries are only mutated to mark a withdrawal, and only pruned by the
//!    reconciler

use crate::core::rounds::RoundIndex;
use crate::models::destination::Destination;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Role recorded for a candidate at a destination in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Holder,
    Waitlisted,
}

/// How a ledger entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryOrigin {
    /// Ranked into place by the round allocator
    Ranked,
    /// Promoted from the previous round's waitlist into a released seat
    Promoted,
    /// Moved off a void destination by the re-routing policy
    Rerouted,
}

/// One allocation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Append position; later decisions have larger sequence numbers
    pub seq: u64,
    pub destination_id: String,
    pub round: RoundIndex,
    pub candidate_id: String,
    pub role: Role,
    pub origin: EntryOrigin,
    /// Round in which a holder withdrew
    #[serde(default)]
    pub withdrawn_in: Option<RoundIndex>,
}

impl LedgerEntry {
    pub fn withdrawn(&self) -> bool {
        self.withdrawn_in.is_some()
    }

    pub fn is_active_holder(&self) -> bool {
        self.role == Role::Holder && self.withdrawn_in.is_none()
    }

    /// Whether this entry is a standing holder at the end of `round`.
    ///
    /// A holder that withdrew in `round` no longer counts, although its seat
    /// stays frozen until the next round opens.
    pub fn holds_seat_after(&self, round: RoundIndex) -> bool {
        self.role == Role::Holder
            && self.round <= round
            && self.withdrawn_in.map_or(true, |w| w > round)
    }
}

/// Ledger failures. Both are structural: they indicate an upstream logic
/// defect and abort the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Capacity exceeded at {destination_id} in round {round}: {committed}/{capacity} seats")]
    CapacityExceeded {
        destination_id: String,
        round: RoundIndex,
        capacity: u32,
        committed: u32,
    },

    #[error("Invalid ledger state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DestinationAccount {
    capacity: u32,
    occupied: u32,
    frozen: u32,
}

impl DestinationAccount {
    fn new(capacity: u32) -> Self {
        Self {
            capacity,
            occupied: 0,
            frozen: 0,
        }
    }

    fn committed(&self) -> u32 {
        self.occupied + self.frozen
    }
}

/// Lookup tables over `entries`, keyed by entry position.
///
/// Appends update them in place; anything that removes entries rebuilds them.
#[derive(Debug, Clone, Default, PartialEq)]
struct EntryIndex {
    /// Candidate -> position of their active holder entry
    active: BTreeMap<String, usize>,
    /// `(round, destination, candidate)` of every waitlist entry
    waitlisted: HashSet<(RoundIndex, String, String)>,
    /// Candidates that withdrew from any seat
    withdrawn: BTreeSet<String>,
    by_destination: BTreeMap<String, Vec<usize>>,
    by_candidate: BTreeMap<String, Vec<usize>>,
}

impl EntryIndex {
    fn build(entries: &[LedgerEntry]) -> Self {
        let mut index = Self::default();
        for (position, entry) in entries.iter().enumerate() {
            index.insert(position, entry);
        }
        index
    }

    fn insert(&mut self, position: usize, entry: &LedgerEntry) {
        if entry.is_active_holder() {
            // Restored ledgers may carry a double holding; keep the first
            self.active
                .entry(entry.candidate_id.clone())
                .or_insert(position);
        }
        if entry.role == Role::Waitlisted {
            self.waitlisted.insert((
                entry.round,
                entry.destination_id.clone(),
                entry.candidate_id.clone(),
            ));
        }
        if entry.withdrawn() {
            self.withdrawn.insert(entry.candidate_id.clone());
        }
        self.by_destination
            .entry(entry.destination_id.clone())
            .or_default()
            .push(position);
        self.by_candidate
            .entry(entry.candidate_id.clone())
            .or_default()
            .push(position);
    }
}

/// Per-destination seat bookkeeping and the decision log.
///
/// # Example
/// ```
/// use mobility_allocation_core::{CapacityLedger, Destination, EntryOrigin};
///
/// let mut ledger = CapacityLedger::new(&[Destination::new("X", 2)]);
/// ledger.begin_round(0).unwrap();
///
/// ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
/// ledger.record_waitlisted("X", 0, "B").unwrap();
/// assert_eq!(ledger.remaining_capacity("X", 0).unwrap(), 1);
///
/// // Withdrawal frees the seat only for the next round
/// ledger.record_withdrawal("X", 0, "A").unwrap();
/// assert_eq!(ledger.remaining_capacity("X", 0).unwrap(), 1);
///
/// ledger.begin_round(1).unwrap();
/// ledger.release_for_next_round("X", 1).unwrap();
/// assert_eq!(ledger.remaining_capacity("X", 1).unwrap(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityLedger {
    accounts: BTreeMap<String, DestinationAccount>,
    entries: Vec<LedgerEntry>,
    current_round: Option<RoundIndex>,
    next_seq: u64,
    index: EntryIndex,
}

impl CapacityLedger {
    /// Create an empty ledger with one seat account per destination.
    pub fn new(destinations: &[Destination]) -> Self {
        let accounts = destinations
            .iter()
            .map(|d| (d.id().to_string(), DestinationAccount::new(d.capacity())))
            .collect();

        Self {
            accounts,
            entries: Vec::new(),
            current_round: None,
            next_seq: 0,
            index: EntryIndex::default(),
        }
    }

    /// Rebuild a ledger from persisted entries.
    ///
    /// Capacity is NOT enforced here: a restored ledger may carry overruns
    /// produced elsewhere, which is exactly what the reconciler inspects.
    /// Seats frozen at persistence time are not restored; the ledger resumes
    /// as a closed run.
    pub fn restore(
        destinations: &[Destination],
        mut entries: Vec<LedgerEntry>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::new(destinations);
        entries.sort_by_key(|e| e.seq);

        for entry in &entries {
            let account = ledger.accounts.get_mut(&entry.destination_id).ok_or_else(|| {
                LedgerError::InvalidState(format!(
                    "entry {} references unknown destination {}",
                    entry.seq, entry.destination_id
                ))
            })?;
            if entry.is_active_holder() {
                account.occupied += 1;
            }
        }

        ledger.current_round = entries.iter().map(|e| e.round).max();
        ledger.next_seq = entries.last().map_or(0, |e| e.seq + 1);
        ledger.index = EntryIndex::build(&entries);
        ledger.entries = entries;
        Ok(ledger)
    }

    // ========================================================================
    // Round control
    // ========================================================================

    /// Open `round` for recording. Rounds must strictly increase.
    pub fn begin_round(&mut self, round: RoundIndex) -> Result<(), LedgerError> {
        if let Some(current) = self.current_round {
            if round <= current {
                return Err(LedgerError::InvalidState(format!(
                    "round {} opened after round {}",
                    round, current
                )));
            }
        }
        self.current_round = Some(round);
        Ok(())
    }

    pub fn current_round(&self) -> Option<RoundIndex> {
        self.current_round
    }

    fn check_round(&self, round: RoundIndex) -> Result<(), LedgerError> {
        match self.current_round {
            Some(current) if current == round => Ok(()),
            Some(current) => Err(LedgerError::InvalidState(format!(
                "round {} referenced while round {} is open",
                round, current
            ))),
            None => Err(LedgerError::InvalidState(format!(
                "round {} referenced before any round was opened",
                round
            ))),
        }
    }

    fn account(&self, destination_id: &str) -> Result<&DestinationAccount, LedgerError> {
        self.accounts.get(destination_id).ok_or_else(|| {
            LedgerError::InvalidState(format!("unknown destination {}", destination_id))
        })
    }

    fn account_mut(
        &mut self,
        destination_id: &str,
    ) -> Result<&mut DestinationAccount, LedgerError> {
        self.accounts.get_mut(destination_id).ok_or_else(|| {
            LedgerError::InvalidState(format!("unknown destination {}", destination_id))
        })
    }

    // ========================================================================
    // Mutation API
    // ========================================================================

    /// Seats assignable at `destination_id` in the open round.
    pub fn remaining_capacity(
        &self,
        destination_id: &str,
        round: RoundIndex,
    ) -> Result<u32, LedgerError> {
        self.check_round(round)?;
        let account = self.account(destination_id)?;
        account
            .capacity
            .checked_sub(account.committed())
            .ok_or_else(|| LedgerError::CapacityExceeded {
                destination_id: destination_id.to_string(),
                round,
                capacity: account.capacity,
                committed: account.committed(),
            })
    }

    /// Seat `candidate_id` at `destination_id`.
    ///
    /// Fails with `CapacityExceeded` when no seat remains and with
    /// `InvalidState` when the candidate already holds an active seat.
    pub fn record_holder(
        &mut self,
        destination_id: &str,
        round: RoundIndex,
        candidate_id: &str,
        origin: EntryOrigin,
    ) -> Result<(), LedgerError> {
        if self.remaining_capacity(destination_id, round)? == 0 {
            let account = self.account(destination_id)?;
            return Err(LedgerError::CapacityExceeded {
                destination_id: destination_id.to_string(),
                round,
                capacity: account.capacity,
                committed: account.committed() + 1,
            });
        }

        if let Some(existing) = self.active_holding(candidate_id) {
            return Err(LedgerError::InvalidState(format!(
                "candidate {} already holds a seat at {} (round {})",
                candidate_id, existing.destination_id, existing.round
            )));
        }

        self.account_mut(destination_id)?.occupied += 1;
        self.push(destination_id, round, candidate_id, Role::Holder, origin);
        Ok(())
    }

    /// Put `candidate_id` on the waitlist of `destination_id`. Call in rank
    /// order: waitlist order is append order.
    pub fn record_waitlisted(
        &mut self,
        destination_id: &str,
        round: RoundIndex,
        candidate_id: &str,
    ) -> Result<(), LedgerError> {
        self.check_round(round)?;
        self.account(destination_id)?;

        if self.active_holding(candidate_id).is_some() {
            return Err(LedgerError::InvalidState(format!(
                "candidate {} is an active holder and cannot be waitlisted",
                candidate_id
            )));
        }

        let key = (round, destination_id.to_string(), candidate_id.to_string());
        if self.index.waitlisted.contains(&key) {
            return Err(LedgerError::InvalidState(format!(
                "candidate {} already waitlisted at {} in round {}",
                candidate_id, destination_id, round
            )));
        }

        self.push(
            destination_id,
            round,
            candidate_id,
            Role::Waitlisted,
            EntryOrigin::Ranked,
        );
        Ok(())
    }

    /// Mark the candidate's active seat at `destination_id` as withdrawn in
    /// `round`. The seat is frozen until released for the next round.
    pub fn record_withdrawal(
        &mut self,
        destination_id: &str,
        round: RoundIndex,
        candidate_id: &str,
    ) -> Result<(), LedgerError> {
        self.check_round(round)?;

        let position = self
            .index
            .active
            .get(candidate_id)
            .copied()
            .filter(|&p| {
                let e = &self.entries[p];
                e.round <= round && e.destination_id == destination_id
            })
            .ok_or_else(|| {
                LedgerError::InvalidState(format!(
                    "candidate {} is not a current holder at {} in round {}",
                    candidate_id, destination_id, round
                ))
            })?;

        let account = self.account_mut(destination_id)?;
        account.occupied = account.occupied.checked_sub(1).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "occupancy underflow at {} while withdrawing {}",
                destination_id, candidate_id
            ))
        })?;
        account.frozen += 1;

        self.entries[position].withdrawn_in = Some(round);
        self.index.active.remove(candidate_id);
        self.index.withdrawn.insert(candidate_id.to_string());
        Ok(())
    }

    /// Unfreeze `amount` seats released by earlier withdrawals.
    pub fn release_for_next_round(
        &mut self,
        destination_id: &str,
        amount: u32,
    ) -> Result<(), LedgerError> {
        let account = self.account_mut(destination_id)?;
        account.frozen = account.frozen.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "cannot release {} seats at {}: only {} frozen",
                amount, destination_id, account.frozen
            ))
        })?;
        Ok(())
    }

    /// Remove every holder entry for `candidate_id` at `destination_id`.
    /// Reconciler-only; returns the number of entries pruned.
    pub(crate) fn prune_holder(&mut self, destination_id: &str, candidate_id: &str) -> usize {
        let active = self
            .entries
            .iter()
            .filter(|e| {
                e.is_active_holder()
                    && e.destination_id == destination_id
                    && e.candidate_id == candidate_id
            })
            .count() as u32;

        let before = self.entries.len();
        self.entries.retain(|e| {
            !(e.role == Role::Holder
                && e.destination_id == destination_id
                && e.candidate_id == candidate_id)
        });

        if let Some(account) = self.accounts.get_mut(destination_id) {
            account.occupied = account.occupied.saturating_sub(active);
        }
        self.index = EntryIndex::build(&self.entries);
        before - self.entries.len()
    }

    fn push(
        &mut self,
        destination_id: &str,
        round: RoundIndex,
        candidate_id: &str,
        role: Role,
        origin: EntryOrigin,
    ) {
        let entry = LedgerEntry {
            seq: self.next_seq,
            destination_id: destination_id.to_string(),
            round,
            candidate_id: candidate_id.to_string(),
            role,
            origin,
            withdrawn_in: None,
        };
        self.index.insert(self.entries.len(), &entry);
        self.entries.push(entry);
        self.next_seq += 1;
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LedgerEntry> {
        self.entries
    }

    pub fn entries_for_candidate<'a>(
        &'a self,
        candidate_id: &str,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.positions(self.index.by_candidate.get(candidate_id))
    }

    /// Every entry at `destination_id`, in ledger order.
    pub fn entries_at<'a>(
        &'a self,
        destination_id: &str,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.positions(self.index.by_destination.get(destination_id))
    }

    fn positions<'a>(
        &'a self,
        positions: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        positions
            .into_iter()
            .flatten()
            .map(move |&p| &self.entries[p])
    }

    pub fn capacity(&self, destination_id: &str) -> Option<u32> {
        self.accounts.get(destination_id).map(|a| a.capacity)
    }

    /// Seats withdrawn but not yet released.
    pub fn frozen_seats(&self, destination_id: &str) -> u32 {
        self.accounts.get(destination_id).map_or(0, |a| a.frozen)
    }

    pub fn destination_ids(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    /// The candidate's active holder entry, if any.
    pub fn active_holding(&self, candidate_id: &str) -> Option<&LedgerEntry> {
        self.index
            .active
            .get(candidate_id)
            .map(|&p| &self.entries[p])
    }

    /// Whether the candidate withdrew from any seat.
    pub fn has_withdrawn(&self, candidate_id: &str) -> bool {
        self.index.withdrawn.contains(candidate_id)
    }

    /// Standing holders at the end of `round`, including holders carried
    /// over from earlier rounds.
    pub fn holders_at(&self, destination_id: &str, round: RoundIndex) -> Vec<&LedgerEntry> {
        self.entries_at(destination_id)
            .filter(|e| e.holds_seat_after(round))
            .collect()
    }

    /// Waitlist of `destination_id` in `round`, in rank order.
    pub fn waitlist_at(&self, destination_id: &str, round: RoundIndex) -> Vec<&LedgerEntry> {
        self.entries_at(destination_id)
            .filter(|e| e.role == Role::Waitlisted && e.round == round)
            .collect()
    }

    /// Holders that withdrew from `destination_id` during `round`.
    pub fn withdrawals_at(&self, destination_id: &str, round: RoundIndex) -> Vec<&LedgerEntry> {
        self.entries_at(destination_id)
            .filter(|e| e.withdrawn_in == Some(round))
            .collect()
    }

    /// Holder entries recorded in `round` that have not withdrawn.
    pub fn holders_recorded_in(&self, round: RoundIndex) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.round == round && e.is_active_holder())
            .collect()
    }

    /// Candidates whose last entry at `destination_id` is an active holder.
    pub fn net_holders(&self, destination_id: &str) -> Vec<&LedgerEntry> {
        let mut last: BTreeMap<&str, &LedgerEntry> = BTreeMap::new();
        for entry in self.entries_at(destination_id) {
            last.insert(entry.candidate_id.as_str(), entry);
        }
        last.into_values()
            .filter(|e| e.is_active_holder())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(capacity: u32) -> CapacityLedger {
        let mut ledger = CapacityLedger::new(&[Destination::new("X", capacity)]);
        ledger.begin_round(0).unwrap();
        ledger
    }

    #[test]
    fn test_record_holder_consumes_capacity() {
        let mut ledger = ledger(2);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        assert_eq!(ledger.remaining_capacity("X", 0).unwrap(), 1);
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].seq, 0);
    }

    #[test]
    fn test_record_holder_fails_when_full() {
        let mut ledger = ledger(1);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        let err = ledger
            .record_holder("X", 0, "B", EntryOrigin::Ranked)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { capacity: 1, .. }));
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn test_second_active_seat_rejected() {
        let mut ledger =
            CapacityLedger::new(&[Destination::new("X", 1), Destination::new("Y", 1)]);
        ledger.begin_round(0).unwrap();
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        let err = ledger
            .record_holder("Y", 0, "A", EntryOrigin::Ranked)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn test_withdrawal_of_non_holder_is_invalid() {
        let mut ledger = ledger(1);
        ledger.record_waitlisted("X", 0, "A").unwrap();
        let err = ledger.record_withdrawal("X", 0, "A").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn test_release_more_than_frozen_is_invalid() {
        let mut ledger = ledger(1);
        assert!(ledger.release_for_next_round("X", 1).is_err());
    }

    #[test]
    fn test_rounds_must_increase() {
        let mut ledger = ledger(1);
        assert!(ledger.begin_round(0).is_err());
        ledger.begin_round(2).unwrap();
        assert!(ledger.remaining_capacity("X", 1).is_err());
    }

    #[test]
    fn test_prune_holder_restores_occupancy() {
        let mut ledger = ledger(2);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        assert_eq!(ledger.prune_holder("X", "A"), 1);
        assert_eq!(ledger.remaining_capacity("X", 0).unwrap(), 2);
        assert!(ledger.entries().is_empty());

        // Lookups follow the pruned entries
        assert!(ledger.active_holding("A").is_none());
        assert_eq!(ledger.entries_at("X").count(), 0);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
    }

    #[test]
    fn test_duplicate_waitlist_entry_rejected() {
        let mut ledger = ledger(0);
        ledger.record_waitlisted("X", 0, "A").unwrap();
        assert!(ledger.record_waitlisted("X", 0, "A").is_err());

        ledger.begin_round(1).unwrap();
        ledger.record_waitlisted("X", 1, "A").unwrap();
    }

    #[test]
    fn test_lookups_track_withdrawals() {
        let mut ledger = ledger(1);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        assert_eq!(ledger.active_holding("A").map(|e| e.seq), Some(0));
        assert!(!ledger.has_withdrawn("A"));

        ledger.record_withdrawal("X", 0, "A").unwrap();
        assert!(ledger.active_holding("A").is_none());
        assert!(ledger.has_withdrawn("A"));
        assert!(ledger.record_withdrawal("X", 0, "A").is_err());
    }

    #[test]
    fn test_restore_rebuilds_lookups() {
        let mut ledger = ledger(2);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        ledger.record_holder("X", 0, "B", EntryOrigin::Ranked).unwrap();
        ledger.record_waitlisted("X", 0, "C").unwrap();
        ledger.record_withdrawal("X", 0, "B").unwrap();

        let restored =
            CapacityLedger::restore(&[Destination::new("X", 2)], ledger.entries().to_vec())
                .unwrap();
        assert_eq!(restored.active_holding("A").map(|e| e.seq), Some(0));
        assert!(restored.active_holding("B").is_none());
        assert!(restored.has_withdrawn("B"));
        assert_eq!(restored.entries_for_candidate("C").count(), 1);
        assert_eq!(restored.waitlist_at("X", 0).len(), 1);
    }

    #[test]
    fn test_net_holders_uses_last_entry() {
        let mut ledger = ledger(2);
        ledger.record_holder("X", 0, "A", EntryOrigin::Ranked).unwrap();
        ledger.record_holder("X", 0, "B", EntryOrigin::Ranked).unwrap();
        ledger.record_withdrawal("X", 0, "A").unwrap();

        let net: Vec<&str> = ledger
            .net_holders("X")
            .iter()
            .map(|e| e.candidate_id.as_str())
            .collect();
        assert_eq!(net, vec!["B"]);
    }
}
