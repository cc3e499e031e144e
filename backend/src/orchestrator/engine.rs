//! Allocation Engine
//!
//! Round loop integrating every allocation component:
//! - Eligibility filtering (per round, against ledger state)
//! - Ranking and seating (one destination at a time)
//! - Void-destination re-routing (pluggable policy)
//! - Withdrawal simulation (injected random source)
//! - Promotion into released seats (feeds the next round)
//! - Reconciliation and status projection (after the final round)
//!
//! # Architecture
//!
//! ```text
//! For each round r in the schedule:
//! 1. Filter eligible candidates (void conflicts set aside)
//! 2. Allocate every non-void destination in id order
//! 3. Resolve void conflicts in rank order (exclude or re-route)
//! 4. Draw withdrawals for holders seated in r
//! 5. If r is not final: open r+1, release frozen seats, promote waitlists
//! After the final round:
//! 6. Reconcile (verify or repair)
//! 7. Project final statuses, history and occupancy
//! ```
//!
//! # Example
//!
//! ```rust
//! use mobility_allocation_core::orchestrator::{AllocationEngine, EngineConfig};
//! use mobility_allocation_core::{Candidate, Destination, FinalStatus};
//!
//! let config = EngineConfig {
//!     rng_seed: 12345,
//!     ..Default::default()
//! };
//!
//! let engine = AllocationEngine::new(
//!     config,
//!     vec![Destination::new("X", 2)],
//!     vec![
//!         Candidate::new("A", 9.0, "X"),
//!         Candidate::new("B", 8.5, "X"),
//!         Candidate::new("C", 7.0, "X"),
//!     ],
//! )
//! .unwrap();
//!
//! let outcome = engine.run().unwrap();
//! assert_eq!(outcome.status_of("A"), Some(FinalStatus::Assigned));
//! assert_eq!(outcome.status_of("B"), Some(FinalStatus::Assigned));
//! ```

use crate::allocation::{
    allocate_destination, assignment_history, filter_round, project, promote_waitlisted,
    reconcile, simulate_withdrawals, AssignmentRecord, DestinationAllocation, EligibilityRules,
    FinalAssignment, FinalStatus, ReconcileMode, ReconciliationReport, SeatRelease, Withdrawal,
    WithdrawalTable,
};
use crate::core::rounds::{standard_rounds, Round, RoundIndex, RoundSchedule};
use crate::models::{
    rank_order, Candidate, CapacityLedger, Destination, EngineEvent, EntryOrigin, EventLog,
    LedgerEntry, LedgerError, Roster, RosterError, VoidResolution,
};
use crate::orchestrator::checkpoint::{
    compute_config_hash, compute_ledger_digest, RunSnapshot, SnapshotError,
};
use crate::policy::{build_reroute_policy, RerouteOption, ReroutePolicy, VoidPolicyConfig};
use crate::report::OccupancyReport;
use crate::rng::{RandomSource, SeededRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration Types
// ============================================================================

fn default_true() -> bool {
    true
}

/// Complete engine configuration
///
/// Loaded from JSON; every field has a default so `{}` is a valid config
/// (standard four rounds, no withdrawals, void conflicts excluded, verify-only
/// reconciliation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ordered round schedule
    #[serde(default = "standard_rounds")]
    pub rounds: Vec<Round>,

    /// Seed for the default random source
    #[serde(default)]
    pub rng_seed: u64,

    /// `{round, outcome class} -> probability`
    #[serde(default)]
    pub withdrawals: WithdrawalTable,

    #[serde(default)]
    pub void_policy: VoidPolicyConfig,

    #[serde(default)]
    pub reconcile: ReconcileMode,

    /// Candidates who withdrew may compete again in later rounds
    #[serde(default = "default_true")]
    pub readmit_withdrawn: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rounds: standard_rounds(),
            rng_seed: 0,
            withdrawals: WithdrawalTable::default(),
            void_policy: VoidPolicyConfig::default(),
            reconcile: ReconcileMode::default(),
            readmit_withdrawn: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, AllocationError> {
        serde_json::from_str(json)
            .map_err(|e| AllocationError::InvalidConfig(format!("config JSON: {}", e)))
    }

    pub fn eligibility_rules(&self) -> EligibilityRules {
        EligibilityRules {
            readmit_withdrawn: self.readmit_withdrawn,
        }
    }
}

/// Engine failures. Everything except `InvalidConfig`/`InvalidInput` is a
/// structural defect that aborts the run.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] RosterError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Re-route policy {policy} chose {target}, which has no free seat this round")]
    InvalidRerouteTarget { policy: &'static str, target: String },

    #[error("All {0} rounds have already run")]
    RunFinished(usize),

    #[error("Run is not finished: {remaining} rounds remaining")]
    RunIncomplete { remaining: usize },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

// ============================================================================
// Results
// ============================================================================

/// What happened in one round
#[derive(Debug, Clone, Default)]
pub struct RoundResult {
    pub round: RoundIndex,
    pub label: String,
    /// Candidates eligible for their requested destination
    pub eligible: usize,
    pub allocations: Vec<DestinationAllocation>,
    /// Void conflicts handed to the policy this round
    pub void_conflicts: usize,
    pub rerouted: usize,
    pub withdrawals: Vec<Withdrawal>,
    /// Seats released into the next round (empty after the final round)
    pub releases: Vec<SeatRelease>,
}

impl RoundResult {
    pub fn num_holders(&self) -> usize {
        self.allocations.iter().map(|a| a.holders.len()).sum::<usize>() + self.rerouted
    }

    pub fn num_promoted(&self) -> usize {
        self.releases.iter().map(|r| r.promoted.len()).sum()
    }
}

/// Reconciled result of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    /// Config, inputs and the reconciled ledger
    pub snapshot: RunSnapshot,
    pub assignments: Vec<FinalAssignment>,
    pub history: Vec<AssignmentRecord>,
    pub occupancy: OccupancyReport,
    pub events: EventLog,
    pub reconciliation: ReconciliationReport,
    /// SHA-256 of the reconciled ledger entries
    pub ledger_digest: String,
}

impl AllocationOutcome {
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.snapshot.entries
    }

    pub fn assignment(&self, candidate_id: &str) -> Option<&FinalAssignment> {
        self.assignments
            .iter()
            .find(|a| a.candidate_id == candidate_id)
    }

    pub fn status_of(&self, candidate_id: &str) -> Option<FinalStatus> {
        self.assignment(candidate_id).map(|a| a.status)
    }

    pub fn count_with_status(&self, status: FinalStatus) -> usize {
        self.assignments.iter().filter(|a| a.status == status).count()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Owns one run: roster, ledger, event log, random source and policy.
///
/// # Determinism
///
/// All randomness goes through the injected [`RandomSource`], by default a
/// [`SeededRng`] seeded from the config. Same seed + same inputs = identical
/// ledger.
pub struct AllocationEngine {
    config: EngineConfig,
    config_hash: String,
    roster: Roster,
    schedule: RoundSchedule,
    ledger: CapacityLedger,
    events: EventLog,
    rng: Box<dyn RandomSource>,
    reroute: Box<dyn ReroutePolicy>,
    /// Candidates whose void conflict was resolved by exclusion
    void_excluded: BTreeSet<String>,
    finished: bool,
}

impl AllocationEngine {
    /// Validate config and inputs and open an empty ledger.
    pub fn new(
        config: EngineConfig,
        destinations: Vec<Destination>,
        candidates: Vec<Candidate>,
    ) -> Result<Self, AllocationError> {
        Self::validate_config(&config)?;

        let roster = Roster::new(destinations, candidates)?;
        let config_hash = compute_config_hash(&config)?;
        let ledger = CapacityLedger::new(roster.destinations());
        let schedule = RoundSchedule::new(config.rounds.clone());
        let rng = Box::new(SeededRng::new(config.rng_seed));
        let reroute = build_reroute_policy(&config.void_policy);

        info!(
            rounds = schedule.len(),
            destinations = roster.destinations().len(),
            candidates = roster.candidates().len(),
            seed = config.rng_seed,
            policy = reroute.name(),
            config_hash = %config_hash,
            "allocation engine ready"
        );

        Ok(Self {
            config,
            config_hash,
            roster,
            schedule,
            ledger,
            events: EventLog::new(),
            rng,
            reroute,
            void_excluded: BTreeSet::new(),
            finished: false,
        })
    }

    /// Replace the seeded random source.
    pub fn with_random_source(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the configured re-routing policy.
    pub fn with_reroute_policy(mut self, policy: impl ReroutePolicy + 'static) -> Self {
        self.reroute = Box::new(policy);
        self
    }

    fn validate_config(config: &EngineConfig) -> Result<(), AllocationError> {
        if config.rounds.is_empty() {
            return Err(AllocationError::InvalidConfig(
                "at least one round is required".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        for round in &config.rounds {
            if !labels.insert(round.label.as_str()) {
                return Err(AllocationError::InvalidConfig(format!(
                    "duplicate round label: {}",
                    round.label
                )));
            }
        }

        let dates: Vec<_> = config.rounds.iter().filter_map(|r| r.opens_on).collect();
        if dates.windows(2).any(|w| w[1] < w[0]) {
            return Err(AllocationError::InvalidConfig(
                "round opening dates must not decrease".to_string(),
            ));
        }

        config
            .withdrawals
            .validate()
            .map_err(AllocationError::InvalidConfig)?;
        config
            .void_policy
            .validate()
            .map_err(AllocationError::InvalidConfig)?;

        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Round the next call to [`run_round`](Self::run_round) will process.
    pub fn current_round(&self) -> Option<RoundIndex> {
        (!self.finished).then(|| self.schedule.current_index())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Snapshot of the run so far (unreconciled).
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            config_hash: self.config_hash.clone(),
            config: self.config.clone(),
            destinations: self.roster.destinations().to_vec(),
            candidates: self.roster.candidates().to_vec(),
            entries: self.ledger.entries().to_vec(),
        }
    }

    // ========================================================================
    // Round Loop
    // ========================================================================

    /// Run the current round end to end, including the hand-off into the
    /// next round.
    pub fn run_round(&mut self) -> Result<RoundResult, AllocationError> {
        if self.finished {
            return Err(AllocationError::RunFinished(self.schedule.len()));
        }

        let index = self.schedule.current_index();
        let round = self.schedule.current().clone();
        if self.ledger.current_round() != Some(index) {
            self.ledger.begin_round(index)?;
        }

        let rules = self.config.eligibility_rules();

        // STEP 1: ELIGIBILITY
        let pool = filter_round(&self.roster, &round, index, &self.ledger, &rules);
        self.events.log(EngineEvent::RoundStarted {
            round: index,
            label: round.label.clone(),
            eligible: pool.eligible_count(),
        });
        debug!(
            round = %round.label,
            eligible = pool.eligible_count(),
            void_conflicts = pool.void_conflicts.len(),
            excluded = pool.excluded.len(),
            "round opened"
        );

        let mut result = RoundResult {
            round: index,
            label: round.label.clone(),
            eligible: pool.eligible_count(),
            ..Default::default()
        };

        // STEP 2: ALLOCATION
        for destination in self.roster.destinations_by_id() {
            if destination.is_void_for(&round) {
                continue;
            }

            let candidates = pool.for_destination(destination.id());
            if candidates.is_empty() {
                warn!(
                    round = %round.label,
                    destination = destination.id(),
                    "no eligible candidates"
                );
                self.events.log(EngineEvent::NoEligibleCandidates {
                    round: index,
                    destination_id: destination.id().to_string(),
                });
                continue;
            }

            let allocation =
                allocate_destination(&mut self.ledger, destination.id(), index, candidates)?;
            debug!(
                round = %round.label,
                destination = destination.id(),
                holders = allocation.holders.len(),
                waitlisted = allocation.waitlisted.len(),
                "destination allocated"
            );
            result.allocations.push(allocation);
        }

        // STEP 3: VOID CONFLICTS
        // A conflict is offered to the policy once; an exclusion stands for
        // the rest of the run.
        let mut conflicted: Vec<&Candidate> = pool
            .void_conflicts
            .iter()
            .copied()
            .filter(|c| !self.void_excluded.contains(c.id()))
            .collect();
        conflicted.sort_by(|a, b| rank_order(a, b));
        result.void_conflicts = conflicted.len();

        for candidate in conflicted {
            let requested = candidate.requested_destination_id();
            let Some(void_destination) = self.roster.destination(requested) else {
                continue;
            };

            let mut options = Vec::new();
            for destination in self.roster.destinations_by_id() {
                if destination.id() == void_destination.id() || destination.is_void_for(&round) {
                    continue;
                }
                let remaining = self.ledger.remaining_capacity(destination.id(), index)?;
                if remaining > 0 {
                    options.push(RerouteOption {
                        destination,
                        remaining,
                    });
                }
            }

            let target =
                self.reroute
                    .select_target(candidate, void_destination, &options, &mut *self.rng);

            let resolution = match target {
                Some(target) => {
                    if !options.iter().any(|o| o.destination.id() == target) {
                        return Err(AllocationError::InvalidRerouteTarget {
                            policy: self.reroute.name(),
                            target,
                        });
                    }
                    self.ledger.record_holder(
                        &target,
                        index,
                        candidate.id(),
                        EntryOrigin::Rerouted,
                    )?;
                    result.rerouted += 1;
                    VoidResolution::Rerouted {
                        destination_id: target,
                    }
                }
                None => {
                    self.void_excluded.insert(candidate.id().to_string());
                    VoidResolution::Excluded
                }
            };

            warn!(
                round = %round.label,
                candidate = candidate.id(),
                destination = void_destination.id(),
                resolution = ?resolution,
                "void destination conflict"
            );
            self.events.log(EngineEvent::VoidDestinationConflict {
                round: index,
                candidate_id: candidate.id().to_string(),
                destination_id: void_destination.id().to_string(),
                resolution,
            });
        }

        // STEP 4: WITHDRAWALS
        result.withdrawals = simulate_withdrawals(
            &mut self.ledger,
            &self.roster,
            index,
            &round.label,
            &self.config.withdrawals,
            &mut *self.rng,
        )?;

        // STEP 5: PROMOTION INTO THE NEXT ROUND
        match self.schedule.next_index() {
            Some(next_index) => {
                let next_round = self.schedule.rounds()[next_index].clone();
                self.ledger.begin_round(next_index)?;
                result.releases = promote_waitlisted(
                    &mut self.ledger,
                    &self.roster,
                    index,
                    &next_round,
                    next_index,
                    &rules,
                )?;
                for release in &result.releases {
                    self.events.log(EngineEvent::SeatsReleased {
                        round: index,
                        destination_id: release.destination_id.clone(),
                        released: release.released,
                        promoted: release.promoted.len() as u32,
                    });
                }
                self.schedule.advance();
            }
            None => self.finished = true,
        }

        info!(
            round = %result.label,
            holders = result.num_holders(),
            withdrawals = result.withdrawals.len(),
            promoted = result.num_promoted(),
            rerouted = result.rerouted,
            "round complete"
        );

        Ok(result)
    }

    /// Run every remaining round and finish.
    pub fn run(mut self) -> Result<AllocationOutcome, AllocationError> {
        while !self.finished {
            self.run_round()?;
        }
        self.finish()
    }

    /// Reconcile the finished ledger and project the outcome.
    pub fn finish(mut self) -> Result<AllocationOutcome, AllocationError> {
        if !self.finished {
            return Err(AllocationError::RunIncomplete {
                remaining: self.schedule.len() - self.schedule.current_index(),
            });
        }

        let final_round = self.schedule.current_index();
        let reconciliation = reconcile(&mut self.ledger, &self.roster, self.config.reconcile)?;
        for trim in &reconciliation.trims {
            self.events.log(EngineEvent::HolderTrimmed {
                round: final_round,
                destination_id: trim.destination_id.clone(),
                candidate_id: trim.candidate_id.clone(),
                priority_score: trim.priority_score,
            });
        }

        let assignments = project(&self.ledger, &self.roster);
        let history = assignment_history(&self.ledger);
        let occupancy = OccupancyReport::build(
            &self.ledger,
            &self.roster,
            self.schedule.rounds(),
            &self.events,
            &reconciliation,
        );
        let ledger_digest = compute_ledger_digest(self.ledger.entries())?;

        let outcome = AllocationOutcome {
            snapshot: self.snapshot(),
            assignments,
            history,
            occupancy,
            events: self.events,
            reconciliation,
            ledger_digest,
        };

        info!(
            assigned = outcome.count_with_status(FinalStatus::Assigned),
            withdrawn = outcome.count_with_status(FinalStatus::Withdrawn),
            unplaced = outcome.count_with_status(FinalStatus::Unplaced),
            disqualified = outcome.count_with_status(FinalStatus::Disqualified),
            trimmed = outcome.reconciliation.trims.len(),
            digest = %outcome.ledger_digest,
            "allocation finished"
        );

        Ok(outcome)
    }
}

// Manual Debug implementation (random source and policy are trait objects)
impl std::fmt::Debug for AllocationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationEngine")
            .field("current_round", &self.current_round())
            .field("num_rounds", &self.schedule.len())
            .field("num_destinations", &self.roster.destinations().len())
            .field("num_candidates", &self.roster.candidates().len())
            .field("num_entries", &self.ledger.entries().len())
            .field("reroute_policy", &self.reroute.name())
            .field("event_count", &self.events.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
