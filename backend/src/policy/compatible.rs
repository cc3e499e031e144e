//! Compatible re-route policy
//!
//! With probability `p`, moves a void-conflicted candidate to a uniformly
//! chosen compatible destination that still has seats.
//!
//! # Behavior
//!
//! - Options are narrowed by the [`CompatibilityRule`] and by language gating
//! - No compatible option: excluded, no draw consumed
//! - Otherwise one Bernoulli draw decides whether to re-route, and one more
//!   picks the target

use super::{CompatibilityRule, ReroutePolicy, RerouteOption};
use crate::models::{Candidate, Destination};
use crate::rng::RandomSource;

#[derive(Debug, Clone)]
pub struct CompatibleReroutePolicy {
    probability: f64,
    compatibility: CompatibilityRule,
}

impl CompatibleReroutePolicy {
    pub fn new(probability: f64, compatibility: CompatibilityRule) -> Self {
        Self {
            probability,
            compatibility,
        }
    }

    fn compatible(
        &self,
        candidate: &Candidate,
        void_destination: &Destination,
        target: &Destination,
    ) -> bool {
        if target.language_required() && !candidate.language_credential() {
            return false;
        }
        match self.compatibility {
            CompatibilityRule::AnyOpen => true,
            CompatibilityRule::SameGroup => matches!(
                (void_destination.group(), target.group()),
                (Some(a), Some(b)) if a == b
            ),
        }
    }
}

impl ReroutePolicy for CompatibleReroutePolicy {
    fn select_target(
        &mut self,
        candidate: &Candidate,
        void_destination: &Destination,
        options: &[RerouteOption<'_>],
        rng: &mut dyn RandomSource,
    ) -> Option<String> {
        let eligible: Vec<&RerouteOption<'_>> = options
            .iter()
            .filter(|o| o.remaining > 0)
            .filter(|o| self.compatible(candidate, void_destination, o.destination))
            .collect();

        if eligible.is_empty() || !rng.chance(self.probability) {
            return None;
        }

        rng.index(eligible.len())
            .map(|i| eligible[i].destination.id().to_string())
    }

    fn name(&self) -> &'static str {
        "compatible_reroute"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;

    fn options(dests: &[Destination]) -> Vec<RerouteOption<'_>> {
        dests
            .iter()
            .map(|d| RerouteOption {
                destination: d,
                remaining: d.capacity(),
            })
            .collect()
    }

    #[test]
    fn test_same_group_only() {
        let void = Destination::new("Z", 0).in_group("IT");
        let dests = vec![
            Destination::new("Y", 2).in_group("FR"),
            Destination::new("W", 2).in_group("IT"),
            Destination::new("V", 2),
        ];
        let mut policy = CompatibleReroutePolicy::new(1.0, CompatibilityRule::SameGroup);
        let mut rng = SeededRng::new(1);

        for _ in 0..20 {
            let target = policy.select_target(
                &Candidate::new("A", 5.0, "Z"),
                &void,
                &options(&dests),
                &mut rng,
            );
            assert_eq!(target.as_deref(), Some("W"));
        }
    }

    #[test]
    fn test_language_gate_applies_to_target() {
        let void = Destination::new("Z", 0);
        let dests = vec![Destination::new("L", 1).with_language_requirement()];
        let mut policy = CompatibleReroutePolicy::new(1.0, CompatibilityRule::AnyOpen);
        let mut rng = SeededRng::new(1);

        let without =
            policy.select_target(&Candidate::new("A", 5.0, "Z"), &void, &options(&dests), &mut rng);
        assert!(without.is_none());

        let with = policy.select_target(
            &Candidate::new("B", 5.0, "Z").with_language_credential(),
            &void,
            &options(&dests),
            &mut rng,
        );
        assert_eq!(with.as_deref(), Some("L"));
    }

    #[test]
    fn test_zero_probability_never_reroutes() {
        let void = Destination::new("Z", 0);
        let dests = vec![Destination::new("Y", 5)];
        let mut policy = CompatibleReroutePolicy::new(0.0, CompatibilityRule::AnyOpen);
        let mut rng = SeededRng::new(3);
        let before = rng.state();

        let target =
            policy.select_target(&Candidate::new("A", 5.0, "Z"), &void, &options(&dests), &mut rng);
        assert!(target.is_none());
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn test_no_options_consumes_no_draw() {
        let mut policy = CompatibleReroutePolicy::new(0.5, CompatibilityRule::AnyOpen);
        let mut rng = SeededRng::new(3);
        let before = rng.state();
        let target = policy.select_target(
            &Candidate::new("A", 5.0, "Z"),
            &Destination::new("Z", 0),
            &[],
            &mut rng,
        );
        assert!(target.is_none());
        assert_eq!(rng.state(), before);
    }
}
