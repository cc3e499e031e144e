//! Exclude policy
//!
//! Default void handling: a candidate whose destination is void sits the round
//! out. No draw is consumed.

use super::{ReroutePolicy, RerouteOption};
use crate::models::{Candidate, Destination};
use crate::rng::RandomSource;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludePolicy;

impl ReroutePolicy for ExcludePolicy {
    fn select_target(
        &mut self,
        _candidate: &Candidate,
        _void_destination: &Destination,
        _options: &[RerouteOption<'_>],
        _rng: &mut dyn RandomSource,
    ) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "exclude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;

    #[test]
    fn test_never_selects_and_never_draws() {
        let mut rng = SeededRng::new(7);
        let before = rng.state();
        let open = Destination::new("Y", 3);
        let target = ExcludePolicy.select_target(
            &Candidate::new("A", 5.0, "Z"),
            &Destination::new("Z", 0),
            &[RerouteOption {
                destination: &open,
                remaining: 3,
            }],
            &mut rng,
        );
        assert!(target.is_none());
        assert_eq!(rng.state(), before);
    }
}
