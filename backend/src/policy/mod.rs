//! Void Re-routing Policy Module
//!
//! Defines the decision interface for candidates whose requested destination
//! is void in the current round.
//!
//! # Overview
//!
//! After a round's regular allocation, every void-conflicted candidate is
//! offered to the configured policy together with the destinations that still
//! have free seats. The policy either names a target (the engine then seats
//! the candidate there with origin `Rerouted`) or declines, in which case the
//! candidate is simply excluded for the round.
//!
//! Compatibility between destinations is decided by the policy alone. The
//! engine never looks at destination groups.
//!
//! # Policy Interface
//!
//! ```rust
//! use mobility_allocation_core::policy::{ReroutePolicy, RerouteOption};
//! use mobility_allocation_core::rng::RandomSource;
//! use mobility_allocation_core::{Candidate, Destination};
//!
//! /// Always takes the option with the most free seats.
//! struct MostRoom;
//!
//! impl ReroutePolicy for MostRoom {
//!     fn select_target(
//!         &mut self,
//!         _candidate: &Candidate,
//!         _void_destination: &Destination,
//!         options: &[RerouteOption<'_>],
//!         _rng: &mut dyn RandomSource,
//!     ) -> Option<String> {
//!         options
//!             .iter()
//!             .max_by_key(|o| o.remaining)
//!             .map(|o| o.destination.id().to_string())
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "most_room"
//!     }
//! }
//! ```
//!
//! Built-in policies are selected through [`VoidPolicyConfig`]:
//! 1. **Exclude**: never re-route (default)
//! 2. **Reroute**: with a fixed probability, move to a random compatible
//!    destination with free seats

use crate::models::{Candidate, Destination};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};

pub mod compatible;
pub mod exclude;

pub use compatible::CompatibleReroutePolicy;
pub use exclude::ExcludePolicy;

/// A destination with free seats in the current round.
#[derive(Debug, Clone, Copy)]
pub struct RerouteOption<'a> {
    pub destination: &'a Destination,
    pub remaining: u32,
}

/// Decides where, if anywhere, a void-conflicted candidate goes.
pub trait ReroutePolicy {
    /// Pick a target among `options`, or `None` to exclude the candidate.
    ///
    /// `options` never contains the void destination and every option has at
    /// least one free seat. Any randomness must come from `rng`.
    fn select_target(
        &mut self,
        candidate: &Candidate,
        void_destination: &Destination,
        options: &[RerouteOption<'_>],
        rng: &mut dyn RandomSource,
    ) -> Option<String>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

/// Which destinations count as compatible re-route targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityRule {
    /// Same `group` as the void destination; ungrouped destinations match nothing
    #[default]
    SameGroup,
    /// Any destination with free seats
    AnyOpen,
}

/// Void-conflict handling, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoidPolicyConfig {
    #[default]
    Exclude,
    Reroute {
        /// Chance a conflicted candidate is re-routed at all, drawn once per run
        probability: f64,
        #[serde(default)]
        compatibility: CompatibilityRule,
    },
}

impl VoidPolicyConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            VoidPolicyConfig::Exclude => Ok(()),
            VoidPolicyConfig::Reroute { probability, .. } => {
                if (0.0..=1.0).contains(probability) {
                    Ok(())
                } else {
                    Err(format!(
                        "re-route probability {} outside [0, 1]",
                        probability
                    ))
                }
            }
        }
    }
}

/// Build the policy named by `config`.
pub fn build_reroute_policy(config: &VoidPolicyConfig) -> Box<dyn ReroutePolicy> {
    match *config {
        VoidPolicyConfig::Exclude => Box::new(ExcludePolicy),
        VoidPolicyConfig::Reroute {
            probability,
            compatibility,
        } => Box::new(CompatibleReroutePolicy::new(probability, compatibility)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_exclude() {
        assert_eq!(VoidPolicyConfig::default(), VoidPolicyConfig::Exclude);
        assert_eq!(build_reroute_policy(&VoidPolicyConfig::default()).name(), "exclude");
    }

    #[test]
    fn test_reroute_config_from_json() {
        let config: VoidPolicyConfig =
            serde_json::from_str(r#"{"type": "reroute", "probability": 0.25}"#).unwrap();
        assert_eq!(
            config,
            VoidPolicyConfig::Reroute {
                probability: 0.25,
                compatibility: CompatibilityRule::SameGroup,
            }
        );
        assert_eq!(build_reroute_policy(&config).name(), "compatible_reroute");
    }

    #[test]
    fn test_probability_out_of_range_rejected() {
        let config = VoidPolicyConfig::Reroute {
            probability: 1.5,
            compatibility: CompatibilityRule::AnyOpen,
        };
        assert!(config.validate().is_err());
    }
}
