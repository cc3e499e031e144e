//! Run reports
//!
//! Read-only summaries built from a finished run's ledger and event log.

pub mod occupancy;

pub use occupancy::{OccupancyReport, OccupancyRow};
