//! Domain models for the allocation engine

pub mod candidate;
pub mod destination;
pub mod event;
pub mod ledger;
pub mod roster;

// Re-exports
pub use candidate::{rank_order, Candidate};
pub use destination::Destination;
pub use event::{EngineEvent, EventLog, VoidResolution};
pub use ledger::{CapacityLedger, EntryOrigin, LedgerEntry, LedgerError, Role};
pub use roster::{Roster, RosterError};
