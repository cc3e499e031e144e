//! Destination model
//!
//! A capacity-limited seat pool at a partner institution. Capacity is fixed
//! at creation; only consumption against it changes, and that lives in the
//! [`CapacityLedger`](crate::models::ledger::CapacityLedger).

use crate::core::rounds::Round;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Exchange destination offered to candidates.
///
/// # Example
/// ```
/// use mobility_allocation_core::Destination;
/// use chrono::NaiveDate;
///
/// let dest = Destination::new("BOLOGNA", 3)
///     .with_language_requirement()
///     .voided_on(NaiveDate::from_ymd_opt(2023, 6, 12).unwrap());
///
/// assert_eq!(dest.capacity(), 3);
/// assert!(dest.language_required());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    id: String,

    /// Total seats (0 = void/canceled)
    capacity: u32,

    #[serde(default)]
    language_required: bool,

    /// Date on which the destination was canceled
    #[serde(default)]
    void_date: Option<NaiveDate>,

    #[serde(default)]
    name: Option<String>,

    /// Compatibility group, typically the host country. Only consulted by
    /// re-routing policies.
    #[serde(default)]
    group: Option<String>,
}

impl Destination {
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            language_required: false,
            void_date: None,
            name: None,
            group: None,
        }
    }

    pub fn with_language_requirement(mut self) -> Self {
        self.language_required = true;
        self
    }

    pub fn voided_on(mut self, date: NaiveDate) -> Self {
        self.void_date = Some(date);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn language_required(&self) -> bool {
        self.language_required
    }

    pub fn void_date(&self) -> Option<NaiveDate> {
        self.void_date
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Whether the destination is closed for candidates entering `round`.
    ///
    /// Zero capacity is always void. A void date applies when the round opens
    /// on or after it, or when the round carries no date at all.
    pub fn is_void_for(&self, round: &Round) -> bool {
        if self.capacity == 0 {
            return true;
        }
        match (self.void_date, round.opens_on) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(void_date), Some(opens_on)) => void_date <= opens_on,
        }
    }
}
