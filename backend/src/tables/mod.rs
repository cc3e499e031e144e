//! CSV tables
//!
//! Input tables (destinations, candidates, withdrawal probabilities) and the
//! run's output tables. Readers trim every field, treat empty cells as
//! missing, and accept the usual spellings for boolean flags.

use crate::allocation::{AssignmentRecord, FinalAssignment, WithdrawalRule, WithdrawalTable};
use crate::core::rounds::Round;
use crate::models::{Candidate, Destination, EntryOrigin, LedgerEntry, Role};
use crate::report::OccupancyRow;
use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{table} row {row}: {message}")]
    InvalidValue {
        table: &'static str,
        row: usize,
        message: String,
    },
}

// ============================================================================
// Readers
// ============================================================================

#[derive(Debug, Deserialize)]
struct DestinationRow {
    id: String,
    capacity: u32,
    #[serde(default, deserialize_with = "lenient_flag")]
    language_required: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    void_date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    id: String,
    priority_score: f64,
    destination_id: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    language_credential: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    disqualified: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    outcome_class: Option<String>,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Columns: `id, capacity, language_required, void_date, name, group`.
pub fn read_destinations<R: Read>(reader: R) -> Result<Vec<Destination>, TableError> {
    let mut destinations = Vec::new();

    for (index, record) in csv_reader(reader).deserialize::<DestinationRow>().enumerate() {
        let row = record?;
        let mut destination = Destination::new(row.id, row.capacity);
        if row.language_required {
            destination = destination.with_language_requirement();
        }
        if let Some(raw) = row.void_date {
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                TableError::InvalidValue {
                    table: "destinations",
                    row: index + 1,
                    message: format!("void_date {:?}: {}", raw, e),
                }
            })?;
            destination = destination.voided_on(date);
        }
        if let Some(name) = row.name {
            destination = destination.with_name(name);
        }
        if let Some(group) = row.group {
            destination = destination.in_group(group);
        }
        destinations.push(destination);
    }

    Ok(destinations)
}

/// Columns: `id, priority_score, destination_id, language_credential,
/// disqualified, outcome_class`.
pub fn read_candidates<R: Read>(reader: R) -> Result<Vec<Candidate>, TableError> {
    let mut candidates = Vec::new();

    for record in csv_reader(reader).deserialize::<CandidateRow>() {
        let row = record?;
        let mut candidate = Candidate::new(row.id, row.priority_score, row.destination_id);
        if row.language_credential {
            candidate = candidate.with_language_credential();
        }
        if row.disqualified {
            candidate = candidate.disqualify();
        }
        if let Some(class) = row.outcome_class {
            candidate = candidate.with_outcome_class(class);
        }
        candidates.push(candidate);
    }

    Ok(candidates)
}

/// Columns: `round, outcome_class, probability`. Rows are appended to a table
/// with the given fallback probability.
pub fn read_withdrawal_table<R: Read>(
    reader: R,
    default_probability: f64,
) -> Result<WithdrawalTable, TableError> {
    let mut table = WithdrawalTable::new(default_probability);
    for (index, record) in csv_reader(reader).deserialize::<WithdrawalRule>().enumerate() {
        let rule = record?;
        if !(0.0..=1.0).contains(&rule.probability) {
            return Err(TableError::InvalidValue {
                table: "withdrawals",
                row: index + 1,
                message: format!("probability {} outside [0, 1]", rule.probability),
            });
        }
        table.rules.push(rule);
    }
    Ok(table)
}

pub fn read_destinations_path(path: impl AsRef<Path>) -> Result<Vec<Destination>, TableError> {
    read_destinations(File::open(path)?)
}

pub fn read_candidates_path(path: impl AsRef<Path>) -> Result<Vec<Candidate>, TableError> {
    read_candidates(File::open(path)?)
}

pub fn read_withdrawal_table_path(
    path: impl AsRef<Path>,
    default_probability: f64,
) -> Result<WithdrawalTable, TableError> {
    read_withdrawal_table(File::open(path)?, default_probability)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = empty_string_as_none(deserializer)? else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "si" | "sí" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(D::Error::custom(format!("unrecognised flag {:?}", other))),
    }
}

// ============================================================================
// Writers
// ============================================================================

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    seq: u64,
    destination_id: &'a str,
    round: usize,
    round_label: &'a str,
    candidate_id: &'a str,
    role: Role,
    origin: EntryOrigin,
    withdrawn_in: Option<usize>,
}

fn write_rows<W: Write, T: Serialize>(
    writer: W,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), TableError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Ledger entries with round labels resolved against `rounds`.
pub fn write_ledger<W: Write>(
    writer: W,
    entries: &[LedgerEntry],
    rounds: &[Round],
) -> Result<(), TableError> {
    write_rows(
        writer,
        entries.iter().map(|e| LedgerRow {
            seq: e.seq,
            destination_id: &e.destination_id,
            round: e.round,
            round_label: rounds.get(e.round).map_or("", |r| r.label.as_str()),
            candidate_id: &e.candidate_id,
            role: e.role,
            origin: e.origin,
            withdrawn_in: e.withdrawn_in,
        }),
    )
}

pub fn write_assignments<W: Write>(
    writer: W,
    assignments: &[FinalAssignment],
) -> Result<(), TableError> {
    write_rows(writer, assignments)
}

pub fn write_occupancy<W: Write>(writer: W, rows: &[OccupancyRow]) -> Result<(), TableError> {
    write_rows(writer, rows)
}

pub fn write_history<W: Write>(writer: W, history: &[AssignmentRecord]) -> Result<(), TableError> {
    write_rows(writer, history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_destinations_with_optional_columns() {
        let data = "\
id,capacity,language_required,void_date,name,group
X, 2 ,no,,Lisboa,PT
Z,3,sí,2024-01-15,,
";
        let destinations = read_destinations(data.as_bytes()).unwrap();
        assert_eq!(destinations.len(), 2);
        assert_eq!(destinations[0].capacity(), 2);
        assert!(!destinations[0].language_required());
        assert_eq!(destinations[0].name(), Some("Lisboa"));
        assert_eq!(destinations[0].group(), Some("PT"));
        assert!(destinations[1].language_required());
        assert_eq!(
            destinations[1].void_date(),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(destinations[1].group(), None);
    }

    #[test]
    fn test_bad_void_date_reports_row() {
        let data = "id,capacity,void_date\nX,1,15/01/2024\n";
        let err = read_destinations(data.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::InvalidValue { row: 1, .. }));
    }

    #[test]
    fn test_read_candidates_defaults() {
        let data = "\
id,priority_score,destination_id,language_credential,disqualified,outcome_class
A,9.5,X,1,0,renounce
B,7.25,X,,,
";
        let candidates = read_candidates(data.as_bytes()).unwrap();
        assert!(candidates[0].language_credential());
        assert_eq!(candidates[0].outcome_class(), "renounce");
        assert!(!candidates[1].disqualified());
        assert_eq!(candidates[1].outcome_class(), "default");
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let data = "id,priority_score,destination_id,disqualified\nA,1.0,X,maybe\n";
        assert!(matches!(
            read_candidates(data.as_bytes()),
            Err(TableError::Csv(_))
        ));
    }

    #[test]
    fn test_withdrawal_table_rejects_bad_probability() {
        let ok = "round,outcome_class,probability\nR1,renounce,0.6\n";
        let table = read_withdrawal_table(ok.as_bytes(), 0.1).unwrap();
        assert_eq!(table.probability("R1", "renounce"), 0.6);
        assert_eq!(table.probability("R2", "renounce"), 0.1);

        let bad = "round,outcome_class,probability\nR1,renounce,1.6\n";
        assert!(read_withdrawal_table(bad.as_bytes(), 0.1).is_err());
    }

    #[test]
    fn test_write_ledger_resolves_labels() {
        let entries = vec![LedgerEntry {
            seq: 0,
            destination_id: "X".to_string(),
            round: 1,
            candidate_id: "A".to_string(),
            role: Role::Holder,
            origin: EntryOrigin::Promoted,
            withdrawn_in: None,
        }];
        let mut out = Vec::new();
        write_ledger(&mut out, &entries, &crate::core::rounds::standard_rounds()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("seq,destination_id,round,round_label,candidate_id,role,origin,withdrawn_in")
        );
        assert_eq!(lines.next(), Some("0,X,1,R2,A,Holder,Promoted,"));
    }
}
