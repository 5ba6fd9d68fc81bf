//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, UUIDs
//! are hyphenated lowercase strings and closed enums are their lowercase
//! names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use reporta_core::{
  assignment::{AgencyAssignment, AgencyAssignmentEntry, UserAssignment, UserAssignmentEntry},
  directory::{
    Agency, AgencyId, Initiative, InitiativeId, Period, PeriodId, User, UserId,
  },
  program::Program,
  submission::{StoredSubmission, Submission, SubmissionFields, Target},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Parse one of the lowercase enum names stored in `column`.
pub fn decode_enum<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  T::from_str(value).map_err(|_| Error::Decode { column, value: value.to_owned() })
}

// ─── Directory rows ──────────────────────────────────────────────────────────

pub fn agency_from_row(row: &Row<'_>) -> rusqlite::Result<Agency> {
  Ok(Agency { agency_id: AgencyId(row.get(0)?), name: row.get(1)? })
}

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    user_id:   UserId(row.get(0)?),
    agency_id: AgencyId(row.get(1)?),
    username:  row.get(2)?,
    full_name: row.get(3)?,
  })
}

pub fn initiative_from_row(row: &Row<'_>) -> rusqlite::Result<Initiative> {
  Ok(Initiative {
    initiative_id: InitiativeId(row.get(0)?),
    number:        row.get(1)?,
    name:          row.get(2)?,
  })
}

/// Raw strings read directly from a `periods` row.
pub struct RawPeriod {
  pub period_id: i64,
  pub label:     String,
  pub status:    String,
}

impl RawPeriod {
  pub const COLUMNS: &'static str = "period_id, label, status";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { period_id: row.get(0)?, label: row.get(1)?, status: row.get(2)? })
  }

  pub fn into_period(self) -> Result<Period> {
    Ok(Period {
      period_id: PeriodId(self.period_id),
      label:     self.label,
      status:    decode_enum("periods.status", &self.status)?,
    })
  }
}

// ─── Programs ────────────────────────────────────────────────────────────────

/// Raw values read directly from a `programs` row.
pub struct RawProgram {
  pub program_id:       String,
  pub name:             String,
  pub description:      Option<String>,
  pub number:           Option<String>,
  pub owner_agency_id:  i64,
  pub initiative_id:    Option<i64>,
  pub restrict_editors: bool,
  pub start_date:       Option<String>,
  pub end_date:         Option<String>,
  pub created_by:       i64,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawProgram {
  pub const COLUMNS: &'static str = "program_id, name, description, number, owner_agency_id,
     initiative_id, restrict_editors, start_date, end_date, created_by, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      program_id:       row.get(0)?,
      name:             row.get(1)?,
      description:      row.get(2)?,
      number:           row.get(3)?,
      owner_agency_id:  row.get(4)?,
      initiative_id:    row.get(5)?,
      restrict_editors: row.get(6)?,
      start_date:       row.get(7)?,
      end_date:         row.get(8)?,
      created_by:       row.get(9)?,
      created_at:       row.get(10)?,
      updated_at:       row.get(11)?,
    })
  }

  pub fn into_program(self) -> Result<Program> {
    Ok(Program {
      program_id:       decode_uuid(&self.program_id)?,
      name:             self.name,
      description:      self.description,
      number:           self.number,
      owner_agency_id:  AgencyId(self.owner_agency_id),
      initiative_id:    self.initiative_id.map(InitiativeId),
      restrict_editors: self.restrict_editors,
      start_date:       self.start_date.as_deref().map(decode_date).transpose()?,
      end_date:         self.end_date.as_deref().map(decode_date).transpose()?,
      created_by:       UserId(self.created_by),
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Assignments ─────────────────────────────────────────────────────────────

/// Raw values read from an `agency_assignments` row, optionally joined with
/// the agency name.
pub struct RawAgencyAssignment {
  pub program_id:  String,
  pub agency_id:   i64,
  pub role:        String,
  pub state:       String,
  pub assigned_by: i64,
  pub notes:       Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawAgencyAssignment {
  pub const COLUMNS: &'static str =
    "a.program_id, a.agency_id, a.role, a.state, a.assigned_by, a.notes, a.created_at, a.updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      program_id:  row.get(0)?,
      agency_id:   row.get(1)?,
      role:        row.get(2)?,
      state:       row.get(3)?,
      assigned_by: row.get(4)?,
      notes:       row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_assignment(self) -> Result<AgencyAssignment> {
    Ok(AgencyAssignment {
      program_id:  decode_uuid(&self.program_id)?,
      agency_id:   AgencyId(self.agency_id),
      role:        decode_enum("agency_assignments.role", &self.role)?,
      state:       decode_enum("agency_assignments.state", &self.state)?,
      assigned_by: UserId(self.assigned_by),
      notes:       self.notes,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Agency assignment joined with the agency name (column 8).
pub struct RawAgencyEntry {
  pub assignment:  RawAgencyAssignment,
  pub agency_name: String,
}

impl RawAgencyEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { assignment: RawAgencyAssignment::from_row(row)?, agency_name: row.get(8)? })
  }

  pub fn into_entry(self) -> Result<AgencyAssignmentEntry> {
    Ok(AgencyAssignmentEntry {
      agency_name: self.agency_name,
      assignment:  self.assignment.into_assignment()?,
    })
  }
}

pub struct RawUserAssignment {
  pub program_id:  String,
  pub user_id:     i64,
  pub role:        String,
  pub state:       String,
  pub assigned_by: i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawUserAssignment {
  pub const COLUMNS: &'static str =
    "u.program_id, u.user_id, u.role, u.state, u.assigned_by, u.created_at, u.updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      program_id:  row.get(0)?,
      user_id:     row.get(1)?,
      role:        row.get(2)?,
      state:       row.get(3)?,
      assigned_by: row.get(4)?,
      created_at:  row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn into_assignment(self) -> Result<UserAssignment> {
    Ok(UserAssignment {
      program_id:  decode_uuid(&self.program_id)?,
      user_id:     UserId(self.user_id),
      role:        decode_enum("user_assignments.role", &self.role)?,
      state:       decode_enum("user_assignments.state", &self.state)?,
      assigned_by: UserId(self.assigned_by),
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// User assignment joined with the user's display name (7) and agency (8).
pub struct RawUserEntry {
  pub assignment: RawUserAssignment,
  pub user_name:  String,
  pub agency_id:  i64,
}

impl RawUserEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment: RawUserAssignment::from_row(row)?,
      user_name:  row.get(7)?,
      agency_id:  row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<UserAssignmentEntry> {
    Ok(UserAssignmentEntry {
      user_name:  self.user_name,
      agency_id:  AgencyId(self.agency_id),
      assignment: self.assignment.into_assignment()?,
    })
  }
}

// ─── Submissions ─────────────────────────────────────────────────────────────

pub struct RawSubmission {
  pub submission_id: String,
  pub program_id:    String,
  pub period_id:     i64,
  pub state:         String,
  pub description:   Option<String>,
  pub rating:        Option<String>,
  pub remarks:       Option<String>,
  pub content_json:  Option<String>,
  pub created_by:    i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawSubmission {
  pub const COLUMNS: &'static str = "submission_id, program_id, period_id, state, description,
     rating, remarks, content_json, created_by, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id: row.get(0)?,
      program_id:    row.get(1)?,
      period_id:     row.get(2)?,
      state:         row.get(3)?,
      description:   row.get(4)?,
      rating:        row.get(5)?,
      remarks:       row.get(6)?,
      content_json:  row.get(7)?,
      created_by:    row.get(8)?,
      created_at:    row.get(9)?,
      updated_at:    row.get(10)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      submission_id: decode_uuid(&self.submission_id)?,
      program_id:    decode_uuid(&self.program_id)?,
      period_id:     PeriodId(self.period_id),
      state:         decode_enum("submissions.state", &self.state)?,
      fields:        SubmissionFields {
        description: self.description,
        rating:      self.rating,
        remarks:     self.remarks,
      },
      content_json:  self.content_json,
      created_by:    UserId(self.created_by),
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawTarget {
  pub target_id:     String,
  pub submission_id: String,
  pub position:      i64,
  pub target_number: Option<String>,
  pub text:          String,
  pub status:        Option<String>,
}

impl RawTarget {
  pub const COLUMNS: &'static str = "target_id, submission_id, position, target_number, text, status";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      target_id:     row.get(0)?,
      submission_id: row.get(1)?,
      position:      row.get(2)?,
      target_number: row.get(3)?,
      text:          row.get(4)?,
      status:        row.get(5)?,
    })
  }

  pub fn into_target(self) -> Result<Target> {
    Ok(Target {
      target_id:     decode_uuid(&self.target_id)?,
      submission_id: decode_uuid(&self.submission_id)?,
      position:      u32::try_from(self.position).map_err(|_| Error::Decode {
        column: "targets.position",
        value:  self.position.to_string(),
      })?,
      target_number: self.target_number,
      text:          self.text,
      status:        self.status,
    })
  }
}

/// A submission row with its target rows.
pub struct RawStoredSubmission {
  pub submission: RawSubmission,
  pub targets:    Vec<RawTarget>,
}

impl RawStoredSubmission {
  pub fn into_stored(self) -> Result<StoredSubmission> {
    Ok(StoredSubmission {
      submission: self.submission.into_submission()?,
      targets:    self
        .targets
        .into_iter()
        .map(RawTarget::into_target)
        .collect::<Result<_>>()?,
    })
  }
}
