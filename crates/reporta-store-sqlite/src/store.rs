//! [`SqliteStore`], the SQLite implementation of [`ReportStore`].

use std::path::Path;

use chrono::Utc;
use reporta_core::{
  actor::Actor,
  assignment::{
    AgencyAssignment, AgencyAssignmentEntry, AgencyRole, AgencyWrite, AssignmentState,
    UserAssignment,
    UserAssignmentEntry, sort_agency_entries, sort_user_entries,
  },
  directory::{
    Agency, AgencyId, Initiative, InitiativeId, OutcomeId, Period, PeriodId, User, UserId,
  },
  program::{NewProgram, Program},
  store::{AgencyGrant, ReportStore, UserGrant},
  submission::{
    NewSubmission, NewTarget, StoredSubmission, Submission, SubmissionInsert,
    SubmissionRewrite, SubmissionState, SubmissionWrite, Target,
  },
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawAgencyAssignment, RawAgencyEntry, RawPeriod, RawProgram, RawStoredSubmission,
    RawSubmission, RawTarget, RawUserAssignment, RawUserEntry, agency_from_row, encode_date,
    encode_dt, encode_uuid, initiative_from_row, user_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Reporta store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Write a pre-generation submission whose targets live only in a
  /// `content_json` blob. Used to carry data over from older deployments.
  pub async fn import_legacy_submission(
    &self,
    program_id: Uuid,
    period_id: PeriodId,
    content_json: String,
    created_by: UserId,
  ) -> Result<Submission> {
    let now = Utc::now();
    let submission = Submission {
      submission_id: Uuid::new_v4(),
      program_id,
      period_id,
      state: SubmissionState::Finalized,
      fields: Default::default(),
      content_json: Some(content_json),
      created_by,
      created_at: now,
      updated_at: now,
    };
    let row = SubmissionRow::from(&submission);

    self
      .conn
      .call(move |conn| {
        insert_submission_row(conn, &row)?;
        Ok(())
      })
      .await?;
    Ok(submission)
  }
}

// ─── Write parameter bundles ─────────────────────────────────────────────────

/// Column values for one `submissions` insert, owned so they can move onto
/// the connection thread.
struct SubmissionRow {
  submission_id: String,
  program_id:    String,
  period_id:     i64,
  state:         String,
  description:   Option<String>,
  rating:        Option<String>,
  remarks:       Option<String>,
  content_json:  Option<String>,
  created_by:    i64,
  created_at:    String,
  updated_at:    String,
}

impl From<&Submission> for SubmissionRow {
  fn from(s: &Submission) -> Self {
    Self {
      submission_id: encode_uuid(s.submission_id),
      program_id:    encode_uuid(s.program_id),
      period_id:     s.period_id.0,
      state:         s.state.to_string(),
      description:   s.fields.description.clone(),
      rating:        s.fields.rating.clone(),
      remarks:       s.fields.remarks.clone(),
      content_json:  s.content_json.clone(),
      created_by:    s.created_by.0,
      created_at:    encode_dt(s.created_at),
      updated_at:    encode_dt(s.updated_at),
    }
  }
}

struct TargetRow {
  target_id:     String,
  submission_id: String,
  position:      i64,
  target_number: Option<String>,
  text:          String,
  status:        Option<String>,
}

impl From<&Target> for TargetRow {
  fn from(t: &Target) -> Self {
    Self {
      target_id:     encode_uuid(t.target_id),
      submission_id: encode_uuid(t.submission_id),
      position:      i64::from(t.position),
      target_number: t.target_number.clone(),
      text:          t.text.clone(),
      status:        t.status.clone(),
    }
  }
}

fn build_targets(submission_id: Uuid, input: Vec<NewTarget>) -> Vec<Target> {
  input
    .into_iter()
    .zip(0u32..)
    .map(|(t, position)| Target {
      target_id: Uuid::new_v4(),
      submission_id,
      position,
      target_number: t.target_number,
      text: t.text,
      status: t.status,
    })
    .collect()
}

fn build_submission(
  program_id: Uuid,
  input: NewSubmission,
  created_by: UserId,
) -> StoredSubmission {
  let now = Utc::now();
  let submission_id = Uuid::new_v4();
  StoredSubmission {
    submission: Submission {
      submission_id,
      program_id,
      period_id: input.period_id,
      state: SubmissionState::Draft,
      fields: input.fields,
      content_json: None,
      created_by,
      created_at: now,
      updated_at: now,
    },
    targets:    build_targets(submission_id, input.targets),
  }
}

/// Owner-guarded write result before decoding.
enum RawAgencyWrite {
  Applied(RawAgencyAssignment),
  Unchanged(RawAgencyAssignment),
  Missing,
  LastOwner,
}

impl RawAgencyWrite {
  fn decode(self) -> Result<AgencyWrite> {
    Ok(match self {
      Self::Applied(raw) => AgencyWrite::Applied(raw.into_assignment()?),
      Self::Unchanged(raw) => AgencyWrite::Unchanged(raw.into_assignment()?),
      Self::Missing => AgencyWrite::Missing,
      Self::LastOwner => AgencyWrite::LastOwner,
    })
  }
}

enum RawSubmissionWrite {
  Rewritten(RawStoredSubmission),
  Finalized,
  Missing,
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn insert_submission_row(conn: &Connection, row: &SubmissionRow) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO submissions (
       submission_id, program_id, period_id, state, description, rating, remarks,
       content_json, created_by, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    rusqlite::params![
      row.submission_id,
      row.program_id,
      row.period_id,
      row.state,
      row.description,
      row.rating,
      row.remarks,
      row.content_json,
      row.created_by,
      row.created_at,
      row.updated_at,
    ],
  )?;
  Ok(())
}

fn insert_target_rows(conn: &Connection, rows: &[TargetRow]) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO targets (target_id, submission_id, position, target_number, text, status)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
  )?;
  for row in rows {
    stmt.execute(rusqlite::params![
      row.target_id,
      row.submission_id,
      row.position,
      row.target_number,
      row.text,
      row.status,
    ])?;
  }
  Ok(())
}

fn live_submission_exists(
  conn: &Connection,
  program_id: &str,
  period_id: i64,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM submissions
         WHERE program_id = ?1 AND period_id = ?2 AND is_deleted = 0",
        rusqlite::params![program_id, period_id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn submission_is_live(conn: &Connection, submission_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM submissions WHERE submission_id = ?1 AND is_deleted = 0",
        rusqlite::params![submission_id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Read the first non-deleted submission matching `filter` together with
/// its targets.
fn query_stored_submission(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Option<RawStoredSubmission>> {
  let sql = format!(
    "SELECT {} FROM submissions WHERE is_deleted = 0 AND {filter} LIMIT 1",
    RawSubmission::COLUMNS
  );
  let Some(submission) = conn.query_row(&sql, params, RawSubmission::from_row).optional()?
  else {
    return Ok(None);
  };

  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM targets WHERE submission_id = ?1 ORDER BY position",
    RawTarget::COLUMNS
  ))?;
  let targets = stmt
    .query_map(rusqlite::params![submission.submission_id], RawTarget::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(Some(RawStoredSubmission { submission, targets }))
}

fn query_agency_assignment(
  conn: &Connection,
  program_id: &str,
  agency_id: i64,
) -> rusqlite::Result<Option<RawAgencyAssignment>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM agency_assignments a WHERE a.program_id = ?1 AND a.agency_id = ?2",
        RawAgencyAssignment::COLUMNS
      ),
      rusqlite::params![program_id, agency_id],
      RawAgencyAssignment::from_row,
    )
    .optional()
}

fn query_user_assignment(
  conn: &Connection,
  program_id: &str,
  user_id: i64,
) -> rusqlite::Result<Option<RawUserAssignment>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM user_assignments u WHERE u.program_id = ?1 AND u.user_id = ?2",
        RawUserAssignment::COLUMNS
      ),
      rusqlite::params![program_id, user_id],
      RawUserAssignment::from_row,
    )
    .optional()
}

fn count_active_owners(conn: &Connection, program_id: &str) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM agency_assignments
     WHERE program_id = ?1 AND state = 'active' AND role = 'owner'",
    rusqlite::params![program_id],
    |r| r.get(0),
  )
}

// ─── ReportStore impl ────────────────────────────────────────────────────────

impl ReportStore for SqliteStore {
  type Error = Error;

  // ── Reference directory ───────────────────────────────────────────────────

  async fn put_agency(&self, agency: Agency) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO agencies (agency_id, name) VALUES (?1, ?2)
           ON CONFLICT(agency_id) DO UPDATE SET name = excluded.name",
          rusqlite::params![agency.agency_id.0, agency.name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_agency(&self, id: AgencyId) -> Result<Option<Agency>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT agency_id, name FROM agencies WHERE agency_id = ?1",
                rusqlite::params![id.0],
                agency_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn put_user(&self, user: User) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, agency_id, username, full_name) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(user_id) DO UPDATE SET
             agency_id = excluded.agency_id,
             username  = excluded.username,
             full_name = excluded.full_name",
          rusqlite::params![user.user_id.0, user.agency_id.0, user.username, user.full_name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT user_id, agency_id, username, full_name FROM users WHERE user_id = ?1",
                rusqlite::params![id.0],
                user_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn put_period(&self, period: Period) -> Result<()> {
    let status = period.status.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO periods (period_id, label, status) VALUES (?1, ?2, ?3)
           ON CONFLICT(period_id) DO UPDATE SET label = excluded.label, status = excluded.status",
          rusqlite::params![period.period_id.0, period.label, status],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_period(&self, id: PeriodId) -> Result<Option<Period>> {
    let raw: Option<RawPeriod> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM periods WHERE period_id = ?1", RawPeriod::COLUMNS),
              rusqlite::params![id.0],
              RawPeriod::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPeriod::into_period).transpose()
  }

  async fn open_period(&self) -> Result<Option<Period>> {
    let raw: Option<RawPeriod> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM periods WHERE status = 'open' ORDER BY period_id LIMIT 1",
                RawPeriod::COLUMNS
              ),
              [],
              RawPeriod::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPeriod::into_period).transpose()
  }

  async fn put_initiative(&self, initiative: Initiative) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO initiatives (initiative_id, number, name) VALUES (?1, ?2, ?3)
           ON CONFLICT(initiative_id) DO UPDATE SET number = excluded.number, name = excluded.name",
          rusqlite::params![initiative.initiative_id.0, initiative.number, initiative.name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_initiative(&self, id: InitiativeId) -> Result<Option<Initiative>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT initiative_id, number, name FROM initiatives WHERE initiative_id = ?1",
                rusqlite::params![id.0],
                initiative_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  // ── Programs ──────────────────────────────────────────────────────────────

  async fn create_program(
    &self,
    input: NewProgram,
    creator: Actor,
  ) -> Result<(Program, Option<StoredSubmission>)> {
    let now = Utc::now();
    let program = Program {
      program_id:       Uuid::new_v4(),
      name:             input.name,
      description:      input.description,
      number:           input.number,
      owner_agency_id:  creator.agency_id,
      initiative_id:    input.initiative_id,
      restrict_editors: input.restrict_editors,
      start_date:       input.start_date,
      end_date:         input.end_date,
      created_by:       creator.user_id,
      created_at:       now,
      updated_at:       now,
    };
    let initial = input
      .initial_submission
      .map(|s| build_submission(program.program_id, s, creator.user_id));

    let id_str     = encode_uuid(program.program_id);
    let name       = program.name.clone();
    let desc       = program.description.clone();
    let number     = program.number.clone();
    let agency     = program.owner_agency_id.0;
    let initiative = program.initiative_id.map(|i| i.0);
    let restrict   = program.restrict_editors;
    let start      = program.start_date.map(encode_date);
    let end        = program.end_date.map(encode_date);
    let user       = creator.user_id.0;
    let at_str     = encode_dt(now);
    let sub_rows   = initial.as_ref().map(|s| {
      (
        SubmissionRow::from(&s.submission),
        s.targets.iter().map(TargetRow::from).collect::<Vec<_>>(),
      )
    });

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "INSERT INTO programs (
             program_id, name, description, number, owner_agency_id, initiative_id,
             restrict_editors, start_date, end_date, created_by, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
          rusqlite::params![
            id_str, name, desc, number, agency, initiative, restrict, start, end, user, at_str,
          ],
        )?;
        tx.execute(
          "INSERT INTO agency_assignments (
             program_id, agency_id, role, state, assigned_by, notes, created_at, updated_at
           ) VALUES (?1, ?2, 'owner', 'active', ?3, NULL, ?4, ?4)",
          rusqlite::params![id_str, agency, user, at_str],
        )?;
        if let Some((sub, targets)) = &sub_rows {
          insert_submission_row(&tx, sub)?;
          insert_target_rows(&tx, targets)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(program = %program.program_id, agency = %program.owner_agency_id, "program created");
    Ok((program, initial))
  }

  async fn get_program(&self, id: Uuid) -> Result<Option<Program>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawProgram> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM programs WHERE program_id = ?1 AND is_deleted = 0",
                RawProgram::COLUMNS
              ),
              rusqlite::params![id_str],
              RawProgram::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawProgram::into_program).transpose()
  }

  async fn update_program(&self, mut program: Program) -> Result<Program> {
    program.updated_at = Utc::now();

    let id_str     = encode_uuid(program.program_id);
    let name       = program.name.clone();
    let desc       = program.description.clone();
    let number     = program.number.clone();
    let initiative = program.initiative_id.map(|i| i.0);
    let restrict   = program.restrict_editors;
    let start      = program.start_date.map(encode_date);
    let end        = program.end_date.map(encode_date);
    let at_str     = encode_dt(program.updated_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE programs SET
             name = ?2, description = ?3, number = ?4, initiative_id = ?5,
             restrict_editors = ?6, start_date = ?7, end_date = ?8, updated_at = ?9
           WHERE program_id = ?1 AND is_deleted = 0",
          rusqlite::params![id_str, name, desc, number, initiative, restrict, start, end, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ProgramNotFound(program.program_id));
    }
    Ok(program)
  }

  async fn delete_program(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE programs SET is_deleted = 1, updated_at = ?2
           WHERE program_id = ?1 AND is_deleted = 0",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn program_outcomes(&self, id: Uuid) -> Result<Vec<OutcomeId>> {
    let id_str = encode_uuid(id);
    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT outcome_id FROM program_outcomes WHERE program_id = ?1 ORDER BY outcome_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids.into_iter().map(OutcomeId).collect())
  }

  async fn set_program_outcomes(&self, id: Uuid, outcomes: Vec<OutcomeId>) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "DELETE FROM program_outcomes WHERE program_id = ?1",
          rusqlite::params![id_str],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO program_outcomes (program_id, outcome_id) VALUES (?1, ?2)",
          )?;
          for outcome in &outcomes {
            stmt.execute(rusqlite::params![id_str, outcome.0])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Agency assignments ────────────────────────────────────────────────────

  async fn agency_assignment(
    &self,
    program_id: Uuid,
    agency_id: AgencyId,
  ) -> Result<Option<AgencyAssignment>> {
    let id_str = encode_uuid(program_id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_agency_assignment(conn, &id_str, agency_id.0)?))
      .await?;
    raw.map(RawAgencyAssignment::into_assignment).transpose()
  }

  async fn put_agency_assignment(&self, grant: AgencyGrant) -> Result<AgencyWrite> {
    let id_str = encode_uuid(grant.program_id);
    let role   = grant.role.to_string();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match query_agency_assignment(&tx, &id_str, grant.agency_id.0)? {
          Some(existing) if existing.state == "active" && existing.role == role => {
            return Ok(RawAgencyWrite::Unchanged(existing));
          }
          Some(existing)
            if existing.state == "active"
              && existing.role == "owner"
              && count_active_owners(&tx, &id_str)? <= 1 =>
          {
            return Ok(RawAgencyWrite::LastOwner);
          }
          _ => {}
        }

        tx.execute(
          "INSERT INTO agency_assignments (
             program_id, agency_id, role, state, assigned_by, notes, created_at, updated_at
           ) VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?6)
           ON CONFLICT(program_id, agency_id) DO UPDATE SET
             role        = excluded.role,
             state       = 'active',
             assigned_by = excluded.assigned_by,
             notes       = excluded.notes,
             updated_at  = excluded.updated_at",
          rusqlite::params![
            id_str,
            grant.agency_id.0,
            role,
            grant.assigned_by.0,
            grant.notes,
            at_str,
          ],
        )?;

        let row = query_agency_assignment(&tx, &id_str, grant.agency_id.0)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(RawAgencyWrite::Applied(row))
      })
      .await?;

    raw.decode()
  }

  async fn revoke_agency_assignment(
    &self,
    program_id: Uuid,
    agency_id: AgencyId,
  ) -> Result<AgencyWrite> {
    let id_str = encode_uuid(program_id);
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Count and deactivate in one statement so two concurrent removals
        // cannot both see a second owner.
        let changed = tx.execute(
          "UPDATE agency_assignments SET state = 'revoked', updated_at = ?3
           WHERE program_id = ?1 AND agency_id = ?2 AND state = 'active'
             AND (role <> 'owner' OR (
               SELECT COUNT(*) FROM agency_assignments
               WHERE program_id = ?1 AND state = 'active' AND role = 'owner'
             ) > 1)",
          rusqlite::params![id_str, agency_id.0, at_str],
        )?;

        let row = query_agency_assignment(&tx, &id_str, agency_id.0)?;
        if changed == 0 {
          return Ok(match row {
            Some(r) if r.state == "active" => RawAgencyWrite::LastOwner,
            _ => RawAgencyWrite::Missing,
          });
        }

        let row = row.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(RawAgencyWrite::Applied(row))
      })
      .await?;

    raw.decode()
  }

  async fn list_agency_assignments(&self, program_id: Uuid) -> Result<Vec<AgencyAssignmentEntry>> {
    let id_str = encode_uuid(program_id);
    let raws: Vec<RawAgencyEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}, COALESCE(g.name, 'Agency ' || a.agency_id)
           FROM agency_assignments a
           LEFT JOIN agencies g ON g.agency_id = a.agency_id
           WHERE a.program_id = ?1 AND a.state = 'active'",
          RawAgencyAssignment::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAgencyEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut entries = raws
      .into_iter()
      .map(RawAgencyEntry::into_entry)
      .collect::<Result<Vec<_>>>()?;
    sort_agency_entries(&mut entries);
    Ok(entries)
  }

  async fn count_agency_assignments(
    &self,
    program_id: Uuid,
    state: AssignmentState,
    role: Option<AgencyRole>,
  ) -> Result<usize> {
    let id_str   = encode_uuid(program_id);
    let state    = state.to_string();
    let role_str = role.map(|r| r.to_string());
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM agency_assignments
           WHERE program_id = ?1 AND state = ?2 AND (?3 IS NULL OR role = ?3)",
          rusqlite::params![id_str, state, role_str],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(count).unwrap_or_default())
  }

  // ── User assignments ──────────────────────────────────────────────────────

  async fn user_assignment(
    &self,
    program_id: Uuid,
    user_id: UserId,
  ) -> Result<Option<UserAssignment>> {
    let id_str = encode_uuid(program_id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_user_assignment(conn, &id_str, user_id.0)?))
      .await?;
    raw.map(RawUserAssignment::into_assignment).transpose()
  }

  async fn put_user_assignment(&self, grant: UserGrant) -> Result<UserAssignment> {
    let id_str = encode_uuid(grant.program_id);
    let role   = grant.role.to_string();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "INSERT INTO user_assignments (
             program_id, user_id, role, state, assigned_by, created_at, updated_at
           ) VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?5)
           ON CONFLICT(program_id, user_id) DO UPDATE SET
             role        = excluded.role,
             state       = 'active',
             assigned_by = excluded.assigned_by,
             updated_at  = excluded.updated_at",
          rusqlite::params![id_str, grant.user_id.0, role, grant.assigned_by.0, at_str],
        )?;
        let row = query_user_assignment(&tx, &id_str, grant.user_id.0)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(row)
      })
      .await?;

    raw.into_assignment()
  }

  async fn revoke_user_assignment(&self, program_id: Uuid, user_id: UserId) -> Result<bool> {
    let id_str = encode_uuid(program_id);
    let at_str = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE user_assignments SET state = 'revoked', updated_at = ?3
           WHERE program_id = ?1 AND user_id = ?2 AND state = 'active'",
          rusqlite::params![id_str, user_id.0, at_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn list_user_assignments(&self, program_id: Uuid) -> Result<Vec<UserAssignmentEntry>> {
    let id_str = encode_uuid(program_id);
    let raws: Vec<RawUserEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {},
             COALESCE(d.full_name, d.username, 'User ' || u.user_id),
             COALESCE(d.agency_id, 0)
           FROM user_assignments u
           LEFT JOIN users d ON d.user_id = u.user_id
           WHERE u.program_id = ?1 AND u.state = 'active'",
          RawUserAssignment::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawUserEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut entries = raws
      .into_iter()
      .map(RawUserEntry::into_entry)
      .collect::<Result<Vec<_>>>()?;
    sort_user_entries(&mut entries);
    Ok(entries)
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn insert_submission(
    &self,
    program_id: Uuid,
    input: NewSubmission,
    created_by: UserId,
  ) -> Result<SubmissionInsert> {
    let stored  = build_submission(program_id, input, created_by);
    let row     = SubmissionRow::from(&stored.submission);
    let targets = stored.targets.iter().map(TargetRow::from).collect::<Vec<_>>();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if live_submission_exists(&tx, &row.program_id, row.period_id)? {
          return Ok(false);
        }
        insert_submission_row(&tx, &row)?;
        insert_target_rows(&tx, &targets)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(if inserted {
      SubmissionInsert::Created(stored)
    } else {
      SubmissionInsert::AlreadyExists
    })
  }

  async fn get_submission(&self, id: Uuid) -> Result<Option<StoredSubmission>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(query_stored_submission(conn, "submission_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    raw.map(RawStoredSubmission::into_stored).transpose()
  }

  async fn current_submission(
    &self,
    program_id: Uuid,
    period_id: PeriodId,
  ) -> Result<Option<StoredSubmission>> {
    let id_str = encode_uuid(program_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(query_stored_submission(
          conn,
          "program_id = ?1 AND period_id = ?2",
          rusqlite::params![id_str, period_id.0],
        )?)
      })
      .await?;
    raw.map(RawStoredSubmission::into_stored).transpose()
  }

  async fn latest_submission(&self, program_id: Uuid) -> Result<Option<StoredSubmission>> {
    let id_str = encode_uuid(program_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(query_stored_submission(
          conn,
          "program_id = ?1 ORDER BY created_at DESC, rowid DESC",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    raw.map(RawStoredSubmission::into_stored).transpose()
  }

  async fn rewrite_submission(
    &self,
    id: Uuid,
    rewrite: SubmissionRewrite,
  ) -> Result<SubmissionWrite> {
    let id_str  = encode_uuid(id);
    let at_str  = encode_dt(Utc::now());
    let fields  = rewrite.fields;
    let targets = rewrite
      .targets
      .map(|t| build_targets(id, t).iter().map(TargetRow::from).collect::<Vec<_>>());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
          "UPDATE submissions SET description = ?2, rating = ?3, remarks = ?4, updated_at = ?5
           WHERE submission_id = ?1 AND is_deleted = 0 AND state = 'draft'",
          rusqlite::params![id_str, fields.description, fields.rating, fields.remarks, at_str],
        )?;
        if changed == 0 {
          return Ok(if submission_is_live(&tx, &id_str)? {
            RawSubmissionWrite::Finalized
          } else {
            RawSubmissionWrite::Missing
          });
        }
        if let Some(targets) = &targets {
          tx.execute(
            "UPDATE submissions SET content_json = NULL WHERE submission_id = ?1",
            rusqlite::params![id_str],
          )?;
          tx.execute("DELETE FROM targets WHERE submission_id = ?1", rusqlite::params![id_str])?;
          insert_target_rows(&tx, targets)?;
        }
        let stored = query_stored_submission(&tx, "submission_id = ?1", rusqlite::params![id_str])?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(RawSubmissionWrite::Rewritten(stored))
      })
      .await?;

    match raw {
      RawSubmissionWrite::Rewritten(raw) => Ok(SubmissionWrite::Rewritten(raw.into_stored()?)),
      RawSubmissionWrite::Finalized => Ok(SubmissionWrite::Finalized),
      RawSubmissionWrite::Missing => Err(Error::SubmissionNotFound(id)),
    }
  }

  async fn finalize_submission(&self, id: Uuid) -> Result<bool> {
    self.transition(id, SubmissionState::Draft, SubmissionState::Finalized).await
  }

  async fn reopen_submission(&self, id: Uuid) -> Result<bool> {
    self.transition(id, SubmissionState::Finalized, SubmissionState::Draft).await
  }
}

impl SqliteStore {
  /// Conditional state change; `false` when the row was not in `from`.
  async fn transition(
    &self,
    id: Uuid,
    from: SubmissionState,
    to: SubmissionState,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let from   = from.to_string();
    let to     = to.to_string();
    let at_str = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE submissions SET state = ?3, updated_at = ?4
           WHERE submission_id = ?1 AND state = ?2 AND is_deleted = 0",
          rusqlite::params![id_str, from, to, at_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}
