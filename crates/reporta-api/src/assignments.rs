//! Handlers for `/programs/{id}/agencies` and `/programs/{id}/users`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/programs/{id}/agencies` | Owners first |
//! | `POST`   | `/programs/{id}/agencies` | Body: `{"agency_id":2,"role":"editor"}` |
//! | `DELETE` | `/programs/{id}/agencies/{agency_id}` | 409 for the last owner |
//! | `GET`    | `/programs/{id}/users` | Editors first |
//! | `POST`   | `/programs/{id}/users` | Body: `{"user_id":7,"role":"viewer"}` |
//! | `DELETE` | `/programs/{id}/users/{user_id}` | 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use reporta_core::{
  assignment::{
    AgencyAssignment, AgencyAssignmentEntry, AgencyRole, UserAssignment, UserAssignmentEntry,
    UserRole,
  },
  directory::{AgencyId, UserId},
  store::ReportStore,
};
use reporta_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

// ─── Agencies ─────────────────────────────────────────────────────────────────

/// `GET /programs/{id}/agencies`
pub async fn list_agencies<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AgencyAssignmentEntry>>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.list_assigned_agencies(&actor, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignAgencyBody {
  pub agency_id: AgencyId,
  pub role:      AgencyRole,
  #[serde(default)]
  pub notes:     Option<String>,
}

/// `POST /programs/{id}/agencies`
pub async fn assign_agency<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<AssignAgencyBody>,
) -> Result<Json<AgencyAssignment>, ApiError>
where
  S: ReportStore,
{
  let assignment = engine
    .assign_agency(&actor, id, body.agency_id, body.role, body.notes)
    .await?;
  Ok(Json(assignment))
}

/// `DELETE /programs/{id}/agencies/{agency_id}`
pub async fn remove_agency<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path((id, agency_id)): Path<(Uuid, AgencyId)>,
) -> Result<Json<AgencyAssignment>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.remove_agency(&actor, id, agency_id).await?))
}

// ─── Users ────────────────────────────────────────────────────────────────────

/// `GET /programs/{id}/users`
pub async fn list_users<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<UserAssignmentEntry>>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.list_assigned_users(&actor, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignUserBody {
  pub user_id: UserId,
  pub role:    UserRole,
}

/// `POST /programs/{id}/users`
pub async fn assign_user<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<AssignUserBody>,
) -> Result<Json<UserAssignment>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.assign_user(&actor, id, body.user_id, body.role).await?))
}

/// `DELETE /programs/{id}/users/{user_id}`
pub async fn remove_user<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path((id, user_id)): Path<(Uuid, UserId)>,
) -> Result<StatusCode, ApiError>
where
  S: ReportStore,
{
  engine.remove_user(&actor, id, user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
