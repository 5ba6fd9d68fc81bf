//! Handlers for `/programs` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/programs` | Body: [`NewProgram`]; 201 |
//! | `GET`    | `/programs/{id}` | Current snapshot |
//! | `PATCH`  | `/programs/{id}` | Body: [`ProgramPatch`]; returns changes |
//! | `DELETE` | `/programs/{id}` | Administrators only; 204 |
//! | `GET`    | `/programs/{id}/permission` | Caller's effective permission |
//! | `PUT`    | `/programs/{id}/outcomes` | Body: `{"outcome_ids":[1,2]}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use reporta_core::{
  access::Permission,
  directory::OutcomeId,
  program::{NewProgram, Program, ProgramPatch},
  snapshot::Snapshot,
  store::ReportStore,
};
use reporta_engine::{CreatedProgram, Engine, Tracked};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /programs`
pub async fn create<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Json(body): Json<NewProgram>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReportStore,
{
  let created: CreatedProgram = engine.create_program(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Read / update / delete ───────────────────────────────────────────────────

/// `GET /programs/{id}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Snapshot>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.snapshot(&actor, id).await?))
}

/// `PATCH /programs/{id}`
pub async fn update<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<ProgramPatch>,
) -> Result<Json<Tracked<Program>>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.update_program(&actor, id, patch).await?))
}

/// `DELETE /programs/{id}`
pub async fn delete<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ReportStore,
{
  engine.delete_program(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Permission ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PermissionView {
  pub permission: Permission,
  pub can_view:   bool,
  pub can_edit:   bool,
  pub is_owner:   bool,
}

/// `GET /programs/{id}/permission`
pub async fn permission<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<PermissionView>, ApiError>
where
  S: ReportStore,
{
  let permission = engine.resolve_role(&actor, id).await?;
  Ok(Json(PermissionView {
    permission,
    can_view: permission.can_view(),
    can_edit: permission.can_edit(),
    is_owner: permission.is_owner(),
  }))
}

// ─── Outcomes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OutcomesBody {
  pub outcome_ids: Vec<OutcomeId>,
}

/// `PUT /programs/{id}/outcomes`
pub async fn link_outcomes<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<OutcomesBody>,
) -> Result<Json<Tracked<Vec<OutcomeId>>>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.link_outcomes(&actor, id, body.outcome_ids).await?))
}
