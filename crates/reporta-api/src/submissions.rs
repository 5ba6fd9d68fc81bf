//! Handlers for submission endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/programs/{id}/submissions` | Body: [`NewSubmission`]; 201, 422 if the period has one |
//! | `GET`  | `/programs/{id}/submissions/{period_id}` | Canonical view, any storage generation |
//! | `PUT`  | `/programs/{id}/submissions/{period_id}` | Body: [`SubmissionUpdate`]; full rewrite |
//! | `POST` | `/programs/{id}/autosave` | Body: [`AutoSave`] |
//! | `POST` | `/submissions/{id}/finalize` | 422 if already finalized |
//! | `POST` | `/submissions/{id}/reopen` | Owners only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use reporta_core::{
  directory::PeriodId,
  legacy::SubmissionView,
  store::ReportStore,
  submission::{AutoSave, NewSubmission, SubmissionUpdate},
};
use reporta_engine::{Engine, Tracked};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

/// `POST /programs/{id}/submissions`
pub async fn create_draft<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewSubmission>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReportStore,
{
  let view = engine.create_draft(&actor, id, body).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /programs/{id}/submissions/{period_id}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path((id, period_id)): Path<(Uuid, PeriodId)>,
) -> Result<Json<SubmissionView>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.read_submission(&actor, id, period_id).await?))
}

/// `PUT /programs/{id}/submissions/{period_id}`
pub async fn update<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path((id, period_id)): Path<(Uuid, PeriodId)>,
  Json(body): Json<SubmissionUpdate>,
) -> Result<Json<Tracked<SubmissionView>>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.update_submission(&actor, id, period_id, body).await?))
}

/// `POST /programs/{id}/autosave`
pub async fn auto_save<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<AutoSave>,
) -> Result<Json<Tracked<SubmissionView>>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.auto_save(&actor, id, body).await?))
}

/// `POST /submissions/{id}/finalize`
pub async fn finalize<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<SubmissionView>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.finalize(&actor, id).await?))
}

/// `POST /submissions/{id}/reopen`
pub async fn reopen<S>(
  State(engine): State<Arc<Engine<S>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<SubmissionView>, ApiError>
where
  S: ReportStore,
{
  Ok(Json(engine.reopen(&actor, id).await?))
}
