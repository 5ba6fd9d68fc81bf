//! Stateless helpers: snapshot diffing and number validation.

use std::sync::Arc;

use axum::{Json, extract::State};
use reporta_core::{diff::ChangeRecord, snapshot::Snapshot, store::ReportStore};
use reporta_engine::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct DiffBody {
  pub before: Snapshot,
  pub after:  Snapshot,
}

/// `POST /diff`
pub async fn diff<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<DiffBody>,
) -> Json<Vec<ChangeRecord>>
where
  S: ReportStore,
{
  Json(engine.diff_snapshots(&body.before, &body.after))
}

#[derive(Debug, Deserialize)]
pub struct NumberBody {
  pub number:            String,
  #[serde(default)]
  pub initiative_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NumberVerdict {
  pub valid: bool,
}

/// `POST /numbers/validate`: 422 with the reason when invalid.
pub async fn validate_number<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<NumberBody>,
) -> Result<Json<NumberVerdict>, ApiError>
where
  S: ReportStore,
{
  engine.validate_number(&body.number, body.initiative_number.as_deref())?;
  Ok(Json(NumberVerdict { valid: true }))
}
