//! Actor extraction from the identity headers set by the session layer.

use axum::{extract::FromRequestParts, http::request::Parts};
use reporta_core::actor::Actor;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-actor-user";
pub const AGENCY_HEADER: &str = "x-actor-agency";
pub const ADMIN_HEADER: &str = "x-actor-admin";
pub const FOCAL_HEADER: &str = "x-actor-focal";

/// The actor a request is made on behalf of.
pub struct Caller(pub Actor);

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    let user_id: i64 = required(parts, USER_HEADER)?;
    let agency_id: i64 = required(parts, AGENCY_HEADER)?;
    let mut actor = Actor::member(user_id, agency_id);
    actor.is_admin = flag(parts, ADMIN_HEADER)?;
    actor.is_focal = flag(parts, FOCAL_HEADER)?;
    Ok(Caller(actor))
  }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
  parts
    .headers
    .get(name)
    .map(|v| {
      v.to_str()
        .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text")))
    })
    .transpose()
}

fn required(parts: &Parts, name: &str) -> Result<i64, ApiError> {
  let value = header(parts, name)?
    .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))?;
  value
    .trim()
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("{name} must be an integer, got {value:?}")))
}

fn flag(parts: &Parts, name: &str) -> Result<bool, ApiError> {
  match header(parts, name)?.map(str::trim) {
    None | Some("") | Some("0") | Some("false") => Ok(false),
    Some("1") | Some("true") => Ok(true),
    Some(other) => Err(ApiError::BadRequest(format!("{name} must be a boolean, got {other:?}"))),
  }
}
