//! Router tests driving the full stack over an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use reporta_core::{
  directory::{Agency, AgencyId},
  store::ReportStore,
};
use reporta_engine::{Engine, EngineConfig};
use reporta_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  for (id, name) in [(1, "Parks"), (2, "Water")] {
    store
      .put_agency(Agency { agency_id: AgencyId(id), name: name.into() })
      .await
      .unwrap();
  }
  api_router(Arc::new(Engine::new(store, EngineConfig::default())))
}

/// Send a request as `(user, agency)` and decode the JSON response.
async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  actor: Option<(i64, i64)>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some((user, agency)) = actor {
    builder = builder
      .header("x-actor-user", user.to_string())
      .header("x-actor-agency", agency.to_string());
  }
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn create_program(app: &Router) -> String {
  let (status, body) = call(
    app,
    "POST",
    "/programs",
    Some((10, 1)),
    Some(json!({ "name": "Urban canopy", "number": "7.1" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["program"]["program_id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn missing_actor_headers_are_rejected() {
  let app = app().await;
  let (status, body) = call(&app, "POST", "/programs", None, Some(json!({ "name": "X" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("x-actor-user"));
}

#[tokio::test]
async fn creator_is_owner() {
  let app = app().await;
  let id = create_program(&app).await;

  let (status, body) =
    call(&app, "GET", &format!("/programs/{id}/permission"), Some((10, 1)), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["permission"], "owner");
  assert_eq!(body["can_edit"], true);

  let (_, body) =
    call(&app, "GET", &format!("/programs/{id}/permission"), Some((20, 2)), None).await;
  assert_eq!(body["permission"], "none");
}

#[tokio::test]
async fn removing_last_owner_conflicts() {
  let app = app().await;
  let id = create_program(&app).await;

  let (status, _) = call(
    &app,
    "POST",
    &format!("/programs/{id}/agencies"),
    Some((10, 1)),
    Some(json!({ "agency_id": 2, "role": "viewer" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) =
    call(&app, "DELETE", &format!("/programs/{id}/agencies/1"), Some((10, 1)), None).await;
  assert_eq!(status, StatusCode::CONFLICT, "{body}");

  let (_, body) = call(&app, "GET", &format!("/programs/{id}/agencies"), Some((20, 2)), None).await;
  let names: Vec<_> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["agency_name"].as_str().unwrap())
    .collect();
  assert_eq!(names, ["Parks", "Water"]);
}

#[tokio::test]
async fn viewer_cannot_create_drafts() {
  let app = app().await;
  let id = create_program(&app).await;
  call(
    &app,
    "POST",
    &format!("/programs/{id}/agencies"),
    Some((10, 1)),
    Some(json!({ "agency_id": 2, "role": "viewer" })),
  )
  .await;

  let (status, _) = call(
    &app,
    "POST",
    &format!("/programs/{id}/submissions"),
    Some((20, 2)),
    Some(json!({ "period_id": 1, "targets": [{ "text": "Plant trees" }] })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn submission_lifecycle_over_http() {
  let app = app().await;
  let id = create_program(&app).await;

  let draft = json!({ "period_id": 1, "targets": [{ "text": "Plant trees" }] });
  let (status, body) = call(
    &app,
    "POST",
    &format!("/programs/{id}/submissions"),
    Some((10, 1)),
    Some(draft.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["targets"][0]["number"], "7.1.1");
  let submission_id = body["submission"]["submission_id"].as_str().unwrap().to_owned();

  let (status, body) = call(
    &app,
    "POST",
    &format!("/programs/{id}/submissions"),
    Some((10, 1)),
    Some(draft),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].as_str().unwrap().contains("submission already exists"));

  let (status, body) = call(
    &app,
    "PUT",
    &format!("/programs/{id}/submissions/1"),
    Some((10, 1)),
    Some(json!({ "targets": [{ "text": "Plant trees" }, { "text": "Train staff" }] })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["changes"][0]["field"], "targets[1]");
  assert_eq!(body["changes"][0]["change_type"], "added");

  let finalize = format!("/submissions/{submission_id}/finalize");
  let (status, body) = call(&app, "POST", &finalize, Some((10, 1)), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["submission"]["state"], "finalized");

  let (status, _) = call(&app, "POST", &finalize, Some((10, 1)), None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  let (status, body) =
    call(&app, "GET", &format!("/programs/{id}/submissions/1"), Some((10, 1)), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["targets"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_program_is_not_found() {
  let app = app().await;
  let (status, _) = call(
    &app,
    "GET",
    "/programs/00000000-0000-0000-0000-000000000000",
    Some((10, 1)),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn number_validation_endpoint() {
  let app = app().await;
  let (status, body) = call(
    &app,
    "POST",
    "/numbers/validate",
    None,
    Some(json!({ "number": "INIT-1.2A", "initiative_number": "INIT-1" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["valid"], true);

  let (status, _) = call(
    &app,
    "POST",
    "/numbers/validate",
    None,
    Some(json!({ "number": "INIT-1", "initiative_number": "INIT-1" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn diff_endpoint_reports_positional_changes() {
  let app = app().await;
  let before = json!({ "name": "P", "targets": [{ "text": "Plant 50 trees" }] });
  let after = json!({
    "name": "P",
    "targets": [{ "text": "Plant 50 trees" }, { "text": "Train 10 staff" }],
  });
  let (status, body) = call(
    &app,
    "POST",
    "/diff",
    None,
    Some(json!({ "before": before, "after": after })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let changes = body.as_array().unwrap();
  assert_eq!(changes.len(), 1);
  assert_eq!(changes[0]["change_type"], "added");
  assert_eq!(changes[0]["after"], "Train 10 staff");
}
