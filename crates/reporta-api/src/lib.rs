//! JSON REST API for Reporta.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`ReportStore`]. The caller is identified by the `x-actor-*` headers the
//! upstream session layer sets; authentication and TLS are the embedding
//! server's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", reporta_api::api_router(Arc::new(engine)))
//! ```

pub mod assignments;
pub mod caller;
pub mod error;
pub mod programs;
pub mod submissions;
pub mod tools;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use reporta_core::store::ReportStore;
use reporta_engine::Engine;

pub use caller::Caller;
pub use error::ApiError;

/// Build the API router for `engine`.
pub fn api_router<S>(engine: Arc<Engine<S>>) -> Router<()>
where
  S: ReportStore + 'static,
{
  Router::new()
    // Programs
    .route("/programs", post(programs::create::<S>))
    .route(
      "/programs/{id}",
      get(programs::get_one::<S>)
        .patch(programs::update::<S>)
        .delete(programs::delete::<S>),
    )
    .route("/programs/{id}/permission", get(programs::permission::<S>))
    .route("/programs/{id}/outcomes", put(programs::link_outcomes::<S>))
    // Assignments
    .route(
      "/programs/{id}/agencies",
      get(assignments::list_agencies::<S>).post(assignments::assign_agency::<S>),
    )
    .route("/programs/{id}/agencies/{agency_id}", delete(assignments::remove_agency::<S>))
    .route(
      "/programs/{id}/users",
      get(assignments::list_users::<S>).post(assignments::assign_user::<S>),
    )
    .route("/programs/{id}/users/{user_id}", delete(assignments::remove_user::<S>))
    // Submissions
    .route("/programs/{id}/submissions", post(submissions::create_draft::<S>))
    .route(
      "/programs/{id}/submissions/{period_id}",
      get(submissions::get_one::<S>).put(submissions::update::<S>),
    )
    .route("/programs/{id}/autosave", post(submissions::auto_save::<S>))
    .route("/submissions/{id}/finalize", post(submissions::finalize::<S>))
    .route("/submissions/{id}/reopen", post(submissions::reopen::<S>))
    // Tools
    .route("/diff", post(tools::diff::<S>))
    .route("/numbers/validate", post(tools::validate_number::<S>))
    .with_state(engine)
}

#[cfg(test)]
mod tests;
