//! The Reporta program collaboration and submission engine.
//!
//! [`Engine`] is the surface other layers call. Every operation takes the
//! acting [`Actor`] explicitly, re-reads whatever assignment state it needs
//! from the [`ReportStore`], authorizes and validates before any write, and
//! reports each mutation to the [`AuditSink`] whether it succeeded or not.

mod access;
mod assignments;
mod programs;
mod submissions;

pub mod config;

use std::sync::Arc;

use reporta_core::{
  Error, Result,
  actor::Actor,
  diff::ChangeRecord,
  sink::{AuditEntry, AuditOutcome, AuditSink, Notifier, TracingAuditSink, TracingNotifier},
  store::ReportStore,
};
use serde::Serialize;

pub use config::EngineConfig;
pub use programs::CreatedProgram;

/// The result of a mutation together with the changes it made to the
/// program's snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Tracked<T> {
  pub value:   T,
  pub changes: Vec<ChangeRecord>,
}

pub struct Engine<S> {
  store:    S,
  audit:    Arc<dyn AuditSink>,
  notifier: Arc<dyn Notifier>,
  config:   EngineConfig,
}

impl<S: ReportStore> Engine<S> {
  /// An engine that writes audit entries and notifications to `tracing`.
  pub fn new(store: S, config: EngineConfig) -> Self {
    Self {
      store,
      audit: Arc::new(TracingAuditSink),
      notifier: Arc::new(TracingNotifier),
      config,
    }
  }

  pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
    self.audit = audit;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Hand one audit entry to the sink. Sink failures are logged and dropped.
  fn record<T>(&self, actor: &Actor, action: &'static str, detail: String, result: &Result<T>) {
    let (outcome, detail) = match result {
      Ok(_) => {
        tracing::info!(action, actor = %actor.user_id, "{detail}");
        (AuditOutcome::Success, detail)
      }
      Err(e) => {
        tracing::warn!(action, actor = %actor.user_id, error = %e, "{detail}");
        (AuditOutcome::Failure, format!("{detail}: {e}"))
      }
    };
    let entry = AuditEntry {
      action: action.to_owned(),
      detail,
      outcome,
      actor_id: actor.user_id,
    };
    if let Err(e) = self.audit.log_action(&entry) {
      tracing::warn!(action, error = %e, "audit sink rejected entry");
    }
  }
}

/// Wraps backend errors into [`Error::Storage`].
trait StorageContext<T> {
  fn storage(self, context: &str) -> Result<T>;
}

impl<T, E> StorageContext<T> for std::result::Result<T, E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn storage(self, context: &str) -> Result<T> {
    self.map_err(|e| Error::storage(context, e))
  }
}

#[cfg(test)]
mod tests;
