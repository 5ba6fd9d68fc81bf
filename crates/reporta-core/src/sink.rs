//! Outbound collaborators: the audit log and the notification dispatcher.
//!
//! Both are fire-and-forget. A failing sink is logged and otherwise ignored;
//! it never rolls back the mutation it reports on.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{actor::Actor, directory::UserId, program::Program, submission::Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditOutcome {
  Success,
  Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
  /// Operation name, e.g. `assign_agency`.
  pub action:   String,
  pub detail:   String,
  pub outcome:  AuditOutcome,
  pub actor_id: UserId,
}

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives one entry per mutating operation, successful or not.
pub trait AuditSink: Send + Sync {
  fn log_action(&self, entry: &AuditEntry) -> Result<(), SinkError>;
}

/// Payload of the program-created notification.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramCreated<'a> {
  pub program:    &'a Program,
  pub actor:      &'a Actor,
  pub submission: Option<&'a Submission>,
}

/// Invoked once a program and its first submission are committed.
pub trait Notifier: Send + Sync {
  fn notify_program_created(&self, event: &ProgramCreated<'_>) -> Result<(), SinkError>;
}

// ─── Implementations ─────────────────────────────────────────────────────────

/// Writes audit entries as structured `tracing` events on `reporta::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
  fn log_action(&self, entry: &AuditEntry) -> Result<(), SinkError> {
    tracing::info!(
      target: "reporta::audit",
      action = %entry.action,
      outcome = %entry.outcome,
      actor = %entry.actor_id,
      "{}",
      entry.detail
    );
    Ok(())
  }
}

/// Keeps entries in memory; handy for tests and for embedding callers that
/// flush to their own audit table.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
  entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
  pub fn entries(&self) -> Vec<AuditEntry> {
    self.entries.lock().map(|e| e.clone()).unwrap_or_default()
  }
}

impl AuditSink for MemoryAuditSink {
  fn log_action(&self, entry: &AuditEntry) -> Result<(), SinkError> {
    self
      .entries
      .lock()
      .map_err(|_| "audit buffer poisoned")?
      .push(entry.clone());
    Ok(())
  }
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify_program_created(&self, event: &ProgramCreated<'_>) -> Result<(), SinkError> {
    tracing::info!(
      target: "reporta::notify",
      program = %event.program.program_id,
      agency = %event.program.owner_agency_id,
      actor = %event.actor.user_id,
      "program created: {}",
      event.program.name
    );
    Ok(())
  }
}

/// Counts program-created notifications.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
  created: Mutex<Vec<uuid::Uuid>>,
}

impl MemoryNotifier {
  pub fn created(&self) -> Vec<uuid::Uuid> {
    self.created.lock().map(|c| c.clone()).unwrap_or_default()
  }
}

impl Notifier for MemoryNotifier {
  fn notify_program_created(&self, event: &ProgramCreated<'_>) -> Result<(), SinkError> {
    self
      .created
      .lock()
      .map_err(|_| "notification buffer poisoned")?
      .push(event.program.program_id);
    Ok(())
  }
}
