//! Engine behaviour against an in-memory SQLite store.

use std::sync::Arc;

use reporta_core::{
  Error,
  access::Permission,
  actor::Actor,
  assignment::{AgencyRole, AssignmentState, UserRole},
  diff::Change,
  directory::{
    Agency, AgencyId, Initiative, InitiativeId, OutcomeId, Period, PeriodId, PeriodStatus, User,
    UserId,
  },
  legacy::{TargetSource, TargetView},
  program::{NewProgram, Program, ProgramPatch},
  sink::{AuditOutcome, MemoryAuditSink, MemoryNotifier},
  snapshot::Snapshot,
  store::ReportStore,
  submission::{AutoSave, NewSubmission, NewTarget, SubmissionFields, SubmissionUpdate},
};
use reporta_store_sqlite::SqliteStore;

use crate::{Engine, EngineConfig};

struct Harness {
  engine:   Engine<SqliteStore>,
  audit:    Arc<MemoryAuditSink>,
  notifier: Arc<MemoryNotifier>,
}

async fn harness_with(config: EngineConfig) -> Harness {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  for (id, name) in [(1, "Parks"), (2, "Water"), (3, "Health")] {
    store
      .put_agency(Agency { agency_id: AgencyId(id), name: name.into() })
      .await
      .unwrap();
  }
  for (user, agency) in [(10, 1), (20, 2), (21, 2), (30, 3)] {
    store
      .put_user(User {
        user_id:   UserId(user),
        agency_id: AgencyId(agency),
        username:  format!("user{user}"),
        full_name: None,
      })
      .await
      .unwrap();
  }
  store
    .put_initiative(Initiative {
      initiative_id: InitiativeId(1),
      number:        "INIT-1".into(),
      name:          "Green city".into(),
    })
    .await
    .unwrap();

  let audit = Arc::new(MemoryAuditSink::default());
  let notifier = Arc::new(MemoryNotifier::default());
  let engine = Engine::new(store, config)
    .with_audit_sink(audit.clone())
    .with_notifier(notifier.clone());
  Harness { engine, audit, notifier }
}

async fn harness() -> Harness { harness_with(EngineConfig::default()).await }

fn parks() -> Actor { Actor::member(10, 1) }

fn water() -> Actor { Actor::member(20, 2) }

async fn program(h: &Harness, restrict_editors: bool) -> Program {
  let input = NewProgram {
    name: "Urban canopy".into(),
    number: Some("INIT-1.2A".into()),
    initiative_id: Some(InitiativeId(1)),
    restrict_editors,
    ..Default::default()
  };
  h.engine.create_program(&parks(), input).await.unwrap().program
}

fn draft(period: i64, targets: &[&str]) -> NewSubmission {
  NewSubmission {
    period_id: PeriodId(period),
    fields:    SubmissionFields::default(),
    targets:   targets.iter().map(|t| NewTarget::text(*t)).collect(),
  }
}

fn snapshot_with_targets(texts: &[&str]) -> Snapshot {
  Snapshot {
    name: "Urban canopy".into(),
    targets: texts
      .iter()
      .map(|t| TargetView { text: (*t).into(), ..Default::default() })
      .collect(),
    ..Default::default()
  }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn creator_agency_owns_new_program() {
  let h = harness().await;
  let p = program(&h, false).await;

  let role = h.engine.resolve_role(&parks(), p.program_id).await.unwrap();
  assert_eq!(role, Permission::Owner);
  assert_eq!(h.notifier.created(), vec![p.program_id]);
}

#[tokio::test]
async fn sole_owner_cannot_be_removed() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Viewer, None)
    .await
    .unwrap();

  let result = h.engine.remove_agency(&parks(), p.program_id, AgencyId(1)).await;
  assert!(matches!(result, Err(Error::InvariantViolation(_))), "{result:?}");

  // Nothing changed.
  let listed = h.engine.list_assigned_agencies(&parks(), p.program_id).await.unwrap();
  let roles: Vec<_> = listed.iter().map(|e| (e.agency_name.as_str(), e.assignment.role)).collect();
  assert_eq!(roles, [("Parks", AgencyRole::Owner), ("Water", AgencyRole::Viewer)]);

  let last = h.audit.entries().pop().unwrap();
  assert_eq!(last.action, "remove_agency");
  assert_eq!(last.outcome, AuditOutcome::Failure);
}

#[tokio::test]
async fn number_validation_requires_suffix() {
  let h = harness().await;
  assert!(h.engine.validate_number("INIT-1.2A", Some("INIT-1")).is_ok());
  assert!(matches!(
    h.engine.validate_number("INIT-1", Some("INIT-1")),
    Err(Error::Validation(_))
  ));
  assert!(h.engine.validate_number("", Some("INIT-1")).is_ok());
}

#[tokio::test]
async fn second_draft_for_same_period_is_rejected() {
  let h = harness().await;
  let p = program(&h, false).await;

  let first = h
    .engine
    .create_draft(&parks(), p.program_id, draft(1, &["Plant trees"]))
    .await
    .unwrap();
  assert_eq!(first.targets[0].number.as_deref(), Some("INIT-1.2A.1"));

  let second = h
    .engine
    .create_draft(&parks(), p.program_id, draft(1, &["Plant trees"]))
    .await;
  match second {
    Err(Error::Validation(msg)) => assert!(msg.contains("submission already exists"), "{msg}"),
    other => panic!("expected validation error, got {other:?}"),
  }
}

#[tokio::test]
async fn appended_target_diffs_as_one_addition() {
  let h = harness().await;
  let before = snapshot_with_targets(&["Plant 50 trees"]);
  let after = snapshot_with_targets(&["Plant 50 trees", "Train 10 staff"]);

  let changes = h.engine.diff_snapshots(&before, &after);
  assert_eq!(changes.len(), 1);
  assert_eq!(changes[0].field, "targets[1]");
  assert!(matches!(changes[0].change, Change::Added { .. }));
  assert!(h.engine.diff_snapshots(&after, &after).is_empty());
}

// ─── Assignments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn assigning_same_role_twice_keeps_one_row() {
  let h = harness().await;
  let p = program(&h, false).await;
  for _ in 0..2 {
    h.engine
      .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Editor, None)
      .await
      .unwrap();
  }

  let listed = h.engine.list_assigned_agencies(&parks(), p.program_id).await.unwrap();
  assert_eq!(listed.iter().filter(|e| e.assignment.agency_id == AgencyId(2)).count(), 1);
  assert_eq!(h.engine.resolve_role(&water(), p.program_id).await.unwrap(), Permission::Editor);
}

#[tokio::test]
async fn owners_never_drop_to_zero() {
  let h = harness().await;
  let p = program(&h, false).await;
  let steps: [(u8, i64, AgencyRole); 6] = [
    (b'a', 2, AgencyRole::Owner),
    (b'r', 1, AgencyRole::Owner),
    (b'r', 2, AgencyRole::Owner),
    (b'a', 2, AgencyRole::Viewer),
    (b'a', 3, AgencyRole::Owner),
    (b'a', 2, AgencyRole::Viewer),
  ];
  for (op, agency, role) in steps {
    let _ = match op {
      b'a' => h
        .engine
        .assign_agency(&Actor::member(1, 9).admin(), p.program_id, AgencyId(agency), role, None)
        .await,
      _ => h
        .engine
        .remove_agency(&Actor::member(1, 9).admin(), p.program_id, AgencyId(agency))
        .await,
    };
    let owners = h
      .engine
      .store()
      .count_agency_assignments(p.program_id, AssignmentState::Active, Some(AgencyRole::Owner))
      .await
      .unwrap();
    assert!(owners >= 1, "no owner left after {op} {agency}");
  }
}

#[tokio::test]
async fn non_owner_cannot_manage_assignments() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Editor, None)
    .await
    .unwrap();

  let result = h
    .engine
    .assign_agency(&water(), p.program_id, AgencyId(3), AgencyRole::Viewer, None)
    .await;
  assert!(matches!(result, Err(Error::PermissionDenied(_))));
}

#[tokio::test]
async fn restricted_editors_need_a_user_grant() {
  let h = harness().await;
  let p = program(&h, true).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Editor, None)
    .await
    .unwrap();

  assert!(h.engine.can_view(&water(), p.program_id).await.unwrap());
  assert!(!h.engine.can_edit(&water(), p.program_id).await.unwrap());

  h.engine
    .assign_user(&parks(), p.program_id, UserId(20), UserRole::Editor)
    .await
    .unwrap();
  assert!(h.engine.can_edit(&water(), p.program_id).await.unwrap());
  // The grant is personal.
  assert!(!h.engine.can_edit(&Actor::member(21, 2), p.program_id).await.unwrap());

  h.engine.remove_user(&parks(), p.program_id, UserId(20)).await.unwrap();
  assert!(!h.engine.can_edit(&water(), p.program_id).await.unwrap());
}

#[tokio::test]
async fn user_grant_requires_agency_access() {
  let h = harness().await;
  let p = program(&h, true).await;

  let result = h
    .engine
    .assign_user(&parks(), p.program_id, UserId(30), UserRole::Editor)
    .await;
  match result {
    Err(Error::Validation(msg)) => assert!(msg.contains("user's agency lacks access"), "{msg}"),
    other => panic!("expected validation error, got {other:?}"),
  }
}

#[tokio::test]
async fn focal_user_needs_own_agency_assignment() {
  let h = harness().await;
  let p = program(&h, true).await;
  let focal = Actor::member(30, 3).focal();

  // Focal users may manage agency assignments but get no access themselves.
  assert_eq!(h.engine.resolve_role(&focal, p.program_id).await.unwrap(), Permission::None);
  h.engine
    .assign_agency(&focal, p.program_id, AgencyId(2), AgencyRole::Editor, None)
    .await
    .unwrap();

  let denied = h
    .engine
    .assign_user(&focal, p.program_id, UserId(20), UserRole::Editor)
    .await;
  assert!(matches!(denied, Err(Error::PermissionDenied(_))), "{denied:?}");

  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(3), AgencyRole::Viewer, None)
    .await
    .unwrap();
  h.engine
    .assign_user(&focal, p.program_id, UserId(20), UserRole::Editor)
    .await
    .unwrap();
}

#[tokio::test]
async fn user_listing_orders_editors_first() {
  let h = harness().await;
  let p = program(&h, true).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Editor, None)
    .await
    .unwrap();
  h.engine
    .assign_user(&parks(), p.program_id, UserId(20), UserRole::Viewer)
    .await
    .unwrap();
  h.engine
    .assign_user(&parks(), p.program_id, UserId(21), UserRole::Editor)
    .await
    .unwrap();

  let listed = h.engine.list_assigned_users(&parks(), p.program_id).await.unwrap();
  let names: Vec<_> = listed.iter().map(|e| e.user_name.as_str()).collect();
  assert_eq!(names, ["user21", "user20"]);
}

// ─── Programs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_program_input_is_rejected() {
  let h = harness().await;
  let bad_number = NewProgram {
    name: "Canopy".into(),
    number: Some("OTHER.1".into()),
    initiative_id: Some(InitiativeId(1)),
    ..Default::default()
  };
  assert!(matches!(
    h.engine.create_program(&parks(), bad_number).await,
    Err(Error::Validation(_))
  ));

  let blank = NewProgram { name: "   ".into(), ..Default::default() };
  assert!(matches!(
    h.engine.create_program(&parks(), blank).await,
    Err(Error::Validation(_))
  ));
  assert!(h.notifier.created().is_empty());
}

#[tokio::test]
async fn program_update_reports_changes() {
  let h = harness().await;
  let p = program(&h, false).await;

  let patch = ProgramPatch { name: Some("Urban forest".into()), ..Default::default() };
  let tracked = h.engine.update_program(&parks(), p.program_id, patch).await.unwrap();
  assert_eq!(tracked.value.name, "Urban forest");
  assert_eq!(tracked.changes.len(), 1);
  assert_eq!(tracked.changes[0].field, "name");
  assert_eq!(tracked.changes[0].before(), "Urban canopy");
}

#[tokio::test]
async fn only_owners_toggle_editor_restriction() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Editor, None)
    .await
    .unwrap();

  let patch = ProgramPatch { restrict_editors: Some(true), ..Default::default() };
  let denied = h.engine.update_program(&water(), p.program_id, patch.clone()).await;
  assert!(matches!(denied, Err(Error::PermissionDenied(_))));

  let tracked = h.engine.update_program(&parks(), p.program_id, patch).await.unwrap();
  assert!(tracked.value.restrict_editors);
}

#[tokio::test]
async fn deletion_is_admin_only() {
  let h = harness().await;
  let p = program(&h, false).await;

  let denied = h.engine.delete_program(&parks(), p.program_id).await;
  assert!(matches!(denied, Err(Error::PermissionDenied(_))));

  h.engine
    .delete_program(&Actor::member(1, 9).admin(), p.program_id)
    .await
    .unwrap();
  assert!(matches!(
    h.engine.resolve_role(&parks(), p.program_id).await,
    Err(Error::NotFound(_))
  ));
}

#[tokio::test]
async fn outcome_links_are_tracked() {
  let h = harness().await;
  let p = program(&h, false).await;

  let tracked = h
    .engine
    .link_outcomes(&parks(), p.program_id, vec![OutcomeId(4), OutcomeId(2), OutcomeId(4)])
    .await
    .unwrap();
  assert_eq!(tracked.value, [OutcomeId(2), OutcomeId(4)]);
  assert_eq!(tracked.changes.len(), 2);
  assert!(tracked.changes.iter().all(|c| matches!(c.change, Change::Added { .. })));

  let snapshot = h.engine.snapshot(&parks(), p.program_id).await.unwrap();
  assert_eq!(snapshot.owner_agency, "Parks");
  assert_eq!(snapshot.outcome_ids.len(), 2);
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn auto_save_starts_in_open_period() {
  let h = harness().await;
  h.engine
    .store()
    .put_period(Period { period_id: PeriodId(4), label: "Q4".into(), status: PeriodStatus::Open })
    .await
    .unwrap();
  let p = program(&h, false).await;

  let input = AutoSave {
    targets: Some(vec![NewTarget::text("Plant trees")]),
    ..Default::default()
  };
  let tracked = h.engine.auto_save(&parks(), p.program_id, input).await.unwrap();
  assert_eq!(tracked.value.submission.period_id, PeriodId(4));
  assert_eq!(tracked.value.targets[0].number.as_deref(), Some("INIT-1.2A.1"));
  assert_eq!(tracked.changes.len(), 1);
}

#[tokio::test]
async fn auto_save_falls_back_to_configured_period() {
  let h = harness_with(EngineConfig { fallback_period_id: PeriodId(7) }).await;
  let p = program(&h, false).await;

  let tracked = h
    .engine
    .auto_save(&parks(), p.program_id, AutoSave::default())
    .await
    .unwrap();
  assert_eq!(tracked.value.submission.period_id, PeriodId(7));
}

#[tokio::test]
async fn auto_save_patches_latest_submission() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .create_draft(&parks(), p.program_id, draft(1, &["Plant trees"]))
    .await
    .unwrap();

  let input = AutoSave {
    fields: SubmissionFields { remarks: Some("Rain delays".into()), ..Default::default() },
    ..Default::default()
  };
  let tracked = h.engine.auto_save(&parks(), p.program_id, input).await.unwrap();
  assert_eq!(tracked.value.submission.fields.remarks.as_deref(), Some("Rain delays"));
  // Targets are kept when none are sent.
  assert_eq!(tracked.value.targets.len(), 1);
  assert_eq!(tracked.changes.len(), 1);
  assert_eq!(tracked.changes[0].field, "remarks");
}

#[tokio::test]
async fn update_rewrites_targets() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .create_draft(&parks(), p.program_id, draft(1, &["A", "B"]))
    .await
    .unwrap();

  let input = SubmissionUpdate {
    fields:  SubmissionFields { rating: Some("on-track".into()), ..Default::default() },
    targets: vec![NewTarget::text("C")],
  };
  let tracked = h
    .engine
    .update_submission(&parks(), p.program_id, PeriodId(1), input)
    .await
    .unwrap();
  assert_eq!(tracked.value.targets.len(), 1);
  assert_eq!(tracked.value.targets[0].text, "C");
  let fields: Vec<_> = tracked.changes.iter().map(|c| c.field.as_str()).collect();
  assert_eq!(fields, ["rating", "targets[0].text", "targets[1]"]);
}

#[tokio::test]
async fn finalized_submissions_are_read_only_until_reopened() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Editor, None)
    .await
    .unwrap();
  let view = h
    .engine
    .create_draft(&water(), p.program_id, draft(1, &["A"]))
    .await
    .unwrap();
  let id = view.submission.submission_id;

  h.engine.finalize(&water(), id).await.unwrap();
  match h.engine.finalize(&water(), id).await {
    Err(Error::Validation(msg)) => assert_eq!(msg, "submission already finalized"),
    other => panic!("expected validation error, got {other:?}"),
  }

  let update = SubmissionUpdate::default();
  let blocked = h
    .engine
    .update_submission(&water(), p.program_id, PeriodId(1), update.clone())
    .await;
  assert!(matches!(blocked, Err(Error::Validation(_))));

  let denied = h.engine.reopen(&water(), id).await;
  assert!(matches!(denied, Err(Error::PermissionDenied(_))));

  let reopened = h.engine.reopen(&parks(), id).await.unwrap();
  assert!(reopened.submission.state.is_draft());
  h.engine
    .update_submission(&water(), p.program_id, PeriodId(1), update)
    .await
    .unwrap();
}

#[tokio::test]
async fn viewers_cannot_write_submissions() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .assign_agency(&parks(), p.program_id, AgencyId(2), AgencyRole::Viewer, None)
    .await
    .unwrap();

  let result = h.engine.create_draft(&water(), p.program_id, draft(1, &[])).await;
  assert!(matches!(result, Err(Error::PermissionDenied(_))));

  let outsider = h
    .engine
    .read_submission(&Actor::member(30, 3), p.program_id, PeriodId(1))
    .await;
  assert!(matches!(outsider, Err(Error::PermissionDenied(_))));
}

#[tokio::test]
async fn legacy_submissions_read_through_adapter() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .store()
    .import_legacy_submission(
      p.program_id,
      PeriodId(2),
      r#"{"target":"Plant 100 trees","status_text":"ongoing"}"#.into(),
      UserId(10),
    )
    .await
    .unwrap();

  let view = h
    .engine
    .read_submission(&parks(), p.program_id, PeriodId(2))
    .await
    .unwrap();
  assert_eq!(view.source, TargetSource::LegacyField);
  assert_eq!(view.targets[0].text, "Plant 100 trees");
  assert_eq!(view.targets[0].status.as_deref(), Some("ongoing"));
}

#[tokio::test]
async fn clearing_legacy_targets_sticks() {
  let h = harness().await;
  let p = program(&h, false).await;
  let imported = h
    .engine
    .store()
    .import_legacy_submission(
      p.program_id,
      PeriodId(1),
      r#"{"targets":[{"target_text":"Old legacy target"}]}"#.into(),
      UserId(10),
    )
    .await
    .unwrap();
  h.engine.reopen(&parks(), imported.submission_id).await.unwrap();

  let input = AutoSave { targets: Some(vec![]), ..Default::default() };
  let tracked = h.engine.auto_save(&parks(), p.program_id, input).await.unwrap();
  assert!(tracked.value.targets.is_empty());
  assert_eq!(tracked.changes.len(), 1);
  assert_eq!(tracked.changes[0].field, "targets[0]");
  assert_eq!(tracked.changes[0].change, Change::Removed { before: "Old legacy target".into() });

  let view = h
    .engine
    .read_submission(&parks(), p.program_id, PeriodId(1))
    .await
    .unwrap();
  assert_eq!(view.source, TargetSource::None);
  assert!(view.targets.is_empty());
}

#[tokio::test]
async fn earlier_period_update_reports_its_own_changes() {
  let h = harness().await;
  let p = program(&h, false).await;
  h.engine
    .create_draft(&parks(), p.program_id, draft(1, &["A"]))
    .await
    .unwrap();
  h.engine
    .create_draft(&parks(), p.program_id, draft(2, &["B"]))
    .await
    .unwrap();

  let input = SubmissionUpdate {
    fields:  SubmissionFields { rating: Some("on-track".into()), ..Default::default() },
    targets: vec![NewTarget::text("A"), NewTarget::text("C")],
  };
  let tracked = h
    .engine
    .update_submission(&parks(), p.program_id, PeriodId(1), input)
    .await
    .unwrap();
  let fields: Vec<_> = tracked.changes.iter().map(|c| c.field.as_str()).collect();
  assert_eq!(fields, ["rating", "targets[1]"]);

  let last = h.audit.entries().pop().unwrap();
  assert_eq!(last.action, "update_submission");
  assert!(last.detail.ends_with("(2 change(s))"), "{}", last.detail);
}

