//! Snapshot diffing for the change history shown next to audit entries.
//!
//! Output order is fixed: scalar fields in declaration order, then outcome
//! links, then targets by index.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{legacy::TargetView, snapshot::Snapshot};

/// Placeholder rendered for an empty value.
pub const EMPTY: &str = "(empty)";

/// What happened to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change_type", rename_all = "lowercase")]
pub enum Change {
  Added { after: String },
  Removed { before: String },
  Modified { before: String, after: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
  /// Machine name, e.g. `name` or `targets[1].status`.
  pub field:  String,
  /// Human label, e.g. `Program Name`.
  pub label:  String,
  #[serde(flatten)]
  pub change: Change,
}

impl ChangeRecord {
  pub fn before(&self) -> &str {
    match &self.change {
      Change::Added { .. } => EMPTY,
      Change::Removed { before } | Change::Modified { before, .. } => before,
    }
  }

  pub fn after(&self) -> &str {
    match &self.change {
      Change::Removed { .. } => EMPTY,
      Change::Added { after } | Change::Modified { after, .. } => after,
    }
  }
}

#[derive(Clone, Copy)]
enum Kind {
  Text,
  Date,
}

/// Scalar fields in output order: (field, label, kind, value).
fn scalars(s: &Snapshot) -> [(&'static str, &'static str, Kind, Option<&str>); 9] {
  [
    ("name", "Program Name", Kind::Text, Some(s.name.as_str())),
    ("number", "Program Number", Kind::Text, s.number.as_deref()),
    ("description", "Description", Kind::Text, s.description.as_deref()),
    ("owner_agency", "Owning Agency", Kind::Text, Some(s.owner_agency.as_str())),
    ("start_date", "Start Date", Kind::Date, s.start_date.as_deref()),
    ("end_date", "End Date", Kind::Date, s.end_date.as_deref()),
    ("rating", "Rating", Kind::Text, s.rating.as_deref()),
    (
      "submission_description",
      "Progress Description",
      Kind::Text,
      s.submission_description.as_deref(),
    ),
    ("remarks", "Remarks", Kind::Text, s.remarks.as_deref()),
  ]
}

/// Compute the changes between two snapshots. `diff(s, s)` is always empty.
///
/// Targets are matched by position, not identity: inserting or removing a
/// target mid-list shows up as modifications of every later slot. This
/// keeps the records comparable with the existing audit history.
pub fn diff(before: &Snapshot, after: &Snapshot) -> Vec<ChangeRecord> {
  let mut changes = Vec::new();

  for ((field, label, kind, old), (_, _, _, new)) in
    scalars(before).into_iter().zip(scalars(after))
  {
    if let Some(change) = compare(normalize(old, kind), normalize(new, kind)) {
      changes.push(record(field, label, change));
    }
  }

  diff_outcomes(before, after, &mut changes);
  diff_targets(&before.targets, &after.targets, &mut changes);
  changes
}

fn diff_outcomes(before: &Snapshot, after: &Snapshot, out: &mut Vec<ChangeRecord>) {
  let old: BTreeSet<_> = before.outcome_ids.iter().copied().collect();
  let new: BTreeSet<_> = after.outcome_ids.iter().copied().collect();

  for id in old.union(&new) {
    let change = match (old.contains(id), new.contains(id)) {
      (true, false) => Change::Removed { before: id.to_string() },
      (false, true) => Change::Added { after: id.to_string() },
      _ => continue,
    };
    out.push(record("outcomes", "Linked Outcome", change));
  }
}

fn diff_targets(before: &[TargetView], after: &[TargetView], out: &mut Vec<ChangeRecord>) {
  for i in 0..before.len().max(after.len()) {
    let label = format!("Target {}", i + 1);
    match (before.get(i), after.get(i)) {
      (Some(old), None) => {
        out.push(record(&format!("targets[{i}]"), &label, Change::Removed {
          before: render_target(old),
        }));
      }
      (None, Some(new)) => {
        out.push(record(&format!("targets[{i}]"), &label, Change::Added {
          after: render_target(new),
        }));
      }
      (Some(old), Some(new)) => {
        if let Some(change) = compare(clean(Some(&old.text)), clean(Some(&new.text))) {
          out.push(record(&format!("targets[{i}].text"), &label, change));
        }
        if let Some(change) =
          compare(clean(old.status.as_deref()), clean(new.status.as_deref()))
        {
          out.push(record(
            &format!("targets[{i}].status"),
            &format!("{label} Status"),
            change,
          ));
        }
      }
      (None, None) => {}
    }
  }
}

fn record(field: &str, label: &str, change: Change) -> ChangeRecord {
  ChangeRecord { field: field.to_owned(), label: label.to_owned(), change }
}

fn compare(old: Option<String>, new: Option<String>) -> Option<Change> {
  match (old, new) {
    (None, None) => None,
    (None, Some(after)) => Some(Change::Added { after }),
    (Some(before), None) => Some(Change::Removed { before }),
    (Some(before), Some(after)) if before == after => None,
    (Some(before), Some(after)) => Some(Change::Modified { before, after }),
  }
}

fn render_target(target: &TargetView) -> String {
  let text = target.text.trim();
  let text = if text.is_empty() { EMPTY } else { text };
  match clean(target.status.as_deref()) {
    Some(status) => format!("{text} [{status}]"),
    None => text.to_owned(),
  }
}

fn normalize(value: Option<&str>, kind: Kind) -> Option<String> {
  let value = clean(value)?;
  match kind {
    Kind::Text => Some(value),
    Kind::Date => Some(normalize_date(&value)),
  }
}

/// Trimmed value, or `None` when blank.
fn clean(value: Option<&str>) -> Option<String> {
  value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Render a date as `YYYY-MM-DD`. Values that do not parse as a date are
/// compared verbatim.
pub fn normalize_date(value: &str) -> String {
  let value = value.trim();
  if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
    return d.format("%Y-%m-%d").to_string();
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
    return dt.date_naive().format("%Y-%m-%d").to_string();
  }
  for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
      return dt.date().format("%Y-%m-%d").to_string();
    }
  }
  value.to_owned()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::directory::OutcomeId;

  fn target(text: &str, status: Option<&str>) -> TargetView {
    TargetView { number: None, text: text.into(), status: status.map(str::to_owned) }
  }

  fn snapshot() -> Snapshot {
    Snapshot {
      name: "Urban canopy".into(),
      number: Some("7.2".into()),
      owner_agency: "Parks Department".into(),
      start_date: Some("2026-01-01".into()),
      rating: Some("on-track".into()),
      outcome_ids: vec![OutcomeId(3), OutcomeId(5)],
      targets: vec![target("Plant 50 trees", Some("halfway"))],
      ..Snapshot::default()
    }
  }

  #[test]
  fn identical_snapshots_have_no_changes() {
    let s = snapshot();
    assert!(diff(&s, &s).is_empty());
    assert!(diff(&Snapshot::default(), &Snapshot::default()).is_empty());
  }

  #[test]
  fn appended_target_is_one_added_record() {
    let before = snapshot();
    let mut after = snapshot();
    after.targets.push(target("Train 10 staff", None));

    let changes = diff(&before, &after);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "targets[1]");
    assert_eq!(changes[0].change, Change::Added { after: "Train 10 staff".into() });
    assert_eq!(changes[0].before(), EMPTY);
  }

  #[test]
  fn whitespace_and_date_format_are_not_changes() {
    let before = snapshot();
    let mut after = snapshot();
    after.name = "  Urban canopy ".into();
    after.start_date = Some("2026-01-01 00:00:00".into());
    assert!(diff(&before, &after).is_empty());

    after.start_date = Some("2026-01-01T09:30:00+02:00".into());
    assert!(diff(&before, &after).is_empty());
  }

  #[test]
  fn scalar_changes_use_placeholders_and_order() {
    let before = snapshot();
    let mut after = snapshot();
    after.rating = None;
    after.description = Some("Expanded scope".into());
    after.name = "Urban forest".into();

    let changes = diff(&before, &after);
    let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(fields, ["name", "description", "rating"]);
    assert_eq!(changes[1].before(), EMPTY);
    assert_eq!(changes[2].after(), EMPTY);
    assert!(matches!(changes[0].change, Change::Modified { .. }));
  }

  #[test]
  fn outcomes_compare_as_sets() {
    let before = snapshot();
    let mut after = snapshot();
    after.outcome_ids = vec![OutcomeId(5), OutcomeId(9), OutcomeId(5)];

    let changes = diff(&before, &after);
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].change, Change::Removed { before: "3".into() });
    assert_eq!(changes[1].change, Change::Added { after: "9".into() });
    assert!(changes.iter().all(|c| c.field == "outcomes"));
  }

  #[test]
  fn target_text_and_status_compare_independently() {
    let before = snapshot();
    let mut after = snapshot();
    after.targets[0].status = Some("done".into());

    let changes = diff(&before, &after);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "targets[0].status");
    assert_eq!(changes[0].label, "Target 1 Status");
  }

  #[test]
  fn positional_matching_misattributes_mid_list_insertions() {
    let mut before = snapshot();
    before.targets.push(target("Train 10 staff", None));
    let mut after = before.clone();
    after.targets.insert(0, target("Survey sites", None));

    let fields: Vec<_> = diff(&before, &after).into_iter().map(|c| c.field).collect();
    assert_eq!(fields, [
      "targets[0].text",
      "targets[0].status",
      "targets[1].text",
      "targets[1].status",
      "targets[2]",
    ]);
  }

  #[test]
  fn records_serialise_with_change_type_tag() {
    let before = snapshot();
    let mut after = snapshot();
    after.name = "Urban forest".into();
    let json = serde_json::to_value(&diff(&before, &after)[0]).unwrap();
    assert_eq!(json["change_type"], "modified");
    assert_eq!(json["before"], "Urban canopy");
    assert_eq!(json["after"], "Urban forest");
    assert_eq!(json["label"], "Program Name");
  }
}
