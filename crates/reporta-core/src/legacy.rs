//! Read-time normalisation of the two submission storage generations.
//!
//! Current submissions keep their targets as rows. Older ones carry a
//! `content_json` blob, either with a `targets` array or, older still, with
//! a single `target` / `status_text` pair. [`canonicalize`] maps every
//! generation onto one [`SubmissionView`]; nothing else in the workspace
//! branches on storage shape.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::submission::{StoredSubmission, Submission};

/// One target as presented to readers, whatever its storage generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetView {
  pub number: Option<String>,
  pub text:   String,
  pub status: Option<String>,
}

/// Where the targets of a [`SubmissionView`] were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetSource {
  Rows,
  ContentJson,
  LegacyField,
  None,
}

/// Canonical in-memory submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionView {
  pub submission: Submission,
  pub targets:    Vec<TargetView>,
  pub source:     TargetSource,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyContent {
  #[serde(default)]
  targets:     Option<Vec<LegacyTarget>>,
  #[serde(default)]
  target:      Option<String>,
  #[serde(default)]
  status_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyTarget {
  #[serde(default)]
  target_number: Option<String>,
  #[serde(default, alias = "text")]
  target_text:   Option<String>,
  #[serde(default, alias = "status", alias = "target_status")]
  status_description: Option<String>,
}

/// Normalise a stored submission. Row targets win; otherwise the
/// `content_json` targets array; otherwise the single legacy field.
pub fn canonicalize(stored: StoredSubmission) -> SubmissionView {
  let StoredSubmission { submission, mut targets } = stored;

  if !targets.is_empty() {
    targets.sort_by_key(|t| t.position);
    let targets = targets
      .into_iter()
      .map(|t| TargetView { number: t.target_number, text: t.text, status: t.status })
      .collect();
    return SubmissionView { submission, targets, source: TargetSource::Rows };
  }

  let content = submission
    .content_json
    .as_deref()
    .filter(|raw| !raw.trim().is_empty())
    .map(parse_content);

  let (targets, source) = match content {
    Some(content) => from_content(content),
    None => (Vec::new(), TargetSource::None),
  };

  SubmissionView { submission, targets, source }
}

fn parse_content(raw: &str) -> LegacyContent {
  serde_json::from_str(raw).unwrap_or_else(|e| {
    tracing::warn!(error = %e, "unreadable legacy submission content; treating as empty");
    LegacyContent::default()
  })
}

fn from_content(content: LegacyContent) -> (Vec<TargetView>, TargetSource) {
  if let Some(list) = content.targets.filter(|l| !l.is_empty()) {
    let targets = list
      .into_iter()
      .map(|t| TargetView {
        number: non_blank(t.target_number),
        text:   t.target_text.unwrap_or_default(),
        status: non_blank(t.status_description),
      })
      .collect();
    return (targets, TargetSource::ContentJson);
  }

  let text = non_blank(content.target);
  let status = non_blank(content.status_text);
  if text.is_none() && status.is_none() {
    return (Vec::new(), TargetSource::None);
  }
  let view = TargetView { number: None, text: text.unwrap_or_default(), status };
  (vec![view], TargetSource::LegacyField)
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}
