//! Hierarchical program and target numbering.
//!
//! Program numbers look like `<initiative>.<suffix>` (`INIT-1.2A`); target
//! numbers append a one-based ordinal to the program number (`INIT-1.2A.3`).

use crate::{Error, Result, submission::NewTarget};

pub const MAX_NUMBER_LEN: usize = 20;

/// Validate a program number against the number of its initiative.
///
/// Rules, in order: only ASCII letters, digits and dots after the
/// initiative prefix; the number starts with `initiative + "."`; a
/// non-empty alphanumeric suffix follows; at most [`MAX_NUMBER_LEN`]
/// characters in total. An empty number is always valid.
pub fn validate(number: &str, initiative_number: Option<&str>) -> Result<()> {
  if number.is_empty() {
    return Ok(());
  }

  // The initiative prefix is matched literally, so it may contain
  // characters (e.g. hyphens) the suffix may not.
  let body = initiative_number
    .and_then(|prefix| number.strip_prefix(prefix))
    .unwrap_or(number);
  if let Some(bad) = body.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '.')) {
    return Err(Error::Validation(format!(
      "number {number:?} contains invalid character {bad:?}; only letters, digits and dots are allowed"
    )));
  }

  if let Some(prefix) = initiative_number {
    let Some(suffix) = number.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('.'))
    else {
      return Err(Error::Validation(format!(
        "number {number:?} must start with \"{prefix}.\""
      )));
    };
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(Error::Validation(format!(
        "number {number:?} needs a letter or digit suffix after \"{prefix}.\""
      )));
    }
  }

  if number.len() > MAX_NUMBER_LEN {
    return Err(Error::Validation(format!(
      "number {number:?} is longer than {MAX_NUMBER_LEN} characters"
    )));
  }

  Ok(())
}

/// Number for the target at zero-based `position`.
pub fn target_number(program_number: &str, position: usize) -> String {
  format!("{program_number}.{}", position + 1)
}

/// Give every target without an explicit number one derived from its
/// position. Targets are left unnumbered when the program has no number.
pub fn fill_target_numbers(program_number: Option<&str>, targets: &mut [NewTarget]) {
  let Some(program_number) = program_number.filter(|n| !n.trim().is_empty()) else {
    return;
  };
  for (position, target) in targets.iter_mut().enumerate() {
    let missing = target
      .target_number
      .as_deref()
      .is_none_or(|n| n.trim().is_empty());
    if missing {
      target.target_number = Some(target_number(program_number, position));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn invalid(number: &str, initiative: Option<&str>) -> bool {
    matches!(validate(number, initiative), Err(Error::Validation(_)))
  }

  #[test]
  fn accepts_prefixed_alphanumeric_suffix() {
    assert!(validate("INIT-1.2A", Some("INIT-1")).is_ok());
    assert!(validate("7.12", Some("7")).is_ok());
  }

  #[test]
  fn empty_is_valid() {
    assert!(validate("", Some("INIT-1")).is_ok());
    assert!(validate("", None).is_ok());
  }

  #[test]
  fn rejects_missing_suffix() {
    assert!(invalid("INIT-1", Some("INIT-1")));
    assert!(invalid("INIT-1.", Some("INIT-1")));
  }

  #[test]
  fn rejects_wrong_prefix() {
    assert!(invalid("INIT-2.1", Some("INIT-1")));
    assert!(invalid("INIT-11.1", Some("INIT-1")));
  }

  #[test]
  fn rejects_bad_characters() {
    assert!(invalid("INIT-1.2-A", Some("INIT-1")));
    assert!(invalid("7.1 b", Some("7")));
    assert!(invalid("A_1", None));
  }

  #[test]
  fn rejects_nested_suffix() {
    assert!(invalid("7.1.2", Some("7")));
  }

  #[test]
  fn rejects_overlong_numbers() {
    assert!(invalid("7.ABCDEFGHIJKLMNOPQRS", Some("7")));
    assert!(validate("7.ABCDEFGHIJKLMNOPQR", Some("7")).is_ok());
  }

  #[test]
  fn fills_only_missing_target_numbers() {
    let mut targets = vec![
      NewTarget::text("Plant trees"),
      NewTarget { target_number: Some("X.9".into()), ..NewTarget::text("Keep") },
      NewTarget { target_number: Some("  ".into()), ..NewTarget::text("Blank") },
    ];
    fill_target_numbers(Some("7.2"), &mut targets);
    let numbers: Vec<_> = targets.iter().map(|t| t.target_number.as_deref()).collect();
    assert_eq!(numbers, [Some("7.2.1"), Some("X.9"), Some("7.2.3")]);
  }

  #[test]
  fn no_program_number_leaves_targets_unnumbered() {
    let mut targets = vec![NewTarget::text("Plant trees")];
    fill_target_numbers(None, &mut targets);
    assert_eq!(targets[0].target_number, None);
  }
}
