//! Validation of individual argv slots headed for a subprocess spawn.
//!
//! The executor (see `wharf_core::executor`) never builds a shell
//! command line — arguments always land in an argv array. This module
//! is the last line of defense before that happens: every argument is
//! checked against the allow-rule declared by its command class before
//! the executor is permitted to spawn.

use std::sync::OnceLock;

use anyhow::anyhow;
use regex::Regex;

/// The allow-rule for a single argv slot, as declared by a command
/// class descriptor.
#[derive(Debug, Clone)]
pub enum ArgRule {
  /// Value must exactly equal one of the given choices.
  Enum(&'static [&'static str]),
  /// Value must match the given regex in full. Patterns are
  /// authored by the command-class table, never by caller input, so
  /// wildcards that would admit shell metacharacters are a
  /// programmer error rather than a runtime concern — still checked
  /// defensively in `validate_pattern_rule`.
  Pattern(&'static str),
  /// Free text, passed through the argv vector untouched. Still
  /// rejected if it contains a shell metacharacter, since the only
  /// legitimate use of `Free` is for values a shell would never see
  /// (the process never goes through a shell at all) but operators
  /// may still be relying on the absence of metacharacters elsewhere
  /// (e.g. log parsing downstream).
  Free,
}

/// Characters that would carry meaning if (mis)interpreted by a
/// shell. The executor never invokes a shell, but this is the
/// boundary check spec.md's testable property 1 is stated against,
/// so it is enforced regardless of transport.
const SHELL_METACHARACTERS: &[char] = &[
  ';', '&', '|', '`', '$', '(', ')', '<', '>', '\n', '\r', '\\', '"',
  '\'', '*', '?', '~', '{', '}',
];

pub fn contains_shell_metacharacter(value: &str) -> bool {
  value.chars().any(|c| SHELL_METACHARACTERS.contains(&c))
}

/// Validates one argv slot against its declared rule.
///
/// `field` is used only to build the error message (e.g. `args[0]`).
pub fn validate_arg(
  field: &str,
  value: &str,
  rule: &ArgRule,
) -> anyhow::Result<()> {
  match rule {
    ArgRule::Enum(choices) => {
      if choices.contains(&value) {
        Ok(())
      } else {
        Err(anyhow!(
          "{field}: {value:?} is not one of the allowed values {choices:?}"
        ))
      }
    }
    ArgRule::Pattern(pattern) => validate_pattern_rule(field, value, pattern),
    ArgRule::Free => {
      if contains_shell_metacharacter(value) {
        Err(anyhow!(
          "{field}: {value:?} contains a disallowed shell metacharacter"
        ))
      } else {
        Ok(())
      }
    }
  }
}

fn validate_pattern_rule(
  field: &str,
  value: &str,
  pattern: &str,
) -> anyhow::Result<()> {
  static COMPILED: OnceLock<std::sync::Mutex<std::collections::HashMap<String, Regex>>> =
    OnceLock::new();
  let cache = COMPILED.get_or_init(Default::default);
  let regex = {
    let mut cache = cache.lock().unwrap();
    if let Some(regex) = cache.get(pattern) {
      regex.clone()
    } else {
      let regex = Regex::new(&format!("^(?:{pattern})$"))
        .unwrap_or_else(|e| {
          panic!("invalid argument allow-pattern {pattern:?}: {e}")
        });
      cache.insert(pattern.to_string(), regex.clone());
      regex
    }
  };
  if !regex.is_match(value) {
    return Err(anyhow!(
      "{field}: {value:?} does not match required pattern {pattern:?}"
    ));
  }
  // Defense in depth: even a matching pattern must never admit a
  // shell metacharacter unless the class explicitly needs one (none
  // currently do).
  if contains_shell_metacharacter(value) {
    return Err(anyhow!(
      "{field}: {value:?} contains a disallowed shell metacharacter"
    ));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn enum_rule_accepts_listed_values() {
    let rule = ArgRule::Enum(&["start", "stop"]);
    assert!(validate_arg("args[0]", "start", &rule).is_ok());
    assert!(validate_arg("args[0]", "restart", &rule).is_err());
  }

  #[test]
  fn pattern_rule_rejects_shell_metacharacters() {
    let rule = ArgRule::Pattern(r"[a-zA-Z0-9_-]+");
    assert!(validate_arg("args[0]", "alpha", &rule).is_ok());
    assert!(
      validate_arg("args[0]", "alpha; rm -rf /", &rule).is_err()
    );
  }

  #[test]
  fn free_rule_rejects_metacharacters_only() {
    let rule = ArgRule::Free;
    assert!(validate_arg("args[0]", "hello world", &rule).is_ok());
    assert!(validate_arg("args[0]", "hello`whoami`", &rule).is_err());
  }

  #[test]
  fn pattern_is_anchored_full_match() {
    let rule = ArgRule::Pattern(r"[a-z]+");
    // Without full-match anchoring this would incorrectly pass by
    // matching only a prefix.
    assert!(validate_arg("args[0]", "abc123", &rule).is_err());
  }
}
