//! The command-class descriptor table (spec §4.1, §9 "Dynamic dispatch
//! of CLI classes"): for each [`CommandClass`], the argv prefix handed
//! to the configured CLI binary, the allow-rule for every positional
//! argument past that prefix, and the rate-limit bucket key. This is
//! the one place a new command class gets wired up; `executor::mod`
//! never special-cases a class by name.

use validations::ArgRule;
use wharf_client::entities::execution::CommandClass;

/// A catalog entry name, container/runtime id, or similar opaque
/// identifier token. Deliberately permissive (covers short slugs,
/// docker's 64-char hex ids, and uuids) while still excluding anything
/// a shell would treat specially.
const ID_PATTERN: &str = r"[a-zA-Z0-9][a-zA-Z0-9_.:-]{0,127}";
const NAME_PATTERN: &str = r"[a-zA-Z0-9][a-zA-Z0-9_-]{0,63}";
const LIFECYCLE_ACTIONS: &[&str] = &[
  "start", "stop", "restart", "pause", "unpause", "kill", "remove",
];

pub struct ClassDescriptor {
  /// Argv tokens prepended before the request's own `args`, e.g.
  /// `["server", "inspect"]`.
  pub cli_args_prefix: &'static [&'static str],
  /// Allow-rule for each positional argument, in order.
  pub arg_rules: &'static [ArgRule],
  /// If set, any args past `arg_rules` are validated against this rule
  /// instead of being rejected outright (e.g. trailing `exec` argv).
  pub variadic_tail_rule: Option<ArgRule>,
  /// Key into the per-`(user, class)` token bucket.
  pub rate_bucket: &'static str,
  /// If true, the request must set `json_output`; the class's output
  /// is only meaningful to callers as structured data.
  pub requires_json: bool,
}

pub fn descriptor(class: CommandClass) -> ClassDescriptor {
  match class {
    CommandClass::ServerList => ClassDescriptor {
      cli_args_prefix: &["server", "list"],
      arg_rules: &[],
      variadic_tail_rule: None,
      rate_bucket: "server.list",
      requires_json: false,
    },
    CommandClass::ServerInspect => ClassDescriptor {
      cli_args_prefix: &["server", "inspect"],
      arg_rules: &[ArgRule::Pattern(NAME_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "server.inspect",
      requires_json: false,
    },
    CommandClass::ServerEnable => ClassDescriptor {
      cli_args_prefix: &["server", "enable"],
      arg_rules: &[ArgRule::Pattern(NAME_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "server.enable",
      requires_json: false,
    },
    CommandClass::ServerDisable => ClassDescriptor {
      cli_args_prefix: &["server", "disable"],
      arg_rules: &[ArgRule::Pattern(NAME_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "server.disable",
      requires_json: false,
    },
    CommandClass::CatalogShow => ClassDescriptor {
      cli_args_prefix: &["catalog", "show"],
      arg_rules: &[ArgRule::Pattern(ID_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "catalog.show",
      requires_json: false,
    },
    CommandClass::ConfigRead => ClassDescriptor {
      cli_args_prefix: &["config", "read"],
      arg_rules: &[],
      variadic_tail_rule: None,
      rate_bucket: "config.read",
      requires_json: true,
    },
    CommandClass::ConfigWrite => ClassDescriptor {
      cli_args_prefix: &["config", "write"],
      arg_rules: &[],
      // the patch document travels as stdin (`request.input`), not argv.
      variadic_tail_rule: None,
      rate_bucket: "config.write",
      requires_json: true,
    },
    CommandClass::ContainerCreate => ClassDescriptor {
      cli_args_prefix: &["container", "create"],
      arg_rules: &[ArgRule::Pattern(NAME_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "container.create",
      requires_json: false,
    },
    CommandClass::ContainerAction => ClassDescriptor {
      cli_args_prefix: &["container", "action"],
      arg_rules: &[
        ArgRule::Pattern(ID_PATTERN),
        ArgRule::Enum(LIFECYCLE_ACTIONS),
      ],
      variadic_tail_rule: None,
      rate_bucket: "container.action",
      requires_json: false,
    },
    CommandClass::ContainerLogs => ClassDescriptor {
      cli_args_prefix: &["container", "logs"],
      arg_rules: &[ArgRule::Pattern(ID_PATTERN)],
      // since/tail/follow flags, if present, are passed through as
      // plain trailing args rather than getting dedicated slots.
      variadic_tail_rule: Some(ArgRule::Free),
      rate_bucket: "container.logs",
      requires_json: false,
    },
    CommandClass::ContainerStats => ClassDescriptor {
      cli_args_prefix: &["container", "stats"],
      arg_rules: &[ArgRule::Pattern(ID_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "container.stats",
      // the stats-string-parsing Open Question is resolved by never
      // guessing at the human-formatted form: callers always get the
      // CLI's JSON output back.
      requires_json: true,
    },
    CommandClass::ContainerExec => ClassDescriptor {
      cli_args_prefix: &["container", "exec"],
      arg_rules: &[ArgRule::Pattern(ID_PATTERN)],
      variadic_tail_rule: Some(ArgRule::Free),
      rate_bucket: "container.exec",
      requires_json: false,
    },
    CommandClass::GatewayRun => ClassDescriptor {
      cli_args_prefix: &["gateway", "run"],
      arg_rules: &[],
      variadic_tail_rule: None,
      rate_bucket: "gateway.run",
      requires_json: false,
    },
    CommandClass::GatewayStop => ClassDescriptor {
      cli_args_prefix: &["gateway", "stop"],
      arg_rules: &[],
      variadic_tail_rule: None,
      rate_bucket: "gateway.stop",
      requires_json: false,
    },
    CommandClass::GatewayStatus => ClassDescriptor {
      cli_args_prefix: &["gateway", "status"],
      arg_rules: &[],
      variadic_tail_rule: None,
      rate_bucket: "gateway.status",
      requires_json: false,
    },
    CommandClass::DockerInspect => ClassDescriptor {
      cli_args_prefix: &["docker", "inspect"],
      arg_rules: &[ArgRule::Pattern(ID_PATTERN)],
      variadic_tail_rule: None,
      rate_bucket: "docker.inspect",
      requires_json: false,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_class_has_a_nonempty_cli_prefix() {
    use strum::IntoEnumIterator;
    for class in CommandClass::iter() {
      assert!(!descriptor(class).cli_args_prefix.is_empty());
    }
  }
}
