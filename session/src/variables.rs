use std::collections::HashMap;

use common::row::Value;

/// Scope a variable reference was written in. `@@global.x`, `@@session.x`,
/// `@@local.x`, and bare `@@x` all resolve to session scope for our
/// single-process server; `@x` is a user-defined variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    System,
    User,
}

/// Strips the `@@global.`/`@@session.`/`@@local.`/`@@`/`@` prefix from a
/// variable reference and lowercases the remaining name, the way MySQL
/// variable lookups are case-insensitive.
pub fn normalize_variable_name(raw: &str) -> (VariableScope, String) {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("@@") {
        let rest = rest
            .strip_prefix("global.")
            .or_else(|| rest.strip_prefix("session."))
            .or_else(|| rest.strip_prefix("local."))
            .unwrap_or(rest);
        (VariableScope::System, rest.to_ascii_lowercase())
    } else if let Some(rest) = trimmed.strip_prefix('@') {
        (VariableScope::User, rest.to_ascii_lowercase())
    } else {
        (VariableScope::System, trimmed.to_ascii_lowercase())
    }
}

/// Holds a session's system and user variables. System variables start out
/// backed by process-wide defaults and may be overridden per session with
/// `SET`; user variables (`@x`) are always session-local.
#[derive(Debug, Clone, Default)]
pub struct VariableBag {
    system_defaults: HashMap<String, Value>,
    system_overrides: HashMap<String, Value>,
    user_variables: HashMap<String, Value>,
}

impl VariableBag {
    pub fn with_defaults(system_defaults: HashMap<String, Value>) -> Self {
        Self {
            system_defaults,
            system_overrides: HashMap::new(),
            user_variables: HashMap::new(),
        }
    }

    /// Parses `raw_name` for scope/prefix and stores `value` accordingly.
    pub fn set_variable(&mut self, raw_name: &str, value: Value) {
        let (scope, name) = normalize_variable_name(raw_name);
        match scope {
            VariableScope::System => {
                self.system_overrides.insert(name, value);
            }
            VariableScope::User => {
                self.user_variables.insert(name, value);
            }
        }
    }

    pub fn get(&self, raw_name: &str) -> Option<&Value> {
        let (scope, name) = normalize_variable_name(raw_name);
        match scope {
            VariableScope::System => self
                .system_overrides
                .get(&name)
                .or_else(|| self.system_defaults.get(&name)),
            VariableScope::User => self.user_variables.get(&name),
        }
    }

    /// Returns every system variable name/value visible to this session:
    /// process-wide defaults merged with this session's overrides, with
    /// overrides winning on name collision.
    pub fn get_all_variables(&self) -> HashMap<String, Value> {
        let mut merged = self.system_defaults.clone();
        for (k, v) in &self.system_overrides {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_known_prefixes_and_lowercases() {
        assert_eq!(
            normalize_variable_name("@@GLOBAL.Autocommit"),
            (VariableScope::System, "autocommit".to_string())
        );
        assert_eq!(
            normalize_variable_name("@@session.sql_mode"),
            (VariableScope::System, "sql_mode".to_string())
        );
        assert_eq!(
            normalize_variable_name("@@local.max_allowed_packet"),
            (VariableScope::System, "max_allowed_packet".to_string())
        );
        assert_eq!(
            normalize_variable_name("@@Wait_timeout"),
            (VariableScope::System, "wait_timeout".to_string())
        );
        assert_eq!(
            normalize_variable_name("@MyVar"),
            (VariableScope::User, "myvar".to_string())
        );
    }

    #[test]
    fn override_wins_over_default_in_merge() {
        let mut defaults = HashMap::new();
        defaults.insert("autocommit".to_string(), Value::Int(1));
        let mut bag = VariableBag::with_defaults(defaults);
        bag.set_variable("@@session.autocommit", Value::Int(0));
        let merged = bag.get_all_variables();
        assert_eq!(merged.get("autocommit"), Some(&Value::Int(0)));
    }

    #[test]
    fn user_variables_are_session_local_and_separate_from_system() {
        let mut bag = VariableBag::default();
        bag.set_variable("@x", Value::Int(5));
        assert_eq!(bag.get("@x"), Some(&Value::Int(5)));
        assert_eq!(bag.get("@@x"), None);
    }
}
