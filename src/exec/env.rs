//! Child environment construction

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;

/// Environment handed to a child process, keyed by variable name
pub type Environment = BTreeMap<OsString, OsString>;

/// Snapshot of the agent's own environment
pub fn ambient_environment() -> Environment {
    std::env::vars_os().collect()
}

/// Whether `name` can be passed to a child as a variable name.
///
/// Empty names and names containing `=` or NUL can't be represented in an
/// `envp` entry; `A=B` would silently set `A` instead.
pub fn is_valid_env_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['=', '\0'])
}

/// Merge per-request overrides onto a base environment.
///
/// Overrides win on collision; every other base variable is kept. Neither
/// input is modified.
pub fn build_environment(base: &Environment, overrides: &HashMap<String, String>) -> Environment {
    let mut merged = base.clone();
    merged.extend(
        overrides
            .iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value))),
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    #[test]
    fn test_override_wins_and_base_survives() {
        let base = env(&[("PATH", "/usr/bin"), ("HOME", "/root")]);
        let overrides = HashMap::from([
            ("HOME".to_string(), "/work".to_string()),
            ("LANG".to_string(), "C.UTF-8".to_string()),
        ]);

        let merged = build_environment(&base, &overrides);

        assert_eq!(merged, env(&[("PATH", "/usr/bin"), ("HOME", "/work"), ("LANG", "C.UTF-8")]));
        // base is untouched
        assert_eq!(base.get(&OsString::from("HOME")), Some(&OsString::from("/root")));
    }

    #[test]
    fn test_env_name_validation() {
        assert!(is_valid_env_name("PATH"));
        assert!(is_valid_env_name("lower_case.dots-ok"));
        assert!(!is_valid_env_name(""));
        assert!(!is_valid_env_name("A=B"));
        assert!(!is_valid_env_name("=A"));
        assert!(!is_valid_env_name("A\0B"));
    }

    #[test]
    fn test_no_overrides_is_identity() {
        let base = env(&[("A", "1")]);
        assert_eq!(build_environment(&base, &HashMap::new()), base);
    }

    #[test]
    fn test_ambient_snapshot_matches_process() {
        let ambient = ambient_environment();
        for (key, value) in std::env::vars_os() {
            assert_eq!(ambient.get(&key), Some(&value));
        }
    }
}
