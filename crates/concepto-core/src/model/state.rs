use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keyed shared state threaded through a compilation run
///
/// Used both for the process-wide scope and for per-branch scope. Values
/// are plain JSON so that state deltas can be persisted with cached
/// bundles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMap(BTreeMap<String, Value>);

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overwrite entries with those of `other`
    pub fn merge(&mut self, other: &StateMap) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Return a copy of `self` with `other` merged on top
    pub fn merged(&self, other: &StateMap) -> StateMap {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Entries that are new or changed relative to `before`
    ///
    /// Removals are not tracked; state only ever grows or is overwritten
    /// during a run.
    pub fn diff(&self, before: &StateMap) -> StateMap {
        StateMap(
            self.0
                .iter()
                .filter(|(k, v)| before.0.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        StateMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Read-only view of shared state handed to a command handler
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
    /// State inherited from the enclosing branch
    pub branch: &'a StateMap,
    /// Process-wide state for the whole run
    pub global: &'a StateMap,
}

impl<'a> ExecContext<'a> {
    pub fn new(branch: &'a StateMap, global: &'a StateMap) -> Self {
        Self { branch, global }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_reports_new_and_changed_entries() {
        let before: StateMap = [("a", json!(1)), ("b", json!("x"))].into_iter().collect();
        let mut after = before.clone();
        after.insert("b", "y").insert("c", true);

        let delta = after.diff(&before);
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.get_str("b"), Some("y"));
        assert_eq!(delta.get("c"), Some(&json!(true)));
        assert!(!delta.contains_key("a"));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base: StateMap = [("k", "old")].into_iter().collect();
        let top: StateMap = [("k", "new")].into_iter().collect();
        base.merge(&top);
        assert_eq!(base.get_str("k"), Some("new"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let state: StateMap = [("page", "home")].into_iter().collect();
        let text = serde_json::to_string(&state).unwrap();
        assert_eq!(text, r#"{"page":"home"}"#);
    }
}
