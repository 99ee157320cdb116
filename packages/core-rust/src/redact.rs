//! Key-based redaction of structured values.
//!
//! Matching is on object keys only, never on values: a key is sensitive if
//! it contains any configured fragment, compared case-insensitively. The
//! whole value under a sensitive key is replaced with [`REDACTION_MARKER`],
//! whatever its type.

use serde_json::{Map, Value};

/// Replacement for values under sensitive keys.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Replacement for subtrees nested deeper than [`MAX_DEPTH`].
pub const DEPTH_MARKER: &str = "[MAX_DEPTH]";

/// Nesting depth beyond which values are no longer walked.
pub const MAX_DEPTH: usize = 128;

/// Sensitive key fragments used when none are configured.
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "apiKey"];

/// Stateless ruleset of case-insensitive key fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redactor {
    fragments: Vec<String>,
}

impl Redactor {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fragments: fragments
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.fragments.iter().any(|f| key.contains(f.as_str()))
    }

    /// Returns a sanitized copy of `value`. The input is never modified.
    #[must_use]
    pub fn redact(&self, value: &Value) -> Value {
        self.walk(value, 0)
    }

    fn walk(&self, value: &Value, depth: usize) -> Value {
        if depth >= MAX_DEPTH {
            return Value::String(DEPTH_MARKER.to_string());
        }
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, inner) in map {
                    let replaced = if self.is_sensitive(key) {
                        Value::String(REDACTION_MARKER.to_string())
                    } else {
                        self.walk(inner, depth + 1)
                    };
                    out.insert(key.clone(), replaced);
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.walk(v, depth + 1)).collect())
            }
            scalar => scalar.clone(),
        }
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_FIELDS)
    }
}

/// Redacts `value` against `fields` in one call.
#[must_use]
pub fn sanitize_data(value: &Value, fields: &[&str]) -> Value {
    Redactor::new(fields).redact(value)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn redacts_nested_password() {
        let input = json!({"user": {"password": "p", "email": "e@x.com"}});
        let out = sanitize_data(&input, &["password"]);
        assert_eq!(
            out,
            json!({"user": {"password": "[REDACTED]", "email": "e@x.com"}})
        );
        // Input untouched.
        assert_eq!(input["user"]["password"], json!("p"));
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let redactor = Redactor::default();
        assert!(redactor.is_sensitive("PASSWORD"));
        assert!(redactor.is_sensitive("userPassword"));
        assert!(redactor.is_sensitive("access_token"));
        assert!(redactor.is_sensitive("ApiKey"));
        assert!(!redactor.is_sensitive("api_key"));
        assert!(!redactor.is_sensitive("email"));
    }

    #[test]
    fn replaces_whole_subtree_regardless_of_type() {
        let input = json!({"secrets": {"a": 1, "b": [1, 2]}, "tokenCount": 3});
        let out = Redactor::default().redact(&input);
        assert_eq!(out["secrets"], json!(REDACTION_MARKER));
        assert_eq!(out["tokenCount"], json!(REDACTION_MARKER));
    }

    #[test]
    fn walks_arrays_of_objects() {
        let input = json!([{"password": "x"}, {"name": "n"}, 3, "password"]);
        let out = Redactor::default().redact(&input);
        assert_eq!(
            out,
            json!([{"password": REDACTION_MARKER}, {"name": "n"}, 3, "password"])
        );
    }

    #[test]
    fn values_are_not_matched() {
        let input = json!({"note": "my password is hunter2"});
        assert_eq!(Redactor::default().redact(&input), input);
    }

    #[test]
    fn scalars_pass_through() {
        let redactor = Redactor::default();
        assert_eq!(redactor.redact(&json!(42)), json!(42));
        assert_eq!(redactor.redact(&Value::Null), Value::Null);
    }

    #[test]
    fn deep_nesting_is_cut_off() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 5) {
            value = json!([value]);
        }
        let out = Redactor::default().redact(&value);
        let mut cursor = &out;
        let mut depth = 0;
        while let Value::Array(items) = cursor {
            cursor = &items[0];
            depth += 1;
        }
        assert_eq!(depth, MAX_DEPTH);
        assert_eq!(cursor, &json!(DEPTH_MARKER));
    }

    #[test]
    fn empty_fragments_are_ignored() {
        let redactor = Redactor::new(["", "pin"]);
        assert_eq!(redactor.fragments(), ["pin".to_string()]);
        assert!(!redactor.is_sensitive("name"));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map(
                    prop_oneof![
                        Just("password".to_string()),
                        Just("Token".to_string()),
                        "[a-z]{1,6}",
                    ],
                    inner,
                    0..4
                )
                .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn no_sensitive_values(redactor: &Redactor, value: &Value) -> bool {
        match value {
            Value::Object(map) => map.iter().all(|(k, v)| {
                if redactor.is_sensitive(k) {
                    v == &json!(REDACTION_MARKER)
                } else {
                    no_sensitive_values(redactor, v)
                }
            }),
            Value::Array(items) => items.iter().all(|v| no_sensitive_values(redactor, v)),
            _ => true,
        }
    }

    proptest! {
        #[test]
        fn redaction_is_idempotent(value in arb_json()) {
            let redactor = Redactor::default();
            let once = redactor.redact(&value);
            let twice = redactor.redact(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn redaction_never_mutates_input(value in arb_json()) {
            let before = value.clone();
            let _ = Redactor::default().redact(&value);
            prop_assert_eq!(before, value);
        }

        #[test]
        fn every_sensitive_key_is_masked(value in arb_json()) {
            let redactor = Redactor::default();
            let out = redactor.redact(&value);
            prop_assert!(no_sensitive_values(&redactor, &out));
        }
    }
}
