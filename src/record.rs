//! # Employee Record
//! One raw input row: an ordered map from field name to raw value.
//!
//! Values are kept as they arrived (JSON string or number, CSV cell text) so
//! that batch output can echo the input columns untouched. Field order is
//! preserved (`serde_json` with `preserve_order`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display-only fields; never fed to the predictor.
pub const IDENTITY_FIELDS: [&str; 3] = ["Name", "Surname", "IDNumber"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeRecord {
    fields: Map<String, Value>,
}

impl EmployeeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces an existing value in place.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Value of `field` unless absent, null, or a blank string.
    pub fn present(&self, field: &str) -> Option<&Value> {
        match self.fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Field names in input order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Cell text for tabular output: strings verbatim, numbers via JSON
    /// formatting, null as empty.
    pub fn cell(&self, field: &str) -> String {
        match self.fields.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Short anonymized id over the identity fields, for logs.
    /// Raw names and ID numbers never reach the log output.
    pub fn anon_id(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for f in IDENTITY_FIELDS {
            hasher.update(self.cell(f).as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

impl From<Map<String, Value>> for EmployeeRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for EmployeeRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut rec = Self::new();
        for (k, v) in iter {
            rec.insert(k, v);
        }
        rec
    }
}

/// Render a raw value for error messages (strings unquoted).
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_insertion_order() {
        let r = EmployeeRecord::new()
            .with("Zeta", 1)
            .with("Alpha", "x")
            .with("Mid", 2.5);
        let names: Vec<&str> = r.field_names().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn blank_and_null_are_not_present() {
        let r = EmployeeRecord::new()
            .with("A", "  ")
            .with("B", Value::Null)
            .with("C", 0);
        assert!(r.present("A").is_none());
        assert!(r.present("B").is_none());
        assert!(r.present("Missing").is_none());
        assert_eq!(r.present("C"), Some(&json!(0)));
    }

    #[test]
    fn cells_render_verbatim() {
        let r = EmployeeRecord::new()
            .with("Age", 29)
            .with("Income", "3200.50")
            .with("Gap", Value::Null);
        assert_eq!(r.cell("Age"), "29");
        assert_eq!(r.cell("Income"), "3200.50");
        assert_eq!(r.cell("Gap"), "");
        assert_eq!(r.cell("Nope"), "");
    }

    #[test]
    fn anon_id_is_stable_and_hides_identity() {
        let a = EmployeeRecord::new().with("Name", "Ada").with("IDNumber", "77");
        let b = EmployeeRecord::new().with("Name", "Ada").with("IDNumber", "77");
        let c = EmployeeRecord::new().with("Name", "Ada").with("IDNumber", "78");
        assert_eq!(a.anon_id(), b.anon_id());
        assert_ne!(a.anon_id(), c.anon_id());
        assert_eq!(a.anon_id().len(), 12);
        assert!(!a.anon_id().contains("Ada"));
    }

    #[test]
    fn deserializes_from_json_object() {
        let r: EmployeeRecord =
            serde_json::from_value(json!({"Department": "Sales", "Age": 41})).unwrap();
        assert_eq!(r.get("Department"), Some(&json!("Sales")));
        assert_eq!(r.get("Age"), Some(&json!(41)));
    }
}
