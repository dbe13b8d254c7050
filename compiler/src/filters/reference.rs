//! Object reference resolution
//!
//! Reference filters accept persisted objects in three spellings:
//! an object handle (`{"class": "Post", "id": 12}`), a fingerprint
//! (`Post/12`) or a global identifier (`gid://app/Post/12`).

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const CLASS_PATTERN: &str = r"[A-Z][A-Za-z0-9_]*(?:::[A-Z][A-Za-z0-9_]*)*";

fn fingerprint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^({})/([^/\s]+)$", CLASS_PATTERN)).expect("Invalid regex")
    })
}

fn global_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^gid://[^/\s]+/({})/([^/?\s]+)(?:\?.*)?$",
            CLASS_PATTERN
        ))
        .expect("Invalid regex")
    })
}

/// A persisted object identified by class name and id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub class_name: String,
    pub id: String,
}

impl ObjectRef {
    pub fn new(class_name: &str, id: impl ToString) -> Self {
        Self {
            class_name: class_name.to_string(),
            id: id.to_string(),
        }
    }

    /// Parse a `ClassName/id` fingerprint
    pub fn from_fingerprint(s: &str) -> Option<Self> {
        let caps = fingerprint_regex().captures(s.trim())?;
        Some(Self::new(&caps[1], &caps[2]))
    }

    /// Parse a `gid://app/ClassName/id` global identifier
    pub fn from_global_id(s: &str) -> Option<Self> {
        let caps = global_id_regex().captures(s.trim())?;
        Some(Self::new(&caps[1], &caps[2]))
    }

    /// Resolve any supported spelling; bare ids carry no class and yield `None`
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.starts_with("gid://") => Self::from_global_id(s),
            Value::String(s) => Self::from_fingerprint(s),
            Value::Object(map) => {
                let class_name = map
                    .get("class")
                    .or_else(|| map.get("type"))
                    .and_then(Value::as_str)?;
                let id = match map.get("id")? {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) if !s.is_empty() => s.clone(),
                    _ => return None,
                };
                if !fingerprint_regex().is_match(&format!("{}/{}", class_name, id)) {
                    return None;
                }
                Some(Self::new(class_name, id))
            }
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> String {
        format!("{}/{}", self.class_name, self.id)
    }

    pub fn numeric_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }

    pub fn is_a(&self, class_name: &str) -> bool {
        self.class_name == class_name
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

/// Resolve one element to a numeric id, dropping it on class mismatch
///
/// Bare integers (and numeric strings, as sent in request parameters) are
/// taken to already be ids of the scoped class.
pub fn resolve_id(value: &Value, class_name: Option<&str>) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if s.trim().parse::<i64>().is_ok() => s.trim().parse().ok(),
        _ => {
            let object = ObjectRef::parse(value)?;
            if let Some(class_name) = class_name
                && !object.is_a(class_name)
            {
                return None;
            }
            object.numeric_id()
        }
    }
}

/// Resolve one element to its fingerprint string
pub fn resolve_fingerprint(value: &Value) -> Option<String> {
    ObjectRef::parse(value).map(|object| object.fingerprint())
}
