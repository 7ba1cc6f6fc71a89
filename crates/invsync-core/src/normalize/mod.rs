//! Raw document to fixed-schema mapping
//!
//! Every domain declares a table of [`Rule`]s (see [`ecs`]). A field rule reads
//! one source path, converts it to a [`ValueKind`] and writes it at a dotted
//! target path; an array rule projects each element of a source array through
//! its own field rules. Normalization never mutates its input.

pub mod ecs;
pub mod rules;

use serde_json::{Map, Number, Value};
use tracing::debug;

use invsync_api::Domain;
use invsync_probe::RawDocument;

pub use rules::{MatchKind, PackageRules};

/// Raw document mapped onto a domain's fixed schema
pub type NormalizedDocument = Map<String, Value>;

/// How declared fields missing from the source are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPolicy {
    /// Write the field's default value
    #[default]
    MaterializeDefaults,
    /// Leave the field out
    OmitAbsent,
}

/// Target value type of a field rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// String; numbers and booleans are rendered as text
    Text,
    /// Integer or float; numeric strings are parsed
    Number,
    /// Boolean; accepts `0`/`1`, `true`/`false`, `yes`/`no`
    Flag,
    /// Sequence of strings; a whitespace separated string is split
    List,
}

/// Explicit default of a field rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Text(&'static str),
    Number(i64),
    Flag(bool),
}

impl Fallback {
    fn to_value(self) -> Value {
        match self {
            Fallback::Text(s) => Value::String(s.to_string()),
            Fallback::Number(n) => Value::from(n),
            Fallback::Flag(b) => Value::Bool(b),
        }
    }
}

/// Scalar mapping from one source path to one target path
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub target: &'static str,
    pub source: &'static str,
    pub kind: ValueKind,
    pub default: Option<Fallback>,
}

impl FieldRule {
    #[must_use]
    pub const fn text(target: &'static str, source: &'static str) -> Self {
        Self::new(target, source, ValueKind::Text)
    }

    #[must_use]
    pub const fn number(target: &'static str, source: &'static str) -> Self {
        Self::new(target, source, ValueKind::Number)
    }

    #[must_use]
    pub const fn flag(target: &'static str, source: &'static str) -> Self {
        Self::new(target, source, ValueKind::Flag)
    }

    #[must_use]
    pub const fn list(target: &'static str, source: &'static str) -> Self {
        Self::new(target, source, ValueKind::List)
    }

    const fn new(target: &'static str, source: &'static str, kind: ValueKind) -> Self {
        Self {
            target,
            source,
            kind,
            default: None,
        }
    }

    /// Override the kind's default
    #[must_use]
    pub const fn or(mut self, default: Fallback) -> Self {
        self.default = Some(default);
        self
    }

    fn default_value(&self) -> Value {
        match self.default {
            Some(fallback) => fallback.to_value(),
            None => match self.kind {
                ValueKind::Text => Value::String(String::new()),
                ValueKind::Number => Value::from(0),
                ValueKind::Flag => Value::Bool(false),
                ValueKind::List => Value::Array(Vec::new()),
            },
        }
    }
}

/// Element-wise projection of a source array
#[derive(Debug, Clone, Copy)]
pub struct ArrayRule {
    pub target: &'static str,
    pub source: &'static str,
    /// Rules applied to every element; paths are relative to the element
    pub fields: &'static [FieldRule],
}

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Field(FieldRule),
    Array(ArrayRule),
}

/// Result of converting one source value
#[derive(Debug, PartialEq)]
enum Converted {
    Value(Value),
    Absent,
    Malformed(String),
}

/// Map `raw` onto the schema of `domain`
#[must_use]
pub fn normalize(raw: &RawDocument, domain: Domain, policy: FieldPolicy) -> NormalizedDocument {
    let mut out = Map::new();

    for rule in ecs::rules(domain) {
        match rule {
            Rule::Field(field) => {
                if let Some(value) = apply_field(raw, field, policy, domain) {
                    insert_path(&mut out, field.target, value);
                }
            }
            Rule::Array(array) => {
                if let Some(value) = apply_array(raw, array, policy, domain) {
                    insert_path(&mut out, array.target, value);
                }
            }
        }
    }

    out
}

fn apply_field(
    raw: &RawDocument,
    rule: &FieldRule,
    policy: FieldPolicy,
    domain: Domain,
) -> Option<Value> {
    match convert(lookup(raw, rule.source), rule.kind) {
        Converted::Value(value) => Some(value),
        Converted::Absent => match policy {
            FieldPolicy::MaterializeDefaults => Some(rule.default_value()),
            FieldPolicy::OmitAbsent => None,
        },
        Converted::Malformed(reason) => {
            debug!(%domain, field = rule.target, reason = %reason, "field omitted");
            None
        }
    }
}

fn apply_array(
    raw: &RawDocument,
    rule: &ArrayRule,
    policy: FieldPolicy,
    domain: Domain,
) -> Option<Value> {
    let items = match lookup(raw, rule.source) {
        None | Some(Value::Null) => {
            return match policy {
                FieldPolicy::MaterializeDefaults => Some(Value::Array(Vec::new())),
                FieldPolicy::OmitAbsent => None,
            };
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            debug!(%domain, field = rule.target, found = %kind_name(other), "array field omitted");
            return None;
        }
    };

    let projected = items
        .iter()
        .filter_map(|item| {
            let Value::Object(element) = item else {
                debug!(%domain, field = rule.target, found = %kind_name(item), "array element omitted");
                return None;
            };
            let mut out = Map::new();
            for field in rule.fields {
                if let Some(value) = apply_field(element, field, policy, domain) {
                    insert_path(&mut out, field.target, value);
                }
            }
            Some(Value::Object(out))
        })
        .collect();

    Some(Value::Array(projected))
}

/// Follow a dotted path through nested objects
fn lookup<'a>(raw: &'a RawDocument, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = raw.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects
fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut node = out;
    for segment in segments {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        node = next;
    }

    node.insert(leaf.to_string(), value);
}

fn convert(value: Option<&Value>, kind: ValueKind) -> Converted {
    let value = match value {
        None | Some(Value::Null) => return Converted::Absent,
        Some(value) => value,
    };

    match kind {
        ValueKind::Text => match value {
            Value::String(s) => Converted::Value(Value::String(s.clone())),
            Value::Number(n) => Converted::Value(Value::String(n.to_string())),
            Value::Bool(b) => Converted::Value(Value::String(b.to_string())),
            other => Converted::Malformed(format!("expected text, found {}", kind_name(other))),
        },
        ValueKind::Number => match value {
            Value::Number(n) => Converted::Value(Value::Number(n.clone())),
            Value::String(s) if s.trim().is_empty() => Converted::Absent,
            Value::String(s) => match parse_number(s.trim()) {
                Some(n) => Converted::Value(Value::Number(n)),
                None => Converted::Malformed(format!("not a number: {s:?}")),
            },
            other => Converted::Malformed(format!("expected number, found {}", kind_name(other))),
        },
        ValueKind::Flag => match value {
            Value::Bool(b) => Converted::Value(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Converted::Value(Value::Bool(false)),
                Some(1) => Converted::Value(Value::Bool(true)),
                _ => Converted::Malformed(format!("not a flag: {n}")),
            },
            Value::String(s) if s.trim().is_empty() => Converted::Absent,
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Converted::Value(Value::Bool(true)),
                "0" | "false" | "no" => Converted::Value(Value::Bool(false)),
                _ => Converted::Malformed(format!("not a flag: {s:?}")),
            },
            other => Converted::Malformed(format!("expected flag, found {}", kind_name(other))),
        },
        ValueKind::List => match value {
            Value::Array(items) => Converted::Value(Value::Array(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(Value::String(s.clone())),
                        Value::Number(n) => Some(Value::String(n.to_string())),
                        Value::Bool(b) => Some(Value::String(b.to_string())),
                        other => {
                            debug!(found = %kind_name(other), "list element omitted");
                            None
                        }
                    })
                    .collect(),
            )),
            Value::String(s) => Converted::Value(Value::Array(
                s.split_whitespace()
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            )),
            other => Converted::Malformed(format!("expected list, found {}", kind_name(other))),
        },
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(Number::from(n));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_convert_kinds() {
        let s = |v: Value| convert(Some(&v), ValueKind::Text);
        assert_eq!(s(json!(42)), Converted::Value(json!("42")));
        assert!(matches!(s(json!({"a": 1})), Converted::Malformed(_)));

        let n = |v: Value| convert(Some(&v), ValueKind::Number);
        assert_eq!(n(json!("1024")), Converted::Value(json!(1024)));
        assert_eq!(n(json!("2.5")), Converted::Value(json!(2.5)));
        assert_eq!(n(json!("")), Converted::Absent);
        assert!(matches!(n(json!("abc")), Converted::Malformed(_)));

        let f = |v: Value| convert(Some(&v), ValueKind::Flag);
        assert_eq!(f(json!("yes")), Converted::Value(json!(true)));
        assert_eq!(f(json!(0)), Converted::Value(json!(false)));
        assert!(matches!(f(json!(7)), Converted::Malformed(_)));

        let l = |v: Value| convert(Some(&v), ValueKind::List);
        assert_eq!(l(json!("-a -b")), Converted::Value(json!(["-a", "-b"])));
        assert_eq!(l(json!([1, "x", {"y": 1}])), Converted::Value(json!(["1", "x"])));

        assert_eq!(convert(None, ValueKind::Text), Converted::Absent);
        assert_eq!(convert(Some(&Value::Null), ValueKind::Number), Converted::Absent);
    }

    #[test]
    fn test_insert_path_builds_nested_objects() {
        let mut out = Map::new();
        insert_path(&mut out, "host.os.name", json!("Debian"));
        insert_path(&mut out, "host.os.version", json!("12"));
        insert_path(&mut out, "host.hostname", json!("box"));
        assert_eq!(
            Value::Object(out),
            json!({"host": {"os": {"name": "Debian", "version": "12"}, "hostname": "box"}})
        );
    }

    #[test]
    fn test_lookup_follows_nested_source() {
        let raw = doc(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(lookup(&raw, "a.b.c"), Some(&json!(1)));
        assert_eq!(lookup(&raw, "a.x"), None);
    }

    #[test]
    fn test_materialize_defaults_fills_every_field() {
        let out = normalize(&doc(json!({"hotfix": "KB500"})), Domain::Hotfixes, FieldPolicy::MaterializeDefaults);
        assert_eq!(Value::Object(out), json!({"package": {"hotfix": {"name": "KB500"}}}));

        let empty = normalize(&RawDocument::new(), Domain::Ports, FieldPolicy::MaterializeDefaults);
        assert_eq!(empty["process"]["pid"], json!(0));
        assert_eq!(empty["process"]["name"], json!(""));
        assert_eq!(empty["source"]["port"], json!(0));
    }

    #[test]
    fn test_omit_absent_drops_missing_fields() {
        let raw = doc(json!({"pid": 100, "local_port": 22}));
        let out = normalize(&raw, Domain::Ports, FieldPolicy::OmitAbsent);
        assert_eq!(
            Value::Object(out),
            json!({"process": {"pid": 100}, "source": {"port": 22}})
        );
    }

    #[test]
    fn test_array_projection() {
        let raw = doc(json!({
            "iface": "eth0",
            "ipv4": [{"address": "10.0.0.2", "netmask": "255.255.255.0"}, "junk"],
        }));

        let out = normalize(&raw, Domain::Networks, FieldPolicy::MaterializeDefaults);
        assert_eq!(out["network"]["ipv4"].as_array().unwrap().len(), 1);
        assert_eq!(out["network"]["ipv4"][0]["address"], json!("10.0.0.2"));
        assert_eq!(out["network"]["ipv4"][0]["broadcast"], json!(""));
        assert_eq!(out["network"]["ipv6"], json!([]));

        let sparse = normalize(&raw, Domain::Networks, FieldPolicy::OmitAbsent);
        assert!(sparse["network"].get("ipv6").is_none());
        assert!(sparse["network"]["ipv4"][0].get("broadcast").is_none());
    }

    #[test]
    fn test_malformed_field_is_omitted() {
        let raw = doc(json!({"pid": {"nested": true}, "name": "sshd"}));
        let out = normalize(&raw, Domain::Processes, FieldPolicy::MaterializeDefaults);
        assert!(out["process"].get("pid").is_none());
        assert_eq!(out["process"]["name"], json!("sshd"));
    }

    #[test]
    fn test_normalize_is_pure_and_deterministic() {
        let raw = doc(json!({"name": "vim", "version": "9.0", "size": "2048"}));
        let before = raw.clone();
        let a = normalize(&raw, Domain::Packages, FieldPolicy::MaterializeDefaults);
        let b = normalize(&raw, Domain::Packages, FieldPolicy::MaterializeDefaults);
        assert_eq!(a, b);
        assert_eq!(raw, before);
        assert_eq!(a["package"]["size"], json!(2048));
    }
}
