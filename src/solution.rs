//! Solution values and assembly.
//!
//! Solver output assigns values to the model's output variables. Values
//! arrive as JSON with a tagging convention for enumerated types:
//! `{"e": name}` for a named member, `{"e": enumName, "i": ordinal}` for a
//! member of an anonymous enumeration, and `{"c": ctor, "e": arg}` for a
//! constructor application. The [`SolutionAssembler`] resolves these against
//! a session-scoped [`EnumRegistry`] and produces one structural
//! [`Solution`] record per decoded solution message.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Map;

/// Identity of an enumerated type within one session.
///
/// Two values belong to the same enumeration exactly when they share the
/// same `Arc<Enumeration>`; registries are never shared across sessions, so
/// identities are session-scoped.
#[derive(Debug)]
pub struct Enumeration {
    name: String,
}

impl Enumeration {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Session-scoped registry mapping enumeration names to their identities.
///
/// The first lookup of an unregistered name creates a fresh identity; every
/// later lookup of the same name returns the same identity.
#[derive(Debug, Default)]
pub struct EnumRegistry {
    map: HashMap<String, Arc<Enumeration>>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a name to its enumeration identity, registering it if new.
    pub fn resolve(&mut self, name: &str) -> Arc<Enumeration> {
        if let Some(existing) = self.map.get(name) {
            return Arc::clone(existing);
        }
        let fresh = Arc::new(Enumeration {
            name: name.to_string(),
        });
        self.map.insert(name.to_string(), Arc::clone(&fresh));
        fresh
    }
}

/// A value of an enumerated type.
#[derive(Debug, Clone)]
pub enum EnumValue {
    /// A named member, e.g. `{"e": "Red"}`.
    Member {
        enumeration: Arc<Enumeration>,
        name: String,
    },
    /// A member of an anonymous enumeration, e.g. `{"e": "_Anon", "i": 2}`.
    Anonymous {
        enumeration: Arc<Enumeration>,
        ordinal: u64,
    },
    /// A constructor application, e.g. `{"c": "Node", "e": 4}`.
    Constructor {
        constructor: String,
        argument: Box<Value>,
    },
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                EnumValue::Member {
                    enumeration: a,
                    name: an,
                },
                EnumValue::Member {
                    enumeration: b,
                    name: bn,
                },
            ) => Arc::ptr_eq(a, b) && an == bn,
            (
                EnumValue::Anonymous {
                    enumeration: a,
                    ordinal: ai,
                },
                EnumValue::Anonymous {
                    enumeration: b,
                    ordinal: bi,
                },
            ) => Arc::ptr_eq(a, b) && ai == bi,
            (
                EnumValue::Constructor {
                    constructor: ac,
                    argument: aa,
                },
                EnumValue::Constructor {
                    constructor: bc,
                    argument: ba,
                },
            ) => ac == bc && aa == ba,
            _ => false,
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::Member { name, .. } => f.write_str(name),
            EnumValue::Anonymous {
                enumeration,
                ordinal,
            } => write!(f, "{}#{}", enumeration.name(), ordinal),
            EnumValue::Constructor {
                constructor,
                argument,
            } => write!(f, "{}({})", constructor, argument),
        }
    }
}

/// One element of a set value.
#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// Inclusive integer range.
    Range(i64, i64),
    /// Explicit member.
    Elem(Value),
}

/// Structural value assigned to an output variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Enum(EnumValue),
    Set(Vec<SetItem>),
    Array(Vec<Value>),
    /// Record or tuple output, kept as an ordered field list.
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Converts a JSON value into a [`Value`], resolving enum tags against
    /// the session registry.
    pub fn from_json(json: &serde_json::Value, registry: &mut EnumRegistry) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(|v| Value::from_json(v, registry)).collect())
            }
            serde_json::Value::Object(obj) => Value::from_json_object(obj, registry),
        }
    }

    fn from_json_object(obj: &Map<String, serde_json::Value>, registry: &mut EnumRegistry) -> Value {
        // Constructor application: {"c": ctor, "e": argument}
        if obj.len() == 2 {
            if let (Some(serde_json::Value::String(ctor)), Some(arg)) =
                (obj.get("c"), obj.get("e"))
            {
                return Value::Enum(EnumValue::Constructor {
                    constructor: ctor.clone(),
                    argument: Box::new(Value::from_json(arg, registry)),
                });
            }
            // Anonymous member: {"e": enumName, "i": ordinal}
            if let (Some(serde_json::Value::String(name)), Some(ord)) =
                (obj.get("e"), obj.get("i"))
            {
                if let Some(ordinal) = ord.as_u64() {
                    return Value::Enum(EnumValue::Anonymous {
                        enumeration: registry.resolve(name),
                        ordinal,
                    });
                }
            }
        }
        // Named member: {"e": name}
        if obj.len() == 1 {
            if let Some(serde_json::Value::String(name)) = obj.get("e") {
                return Value::Enum(EnumValue::Member {
                    enumeration: registry.resolve(name),
                    name: name.clone(),
                });
            }
            if let Some(serde_json::Value::Array(items)) = obj.get("set") {
                return Value::Set(
                    items
                        .iter()
                        .map(|item| match item {
                            serde_json::Value::Array(pair) if pair.len() == 2 => {
                                match (pair[0].as_i64(), pair[1].as_i64()) {
                                    (Some(lo), Some(hi)) => SetItem::Range(lo, hi),
                                    _ => SetItem::Elem(Value::from_json(item, registry)),
                                }
                            }
                            other => SetItem::Elem(Value::from_json(other, registry)),
                        })
                        .collect(),
                );
            }
        }
        Value::Record(
            obj.iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v, registry)))
                .collect(),
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("<>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::Enum(e) => write!(f, "{}", e),
            Value::Set(items) => {
                f.write_str("{")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        SetItem::Range(lo, hi) => write!(f, "{}..{}", lo, hi)?,
                        SetItem::Elem(v) => write!(f, "{}", v)?,
                    }
                }
                f.write_str("}")
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("(")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Reserved pseudo-field: rendered output text.
pub const OUTPUT_ITEM_FIELD: &str = "_output_item";
/// Reserved pseudo-field: checker-model output.
pub const CHECKER_FIELD: &str = "_checker";
/// Reserved pseudo-field: objective value of an optimization problem.
pub const OBJECTIVE_FIELD: &str = "objective";

/// One assignment to the model's output variables.
///
/// A structural record with an ordered field list and lookup by name; field
/// schemas are session-wide, so every solution of one session exposes the
/// same names.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    fields: Vec<(String, Value)>,
}

impl Solution {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Objective value, present only for optimization problems.
    pub fn objective(&self) -> Option<&Value> {
        self.get(OBJECTIVE_FIELD)
    }

    /// Rendered output text of the model's output item, when present.
    pub fn output_item(&self) -> Option<&str> {
        self.get(OUTPUT_ITEM_FIELD).and_then(Value::as_str)
    }

    /// Output of the checker model, when one was attached to the session.
    pub fn check(&self) -> Option<&str> {
        self.get(CHECKER_FIELD).and_then(Value::as_str)
    }

    /// Ordered iteration over all fields, pseudo-fields included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The model's own output item takes precedence when non-empty.
        if let Some(text) = self.output_item() {
            if !text.is_empty() {
                return f.write_str(text);
            }
        }
        for (idx, (name, value)) in self
            .fields
            .iter()
            .filter(|(name, _)| name != OUTPUT_ITEM_FIELD && name != CHECKER_FIELD)
            .enumerate()
        {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{} = {};", name, value)?;
        }
        Ok(())
    }
}

/// Rust keywords that cannot be used verbatim as field accessors.
fn is_reserved_word(name: &str) -> bool {
    matches!(
        name,
        "as" | "break" | "const" | "continue" | "crate" | "dyn" | "else" | "enum"
            | "extern" | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop"
            | "match" | "mod" | "move" | "mut" | "pub" | "ref" | "return" | "self"
            | "Self" | "static" | "struct" | "super" | "trait" | "true" | "type"
            | "unsafe" | "use" | "where" | "while" | "async" | "await" | "abstract"
            | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "try"
            | "typeof" | "unsized" | "virtual" | "yield"
    )
}

/// Builds the session rename table from the solver-reported output names.
///
/// Names colliding with a reserved identifier are remapped to `mzn_<name>`.
/// The table is built once per session and applied to every solution.
pub fn keyword_renames<'a, I>(output_names: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    output_names
        .into_iter()
        .filter(|name| is_reserved_word(name))
        .map(|name| (name.to_string(), format!("mzn_{name}")))
        .collect()
}

/// Converts decoded solution field maps into typed [`Solution`] records.
///
/// Holds the session's rename table, enum registry, and any checker output
/// waiting to be attached to the next solution.
#[derive(Debug, Default)]
pub struct SolutionAssembler {
    renames: Vec<(String, String)>,
    registry: EnumRegistry,
    pending_checker: Option<String>,
}

impl SolutionAssembler {
    pub fn new(renames: Vec<(String, String)>) -> Self {
        Self {
            renames,
            registry: EnumRegistry::new(),
            pending_checker: None,
        }
    }

    /// Stores checker-model output to be attached to the next solution.
    pub fn stage_checker(&mut self, text: String) {
        self.pending_checker = Some(text);
    }

    /// Applies the rename table to one field name.
    fn renamed<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(before, _)| before == name)
            .map(|(_, after)| after.as_str())
            .unwrap_or(name)
    }

    /// Assembles a typed solution from a decoded field map.
    pub fn assemble(&mut self, fields: &Map<String, serde_json::Value>) -> Solution {
        let mut out: Vec<(String, Value)> = Vec::with_capacity(fields.len() + 1);
        for (name, json) in fields {
            let value = Value::from_json(json, &mut self.registry);
            out.push((self.renamed(name).to_string(), value));
        }
        if let Some(checker) = self.pending_checker.take() {
            out.push((CHECKER_FIELD.to_string(), Value::Str(checker)));
        }
        Solution::new(out)
    }
}
