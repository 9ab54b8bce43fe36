use crate::imports::*;
use serde::{Deserialize, Serialize};

mod kind;

pub use kind::ResultKind;

/*
    Consts:
    * WEB_ELEMENT_KEY - Key used by the W3C WebDriver protocol to mark an element reference in JSON
*/
pub const WEB_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/*
    Types:
    * ElementHandle - Opaque reference to a DOM element, owned by whichever host resolved it
    * QueryValue - The dynamic value every query node resolves to
    * Truthy - Script-style truthiness used by the wait engine and the branching operators
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        ElementHandle(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[element {}]", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Element(ElementHandle),
    Array(Vec<QueryValue>),
    /// Keys are kept sorted; insertion order is not preserved.
    Object(BTreeMap<String, QueryValue>),
}

pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for QueryValue {
    fn is_truthy(&self) -> bool {
        match self {
            QueryValue::Null => false,
            QueryValue::Bool(b) => *b,
            QueryValue::Number(n) => *n != 0.0 && !n.is_nan(),
            QueryValue::String(s) => !s.is_empty(),
            QueryValue::Element(_) | QueryValue::Array(_) | QueryValue::Object(_) => true,
        }
    }
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementHandle> {
        match self {
            QueryValue::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<QueryValue>> {
        match self {
            QueryValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, QueryValue>> {
        match self {
            QueryValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Name of the value's type as a script `typeof` would report it.
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Null => "object",
            QueryValue::Bool(_) => "boolean",
            QueryValue::Number(_) => "number",
            QueryValue::String(_) => "string",
            QueryValue::Element(_) | QueryValue::Array(_) | QueryValue::Object(_) => "object",
        }
    }

    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => QueryValue::Null,
            JsonValue::Bool(b) => QueryValue::Bool(b),
            JsonValue::Number(n) => QueryValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => QueryValue::String(s),
            JsonValue::Array(items) => {
                QueryValue::Array(items.into_iter().map(QueryValue::from_json).collect())
            }
            JsonValue::Object(map) => {
                if map.len() == 1 {
                    if let Some(JsonValue::String(id)) = map.get(WEB_ELEMENT_KEY) {
                        return QueryValue::Element(ElementHandle::new(id.clone()));
                    }
                }
                QueryValue::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, QueryValue::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            QueryValue::Null => JsonValue::Null,
            QueryValue::Bool(b) => JsonValue::Bool(*b),
            QueryValue::Number(n) => number_to_json(*n),
            QueryValue::String(s) => JsonValue::String(s.clone()),
            QueryValue::Element(e) => json!({ WEB_ELEMENT_KEY: e.id() }),
            QueryValue::Array(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            QueryValue::Object(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

// Integral numbers are sent as JSON integers
fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

/// Formats numbers the way a script host prints them, `5` rather than `5.0`.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{}", n)
    }
}

impl std::fmt::Display for QueryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryValue::Null => write!(f, "null"),
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Number(n) => write!(f, "{}", format_number(*n)),
            QueryValue::String(s) => write!(f, "{}", s),
            QueryValue::Element(e) => write!(f, "{}", e),
            QueryValue::Array(_) | QueryValue::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Number(value)
    }
}

impl From<usize> for QueryValue {
    fn from(value: usize) -> Self {
        QueryValue::Number(value as f64)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<Option<String>> for QueryValue {
    fn from(value: Option<String>) -> Self {
        value.map(QueryValue::String).unwrap_or(QueryValue::Null)
    }
}

impl From<ElementHandle> for QueryValue {
    fn from(value: ElementHandle) -> Self {
        QueryValue::Element(value)
    }
}

impl From<Vec<ElementHandle>> for QueryValue {
    fn from(value: Vec<ElementHandle>) -> Self {
        QueryValue::Array(value.into_iter().map(QueryValue::Element).collect())
    }
}
