use super::QueryValue;

/// The closed set of result shapes a query node can be typed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Condition,
    String,
    NullableString,
    Number,
    Element,
    Array,
    Object,
    Any,
}

impl ResultKind {
    /// Kind a sampled value would be wrapped as. `Null` maps to `NullableString`
    /// since that is the only typed node that resolves to null.
    pub fn of(value: &QueryValue) -> ResultKind {
        match value {
            QueryValue::Null => ResultKind::NullableString,
            QueryValue::Bool(_) => ResultKind::Condition,
            QueryValue::Number(_) => ResultKind::Number,
            QueryValue::String(_) => ResultKind::String,
            QueryValue::Element(_) => ResultKind::Element,
            QueryValue::Array(_) => ResultKind::Array,
            QueryValue::Object(_) => ResultKind::Object,
        }
    }

    /// Shared kind of every entry, `Any` when they disagree or there are none.
    pub fn common(kinds: impl IntoIterator<Item = ResultKind>) -> ResultKind {
        let mut kinds = kinds.into_iter();
        let Some(first) = kinds.next() else {
            return ResultKind::Any;
        };
        if kinds.all(|k| k == first) {
            first
        } else {
            ResultKind::Any
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResultKind::Condition => "condition",
            ResultKind::String => "string",
            ResultKind::NullableString => "nullable string",
            ResultKind::Number => "number",
            ResultKind::Element => "element",
            ResultKind::Array => "array",
            ResultKind::Object => "object",
            ResultKind::Any => "any",
        }
    }

    /// Whether a value resolved by a node typed as `self` is acceptable.
    pub fn accepts(&self, value: &QueryValue) -> bool {
        match (self, value) {
            (ResultKind::Any, _) => true,
            (ResultKind::NullableString, QueryValue::Null | QueryValue::String(_)) => true,
            (kind, value) => *kind == ResultKind::of(value),
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ElementHandle;

    #[test]
    fn test_kind_of_sample_values() {
        assert_eq!(ResultKind::of(&QueryValue::Bool(true)), ResultKind::Condition);
        assert_eq!(ResultKind::of(&QueryValue::from("x")), ResultKind::String);
        assert_eq!(
            ResultKind::of(&QueryValue::Element(ElementHandle::new("a"))),
            ResultKind::Element
        );
        assert_eq!(ResultKind::of(&QueryValue::Null), ResultKind::NullableString);
    }

    #[test]
    fn test_common_kind() {
        assert_eq!(
            ResultKind::common([ResultKind::String, ResultKind::String]),
            ResultKind::String
        );
        assert_eq!(
            ResultKind::common([ResultKind::String, ResultKind::Number]),
            ResultKind::Any
        );
        assert_eq!(ResultKind::common([]), ResultKind::Any);
    }

    #[test]
    fn test_nullable_string_accepts_null() {
        assert!(ResultKind::NullableString.accepts(&QueryValue::Null));
        assert!(ResultKind::NullableString.accepts(&QueryValue::from("a")));
        assert!(!ResultKind::String.accepts(&QueryValue::Null));
    }
}
