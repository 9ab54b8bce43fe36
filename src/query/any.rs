use super::{
    ArrayQuery, ConditionQuery, ElementQuery, NullableStringQuery, NumberQuery, ObjectQuery,
    StringQuery, TypedQuery,
};
use crate::imports::*;

/// Untyped result, typically of a script. The `as_*` coercions check the
/// resolved value before handing it to a typed query.
#[derive(Clone)]
pub struct AnyQuery {
    node: QueryNode,
}

impl TypedQuery for AnyQuery {
    const KIND: ResultKind = ResultKind::Any;
    type Output = QueryValue;

    fn from_node(node: QueryNode) -> Self {
        AnyQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<QueryValue> {
        Some(value)
    }
}

fn rejected(expected: &str, value: &QueryValue) -> Option<String> {
    Some(format!(
        "The tested value is not {}, the type was resolved to '{}'",
        expected,
        value.type_name()
    ))
}

impl AnyQuery {
    fn coerce<F>(&self, name: &str, check: F) -> QueryNode
    where
        F: Fn(&LocalBackend, &QueryValue) -> Option<String> + Send + Sync + 'static,
    {
        let description = self.description().append_call(name, vec![]);
        let described = description.clone();
        self.node.map_value(description, move |backend, value| match check(backend, &value) {
            None => Ok(value),
            Some(message) => Err(QueryError::builder(ErrorKind::UnexpectedType, message)
                .description(&described)
                .build()
                .into()),
        })
    }

    pub fn as_string(&self) -> StringQuery {
        StringQuery::from_node(self.coerce("asString", |_, value| match value {
            QueryValue::String(_) => None,
            other => rejected("a string", other),
        }))
    }

    pub fn as_nullable_string(&self) -> NullableStringQuery {
        NullableStringQuery::from_node(self.coerce("asNullableString", |_, value| {
            match value {
                QueryValue::String(_) | QueryValue::Null => None,
                other => rejected("a string or null", other),
            }
        }))
    }

    pub fn as_number(&self) -> NumberQuery {
        NumberQuery::from_node(self.coerce("asNumber", |_, value| match value {
            QueryValue::Number(_) => None,
            other => rejected("a number", other),
        }))
    }

    pub fn as_boolean(&self) -> ConditionQuery {
        ConditionQuery::from_node(self.coerce("asBoolean", |_, value| match value {
            QueryValue::Bool(_) => None,
            other => rejected("a boolean", other),
        }))
    }

    pub fn as_element(&self) -> ElementQuery {
        ElementQuery::from_node(self.coerce("asElement", |backend, value| {
            if backend.dom.is_dom_element(value) {
                None
            } else {
                rejected("an element", value)
            }
        }))
    }

    pub fn as_array(&self) -> ArrayQuery<AnyQuery> {
        ArrayQuery::from_node(self.coerce("asArray", |_, value| match value {
            QueryValue::Array(_) => None,
            other => rejected("an array", other),
        }))
    }

    pub fn as_object(&self) -> ObjectQuery {
        ObjectQuery::from_node(self.coerce("asObject", |backend, value| {
            if !value.is_truthy() {
                return Some(format!(
                    "The tested value is not an object, the value is '{}'",
                    value
                ));
            }
            if backend.dom.is_dom_element(value) {
                return Some(
                    "The tested value is an element where a plain object was expected".to_string(),
                );
            }
            match value {
                QueryValue::Object(_) => None,
                QueryValue::Array(_) => Some(
                    "The tested value is an array where a plain object was expected".to_string(),
                ),
                other => Some(format!(
                    "The tested value is not an object, the type was resolved to '{}'",
                    other.type_name()
                )),
            }
        }))
    }

    pub fn truthy(&self) -> ConditionQuery {
        let description = self.description().append_call("truthy", vec![]);
        ConditionQuery::from_node(
            self.node
                .map_value(description, |_, value| Ok(value.is_truthy().into())),
        )
    }
}
