use super::string::{convert_to_number, script_length, to_number_arguments};
use super::{
    ConditionQuery, NumberConversion, NumberQuery, StringQuery, TypedQuery, map_output, recover,
};
use crate::imports::*;

/// A string that may be missing, such as an attribute value.
#[derive(Clone)]
pub struct NullableStringQuery {
    node: QueryNode,
}

impl TypedQuery for NullableStringQuery {
    const KIND: ResultKind = ResultKind::NullableString;
    type Output = Option<String>;

    fn from_node(node: QueryNode) -> Self {
        NullableStringQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<Option<String>> {
        match value {
            QueryValue::Null => Some(None),
            QueryValue::String(text) => Some(Some(text)),
            _ => None,
        }
    }
}

impl NullableStringQuery {
    pub fn length(&self) -> NumberQuery {
        let description = self.description().append_call("length", vec![]);
        NumberQuery::from_node(map_output(self, description, |_, text| {
            Ok(text.as_deref().map(script_length).unwrap_or(0).into())
        }))
    }

    pub fn to_number(&self, options: Option<NumberConversion>) -> NumberQuery {
        let description = self
            .description()
            .append_call("toNumber", to_number_arguments(options));
        let described = description.clone();
        NumberQuery::from_node(map_output(self, description, move |_, text| {
            Ok(convert_to_number(text.as_deref(), options, &described)?.into())
        }))
    }

    pub fn equals(&self, value: Option<&str>) -> ConditionQuery {
        let expected = value.map(str::to_string);
        let description = self
            .description()
            .append_call("equals", vec![CallArgument::value(expected.clone())]);
        ConditionQuery::from_node(map_output(self, description, move |_, text| {
            Ok((text == expected).into())
        }))
    }

    /// False for null.
    pub fn matches(&self, expression: impl Into<RegexArg>) -> ConditionQuery {
        let expression = expression.into();
        let description = self
            .description()
            .append_call("matches", vec![expression.clone().into()]);
        ConditionQuery::from_node(map_output(self, description, move |_, text| {
            let matched = match text {
                Some(text) => expression.compile()?.is_match(&text),
                None => false,
            };
            Ok(matched.into())
        }))
    }

    pub fn not_empty_or_null(&self) -> ConditionQuery {
        let description = self.description().append_call("notEmptyOrNull", vec![]);
        ConditionQuery::from_node(map_output(self, description, |_, text| {
            Ok(text.is_some_and(|t| !t.is_empty()).into())
        }))
    }

    pub fn when_rejected(&self, value: &str) -> NullableStringQuery {
        NullableStringQuery::from_node(recover(self, "whenRejected", value.into(), false))
    }

    /// Null and "" count as falsy, so the result is never null.
    pub fn when_rejected_or_falsy(&self, value: &str) -> StringQuery {
        StringQuery::from_node(recover(self, "whenRejectedOrFalsy", value.into(), true))
    }
}
