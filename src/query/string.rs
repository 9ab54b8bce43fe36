use super::{ConditionQuery, NumberQuery, TypedQuery, map_output, recover};
use crate::imports::*;
use serde::Serialize;

static FLOAT_PREFIX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[+-]?(Infinity|((\d+\.?\d*)|(\.\d+))([eE][+-]?\d+)?)")
        .expect("float prefix pattern is valid")
});

/// How `to_number` parses text. Without options the leading float is parsed;
/// with options and `float` unset the leading integer in `radix` (10 by default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NumberConversion {
    pub float: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radix: Option<u32>,
}

impl NumberConversion {
    pub fn float() -> Self {
        NumberConversion {
            float: true,
            radix: None,
        }
    }

    pub fn integer(radix: u32) -> Self {
        NumberConversion {
            float: false,
            radix: Some(radix),
        }
    }
}

fn parse_float_prefix(text: &str) -> Option<f64> {
    let found = FLOAT_PREFIX.find(text.trim_start())?.as_str();
    match found.trim_start_matches('+') {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        digits => digits.parse().ok(),
    }
}

fn parse_int_prefix(text: &str, radix: u32) -> Option<f64> {
    let text = text.trim_start();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let hex = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"));
    let (radix, rest) = match (radix, hex) {
        (0 | 16, Some(rest)) => (16, rest),
        (0, None) => (10, rest),
        _ => (radix, rest),
    };
    if !(2..=36).contains(&radix) {
        return None;
    }
    let digits = rest
        .chars()
        .map_while(|c| c.to_digit(radix))
        .collect::<Vec<_>>();
    if digits.is_empty() {
        return None;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(*d));
    Some(if negative { -value } else { value })
}

/// Shared by string and nullable string queries. Null and "" are rejected
/// before parsing.
pub(super) fn convert_to_number(
    text: Option<&str>,
    options: Option<NumberConversion>,
    description: &QueryDescription,
) -> QueryResult<f64> {
    let reject = |message: String| {
        QueryError::builder(ErrorKind::Argument, message)
            .description(description)
            .build()
    };
    let text = match text {
        None => return Err(reject("Cannot convert null to a number".to_string())),
        Some("") => return Err(reject("Cannot convert  to a number".to_string())),
        Some(text) => text,
    };
    let options = options.unwrap_or_else(NumberConversion::float);
    let parsed = if options.float {
        parse_float_prefix(text)
    } else {
        parse_int_prefix(text, options.radix.unwrap_or(10))
    };
    parsed
        .filter(|n| !n.is_nan())
        .ok_or_else(|| reject(format!("Cannot convert '{}' to a number", text)))
}

pub(super) fn to_number_arguments(options: Option<NumberConversion>) -> Vec<CallArgument> {
    options
        .map(|o| vec![CallArgument::options(Some(&o))])
        .unwrap_or_default()
}

pub(super) fn script_length(text: &str) -> usize {
    text.encode_utf16().count()
}

#[derive(Clone)]
pub struct StringQuery {
    node: QueryNode,
}

impl TypedQuery for StringQuery {
    const KIND: ResultKind = ResultKind::String;
    type Output = String;

    fn from_node(node: QueryNode) -> Self {
        StringQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<String> {
        match value {
            QueryValue::String(text) => Some(text),
            _ => None,
        }
    }
}

impl StringQuery {
    /// Length in UTF-16 code units, as scripts count it.
    pub fn length(&self) -> NumberQuery {
        let description = self.description().append_call("length", vec![]);
        NumberQuery::from_node(map_output(self, description, |_, text| {
            Ok(script_length(&text).into())
        }))
    }

    pub fn to_number(&self, options: Option<NumberConversion>) -> NumberQuery {
        let description = self
            .description()
            .append_call("toNumber", to_number_arguments(options));
        let described = description.clone();
        NumberQuery::from_node(map_output(self, description, move |_, text| {
            Ok(convert_to_number(Some(&text), options, &described)?.into())
        }))
    }

    pub fn equals(&self, value: &str) -> ConditionQuery {
        let description = self.description().append_call("equals", vec![value.into()]);
        let value = value.to_string();
        ConditionQuery::from_node(map_output(self, description, move |_, text| {
            Ok((text == value).into())
        }))
    }

    pub fn matches(&self, expression: impl Into<RegexArg>) -> ConditionQuery {
        let expression = expression.into();
        let description = self
            .description()
            .append_call("matches", vec![expression.clone().into()]);
        ConditionQuery::from_node(map_output(self, description, move |_, text| {
            Ok(expression.compile()?.is_match(&text).into())
        }))
    }

    pub fn not_empty(&self) -> ConditionQuery {
        let description = self.description().append_call("notEmpty", vec![]);
        ConditionQuery::from_node(map_output(self, description, |_, text| {
            Ok((!text.is_empty()).into())
        }))
    }

    pub fn when_rejected(&self, value: &str) -> StringQuery {
        StringQuery::from_node(recover(self, "whenRejected", value.into(), false))
    }

    pub fn when_rejected_or_falsy(&self, value: &str) -> StringQuery {
        StringQuery::from_node(recover(self, "whenRejectedOrFalsy", value.into(), true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_prefix_parsing() {
        assert_eq!(parse_float_prefix("12.5px"), Some(12.5));
        assert_eq!(parse_float_prefix("  -3e2 apples"), Some(-300.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float_prefix("px12"), None);
    }

    #[test]
    fn test_int_prefix_parsing() {
        assert_eq!(parse_int_prefix("42.9", 10), Some(42.0));
        assert_eq!(parse_int_prefix("ff", 16), Some(255.0));
        assert_eq!(parse_int_prefix("0x1A", 16), Some(26.0));
        assert_eq!(parse_int_prefix("-101", 2), Some(-5.0));
        assert_eq!(parse_int_prefix("9", 8), None);
        assert_eq!(parse_int_prefix("1", 40), None);
    }

    #[test]
    fn test_conversion_messages() {
        let description = QueryDescription::new().append_call("toNumber", vec![]);
        let empty = convert_to_number(Some(""), None, &description).unwrap_err();
        assert!(empty.is(ErrorKind::Argument));
        assert!(empty.message().starts_with("Cannot convert  to a number"));

        let null = convert_to_number(None, None, &description).unwrap_err();
        assert!(null.message().starts_with("Cannot convert null to a number"));

        let nan = convert_to_number(Some("abc"), None, &description).unwrap_err();
        assert!(nan.message().starts_with("Cannot convert 'abc' to a number"));

        assert_eq!(
            convert_to_number(Some("12abc"), Some(NumberConversion::integer(10)), &description)
                .unwrap(),
            12.0
        );
    }

    #[test]
    fn test_length_counts_utf16_units() {
        assert_eq!(script_length("abc"), 3);
        assert_eq!(script_length("😀"), 2);
    }
}
