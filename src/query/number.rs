use super::{ConditionQuery, TypedQuery, map_output, recover};
use crate::imports::*;

#[derive(Clone)]
pub struct NumberQuery {
    node: QueryNode,
}

impl TypedQuery for NumberQuery {
    const KIND: ResultKind = ResultKind::Number;
    type Output = f64;

    fn from_node(node: QueryNode) -> Self {
        NumberQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<f64> {
        value.as_f64()
    }
}

impl NumberQuery {
    fn compare(&self, name: &str, operand: f64, test: fn(f64, f64) -> bool) -> ConditionQuery {
        let description = self.description().append_call(name, vec![operand.into()]);
        ConditionQuery::from_node(map_output(self, description, move |_, value| {
            Ok(QueryValue::Bool(test(value, operand)))
        }))
    }

    pub fn equals(&self, value: f64) -> ConditionQuery {
        self.compare("equals", value, |a, b| a == b)
    }

    pub fn greater_than(&self, value: f64) -> ConditionQuery {
        self.compare("greaterThan", value, |a, b| a > b)
    }

    pub fn greater_than_or_equal(&self, value: f64) -> ConditionQuery {
        self.compare("greaterThanOrEqual", value, |a, b| a >= b)
    }

    pub fn less_than(&self, value: f64) -> ConditionQuery {
        self.compare("lessThan", value, |a, b| a < b)
    }

    pub fn less_than_or_equal(&self, value: f64) -> ConditionQuery {
        self.compare("lessThanOrEqual", value, |a, b| a <= b)
    }

    pub fn when_rejected(&self, value: f64) -> NumberQuery {
        NumberQuery::from_node(recover(self, "whenRejected", value.into(), false))
    }
}
