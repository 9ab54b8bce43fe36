use super::{TypedQuery, map_output, recover};
use crate::imports::*;

#[derive(Clone)]
pub struct ConditionQuery {
    node: QueryNode,
}

impl TypedQuery for ConditionQuery {
    const KIND: ResultKind = ResultKind::Condition;
    type Output = bool;

    fn from_node(node: QueryNode) -> Self {
        ConditionQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<bool> {
        value.as_bool()
    }
}

impl ConditionQuery {
    pub fn not(&self) -> ConditionQuery {
        let description = self.description().append_call("not", vec![]);
        ConditionQuery::from_node(map_output(self, description, |_, value| {
            Ok(QueryValue::Bool(!value))
        }))
    }

    pub fn when_rejected(&self, value: bool) -> ConditionQuery {
        ConditionQuery::from_node(recover(self, "whenRejected", value.into(), false))
    }
}
