use super::{AnyQuery, TypedQuery, map_output};
use crate::imports::*;

/// Plain object result, such as a rect, a location or a batch.
#[derive(Clone)]
pub struct ObjectQuery {
    node: QueryNode,
}

impl TypedQuery for ObjectQuery {
    const KIND: ResultKind = ResultKind::Object;
    type Output = BTreeMap<String, QueryValue>;

    fn from_node(node: QueryNode) -> Self {
        ObjectQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<Self::Output> {
        match value {
            QueryValue::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

impl ObjectQuery {
    /// Value of `name`, null when the object has no such property.
    pub fn get_property(&self, name: &str) -> AnyQuery {
        let description = self.description().append_call("getProperty", vec![name.into()]);
        let name = name.to_string();
        AnyQuery::from_node(map_output(self, description, move |_, mut fields| {
            Ok(fields.remove(&name).unwrap_or_default())
        }))
    }
}
