use super::TypedQuery;
use crate::imports::*;

/// Result of `switch` and `first_truthy`: a query whose wrapper type was
/// settled while building, from the kinds of its branches.
#[derive(Clone)]
pub struct OneOfQuery {
    kind: ResultKind,
    node: QueryNode,
}

impl TypedQuery for OneOfQuery {
    const KIND: ResultKind = ResultKind::Any;
    type Output = QueryValue;

    fn from_node(node: QueryNode) -> Self {
        OneOfQuery {
            kind: ResultKind::Any,
            node,
        }
    }

    fn with_kind(node: QueryNode, kind: ResultKind) -> Self {
        OneOfQuery { kind, node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn kind(&self) -> ResultKind {
        self.kind
    }

    fn decode(value: QueryValue) -> Option<QueryValue> {
        Some(value)
    }
}

impl OneOfQuery {
    /// Converts into the wrapper matching the settled kind. A common kind of
    /// `Any` converts into every wrapper, the value is checked on perform.
    pub fn into_query<Q: TypedQuery>(self) -> QueryResult<Q> {
        if self.kind == Q::KIND || self.kind == ResultKind::Any || Q::KIND == ResultKind::Any {
            Ok(Q::with_kind(self.node, self.kind))
        } else {
            Err(QueryError::builder(
                ErrorKind::Argument,
                format!(
                    "The branches resolve to {} and cannot be used as {}",
                    self.kind,
                    Q::KIND
                ),
            )
            .description(self.node.description())
            .build())
        }
    }
}
