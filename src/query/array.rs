use super::{ConditionQuery, NumberQuery, TypedQuery};
use crate::imports::*;
use std::marker::PhantomData;

/// Largest integer a script number represents exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Array of items that are each wrapped as `Q` when addressed individually.
pub struct ArrayQuery<Q> {
    node: QueryNode,
    item_kind: ResultKind,
    item: PhantomData<fn() -> Q>,
}

impl<Q> Clone for ArrayQuery<Q> {
    fn clone(&self) -> Self {
        ArrayQuery {
            node: self.node.clone(),
            item_kind: self.item_kind,
            item: PhantomData,
        }
    }
}

impl<Q: TypedQuery> TypedQuery for ArrayQuery<Q> {
    const KIND: ResultKind = ResultKind::Array;
    type Output = Vec<Q::Output>;

    fn from_node(node: QueryNode) -> Self {
        ArrayQuery {
            node,
            item_kind: Q::KIND,
            item: PhantomData,
        }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn rewrap(&self, node: QueryNode) -> Self {
        ArrayQuery {
            node,
            item_kind: self.item_kind,
            item: PhantomData,
        }
    }

    fn decode(value: QueryValue) -> Option<Self::Output> {
        match value {
            QueryValue::Array(items) => items.into_iter().map(Q::decode).collect(),
            _ => None,
        }
    }
}

type ItemCondition<Q> = Arc<dyn Fn(Q) -> ConditionQuery + Send + Sync>;

#[derive(Clone, Copy)]
enum Scan {
    First,
    IndexOf,
    Filter,
}

impl<Q: TypedQuery> ArrayQuery<Q> {
    fn with_item_kind(node: QueryNode, item_kind: ResultKind) -> Self {
        ArrayQuery {
            node,
            item_kind,
            item: PhantomData,
        }
    }

    pub fn item_kind(&self) -> ResultKind {
        self.item_kind
    }

    fn item(&self, index: usize, value: QueryValue) -> Q {
        let description = self
            .description()
            .append_call("at", vec![(index as i64).into()]);
        Q::with_kind(self.node.with_value(description, value), self.item_kind)
    }

    fn items_of(value: QueryValue, description: &QueryDescription) -> QueryResult<Vec<QueryValue>> {
        match value {
            QueryValue::Array(items) => Ok(items),
            other => Err(QueryError::builder(
                ErrorKind::UnexpectedType,
                format!("Expected array but got {}", ResultKind::of(&other)),
            )
            .description(description)
            .build()),
        }
    }

    pub fn count(&self) -> NumberQuery {
        let description = self.description().append_call("count", vec![]);
        let source = self.description().clone();
        NumberQuery::from_node(self.node.map_value(description, move |_, value| {
            Ok(Self::items_of(value, &source)?.len().into())
        }))
    }

    /// Item at `index`. Negative indexes are out of bounds.
    pub fn at(&self, index: i64) -> Q {
        let description = self.description().append_call("at", vec![index.into()]);
        let source = self.description().clone();
        let node = self.node.map_value(description, move |_, value| {
            let mut items = Self::items_of(value, &source)?;
            if index.unsigned_abs() > MAX_SAFE_INTEGER {
                return Err(QueryError::new(
                    ErrorKind::Argument,
                    format!("index ({}) is not an integer", index),
                )
                .into());
            }
            match usize::try_from(index) {
                Ok(i) if i < items.len() => Ok(items.swap_remove(i)),
                _ => Err(QueryError::new(
                    ErrorKind::Argument,
                    format!("index ({}) is out of bounds ({})", index, items.len()),
                )
                .into()),
            }
        });
        Q::with_kind(node, self.item_kind)
    }

    // Sub-query argument recorded for item conditions and mappers, rendered
    // against a representative first item.
    fn item_sub_query<R: TypedQuery>(&self, f: Arc<dyn Fn(Q) -> R + Send + Sync>) -> CallArgument {
        let probe = self.at(0);
        let item_description = probe.description().clone();
        SubQueryInfo::new(&item_description, move || {
            SubQuery::Single(f(probe.clone()).description().clone())
        })
        .into()
    }

    fn scan(&self, name: &str, condition: ItemCondition<Q>, scan: Scan) -> QueryNode {
        let description = self
            .description()
            .append_call(name, vec![self.item_sub_query(condition.clone())]);
        let array = self.clone();
        self.node.derive(description, move |parent, _| {
            let array = array.clone();
            let condition = condition.clone();
            async move {
                let items = Self::items_of(parent.perform().await?, array.description())?;
                if items.is_empty() && !matches!(scan, Scan::Filter) {
                    return Err(QueryError::new(ErrorKind::Argument, "There are no items").into());
                }
                let mut kept = Vec::new();
                for (index, value) in items.into_iter().enumerate() {
                    let matched = condition(array.item(index, value.clone()))
                        .perform()
                        .await?;
                    if !matched {
                        continue;
                    }
                    match scan {
                        Scan::First => return Ok(value),
                        Scan::IndexOf => return Ok(index.into()),
                        Scan::Filter => kept.push(value),
                    }
                }
                match scan {
                    Scan::Filter => Ok(QueryValue::Array(kept)),
                    Scan::First | Scan::IndexOf => Err(QueryError::new(
                        ErrorKind::NoSuchElement,
                        "No items found matching the condition",
                    )
                    .into()),
                }
            }
        })
    }

    /// First item satisfying `condition`. Rejects when the array is empty or
    /// nothing matches.
    pub fn first(&self, condition: impl Fn(Q) -> ConditionQuery + Send + Sync + 'static) -> Q {
        Q::with_kind(
            self.scan("first", Arc::new(condition), Scan::First),
            self.item_kind,
        )
    }

    /// Index of the first item satisfying `condition`, with the same
    /// rejections as `first`.
    pub fn index_of(
        &self,
        condition: impl Fn(Q) -> ConditionQuery + Send + Sync + 'static,
    ) -> NumberQuery {
        NumberQuery::from_node(self.scan("indexOf", Arc::new(condition), Scan::IndexOf))
    }

    /// Items satisfying `condition`, possibly none. Never rejects for lack of
    /// matches.
    pub fn filter(&self, condition: impl Fn(Q) -> ConditionQuery + Send + Sync + 'static) -> Self {
        self.rewrap(self.scan("filter", Arc::new(condition), Scan::Filter))
    }

    /// Applies `f` to every item. `f` is called once while building, on a
    /// stand-in for the first item, to learn the wrapper kind of the results.
    pub fn map<R: TypedQuery>(
        &self,
        f: impl Fn(Q) -> R + Send + Sync + 'static,
    ) -> ArrayQuery<R> {
        let f: Arc<dyn Fn(Q) -> R + Send + Sync> = Arc::new(f);
        let mapped_kind = f(self.at(0)).kind();
        let description = self
            .description()
            .append_call("map", vec![self.item_sub_query(f.clone())]);
        let array = self.clone();
        let node = self.node.derive(description, move |parent, _| {
            let array = array.clone();
            let f = f.clone();
            async move {
                let items = Self::items_of(parent.perform().await?, array.description())?;
                let mut mapped = Vec::with_capacity(items.len());
                for (index, value) in items.into_iter().enumerate() {
                    mapped.push(f(array.item(index, value)).node().perform().await?);
                }
                Ok(QueryValue::Array(mapped))
            }
        });
        ArrayQuery::with_item_kind(node, mapped_kind)
    }
}
