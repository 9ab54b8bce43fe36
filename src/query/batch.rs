use super::{ErasedQuery, ObjectQuery, TypedQuery};
use crate::imports::*;
use tokio::task::JoinSet;

type BatchBuilder<P> = Arc<dyn Fn(P) -> Vec<(String, ErasedQuery)> + Send + Sync>;

/// Sub-queries of a batch: given directly, or built from the query the batch
/// is attached to. Entries given directly must still be chained off that query.
pub enum BatchSource<P> {
    Map(Vec<(String, ErasedQuery)>),
    Builder(BatchBuilder<P>),
}

impl<P> BatchSource<P> {
    pub fn builder(f: impl Fn(P) -> Vec<(String, ErasedQuery)> + Send + Sync + 'static) -> Self {
        BatchSource::Builder(Arc::new(f))
    }
}

/// Performs the parent, then every entry concurrently. The first entry to
/// reject aborts the rest. Resolves to an object keyed by entry name; keys come
/// back in sorted order, not in the order the entries were given.
pub(crate) fn build_batch<P>(
    parent: P,
    parent_node: &QueryNode,
    source: BatchSource<P>,
) -> QueryResult<ObjectQuery> {
    let entries = match source {
        BatchSource::Map(entries) => entries,
        BatchSource::Builder(f) => f(parent),
    };
    // Entries render relative to the receiver, so each must be chained off it
    if let Some((key, _)) = entries
        .iter()
        .find(|(_, query)| !query.description().extends(parent_node.description()))
    {
        return Err(QueryError::new(
            ErrorKind::Argument,
            format!(
                "batch entry '{}' is not chained off the query the batch is attached to",
                key
            ),
        ));
    }
    let argument = super::sub_query_map(parent_node.description(), &entries);
    let description = parent_node.description().append_call("batch", vec![argument]);
    let entries = Arc::new(entries);
    Ok(ObjectQuery::from_node(parent_node.derive(description, move |parent, _| {
        let entries = entries.clone();
        async move {
            parent.perform().await?;
            let mut tasks = JoinSet::new();
            for (index, (_, query)) in entries.iter().enumerate() {
                let query = query.clone();
                tasks.spawn(async move { (index, query.perform().await) });
            }
            let mut results = vec![QueryValue::Null; entries.len()];
            while let Some(joined) = tasks.join_next().await {
                let (index, outcome) = joined.context("batch entry task failed")?;
                match outcome {
                    Ok(value) => results[index] = value,
                    Err(err) => {
                        tasks.abort_all();
                        return Err(err.into());
                    }
                }
            }
            let fields = entries
                .iter()
                .map(|(key, _)| key.clone())
                .zip(results)
                .collect::<BTreeMap<_, _>>();
            Ok(QueryValue::Object(fields))
        }
    })))
}
