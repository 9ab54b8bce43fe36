use super::batch::build_batch;
use super::{
    AnyQuery, ArrayQuery, BatchSource, ConditionQuery, ElementQuery, ErasedQuery, ObjectQuery,
    OneOfQuery, SwitchCases, TypedQuery, build_execute, build_first_truthy, build_switch,
    build_wait, expect_page_reload, option_arguments, sub_query, sub_query_list,
};
use crate::execution::NodeThunk;
use crate::execution::locator::Locator;
use crate::execution::remote::RemoteExecutor;
use crate::imports::*;

/// Entry point of every chain. Resolving the root itself does nothing beyond
/// the remote precondition; it exists so chains can branch, wait and batch
/// before touching an element.
#[derive(Clone)]
pub struct Query {
    node: QueryNode,
}

impl Query {
    /// Chain evaluated in-process against `backend`. Fails when `config` does
    /// not validate.
    pub fn local(backend: LocalBackend, config: Config) -> QueryResult<Self> {
        config.validate()?;
        Ok(Query {
            node: QueryNode::local(config, backend),
        })
    }

    /// Chain sent to a remote browser in one round trip per perform.
    pub fn remote(executor: Arc<RemoteExecutor>) -> Self {
        Query {
            node: QueryNode::remote(executor),
        }
    }

    /// Root whose first perform navigates to `url` and makes sure the query
    /// library is installed there.
    pub fn get(&self, url: &str) -> QueryResult<Query> {
        let executor = self.node.remote_executor().ok_or_else(|| {
            QueryError::new(
                ErrorKind::Argument,
                "Navigation is only supported by queries running in a remote browser",
            )
        })?;
        Ok(Query::remote(Arc::new(executor.navigate(url))))
    }

    pub fn description(&self) -> &QueryDescription {
        self.node.description()
    }

    pub fn config(&self) -> &Config {
        self.node.config()
    }

    pub fn find_element(&self, selector: &str) -> ElementQuery {
        let description = self
            .description()
            .append_call("findElement", vec![selector.into()]);
        let described = description.clone();
        let selector = selector.to_string();
        ElementQuery::from_node(self.node.derive(description, move |parent, backend| {
            let selector = selector.clone();
            let described = described.clone();
            async move {
                parent.perform().await?;
                Ok(backend.dom.select_first(&selector, None, &described)?.into())
            }
        }))
    }

    pub fn find_element_by(&self, locator: &Locator) -> QueryResult<ElementQuery> {
        Ok(self.find_element(locator.selector()?))
    }

    pub fn find_elements(&self, selector: &str) -> ArrayQuery<ElementQuery> {
        let description = self
            .description()
            .append_call("findElements", vec![selector.into()]);
        let selector = selector.to_string();
        ArrayQuery::from_node(self.node.derive(description, move |parent, backend| {
            let selector = selector.clone();
            async move {
                parent.perform().await?;
                Ok(backend.dom.select(&selector, None)?.into())
            }
        }))
    }

    pub fn find_elements_by(&self, locator: &Locator) -> QueryResult<ArrayQuery<ElementQuery>> {
        Ok(self.find_elements(locator.selector()?))
    }

    /// Runs `script` in the page with `args`.
    pub fn execute(&self, script: impl Into<Script>, args: Vec<QueryValue>) -> AnyQuery {
        build_execute(&self.node, script.into(), args, false)
    }

    /// Keys of the resolved object come back sorted.
    pub fn batch(&self, source: BatchSource<Query>) -> QueryResult<ObjectQuery> {
        build_batch(self.clone(), &self.node, source)
    }

    /// Performs the queries built by `builder` one after another, stopping at
    /// the first rejection. Resolves to null.
    pub fn sequence(&self, builder: impl FnOnce(Query) -> Vec<ErasedQuery>) -> Query {
        let queries = builder(self.clone());
        let description = self
            .description()
            .append_call("sequence", vec![sub_query_list(self.description(), &queries)]);
        let queries = Arc::new(queries);
        let thunk: NodeThunk = Arc::new(move || -> PerformFuture {
            let queries = queries.clone();
            Box::pin(async move {
                for query in queries.iter() {
                    query.perform().await?;
                }
                Ok(QueryValue::Null)
            })
        });
        Query {
            node: self.node.with_thunk(description, thunk),
        }
    }

    /// Waits once for `condition` before anything chained after it runs.
    pub fn wait_until(
        &self,
        condition: impl FnOnce(Query) -> ConditionQuery,
        options: Option<WaitOptions>,
    ) -> Query {
        let condition = condition(self.clone());
        let mut arguments = vec![sub_query(self.description(), &ErasedQuery::new(&condition))];
        arguments.extend(option_arguments(options.as_ref()));
        let description = self.description().append_call("waitUntil", arguments);
        Query {
            node: build_wait(
                &self.node,
                description,
                Some(self.node.as_thunk()),
                condition.node().as_thunk(),
                options.as_ref(),
            ),
        }
    }

    /// Dispatches on the value of `test`, a condition for truthy/falsy cases or
    /// a string or number for keyed options.
    pub fn switch<T: TypedQuery>(
        &self,
        test: impl FnOnce(Query) -> T,
        cases: SwitchCases<Query>,
    ) -> QueryResult<OneOfQuery> {
        let test = ErasedQuery::new(&test(self.clone()));
        let test_argument = sub_query(self.description(), &test);
        build_switch(self.clone(), &self.node, test, Some(test_argument), cases)
    }

    /// First candidate resolving truthy; rejections count as falsy.
    pub fn first_truthy(
        &self,
        candidates: impl FnOnce(Query) -> Vec<ErasedQuery>,
    ) -> QueryResult<OneOfQuery> {
        build_first_truthy(&self.node, candidates(self.clone()))
    }

    pub async fn perform(&self) -> QueryResult<()> {
        self.node.perform().await.map(|_| ())
    }

    pub async fn expect_page_reload(&self, timeout: Option<Duration>) -> QueryResult<()> {
        expect_page_reload(&self.node, timeout).await
    }
}
