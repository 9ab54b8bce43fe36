/*
    Query nodes and the two ways of running them.

    A QueryNode is a description plus a thunk. Locally the thunk awaits the parent node and
    transforms its value through the capability traits. Remotely every thunk ignores the parent
    and hands its whole description to the RemoteExecutor, so one perform is one round trip.
*/
use crate::description::CONSTRUCTOR_NAME;
use crate::imports::*;

pub mod installer;
pub mod locator;
pub mod remote;

use remote::RemoteExecutor;

pub type PerformFuture = Pin<Box<dyn Future<Output = QueryResult<QueryValue>> + Send>>;
pub(crate) type NodeThunk = Arc<dyn Fn() -> PerformFuture + Send + Sync>;

/*
    Types:
    * LocalBackend - Capabilities used when evaluating in-process
    * Backend - Where the nodes of a chain run
    * QueryContext - Config and backend shared by every node of one chain
    * QueryNode - Description plus the thunk that resolves it
*/
#[derive(Clone)]
pub struct LocalBackend {
    pub dom: Arc<dyn DomLibrary>,
    pub scripts: Arc<dyn ScriptHost>,
}

impl LocalBackend {
    pub fn new(dom: Arc<dyn DomLibrary>, scripts: Arc<dyn ScriptHost>) -> Self {
        LocalBackend { dom, scripts }
    }
}

#[derive(Clone)]
pub enum Backend {
    Local(LocalBackend),
    Remote(Arc<RemoteExecutor>),
}

pub struct QueryContext {
    pub config: Config,
    pub backend: Backend,
}

impl QueryContext {
    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }
}

#[derive(Clone)]
pub struct QueryNode {
    description: QueryDescription,
    context: Arc<QueryContext>,
    thunk: NodeThunk,
}

impl QueryNode {
    /// Root of a local chain. The description starts with the constructor call
    /// carrying the config; resolving the root does nothing.
    pub(crate) fn local(config: Config, backend: LocalBackend) -> Self {
        let description = QueryDescription::new()
            .append_call(CONSTRUCTOR_NAME, vec![CallArgument::options(Some(&config))]);
        QueryNode {
            description,
            context: Arc::new(QueryContext {
                config,
                backend: Backend::Local(backend),
            }),
            thunk: Arc::new(|| -> PerformFuture { Box::pin(async { Ok(QueryValue::Null) }) }),
        }
    }

    /// Root of a remote chain. The executor prepends the constructor itself, so
    /// the description starts empty and resolving it only runs the precondition.
    pub(crate) fn remote(executor: Arc<RemoteExecutor>) -> Self {
        let description = QueryDescription::new();
        let thunk = remote_thunk(&executor, &description);
        QueryNode {
            description,
            context: Arc::new(QueryContext {
                config: *executor.config(),
                backend: Backend::Remote(executor),
            }),
            thunk,
        }
    }

    pub fn description(&self) -> &QueryDescription {
        &self.description
    }

    pub fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn remote_executor(&self) -> Option<&Arc<RemoteExecutor>> {
        match &self.context.backend {
            Backend::Remote(executor) => Some(executor),
            Backend::Local(_) => None,
        }
    }

    // Local chains carry the constructor as their first element
    fn describe(&self) -> String {
        let skip = if self.context.is_remote() { 0 } else { 1 };
        self.description.build_description(skip)
    }

    pub async fn perform(&self) -> QueryResult<QueryValue> {
        let tracker = QueryLogger::global().start(self.context.config.should_log, || {
            format!("perform: {}", self.describe())
        });
        match (self.thunk)().await {
            Ok(value) => {
                tracker.debug(|| format!("success: {}", value));
                Ok(value)
            }
            Err(err) => {
                tracker.debug(|| format!("failure: {}", err));
                Err(err)
            }
        }
    }

    pub(crate) fn as_thunk(&self) -> NodeThunk {
        let node = self.clone();
        Arc::new(move || -> PerformFuture {
            let node = node.clone();
            Box::pin(async move { node.perform().await })
        })
    }

    /// New node sharing this node's context. Locally `op` receives this node as
    /// the parent; any error it raises that is not already a `QueryError` is
    /// wrapped once, naming `description`.
    pub(crate) fn derive<F, Fut>(&self, description: QueryDescription, op: F) -> QueryNode
    where
        F: Fn(QueryNode, LocalBackend) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<QueryValue>> + Send + 'static,
    {
        let thunk: NodeThunk = match &self.context.backend {
            Backend::Remote(executor) => remote_thunk(executor, &description),
            Backend::Local(backend) => {
                let parent = self.clone();
                let backend = backend.clone();
                let op = Arc::new(op);
                let description = description.clone();
                Arc::new(move || -> PerformFuture {
                    let op = op.clone();
                    let parent = parent.clone();
                    let backend = backend.clone();
                    let description = description.clone();
                    Box::pin(async move {
                        op(parent, backend)
                            .await
                            .map_err(|err| QueryError::from_foreign(err, &description))
                    })
                })
            }
        };
        QueryNode {
            description,
            context: self.context.clone(),
            thunk,
        }
    }

    /// Derives a node that transforms this node's resolved value synchronously.
    pub(crate) fn map_value<F>(&self, description: QueryDescription, f: F) -> QueryNode
    where
        F: Fn(&LocalBackend, QueryValue) -> Result<QueryValue> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.derive(description, move |parent, backend| {
            let f = f.clone();
            async move {
                let value = parent.perform().await?;
                f(&backend, value)
            }
        })
    }

    /// Node that resolves to an already known value. Used for the per-item nodes
    /// of array scans, which only ever run in-process.
    pub(crate) fn with_value(&self, description: QueryDescription, value: QueryValue) -> QueryNode {
        QueryNode {
            description,
            context: self.context.clone(),
            thunk: Arc::new(move || -> PerformFuture {
                let value = value.clone();
                Box::pin(async move { Ok(value) })
            }),
        }
    }

    /// Node resolved by an arbitrary local thunk. Remote chains ignore `thunk`
    /// and send the description instead.
    pub(crate) fn with_thunk(&self, description: QueryDescription, thunk: NodeThunk) -> QueryNode {
        let thunk = match &self.context.backend {
            Backend::Remote(executor) => remote_thunk(executor, &description),
            Backend::Local(_) => thunk,
        };
        QueryNode {
            description,
            context: self.context.clone(),
            thunk,
        }
    }
}

fn remote_thunk(executor: &Arc<RemoteExecutor>, description: &QueryDescription) -> NodeThunk {
    let executor = executor.clone();
    let description = description.clone();
    Arc::new(move || -> PerformFuture {
        let executor = executor.clone();
        let description = description.clone();
        Box::pin(async move { executor.perform(&description).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeDom, init_tracing};

    fn root() -> QueryNode {
        let dom = Arc::new(FakeDom::new());
        QueryNode::local(Config::default(), LocalBackend::new(dom.clone(), dom))
    }

    #[tokio::test]
    async fn test_local_root_starts_with_constructor() {
        init_tracing();
        let node = root();
        assert_eq!(node.description().len(), 1);
        assert!(
            node.description()
                .build_description(0)
                .starts_with("new sbq.Query({")
        );
        assert_eq!(node.perform().await.unwrap(), QueryValue::Null);
    }

    #[tokio::test]
    async fn test_derived_node_wraps_foreign_errors_once() {
        let node = root();
        let description = node.description().append_call("explode", vec![]);
        let failing = node.derive(description, |_, _| async {
            Err::<QueryValue, _>(anyhow::anyhow!("boom"))
        });
        let err = failing.perform().await.unwrap_err();
        assert!(err.is(ErrorKind::Execution));
        assert!(err.message().starts_with("In a sub-query: explode()"));
        assert!(err.message().contains("--> Error: boom"));
    }

    #[tokio::test]
    async fn test_derived_node_passes_query_errors_through() {
        let node = root();
        let description = node.description().append_call("missing", vec![]);
        let failing = node.derive(description, |_, _| async {
            Err::<QueryValue, anyhow::Error>(
                QueryError::new(ErrorKind::NoSuchElement, "nothing here").into(),
            )
        });
        let err = failing.perform().await.unwrap_err();
        assert!(err.is(ErrorKind::NoSuchElement));
        assert_eq!(err.message(), "nothing here");
    }

    #[tokio::test]
    async fn test_map_value_sees_parent_value() {
        let node = root();
        let constant = node.with_value(
            node.description().append_call("at", vec![0i64.into()]),
            QueryValue::from("abc"),
        );
        let length = constant.map_value(
            constant.description().append_call("length", vec![]),
            |_, value| Ok(QueryValue::from(value.as_str().map(str::len).unwrap_or(0))),
        );
        assert_eq!(length.perform().await.unwrap(), QueryValue::Number(3.0));
    }
}
