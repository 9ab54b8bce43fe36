/*
    Typed query wrappers.

    Every wrapper is a QueryNode plus the result kind it promises. Building a query only records
    a description and a thunk; nothing runs until `perform`. Combinators that mix wrapper types
    (switch, firstTruthy, map) settle on the resulting kind while the chain is built.
*/
use crate::execution::NodeThunk;
use crate::imports::*;
use crate::values::format_number;
use crate::wait::WaitOnce;

mod any;
mod array;
mod batch;
mod condition;
mod element;
mod nullable;
mod number;
mod object;
mod one_of;
mod root;
mod string;


pub use any::AnyQuery;
pub use array::ArrayQuery;
pub use batch::BatchSource;
pub use condition::ConditionQuery;
pub use element::ElementQuery;
pub use nullable::NullableStringQuery;
pub use number::NumberQuery;
pub use object::ObjectQuery;
pub use one_of::OneOfQuery;
pub use root::Query;
pub use string::{NumberConversion, StringQuery};

const DEFAULT_RELOAD_TIMEOUT: Duration = Duration::from_millis(1000);

/*
    Types:
    * TypedQuery - Shared contract of the typed wrappers: node access, kind and decoding
    * ErasedQuery - A typed query with its type forgotten, used where wrappers are mixed
    * Branch - Builder of one switch branch from the query it is attached to
    * SwitchCases - Truthy/falsy branches, or keyed options with an optional fallback
    * QueryExt - Combinators available on every typed query
*/
pub trait TypedQuery: Clone + Send + Sync + Sized + 'static {
    const KIND: ResultKind;
    type Output: Send;

    fn from_node(node: QueryNode) -> Self;
    fn node(&self) -> &QueryNode;
    fn decode(value: QueryValue) -> Option<Self::Output>;

    /// Wrapper over `node` resolving to `kind`. Only wrappers whose kind is
    /// decided while building (one-of, arrays) look at it.
    fn with_kind(node: QueryNode, _kind: ResultKind) -> Self {
        Self::from_node(node)
    }

    fn kind(&self) -> ResultKind {
        Self::KIND
    }

    /// Same wrapper type and kind as `self` over another node.
    fn rewrap(&self, node: QueryNode) -> Self {
        Self::with_kind(node, self.kind())
    }

    fn description(&self) -> &QueryDescription {
        self.node().description()
    }

    fn perform(&self) -> impl Future<Output = QueryResult<Self::Output>> + Send {
        let node = self.node().clone();
        async move {
            let value = node.perform().await?;
            decode_as::<Self>(value, node.description())
        }
    }
}

pub(crate) fn decode_as<Q: TypedQuery>(
    value: QueryValue,
    description: &QueryDescription,
) -> QueryResult<Q::Output> {
    let found = ResultKind::of(&value);
    Q::decode(value).ok_or_else(|| {
        QueryError::builder(
            ErrorKind::UnexpectedType,
            format!("Expected {} but got {}", Q::KIND, found),
        )
        .description(description)
        .build()
    })
}

/// Derives a node from `query` that transforms its decoded value synchronously.
pub(crate) fn map_output<Q, F>(query: &Q, description: QueryDescription, f: F) -> QueryNode
where
    Q: TypedQuery,
    F: Fn(&LocalBackend, Q::Output) -> Result<QueryValue> + Send + Sync + 'static,
{
    let source = query.description().clone();
    query.node().map_value(description, move |backend, value| {
        f(backend, decode_as::<Q>(value, &source)?)
    })
}

/// Derives a node resolving to `fallback` when this one rejects, or, with
/// `or_falsy`, also when it resolves falsy.
pub(crate) fn recover<Q: TypedQuery>(
    query: &Q,
    name: &'static str,
    fallback: QueryValue,
    or_falsy: bool,
) -> QueryNode {
    let description = query
        .description()
        .append_call(name, vec![CallArgument::value(fallback.to_json())]);
    query.node().derive(description, move |parent, _| {
        let fallback = fallback.clone();
        async move {
            match parent.perform().await {
                Ok(value) if !or_falsy || value.is_truthy() => Ok(value),
                Ok(_) => Ok(fallback),
                Err(err) => {
                    tracing::debug!(error = %err, "{}, ignoring error", name);
                    Ok(fallback)
                }
            }
        }
    })
}

fn option_arguments(options: Option<&WaitOptions>) -> Vec<CallArgument> {
    options
        .map(|o| vec![CallArgument::options(Some(o))])
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct ErasedQuery {
    kind: ResultKind,
    node: QueryNode,
}

impl ErasedQuery {
    pub fn new<Q: TypedQuery>(query: &Q) -> Self {
        ErasedQuery {
            kind: query.kind(),
            node: query.node().clone(),
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn description(&self) -> &QueryDescription {
        self.node.description()
    }

    pub async fn perform(&self) -> QueryResult<QueryValue> {
        self.node.perform().await
    }
}

pub struct Branch<P>(Arc<dyn Fn(P) -> ErasedQuery + Send + Sync>);

impl<P> Clone for Branch<P> {
    fn clone(&self) -> Self {
        Branch(self.0.clone())
    }
}

impl<P: 'static> Branch<P> {
    pub fn new<Q: TypedQuery>(f: impl Fn(P) -> Q + Send + Sync + 'static) -> Self {
        Branch(Arc::new(move |parent| ErasedQuery::new(&f(parent))))
    }

    fn build(&self, parent: P) -> ErasedQuery {
        (self.0)(parent)
    }
}

type OptionsBuilder<P> = Arc<dyn Fn(P) -> Vec<(String, ErasedQuery)> + Send + Sync>;

pub enum SwitchCases<P> {
    Truthy {
        truthy: Branch<P>,
        falsy: Branch<P>,
    },
    /// Keys are matched against the tested string, or the tested number
    /// formatted the way scripts print it (`"1"`, `"2.5"`).
    Options {
        options: OptionsBuilder<P>,
        fallback: Option<Branch<P>>,
    },
}

impl<P: 'static> SwitchCases<P> {
    pub fn truthy<A: TypedQuery, B: TypedQuery>(
        truthy: impl Fn(P) -> A + Send + Sync + 'static,
        falsy: impl Fn(P) -> B + Send + Sync + 'static,
    ) -> Self {
        SwitchCases::Truthy {
            truthy: Branch::new(truthy),
            falsy: Branch::new(falsy),
        }
    }

    pub fn options(
        options: impl Fn(P) -> Vec<(String, ErasedQuery)> + Send + Sync + 'static,
    ) -> Self {
        SwitchCases::Options {
            options: Arc::new(options),
            fallback: None,
        }
    }

    pub fn options_or<Q: TypedQuery>(
        options: impl Fn(P) -> Vec<(String, ErasedQuery)> + Send + Sync + 'static,
        fallback: impl Fn(P) -> Q + Send + Sync + 'static,
    ) -> Self {
        SwitchCases::Options {
            options: Arc::new(options),
            fallback: Some(Branch::new(fallback)),
        }
    }
}

fn sub_query(parent: &QueryDescription, query: &ErasedQuery) -> CallArgument {
    let description = query.description().clone();
    SubQueryInfo::new(parent, move || SubQuery::Single(description.clone())).into()
}

fn sub_query_map(parent: &QueryDescription, entries: &[(String, ErasedQuery)]) -> CallArgument {
    let entries = entries
        .iter()
        .map(|(key, query)| (key.clone(), query.description().clone()))
        .collect::<Vec<_>>();
    SubQueryInfo::new(parent, move || {
        SubQuery::Map(
            entries
                .iter()
                .map(|(key, description)| (key.clone(), SubQuery::Single(description.clone())))
                .collect(),
        )
    })
    .into()
}

fn sub_query_list(parent: &QueryDescription, queries: &[ErasedQuery]) -> CallArgument {
    let descriptions = queries
        .iter()
        .map(|q| q.description().clone())
        .collect::<Vec<_>>();
    SubQueryInfo::new(parent, move || {
        SubQuery::List(
            descriptions
                .iter()
                .map(|d| SubQuery::Single(d.clone()))
                .collect(),
        )
    })
    .into()
}

enum ResolvedCases {
    Truthy {
        truthy: ErasedQuery,
        falsy: ErasedQuery,
    },
    Options {
        options: Vec<(String, ErasedQuery)>,
        fallback: Option<ErasedQuery>,
    },
}

/// Builds a switch over `test`. `test_argument` is recorded first when the
/// tested query is not the receiver itself.
pub(crate) fn build_switch<P: Clone + 'static>(
    parent: P,
    parent_node: &QueryNode,
    test: ErasedQuery,
    test_argument: Option<CallArgument>,
    cases: SwitchCases<P>,
) -> QueryResult<OneOfQuery> {
    let parent_description = parent_node.description();
    let mut arguments: Vec<CallArgument> = test_argument.into_iter().collect();
    let resolved = match cases {
        SwitchCases::Truthy { truthy, falsy } => {
            let truthy = truthy.build(parent.clone());
            let falsy = falsy.build(parent);
            arguments.push(sub_query(parent_description, &truthy));
            arguments.push(sub_query(parent_description, &falsy));
            ResolvedCases::Truthy { truthy, falsy }
        }
        SwitchCases::Options { options, fallback } => {
            if !matches!(test.kind(), ResultKind::String | ResultKind::Number) {
                return Err(QueryError::new(
                    ErrorKind::Argument,
                    "When processing list of options only string or number returning query can be used",
                ));
            }
            let options = options(parent.clone());
            let fallback = fallback.map(|f| f.build(parent));
            arguments.push(sub_query_map(parent_description, &options));
            if let Some(fallback) = &fallback {
                arguments.push(sub_query(parent_description, fallback));
            }
            ResolvedCases::Options { options, fallback }
        }
    };

    let kind = match &resolved {
        ResolvedCases::Truthy { truthy, falsy } => {
            ResultKind::common([truthy.kind(), falsy.kind()])
        }
        ResolvedCases::Options { options, fallback } => ResultKind::common(
            options
                .iter()
                .map(|(_, q)| q.kind())
                .chain(fallback.iter().map(ErasedQuery::kind)),
        ),
    };

    let description = parent_description.append_call("switch", arguments);
    let resolved = Arc::new(resolved);
    let thunk_description = description.clone();
    let thunk: NodeThunk = Arc::new(move || -> PerformFuture {
        let test = test.clone();
        let resolved = resolved.clone();
        let description = thunk_description.clone();
        Box::pin(async move {
            let value = test.perform().await?;
            let next = match resolved.as_ref() {
                ResolvedCases::Truthy { truthy, falsy } => {
                    if value.is_truthy() {
                        truthy
                    } else {
                        falsy
                    }
                }
                ResolvedCases::Options { options, fallback } => {
                    let key = match &value {
                        QueryValue::Number(n) => format_number(*n),
                        other => other.to_string(),
                    };
                    match options.iter().find(|(k, _)| *k == key) {
                        Some((_, query)) => query,
                        None => fallback.as_ref().ok_or_else(|| {
                            QueryError::builder(
                                ErrorKind::OutOfOptions,
                                format!(
                                    "None of the sub-queries match the resulting value: {}",
                                    value
                                ),
                            )
                            .description(&description)
                            .build()
                        })?,
                    }
                }
            };
            next.perform().await
        })
    });
    Ok(OneOfQuery::with_kind(
        parent_node.with_thunk(description, thunk),
        kind,
    ))
}

pub(crate) fn build_first_truthy(
    parent_node: &QueryNode,
    candidates: Vec<ErasedQuery>,
) -> QueryResult<OneOfQuery> {
    if candidates.is_empty() {
        return Err(QueryError::new(
            ErrorKind::Argument,
            "Expected the first parameter to be a non-empty Array of queries or a function that returns a non-empty Array of queries, received an empty array instead",
        ));
    }
    let kind = ResultKind::common(candidates.iter().map(ErasedQuery::kind));
    let description = parent_node.description().append_call(
        "firstTruthy",
        vec![sub_query_list(parent_node.description(), &candidates)],
    );
    let candidates = Arc::new(candidates);
    let thunk_description = description.clone();
    let thunk: NodeThunk = Arc::new(move || -> PerformFuture {
        let candidates = candidates.clone();
        let description = thunk_description.clone();
        Box::pin(async move {
            for (index, candidate) in candidates.iter().enumerate() {
                match candidate.perform().await {
                    Ok(value) if value.is_truthy() => return Ok(value),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(index, error = %err, "firstTruthy, ignoring error");
                    }
                }
            }
            Err(QueryError::builder(
                ErrorKind::OutOfOptions,
                "None of the sub-queries resolved or all of them resolved as falsy",
            )
            .description(&description)
            .build())
        })
    });
    Ok(OneOfQuery::with_kind(
        parent_node.with_thunk(description, thunk),
        kind,
    ))
}

/// Node that waits once for `condition` to turn truthy and then resolves
/// `pre_wait`, or the condition's own value when there is none.
pub(crate) fn build_wait(
    parent_node: &QueryNode,
    description: QueryDescription,
    pre_wait: Option<NodeThunk>,
    condition: NodeThunk,
    options: Option<&WaitOptions>,
) -> QueryNode {
    let config = parent_node.config();
    let wait = WaitOnce::new(
        pre_wait,
        condition,
        WaitSettings::effective(config, options),
        description.clone(),
        config.should_log,
    );
    let thunk: NodeThunk = Arc::new(move || -> PerformFuture {
        let wait = wait.clone();
        Box::pin(async move { wait.perform().await })
    });
    parent_node.with_thunk(description, thunk)
}

pub(crate) fn build_execute(
    parent_node: &QueryNode,
    script: Script,
    args: Vec<QueryValue>,
    pass_parent: bool,
) -> AnyQuery {
    let mut arguments = vec![script.to_argument()];
    arguments.extend(args.iter().map(|a| CallArgument::value(a.to_json())));
    let description = parent_node.description().append_call("execute", arguments);
    AnyQuery::from_node(parent_node.derive(description, move |parent, backend| {
        let script = script.clone();
        let args = args.clone();
        async move {
            let value = parent.perform().await?;
            let mut all = Vec::with_capacity(args.len() + 1);
            if pass_parent {
                all.push(value);
            }
            all.extend(args);
            script.evaluate(backend.scripts.as_ref(), &all).await
        }
    }))
}

pub(crate) async fn expect_page_reload(
    node: &QueryNode,
    timeout: Option<Duration>,
) -> QueryResult<()> {
    let executor = node.remote_executor().cloned().ok_or_else(|| {
        QueryError::new(
            ErrorKind::Argument,
            "Page reloads can only be expected from queries running in a remote browser",
        )
    })?;
    match node.perform().await {
        Ok(_) => {
            executor
                .wait_for_unload(timeout.unwrap_or(DEFAULT_RELOAD_TIMEOUT))
                .await?;
            if executor.is_installed().await? {
                return Err(QueryError::new(
                    ErrorKind::Argument,
                    "The page was expected to be reloaded. Did you trigger the reload?",
                ));
            }
            Ok(())
        }
        Err(err) if err.is(ErrorKind::PageReloaded) => {
            tracing::debug!("page reloaded as expected");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

pub trait QueryExt: TypedQuery {
    /// Re-evaluates this query until it resolves truthy. The wait happens once
    /// per built query; later performs replay the outcome.
    fn retry(&self, options: Option<WaitOptions>) -> Self {
        let description = self
            .description()
            .append_call("retry", option_arguments(options.as_ref()));
        self.rewrap(build_wait(
            self.node(),
            description,
            None,
            self.node().as_thunk(),
            options.as_ref(),
        ))
    }

    /// Waits once for `condition` to hold, then resolves this query.
    fn wait_until(
        &self,
        condition: impl Fn(Self) -> ConditionQuery,
        options: Option<WaitOptions>,
    ) -> Self {
        let condition = condition(self.clone());
        let mut arguments = vec![sub_query(self.description(), &condition.erase())];
        arguments.extend(option_arguments(options.as_ref()));
        let description = self.description().append_call("waitUntil", arguments);
        self.rewrap(build_wait(
            self.node(),
            description,
            Some(self.node().as_thunk()),
            condition.node().as_thunk(),
            options.as_ref(),
        ))
    }

    /// Switches over this query's own value.
    fn switch(&self, cases: SwitchCases<Self>) -> QueryResult<OneOfQuery> {
        build_switch(self.clone(), self.node(), self.erase(), None, cases)
    }

    fn first_truthy(
        &self,
        candidates: impl FnOnce(Self) -> Vec<ErasedQuery>,
    ) -> QueryResult<OneOfQuery> {
        build_first_truthy(self.node(), candidates(self.clone()))
    }

    fn batch(&self, source: BatchSource<Self>) -> QueryResult<ObjectQuery> {
        batch::build_batch(self.clone(), self.node(), source)
    }

    /// Runs `script` with this query's value as the first argument.
    fn execute(&self, script: impl Into<Script>, args: Vec<QueryValue>) -> AnyQuery {
        build_execute(self.node(), script.into(), args, true)
    }

    /// Performs this query in a remote browser and expects it to reload the page.
    fn expect_page_reload(
        &self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = QueryResult<()>> + Send {
        let node = self.node().clone();
        async move { expect_page_reload(&node, timeout).await }
    }

    fn erase(&self) -> ErasedQuery {
        ErasedQuery::new(self)
    }
}

impl<Q: TypedQuery> QueryExt for Q {}
