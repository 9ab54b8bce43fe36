/*
    Query descriptions record a chain of method calls without running any of them.

    The same chain renders two ways:
    * build - executable script text; plain arguments are moved into a side array and referenced as `_args[i]`
    * build_description - human readable text used in error messages and logs

    Appending never mutates: every append returns a new description sharing the existing elements.
*/
use crate::imports::*;

mod argument;
#[cfg(test)]
mod tests;

pub use argument::{CallArgument, NativeFn, RegexArg, SubQuery, SubQueryInfo};

/*
    Consts:
    * CONSTRUCTOR_NAME - Constructor call every remote chain starts with
    * IS_INSTALLED_EXPRESSION - Guard that tells whether the query library is present in the page
    * SUB_QUERY_VAR - Parameter name sub-query closures are rendered with
*/
pub const CONSTRUCTOR_NAME: &str = "new sbq.Query";
pub const IS_INSTALLED_EXPRESSION: &str = "(!!window.sbq && !!window.sbq.Query)";
const SUB_QUERY_VAR: &str = "q";

static COVERAGE_COUNTERS: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)(/\* istanbul ignore next \*/)?(cov_[^;]*;)+")
        .expect("coverage counter pattern is valid")
});

/*
    Types:
    * ChainElement - One recorded step, a method call or a raw script fragment
    * QueryCall - Rendered script plus the argument array it refers to
    * QueryDescription - Immutable, structurally shared chain of elements
*/
#[derive(Debug, Clone)]
pub enum ChainElement {
    MethodCall {
        name: String,
        arguments: Vec<CallArgument>,
    },
    Script(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryCall {
    pub script: String,
    pub arguments: Vec<JsonValue>,
}

#[derive(Clone, Default)]
pub struct QueryDescription {
    calls: Arc<Vec<Arc<ChainElement>>>,
}

impl std::fmt::Debug for QueryDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("QueryDescription")
            .field(&self.build_description(0))
            .finish()
    }
}

impl QueryDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: impl IntoIterator<Item = ChainElement>) -> Self {
        QueryDescription {
            calls: Arc::new(elements.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = &ChainElement> {
        self.calls.iter().map(|c| c.as_ref())
    }

    /// True when this chain was appended onto `prefix`, sharing its elements.
    pub fn extends(&self, prefix: &QueryDescription) -> bool {
        self.calls.len() >= prefix.calls.len()
            && self
                .calls
                .iter()
                .zip(prefix.calls.iter())
                .all(|(own, shared)| Arc::ptr_eq(own, shared))
    }

    fn with(&self, element: ChainElement, at_front: bool) -> Self {
        let mut calls = Vec::with_capacity(self.calls.len() + 1);
        if at_front {
            calls.push(Arc::new(element));
            calls.extend(self.calls.iter().cloned());
        } else {
            calls.extend(self.calls.iter().cloned());
            calls.push(Arc::new(element));
        }
        QueryDescription {
            calls: Arc::new(calls),
        }
    }

    pub fn append_call(&self, name: &str, arguments: Vec<CallArgument>) -> Self {
        self.with(
            ChainElement::MethodCall {
                name: name.to_string(),
                arguments,
            },
            false,
        )
    }

    pub fn append_script(&self, script: impl Into<String>) -> Self {
        self.with(ChainElement::Script(script.into()), false)
    }

    pub fn prepend_constructor(&self, name: &str, arguments: Vec<CallArgument>) -> Self {
        self.with(
            ChainElement::MethodCall {
                name: name.to_string(),
                arguments,
            },
            true,
        )
    }

    /// Renders the chain from element `skip` onward. Plain values are appended to
    /// `arguments` and referenced positionally.
    pub fn build(&self, arguments: Vec<JsonValue>, skip: usize) -> QueryResult<QueryCall> {
        let mut arguments = arguments;
        let script = self.render(&mut arguments, skip)?;
        Ok(QueryCall { script, arguments })
    }

    fn render(&self, arguments: &mut Vec<JsonValue>, skip: usize) -> QueryResult<String> {
        let mut steps = Vec::with_capacity(self.calls.len().saturating_sub(skip));
        for element in self.calls.iter().skip(skip) {
            match element.as_ref() {
                ChainElement::MethodCall { name, arguments: call_args } => {
                    let mut rendered = Vec::with_capacity(call_args.len());
                    for arg in call_args {
                        rendered.push(render_argument(arg, arguments)?);
                    }
                    steps.push(format!("{}({})", name, rendered.join(", ")));
                }
                ChainElement::Script(script) => steps.push(script.clone()),
            }
        }
        Ok(steps.join("."))
    }

    /// Human readable rendering, arguments inlined as JSON.
    pub fn build_description(&self, skip: usize) -> String {
        self.calls
            .iter()
            .skip(skip)
            .map(|element| match element.as_ref() {
                ChainElement::MethodCall { name, arguments } => {
                    let described = arguments.iter().map(describe_argument).collect::<Vec<_>>();
                    format!("{}({})", name, described.join(", "))
                }
                ChainElement::Script(script) => script.clone(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn render_argument(arg: &CallArgument, arguments: &mut Vec<JsonValue>) -> QueryResult<String> {
    Ok(match arg {
        CallArgument::Query(query) => query.render(arguments, 0)?,
        CallArgument::Regex(regex) => regex.to_string(),
        CallArgument::SubQuery(info) => {
            let mut render = |query: &QueryDescription, skip: usize| query.render(arguments, skip);
            format!(
                "{} => {}",
                SUB_QUERY_VAR,
                render_sub_query(&info.build(), info.parent_calls(), &mut render)?
            )
        }
        CallArgument::Function(source) => strip_coverage(source),
        CallArgument::Native(_) => {
            return Err(QueryError::new(
                ErrorKind::Argument,
                "Native closures can only run in-process and cannot be sent to a remote host",
            ));
        }
        CallArgument::Null => {
            arguments.push(JsonValue::Null);
            format!("_args[{}]", arguments.len() - 1)
        }
        CallArgument::Value(value) => {
            arguments.push(value.clone());
            format!("_args[{}]", arguments.len() - 1)
        }
    })
}

fn describe_argument(arg: &CallArgument) -> String {
    match arg {
        CallArgument::Query(query) => query.build_description(1),
        CallArgument::SubQuery(info) => {
            let mut describe =
                |query: &QueryDescription, skip: usize| Ok(query.build_description(skip));
            // Describing never fails, the closure above always returns Ok
            let body = render_sub_query(&info.build(), info.parent_calls(), &mut describe)
                .unwrap_or_default();
            format!("{} => {}", SUB_QUERY_VAR, body)
        }
        CallArgument::Regex(regex) => regex.to_string(),
        CallArgument::Function(source) => strip_coverage(source),
        CallArgument::Native(_) => "<native fn>".to_string(),
        CallArgument::Null => "null".to_string(),
        CallArgument::Value(value) => value.to_string(),
    }
}

fn render_sub_query(
    sub_query: &SubQuery,
    skip: usize,
    render: &mut dyn FnMut(&QueryDescription, usize) -> QueryResult<String>,
) -> QueryResult<String> {
    Ok(match sub_query {
        SubQuery::Single(query) => format!("{}.{}", SUB_QUERY_VAR, render(query, skip)?),
        SubQuery::List(items) => {
            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                lines.push(format!("  {}", render_sub_query(item, skip, render)?));
            }
            format!("([\n{}\n])", lines.join(",\n"))
        }
        SubQuery::Map(entries) => {
            let mut lines = Vec::with_capacity(entries.len());
            for (key, item) in entries {
                lines.push(format!(
                    "  {}: {}",
                    quote(key),
                    render_sub_query(item, skip, render)?
                ));
            }
            format!("({{\n{}\n}})", lines.join(",\n"))
        }
    })
}

fn quote(key: &str) -> String {
    JsonValue::String(key.to_string()).to_string()
}

fn strip_coverage(source: &str) -> String {
    COVERAGE_COUNTERS.replace(source, "").into_owned()
}
