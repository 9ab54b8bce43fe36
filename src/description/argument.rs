use crate::imports::*;

/*
    Types:
    * CallArgument - One argument of a recorded method call
    * RegexArg - A regular expression literal, kept as source text plus flags
    * NativeFn - A Rust closure usable as a script, only runnable in-process
    * SubQueryInfo - Deferred sub-query: parent call count plus a builder run at render time
    * SubQuery - What a sub-query builder produces: a single query, a list, or a keyed map
*/
#[derive(Clone)]
pub enum CallArgument {
    Null,
    Value(JsonValue),
    Regex(RegexArg),
    Function(String),
    Native(NativeFn),
    Query(QueryDescription),
    SubQuery(SubQueryInfo),
}

impl CallArgument {
    pub fn value(value: impl Into<JsonValue>) -> Self {
        CallArgument::Value(value.into())
    }

    /// Serializable options such as wait settings, `Null` when absent.
    pub fn options<T: serde::Serialize>(options: Option<&T>) -> Self {
        match options.and_then(|o| serde_json::to_value(o).ok()) {
            Some(value) => CallArgument::Value(value),
            None => CallArgument::Null,
        }
    }
}

impl std::fmt::Debug for CallArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallArgument::Null => write!(f, "Null"),
            CallArgument::Value(v) => write!(f, "Value({})", v),
            CallArgument::Regex(r) => write!(f, "Regex({})", r),
            CallArgument::Function(src) => write!(f, "Function({})", src),
            CallArgument::Native(_) => write!(f, "Native"),
            CallArgument::Query(q) => write!(f, "Query({})", q.build_description(0)),
            CallArgument::SubQuery(_) => write!(f, "SubQuery"),
        }
    }
}

impl From<&str> for CallArgument {
    fn from(value: &str) -> Self {
        CallArgument::Value(JsonValue::String(value.to_string()))
    }
}

impl From<String> for CallArgument {
    fn from(value: String) -> Self {
        CallArgument::Value(JsonValue::String(value))
    }
}

impl From<f64> for CallArgument {
    fn from(value: f64) -> Self {
        CallArgument::Value(QueryValue::Number(value).to_json())
    }
}

impl From<i64> for CallArgument {
    fn from(value: i64) -> Self {
        CallArgument::Value(json!(value))
    }
}

impl From<bool> for CallArgument {
    fn from(value: bool) -> Self {
        CallArgument::Value(JsonValue::Bool(value))
    }
}

impl From<RegexArg> for CallArgument {
    fn from(value: RegexArg) -> Self {
        CallArgument::Regex(value)
    }
}

impl From<SubQueryInfo> for CallArgument {
    fn from(value: SubQueryInfo) -> Self {
        CallArgument::SubQuery(value)
    }
}

impl From<QueryDescription> for CallArgument {
    fn from(value: QueryDescription) -> Self {
        CallArgument::Query(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexArg {
    source: String,
    flags: String,
}

impl RegexArg {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        RegexArg {
            source: source.into(),
            flags: flags.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Compiles for in-process matching. Flags without a Rust counterpart
    /// (`g`, `y`, `u`) do not change whether a string matches and are skipped.
    pub fn compile(&self) -> QueryResult<regex::Regex> {
        regex::RegexBuilder::new(&self.source)
            .case_insensitive(self.flags.contains('i'))
            .multi_line(self.flags.contains('m'))
            .dot_matches_new_line(self.flags.contains('s'))
            .build()
            .map_err(|e| {
                QueryError::new(
                    ErrorKind::Argument,
                    format!("Invalid regular expression {}: {}", self, e),
                )
            })
    }
}

impl From<&str> for RegexArg {
    fn from(source: &str) -> Self {
        RegexArg::new(source, "")
    }
}

impl std::fmt::Display for RegexArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

pub type NativeCallback = dyn Fn(&[QueryValue]) -> Result<QueryValue> + Send + Sync;

#[derive(Clone)]
pub struct NativeFn(Arc<NativeCallback>);

impl NativeFn {
    pub fn new(f: impl Fn(&[QueryValue]) -> Result<QueryValue> + Send + Sync + 'static) -> Self {
        NativeFn(Arc::new(f))
    }

    pub fn call(&self, args: &[QueryValue]) -> Result<QueryValue> {
        (self.0)(args)
    }
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<native fn>")
    }
}

#[derive(Clone)]
pub struct SubQueryInfo {
    parent_calls: usize,
    build: Arc<dyn Fn() -> SubQuery + Send + Sync>,
}

impl SubQueryInfo {
    pub fn new(
        parent: &QueryDescription,
        build: impl Fn() -> SubQuery + Send + Sync + 'static,
    ) -> Self {
        SubQueryInfo {
            parent_calls: parent.len(),
            build: Arc::new(build),
        }
    }

    /// Calls already rendered by the parent, skipped when rendering the sub-query.
    pub fn parent_calls(&self) -> usize {
        self.parent_calls
    }

    pub fn build(&self) -> SubQuery {
        (self.build)()
    }
}

#[derive(Debug, Clone)]
pub enum SubQuery {
    Single(QueryDescription),
    List(Vec<SubQuery>),
    Map(Vec<(String, SubQuery)>),
}
