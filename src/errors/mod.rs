use crate::imports::*;

mod error_like;

pub use error_like::ErrorLike;

/*
    Types:
    * ErrorKind - Closed registry of the error kinds a query can fail with
    * ForeignError - Name/message pair for a failure that did not originate in this crate
    * InnerError - The cause attached to a QueryError, either another QueryError or a ForeignError
    * QueryError - The single error type every query operation rejects with
    * QueryErrorBuilder - Assembles the decorated message of a QueryError
    * JavascriptError - Raised by script drivers when the remote host reports a script failure
*/
pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Query,
    Argument,
    NoSuchElement,
    Selector,
    UnexpectedType,
    Timeout,
    OutOfOptions,
    Bootstrap,
    Execution,
    PageReloaded,
}

static KINDS_BY_NAME: LazyLock<HashMap<&'static str, ErrorKind>> = LazyLock::new(|| {
    ErrorKind::ALL
        .iter()
        .map(|kind| (kind.name(), *kind))
        .collect()
});

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Query,
        ErrorKind::Argument,
        ErrorKind::NoSuchElement,
        ErrorKind::Selector,
        ErrorKind::UnexpectedType,
        ErrorKind::Timeout,
        ErrorKind::OutOfOptions,
        ErrorKind::Bootstrap,
        ErrorKind::Execution,
        ErrorKind::PageReloaded,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Query => "QueryError",
            ErrorKind::Argument => "ArgumentError",
            ErrorKind::NoSuchElement => "NoSuchElementError",
            ErrorKind::Selector => "SelectorError",
            ErrorKind::UnexpectedType => "UnexpectedTypeError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::OutOfOptions => "OutOfOptionsError",
            ErrorKind::Bootstrap => "BootstrapError",
            ErrorKind::Execution => "ExecutionError",
            ErrorKind::PageReloaded => "PageReloadedError",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        KINDS_BY_NAME.get(name).copied()
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignError {
    name: String,
    message: String,
}

impl ForeignError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        ForeignError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<JavascriptError>() {
            Some(js) => ForeignError::new("JavascriptError", js.message.clone()),
            None => ForeignError::new("Error", format!("{:#}", err)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ForeignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ForeignError {}

#[derive(Debug, Clone)]
pub enum InnerError {
    Query(Box<QueryError>),
    Foreign(ForeignError),
}

impl InnerError {
    pub fn name(&self) -> &str {
        match self {
            InnerError::Query(err) => err.name(),
            InnerError::Foreign(err) => err.name(),
        }
    }

    /// Message without decoration, used when this error is listed as a cause.
    pub fn original_message(&self) -> &str {
        match self {
            InnerError::Query(err) => err.original_message(),
            InnerError::Foreign(err) => err.message(),
        }
    }

    pub fn inner(&self) -> Option<&InnerError> {
        match self {
            InnerError::Query(err) => err.inner(),
            InnerError::Foreign(_) => None,
        }
    }

    fn as_error(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            InnerError::Query(err) => &**err,
            InnerError::Foreign(err) => err,
        }
    }
}

impl From<QueryError> for InnerError {
    fn from(err: QueryError) -> Self {
        InnerError::Query(Box::new(err))
    }
}

impl From<ForeignError> for InnerError {
    fn from(err: ForeignError) -> Self {
        InnerError::Foreign(err)
    }
}

impl From<anyhow::Error> for InnerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<QueryError>() {
            Ok(query_err) => InnerError::Query(Box::new(query_err)),
            Err(err) => InnerError::Foreign(ForeignError::from_anyhow(&err)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryError {
    kind: ErrorKind,
    message: String,
    original_message: String,
    original_stack: Option<String>,
    inner: Option<InnerError>,
}

impl QueryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        QueryError::builder(kind, message).build()
    }

    pub fn builder(kind: ErrorKind, message: impl Into<String>) -> QueryErrorBuilder {
        QueryErrorBuilder {
            kind,
            message: message.into(),
            description: None,
            additional: None,
            cause: None,
        }
    }

    /// Converts an arbitrary failure raised while running `description` into a
    /// typed error. Errors that already are `QueryError`s pass through unchanged.
    pub fn from_foreign(err: anyhow::Error, description: &QueryDescription) -> Self {
        match err.downcast::<QueryError>() {
            Ok(query_err) => query_err,
            Err(err) => QueryError::builder(
                ErrorKind::Execution,
                format!("In a sub-query: {}", description.build_description(1)),
            )
            .cause(ForeignError::from_anyhow(&err))
            .build(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn original_message(&self) -> &str {
        &self.original_message
    }

    pub fn original_stack(&self) -> Option<&str> {
        self.original_stack.as_deref()
    }

    pub fn inner(&self) -> Option<&InnerError> {
        self.inner.as_ref()
    }

    // Appends "Name: message" for every cause, one indentation level deeper each time
    fn collect_message(message: &str, inner: Option<&InnerError>) -> String {
        let mut text = message.to_string();
        let mut indent = 1;
        let mut current = inner;
        while let Some(cause) = current {
            let pad = "  ".repeat(indent);
            let cause_text = format!("{}: {}", cause.name(), cause.original_message());
            let shifted = cause_text.replace('\n', &format!("\n{}", pad));
            text = format!("{}\n{} --> {}", text, pad, shifted);
            indent += 1;
            current = cause.inner();
        }
        text
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name(), self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.as_ref().map(|inner| inner.as_error())
    }
}

pub struct QueryErrorBuilder {
    kind: ErrorKind,
    message: String,
    description: Option<String>,
    additional: Option<String>,
    cause: Option<InnerError>,
}

impl QueryErrorBuilder {
    /// Names the sub-query that was running when the error was raised.
    pub fn description(mut self, description: &QueryDescription) -> Self {
        self.description = Some(description.build_description(1));
        self
    }

    pub fn additional(mut self, text: impl Into<String>) -> Self {
        self.additional = Some(text.into());
        self
    }

    pub fn cause(mut self, cause: impl Into<InnerError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn maybe_cause(mut self, cause: Option<impl Into<InnerError>>) -> Self {
        self.cause = cause.map(Into::into);
        self
    }

    pub fn build(self) -> QueryError {
        let mut original_message = self.message;
        if let Some(description) = self.description {
            original_message.push_str(&format!(
                ", when executing a sub-query:\n\n    {}\n",
                description
            ));
        }
        if let Some(additional) = self.additional {
            original_message.push_str(&additional);
        }
        QueryError {
            kind: self.kind,
            message: QueryError::collect_message(&original_message, self.cause.as_ref()),
            original_message,
            original_stack: None,
            inner: self.cause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavascriptError {
    pub message: String,
}

impl JavascriptError {
    pub fn new(message: impl Into<String>) -> Self {
        JavascriptError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JavascriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JavascriptError: {}", self.message)
    }
}

impl std::error::Error for JavascriptError {}
