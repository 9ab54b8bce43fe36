use super::{ErrorKind, ForeignError, InnerError, QueryError};
use serde::{Deserialize, Serialize};

/// Plain-data mirror of a raised error. This is the only shape errors take
/// when they cross the remote boundary, so it has to survive a JSON round trip
/// with its whole chain of causes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLike {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub original_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<ErrorLike>>,
}

impl ErrorLike {
    pub fn from_query_error(err: &QueryError) -> Self {
        ErrorLike {
            name: err.name().to_string(),
            message: err.message().to_string(),
            original_message: Some(err.original_message().to_string()),
            stack: err.original_stack().map(str::to_string),
            original_stack: None,
            inner_error: err.inner().map(|inner| Box::new(ErrorLike::from_inner(inner))),
        }
    }

    pub fn from_inner(inner: &InnerError) -> Self {
        match inner {
            InnerError::Query(err) => ErrorLike::from_query_error(err),
            InnerError::Foreign(err) => ErrorLike {
                name: err.name().to_string(),
                message: err.message().to_string(),
                original_message: Some(err.message().to_string()),
                stack: None,
                original_stack: None,
                inner_error: None,
            },
        }
    }

    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<QueryError>() {
            Some(query_err) => ErrorLike::from_query_error(query_err),
            None => ErrorLike::from_inner(&InnerError::Foreign(ForeignError::from_anyhow(err))),
        }
    }

    /// Shape check applied to untyped payloads before they are trusted as errors.
    pub fn is_error_like(value: &serde_json::Value) -> bool {
        value
            .as_object()
            .map(|map| map.contains_key("name") && map.contains_key("message"))
            .unwrap_or(false)
    }

    pub fn original_message(&self) -> &str {
        self.original_message.as_deref().unwrap_or(&self.message)
    }

    /// Rebuilds a typed error, dispatching on `name`. Unknown names become the
    /// generic `QueryError` kind.
    pub fn create_error(&self) -> QueryError {
        QueryError {
            kind: ErrorKind::from_name(&self.name).unwrap_or(ErrorKind::Query),
            message: self.message.clone(),
            original_message: self.original_message().to_string(),
            original_stack: self.original_stack.clone().or_else(|| self.stack.clone()),
            inner: self.inner_error.as_ref().map(|inner| inner.create_inner()),
        }
    }

    // Causes keep their foreign name when it is not one of ours
    fn create_inner(&self) -> InnerError {
        if ErrorKind::from_name(&self.name).is_none() && self.inner_error.is_none() {
            InnerError::Foreign(ForeignError::new(
                self.name.clone(),
                self.original_message().to_string(),
            ))
        } else {
            InnerError::Query(Box::new(self.create_error()))
        }
    }
}

impl From<&QueryError> for ErrorLike {
    fn from(err: &QueryError) -> Self {
        ErrorLike::from_query_error(err)
    }
}
