mod capability;
mod config;
mod description;
mod errors;
mod execution;
mod logger;
mod query;
mod values;
mod wait;

#[cfg(test)]
mod test_utils;

// Library exports
pub mod prelude {
    // Queries
    pub use crate::query::{
        AnyQuery, ArrayQuery, BatchSource, Branch, ConditionQuery, ElementQuery, ErasedQuery,
        NullableStringQuery, NumberConversion, NumberQuery, ObjectQuery, OneOfQuery, Query,
        QueryExt, StringQuery, SwitchCases, TypedQuery,
    };

    // Description
    pub use crate::description::{
        CallArgument, ChainElement, NativeFn, QueryCall, QueryDescription, RegexArg, SubQuery,
        SubQueryInfo,
    };

    // Execution
    pub use crate::execution::installer::{InstallMethod, LibraryInstaller};
    pub use crate::execution::locator::Locator;
    pub use crate::execution::remote::{InstallFn, RemoteExecutor, ScriptDriver};
    pub use crate::execution::{Backend, LocalBackend, QueryContext};

    // Capabilities
    pub use crate::capability::{
        DomLibrary, ElementRect, Script, ScriptHost, ScriptKind, ScriptSource, SelectOption,
    };

    // Errors
    pub use crate::errors::{
        ErrorKind, ErrorLike, ForeignError, InnerError, JavascriptError, QueryError, QueryResult,
    };

    // Values, config, waiting
    pub use crate::config::{Config, PartialConfig};
    pub use crate::logger::{LogTracker, QueryLogger};
    pub use crate::values::{ElementHandle, QueryValue, ResultKind, Truthy};
    pub use crate::wait::{WaitOptions, WaitSettings, wait_for, wait_for_core};
}

// Internal imports for use within the crate
#[allow(unused_imports)]
pub(crate) mod imports {
    // Core types
    pub use crate::capability::{
        DomLibrary, ElementRect, Script, ScriptHost, ScriptKind, ScriptSource, SelectOption,
    };
    pub use crate::config::{Config, PartialConfig};
    pub use crate::description::{
        CallArgument, ChainElement, NativeFn, QueryCall, QueryDescription, RegexArg, SubQuery,
        SubQueryInfo,
    };
    pub use crate::errors::{
        ErrorKind, ErrorLike, ForeignError, InnerError, JavascriptError, QueryError, QueryResult,
    };
    pub use crate::execution::{Backend, LocalBackend, PerformFuture, QueryContext, QueryNode};
    pub use crate::logger::{LogTracker, QueryLogger};
    pub use crate::values::{ElementHandle, QueryValue, ResultKind, Truthy};
    pub use crate::wait::{WaitOptions, WaitSettings};

    // Result and error handling
    pub type Result<T> = anyhow::Result<T>;
    pub use anyhow::Context as _;

    // Collections
    pub use std::collections::{BTreeMap, HashMap};

    // Async
    pub use std::future::Future;
    pub use std::pin::Pin;
    pub use std::sync::Arc;
    pub use std::time::Duration;

    // Lazy initialization
    pub use std::sync::LazyLock;

    // Serialization
    pub use serde_json::{Value as JsonValue, json};
}
