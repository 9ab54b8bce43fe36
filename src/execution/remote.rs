/*
    Remote execution.

    The whole chain is rendered into one script: an install guard, the constructor call carrying
    the config, every recorded step, then `.perform()` wired to the async completion callback.
    The host answers with `{value, type}` or `{error}` where the error is ErrorLike data.
*/
use crate::description::{CONSTRUCTOR_NAME, IS_INSTALLED_EXPRESSION};
use crate::imports::*;
use serde::Deserialize;
use tokio::sync::OnceCell;

/*
    Consts:
    * SCRIPT_TEMPLATE - tera template of the async wrapper script
    * BOOTSTRAP_MESSAGE - Reported by the guard when the library is missing
    * WAIT_FOR_UNLOAD_SCRIPT - Resolves after a delay unless the page unloads first
*/
const SCRIPT_TEMPLATE: &str = r#"
    try {
      var _args = arguments;
      var cb = _args[_args.length - 1];
      if (!{{ is_installed }}) {
        cb({
          error: {
            name: 'BootstrapError',
            message: {{ bootstrap_message }}
          }
        });
        return;
      }
      {{ chain }}
      .perform()
      .then((value) => {
        cb({ value: value, type: (typeof value) });
      })
      .catch((err) => {
        cb({ error: new sbq.Query.ErrorLike(err) });
      })
    } catch (err) {
      cb({ error: { name: err.name, message: err.message, originalMessage: err.message, stack: err.stack } });
    }
"#;

const BOOTSTRAP_MESSAGE: &str =
    "The query library doesn't seem to have been installed, please use library installer";

const WAIT_FOR_UNLOAD_SCRIPT: &str = "setTimeout(function onTimeout(cb) {\n  cb();\n}, arguments[0], arguments[1])";

const PAGE_RELOADED_MESSAGE: &str = "The page was reloaded due to a side effect caused by the query itself or auto-refresh. Use .expectPageReload() function to catch and ignore this error, or ensure the page is not reloaded anymore. This is analogue of StaleElementError from Selenium. ";

const JAVASCRIPT_ERROR_MESSAGE: &str = "An internal JavaScript error occurred, it is advised to check any custom JavaScript used in .execute sub-queries for typos/mistakes";

static PAGE_RELOAD_PATTERNS: LazyLock<[regex::Regex; 2]> = LazyLock::new(|| {
    [
        regex::Regex::new(r"document unloaded while waiting for result")
            .expect("unload pattern is valid"),
        regex::Regex::new(r"Callback was not called before the unload event")
            .expect("unload callback pattern is valid"),
    ]
});

/// WebDriver-like connection to a browser. Script failures raised by the page
/// are reported as a `JavascriptError` inside the returned error.
#[async_trait::async_trait]
pub trait ScriptDriver: Send + Sync {
    /// Runs `script` with `args`; the completion callback is appended as the last argument.
    async fn execute_async_script(&self, script: &str, args: Vec<JsonValue>) -> Result<JsonValue>;
    async fn execute_script(&self, script: &str, args: Vec<JsonValue>) -> Result<JsonValue>;
    async fn get(&self, url: &str) -> Result<()>;
}

pub type InstallFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = QueryResult<()>> + Send>> + Send + Sync>;

#[derive(Debug, Deserialize)]
struct ScriptResult {
    #[serde(default)]
    value: Option<JsonValue>,
    #[serde(rename = "type", default)]
    value_type: String,
    #[serde(default)]
    error: Option<JsonValue>,
}

impl ScriptResult {
    // Some hosts deliver an empty string as a false-like value
    fn restore_value(self) -> QueryValue {
        let value = self.value.map(QueryValue::from_json).unwrap_or_default();
        if self.value_type == "string" && !value.is_truthy() {
            QueryValue::String(String::new())
        } else {
            value
        }
    }
}

pub struct RemoteExecutor {
    driver: Arc<dyn ScriptDriver>,
    config: Config,
    install: Option<InstallFn>,
    navigate_to: Option<String>,
    precondition: OnceCell<QueryResult<()>>,
}

impl RemoteExecutor {
    /// Fails when `config` does not validate.
    pub fn new(
        driver: Arc<dyn ScriptDriver>,
        config: Config,
        install: Option<InstallFn>,
    ) -> QueryResult<Self> {
        config.validate()?;
        Ok(RemoteExecutor {
            driver,
            config,
            install,
            navigate_to: None,
            precondition: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &Arc<dyn ScriptDriver> {
        &self.driver
    }

    /// Executor sharing this one's driver and installer whose precondition
    /// navigates to `url` and installs the library when it is missing. The
    /// navigation runs at most once, on the first perform.
    pub fn navigate(&self, url: impl Into<String>) -> RemoteExecutor {
        RemoteExecutor {
            driver: self.driver.clone(),
            config: self.config,
            install: self.install.clone(),
            navigate_to: Some(url.into()),
            precondition: OnceCell::new(),
        }
    }

    async fn run_precondition(&self) -> QueryResult<()> {
        let Some(url) = &self.navigate_to else {
            return Ok(());
        };
        self.precondition
            .get_or_init(|| async {
                let tracker = QueryLogger::global()
                    .start(self.config.should_log, || format!("query.get: {}", url));
                self.driver.get(url).await.map_err(|err| {
                    tracker.error(|| format!("navigation failed: {:#}", err));
                    QueryError::builder(ErrorKind::Execution, format!("Cannot navigate to '{}'", url))
                        .cause(err)
                        .build()
                })?;
                tracker.debug(|| "checking if query browser library is installed".to_string());
                if self.is_installed().await? {
                    tracker.debug(|| "query browser library already installed".to_string());
                    return Ok(());
                }
                let Some(install) = &self.install else {
                    return Err(QueryError::new(ErrorKind::Bootstrap, BOOTSTRAP_MESSAGE));
                };
                tracker.info(|| "query browser library is not installed, installing".to_string());
                install().await?;
                tracker.info(|| "query browser library installation complete".to_string());
                Ok(())
            })
            .await
            .clone()
    }

    pub async fn is_installed(&self) -> QueryResult<bool> {
        let value = self
            .driver
            .execute_script(&format!("return {};", IS_INSTALLED_EXPRESSION), vec![])
            .await
            .map_err(|err| {
                QueryError::builder(
                    ErrorKind::Bootstrap,
                    "Cannot check whether the query library is installed",
                )
                .cause(err)
                .build()
            })?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Runs `description` in one round trip. An empty description only runs the
    /// precondition. A bootstrap failure triggers one install and one retry.
    #[tracing::instrument(level = "debug", skip_all, err, fields(calls = description.len()))]
    pub async fn perform(&self, description: &QueryDescription) -> QueryResult<QueryValue> {
        self.run_precondition().await?;
        if description.is_empty() {
            return Ok(QueryValue::Null);
        }
        let query = description.prepend_constructor(
            CONSTRUCTOR_NAME,
            vec![CallArgument::options(Some(&self.config))],
        );
        let call = query.build(vec![], 0)?;
        let script = render_script(&call.script)?;

        match self.execute(&query, &call, &script).await {
            Err(err) if err.is(ErrorKind::Bootstrap) => match &self.install {
                Some(install) => {
                    tracing::debug!("query library missing, installing before retry");
                    install().await?;
                    self.execute(&query, &call, &script).await
                }
                None => Err(err),
            },
            other => other,
        }
    }

    async fn execute(
        &self,
        query: &QueryDescription,
        call: &QueryCall,
        script: &str,
    ) -> QueryResult<QueryValue> {
        let tracker = QueryLogger::global().start(self.config.should_log, || {
            format!("executing: {}", query.build_description(1))
        });
        let raw = match self
            .driver
            .execute_async_script(script, call.arguments.clone())
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracker.debug(|| format!("driver failure: {:#}", err));
                return Err(translate_driver_error(err, query, script));
            }
        };
        let result: ScriptResult = serde_json::from_value(raw)
            .context("remote script returned an unexpected payload")
            .map_err(|err| generic_error(err, query))?;

        if let Some(error) = result.error {
            tracker.debug(|| format!("remote failure: {}", error));
            if !ErrorLike::is_error_like(&error) {
                return Err(generic_error(anyhow::anyhow!("{}", error), query));
            }
            let error_like: ErrorLike = serde_json::from_value(error)
                .context("remote error is not error-like")
                .map_err(|err| generic_error(err, query))?;
            return Err(error_like.create_error());
        }
        let value = result.restore_value();
        tracker.debug(|| format!("success: {}", value));
        Ok(value)
    }

    /// Waits up to `timeout` for the current page to unload. Resolving because the
    /// page did unload is success, as is running out the delay.
    pub async fn wait_for_unload(&self, timeout: Duration) -> QueryResult<()> {
        let millis = timeout.as_millis() as u64;
        match self
            .driver
            .execute_async_script(WAIT_FOR_UNLOAD_SCRIPT, vec![json!(millis)])
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_page_reload(&err) => Ok(()),
            Err(err) => Err(QueryError::builder(ErrorKind::Execution, "An error occurred")
                .cause(err)
                .build()),
        }
    }
}

fn render_script(chain: &str) -> QueryResult<String> {
    let mut context = tera::Context::new();
    context.insert("is_installed", IS_INSTALLED_EXPRESSION);
    context.insert("bootstrap_message", &json!(BOOTSTRAP_MESSAGE).to_string());
    context.insert("chain", chain);
    tera::Tera::one_off(SCRIPT_TEMPLATE, &context, false).map_err(|err| {
        QueryError::builder(ErrorKind::Execution, "Cannot render the remote script")
            .cause(anyhow::Error::new(err))
            .build()
    })
}

fn is_page_reload(err: &anyhow::Error) -> bool {
    let message = match err.downcast_ref::<JavascriptError>() {
        Some(js) => js.message.clone(),
        None => format!("{:#}", err),
    };
    PAGE_RELOAD_PATTERNS.iter().any(|p| p.is_match(&message))
}

fn generic_error(err: anyhow::Error, query: &QueryDescription) -> QueryError {
    QueryError::builder(ErrorKind::Execution, "An error occurred")
        .cause(err)
        .description(query)
        .build()
}

fn translate_driver_error(err: anyhow::Error, query: &QueryDescription, script: &str) -> QueryError {
    let err = match err.downcast::<QueryError>() {
        Ok(query_err) => return query_err,
        Err(err) => err,
    };
    if err.downcast_ref::<JavascriptError>().is_none() {
        return generic_error(err, query);
    }
    if is_page_reload(&err) {
        return QueryError::builder(ErrorKind::PageReloaded, PAGE_RELOADED_MESSAGE)
            .cause(err)
            .description(query)
            .build();
    }
    QueryError::builder(ErrorKind::Execution, JAVASCRIPT_ERROR_MESSAGE)
        .cause(err)
        .description(query)
        .additional(format!("\n\n  in script:\n{}\n", script))
        .build()
}
