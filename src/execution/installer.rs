use super::remote::{InstallFn, ScriptDriver};
use crate::description::IS_INSTALLED_EXPRESSION;
use crate::imports::*;
use std::path::PathBuf;

/*
    Types:
    * InstallMethod - How the bundle is injected into the page
    * BundleSource - Where the bundle text comes from
    * LibraryInstaller - Injects the query library bundle into a remote browser
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstallMethod {
    /// Evaluates the bundle directly as a script.
    ExecuteScript,
    /// Appends a <script> tag holding the bundle to document.head.
    #[default]
    ScriptTag,
}

#[derive(Debug, Clone)]
enum BundleSource {
    File(PathBuf),
    Inline(String),
}

impl BundleSource {
    fn location(&self) -> String {
        match self {
            BundleSource::File(path) => path.display().to_string(),
            BundleSource::Inline(_) => "<inline bundle>".to_string(),
        }
    }
}

const SCRIPT_TAG_INSTALLER: &str = "var scriptTag = document.createElement('script');
    scriptTag.innerHTML = arguments[0];
    var head = document.getElementsByTagName('head')[0];
    head.appendChild(scriptTag);";

#[derive(Clone)]
pub struct LibraryInstaller {
    driver: Arc<dyn ScriptDriver>,
    bundle: BundleSource,
    method: InstallMethod,
}

impl LibraryInstaller {
    /// Installer that reads the bundle from `path` every time it installs.
    pub fn from_file(driver: Arc<dyn ScriptDriver>, path: impl Into<PathBuf>) -> Self {
        LibraryInstaller {
            driver,
            bundle: BundleSource::File(path.into()),
            method: InstallMethod::default(),
        }
    }

    pub fn from_source(driver: Arc<dyn ScriptDriver>, source: impl Into<String>) -> Self {
        LibraryInstaller {
            driver,
            bundle: BundleSource::Inline(source.into()),
            method: InstallMethod::default(),
        }
    }

    pub fn with_method(mut self, method: InstallMethod) -> Self {
        self.method = method;
        self
    }

    async fn bundle_text(&self) -> QueryResult<String> {
        match &self.bundle {
            BundleSource::Inline(source) => Ok(source.clone()),
            BundleSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading bundle {}", path.display()))
                .map_err(|err| {
                    QueryError::builder(
                        ErrorKind::Bootstrap,
                        format!(
                            "Cannot load browser JavaScript bundle from '{}'. The library needs to be installed in the browser to support batch queries. ",
                            path.display()
                        ),
                    )
                    .cause(err)
                    .build()
                }),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, err, fields(bundle = %self.bundle.location(), method = ?self.method))]
    pub async fn install(&self) -> QueryResult<()> {
        let bundle = self.bundle_text().await?;
        let injected = match self.method {
            InstallMethod::ExecuteScript => self.driver.execute_script(&bundle, vec![]).await,
            InstallMethod::ScriptTag => {
                self.driver
                    .execute_script(SCRIPT_TAG_INSTALLER, vec![JsonValue::String(bundle)])
                    .await
            }
        };
        let install_error = || {
            QueryError::builder(
                ErrorKind::Bootstrap,
                format!(
                    "Cannot install browser JavaScript bundle from scripts at '{}'. There seems to be a JavaScript error when executing the combined script in the browser. ",
                    self.bundle.location()
                ),
            )
        };
        if let Err(err) = injected {
            return Err(install_error().cause(err).build());
        }
        if !self.is_installed().await? {
            return Err(install_error()
                .additional("The library is still not reported as installed after injecting it.")
                .build());
        }
        tracing::debug!("query library installed");
        Ok(())
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

    /// Install callback for a `RemoteExecutor`.
    pub fn install_fn(self: Arc<Self>) -> InstallFn {
        Arc::new(move || {
            let installer = self.clone();
            Box::pin(async move { installer.install().await })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeDriver, init_tracing};
    use std::io::Write;

    #[tokio::test]
    async fn test_script_tag_install_passes_bundle_as_argument() {
        init_tracing();
        let mut bundle = tempfile::NamedTempFile::new().unwrap();
        write!(bundle, "window.sbq = {{ Query: function () {{}} }};").unwrap();

        let driver = Arc::new(FakeDriver::new());
        driver.respond_sync(Ok(JsonValue::Null));
        driver.respond_sync(Ok(json!(true)));
        let installer = LibraryInstaller::from_file(driver.clone(), bundle.path());
        installer.install().await.unwrap();

        let calls = driver.sync_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.contains("document.createElement('script')"));
        assert_eq!(
            calls[0].1,
            vec![json!("window.sbq = { Query: function () {} };")]
        );
        assert_eq!(calls[1].0, "return (!!window.sbq && !!window.sbq.Query);");
    }

    #[tokio::test]
    async fn test_execute_script_install_runs_bundle_directly() {
        let driver = Arc::new(FakeDriver::new());
        driver.respond_sync(Ok(JsonValue::Null));
        driver.respond_sync(Ok(json!(true)));
        LibraryInstaller::from_source(driver.clone(), "window.sbq = {};")
            .with_method(InstallMethod::ExecuteScript)
            .install()
            .await
            .unwrap();
        assert_eq!(driver.sync_calls()[0].0, "window.sbq = {};");
    }

    #[tokio::test]
    async fn test_missing_bundle_file_is_a_bootstrap_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("bundle.js");
        let driver = Arc::new(FakeDriver::new());
        let err = LibraryInstaller::from_file(driver.clone(), &missing)
            .install()
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Bootstrap));
        assert!(err.message().starts_with("Cannot load browser JavaScript bundle from"));
        assert!(driver.sync_calls().is_empty());
    }

    #[tokio::test]
    async fn test_script_failure_is_a_bootstrap_error() {
        let driver = Arc::new(FakeDriver::new());
        driver.respond_sync(Err(JavascriptError::new("SyntaxError: unexpected token").into()));
        let err = LibraryInstaller::from_source(driver, "window.sbq = ")
            .install()
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Bootstrap));
        assert!(err.message().contains("--> JavascriptError: SyntaxError: unexpected token"));
    }

    #[tokio::test]
    async fn test_install_checks_library_afterwards() {
        let driver = Arc::new(FakeDriver::new());
        driver.respond_sync(Ok(JsonValue::Null));
        driver.respond_sync(Ok(json!(false)));
        let err = LibraryInstaller::from_source(driver, "void 0")
            .install()
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Bootstrap));
        assert!(err.message().ends_with("still not reported as installed after injecting it."));
    }
}
