/*
    In-process capabilities.

    The query engine never touches a document itself. Everything it needs from the page goes
    through DomLibrary (synchronous element primitives) and ScriptHost (evaluation of user
    supplied script text).

    Trust: ScriptHost runs arbitrary caller supplied code inside the page. Scripts reach it only
    through `Query::execute` and `ElementQuery::execute`; nothing else in the crate evaluates text.
*/
use crate::imports::*;
use serde::{Deserialize, Serialize};

/*
    Types:
    * ElementRect - Client rectangle of an element
    * SelectOption - Option of a <select> to pick, by value or by visible text
    * ScriptKind - Whether script text is a function body or a function/lambda expression
    * ScriptSource - Script text together with its kind
    * Script - What `execute` accepts: body text, function source, or a native closure
    * DomLibrary - Element primitives
    * ScriptHost - Script evaluation
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub fn to_value(&self) -> QueryValue {
        object([
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ])
    }

    pub fn location(&self) -> QueryValue {
        object([("x", self.x), ("y", self.y)])
    }

    pub fn size(&self) -> QueryValue {
        object([("width", self.width), ("height", self.height)])
    }
}

fn object<const N: usize>(fields: [(&str, f64); N]) -> QueryValue {
    QueryValue::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), QueryValue::Number(v)))
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectOption {
    Value(String),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Body,
    Function,
}

static FUNCTION_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^function\s").expect("function pattern is valid"));
static LAMBDA_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\(.*\)\s*=>").expect("lambda pattern is valid"));

impl ScriptKind {
    /// Guesses whether `text` is a function expression. This is a heuristic over
    /// the leading characters only (`function ` or `(...) =>`); anything else,
    /// including a bare `x => x` lambda, is treated as a function body.
    pub fn classify(text: &str) -> ScriptKind {
        let trimmed = text.trim();
        if FUNCTION_PATTERN.is_match(trimmed) || LAMBDA_PATTERN.is_match(trimmed) {
            ScriptKind::Function
        } else {
            ScriptKind::Body
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub text: String,
    pub kind: ScriptKind,
}

#[derive(Debug, Clone)]
pub enum Script {
    Body(String),
    Function(String),
    Native(NativeFn),
}

impl Script {
    pub fn native(f: impl Fn(&[QueryValue]) -> Result<QueryValue> + Send + Sync + 'static) -> Self {
        Script::Native(NativeFn::new(f))
    }

    /// How the script is recorded in a query description. Body text travels as a
    /// plain argument; function sources are inlined.
    pub fn to_argument(&self) -> CallArgument {
        match self {
            Script::Body(text) => CallArgument::from(text.as_str()),
            Script::Function(source) => CallArgument::Function(source.clone()),
            Script::Native(f) => CallArgument::Native(f.clone()),
        }
    }

    pub async fn evaluate(&self, host: &dyn ScriptHost, args: &[QueryValue]) -> Result<QueryValue> {
        match self {
            Script::Native(f) => f.call(args),
            Script::Function(source) => {
                host.evaluate(
                    &ScriptSource {
                        text: source.clone(),
                        kind: ScriptKind::Function,
                    },
                    args,
                )
                .await
            }
            Script::Body(text) => {
                host.evaluate(
                    &ScriptSource {
                        text: text.clone(),
                        kind: ScriptKind::classify(text),
                    },
                    args,
                )
                .await
            }
        }
    }
}

impl From<&str> for Script {
    fn from(value: &str) -> Self {
        Script::Body(value.to_string())
    }
}

impl From<String> for Script {
    fn from(value: String) -> Self {
        Script::Body(value)
    }
}

pub trait DomLibrary: Send + Sync {
    /// Elements matching `selector` under `parent`, or the whole document.
    fn select(
        &self,
        selector: &str,
        parent: Option<&ElementHandle>,
    ) -> QueryResult<Vec<ElementHandle>>;

    fn select_first(
        &self,
        selector: &str,
        parent: Option<&ElementHandle>,
        description: &QueryDescription,
    ) -> QueryResult<ElementHandle> {
        self.select(selector, parent)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                QueryError::builder(
                    ErrorKind::NoSuchElement,
                    format!("Selector '{}' returned no elements", selector),
                )
                .description(description)
                .build()
            })
    }

    fn select_single(
        &self,
        selector: &str,
        parent: Option<&ElementHandle>,
        description: &QueryDescription,
    ) -> QueryResult<ElementHandle> {
        let mut found = self.select(selector, parent)?;
        match found.len() {
            0 => Err(QueryError::builder(
                ErrorKind::NoSuchElement,
                format!("Selector '{}' returned no elements", selector),
            )
            .description(description)
            .build()),
            1 => Ok(found.remove(0)),
            _ => Err(QueryError::builder(
                ErrorKind::Selector,
                format!(
                    "Selector '{}' returned more than one element but expected only one",
                    selector
                ),
            )
            .description(description)
            .build()),
        }
    }

    fn is_dom_element(&self, value: &QueryValue) -> bool {
        matches!(value, QueryValue::Element(_))
    }

    fn attribute_of(&self, element: &ElementHandle, name: &str) -> QueryResult<Option<String>>;
    fn text_of(&self, element: &ElementHandle) -> QueryResult<String>;
    fn css_of(&self, element: &ElementHandle, property: &str) -> QueryResult<String>;
    fn client_rect_of(&self, element: &ElementHandle) -> QueryResult<ElementRect>;
    fn tag_name_of(&self, element: &ElementHandle) -> QueryResult<String>;
    fn inner_html_of(&self, element: &ElementHandle) -> QueryResult<String>;
    fn class_of(&self, element: &ElementHandle) -> QueryResult<String>;

    fn is_displayed(&self, element: &ElementHandle) -> QueryResult<bool>;
    fn is_enabled(&self, element: &ElementHandle) -> QueryResult<bool>;
    fn is_selected(&self, element: &ElementHandle) -> QueryResult<bool>;
    fn is_checked(&self, element: &ElementHandle) -> QueryResult<bool>;

    fn imitate_click(&self, element: &ElementHandle) -> QueryResult<()>;
    fn imitate_submit(&self, element: &ElementHandle) -> QueryResult<()>;
    fn imitate_clear(&self, element: &ElementHandle) -> QueryResult<()>;
    fn imitate_append_text(&self, element: &ElementHandle, text: &str) -> QueryResult<()>;
    fn imitate_set_text(&self, element: &ElementHandle, text: &str) -> QueryResult<()>;
    fn imitate_selection(&self, element: &ElementHandle, options: &[SelectOption])
    -> QueryResult<()>;
    /// `{value, text}` objects for the selected options of a <select>.
    fn selected_options_of(&self, element: &ElementHandle) -> QueryResult<Vec<QueryValue>>;
    fn scroll_into_view(&self, element: &ElementHandle) -> QueryResult<()>;
}

#[async_trait::async_trait]
pub trait ScriptHost: Send + Sync {
    /// Runs `script` inside the page with `args` bound to its arguments. Function
    /// sources are called with the same arguments after evaluation.
    async fn evaluate(&self, script: &ScriptSource, args: &[QueryValue]) -> Result<QueryValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_function_expressions() {
        assert_eq!(
            ScriptKind::classify("function (a) { return a }"),
            ScriptKind::Function
        );
        assert_eq!(ScriptKind::classify("  (a, b) => a + b"), ScriptKind::Function);
        assert_eq!(ScriptKind::classify("return 1 + 1"), ScriptKind::Body);
    }

    #[test]
    fn test_heuristic_misses_bare_lambda() {
        assert_eq!(ScriptKind::classify("a => a"), ScriptKind::Body);
        assert_eq!(ScriptKind::classify("functionName()"), ScriptKind::Body);
    }

    #[test]
    fn test_script_arguments_in_descriptions() {
        assert!(matches!(
            Script::from("return 1").to_argument(),
            CallArgument::Value(JsonValue::String(_))
        ));
        assert!(matches!(
            Script::Function("function () {}".into()).to_argument(),
            CallArgument::Function(_)
        ));
    }

    #[test]
    fn test_rect_projections() {
        let rect = ElementRect {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
        };
        assert_eq!(rect.location().as_object().map(|o| o.len()), Some(2));
        assert_eq!(
            rect.size().as_object().and_then(|o| o.get("height").cloned()),
            Some(QueryValue::Number(4.0))
        );
    }
}
