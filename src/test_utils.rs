use crate::execution::remote::ScriptDriver;
use crate::imports::*;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/*
    Types:
    * FakeElement - Element of the in-memory document, built fluently
    * FakeDom - In-memory document implementing DomLibrary and ScriptHost
    * FakeDriver - Scripted ScriptDriver recording every call
*/
#[derive(Debug, Clone)]
pub struct FakeElement {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    inner_html: String,
    css: BTreeMap<String, String>,
    rect: ElementRect,
    displayed: bool,
    enabled: bool,
    selected: bool,
    checked: bool,
    options: Vec<(String, String, bool)>,
    parent: Option<usize>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        FakeElement {
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            inner_html: String::new(),
            css: BTreeMap::new(),
            rect: ElementRect::default(),
            displayed: true,
            enabled: true,
            selected: false,
            checked: false,
            options: Vec::new(),
            parent: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self.attributes.insert("id".to_string(), id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self.attributes
            .insert("class".to_string(), self.classes.join(" "));
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self.inner_html = text.to_string();
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.inner_html = html.to_string();
        self
    }

    pub fn css(mut self, property: &str, value: &str) -> Self {
        self.css.insert(property.to_string(), value.to_string());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = ElementRect {
            x,
            y,
            width,
            height,
        };
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn option(mut self, value: &str, text: &str, selected: bool) -> Self {
        self.options
            .push((value.to_string(), text.to_string(), selected));
        self
    }
}

#[derive(Debug, Default, Clone)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(text: &str) -> Option<Compound> {
        let mut compound = Compound::default();
        let mut rest = text;
        let ident_end = |s: &str| {
            s.find(|c: char| c == '#' || c == '.' || c == '[')
                .unwrap_or(s.len())
        };
        let end = ident_end(rest);
        if end > 0 {
            compound.tag = Some(rest[..end].to_lowercase()).filter(|t| t != "*");
            rest = &rest[end..];
        }
        while !rest.is_empty() {
            let marker = rest.chars().next()?;
            rest = &rest[1..];
            match marker {
                '#' | '.' => {
                    let end = ident_end(rest);
                    if end == 0 {
                        return None;
                    }
                    if marker == '#' {
                        compound.id = Some(rest[..end].to_string());
                    } else {
                        compound.classes.push(rest[..end].to_string());
                    }
                    rest = &rest[end..];
                }
                '[' => {
                    let end = rest.find(']')?;
                    let body = &rest[..end];
                    let attribute = match body.split_once('=') {
                        Some((name, value)) => (
                            name.to_string(),
                            Some(value.trim_matches(|c| c == '"' || c == '\'').to_string()),
                        ),
                        None => (body.to_string(), None),
                    };
                    compound.attributes.push(attribute);
                    rest = &rest[end + 1..];
                }
                _ => return None,
            }
        }
        Some(compound)
    }

    fn matches(&self, element: &FakeElement) -> bool {
        self.tag.as_ref().is_none_or(|t| *t == element.tag)
            && self
                .id
                .as_ref()
                .is_none_or(|id| element.id.as_ref() == Some(id))
            && self.classes.iter().all(|c| element.classes.contains(c))
            && self.attributes.iter().all(|(name, value)| {
                match (element.attributes.get(name), value) {
                    (Some(actual), Some(expected)) => actual == expected,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
    }
}

#[derive(Default)]
pub struct FakeDom {
    elements: Mutex<Vec<FakeElement>>,
    scripts: Mutex<HashMap<String, NativeFn>>,
    actions: Mutex<Vec<String>>,
    evaluated: Mutex<Vec<(String, Vec<QueryValue>)>>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, mut element: FakeElement, parent: Option<&ElementHandle>) -> ElementHandle {
        element.parent = parent.and_then(|p| index_of(p));
        let mut elements = self.elements.lock().unwrap();
        elements.push(element);
        ElementHandle::new(format!("e{}", elements.len() - 1))
    }

    pub fn set_text(&self, element: &ElementHandle, text: &str) {
        self.update(element, |e| {
            e.text = text.to_string();
            e.inner_html = text.to_string();
        });
    }

    pub fn set_attribute(&self, element: &ElementHandle, name: &str, value: &str) {
        self.update(element, |e| {
            e.attributes.insert(name.to_string(), value.to_string());
        });
    }

    pub fn register_script(
        &self,
        text: &str,
        f: impl Fn(&[QueryValue]) -> Result<QueryValue> + Send + Sync + 'static,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .insert(text.to_string(), NativeFn::new(f));
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn evaluated(&self) -> Vec<(String, Vec<QueryValue>)> {
        self.evaluated.lock().unwrap().clone()
    }

    pub fn backend(self: &Arc<Self>) -> LocalBackend {
        LocalBackend::new(self.clone(), self.clone())
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn read<T>(&self, element: &ElementHandle, f: impl FnOnce(&FakeElement) -> T) -> QueryResult<T> {
        let elements = self.elements.lock().unwrap();
        index_of(element)
            .and_then(|i| elements.get(i))
            .map(f)
            .ok_or_else(|| detached(element))
    }

    fn update(&self, element: &ElementHandle, f: impl FnOnce(&mut FakeElement)) {
        let mut elements = self.elements.lock().unwrap();
        if let Some(e) = index_of(element).and_then(|i| elements.get_mut(i)) {
            f(e);
        }
    }

    fn is_descendant(elements: &[FakeElement], index: usize, ancestor: usize) -> bool {
        let mut current = elements[index].parent;
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = elements[i].parent;
        }
        false
    }

    // Descendant combinators only: every earlier compound must match some ancestor, in order
    fn matches_chain(elements: &[FakeElement], index: usize, chain: &[Compound]) -> bool {
        let Some((last, ancestors)) = chain.split_last() else {
            return false;
        };
        if !last.matches(&elements[index]) {
            return false;
        }
        let mut current = elements[index].parent;
        let mut remaining = ancestors.iter().rev().peekable();
        while let (Some(i), Some(compound)) = (current, remaining.peek()) {
            if compound.matches(&elements[i]) {
                remaining.next();
            }
            current = elements[i].parent;
        }
        remaining.peek().is_none()
    }
}

fn index_of(element: &ElementHandle) -> Option<usize> {
    element.id().strip_prefix('e').and_then(|n| n.parse().ok())
}

fn detached(element: &ElementHandle) -> QueryError {
    QueryError::new(
        ErrorKind::NoSuchElement,
        format!("Element {} is not attached to the document", element),
    )
}

impl DomLibrary for FakeDom {
    fn select(
        &self,
        selector: &str,
        parent: Option<&ElementHandle>,
    ) -> QueryResult<Vec<ElementHandle>> {
        let chain = selector
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                QueryError::new(ErrorKind::Selector, format!("Invalid selector '{}'", selector))
            })?;
        let scope = match parent {
            Some(p) => Some(index_of(p).ok_or_else(|| detached(p))?),
            None => None,
        };
        let elements = self.elements.lock().unwrap();
        Ok((0..elements.len())
            .filter(|&i| scope.is_none_or(|s| Self::is_descendant(&elements, i, s)))
            .filter(|&i| Self::matches_chain(&elements, i, &chain))
            .map(|i| ElementHandle::new(format!("e{}", i)))
            .collect())
    }

    fn attribute_of(&self, element: &ElementHandle, name: &str) -> QueryResult<Option<String>> {
        self.read(element, |e| e.attributes.get(name).cloned())
    }

    fn text_of(&self, element: &ElementHandle) -> QueryResult<String> {
        self.read(element, |e| e.text.clone())
    }

    fn css_of(&self, element: &ElementHandle, property: &str) -> QueryResult<String> {
        self.read(element, |e| e.css.get(property).cloned().unwrap_or_default())
    }

    fn client_rect_of(&self, element: &ElementHandle) -> QueryResult<ElementRect> {
        self.read(element, |e| e.rect)
    }

    fn tag_name_of(&self, element: &ElementHandle) -> QueryResult<String> {
        self.read(element, |e| e.tag.to_uppercase())
    }

    fn inner_html_of(&self, element: &ElementHandle) -> QueryResult<String> {
        self.read(element, |e| e.inner_html.clone())
    }

    fn class_of(&self, element: &ElementHandle) -> QueryResult<String> {
        self.read(element, |e| e.classes.join(" "))
    }

    fn is_displayed(&self, element: &ElementHandle) -> QueryResult<bool> {
        self.read(element, |e| e.displayed)
    }

    fn is_enabled(&self, element: &ElementHandle) -> QueryResult<bool> {
        self.read(element, |e| e.enabled)
    }

    fn is_selected(&self, element: &ElementHandle) -> QueryResult<bool> {
        self.read(element, |e| e.selected)
    }

    fn is_checked(&self, element: &ElementHandle) -> QueryResult<bool> {
        self.read(element, |e| e.checked)
    }

    fn imitate_click(&self, element: &ElementHandle) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.update(element, |e| {
            if e.attributes.get("type").map(String::as_str) == Some("checkbox") {
                e.checked = !e.checked;
            }
        });
        self.record(format!("click {}", element.id()));
        Ok(())
    }

    fn imitate_submit(&self, element: &ElementHandle) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.record(format!("submit {}", element.id()));
        Ok(())
    }

    fn imitate_clear(&self, element: &ElementHandle) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.update(element, |e| {
            e.attributes.insert("value".to_string(), String::new());
        });
        self.record(format!("clear {}", element.id()));
        Ok(())
    }

    fn imitate_append_text(&self, element: &ElementHandle, text: &str) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.update(element, |e| {
            e.attributes
                .entry("value".to_string())
                .or_default()
                .push_str(text);
        });
        self.record(format!("append {} {}", element.id(), text));
        Ok(())
    }

    fn imitate_set_text(&self, element: &ElementHandle, text: &str) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.update(element, |e| {
            e.attributes.insert("value".to_string(), text.to_string());
        });
        self.record(format!("set {} {}", element.id(), text));
        Ok(())
    }

    fn imitate_selection(
        &self,
        element: &ElementHandle,
        options: &[SelectOption],
    ) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.update(element, |e| {
            for (value, text, selected) in e.options.iter_mut() {
                *selected = options.iter().any(|o| match o {
                    SelectOption::Value(v) => v == value,
                    SelectOption::Text(t) => t == text,
                });
            }
        });
        self.record(format!("select {}", element.id()));
        Ok(())
    }

    fn selected_options_of(&self, element: &ElementHandle) -> QueryResult<Vec<QueryValue>> {
        self.read(element, |e| {
            e.options
                .iter()
                .filter(|(_, _, selected)| *selected)
                .map(|(value, text, _)| {
                    QueryValue::Object(BTreeMap::from([
                        ("value".to_string(), QueryValue::from(value.as_str())),
                        ("text".to_string(), QueryValue::from(text.as_str())),
                    ]))
                })
                .collect()
        })
    }

    fn scroll_into_view(&self, element: &ElementHandle) -> QueryResult<()> {
        self.read(element, |_| ())?;
        self.record(format!("scroll {}", element.id()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScriptHost for FakeDom {
    async fn evaluate(&self, script: &ScriptSource, args: &[QueryValue]) -> Result<QueryValue> {
        self.evaluated
            .lock()
            .unwrap()
            .push((script.text.clone(), args.to_vec()));
        let handler = self.scripts.lock().unwrap().get(&script.text).cloned();
        match handler {
            Some(handler) => handler.call(args),
            None => Err(JavascriptError::new(format!(
                "ReferenceError: no script registered for '{}'",
                script.text
            ))
            .into()),
        }
    }
}

#[derive(Default)]
pub struct FakeDriver {
    async_responses: Mutex<VecDeque<Result<JsonValue>>>,
    sync_responses: Mutex<VecDeque<Result<JsonValue>>>,
    async_calls: Mutex<Vec<(String, Vec<JsonValue>)>>,
    sync_calls: Mutex<Vec<(String, Vec<JsonValue>)>>,
    visited: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_async(&self, response: Result<JsonValue>) {
        self.async_responses.lock().unwrap().push_back(response);
    }

    pub fn respond_sync(&self, response: Result<JsonValue>) {
        self.sync_responses.lock().unwrap().push_back(response);
    }

    pub fn async_calls(&self) -> Vec<(String, Vec<JsonValue>)> {
        self.async_calls.lock().unwrap().clone()
    }

    pub fn sync_calls(&self) -> Vec<(String, Vec<JsonValue>)> {
        self.sync_calls.lock().unwrap().clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ScriptDriver for FakeDriver {
    async fn execute_async_script(&self, script: &str, args: Vec<JsonValue>) -> Result<JsonValue> {
        self.async_calls
            .lock()
            .unwrap()
            .push((script.to_string(), args));
        self.async_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "type": "undefined" })))
    }

    async fn execute_script(&self, script: &str, args: Vec<JsonValue>) -> Result<JsonValue> {
        self.sync_calls
            .lock()
            .unwrap()
            .push((script.to_string(), args));
        self.sync_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(JsonValue::Null))
    }

    async fn get(&self, url: &str) -> Result<()> {
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
