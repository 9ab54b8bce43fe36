use crate::imports::*;
use serde::{Deserialize, Serialize};

const CSS_SELECTOR: &str = "css selector";

/// WebDriver locator (`{"using": "css selector", "value": "#id"}`). Only CSS
/// locators can be turned into selectors the query library understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub using: String,
    pub value: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator {
            using: CSS_SELECTOR.to_string(),
            value: selector.into(),
        }
    }

    pub fn selector(&self) -> QueryResult<&str> {
        if self.using == CSS_SELECTOR {
            Ok(&self.value)
        } else {
            Err(QueryError::new(
                ErrorKind::Argument,
                format!("Only CSS selectors are supported, got '{}'", self.using),
            ))
        }
    }
}
