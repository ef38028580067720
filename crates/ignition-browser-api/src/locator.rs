//! Element locators and handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// Element `id` attribute
    Id(String),
    /// Single CSS class name
    ClassName(String),
    /// Arbitrary CSS selector
    Css(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn class_name(class: impl Into<String>) -> Self {
        Self::ClassName(class.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Equivalent CSS selector.
    ///
    /// Ids and class names go through attribute selectors so that values
    /// which are not valid CSS identifiers still match.
    pub fn to_css(&self) -> String {
        match self {
            Locator::Id(id) => format!("[id=\"{}\"]", escape_attr(id)),
            Locator::ClassName(class) => format!("[class~=\"{}\"]", escape_attr(class)),
            Locator::Css(selector) => selector.clone(),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id={}", id),
            Locator::ClassName(class) => write!(f, "class={}", class),
            Locator::Css(selector) => write!(f, "css={}", selector),
        }
    }
}

/// Opaque reference to an element found in a session.
///
/// Only meaningful to the session that returned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_translation() {
        assert_eq!(Locator::id("user").to_css(), "[id=\"user\"]");
        assert_eq!(Locator::class_name("statuslabel").to_css(), "[class~=\"statuslabel\"]");
        assert_eq!(Locator::css("button.start").to_css(), "button.start");
        assert_eq!(Locator::id("we\"ird").to_css(), "[id=\"we\\\"ird\"]");
    }

    #[test]
    fn locator_deserializes_from_tagged_form() {
        let locator: Locator =
            serde_json::from_str(r#"{"by":"class_name","value":"error"}"#).unwrap();
        assert_eq!(locator, Locator::class_name("error"));
        assert_eq!(locator.to_string(), "class=error");
    }
}
