//! Capability interface over a remote browser session.
//!
//! Higher layers never touch the browser directly: they address elements with
//! a [`Locator`] and drive them through [`DomControl`]. Every wait is bounded
//! by the timeout the caller passes in.

pub mod chrome;
#[cfg(test)]
pub mod scripted;
pub mod wait;

use std::fmt;
use std::time::Duration;

use crate::error::DomError;

/// How to find an element in the rendered page.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::XPath(s.into())
    }

    pub fn id(id: &str) -> Self {
        Locator::XPath(format!("//*[@id={}]", xpath_literal(id)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::XPath(s) => write!(f, "xpath `{}`", s),
        }
    }
}

/// Quote `s` as an XPath 1.0 string literal. XPath has no escape sequences,
/// so a value holding both quote kinds is assembled with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{}'", s);
    }
    if !s.contains('"') {
        return format!("\"{}\"", s);
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

pub trait DomControl {
    fn click(&self, target: &Locator) -> Result<(), DomError>;

    fn scroll_into_view(&self, target: &Locator) -> Result<(), DomError>;

    fn wait_visible(&self, target: &Locator, timeout: Duration) -> Result<(), DomError>;

    /// Succeeds when the element is hidden or absent.
    fn wait_invisible(&self, target: &Locator, timeout: Duration) -> Result<(), DomError>;

    fn wait_clickable(&self, target: &Locator, timeout: Duration) -> Result<(), DomError>;

    fn outer_html(&self, target: &Locator) -> Result<String, DomError>;

    /// Trimmed, non-empty inner texts of every node matching `target`, in
    /// document order.
    fn texts(&self, target: &Locator) -> Result<Vec<String>, DomError>;

    fn attribute(&self, target: &Locator, name: &str) -> Result<Option<String>, DomError>;

    fn page_source(&self) -> Result<String, DomError>;

    /// Single check without waiting.
    fn is_visible(&self, target: &Locator) -> bool {
        self.wait_visible(target, Duration::ZERO).is_ok()
    }
}
