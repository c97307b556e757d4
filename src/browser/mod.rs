// src/browser/mod.rs
//! Browser-automation seam.
//!
//! The engine never talks to a concrete browser. It drives anything that
//! implements [`BrowserDriver`]: navigation, element queries, clicks, typing
//! and scrolling. Waiting for elements is layered on top of these primitives
//! by [`locator::WaitPolicy`].

pub mod http_driver;
pub mod locator;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use http_driver::HttpDriver;
pub use locator::{Locator, LocatorChain, LocatorError, Strategy, WaitPolicy};

#[derive(Debug, Error)]
pub enum DriverError {
    /// The browser cannot be controlled at all. The only fatal driver error.
    #[error("browser transport unavailable: {0}")]
    Transport(String),
    #[error("failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("{action} timed out after {after:?}")]
    Timeout { action: String, after: Duration },
    #[error("element {0} is no longer attached to the page")]
    StaleElement(ElementId),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl DriverError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Transport(_))
    }
}

/// Opaque, driver-assigned element reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of an element taken when it was located.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    pub id: ElementId,
    pub tag: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Own `href`, or the first nested anchor's `href` for card-like containers.
    pub link: Option<String>,
    /// Visible and enabled.
    pub interactable: bool,
}

impl ElementHandle {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Best human-readable label: text content, then title/aria-label/value.
    pub fn label(&self) -> Option<String> {
        let text = crate::utils::clean_text(&self.text);
        if !text.is_empty() {
            return Some(text);
        }
        ["title", "aria-label", "value"]
            .iter()
            .filter_map(|name| self.attr(name))
            .map(crate::utils::clean_text)
            .find(|label| !label.is_empty())
    }
}

#[async_trait]
pub trait BrowserDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    /// Every element currently matching the locator, in document order.
    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    async fn press_return(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;

    async fn page_text(&mut self) -> Result<String, DriverError>;

    /// Release the underlying browser session. Called exactly once per run.
    async fn close(&mut self) -> Result<(), DriverError>;
}
