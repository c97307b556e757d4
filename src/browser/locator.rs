// src/browser/locator.rs
//! Ordered fallback locators for one logical UI target.
//!
//! Sites name the same field differently (`#username` on one board,
//! `input[name=session_key]` on another). A [`LocatorChain`] lists the
//! candidates most-specific first and [`LocatorChain::resolve`] returns the
//! first one that yields an interactable element within its wait.

use super::{BrowserDriver, DriverError, ElementHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};

pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Elements considered by the [`Strategy::Text`] strategy.
pub const TEXT_CANDIDATES: &str =
    "a, button, [role='button'], input[type='submit'], input[type='button'], label";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Css,
    Id,
    Name,
    NameContains,
    ClassName,
    Tag,
    InputType,
    Placeholder,
    /// Case-insensitive substring of the element's text (or `value` for inputs).
    Text,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Css => "css",
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::NameContains => "name_contains",
            Strategy::ClassName => "class_name",
            Strategy::Tag => "tag",
            Strategy::InputType => "input_type",
            Strategy::Placeholder => "placeholder",
            Strategy::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    #[serde(rename = "by")]
    strategy: Strategy,
    pattern: String,
}

impl Locator {
    pub fn new(strategy: Strategy, pattern: impl Into<String>) -> Self {
        Self {
            strategy,
            pattern: pattern.into(),
        }
    }

    pub fn css(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Css, pattern)
    }

    pub fn id(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Id, pattern)
    }

    pub fn name(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Name, pattern)
    }

    pub fn name_contains(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::NameContains, pattern)
    }

    pub fn class_name(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, pattern)
    }

    pub fn tag(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Tag, pattern)
    }

    pub fn input_type(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::InputType, pattern)
    }

    pub fn placeholder(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Placeholder, pattern)
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Self::new(Strategy::Text, pattern)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// CSS rendering for drivers that query by selector. `None` for text matching.
    pub fn to_css(&self) -> Option<String> {
        let value = self.pattern.replace('\\', "\\\\").replace('"', "\\\"");
        let css = match self.strategy {
            Strategy::Css | Strategy::Tag => self.pattern.clone(),
            Strategy::Id => format!("[id=\"{}\"]", value),
            Strategy::Name => format!("[name=\"{}\"]", value),
            Strategy::NameContains => format!("[name*=\"{}\"]", value),
            Strategy::ClassName => format!("[class~=\"{}\"]", value),
            Strategy::InputType => format!("input[type=\"{}\"]", value),
            Strategy::Placeholder => format!("[placeholder*=\"{}\"]", value),
            Strategy::Text => return None,
        };
        Some(css)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_str(), self.pattern)
    }
}

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("no element found for '{target}' (tried {})", join_locators(.attempted))]
    ElementNotFound {
        target: String,
        attempted: Vec<Locator>,
    },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl LocatorError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LocatorError::Driver(err) if err.is_fatal())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LocatorError::ElementNotFound { .. })
    }
}

fn join_locators(locators: &[Locator]) -> String {
    if locators.is_empty() {
        return "no candidates".to_string();
    }
    locators
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bounded wait applied to each candidate in turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Poll until `accept` returns a non-empty selection or the deadline passes.
    /// A driver call that itself outlives the deadline counts as a miss, as
    /// does any non-fatal driver error. Only transport failures propagate.
    async fn poll<D, F>(
        &self,
        driver: &mut D,
        locator: &Locator,
        mut accept: F,
    ) -> Result<Vec<ElementHandle>, DriverError>
    where
        D: BrowserDriver + ?Sized,
        F: FnMut(Vec<ElementHandle>) -> Vec<ElementHandle>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let found = match timeout(remaining, driver.find_elements(locator)).await {
                Ok(Ok(elements)) => accept(elements),
                Ok(Err(err)) if err.is_fatal() => return Err(err),
                Ok(Err(err)) => {
                    app_log!(warn, "Candidate {} rejected by driver: {}", locator, err);
                    return Ok(Vec::new());
                }
                Err(_) => return Ok(Vec::new()),
            };
            if !found.is_empty() {
                return Ok(found);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            sleep(self.poll_interval.min(remaining)).await;
        }
    }

    /// First interactable element matching `locator`, if one appears in time.
    pub async fn wait_for_element<D>(
        &self,
        driver: &mut D,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, DriverError>
    where
        D: BrowserDriver + ?Sized,
    {
        let found = self
            .poll(driver, locator, |elements| {
                elements.into_iter().filter(|e| e.interactable).take(1).collect()
            })
            .await?;
        Ok(found.into_iter().next())
    }

    /// All elements present for `locator` once at least one appears.
    pub async fn wait_for_elements<D>(
        &self,
        driver: &mut D,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError>
    where
        D: BrowserDriver + ?Sized,
    {
        self.poll(driver, locator, |elements| elements).await
    }
}

/// Candidates for one logical target, tried left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorChain {
    target: String,
    locators: Vec<Locator>,
}

impl LocatorChain {
    pub fn new(target: impl Into<String>, locators: Vec<Locator>) -> Self {
        Self {
            target: target.into(),
            locators,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    /// Same target, new candidates.
    pub fn with_locators(&self, locators: Vec<Locator>) -> Self {
        Self::new(self.target.clone(), locators)
    }

    /// First candidate to produce an interactable element wins.
    pub async fn resolve<D>(&self, driver: &mut D, wait: &WaitPolicy) -> Result<ElementHandle, LocatorError>
    where
        D: BrowserDriver + ?Sized,
    {
        for (index, locator) in self.locators.iter().enumerate() {
            match wait.wait_for_element(driver, locator).await? {
                Some(element) => {
                    app_log!(
                        debug,
                        "Resolved '{}' with candidate {}/{}: {}",
                        self.target,
                        index + 1,
                        self.locators.len(),
                        locator
                    );
                    return Ok(element);
                }
                None => {
                    app_log!(trace, "Candidate {} for '{}' timed out", locator, self.target);
                }
            }
        }

        app_log!(warn, "Exhausted {} candidate(s) for '{}'", self.locators.len(), self.target);
        Err(self.not_found())
    }

    /// Multi-element variant: the first candidate yielding a non-empty set wins.
    pub async fn resolve_all<D>(&self, driver: &mut D, wait: &WaitPolicy) -> Result<Vec<ElementHandle>, LocatorError>
    where
        D: BrowserDriver + ?Sized,
    {
        for locator in &self.locators {
            let elements = wait.wait_for_elements(driver, locator).await?;
            if !elements.is_empty() {
                app_log!(debug, "'{}' matched {} element(s) via {}", self.target, elements.len(), locator);
                return Ok(elements);
            }
        }
        Err(self.not_found())
    }

    fn not_found(&self) -> LocatorError {
        LocatorError::ElementNotFound {
            target: self.target.clone(),
            attempted: self.locators.clone(),
        }
    }
}
