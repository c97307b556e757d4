// src/lib.rs
//! Job-board automation engine.
//!
//! A [`session::Session`] logs in, searches, collects listings and applies
//! to them through a [`browser::BrowserDriver`], resolving every page element
//! through fallback [`browser::LocatorChain`]s. Listings are appended to a CSV
//! store by [`export::ResultsExporter`] and resume facts come from
//! [`resume::extract_profile`].

/// Crate-wide logging entry point, `app_log!(info, "...")`.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!(target: "jobpilot", $($arg)+)
    };
}

pub mod browser;
pub mod cli;
pub mod config;
pub mod export;
pub mod inputs;
pub mod resume;
pub mod scrape;
pub mod session;
pub mod types;
pub mod utils;

pub use browser::{BrowserDriver, HttpDriver, Locator, LocatorChain};
pub use config::EngineConfig;
pub use export::{ExportSummary, ResultsExporter};
pub use inputs::{CandidateInputs, Credentials, SearchCriteria};
pub use resume::extract_profile;
pub use session::{RunPlan, RunReport, Session, SessionSettings, SessionState};
pub use types::{JobListing, ResumeProfile};
