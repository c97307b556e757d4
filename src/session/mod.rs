// src/session/mod.rs
//! Login, search, collect and apply as one owned, monotonic run.

pub mod cancel;
pub mod orchestrator;
pub mod site;

use crate::browser::DriverError;
use crate::export::ExportSummary;
use crate::types::{JobListing, ResumeProfile};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use orchestrator::{Applicant, ResumeSource, RunPlan, Session, SessionSettings};
pub use site::SiteProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    LoginExhausted,
    SearchUnavailable,
    SearchFieldNotFound,
    NoListings,
    Transport,
    Cancelled,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::LoginExhausted => "login_exhausted",
            FailureKind::SearchUnavailable => "search_unavailable",
            FailureKind::SearchFieldNotFound => "search_field_not_found",
            FailureKind::NoListings => "no_listings",
            FailureKind::Transport => "transport",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

/// Why a run stopped early. `kind` is the stable reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn reason(&self) -> &'static str {
        self.kind.as_str()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "failure", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    LoggingIn,
    Searching,
    Collecting,
    Applying,
    Done,
    Failed(Failure),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::LoggingIn => "logging_in",
            SessionState::Searching => "searching",
            SessionState::Collecting => "collecting",
            SessionState::Applying => "applying",
            SessionState::Done => "done",
            SessionState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed(_))
    }

    /// Forward edges only. Login, collection passes and per-listing applies loop on themselves.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Done | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Idle, LoggingIn | Searching) => true,
            (LoggingIn, LoggingIn | Searching) => true,
            (Searching, Collecting) => true,
            (Collecting, Collecting | Applying) => true,
            (Applying, Applying | Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(failure) => write!(f, "failed({})", failure),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ApplicationOutcome {
    Submitted,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRecord {
    pub listing: JobListing,
    pub outcome: ApplicationOutcome,
}

/// Everything a run produced, whichever state it ended in.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub session_id: Uuid,
    pub final_state: SessionState,
    pub transitions: Vec<SessionState>,
    pub login_attempts: u32,
    pub listings: Vec<JobListing>,
    pub applications: Vec<ApplicationRecord>,
    pub profile: Option<ResumeProfile>,
    pub export: Option<ExportSummary>,
}

impl RunReport {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            final_state: SessionState::Idle,
            transitions: vec![SessionState::Idle],
            login_attempts: 0,
            listings: Vec::new(),
            applications: Vec::new(),
            profile: None,
            export: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.final_state == SessionState::Done
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.final_state {
            SessionState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn submitted(&self) -> usize {
        self.applications
            .iter()
            .filter(|record| record.outcome == ApplicationOutcome::Submitted)
            .count()
    }
}

/// How a stage ends early. Only `Transport` means the browser is gone.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Halted(Failure),
    #[error(transparent)]
    Transport(DriverError),
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: &'static str, to: &'static str },
}

impl SessionError {
    fn into_failure(self) -> Failure {
        match self {
            SessionError::Halted(failure) => failure,
            SessionError::Transport(err) => Failure::new(FailureKind::Transport, err.to_string()),
            other => Failure::new(FailureKind::Internal, other.to_string()),
        }
    }
}
