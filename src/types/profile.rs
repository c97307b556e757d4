// src/types/profile.rs
//! Candidate facts recovered from resume text

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub job_history: Vec<JobHistoryEntry>,
}

impl ResumeProfile {
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.job_history.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHistoryEntry {
    pub company: String,
    pub role: String,
    pub date_range: DateRange,
}

/// `YYYY-YYYY`, or `YYYY-Present` when `end` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: u16,
    pub end: Option<u16>,
}

impl DateRange {
    pub fn is_current(&self) -> bool {
        self.end.is_none()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-Present", self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_display() {
        let closed = DateRange { start: 2015, end: Some(2019) };
        let open = DateRange { start: 2019, end: None };
        assert_eq!(closed.to_string(), "2015-2019");
        assert_eq!(open.to_string(), "2019-Present");
        assert!(open.is_current());
    }

    #[test]
    fn test_full_name() {
        let mut profile = ResumeProfile::default();
        assert!(profile.is_empty());
        assert_eq!(profile.full_name(), None);

        profile.first_name = Some("Ada".into());
        profile.last_name = Some("Lovelace".into());
        assert_eq!(profile.full_name().as_deref(), Some("Ada Lovelace"));
    }
}
