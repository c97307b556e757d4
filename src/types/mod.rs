// src/types/mod.rs
//! Data carried between the engine stages and handed back to callers

pub mod listing;
pub mod profile;

pub use listing::{JobListing, ListingSet};
pub use profile::{DateRange, JobHistoryEntry, ResumeProfile};
