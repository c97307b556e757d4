// src/types/listing.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A job posting discovered on a results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub title: String,
    pub link: String,
    pub discovered_at: DateTime<Utc>,
}

impl JobListing {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            discovered_at: Utc::now(),
        }
    }

    pub fn with_discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }

    /// Uniqueness key: two listings are the same posting when title and link agree.
    pub fn key(&self) -> (&str, &str) {
        (&self.title, &self.link)
    }
}

/// Insertion-ordered set of listings, deduplicated by `(title, link)`.
#[derive(Debug, Default, Clone)]
pub struct ListingSet {
    seen: HashSet<(String, String)>,
    listings: Vec<JobListing>,
}

impl ListingSet {
    /// Returns false when the listing was already present; the first copy wins.
    pub fn insert(&mut self, listing: JobListing) -> bool {
        let (title, link) = listing.key();
        if !self.seen.insert((title.to_string(), link.to_string())) {
            return false;
        }
        self.listings.push(listing);
        true
    }

    /// Merge a scan into the set, returning how many listings were new.
    pub fn merge<I>(&mut self, scan: I) -> usize
    where
        I: IntoIterator<Item = JobListing>,
    {
        let mut added = 0;
        for listing in scan {
            if self.insert(listing) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobListing> {
        self.listings.iter()
    }

    pub fn into_vec(self) -> Vec<JobListing> {
        self.listings
    }
}
