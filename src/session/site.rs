// src/session/site.rs
//! Default locator chains for the targets a run interacts with.
//!
//! Each chain starts with the names used by the large boards and falls back
//! to generic attribute and text matches. `jobpilot.yaml` can replace any
//! chain by target name.

use crate::browser::{Locator, LocatorChain};
use crate::config::{ConfigError, SiteConfig};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub login_path: String,
    pub search_path: String,
    pub username: LocatorChain,
    pub password: LocatorChain,
    pub login_submit: LocatorChain,
    pub search_keywords: LocatorChain,
    pub search_location: LocatorChain,
    pub search_submit: LocatorChain,
    pub listing_container: LocatorChain,
    pub listing_item: LocatorChain,
    pub apply_button: LocatorChain,
    pub submit_application: LocatorChain,
    pub applicant_first_name: LocatorChain,
    pub applicant_last_name: LocatorChain,
    pub applicant_email: LocatorChain,
    pub applicant_phone: LocatorChain,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            search_path: "/jobs".to_string(),
            username: LocatorChain::new(
                "username",
                vec![
                    Locator::id("username"),
                    Locator::name("session_key"),
                    Locator::input_type("email"),
                    Locator::name_contains("email"),
                    Locator::name_contains("user"),
                ],
            ),
            password: LocatorChain::new(
                "password",
                vec![
                    Locator::id("password"),
                    Locator::name("session_password"),
                    Locator::input_type("password"),
                    Locator::name_contains("password"),
                ],
            ),
            login_submit: LocatorChain::new(
                "login_submit",
                vec![
                    Locator::css("button[type='submit']"),
                    Locator::input_type("submit"),
                    Locator::text("sign in"),
                    Locator::text("log in"),
                ],
            ),
            search_keywords: LocatorChain::new(
                "search_keywords",
                vec![
                    Locator::class_name("jobs-search-box__text-input"),
                    Locator::id("text-input-what"),
                    Locator::name("keywords"),
                    Locator::name_contains("keyword"),
                    Locator::input_type("search"),
                    Locator::placeholder("Search"),
                ],
            ),
            search_location: LocatorChain::new(
                "search_location",
                vec![
                    Locator::id("text-input-where"),
                    Locator::name("location"),
                    Locator::name_contains("location"),
                    Locator::placeholder("Location"),
                ],
            ),
            search_submit: LocatorChain::new(
                "search_submit",
                vec![
                    Locator::class_name("jobs-search-box__submit-button"),
                    Locator::css("form[role='search'] button[type='submit']"),
                    Locator::text("search"),
                ],
            ),
            listing_container: LocatorChain::new(
                "listing_container",
                vec![
                    Locator::class_name("jobs-search__results-list"),
                    Locator::class_name("scaffold-layout__list"),
                    Locator::id("mosaic-provider-jobcards"),
                    Locator::tag("main"),
                ],
            ),
            listing_item: LocatorChain::new(
                "listing_item",
                vec![
                    Locator::css("a.base-card__full-link"),
                    Locator::class_name("job-card-list__title"),
                    Locator::css("[data-job-id] a[href]"),
                    Locator::css("a[href*='/jobs/view']"),
                ],
            ),
            apply_button: LocatorChain::new(
                "apply_button",
                vec![
                    Locator::class_name("jobs-apply-button"),
                    Locator::id("indeedApplyButton"),
                    Locator::text("easy apply"),
                    Locator::text("apply"),
                ],
            ),
            submit_application: LocatorChain::new(
                "submit_application",
                vec![
                    Locator::css("button[aria-label='Submit application']"),
                    Locator::text("submit application"),
                    Locator::text("submit"),
                    Locator::input_type("submit"),
                ],
            ),
            applicant_first_name: LocatorChain::new(
                "applicant_first_name",
                vec![Locator::name_contains("first"), Locator::placeholder("First")],
            ),
            applicant_last_name: LocatorChain::new(
                "applicant_last_name",
                vec![Locator::name_contains("last"), Locator::placeholder("Last")],
            ),
            applicant_email: LocatorChain::new(
                "applicant_email",
                vec![Locator::input_type("email"), Locator::name_contains("email")],
            ),
            applicant_phone: LocatorChain::new(
                "applicant_phone",
                vec![Locator::input_type("tel"), Locator::name_contains("phone")],
            ),
        }
    }
}

impl SiteProfile {
    pub fn from_config(config: &SiteConfig) -> Result<Self, ConfigError> {
        let mut profile = Self {
            login_path: config.login_path.clone(),
            search_path: config.search_path.clone(),
            ..Self::default()
        };
        profile.apply_overrides(&config.locators)?;
        Ok(profile)
    }

    /// Replace whole chains by target name. An empty candidate list is rejected.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, Vec<Locator>>) -> Result<(), ConfigError> {
        for (target, locators) in overrides {
            if locators.is_empty() {
                return Err(ConfigError::Invalid(format!("no locators given for '{}'", target)));
            }
            let chain = self
                .chain_mut(target)
                .ok_or_else(|| ConfigError::UnknownTarget(target.clone()))?;
            *chain = chain.with_locators(locators.clone());
        }
        Ok(())
    }

    fn chain_mut(&mut self, target: &str) -> Option<&mut LocatorChain> {
        let chain = match target {
            "username" => &mut self.username,
            "password" => &mut self.password,
            "login_submit" => &mut self.login_submit,
            "search_keywords" => &mut self.search_keywords,
            "search_location" => &mut self.search_location,
            "search_submit" => &mut self.search_submit,
            "listing_container" => &mut self.listing_container,
            "listing_item" => &mut self.listing_item,
            "apply_button" => &mut self.apply_button,
            "submit_application" => &mut self.submit_application,
            "applicant_first_name" => &mut self.applicant_first_name,
            "applicant_last_name" => &mut self.applicant_last_name,
            "applicant_email" => &mut self.applicant_email,
            "applicant_phone" => &mut self.applicant_phone,
            _ => return None,
        };
        Some(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_chains_cover_generic_variants() {
        let site = SiteProfile::default();
        assert!(site.username.locators().contains(&Locator::input_type("email")));
        assert!(site.username.locators().contains(&Locator::name_contains("email")));
        assert!(site.password.locators().contains(&Locator::input_type("password")));
        assert!(site.password.locators().contains(&Locator::name_contains("password")));
    }

    #[test]
    fn test_overrides_replace_named_chain() {
        let mut locators = HashMap::new();
        locators.insert("apply_button".to_string(), vec![Locator::text("Quick apply")]);
        let config = SiteConfig {
            search_path: "/search".into(),
            locators,
            ..SiteConfig::default()
        };

        let site = SiteProfile::from_config(&config).unwrap();
        assert_eq!(site.apply_button.target(), "apply_button");
        assert_eq!(site.apply_button.locators(), &[Locator::text("Quick apply")]);
        assert_eq!(site.search_path, "/search");
        assert_eq!(site.username, SiteProfile::default().username);
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("captcha".to_string(), vec![Locator::id("x")]);
        let err = SiteProfile::default().apply_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTarget(target) if target == "captcha"));
    }
}
