// src/cli.rs
use crate::browser::HttpDriver;
use crate::config::EngineConfig;
use crate::export::ResultsExporter;
use crate::inputs::{CandidateInputs, Credentials};
use crate::resume::{extract_profile, DocumentText, FileDocumentText};
use crate::scrape::{PageScraper, ScrapeResult};
use crate::session::{CancelSignal, FailureKind, RunPlan, Session, SessionSettings, SiteProfile};
use crate::utils::resolve_path;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(about = "Log in to a job board, search, collect listings and apply")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Engine configuration (defaults to ./jobpilot.yaml when present)
    #[arg(long, global = true, env = "JOBPILOT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run login, search, collection and applications for a candidate file
    Run {
        candidate: PathBuf,
        #[arg(long, env = "JOBPILOT_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "JOBPILOT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Overrides `export_path` from the configuration
        #[arg(long)]
        export_path: Option<PathBuf>,
    },
    /// Fetch title and links for every scrape URL in a candidate file
    Scrape { candidate: PathBuf },
    /// Print the profile extracted from a resume (.pdf or text)
    Extract { resume: PathBuf },
    /// Check a candidate file without touching the network
    Validate { candidate: PathBuf },
}

#[derive(Serialize)]
struct RunOutput<'a> {
    scraped: &'a [ScrapeResult],
    report: &'a crate::session::RunReport,
}

pub async fn handle_command(cli: Cli, config: EngineConfig, cancel: CancelSignal) -> Result<()> {
    match cli.command {
        Command::Run {
            candidate,
            username,
            password,
            export_path,
        } => {
            let credentials = credentials(username, password)?;
            let inputs = load_candidate(&candidate)?.with_credentials(credentials);
            let inputs = inputs.validate().context("Invalid candidate file")?;

            let scraped = scrape(&config, &inputs.scrape_urls).await?;

            let site = SiteProfile::from_config(&config.site)?;
            let plan = RunPlan::from_inputs(&inputs, &site)?;
            let settings = SessionSettings::from_config(&config)?;
            let export_path = resolve_path(&export_path.unwrap_or_else(|| config.export_path.clone()))?;
            let driver = HttpDriver::new(&config.user_agent, config.page_load_timeout())?;

            app_log!(info, "Exporting listings to {}", export_path.display());
            let report = Session::new(driver, settings)
                .with_site(site)
                .with_exporter(ResultsExporter::new(export_path))
                .with_cancel(cancel)
                .run(plan)
                .await;

            print_json(&RunOutput {
                scraped: &scraped,
                report: &report,
            })?;

            match report.failure() {
                Some(failure) if failure.kind == FailureKind::Transport => {
                    anyhow::bail!("Run aborted: {}", failure)
                }
                Some(failure) => app_log!(warn, "Run ended early: {}", failure),
                None => app_log!(info, "Run complete: {} application(s) submitted", report.submitted()),
            }
        }

        Command::Scrape { candidate } => {
            let inputs = load_candidate(&candidate)?
                .validate()
                .context("Invalid candidate file")?;
            if inputs.scrape_urls.is_empty() {
                app_log!(info, "No scrape URLs in {}", candidate.display());
            }
            let results = scrape(&config, &inputs.scrape_urls).await?;
            let failed: Vec<&str> = results.iter().filter(|r| r.is_error()).map(ScrapeResult::url).collect();
            if !failed.is_empty() {
                app_log!(warn, "{} of {} page(s) failed: {}", failed.len(), results.len(), failed.join(", "));
            }
            print_json(&results)?;
        }

        Command::Extract { resume } => {
            let text = FileDocumentText.extract_text(&resume)?;
            let profile = extract_profile(&text);
            if profile.is_empty() {
                app_log!(warn, "Nothing recognisable in {}", resume.display());
            }
            print_json(&profile)?;
        }

        Command::Validate { candidate } => match load_candidate(&candidate)?.validate() {
            Ok(inputs) => {
                println!("✅ {} is valid", candidate.display());
                println!("   Candidate: {} {}", inputs.first_name, inputs.last_name);
                println!("   Job site: {}", inputs.job_site_url);
                println!("   Titles: {}", inputs.desired_titles.join(", "));
                println!("   Location: {}", inputs.location.as_deref().unwrap_or_default());
                for url in &inputs.scrape_urls {
                    println!("   Scrape: {}", url);
                }
            }
            Err(e) => {
                app_log!(error, "Validation failed for {}: {}", candidate.display(), e);
                anyhow::bail!("❌ {}: {}", candidate.display(), e);
            }
        },
    }

    Ok(())
}

fn load_candidate(path: &Path) -> Result<CandidateInputs> {
    CandidateInputs::load(path)
}

fn credentials(username: Option<String>, password: Option<String>) -> Result<Option<Credentials>> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(Credentials::new(username, password))),
        (None, None) => Ok(None),
        _ => anyhow::bail!("Both a username and a password are needed to log in"),
    }
}

async fn scrape(config: &EngineConfig, urls: &[String]) -> Result<Vec<ScrapeResult>> {
    if urls.is_empty() {
        return Ok(Vec::new());
    }
    let scraper = PageScraper::new(&config.user_agent, config.page_load_timeout())?;
    Ok(scraper.scrape_all(urls).await)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
