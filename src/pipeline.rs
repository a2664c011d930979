// src/pipeline.rs
//! Fetch -> parse -> assemble, and the JSON envelope every run ends in.

use std::time::Duration;

use scraper::Html;
use serde::Serialize;

use crate::extractors::league_odds::{self, LeagueOddsExtractor};
use crate::extractors::league_tables::{self, LeagueTablesExtractor};
use crate::extractors::news::{self, NewsExtractor};
use crate::extractors::odds_board::{self, OddsBoardExtractor};
use crate::extractors::Assembler;
use crate::fetch::{FetchMode, PageFetcher, RenderOptions, Target};
use crate::utils::error::{FailureKind, PipelineError};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// One extraction domain: where its page lives and how it must be fetched.
pub trait Pipeline: Assembler + Clone + Send + Sync + 'static {
    /// Short domain id used in logs and diagnostic file names.
    fn name(&self) -> &'static str;
    fn url(&self) -> &str;
    fn anchors(&self) -> &'static [(&'static str, &'static str)];
    fn mode(&self) -> FetchMode;

    fn target(&self) -> Target {
        Target { domain: self.name(), url: self.url().to_string(), anchors: self.anchors() }
    }
}

fn rendered(ready_selector: &'static str, ready_secs: u64, settle_secs: u64) -> FetchMode {
    FetchMode::Rendered(RenderOptions {
        ready_selector,
        nav_timeout: NAVIGATION_TIMEOUT,
        ready_timeout: Duration::from_secs(ready_secs),
        settle: Duration::from_secs(settle_secs),
    })
}

impl Pipeline for LeagueOddsExtractor {
    fn name(&self) -> &'static str {
        "liga"
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn anchors(&self) -> &'static [(&'static str, &'static str)] {
        league_odds::ANCHORS
    }
    fn mode(&self) -> FetchMode {
        rendered(".oddscomp-widget-iframe-container", 15, 3)
    }
}

impl Pipeline for NewsExtractor {
    fn name(&self) -> &'static str {
        "relevo"
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn anchors(&self) -> &'static [(&'static str, &'static str)] {
        news::ANCHORS
    }
    fn mode(&self) -> FetchMode {
        rendered("div.grid--AB-C article.article", 20, 5)
    }
}

impl Pipeline for LeagueTablesExtractor {
    fn name(&self) -> &'static str {
        "tablesleague"
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn anchors(&self) -> &'static [(&'static str, &'static str)] {
        league_tables::ANCHORS
    }
    fn mode(&self) -> FetchMode {
        FetchMode::Static
    }
}

impl Pipeline for OddsBoardExtractor {
    fn name(&self) -> &'static str {
        "transfermarkt_general"
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn anchors(&self) -> &'static [(&'static str, &'static str)] {
        odds_board::ANCHORS
    }
    fn mode(&self) -> FetchMode {
        rendered(".card__item-container", 15, 3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Parsing,
    Assembling,
    Succeeded,
    PartiallyFailed,
    Failed,
}

fn transition(domain: &str, from: PipelineState, to: PipelineState) -> PipelineState {
    tracing::debug!("{}: {:?} -> {:?}", domain, from, to);
    to
}

/// Result of one run, serialized as the response body.
#[derive(Debug, Serialize)]
pub struct ScrapeReport<T> {
    pub scraped_at: String,
    #[serde(flatten)]
    pub payload: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_scraping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip)]
    pub state: PipelineState,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
    #[serde(skip)]
    pub skipped: usize,
}

impl<T> ScrapeReport<T> {
    pub fn status_code(&self) -> u16 {
        self.failure.map_or(200, FailureKind::status_code)
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Runs `pipeline` once. Never fails: errors end up in the report with a mapped status.
pub async fn run<P: Pipeline>(pipeline: &P, fetcher: &PageFetcher) -> ScrapeReport<P::Payload> {
    let scraped_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let domain = pipeline.name();
    tracing::info!("{}: starting scrape of {}", domain, pipeline.url());

    let state = transition(domain, PipelineState::Idle, PipelineState::Fetching);
    let assembler = pipeline.clone();
    let result = fetcher
        .fetch_with(&pipeline.target(), pipeline.mode(), move |markup| {
            let state = transition(domain, state, PipelineState::Parsing);
            let document = Html::parse_document(markup);
            transition(domain, state, PipelineState::Assembling);
            assembler.assemble(&document).map_err(PipelineError::from)
        })
        .await;

    match result {
        Ok(assembled) => {
            let outcome = if assembled.skipped > 0 { PipelineState::PartiallyFailed } else { PipelineState::Succeeded };
            let state = transition(domain, PipelineState::Assembling, outcome);
            if assembled.skipped > 0 {
                tracing::warn!("{}: finished with {} record(s) skipped", domain, assembled.skipped);
            } else {
                tracing::info!("{}: finished", domain);
            }
            ScrapeReport {
                scraped_at,
                payload: assembled.payload,
                error: None,
                error_scraping: None,
                info: assembled.info,
                state,
                failure: None,
                skipped: assembled.skipped,
            }
        }
        Err(e) => {
            let state = transition(domain, state, PipelineState::Failed);
            let kind = e.failure_kind();
            tracing::error!("{}: failed ({:?}): {}", domain, kind, e);
            let (error, error_scraping) = match kind {
                FailureKind::Internal => (None, Some(e.to_string())),
                _ => (Some(e.to_string()), None),
            };
            ScrapeReport {
                scraped_at,
                payload: P::Payload::default(),
                error,
                error_scraping,
                info: None,
                state,
                failure: Some(kind),
                skipped: 0,
            }
        }
    }
}
