// src/extractors/mod.rs
pub mod league_odds;
pub mod league_tables;
pub mod locator;
pub mod news;
pub mod normalize;
pub mod odds_board;

use scraper::Html;
use serde::Serialize;

use crate::fetch::Processed;
use crate::utils::error::ExtractError;

/// How a pipeline treats a structural anchor that is entirely absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort with `StructureNotFound` (mapped to 404, diagnostics captured).
    Fatal,
    /// Return an empty collection with an `info` note.
    Benign,
}

/// Records assembled from one document.
#[derive(Debug, Clone, Default)]
pub struct Assembled<T> {
    pub payload: T,
    /// Sub-records dropped because they failed assembly.
    pub skipped: usize,
    pub info: Option<String>,
    /// Keep a diagnostic snapshot even though assembly succeeded.
    pub snapshot: bool,
}

impl<T: Default> Assembled<T> {
    pub fn empty_with_info(info: impl Into<String>) -> Self {
        Self { payload: T::default(), skipped: 0, info: Some(info.into()), snapshot: false }
    }
}

impl<T> Processed for Assembled<T> {
    fn wants_snapshot(&self) -> bool {
        self.snapshot
    }
}

/// Resolves what to do when `anchor` never matched.
pub fn missing_anchor<T: Default>(severity: Severity, anchor: &str) -> Result<Assembled<T>, ExtractError> {
    match severity {
        Severity::Fatal => Err(ExtractError::StructureNotFound(anchor.to_string())),
        Severity::Benign => {
            tracing::warn!("{}", anchor);
            Ok(Assembled::empty_with_info(anchor))
        }
    }
}

/// Domain-specific mapping from a parsed document to canonical records.
pub trait Assembler {
    type Payload: Serialize + Default + Send + 'static;

    fn assemble(&self, document: &Html) -> Result<Assembled<Self::Payload>, ExtractError>;
}
