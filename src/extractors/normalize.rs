// src/extractors/normalize.rs
//! Pure text normalization: cleaned node text, odds, dates and table headers.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

/// Placeholder for any field that could not be extracted.
pub const SENTINEL: &str = "unknown";

static ODD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)").expect("Failed to compile ODD_RE"));

/// Collapses every whitespace run (NBSP included) into one space and trims.
pub fn squash_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace-normalized text of an element.
pub fn node_text(element: ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<String>())
}

/// Cleaned text of an optional node; the sentinel when the node is missing or has no text.
pub fn clean_text(element: Option<ElementRef<'_>>) -> String {
    match element {
        Some(el) => or_sentinel(&node_text(el)),
        None => SENTINEL.to_string(),
    }
}

/// Trimmed `text`, or the sentinel when nothing is left.
pub fn or_sentinel(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        SENTINEL.to_string()
    } else {
        text.to_string()
    }
}

/// True when `value` carries real content (neither empty nor the sentinel).
pub fn is_known(value: &str) -> bool {
    !value.trim().is_empty() && value != SENTINEL
}

/// First decimal numeral in `text`, or the sentinel. No plausibility checks.
pub fn clean_odd(text: &str) -> String {
    let text = text.trim().replace('\u{a0}', " ");
    ODD_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// Absolute form of `href` relative to the site `origin`; absolute links pass through.
pub fn absolute_url(href: &str, origin: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return SENTINEL.to_string();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match reqwest::Url::parse(origin).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::debug!("Could not resolve '{}' against {}: {}", href, origin, e);
            href.to_string()
        }
    }
}

/// Date conventions of the scraped sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDialect {
    /// `dd/mm/yyyy`-style dates, rendered to minute precision.
    DayFirst,
    /// ISO / RFC 3339 first, then month-first; rendered to second precision.
    Default,
}

impl DateDialect {
    fn output_format(self) -> &'static str {
        match self {
            DateDialect::DayFirst => "%Y-%m-%d %H:%M",
            DateDialect::Default => "%Y-%m-%d %H:%M:%S",
        }
    }
}

const DAY_FIRST_DATETIME: &[&str] = &["%d/%m/%Y %H:%M", "%d/%m/%Y - %H:%M", "%d.%m.%Y %H:%M", "%d-%m-%Y %H:%M"];
const DAY_FIRST_DATE: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%d/%m/%y"];
const DEFAULT_DATETIME: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];
const DEFAULT_DATE: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parses `text` in the given dialect. Never fails: unparseable input comes back verbatim
/// (trimmed) and blank input becomes the sentinel, so the result is never empty.
pub fn parse_date(text: &str, dialect: DateDialect) -> String {
    let raw = text.trim();
    if raw.is_empty() {
        return SENTINEL.to_string();
    }
    let candidate = squash_whitespace(raw);

    let parsed = match dialect {
        DateDialect::DayFirst => parse_day_first(&candidate).or_else(|| {
            // Retry with any trailing " - ..." part cut off.
            candidate.split_once(" - ").and_then(|(head, _)| parse_day_first(head.trim()))
        }),
        DateDialect::Default => parse_default(&candidate),
    };

    match parsed {
        Some(dt) => dt.format(dialect.output_format()).to_string(),
        None => {
            tracing::debug!("Could not parse date '{}' ({:?}), keeping raw text", raw, dialect);
            raw.to_string()
        }
    }
}

fn parse_day_first(text: &str) -> Option<NaiveDateTime> {
    parse_with(text, DAY_FIRST_DATETIME, DAY_FIRST_DATE).or_else(|| {
        // Day and month only: assume the current season's year.
        let year = chrono::Local::now().year();
        let with_year = match text.split_once(' ') {
            Some((day_month, time)) => format!("{}/{} {}", day_month, year, time),
            None => format!("{}/{}", text, year),
        };
        parse_with(&with_year, &["%d/%m/%Y %H:%M"], &["%d/%m/%Y"])
    })
}

fn parse_default(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    parse_with(text, DEFAULT_DATETIME, DEFAULT_DATE)
}

fn parse_with(text: &str, datetime_formats: &[&str], date_formats: &[&str]) -> Option<NaiveDateTime> {
    datetime_formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            date_formats
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Canonical league-table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableField {
    Position,
    Team,
    Played,
    Won,
    Drawn,
    Lost,
    GoalsFor,
    GoalsAgainst,
    GoalDifference,
    Points,
}

impl TableField {
    pub fn as_str(self) -> &'static str {
        match self {
            TableField::Position => "Position",
            TableField::Team => "Team",
            TableField::Played => "Played",
            TableField::Won => "Won",
            TableField::Drawn => "Drawn",
            TableField::Lost => "Lost",
            TableField::GoalsFor => "GoalsFor",
            TableField::GoalsAgainst => "GoalsAgainst",
            TableField::GoalDifference => "GoalDifference",
            TableField::Points => "Points",
        }
    }
}

/// Header synonyms seen across site variants, matched case-insensitively.
/// The canonical names map to themselves so canonicalization is idempotent.
/// "P" is ambiguous between played and lost; played wins.
pub const HEADER_MAP: &[(&str, TableField)] = &[
    ("#", TableField::Position),
    ("POS", TableField::Position),
    ("POSITION", TableField::Position),
    ("TEAM", TableField::Team),
    ("CLUB", TableField::Team),
    ("EQUIPO", TableField::Team),
    ("M", TableField::Played),
    ("P", TableField::Played),
    ("PJ", TableField::Played),
    ("PLD", TableField::Played),
    ("PLAYED", TableField::Played),
    ("W", TableField::Won),
    ("G", TableField::Won),
    ("PG", TableField::Won),
    ("WON", TableField::Won),
    ("D", TableField::Drawn),
    ("E", TableField::Drawn),
    ("PE", TableField::Drawn),
    ("DRAWN", TableField::Drawn),
    ("L", TableField::Lost),
    ("PP", TableField::Lost),
    ("LOST", TableField::Lost),
    ("G+", TableField::GoalsFor),
    ("GF", TableField::GoalsFor),
    ("F", TableField::GoalsFor),
    ("GOALSFOR", TableField::GoalsFor),
    ("G-", TableField::GoalsAgainst),
    ("GA", TableField::GoalsAgainst),
    ("A", TableField::GoalsAgainst),
    ("GC", TableField::GoalsAgainst),
    ("GOALSAGAINST", TableField::GoalsAgainst),
    ("GD", TableField::GoalDifference),
    ("DG", TableField::GoalDifference),
    ("DIF", TableField::GoalDifference),
    ("+/-", TableField::GoalDifference),
    ("GOALDIFFERENCE", TableField::GoalDifference),
    ("PTS", TableField::Points),
    ("PUNTOS", TableField::Points),
    ("POINTS", TableField::Points),
];

static POSITIONAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^column_\d+$").expect("Failed to compile POSITIONAL_RE"));

/// Name used for a column without a recognised header (1-based).
pub fn positional_name(index: usize) -> String {
    format!("column_{}", index + 1)
}

pub fn lookup_header(raw: &str) -> Option<TableField> {
    let key = squash_whitespace(raw).to_uppercase();
    HEADER_MAP.iter().find(|(synonym, _)| *synonym == key).map(|(_, field)| *field)
}

/// Maps a raw header to its canonical name; unmapped headers become `column_N`, where N is
/// the 1-based position (`index + 1`). Positional names pass through unchanged.
pub fn canonicalize_header(raw: &str, index: usize) -> String {
    let trimmed = raw.trim();
    if POSITIONAL_RE.is_match(trimmed) {
        return trimmed.to_string();
    }
    match lookup_header(trimmed) {
        Some(field) => field.as_str().to_string(),
        None => positional_name(index),
    }
}
