// src/extractors/league_tables.rs
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::extractors::locator::{first_text, Locator, Predicate, Strategy, TextStrategy};
use crate::extractors::normalize::{canonicalize_header, is_known, node_text, positional_name, squash_whitespace, TableField, SENTINEL};
use crate::extractors::{missing_anchor, Assembled, Assembler, Severity};
use crate::utils::error::ExtractError;

pub const TABLESLEAGUE_URL: &str = "https://m.tablesleague.com/";

pub const ANCHORS: &[(&str, &str)] = &[("class=\"content\"", "content"), ("flag", "flag"), ("row headers", "headers")];

/// Header sequence assumed when a table has no header row.
pub const DEFAULT_HEADERS: [&str; 10] = ["#", "Team", "M", "W", "D", "L", "G+", "G-", "GD", "PTS"];

static FLAG: Lazy<Selector> = Lazy::new(|| Selector::parse("img.flag").expect("Failed to compile FLAG"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("Failed to compile ANCHOR"));
static TABLE_DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div.table").expect("Failed to compile TABLE_DIV"));
static HEADER_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.row.headers").expect("Failed to compile HEADER_ROW"));

static CONTENT: Lazy<Locator> =
    Lazy::new(|| Locator::new("tables content", vec![Strategy::css("div.content"), Strategy::css("div#content")]));

static LEAGUE_HEADERS: Lazy<Locator> = Lazy::new(|| {
    Locator::new(
        "league headers",
        vec![
            Strategy::css("div.header").having(Predicate::HasDescendant(Selector::clone(&FLAG))),
            Strategy::css(".header").having(Predicate::HasDescendant(
                Selector::parse("img[class*='flag']").expect("Failed to compile flag fallback"),
            )),
        ],
    )
});

static ROWS: Lazy<Locator> = Lazy::new(|| Locator::new("table rows", vec![Strategy::css("div.row")]));
static CELLS: Lazy<Locator> = Lazy::new(|| Locator::new("row cells", vec![Strategy::css("div.cell")]));

const LEAGUE_NAME_STRATEGIES: [TextStrategy; 4] =
    [name_after_flag, name_from_anchor, name_from_last_text_child, name_from_header_text];

pub type TeamRow = IndexMap<String, String>;

#[derive(Debug, Clone, Serialize)]
pub struct LeagueTable {
    pub name: String,
    pub teams: Vec<TeamRow>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeagueTablesPayload {
    pub leagues: Vec<LeagueTable>,
}

#[derive(Debug, Clone)]
pub struct LeagueTablesExtractor {
    pub url: String,
    /// Treatment of a page with no flagged league headers (tables may legitimately be empty).
    pub on_missing_leagues: Severity,
}

impl Default for LeagueTablesExtractor {
    fn default() -> Self {
        Self { url: TABLESLEAGUE_URL.to_string(), on_missing_leagues: Severity::Benign }
    }
}

impl Assembler for LeagueTablesExtractor {
    type Payload = LeagueTablesPayload;

    fn assemble(&self, document: &Html) -> Result<Assembled<LeagueTablesPayload>, ExtractError> {
        let content = CONTENT.first(document.root_element()).ok_or_else(|| {
            ExtractError::StructureNotFound(
                "Main container 'div.content' not found; the site structure may have changed".to_string(),
            )
        })?;

        let located = LEAGUE_HEADERS.locate(content);
        let strategy = located.strategy();
        let headers = located.nodes();
        tracing::debug!("Found {} potential league title headers (strategy {:?})", headers.len(), strategy);
        if headers.is_empty() {
            return missing_anchor(self.on_missing_leagues, "No league title headers with flags found");
        }

        let mut out = Assembled::<LeagueTablesPayload>::default();
        for (index, header) in headers.into_iter().enumerate() {
            match assemble_league(header) {
                Ok(Some(league)) => out.payload.leagues.push(league),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Skipping league header #{}: {}", index + 1, e);
                    out.skipped += 1;
                }
            }
        }

        if out.payload.leagues.is_empty() {
            out.info = Some("Scraping completed but no league data could be extracted".to_string());
        }
        tracing::info!("League tables: {} league(s) extracted", out.payload.leagues.len());
        Ok(out)
    }
}

/// One league section: `Ok(None)` when the table is legitimately empty.
fn assemble_league(header: ElementRef<'_>) -> Result<Option<LeagueTable>, ExtractError> {
    let name = first_text(header, &LEAGUE_NAME_STRATEGIES).unwrap_or_else(|| SENTINEL.to_string());
    tracing::debug!("Processing league '{}'", name);

    let table = header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| TABLE_DIV.matches(sibling))
        .ok_or_else(|| ExtractError::FieldParse(format!("no 'div.table' after header of league '{}'", name)))?;

    let data_rows: Vec<Vec<String>> = ROWS
        .scan(table)
        .into_iter()
        .filter(|row| !row.value().classes().any(|c| c == "headers"))
        .map(|row| CELLS.scan(row).into_iter().map(node_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();

    if data_rows.is_empty() {
        tracing::warn!("No data rows for league '{}'", name);
        return Ok(None);
    }

    let raw_headers: Vec<String> = match table.select(&HEADER_ROW).next() {
        Some(row) => CELLS.scan(row).into_iter().map(node_text).collect(),
        None => Vec::new(),
    };
    let raw_headers = if raw_headers.is_empty() {
        tracing::debug!("League '{}' has no header row, assuming default headers", name);
        DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()
    } else {
        raw_headers
    };

    let widest = data_rows.iter().map(Vec::len).max().unwrap_or(0);
    let columns = column_names(&raw_headers, widest);

    let teams: Vec<TeamRow> = data_rows
        .iter()
        .map(|cells| build_row(&columns, cells))
        .filter(|row| row.get(TableField::Team.as_str()).map_or(false, |team| is_known(team)))
        .collect();

    if teams.is_empty() {
        tracing::info!("No valid teams for league '{}', not adding it", name);
        return Ok(None);
    }
    Ok(Some(LeagueTable { name, teams }))
}

/// Canonical column names for a table: one per header cell, extended positionally up to
/// `widest` cells. A repeated canonical name falls back to its positional name.
pub fn column_names(raw_headers: &[String], widest: usize) -> Vec<String> {
    let width = raw_headers.len().max(widest);
    let mut names: Vec<String> = Vec::with_capacity(width);
    for index in 0..width {
        let mut name = match raw_headers.get(index) {
            Some(raw) => canonicalize_header(raw, index),
            None => positional_name(index),
        };
        if names.contains(&name) {
            name = positional_name(index);
        }
        while names.contains(&name) {
            name.push('_');
        }
        names.push(name);
    }
    names
}

/// Exactly one field per column; cells missing from a short row hold the sentinel.
pub fn build_row(columns: &[String], cells: &[String]) -> TeamRow {
    columns
        .iter()
        .enumerate()
        .map(|(i, column)| (column.clone(), cells.get(i).cloned().unwrap_or_else(|| SENTINEL.to_string())))
        .collect()
}

fn name_after_flag(header: ElementRef<'_>) -> Option<String> {
    let flag = header.select(&FLAG).next()?;
    let next = flag.next_sibling()?;
    next.value().as_text().map(|text| squash_whitespace(text))
}

fn name_from_anchor(header: ElementRef<'_>) -> Option<String> {
    header.select(&ANCHOR).next().map(node_text)
}

fn name_from_last_text_child(header: ElementRef<'_>) -> Option<String> {
    header
        .children()
        .filter_map(|child| child.value().as_text().map(|text| squash_whitespace(text)))
        .filter(|text| !text.is_empty())
        .last()
}

fn name_from_header_text(header: ElementRef<'_>) -> Option<String> {
    let alt = header.select(&FLAG).next().and_then(|flag| flag.value().attr("alt")).unwrap_or("");
    let text = node_text(header);
    let name = if alt.is_empty() { text } else { squash_whitespace(&text.replace(alt, "")) };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><body><div class=\"content\">{}</div></body></html>", body))
    }

    fn cells(values: &[&str]) -> String {
        values.iter().map(|v| format!("<div class=\"cell\">{}</div>", v)).collect()
    }

    const HEADER: [&str; 10] = ["#", "Team", "M", "W", "D", "L", "G+", "G-", "GD", "PTS"];

    #[test]
    fn example_table_yields_canonical_record() {
        let html = format!(
            r#"<div class="header"><img class="flag" alt="ES" src="es.png"> Example League</div>
               <div class="table">
                 <div class="row headers">{}</div>
                 <div class="row">{}</div>
               </div>"#,
            cells(&HEADER),
            cells(&["1", "Example FC", "10", "7", "2", "1", "20", "5", "15", "23"])
        );
        let out = LeagueTablesExtractor::default().assemble(&page(&html)).unwrap();
        assert_eq!(out.skipped, 0);
        assert_eq!(out.payload.leagues.len(), 1);

        let league = &out.payload.leagues[0];
        assert_eq!(league.name, "Example League");
        assert_eq!(league.teams.len(), 1);

        let expected = [
            ("Position", "1"),
            ("Team", "Example FC"),
            ("Played", "10"),
            ("Won", "7"),
            ("Drawn", "2"),
            ("Lost", "1"),
            ("GoalsFor", "20"),
            ("GoalsAgainst", "5"),
            ("GoalDifference", "15"),
            ("Points", "23"),
        ];
        let row = &league.teams[0];
        assert_eq!(row.len(), expected.len());
        for ((key, value), (want_key, want_value)) in row.iter().zip(expected.iter()) {
            assert_eq!((key.as_str(), value.as_str()), (*want_key, *want_value));
        }
    }

    #[test]
    fn field_count_matches_detected_columns() {
        let html = format!(
            r#"<div class="header"><img class="flag" alt="EN">Premier</div>
               <div class="table">
                 <div class="row headers">{}</div>
                 <div class="row">{}</div>
                 <div class="row">{}</div>
                 <div class="row">{}</div>
               </div>"#,
            cells(&["Pos", "Club", "Form", "Pts"]),
            cells(&["1", "Alpha", "WWW", "9"]),
            cells(&["2", "Beta"]),
            cells(&["3", "Gamma", "LDW", "4", "extra"])
        );
        let out = LeagueTablesExtractor::default().assemble(&page(&html)).unwrap();
        let teams = &out.payload.leagues[0].teams;
        assert_eq!(teams.len(), 3);
        for row in teams {
            assert_eq!(row.len(), 5);
        }
        let keys: Vec<&str> = teams[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Position", "Team", "column_3", "Points", "column_5"]);
        assert_eq!(teams[1]["Points"], SENTINEL);
        assert_eq!(teams[2]["column_5"], "extra");
    }

    #[test]
    fn missing_header_row_uses_default_headers() {
        let html = format!(
            r#"<div class="header"><img class="flag" alt="IT"><a href="/serie-a">Serie A</a></div>
               <div class="table"><div class="row">{}</div></div>"#,
            cells(&["1", "Roma", "3", "3", "0", "0", "7", "1", "6", "9"])
        );
        let out = LeagueTablesExtractor::default().assemble(&page(&html)).unwrap();
        let league = &out.payload.leagues[0];
        assert_eq!(league.name, "Serie A");
        assert_eq!(league.teams[0]["Team"], "Roma");
        assert_eq!(league.teams[0]["Points"], "9");
    }

    #[test]
    fn rows_without_team_are_discarded() {
        let html = format!(
            r#"<div class="header"><img class="flag" alt="FR">Ligue 1</div>
               <div class="table">
                 <div class="row headers">{}</div>
                 <div class="row">{}</div>
                 <div class="row">{}</div>
               </div>"#,
            cells(&["#", "Team", "PTS"]),
            cells(&["1", "", "30"]),
            cells(&["2", "Lyon", "28"])
        );
        let out = LeagueTablesExtractor::default().assemble(&page(&html)).unwrap();
        let teams = &out.payload.leagues[0].teams;
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0]["Team"], "Lyon");
    }

    #[test]
    fn header_without_own_table_borrows_next_sibling_table() {
        let html = format!(
            r#"<div class="header"><img class="flag" alt="PT">Orphan</div>
               <div class="header"><img class="flag" alt="NL">Eredivisie</div>
               <div class="table"><div class="row headers">{}</div><div class="row">{}</div></div>"#,
            cells(&["#", "Team", "PTS"]),
            cells(&["1", "Ajax", "40"])
        );
        let out = LeagueTablesExtractor::default().assemble(&page(&html)).unwrap();
        // The orphan header's next sibling table is the Eredivisie one; both resolve to it.
        assert_eq!(out.payload.leagues.len(), 2);
        assert_eq!(out.payload.leagues[1].name, "Eredivisie");
    }

    #[test]
    fn trailing_header_without_any_table_counts_as_skipped() {
        let html = format!(
            r#"<div class="header"><img class="flag" alt="NL">Eredivisie</div>
               <div class="table"><div class="row headers">{}</div><div class="row">{}</div></div>
               <div class="header"><img class="flag" alt="BE">Pro League</div>"#,
            cells(&["#", "Team", "PTS"]),
            cells(&["1", "Ajax", "40"])
        );
        let out = LeagueTablesExtractor::default().assemble(&page(&html)).unwrap();
        assert_eq!(out.payload.leagues.len(), 1);
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn missing_content_is_structure_not_found() {
        let doc = Html::parse_document("<html><body><div class=\"other\"></div></body></html>");
        let err = LeagueTablesExtractor::default().assemble(&doc).unwrap_err();
        assert!(matches!(err, ExtractError::StructureNotFound(_)));
    }

    #[test]
    fn missing_league_headers_follow_severity() {
        let doc = page(r#"<div class="header">Advertising</div>"#);

        let benign = LeagueTablesExtractor::default().assemble(&doc).unwrap();
        assert!(benign.payload.leagues.is_empty());
        assert!(benign.info.is_some());

        let strict = LeagueTablesExtractor { on_missing_leagues: Severity::Fatal, ..Default::default() };
        assert!(matches!(strict.assemble(&doc), Err(ExtractError::StructureNotFound(_))));
    }

    #[test]
    fn league_name_fallbacks() {
        let doc = Html::parse_document(
            r#"<div class="header" id="a"><img class="flag" alt="ES"> LaLiga </div>
               <div class="header" id="b"><img class="flag" alt="DE"><span>x</span> Bundesliga <span>y</span></div>
               <div class="header" id="c"><img class="flag" alt="Scotland"><span>Scotland Premiership</span></div>"#,
        );
        let pick = |id: &str| {
            let sel = Selector::parse(&format!("div#{}", id)).unwrap();
            let el = doc.select(&sel).next().unwrap();
            first_text(el, &LEAGUE_NAME_STRATEGIES)
        };
        assert_eq!(pick("a").as_deref(), Some("LaLiga"));
        assert_eq!(pick("b").as_deref(), Some("Bundesliga"));
        assert_eq!(pick("c").as_deref(), Some("Premiership"));
    }

    #[test]
    fn duplicate_canonical_headers_fall_back_to_position() {
        let raw: Vec<String> = ["W", "G", "Team"].iter().map(|s| s.to_string()).collect();
        assert_eq!(column_names(&raw, 2), vec!["Won", "column_2", "Team"]);
    }
}
