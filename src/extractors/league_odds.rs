// src/extractors/league_odds.rs
//! La Liga betting page: combined bet of the round, fixture odds and title favourites.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::extractors::locator::{Locator, Predicate, Strategy, Traversal};
use crate::extractors::normalize::{clean_odd, is_known, node_text, or_sentinel, parse_date, DateDialect, SENTINEL};
use crate::extractors::{Assembled, Assembler};
use crate::utils::error::ExtractError;

pub const LEAGUE_ODDS_URL: &str = "https://www.transfermarkt.es/apuestas/la-liga/";

pub const ANCHORS: &[(&str, &str)] =
    &[("oddscomp-widget", "widget"), ("wp-block-table", "table"), ("Apuesta combinada", "combined")];

const MAX_COMBINED_BETS: usize = 3;

/// Words marking a paragraph as a bet line of the combined bet.
const TEAM_KEYWORDS: &[&str] = &[
    "Girona",
    "Atlético",
    "Barcelona",
    "Real Madrid",
    "Athletic",
    "Real Sociedad",
    "Betis",
    "Villarreal",
    "Valencia",
    "Sevilla",
    "Osasuna",
    "Celta",
    "Mallorca",
    "Rayo",
    "Getafe",
    "Alavés",
    "Las Palmas",
    "Espanyol",
    "Leganés",
    "Valladolid",
    "vs",
];

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("Failed to compile PARAGRAPH"));
static BOLD: Lazy<Selector> = Lazy::new(|| Selector::parse("strong, b").expect("Failed to compile BOLD"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("Failed to compile ROW"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("Failed to compile CELL"));

/// The combined-bet heading, hopped from with `traversal`.
fn combined_bet_locator(name: &'static str, traversal: fn() -> Traversal) -> Locator {
    Locator::new(
        name,
        vec![
            Strategy::css("h2").having(Predicate::TextIs("Apuesta combinada de la jornada")).then(traversal()),
            Strategy::css("h2, h3").having(Predicate::TextContains("Apuesta combinada")).then(traversal()),
        ],
    )
}

static COMBINED_HEADING: Lazy<Locator> = Lazy::new(|| combined_bet_locator("combined bet heading", || Traversal::Itself));
static COMBINED_DESCRIPTION: Lazy<Locator> = Lazy::new(|| {
    combined_bet_locator("combined bet description", || Traversal::NextSibling(Selector::clone(&PARAGRAPH)))
});
static COMBINED_CONTAINER: Lazy<Locator> =
    Lazy::new(|| combined_bet_locator("combined bet container", || Traversal::Parent));

static MATCH_TABLE: Lazy<Locator> = Lazy::new(|| {
    Locator::new("match table", vec![Strategy::css("figure.wp-block-table table"), Strategy::css("table")])
});

// Headings are matched innermost-first so the text test never lands on a wrapping <body>.
static FAVORITES_TABLE: Lazy<Locator> = Lazy::new(|| {
    Locator::new(
        "title favourites table",
        vec![
            Strategy::css("h2, h3, h4")
                .having(Predicate::TextContains("Favoritos para ganar la liga"))
                .then(Traversal::Following(
                    Selector::parse("figure.wp-block-table table").expect("Failed to compile favourites table"),
                )),
            Strategy::css("p, strong")
                .having(Predicate::TextContains("Favoritos para ganar la liga"))
                .then(Traversal::Following(Selector::parse("table").expect("Failed to compile favourites fallback"))),
        ],
    )
});

static THEAD_HEADERS: Lazy<Locator> = Lazy::new(|| {
    Locator::new("favourites headers", vec![Strategy::css("thead th"), Strategy::css("tr:first-child th")])
});
static BODY_ROWS: Lazy<Locator> =
    Lazy::new(|| Locator::new("favourites rows", vec![Strategy::css("tbody tr"), Strategy::css("tr")]));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedBetLine {
    #[serde(rename = "match")]
    pub match_name: String,
    pub bet: String,
    pub odd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedBet {
    pub description: String,
    pub bets: Vec<CombinedBetLine>,
}

impl Default for CombinedBet {
    fn default() -> Self {
        Self { description: SENTINEL.to_string(), bets: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueMatch {
    pub teams: String,
    pub date: String,
    pub stadium: String,
    pub prediction: String,
    pub odd: String,
}

/// `team` first, then one odd per bookmaker column.
pub type TitleOdds = IndexMap<String, String>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeagueOddsPayload {
    pub matches: Vec<LeagueMatch>,
    pub title_odds: Vec<TitleOdds>,
    pub combined_bet: CombinedBet,
}

#[derive(Debug, Clone)]
pub struct LeagueOddsExtractor {
    pub url: String,
}

impl Default for LeagueOddsExtractor {
    fn default() -> Self {
        Self { url: LEAGUE_ODDS_URL.to_string() }
    }
}

impl Assembler for LeagueOddsExtractor {
    type Payload = LeagueOddsPayload;

    fn assemble(&self, document: &Html) -> Result<Assembled<LeagueOddsPayload>, ExtractError> {
        let root = document.root_element();
        let mut out = Assembled::<LeagueOddsPayload>::default();
        let mut missing = Vec::new();

        match COMBINED_HEADING.first(root) {
            Some(_) => out.payload.combined_bet = combined_bet(root),
            None => {
                tracing::info!("Section 'Apuesta combinada de la jornada' not found");
                missing.push("combined bet");
            }
        }

        match MATCH_TABLE.first(root) {
            Some(table) => {
                let (matches, skipped) = match_rows(table);
                out.payload.matches = matches;
                out.skipped += skipped;
            }
            None => {
                tracing::info!("Match table not found");
                missing.push("match table");
            }
        }

        match FAVORITES_TABLE.first(root) {
            Some(table) => {
                let (odds, skipped) = title_odds(table);
                out.payload.title_odds = odds;
                out.skipped += skipped;
            }
            None => {
                tracing::info!("Section 'Favoritos para ganar la liga' not found");
                missing.push("title favourites");
            }
        }

        if missing.len() == 3 {
            out.info = Some(format!("No league odds sections found ({})", missing.join(", ")));
        }
        tracing::info!(
            "League odds: {} match(es), {} favourite(s), {} combined bet line(s)",
            out.payload.matches.len(),
            out.payload.title_odds.len(),
            out.payload.combined_bet.bets.len()
        );
        Ok(out)
    }
}

fn combined_bet(root: ElementRef<'_>) -> CombinedBet {
    // Description: the run of consecutive paragraphs starting at the first one after the heading.
    let paragraphs: Vec<String> = match COMBINED_DESCRIPTION.first(root) {
        Some(first) => std::iter::once(first)
            .chain(first.next_siblings().filter_map(ElementRef::wrap))
            .take_while(is_paragraph)
            .map(node_text)
            .collect(),
        None => Vec::new(),
    };
    let description = paragraphs.join(" ").trim().to_string();

    let bets = COMBINED_CONTAINER
        .first(root)
        .map(|container| container.select(&PARAGRAPH).filter_map(bet_line).take(MAX_COMBINED_BETS).collect())
        .unwrap_or_default();

    CombinedBet { description: if description.is_empty() { SENTINEL.to_string() } else { description }, bets }
}

fn is_paragraph(element: &ElementRef<'_>) -> bool {
    element.value().name() == "p"
}

/// A bet line names a match before ':' and carries its odd in bold inside the same paragraph.
fn bet_line(paragraph: ElementRef<'_>) -> Option<CombinedBetLine> {
    let text = node_text(paragraph);
    let (match_part, bet_part) = text.split_once(':')?;
    if !TEAM_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return None;
    }
    let bold = paragraph.select(&BOLD).next()?;
    let odd = clean_odd(&node_text(bold));

    let bet = if is_known(&odd) { bet_part.split(odd.as_str()).next().unwrap_or(bet_part) } else { bet_part };
    Some(CombinedBetLine { match_name: or_sentinel(match_part), bet: or_sentinel(bet), odd })
}

fn match_rows(table: ElementRef<'_>) -> (Vec<LeagueMatch>, usize) {
    let mut matches = Vec::new();
    let mut skipped = 0;
    for (index, row) in table.select(&ROW).skip(1).enumerate() {
        let cells: Vec<String> = row.select(&CELL).map(node_text).collect();
        if cells.is_empty() {
            continue;
        }
        match match_record(&cells) {
            Ok(record) => matches.push(record),
            Err(e) => {
                tracing::warn!("Skipping match row #{}: {}", index + 1, e);
                skipped += 1;
            }
        }
    }
    (matches, skipped)
}

fn match_record(cells: &[String]) -> Result<LeagueMatch, ExtractError> {
    if cells.len() < 4 {
        return Err(ExtractError::FieldParse(format!("expected at least 4 cells, got {}", cells.len())));
    }
    let (prediction, odd) = split_prediction(&cells[3]);
    Ok(LeagueMatch {
        teams: or_sentinel(&cells[0]),
        date: parse_date(&cells[1], DateDialect::DayFirst),
        stadium: or_sentinel(&cells[2]),
        prediction,
        odd,
    })
}

/// `"Gana Barcelona ➡ 1.80"` into prediction and odd; no arrow means no odd.
pub fn split_prediction(text: &str) -> (String, String) {
    let split = text.rsplit_once('➡').or_else(|| text.rsplit_once('→'));
    match split {
        Some((prediction, odd)) => {
            let prediction = prediction.split(['➡', '→']).next().unwrap_or(prediction);
            (or_sentinel(prediction), clean_odd(odd))
        }
        None => (or_sentinel(text), SENTINEL.to_string()),
    }
}

fn title_odds(table: ElementRef<'_>) -> (Vec<TitleOdds>, usize) {
    let headers: Vec<String> = THEAD_HEADERS.scan(table).into_iter().map(node_text).collect();
    let mut records = Vec::new();
    let mut skipped = 0;

    // Without <th> headers the first row holds the column titles as plain cells.
    let header_rows = if headers.is_empty() { 1 } else { 0 };
    for (index, row) in BODY_ROWS.scan(table).into_iter().enumerate().skip(header_rows) {
        let cells: Vec<String> = row.select(&CELL).map(node_text).collect();
        if cells.is_empty() {
            continue;
        }
        if !headers.is_empty() && cells.len() != headers.len() {
            tracing::warn!(
                "Skipping favourites row #{}: {}",
                index + 1,
                ExtractError::FieldParse(format!("{} cells for {} headers", cells.len(), headers.len()))
            );
            skipped += 1;
            continue;
        }

        let mut record = TitleOdds::new();
        record.insert("team".to_string(), or_sentinel(&cells[0]));
        for (i, cell) in cells.iter().enumerate().skip(1) {
            let key = match headers.get(i) {
                Some(header) if !header.is_empty() => header.clone(),
                _ => format!("Bookmaker_{}", i),
            };
            record.insert(key, clean_odd(cell));
        }
        records.push(record);
    }

    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><article>
        <div class="entry">
          <h2>Apuesta combinada de la jornada</h2>
          <p>Nuestra combinada para esta jornada.</p>
          <p>Cuota total atractiva.</p>
          <div class="bets">
            <p>Girona vs Betis: Gana Girona <strong>1.95</strong></p>
            <p>Barcelona vs Celta: Más de 2.5 goles <strong>1.60</strong></p>
            <p>Nota: sin cuota aquí</p>
            <p>Real Madrid vs Getafe: Gana Real Madrid <b>1.30</b></p>
            <p>Sevilla vs Osasuna: Empate <strong>3.20</strong></p>
          </div>
        </div>
        <figure class="wp-block-table"><table>
          <tr><td>Partido</td><td>Fecha</td><td>Estadio</td><td>Pronóstico</td></tr>
          <tr><td>Girona - Betis</td><td>14/03/2025 21:00</td><td>Montilivi</td><td>Gana Girona ➡ 1.95</td></tr>
          <tr><td>Rayo - Getafe</td><td>15/03/2025</td><td>Vallecas</td><td>Empate</td></tr>
          <tr><td>Incompleto</td><td>16/03</td></tr>
        </table></figure>
        <h3>Favoritos para ganar la liga española</h3>
        <p>Las casas lo tienen claro.</p>
        <figure class="wp-block-table"><table>
          <thead><tr><th>Equipo</th><th>Bet365</th><th>Codere</th></tr></thead>
          <tbody>
            <tr><td>Barcelona</td><td>1,50 / 1.50</td><td>1.55</td></tr>
            <tr><td>Real Madrid</td><td>2.75</td><td>-</td></tr>
            <tr><td>Atlético</td><td>9.00</td></tr>
          </tbody>
        </table></figure>
    </article></body></html>"#;

    #[test]
    fn combined_bet_description_and_lines() {
        let doc = Html::parse_document(PAGE);
        let out = LeagueOddsExtractor::default().assemble(&doc).unwrap();
        let combined = &out.payload.combined_bet;
        assert_eq!(combined.description, "Nuestra combinada para esta jornada. Cuota total atractiva.");
        assert_eq!(combined.bets.len(), MAX_COMBINED_BETS);
        assert_eq!(
            combined.bets[0],
            CombinedBetLine { match_name: "Girona vs Betis".into(), bet: "Gana Girona".into(), odd: "1.95".into() }
        );
        assert_eq!(combined.bets[1].bet, "Más de 2.5 goles");
        assert_eq!(combined.bets[2].odd, "1.30");
    }

    #[test]
    fn match_rows_parse_dates_and_predictions() {
        let doc = Html::parse_document(PAGE);
        let out = LeagueOddsExtractor::default().assemble(&doc).unwrap();
        let matches = &out.payload.matches;
        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches[0],
            LeagueMatch {
                teams: "Girona - Betis".into(),
                date: "2025-03-14 21:00".into(),
                stadium: "Montilivi".into(),
                prediction: "Gana Girona".into(),
                odd: "1.95".into(),
            }
        );
        assert_eq!(matches[1].date, "2025-03-15 00:00");
        assert_eq!(matches[1].odd, SENTINEL);
    }

    #[test]
    fn title_odds_use_verbatim_headers_and_skip_mismatched_rows() {
        let doc = Html::parse_document(PAGE);
        let out = LeagueOddsExtractor::default().assemble(&doc).unwrap();
        let odds = &out.payload.title_odds;
        assert_eq!(odds.len(), 2);
        let keys: Vec<&str> = odds[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["team", "Bet365", "Codere"]);
        assert_eq!(odds[0]["Bet365"], "1");
        assert_eq!(odds[1]["Codere"], SENTINEL);
        // One short match row plus one short favourites row.
        assert_eq!(out.skipped, 2);
        assert!(out.info.is_none());
    }

    #[test]
    fn favourites_without_headers_get_bookmaker_keys() {
        let doc = Html::parse_document(
            r#"<h2>Favoritos para ganar la liga</h2>
               <figure class="wp-block-table"><table>
                 <tr><td>Equipo</td><td>Bet365</td><td>Codere</td></tr>
                 <tr><td>Girona</td><td>50.0</td><td>41</td></tr>
               </table></figure>"#,
        );
        let out = LeagueOddsExtractor::default().assemble(&doc).unwrap();
        // The cell-based title row is not a record.
        assert_eq!(out.payload.title_odds.len(), 1);
        assert_eq!(out.payload.title_odds[0]["team"], "Girona");
        let keys: Vec<&str> = out.payload.title_odds[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["team", "Bookmaker_1", "Bookmaker_2"]);
        assert_eq!(out.payload.title_odds[0]["Bookmaker_2"], "41");
    }

    #[test]
    fn bet_line_without_match_name_keeps_sentinel() {
        let doc = Html::parse_document(
            r#"<div><h2>Apuesta combinada de la jornada</h2><p>: Girona gana <strong>1.90</strong></p></div>"#,
        );
        let out = LeagueOddsExtractor::default().assemble(&doc).unwrap();
        let line = serde_json::to_value(&out.payload.combined_bet.bets[0]).unwrap();
        assert_eq!(line, serde_json::json!({ "match": SENTINEL, "bet": "Girona gana", "odd": "1.90" }));
    }

    #[test]
    fn prediction_split_falls_back_to_plain_arrow() {
        assert_eq!(split_prediction("Gana Betis → 2.40"), ("Gana Betis".to_string(), "2.40".to_string()));
        assert_eq!(split_prediction("Empate"), ("Empate".to_string(), SENTINEL.to_string()));
    }

    #[test]
    fn empty_page_is_benign_with_stable_shape() {
        let doc = Html::parse_document("<html><body><p>Sin contenido</p></body></html>");
        let out = LeagueOddsExtractor::default().assemble(&doc).unwrap();
        assert!(out.info.is_some());
        let json = serde_json::to_value(&out.payload).unwrap();
        assert_eq!(json["combined_bet"]["description"], SENTINEL);
        assert_eq!(json["combined_bet"]["bets"], serde_json::json!([]));
        assert_eq!(json["matches"], serde_json::json!([]));
    }
}
