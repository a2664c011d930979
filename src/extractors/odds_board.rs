// src/extractors/odds_board.rs
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;

use crate::extractors::locator::{Locator, Strategy};
use crate::extractors::normalize::{absolute_url, clean_odd, clean_text, is_known, node_text, or_sentinel, SENTINEL};
use crate::extractors::{missing_anchor, Assembled, Assembler, Severity};
use crate::utils::error::ExtractError;

pub const ODDS_BOARD_URL: &str = "https://www.transfermarkt.es/apuestas/cuotas/";
pub const TRANSFERMARKT_ORIGIN: &str = "https://www.transfermarkt.es";

/// Bet type assumed when the label carries none (or something too long to be one).
pub const DEFAULT_BET_TYPE: &str = "Resultado del partido";
const MAX_BET_TYPE_CHARS: usize = 50;

static TRAILING_ODD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+)$").expect("Failed to compile TRAILING_ODD_RE"));

static CARDS: Lazy<Locator> = Lazy::new(|| {
    Locator::new("match cards", vec![Strategy::css("div.card__item-container"), Strategy::css("[class*='card__item-container']")])
});
static LABEL: Lazy<Locator> = Lazy::new(|| {
    Locator::new("card label", vec![Strategy::css("div.card__bonus-name"), Strategy::css("[class*='bonus-name']")])
});
static LOGO: Lazy<Locator> =
    Lazy::new(|| Locator::new("bookmaker logo", vec![Strategy::css("img.card__logo"), Strategy::css("img[class*='logo']")]));
static EXPIRY: Lazy<Locator> = Lazy::new(|| {
    Locator::new("expiry", vec![Strategy::css("div.countdown[data-valid-until]"), Strategy::css("[data-valid-until]")])
});
static OFFER: Lazy<Locator> = Lazy::new(|| {
    Locator::new("offer link", vec![Strategy::css("a.card__button[href]"), Strategy::css("a[class*='button'][href]")])
});

/// Structural markers highlighted in diagnostic snapshots.
pub const ANCHORS: &[(&str, &str)] = &[("card__item-container", "card"), ("card__bonus-name", "label"), ("card__logo", "logo")];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bookmaker {
    pub name: String,
    pub logo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMatch {
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub bet_type: String,
    pub odd: String,
    pub bookmaker: Bookmaker,
    pub expiry_time: String,
    pub offer_link: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OddsBoardPayload {
    pub matches: Vec<BoardMatch>,
}

/// Fields recovered from a compound card label.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLabel {
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub bet_type: String,
    pub odd: String,
}

/// Parses `"<League>: <Team A> vs <Team B> - <BetType> - <Odd>"`, splitting from the right:
/// the last segment is always the odd, the one before it is the bet type only when short.
pub fn parse_label(label: &str) -> ParsedLabel {
    let mut parsed = ParsedLabel {
        league: SENTINEL.to_string(),
        home_team: SENTINEL.to_string(),
        away_team: SENTINEL.to_string(),
        bet_type: SENTINEL.to_string(),
        odd: SENTINEL.to_string(),
    };
    let label = label.trim();

    let Some((main, odd)) = label.rsplit_once(" - ") else {
        if let Some(caps) = TRAILING_ODD_RE.captures(label) {
            parsed.odd = caps[1].to_string();
        }
        return parsed;
    };
    parsed.odd = clean_odd(odd);

    let (match_info, bet_type) = match main.rsplit_once(" - ") {
        Some((info, bet)) if bet.trim().chars().count() < MAX_BET_TYPE_CHARS => (info.trim(), bet.trim()),
        _ => (main.trim(), DEFAULT_BET_TYPE),
    };
    parsed.bet_type = bet_type.to_string();

    let teams = match match_info.split_once(':') {
        Some((league, teams)) => {
            parsed.league = or_sentinel(league);
            teams.trim()
        }
        None => match_info,
    };

    match teams.split_once(" vs ").or_else(|| teams.split_once("vs")) {
        Some((home, away)) => {
            parsed.home_team = or_sentinel(home);
            parsed.away_team = or_sentinel(away);
        }
        None => parsed.home_team = or_sentinel(teams),
    }
    parsed
}

#[derive(Debug, Clone)]
pub struct OddsBoardExtractor {
    pub url: String,
    /// The board always carries promoted odds, so an empty page is treated as broken.
    pub on_missing_cards: Severity,
}

impl Default for OddsBoardExtractor {
    fn default() -> Self {
        Self { url: ODDS_BOARD_URL.to_string(), on_missing_cards: Severity::Fatal }
    }
}

impl Assembler for OddsBoardExtractor {
    type Payload = OddsBoardPayload;

    fn assemble(&self, document: &Html) -> Result<Assembled<OddsBoardPayload>, ExtractError> {
        let cards = CARDS.scan(document.root_element());
        tracing::info!("Found {} general match cards", cards.len());
        if cards.is_empty() {
            return missing_anchor(self.on_missing_cards, "No general odds match cards found");
        }

        let mut out = Assembled::<OddsBoardPayload>::default();
        for (index, card) in cards.into_iter().enumerate() {
            match assemble_card(card) {
                Ok(record) => out.payload.matches.push(record),
                Err(e) => {
                    tracing::warn!("Skipping match card #{}: {}", index + 1, e);
                    out.skipped += 1;
                }
            }
        }
        Ok(out)
    }
}

fn assemble_card(card: ElementRef<'_>) -> Result<BoardMatch, ExtractError> {
    let logo = LOGO.first(card);
    let offer = OFFER.first(card);
    if node_text(card).is_empty() && logo.is_none() && offer.is_none() {
        return Err(ExtractError::FieldParse("empty card container".to_string()));
    }

    let label = clean_text(LABEL.first(card));
    let parsed = if is_known(&label) { parse_label(&label) } else { parse_label("") };

    let bookmaker = match logo {
        Some(img) => {
            let src = img.value().attr("src").map(str::trim).filter(|s| !s.is_empty());
            let name = [img.value().attr("alt"), img.value().attr("title")]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| src.and_then(name_from_logo_src))
                .unwrap_or_else(|| SENTINEL.to_string());
            Bookmaker { name, logo: src.unwrap_or(SENTINEL).to_string() }
        }
        None => Bookmaker { name: SENTINEL.to_string(), logo: SENTINEL.to_string() },
    };

    let expiry_time = EXPIRY
        .first(card)
        .and_then(|el| el.value().attr("data-valid-until"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(SENTINEL)
        .to_string();

    let offer_link = match offer.and_then(|a| a.value().attr("href")).map(str::trim) {
        Some(href) if href.starts_with('/') => absolute_url(href, TRANSFERMARKT_ORIGIN),
        Some(href) if !href.is_empty() => href.to_string(),
        _ => SENTINEL.to_string(),
    };

    Ok(BoardMatch {
        league: parsed.league,
        home_team: parsed.home_team,
        away_team: parsed.away_team,
        bet_type: parsed.bet_type,
        odd: parsed.odd,
        bookmaker,
        expiry_time,
        offer_link,
    })
}

/// Bookmaker identity guessed from a logo file name, e.g. `/logos/bet365.png` -> `bet365`.
fn name_from_logo_src(src: &str) -> Option<String> {
    let file = src.split(['?', '#']).next()?.rsplit('/').next()?;
    let stem = file.split('.').next()?.trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
