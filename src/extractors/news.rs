// src/extractors/news.rs
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::extractors::locator::{first_text, Locator, Predicate, Strategy, TextStrategy};
use crate::extractors::normalize::{absolute_url, clean_text, node_text, parse_date, DateDialect, SENTINEL};
use crate::extractors::{missing_anchor, Assembled, Assembler, Severity};
use crate::utils::error::ExtractError;

pub const RELEVO_NEWS_URL: &str = "https://www.relevo.com/futbol/mercado-fichajes/";
pub const RELEVO_ORIGIN: &str = "https://www.relevo.com";

pub const ANCHORS: &[(&str, &str)] = &[("grid--AB-C", "grid"), ("article__title", "title"), ("author--art", "author")];

static ANY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("Failed to compile ANY_LINK"));
static SIGNATURE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.author__signature a").expect("Failed to compile SIGNATURE_LINKS"));
static SIGNATURE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.author__signature").expect("Failed to compile SIGNATURE"));

static ARTICLES: Lazy<Locator> = Lazy::new(|| {
    Locator::new(
        "news articles",
        vec![
            Strategy::css("div.grid--AB-C div.grid__col article.article"),
            Strategy::css("div.grid--AB-C article.article"),
            Strategy::css("article.article"),
        ],
    )
});
static TITLE: Lazy<Locator> = Lazy::new(|| {
    Locator::new(
        "article title",
        vec![
            Strategy::css("h2.article__title a"),
            Strategy::css("h3.article__title a"),
            Strategy::css(".article__title a"),
        ],
    )
});
static AUTHOR_BLOCK: Lazy<Locator> =
    Lazy::new(|| Locator::new("author block", vec![Strategy::css("div.author--art")]));
static DATE: Lazy<Locator> =
    Lazy::new(|| Locator::new("publication date", vec![Strategy::css("time.author__date"), Strategy::css("time")]));
static IMAGE: Lazy<Locator> = Lazy::new(|| {
    Locator::new(
        "article image",
        vec![
            Strategy::css("div.article__container-img img"),
            Strategy::css("picture img"),
            Strategy::css("figure img"),
        ],
    )
});
static PROFILE_LINKS: Lazy<Locator> = Lazy::new(|| {
    Locator::new("author profile links", vec![Strategy::css("a[href]").having(Predicate::AttrContains("href", "/autor/"))])
});

const IMAGE_SOURCE_STRATEGIES: [TextStrategy; 2] = [image_src, image_data_src];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub name: String,
    pub profile_url: String,
}

impl Author {
    fn unknown() -> Self {
        Self { name: SENTINEL.to_string(), profile_url: SENTINEL.to_string() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Never empty: a single sentinel author stands in when no signature is found.
    pub authors: Vec<Author>,
    pub publication_date_iso: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewsPayload {
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone)]
pub struct NewsExtractor {
    pub url: String,
    pub on_missing_articles: Severity,
}

impl Default for NewsExtractor {
    fn default() -> Self {
        Self { url: RELEVO_NEWS_URL.to_string(), on_missing_articles: Severity::Benign }
    }
}

impl Assembler for NewsExtractor {
    type Payload = NewsPayload;

    fn assemble(&self, document: &Html) -> Result<Assembled<NewsPayload>, ExtractError> {
        let articles = ARTICLES.scan(document.root_element());
        tracing::info!("Found {} news articles", articles.len());
        if articles.is_empty() {
            // Usually means the selectors went stale, so the page is kept for inspection.
            let mut out = missing_anchor::<NewsPayload>(self.on_missing_articles, "No articles found; check selectors or page structure")?;
            out.snapshot = true;
            return Ok(out);
        }

        let mut out = Assembled::<NewsPayload>::default();
        for (index, article) in articles.into_iter().enumerate() {
            match assemble_article(article) {
                Ok(record) => out.payload.articles.push(record),
                Err(e) => {
                    tracing::warn!("Skipping article #{}: {}", index + 1, e);
                    out.skipped += 1;
                }
            }
        }
        Ok(out)
    }
}

fn assemble_article(article: ElementRef<'_>) -> Result<Article, ExtractError> {
    if node_text(article).is_empty() && article.select(&ANY_LINK).next().is_none() {
        return Err(ExtractError::FieldParse("article element has no text and no links".to_string()));
    }

    let (title, link) = match TITLE.first(article) {
        Some(anchor) => {
            let link = anchor.value().attr("href").map_or_else(|| SENTINEL.to_string(), |h| absolute_url(h, RELEVO_ORIGIN));
            (clean_text(Some(anchor)), link)
        }
        None => (SENTINEL.to_string(), SENTINEL.to_string()),
    };

    let author_block = AUTHOR_BLOCK.first(article);
    let mut authors = author_block.map(extract_authors).unwrap_or_default();
    if authors.is_empty() {
        authors.push(Author::unknown());
    }

    // The dated byline usually sits in the author block; otherwise any <time> in the article.
    let date_node = author_block.and_then(|block| DATE.first(block)).or_else(|| DATE.first(article));
    let publication_date_iso = match date_node {
        Some(time) => {
            let raw = time
                .value()
                .attr("datetime")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| node_text(time));
            parse_date(&raw, DateDialect::Default)
        }
        None => SENTINEL.to_string(),
    };

    let image_url = IMAGE
        .first(article)
        .and_then(|img| first_text(img, &IMAGE_SOURCE_STRATEGIES))
        .unwrap_or_else(|| SENTINEL.to_string());

    Ok(Article { title, link, authors, publication_date_iso, image_url })
}

fn extract_authors(block: ElementRef<'_>) -> Vec<Author> {
    let signed: Vec<Author> = block.select(&SIGNATURE_LINKS).map(author_from_link).collect();
    if !signed.is_empty() {
        return signed;
    }

    if let Some(signature) = block.select(&SIGNATURE).next() {
        let text = node_text(signature);
        // Bylines read "Name Hace 2 horas"; drop the relative timestamp.
        let name = text.split("Hace").next().unwrap_or("").trim();
        if !name.is_empty() {
            return vec![Author { name: name.to_string(), profile_url: SENTINEL.to_string() }];
        }
    }

    PROFILE_LINKS.scan(block).into_iter().map(author_from_link).collect()
}

fn author_from_link(anchor: ElementRef<'_>) -> Author {
    Author {
        name: clean_text(Some(anchor)),
        profile_url: anchor.value().attr("href").map_or_else(|| SENTINEL.to_string(), |h| absolute_url(h, RELEVO_ORIGIN)),
    }
}

fn image_src(img: ElementRef<'_>) -> Option<String> {
    img.value().attr("src").map(|s| s.trim().to_string())
}

fn image_data_src(img: ElementRef<'_>) -> Option<String> {
    img.value().attr("data-src").map(|s| s.trim().to_string())
}
