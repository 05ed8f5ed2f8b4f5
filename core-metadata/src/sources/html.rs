//! HTML extraction helpers for the scraping adapters.
//!
//! `scraper::Html` is not `Send`, so every function here parses and returns
//! owned data before the caller awaits anything.

use super::SourceFailure;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parse a CSS selector from a site profile.
pub fn selector(css: &str) -> Result<Selector, SourceFailure> {
    Selector::parse(css)
        .map_err(|e| SourceFailure::Malformed(format!("invalid selector '{}': {:?}", css, e)))
}

/// Selectors describing one result row of a search page.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSelectors {
    /// One element per result
    pub item: String,
    /// Link inside the item; the item itself when `None`
    pub link: Option<String>,
    /// Title inside the item; the link text when `None`
    pub title: Option<String>,
    /// Field value shown directly in the result row
    pub value: Option<String>,
}

/// A result row scraped from a search page.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Absolute URL of the result's detail page
    pub url: String,
    pub title: String,
    pub value: Option<String>,
}

/// Collect result rows; rows without a link or a title are skipped.
pub fn extract_results(
    page: &str,
    selectors: &ResultSelectors,
    base_url: &str,
) -> Result<Vec<ResultRow>, SourceFailure> {
    let item_sel = selector(&selectors.item)?;
    let link_sel = selectors.link.as_deref().map(selector).transpose()?;
    let title_sel = selectors.title.as_deref().map(selector).transpose()?;
    let value_sel = selectors.value.as_deref().map(selector).transpose()?;

    let doc = Html::parse_document(page);
    let mut rows = Vec::new();

    for item in doc.select(&item_sel) {
        let link = match &link_sel {
            Some(sel) => item.select(sel).next(),
            None => Some(item),
        };
        let Some(link) = link else { continue };
        let Some(url) = link.value().attr("href").and_then(|h| absolutize(base_url, h)) else {
            continue;
        };

        let title = match &title_sel {
            Some(sel) => item.select(sel).next().map(element_text),
            None => Some(element_text(link)),
        }
        .filter(|t| !t.is_empty());
        let Some(title) = title else { continue };

        let value = value_sel
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .map(element_text)
            .filter(|v| !v.is_empty());

        rows.push(ResultRow { url, title, value });
    }

    Ok(rows)
}

/// Text of the first element matching `css`, whitespace collapsed.
pub fn first_text(page: &str, css: &str) -> Result<Option<String>, SourceFailure> {
    let sel = selector(css)?;
    let doc = Html::parse_document(page);
    Ok(doc
        .select(&sel)
        .map(element_text)
        .find(|text| !text.is_empty()))
}

/// Asset URLs of elements matching `css`, in document order.
///
/// Reads the first present attribute of `src`, `data-src` and `href`.
pub fn asset_urls(page: &str, css: &str, base_url: &str) -> Result<Vec<String>, SourceFailure> {
    let sel = selector(css)?;
    let doc = Html::parse_document(page);
    Ok(doc
        .select(&sel)
        .filter_map(|el| {
            ["src", "data-src", "href"]
                .iter()
                .find_map(|attr| el.value().attr(attr))
        })
        .filter_map(|raw| absolutize(base_url, raw.trim()))
        .collect())
}

/// Pick the content asset among scraped URLs.
///
/// URLs matching an `excluded` pattern (navigation, logos, icons) are
/// dropped. Full-resolution assets win over ones matching a `thumbnail`
/// pattern; document order breaks ties.
pub fn pick_asset(urls: &[String], excluded: &[String], thumbnail: &[String]) -> Option<String> {
    let matches_any = |url: &str, patterns: &[String]| {
        let lowered = url.to_lowercase();
        patterns.iter().any(|p| lowered.contains(&p.to_lowercase()))
    };

    let content: Vec<&String> = urls
        .iter()
        .filter(|url| !matches_any(url, excluded))
        .collect();

    content
        .iter()
        .find(|url| !matches_any(url, thumbnail))
        .or_else(|| content.first())
        .map(|url| url.to_string())
}

/// Resolve `href` against the page it was found on.
///
/// Fragment-only links and non-http(s) targets are skipped.
pub fn absolutize(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = Url::parse(base_url).ok()?.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Decode the handful of entities that appear inside attribute payloads.
pub fn unescape_entities(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
