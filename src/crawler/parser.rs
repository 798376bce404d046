//! HTML parser for SKU group pages
//!
//! This module handles parsing group pages to extract:
//! - SKU IDs from every table, using header-based column detection on the
//!   primary page and the first column on continuation pages
//! - Pagination links to continuation pages
//!
//! Parsing is synchronous and returns owned data, so no parsed document is
//! ever held across an await point.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Header names that identify the SKU ID column, in priority order
pub const SKU_HEADER_VARIANTS: [&str; 4] = ["sku id", "sku", "id", "sku code"];

/// One leading uppercase alphanumeric followed by uppercase alphanumerics or hyphens
static SKU_ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]+$").unwrap());

/// Location of the SKU ID column within one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkuColumn {
    /// A header cell matched one of [`SKU_HEADER_VARIANTS`]
    Matched(usize),

    /// No header matched; the first column is assumed
    Unmatched,
}

impl SkuColumn {
    pub fn index(self) -> usize {
        match self {
            SkuColumn::Matched(index) => index,
            SkuColumn::Unmatched => 0,
        }
    }
}

/// How a table's SKU column is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    /// Inspect header cells (primary group pages)
    DetectFromHeaders,

    /// Always use the first column (paginated continuation pages)
    FirstColumn,
}

/// SKU IDs and pagination targets found on a primary group page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPage {
    /// Qualifying SKU IDs in document order, duplicates included
    pub sku_ids: Vec<String>,

    /// Resolved pagination targets, excluding the page itself
    pub pagination: Vec<Url>,
}

/// Finds the SKU ID column from normalized (trimmed, lowercased) header texts
///
/// Variants are tried in priority order; the first one present wins, at the
/// position of its first occurrence.
pub fn detect_sku_column(headers: &[String]) -> SkuColumn {
    SKU_HEADER_VARIANTS
        .iter()
        .find_map(|variant| headers.iter().position(|h| h == variant))
        .map(SkuColumn::Matched)
        .unwrap_or(SkuColumn::Unmatched)
}

/// Returns the trimmed candidate if it qualifies as a SKU ID
///
/// A candidate qualifies when it matches the SKU ID pattern and its lowercase
/// form is not a header name (a header row misread as data).
///
/// # Example
///
/// ```
/// use sku_harvester::crawler::accept_sku_candidate;
///
/// assert_eq!(accept_sku_candidate("  ABC-123 "), Some("ABC-123"));
/// assert_eq!(accept_sku_candidate("abc-123"), None);
/// assert_eq!(accept_sku_candidate("SKU"), None);
/// ```
pub fn accept_sku_candidate(raw: &str) -> Option<&str> {
    let candidate = raw.trim();
    // Empty cells never match the pattern
    if candidate.is_empty() || !SKU_ID_REGEX.is_match(candidate) {
        return None;
    }

    let lowered = candidate.to_lowercase();
    if SKU_HEADER_VARIANTS.iter().any(|variant| *variant == lowered) {
        return None;
    }

    Some(candidate)
}

/// Parses a primary group page
///
/// Every table is scanned with header-based column detection, then the page
/// is searched for pagination links relative to `page_url`.
pub fn parse_group_page(html: &str, page_url: &Url) -> GroupPage {
    let document = Html::parse_document(html);

    GroupPage {
        sku_ids: extract_sku_ids(&document, ColumnRule::DetectFromHeaders),
        pagination: find_pagination_links(&document, page_url),
    }
}

/// Parses a paginated continuation page using the first column of each table
///
/// Continuation pages are never searched for further pagination.
pub fn parse_continuation_page(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    extract_sku_ids(&document, ColumnRule::FirstColumn)
}

/// Extracts qualifying SKU IDs from every table in the document
fn extract_sku_ids(document: &Html, rule: ColumnRule) -> Vec<String> {
    let Ok(table_selector) = Selector::parse("table") else {
        return Vec::new();
    };

    document
        .select(&table_selector)
        .flat_map(|table| extract_table_sku_ids(table, rule))
        .collect()
}

/// Extracts qualifying SKU IDs from one table
fn extract_table_sku_ids(table: ElementRef<'_>, rule: ColumnRule) -> Vec<String> {
    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr"), Selector::parse("td"))
    else {
        return Vec::new();
    };

    // Continuation pages never look at headers
    let column = match rule {
        ColumnRule::DetectFromHeaders => detect_sku_column(&table_headers(table)),
        ColumnRule::FirstColumn => SkuColumn::Unmatched,
    };
    let index = column.index();

    let mut sku_ids = Vec::new();
    for row in table.select(&row_selector) {
        // Header rows and short rows have no cell at the SKU column
        let Some(cell) = row.select(&cell_selector).nth(index) else {
            continue;
        };

        let text = cell.text().collect::<String>();
        if let Some(sku_id) = accept_sku_candidate(&text) {
            sku_ids.push(sku_id.to_string());
        }
    }

    sku_ids
}

/// Collects header cell texts, trimmed and lowercased
fn table_headers(table: ElementRef<'_>) -> Vec<String> {
    let Ok(header_selector) = Selector::parse("th") else {
        return Vec::new();
    };

    table
        .select(&header_selector)
        .map(|th| th.text().collect::<String>().trim().to_lowercase())
        .collect()
}

/// Finds pagination controls and resolves their targets
///
/// Anchors whose `aria-label` contains "page" are preferred; if there are
/// none, anchors with the `pagination` class are used. Targets equal to the
/// current page are dropped.
fn find_pagination_links(document: &Html, page_url: &Url) -> Vec<Url> {
    // Accessible pagination controls first, styled links as a fallback
    let mut controls = select_anchors(document, r#"a[aria-label*="page"]"#);
    if controls.is_empty() {
        controls = select_anchors(document, "a.pagination");
    }

    controls
        .into_iter()
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .map(|mut target| {
            // A fragment never names a different page
            target.set_fragment(None);
            target
        })
        .filter(|target| !same_page(target, page_url))
        .collect()
}

/// Compares two URLs ignoring their fragments
fn same_page(target: &Url, page_url: &Url) -> bool {
    let mut page = page_url.clone();
    page.set_fragment(None);
    *target == page
}

fn select_anchors<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Resolves a link href to an absolute HTTP(S) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links (same page anchors)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    // Skip special schemes
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Skip fragment-only links (same page anchors)
    if href.starts_with('#') {
        return None;
    }

    // Try to resolve the URL
    match base_url.join(href) {
        Ok(absolute_url) => {
            // Only accept HTTP and HTTPS URLs
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
