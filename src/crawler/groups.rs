//! SKU group link discovery on the landing page

use crate::config::SiteConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::resolve_link;
use crate::record::GroupTarget;
use crate::HarvestError;
use scraper::{Html, Selector};
use url::Url;

/// Finds the SKU group pages linked from the landing page
///
/// A failed landing fetch yields an empty list; the caller decides whether
/// that is fatal. Malformed landing/origin URLs are configuration errors.
pub async fn discover_groups(
    fetcher: &Fetcher,
    site: &SiteConfig,
) -> Result<Vec<GroupTarget>, HarvestError> {
    let landing_url = Url::parse(&site.landing_url)?;
    let origin = Url::parse(&site.origin)?;

    tracing::info!("Fetching SKU group links from {}", landing_url);

    let Some(page) = fetcher.fetch(landing_url.as_str()).await.into_page() else {
        return Ok(Vec::new());
    };

    let targets = parse_group_links(&page.body, &landing_url, &origin, &site.group_path_segment);
    tracing::info!("Found {} SKU group links", targets.len());

    Ok(targets)
}

/// Extracts group targets from landing page HTML
///
/// # Link Rules
///
/// - the raw `href` must contain `group_path_segment`
/// - the link must not resolve to the landing page itself
/// - relative links are resolved against `origin`
/// - the trimmed anchor text becomes the group name and must be non-empty
///
/// Repeated links are kept; each occurrence becomes its own target.
pub fn parse_group_links(
    html: &str,
    landing_url: &Url,
    origin: &Url,
    group_path_segment: &str,
) -> Vec<GroupTarget> {
    let document = Html::parse_document(html);
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut targets = Vec::new();
    for anchor in document.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        // Filter on the raw href, before resolution
        if !href.contains(group_path_segment) {
            continue;
        }

        let Some(group_url) = resolve_link(href, origin) else {
            tracing::debug!("Skipping unresolvable group link {}", href);
            continue;
        };

        // The landing page links to itself
        if &group_url == landing_url {
            continue;
        }

        let name = anchor.text().collect::<String>();
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        targets.push(GroupTarget::new(name, group_url));
    }

    targets
}
