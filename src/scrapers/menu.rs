//! Navigation-menu extraction.
//!
//! The portal's landing page carries a `div.menu-block` whose anchors are
//! the topic pages. Each anchor becomes one [`TopicLink`].

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{error, info, instrument};
use url::Url;

use super::absolute_link;
use crate::fetch::FetchPage;
use crate::models::TopicLink;

/// Default menu page (the English landing page).
pub const DEFAULT_MENU_URL: &str = "http://www.kcna.kp/en";

static MENU_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.menu-block a[href]").unwrap());

/// Extract the topic links from a parsed menu page.
///
/// Anchors with no visible text are skipped. Duplicates are kept: the
/// list is a snapshot of the menu as rendered.
pub fn extract_menu(document: &Html, origin: &Url) -> Vec<TopicLink> {
    document
        .select(&MENU_LINKS)
        .filter_map(|a| {
            let topic = a.text().collect::<String>().trim().to_string();
            if topic.is_empty() {
                return None;
            }
            let href = a.value().attr("href")?;
            Some(TopicLink {
                topic,
                link: absolute_link(origin, href),
            })
        })
        .collect()
}

/// Fetch the menu page and extract its topic links.
///
/// Any fetch failure, retryable or not, is logged and yields an empty list
/// so the run proceeds with nothing to collect.
#[instrument(level = "info", skip(fetcher, origin))]
pub async fn fetch_menu<F: FetchPage>(fetcher: &F, menu_url: &str, origin: &Url) -> Vec<TopicLink> {
    let html = match fetcher.fetch(menu_url).await {
        Ok(html) => html,
        Err(e) => {
            error!(url = %menu_url, status = ?e.status(), error = %e, "Failed to retrieve the menu page");
            return Vec::new();
        }
    };
    let document = Html::parse_document(&html);
    let links = extract_menu(&document, origin);
    info!(count = links.len(), "Extracted menu topics");
    links
}
