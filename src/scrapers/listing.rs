//! Topic-page article extraction.
//!
//! A topic page holds one or more `ul.article-link` lists. Only the first
//! [`MAX_PER_CONTAINER`] entries of each list are taken. The `Photo` and
//! `Video` topics additionally carry `div.photo` / `div.video` blocks,
//! which are scanned separately and appended after the list entries.
//!
//! ```text
//! <ul class="article-link">
//!   <li><a href="/en/article/q/1.kcmsf">Headline&#13;junk</a>
//!       <span class="publish-time">[2024.10.15]</span></li>
//! </ul>
//! <div class="photo">
//!   <span class="title"><a href="/en/media/1">Caption</a>
//!     <span class="publish-time">[2024.10.15]</span></span>
//! </div>
//! ```

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::absolute_link;
use crate::dates::UNKNOWN;
use crate::fetch::FetchPage;
use crate::models::RawArticle;

/// Cap on entries taken from each list, and on media blocks per page.
pub const MAX_PER_CONTAINER: usize = 5;

/// Topics whose pages carry photo/video blocks.
pub const MEDIA_TOPICS: &[&str] = &["Photo", "Video"];

static ARTICLE_LIST: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.article-link").unwrap());
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static PUBLISH_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("span.publish-time").unwrap());
static MEDIA_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.photo, div.video").unwrap());
static MEDIA_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.title").unwrap());

/// Extract raw articles from a parsed topic page.
///
/// Returns an empty vector when the page has none of the expected
/// containers.
pub fn extract(document: &Html, topic: &str, origin: &Url) -> Vec<RawArticle> {
    let mut articles = Vec::new();

    for list in document.select(&ARTICLE_LIST) {
        for item in list.select(&LIST_ITEM).take(MAX_PER_CONTAINER) {
            let Some(anchor) = item.select(&ANCHOR).next() else {
                debug!(topic, "List entry without anchor; skipping");
                continue;
            };
            articles.push(RawArticle {
                topic: topic.to_string(),
                headline: headline_text(anchor),
                link: anchor
                    .value()
                    .attr("href")
                    .map(|href| absolute_link(origin, href))
                    .unwrap_or_default(),
                raw_date: publish_time(item),
            });
        }
    }

    if MEDIA_TOPICS.contains(&topic) {
        for block in document.select(&MEDIA_BLOCK).take(MAX_PER_CONTAINER) {
            let Some(title) = block.select(&MEDIA_TITLE).next() else {
                debug!(topic, "Media block without title; skipping");
                continue;
            };
            let anchor = title.select(&ANCHOR).next();
            articles.push(RawArticle {
                topic: topic.to_string(),
                headline: anchor
                    .map(headline_text)
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                link: anchor
                    .and_then(|a| a.value().attr("href"))
                    .map(|href| absolute_link(origin, href))
                    .unwrap_or_default(),
                raw_date: publish_time(title),
            });
        }
    }

    articles
}

/// Anchor text up to the first line break.
///
/// The portal embeds a carriage return plus hidden text after the visible
/// headline. HTML parsing turns a literal CR into LF, so both count.
fn headline_text(anchor: ElementRef<'_>) -> String {
    let text = anchor.text().collect::<String>();
    text.trim()
        .split(['\r', '\n'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn publish_time(scope: ElementRef<'_>) -> Option<String> {
    scope
        .select(&PUBLISH_TIME)
        .next()
        .map(|span| span.text().collect::<String>().trim().to_string())
}

/// Fetch a topic page and extract its articles.
///
/// A failed fetch is logged and yields no articles.
#[instrument(level = "info", skip(fetcher, origin))]
pub async fn fetch_listing<F: FetchPage>(
    fetcher: &F,
    page_url: &str,
    topic: &str,
    origin: &Url,
) -> Vec<RawArticle> {
    let html = match fetcher.fetch(page_url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = %page_url, status = ?e.status(), error = %e, "Failed to retrieve topic page");
            return Vec::new();
        }
    };
    let document = Html::parse_document(&html);
    let articles = extract(&document, topic, origin);
    info!(count = articles.len(), "Extracted topic articles");
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::DEFAULT_ORIGIN;

    fn origin() -> Url {
        Url::parse(DEFAULT_ORIGIN).unwrap()
    }

    fn list_page(entries: usize) -> String {
        let items: String = (1..=entries)
            .map(|i| {
                format!(
                    r#"<li><a href="/en/article/q/{i}.kcmsf">Headline {i}</a><span class="publish-time">[2024.10.{i:02}]</span></li>"#
                )
            })
            .collect();
        format!(r#"<html><body><ul class="article-link">{items}</ul></body></html>"#)
    }

    #[test]
    fn test_caps_each_list_at_five() {
        let doc = Html::parse_document(&list_page(8));
        let articles = extract(&doc, "World", &origin());
        assert_eq!(articles.len(), 5);
        assert_eq!(articles[0].headline, "Headline 1");
        assert_eq!(articles[4].headline, "Headline 5");
        assert_eq!(articles[0].link, "http://www.kcna.kp/en/article/q/1.kcmsf");
        assert_eq!(articles[0].raw_date.as_deref(), Some("[2024.10.01]"));
        assert!(articles.iter().all(|a| a.topic == "World"));
    }

    #[test]
    fn test_cap_applies_per_list() {
        let page = list_page(6).replace(
            "</body>",
            r#"<ul class="article-link"><li><a href="/second">Second list</a></li></ul></body>"#,
        );
        let doc = Html::parse_document(&page);
        let articles = extract(&doc, "World", &origin());
        assert_eq!(articles.len(), 6);
        assert_eq!(articles[5].headline, "Second list");
    }

    #[test]
    fn test_missing_container_yields_empty() {
        let doc = Html::parse_document("<html><body><p>Maintenance</p></body></html>");
        assert!(extract(&doc, "World", &origin()).is_empty());
        let doc = Html::parse_document("");
        assert!(extract(&doc, "Photo", &origin()).is_empty());
    }

    #[test]
    fn test_headline_cut_at_carriage_return() {
        let page = r#"<ul class="article-link">
            <li><a href="/a">  Visible headline&#13;hidden tail</a></li>
            <li><a href="/b">Other headline
continuation</a></li>
        </ul>"#;
        let doc = Html::parse_document(page);
        let articles = extract(&doc, "World", &origin());
        assert_eq!(articles[0].headline, "Visible headline");
        assert_eq!(articles[1].headline, "Other headline");
    }

    #[test]
    fn test_missing_date_and_anchor() {
        let page = r#"<ul class="article-link">
            <li><span>no anchor here</span></li>
            <li><a href="/a">Dateless</a></li>
        </ul>"#;
        let doc = Html::parse_document(page);
        let articles = extract(&doc, "World", &origin());
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].headline, "Dateless");
        assert_eq!(articles[0].raw_date, None);
    }

    #[test]
    fn test_media_blocks_only_for_media_topics() {
        let page = r#"
            <ul class="article-link"><li><a href="/en/list/1">Listed</a></li></ul>
            <div class="photo"><span class="title"><a href="/en/photo/1">Photo one</a>
                <span class="publish-time">[2024.10.01]</span></span></div>
            <div class="video"><span class="title"><a href="/en/video/1">Video one</a></span></div>
            <div class="photo"><span class="title">untitled</span></div>
            <div class="photo"><p>no title span</p></div>
        "#;
        let doc = Html::parse_document(page);

        let photo = extract(&doc, "Photo", &origin());
        assert_eq!(photo.len(), 4);
        assert_eq!(photo[0].headline, "Listed");
        assert_eq!(photo[1].headline, "Photo one");
        assert_eq!(photo[1].link, "http://www.kcna.kp/en/photo/1");
        assert_eq!(photo[1].raw_date.as_deref(), Some("[2024.10.01]"));
        assert_eq!(photo[2].headline, "Video one");
        assert_eq!(photo[2].raw_date, None);
        assert_eq!(photo[3].headline, UNKNOWN);
        assert_eq!(photo[3].link, "");

        let world = extract(&doc, "World", &origin());
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_media_blocks_capped_at_five() {
        let blocks: String = (1..=7)
            .map(|i| format!(r#"<div class="video"><span class="title"><a href="/v/{i}">V{i}</a></span></div>"#))
            .collect();
        let doc = Html::parse_document(&blocks);
        let articles = extract(&doc, "Video", &origin());
        assert_eq!(articles.len(), 5);
        assert_eq!(articles[4].headline, "V5");
    }
}
