//! Scrapers for the portal's menu, topic pages and story pages.
//!
//! Each scraper splits into a pure extraction function over a parsed
//! [`scraper::Html`] document and an async wrapper that fetches the page
//! through a [`FetchPage`](crate::fetch::FetchPage) first.
//!
//! | Page       | Module      | Extracts                              |
//! |------------|-------------|---------------------------------------|
//! | Menu       | [`menu`]    | `TopicLink` per menu anchor           |
//! | Topic page | [`listing`] | Up to 5 articles per list / media set |
//! | Story page | [`story`]   | Paragraph text of the story body      |
//!
//! Extraction never fails: missing structure yields empty results or
//! placeholder fields, and fetch failures are logged and degrade the same
//! way.

use url::Url;

pub mod listing;
pub mod menu;
pub mod story;

/// Site origin every relative link is resolved against.
pub const DEFAULT_ORIGIN: &str = "http://www.kcna.kp";

/// Resolve an `href` against the site origin.
///
/// Root-relative hrefs (the only kind the portal emits) end up as the
/// origin followed by the href.
pub fn absolute_link(origin: &Url, href: &str) -> String {
    match origin.join(href) {
        Ok(u) => u.to_string(),
        Err(_) => format!("{}{}", origin.as_str().trim_end_matches('/'), href),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_link_prefixes_origin() {
        let origin = Url::parse(DEFAULT_ORIGIN).unwrap();
        assert_eq!(
            absolute_link(&origin, "/en/article/q/abc.kcmsf"),
            "http://www.kcna.kp/en/article/q/abc.kcmsf"
        );
    }

    #[test]
    fn test_absolute_link_keeps_absolute_href() {
        let origin = Url::parse(DEFAULT_ORIGIN).unwrap();
        assert_eq!(
            absolute_link(&origin, "http://other.example/x"),
            "http://other.example/x"
        );
    }
}
