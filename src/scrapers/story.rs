//! Story-page text extraction.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::fetch::FetchPage;

static STORY_PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.content-wrapper p").unwrap());

/// Join the text of every paragraph in the story container.
///
/// Each paragraph is trimmed; paragraphs are separated by `\n`. Returns an
/// empty string when the page has no `div.content-wrapper`.
pub fn extract_story(document: &Html) -> String {
    document
        .select(&STORY_PARAGRAPHS)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Fetch a story page and return its text, or an empty string on failure.
pub async fn fetch_story<F: FetchPage>(fetcher: &F, url: &str) -> String {
    match fetcher.fetch(url).await {
        Ok(html) => {
            let text = extract_story(&Html::parse_document(&html));
            debug!(%url, bytes = text.len(), "Parsed story text");
            text
        }
        Err(e) => {
            warn!(%url, status = ?e.status(), error = %e, "Failed to retrieve story; leaving text empty");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_story_joins_paragraphs() {
        let page = r#"
            <div class="content-wrapper">
              <p>  First paragraph. </p>
              <p>Second <b>bold</b> paragraph.</p>
              <div><p>Nested third.</p></div>
            </div>
            <p>Outside the container.</p>
        "#;
        let text = extract_story(&Html::parse_document(page));
        assert_eq!(text, "First paragraph.\nSecond bold paragraph.\nNested third.");
    }

    #[test]
    fn test_extract_story_without_container() {
        let page = "<html><body><p>Loose text</p></body></html>";
        assert_eq!(extract_story(&Html::parse_document(page)), "");
    }

    #[test]
    fn test_extract_story_trims_empty_edges() {
        let page = r#"<div class="content-wrapper"><p></p><p>Body</p><p> </p></div>"#;
        assert_eq!(extract_story(&Html::parse_document(page)), "Body");
    }
}
