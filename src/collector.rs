//! Topic collection: menu topics in, normalized article records out.
//!
//! Topics are processed one at a time, and within a topic articles are
//! processed one at a time. Only articles from a key topic get their story
//! text fetched, each preceded by a fixed throttle delay.

use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument};
use url::Url;

use crate::dates::DateNormalizer;
use crate::fetch::FetchPage;
use crate::models::{ArticleRecord, TopicLink};
use crate::scrapers::{listing, story};

/// Topics whose articles get full story text.
pub const DEFAULT_KEY_TOPICS: &[&str] = &[
    "WPK General Secretary Kim Jong Un's Revolutionary Activities",
    "Documents",
    "Latest News",
    "Top News",
    "Home News",
    "World",
    "Revolutionary Anecdote",
    "Society-Life",
    "External",
    "News Commentary",
    "Always in Memory of People",
    "Celebrations for New Year",
];

/// Settings for [`collect`].
#[derive(Debug, Clone)]
pub struct CollectSettings {
    /// Origin relative links are resolved against.
    pub origin: Url,
    /// Allow-list of topics that get story text.
    pub key_topics: Vec<String>,
    /// Pause before every story fetch.
    pub story_delay: Duration,
}

impl CollectSettings {
    pub fn is_key_topic(&self, topic: &str) -> bool {
        self.key_topics.iter().any(|k| k == topic)
    }
}

/// Scrape every topic and return the new batch in topic order.
///
/// No deduplication happens here; a topic whose page cannot be fetched
/// contributes nothing.
#[instrument(level = "info", skip_all, fields(topics = topics.len()))]
pub async fn collect<F: FetchPage>(
    fetcher: &F,
    topics: &[TopicLink],
    settings: &CollectSettings,
    normalizer: &DateNormalizer,
) -> Vec<ArticleRecord> {
    let per_topic: Vec<Vec<ArticleRecord>> = stream::iter(topics.iter().enumerate())
        .then(|(i, topic)| async move {
            info!(index = i, topic = %topic.topic, url = %topic.link, "Processing topic page");
            collect_topic(fetcher, topic, settings, normalizer).await
        })
        .collect()
        .await;

    let records: Vec<ArticleRecord> = per_topic.into_iter().flatten().collect();
    info!(count = records.len(), "Collected new records");
    records
}

async fn collect_topic<F: FetchPage>(
    fetcher: &F,
    topic: &TopicLink,
    settings: &CollectSettings,
    normalizer: &DateNormalizer,
) -> Vec<ArticleRecord> {
    let raw = listing::fetch_listing(fetcher, &topic.link, &topic.topic, &settings.origin).await;
    let wants_story = settings.is_key_topic(&topic.topic);

    let mut records = Vec::with_capacity(raw.len());
    for article in raw {
        let story_text = if wants_story && !article.link.is_empty() {
            sleep(settings.story_delay).await;
            story::fetch_story(fetcher, &article.link).await
        } else {
            String::new()
        };
        debug!(headline = %article.headline, story_bytes = story_text.len(), "Built record");
        records.push(article.into_record(normalizer, story_text));
    }
    records
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dates::DatePolicy;
    use crate::fetch::FetchError;
    use crate::scrapers::DEFAULT_ORIGIN;
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned HTML by URL; unknown URLs answer 404.
    #[derive(Debug, Default)]
    pub(crate) struct CannedPages {
        pages: HashMap<String, String>,
        pub(crate) requested: RefCell<Vec<String>>,
    }

    impl CannedPages {
        pub(crate) fn with(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl FetchPage for CannedPages {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or(FetchError::Status(StatusCode::NOT_FOUND))
        }
    }

    pub(crate) fn settings() -> CollectSettings {
        CollectSettings {
            origin: Url::parse(DEFAULT_ORIGIN).unwrap(),
            key_topics: vec!["World".to_string()],
            story_delay: Duration::from_millis(1),
        }
    }

    fn topic(name: &str, link: &str) -> TopicLink {
        TopicLink {
            topic: name.to_string(),
            link: link.to_string(),
        }
    }

    #[tokio::test]
    async fn test_collect_fetches_stories_for_key_topics_only() {
        let fetcher = CannedPages::default()
            .with(
                "http://www.kcna.kp/en/world",
                r#"<ul class="article-link">
                    <li><a href="/en/article/w1">World one</a><span class="publish-time">[2024.10.02]</span></li>
                </ul>"#,
            )
            .with(
                "http://www.kcna.kp/en/sports",
                r#"<ul class="article-link">
                    <li><a href="/en/article/s1">Sports one</a><span class="publish-time">[Juche 113.10.03]</span></li>
                </ul>"#,
            )
            .with(
                "http://www.kcna.kp/en/article/w1",
                r#"<div class="content-wrapper"><p>World story.</p></div>"#,
            );

        let topics = vec![
            topic("World", "http://www.kcna.kp/en/world"),
            topic("Sports", "http://www.kcna.kp/en/sports"),
        ];
        let normalizer = DateNormalizer::with_current_year(DatePolicy::default(), 2026);
        let records = collect(&fetcher, &topics, &settings(), &normalizer).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].topic, "World");
        assert_eq!(records[0].story_text, "World story.");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 10, 2));
        assert_eq!(records[1].topic, "Sports");
        assert_eq!(records[1].story_text, "");
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 10, 3));

        let requested = fetcher.requested.borrow();
        assert!(!requested.contains(&"http://www.kcna.kp/en/article/s1".to_string()));
    }

    #[tokio::test]
    async fn test_collect_skips_unreachable_topics_and_missing_stories() {
        let fetcher = CannedPages::default().with(
            "http://www.kcna.kp/en/world",
            r#"<ul class="article-link">
                <li><a href="/en/article/gone">Story gone</a><span class="publish-time">bad date</span></li>
            </ul>"#,
        );
        let topics = vec![
            topic("Home News", "http://www.kcna.kp/en/unreachable"),
            topic("World", "http://www.kcna.kp/en/world"),
        ];
        let normalizer = DateNormalizer::with_current_year(DatePolicy::default(), 2026);
        let records = collect(&fetcher, &topics, &settings(), &normalizer).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].headline, "Story gone");
        assert_eq!(records[0].story_text, "");
        assert_eq!(records[0].date, None);
    }

    #[tokio::test]
    async fn test_collect_keeps_duplicates_across_topics() {
        let page = r#"<ul class="article-link"><li><a href="/en/article/same">Same</a></li></ul>"#;
        let fetcher = CannedPages::default()
            .with("http://www.kcna.kp/en/a", page)
            .with("http://www.kcna.kp/en/b", page);
        let topics = vec![
            topic("Top News", "http://www.kcna.kp/en/a"),
            topic("Latest News", "http://www.kcna.kp/en/b"),
        ];
        let normalizer = DateNormalizer::with_current_year(DatePolicy::default(), 2026);
        let records = collect(&fetcher, &topics, &settings(), &normalizer).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identity(), records[1].identity());
    }

    #[test]
    fn test_is_key_topic_is_exact() {
        let s = settings();
        assert!(s.is_key_topic("World"));
        assert!(!s.is_key_topic("world"));
        assert!(!s.is_key_topic("World News"));
    }
}
