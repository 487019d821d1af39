//! Data models for scraped topics and archived articles.
//!
//! - [`TopicLink`]: One entry of the portal's navigation menu
//! - [`RawArticle`]: An article as found on a topic page, date still unparsed
//! - [`ArticleRecord`]: A normalized article, the unit stored in the archive
//!
//! Records serialize with the field names the published `headlines.json`
//! has always used, so archives written by earlier runs stay readable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

use crate::dates::{self, DateNormalizer};

/// A named section of the portal's navigation menu.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicLink {
    /// The menu label, e.g. `"World"` or `"Photo"`.
    pub topic: String,
    /// Absolute URL of the topic page.
    pub link: String,
}

/// An article as extracted from a topic page.
///
/// The publish date is kept exactly as the page printed it (brackets, era
/// marker and all) until it goes through [`DateNormalizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    pub topic: String,
    pub headline: String,
    pub link: String,
    /// `None` when the entry carried no publish-time element.
    pub raw_date: Option<String>,
}

impl RawArticle {
    /// Normalize the raw date and attach the story text.
    pub fn into_record(self, normalizer: &DateNormalizer, story_text: String) -> ArticleRecord {
        let date = normalizer.normalize(self.raw_date.as_deref());
        ArticleRecord::new(self.topic, self.headline, self.link, date, story_text)
    }
}

/// One article in the archive.
///
/// # Identity
///
/// Two records are the same article when their `(headline, link)` pair is
/// equal, regardless of topic, date or story text. See [`ArticleRecord::identity`].
///
/// # Missing dates
///
/// `date` is `None` when the page's date was absent, malformed or out of
/// range. It serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRecord {
    pub topic: String,
    pub headline: String,
    pub link: String,
    #[serde(serialize_with = "serialize_date")]
    pub date: Option<NaiveDate>,
    /// Full story text; empty for topics outside the key-topic list.
    pub story_text: String,
    /// Display form of `date` (`YYYY-MM-DD`, or empty when missing).
    pub date_str: String,
}

impl ArticleRecord {
    pub fn new(
        topic: String,
        headline: String,
        link: String,
        date: Option<NaiveDate>,
        story_text: String,
    ) -> Self {
        Self {
            topic,
            headline,
            link,
            date,
            story_text,
            date_str: dates::display(date),
        }
    }

    /// The dedup key: `(headline, link)`.
    pub fn identity(&self) -> (&str, &str) {
        (&self.headline, &self.link)
    }

    /// Recompute `date_str` from `date`.
    pub fn refresh_date_str(&mut self) {
        self.date_str = dates::display(self.date);
    }
}

fn serialize_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_none(),
    }
}
