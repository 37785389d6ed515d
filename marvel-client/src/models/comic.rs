use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};

use super::Image;

/// Date type tag that carries the on-sale date.
pub const ON_SALE_DATE: &str = "onsaleDate";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComicRecord {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Image,
    pub dates: Vec<ComicDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicDate {
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
}

impl ComicRecord {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Default::default()
        }
    }

    /// Year of the on-sale date, if there is one that makes sense.
    ///
    /// The API marks unknown dates with negative years, those map to `None`.
    pub fn on_sale_year(&self) -> Option<i32> {
        let date = self.dates.iter().find(|d| d.kind == ON_SALE_DATE)?;
        let parsed = DateTime::parse_from_str(&date.date, "%Y-%m-%dT%H:%M:%S%z")
            .or_else(|_| DateTime::parse_from_rfc3339(&date.date))
            .ok()?;
        Some(parsed.year()).filter(|year| *year > 0)
    }
}

/// What a comic list row needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComicSummary {
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub image_url: String,
}

impl From<&ComicRecord> for ComicSummary {
    fn from(comic: &ComicRecord) -> Self {
        Self {
            id: comic.id,
            title: comic.title.clone(),
            year: comic.on_sale_year(),
            image_url: comic.thumbnail.url(),
        }
    }
}
