use serde::{Deserialize, Serialize};

use super::Image;

/// A character as returned by `public/characters`.
///
/// Fields the API sometimes leaves out fall back to their defaults so that a
/// sparse record still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterRecord {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub modified: String,
    pub thumbnail: Image,
    #[serde(rename = "resourceURI")]
    pub resource_uri: String,
    pub comics: ResourceList,
    pub series: ResourceList,
    pub stories: ResourceList,
    pub events: ResourceList,
    pub urls: Vec<UrlLink>,
}

impl CharacterRecord {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Description for display; the API uses an empty string for "none".
    pub fn display_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Case-insensitive substring match on the name.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Paged list of related resources (comics, series, stories, events).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceList {
    pub available: u32,
    pub returned: u32,
    #[serde(rename = "collectionURI")]
    pub collection_uri: String,
    pub items: Vec<ResourceSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSummary {
    #[serde(rename = "resourceURI")]
    pub resource_uri: String,
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlLink {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}
