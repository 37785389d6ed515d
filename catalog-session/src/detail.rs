use log::{debug, info};
use marvel_client::{CharacterRecord, ComicSummary, Error, MarvelClient};
use std::sync::Arc;

use crate::lookup::CharacterLookup;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetailError {
    /// Neither the lookup table nor the full listing has this id
    #[error("Character {0} not found")]
    NotFound(u64),
    #[error(transparent)]
    Fetch(#[from] Error),
}

/// Loads what the character detail view shows.
#[derive(Clone)]
pub struct DetailLoader {
    client: MarvelClient,
    lookup: Arc<CharacterLookup>,
    comics_limit: u32,
    comics_order_by: String,
}

impl DetailLoader {
    pub fn new(
        client: MarvelClient,
        lookup: Arc<CharacterLookup>,
        comics_limit: u32,
        comics_order_by: impl Into<String>,
    ) -> Self {
        Self {
            client,
            lookup,
            comics_limit,
            comics_order_by: comics_order_by.into(),
        }
    }

    /// The character with `id`, from the lookup table when possible.
    ///
    /// Otherwise the unfiltered listing is fetched (usually a cache hit) and
    /// searched.
    pub async fn load_character(&self, id: u64) -> Result<CharacterRecord, DetailError> {
        if let Some(character) = self.lookup.get(id) {
            debug!("Character {} served from lookup table", id);
            return Ok(character);
        }

        let characters = self.client.fetch_characters("").await?;
        let character = characters
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| {
                info!("Character {} not found", id);
                DetailError::NotFound(id)
            })?;

        self.lookup.upsert(character.clone());
        Ok(character)
    }

    /// Comics of a character, ready for display.
    pub async fn load_comics(&self, character_id: u64) -> Result<Vec<ComicSummary>, Error> {
        let comics = self
            .client
            .fetch_comics_for_character(character_id, self.comics_limit, &self.comics_order_by)
            .await?;
        Ok(comics.iter().map(ComicSummary::from).collect())
    }
}
