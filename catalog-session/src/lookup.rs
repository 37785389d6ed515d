use dashmap::DashMap;
use marvel_client::CharacterRecord;

/// Every character seen during the session, by id.
///
/// Filled by the list and detail views alike so that opening a detail page
/// for a character that was already listed needs no request. Entries are
/// only ever added or replaced.
#[derive(Default)]
pub struct CharacterLookup {
    characters: DashMap<u64, CharacterRecord>,
}

impl CharacterLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_characters(characters: impl IntoIterator<Item = CharacterRecord>) -> Self {
        let lookup = Self::new();
        lookup.upsert_all(characters);
        lookup
    }

    /// Insert or replace; the latest record wins.
    pub fn upsert(&self, character: CharacterRecord) {
        self.characters.insert(character.id, character);
    }

    pub fn upsert_all(&self, characters: impl IntoIterator<Item = CharacterRecord>) {
        for character in characters {
            self.upsert(character);
        }
    }

    pub fn get(&self, id: u64) -> Option<CharacterRecord> {
        self.characters.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.characters.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
