pub mod config;
pub mod context;
pub mod debounce;
pub mod detail;
pub mod favorites;
pub mod logging;
pub mod lookup;
pub mod search;
pub mod ui;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError};
pub use context::{Session, SessionError};
pub use debounce::Debouncer;
pub use detail::{DetailError, DetailLoader};
pub use favorites::{FavoritesStore, FAVORITES_KEY};
pub use lookup::CharacterLookup;
pub use search::{SearchCoordinator, SearchPhase, SearchSnapshot};
pub use ui::UiState;
