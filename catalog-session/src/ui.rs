use std::sync::atomic::{AtomicBool, Ordering};

/// View mode shared by the whole session.
#[derive(Debug, Default)]
pub struct UiState {
    show_favorites: AtomicBool,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the list shows favorites only.
    pub fn show_favorites(&self) -> bool {
        self.show_favorites.load(Ordering::Acquire)
    }

    pub fn set_show_favorites(&self, show: bool) {
        self.show_favorites.store(show, Ordering::Release);
    }
}
