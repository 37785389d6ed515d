pub mod character;
pub mod comic;
pub mod image;
pub(crate) mod response;

pub use character::{CharacterRecord, ResourceList, ResourceSummary, UrlLink};
pub use comic::{ComicDate, ComicRecord, ComicSummary};
pub use image::Image;
