use serde::{Deserialize, Serialize};

/// Image reference split the way the API returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    pub path: String,
    pub extension: String,
}

impl Image {
    pub fn new(path: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
        }
    }

    /// Full URL of the image, `{path}.{extension}`.
    pub fn url(&self) -> String {
        format!("{}.{}", self.path, self.extension)
    }
}
