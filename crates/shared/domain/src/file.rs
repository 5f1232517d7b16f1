use serde::Serialize;

/// A file persisted by a successful upload.
///
/// Identity is `(namespace, name + extension)`; stored files are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StoredFile {
    pub namespace: String,
    pub name: String,
    /// Leading dot included, or empty.
    pub extension: String,
    pub size_bytes: u64,
}

impl StoredFile {
    /// The on-disk file name (`name` followed by `extension`).
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}
