use crate::engine::Storage;
use crate::error::{StorageError, StorageErrorExt};
use crate::security;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// A validated namespace identifier: non-empty, `[A-Za-z0-9_-]` only.
///
/// Namespace names become directory names directly under the storage root, so the
/// character set excludes separators and dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName(pub String);

impl TryFrom<String> for NamespaceName {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&String> for NamespaceName {
    type Error = StorageError;

    fn try_from(value: &String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&str> for NamespaceName {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, StorageError> {
        if value.is_empty() {
            return Err(StorageError::InvalidName {
                message: "EMPTY".into(),
                context: Some("Namespace cannot be empty".into()),
            });
        }

        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(StorageError::InvalidName {
                message: value.to_owned().into(),
                context: Some("Namespace contains illegal characters".into()),
            });
        }

        Ok(Self(value.to_owned()))
    }
}

impl AsRef<str> for NamespaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opened stored file, ready to be streamed.
#[derive(Debug)]
pub struct StoredObject {
    pub file: fs::File,
    pub len: u64,
    pub path: PathBuf,
}

/// A scoped view of one flat namespace directory: `<root>/<namespace>/<file>`.
///
/// Cloning is inexpensive; it only holds reference-counted handles.
#[derive(Debug, Clone)]
pub struct NamespacedStorage {
    storage: Storage,
    name: Arc<str>,
    dir: Arc<Path>,
}

impl NamespacedStorage {
    pub(crate) fn new(storage: Storage, name: &NamespaceName) -> Self {
        let dir = storage.root.join(&name.0);
        Self { storage, name: Arc::from(name.0.as_str()), dir: Arc::from(dir) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical directory of this namespace.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves a file name to its physical path inside the namespace directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] for an empty name and
    /// [`StorageError::PathTraversalAttempt`] if the name contains directories, `..`,
    /// or resolves outside the namespace directory.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        security::resolve_entry(&self.dir, file_name)
    }

    /// Returns `true` iff the fully resolved `candidate` is a strict descendant of the
    /// namespace directory. Relative candidates are taken relative to that directory.
    #[must_use]
    pub fn is_contained(&self, candidate: impl AsRef<Path>) -> bool {
        security::is_contained(&self.dir, candidate.as_ref())
    }

    /// Checks whether a regular file with this name exists in the namespace.
    ///
    /// # Errors
    ///
    /// Returns an error only if the name is rejected by [`resolve`](Self::resolve) or a
    /// critical I/O error occurs.
    pub async fn exists(&self, file_name: &str) -> Result<bool, StorageError> {
        let resolved = self.resolve(file_name)?;
        match fs::metadata(&resolved).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to stat {}", resolved.display()).into()),
            }),
        }
    }

    /// Counts stored files whose name ends with `extension`.
    ///
    /// An empty `extension` counts files without any dot in their name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DirectoryNotFound`] if the namespace directory is missing.
    pub async fn count_matching(&self, extension: &str) -> Result<usize, StorageError> {
        let mut entries = match fs::read_dir(&*self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::DirectoryNotFound {
                    message: self.dir.display().to_string().into(),
                    context: None,
                });
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to list {}", self.dir.display()).into()),
                });
            },
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await.context("Directory listing failed")? {
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            if is_file && entry.file_name().to_str().is_some_and(|n| has_extension(n, extension)) {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Stores `data` under `file_name`, failing if that name is already taken.
    ///
    /// The bytes are staged and synced first, then published with a single
    /// exclusive link, so a concurrent writer of the same name either wins
    /// or gets [`StorageError::AlreadyExists`]; no one is ever overwritten and
    /// readers never see a partial file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the name is taken,
    /// [`StorageError::PathTraversalAttempt`] if the name escapes the namespace, and
    /// [`StorageError::Io`] on disk failure.
    pub async fn write_new(&self, file_name: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        let target = self.resolve(file_name)?;
        self.storage.publish(&target, data).await?;
        Ok(target)
    }

    /// Opens a stored file for streaming.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if the file does not exist or is not a
    /// regular file.
    pub async fn open(&self, file_name: &str) -> Result<StoredObject, StorageError> {
        let path = self.resolve(file_name)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound {
                    message: path.display().to_string().into(),
                    context: None,
                });
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Open failed: {}", path.display()).into()),
                });
            },
        };

        let meta = file.metadata().await.context(format!("Stat failed: {}", path.display()))?;
        if !meta.is_file() {
            return Err(StorageError::FileNotFound {
                message: path.display().to_string().into(),
                context: Some("Target must be a file".into()),
            });
        }

        Ok(StoredObject { file, len: meta.len(), path })
    }

    /// Reads the entire contents of a stored file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if the file does not exist.
    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(file_name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::FileNotFound {
                message: path.display().to_string().into(),
                context: None,
            }),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Read failed: {}", path.display()).into()),
            }),
        }
    }
}

fn has_extension(file_name: &str, extension: &str) -> bool {
    if extension.is_empty() { !file_name.contains('.') } else { file_name.ends_with(extension) }
}
