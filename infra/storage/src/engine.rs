//! Core storage engine: the sandbox root, namespace views, and the exclusive publish path.

use crate::builder::StorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use crate::namespace::{NamespaceName, NamespacedStorage};
use crate::security;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Directory under the root where uploads are staged before being published.
pub const STAGING_DIR: &str = ".staging";

pub(crate) const TMP_MARKER: &str = ".stashtmp";

/// The internal shared state of a [`Storage`] instance.
#[derive(Debug)]
pub struct StorageInner {
    /// The canonicalized physical path on the disk where all namespaces live.
    pub(crate) root: PathBuf,
    pub(crate) staging: PathBuf,
    pub(crate) tmp_counter: AtomicU64,
}

/// A thread-safe handle to the storage engine.
///
/// The layout is `<root>/<namespace>/<file>`; every namespace is a single flat
/// directory. The handle is reference-counted and can be cloned across tasks.
///
/// # Example
///
/// ```rust
/// use stash_storage::{Storage, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("uploads");
///     let storage = Storage::builder().root(&root).create(true).connect().await?;
///
///     let media = storage.ensure_namespace("media").await?;
///     media.write_new("aZ09xY.png", b"\x89PNG").await?;
///
///     assert!(media.exists("aZ09xY.png").await?);
///     assert!(media.write_new("aZ09xY.png", b"other").await.is_err());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Deref for Storage {
    type Target = StorageInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// Canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns a view of the namespace directory `<root>/<name>`.
    ///
    /// The directory itself is not touched; see [`ensure_namespace`](Self::ensure_namespace).
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidName`] if the name is empty or contains characters
    /// outside `[A-Za-z0-9_-]`.
    pub fn namespace<N>(&self, name: N) -> Result<NamespacedStorage, StorageError>
    where
        N: TryInto<NamespaceName, Error = StorageError>,
    {
        let ns = name.try_into()?;
        Ok(NamespacedStorage::new(self.clone(), &ns))
    }

    /// Returns the namespace view, creating its directory when missing.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidName`] for a malformed name and
    /// [`StorageError::Io`] if the directory cannot be created.
    pub async fn ensure_namespace<N>(&self, name: N) -> Result<NamespacedStorage, StorageError>
    where
        N: TryInto<NamespaceName, Error = StorageError>,
    {
        let ns = self.namespace(name)?;
        if !fs::try_exists(ns.dir()).await.unwrap_or(false) {
            fs::create_dir_all(ns.dir())
                .await
                .context(format!("Failed to create namespace {}", ns.dir().display()))?;
            info!(namespace = ns.name(), path = %ns.dir().display(), "Created namespace directory");
        }
        Ok(ns)
    }

    /// Returns `true` iff `candidate` resolves strictly inside the storage root.
    /// Relative candidates are taken relative to the root.
    #[must_use]
    pub fn is_contained(&self, candidate: impl AsRef<Path>) -> bool {
        security::is_contained(&self.root, candidate.as_ref())
    }

    /// Removes staged leftovers of interrupted writes.
    pub async fn purge_staging(&self) {
        maintenance::purge_tmp(&self.staging).await;
    }

    /// Publishes `data` at `target` without ever replacing an existing file.
    pub(crate) async fn publish(&self, target: &Path, data: &[u8]) -> Result<(), StorageError> {
        let staged = self.stage(data).await?;

        let linked = fs::hard_link(&staged, target).await;
        if let Err(err) = fs::remove_file(&staged).await {
            warn!(path = %staged.display(), error = %err, "Failed to remove staged file");
        }

        match linked {
            Ok(()) => {},
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(already_exists(target));
            },
            Err(err) if links_unavailable(err.kind()) => {
                debug!(path = %target.display(), error = %err, "Hard link unavailable, writing in place");
                write_exclusive(target, data).await?;
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Publish failed: {}", target.display()).into()),
                });
            },
        }

        if let Some(parent) = target.parent() {
            sync_dir(parent).await;
        }

        debug!(path = %target.display(), bytes = data.len(), "File published");
        Ok(())
    }

    async fn stage(&self, data: &[u8]) -> Result<PathBuf, StorageError> {
        let counter = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let staged = self.staging.join(format!("{}.{counter}{TMP_MARKER}", std::process::id()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&staged)
            .await
            .context(format!("Temp creation failed: {}", staged.display()))?;
        file.write_all(data).await.context("Write failed")?;
        file.sync_all().await.context("Hardware sync failed")?;

        Ok(staged)
    }
}

async fn write_exclusive(target: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = match fs::OpenOptions::new().create_new(true).write(true).open(target).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Err(already_exists(target)),
        Err(err) => {
            return Err(StorageError::Io {
                source: err,
                context: Some(format!("Create failed: {}", target.display()).into()),
            });
        },
    };

    file.write_all(data).await.context("Write failed")?;
    file.sync_all().await.context("Hardware sync failed")?;
    Ok(())
}

fn already_exists(target: &Path) -> StorageError {
    StorageError::AlreadyExists { message: target.display().to_string().into(), context: None }
}

pub(crate) async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

/// Link failures that call for a direct exclusive write instead.
const fn links_unavailable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Unsupported | ErrorKind::CrossesDevices)
}
