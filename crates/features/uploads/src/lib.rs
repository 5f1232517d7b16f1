//! Uploads feature slice.
//!
//! Files are pushed into a namespace with its shared token, receive a short random
//! name that is unique within the namespace, and are served back at
//! `<base url><namespace>/<name><extension>`.
//!
//! ```rust,no_run
//! use stash_domain::config::ApiConfig;
//! use stash_uploads::{UploadRequest, UploadedFile, Uploads};
//!
//! # async fn run() -> Result<(), stash_uploads::UploadsError> {
//! let uploads = Uploads::connect(&ApiConfig::default()).await?;
//!
//! let url = uploads
//!     .upload(UploadRequest {
//!         namespace: None,
//!         auth_token: Some("change_me".to_owned()),
//!         file: Some(UploadedFile {
//!             bytes: "hello".into(),
//!             declared_mime: "text/plain".to_owned(),
//!             original_filename: "hello.txt".to_owned(),
//!         }),
//!     })
//!     .await?;
//! assert!(url.ends_with(".txt"));
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "server")]
pub mod api;
mod error;
mod extension;
mod naming;
mod pipeline;
mod registry;

pub use error::{UploadsError, UploadsErrorExt};
pub use extension::{mime_extension, resolve_extension};
pub use naming::NameGenerator;
pub use pipeline::{MAX_PUBLISH_ATTEMPTS, RetrievedFile, UploadRequest, UploadedFile};
pub use registry::{Namespace, NamespaceRegistry};

use stash_domain::config::ApiConfig;
use stash_domain::constants::MAX_NAME_LENGTH;
use stash_domain::file::StoredFile;
use stash_storage::Storage;
use std::ops::Deref;
use std::sync::Arc;
use tracing::info;

/// Immutable upload policy derived from configuration.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Public base URL, always ending in `/`.
    pub base_url: String,
    pub default_namespace: String,
    pub char_length: usize,
    pub max_file_size_bytes: u64,
}

impl UploadSettings {
    /// # Errors
    /// Returns [`UploadsError::Config`] when `char_length` is outside `1..=32` or the size
    /// limit is zero.
    pub fn from_config(cfg: &ApiConfig) -> Result<Self, UploadsError> {
        let storage = &cfg.storage;

        if !(1..=MAX_NAME_LENGTH).contains(&storage.char_length) {
            return Err(UploadsError::config(format!(
                "char_length must be between 1 and {MAX_NAME_LENGTH}, got {}",
                storage.char_length
            )));
        }
        if storage.max_file_size_bytes == 0 {
            return Err(UploadsError::config("max_file_size_bytes must be greater than zero"));
        }

        let mut base_url = cfg.web.url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url,
            default_namespace: storage.default_namespace.clone(),
            char_length: storage.char_length,
            max_file_size_bytes: storage.max_file_size_bytes,
        })
    }
}

#[derive(Debug)]
pub struct UploadsInner {
    pub(crate) storage: Storage,
    pub(crate) registry: NamespaceRegistry,
    pub(crate) names: NameGenerator,
    pub(crate) settings: UploadSettings,
}

/// Shared handle of the uploads slice; cloning is inexpensive.
#[derive(Debug, Clone)]
pub struct Uploads {
    inner: Arc<UploadsInner>,
}

impl Deref for Uploads {
    type Target = UploadsInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Uploads {
    /// Connects the uploads root and creates a directory for every configured namespace.
    ///
    /// # Errors
    /// Returns [`UploadsError::Config`] for an invalid configuration and
    /// [`UploadsError::Storage`] if the directories cannot be prepared.
    pub async fn connect(cfg: &ApiConfig) -> Result<Self, UploadsError> {
        let settings = UploadSettings::from_config(cfg)?;
        let storage = Storage::builder()
            .root(&cfg.storage.uploads_dir)
            .create(true)
            .connect()
            .await
            .context("Failed to prepare uploads root")?;

        Self::with_storage(storage, cfg, settings).await
    }

    /// Builds the slice over an already connected [`Storage`].
    ///
    /// # Errors
    /// Same as [`connect`](Self::connect).
    pub async fn with_storage(
        storage: Storage,
        cfg: &ApiConfig,
        settings: UploadSettings,
    ) -> Result<Self, UploadsError> {
        let registry =
            NamespaceRegistry::new(&cfg.namespaces, &settings.default_namespace, &storage)?;

        for ns in registry.iter() {
            storage.ensure_namespace(ns.id()).await?;
        }

        info!(
            namespaces = registry.len(),
            root = %storage.root().display(),
            "Uploads slice initialized"
        );

        Ok(Self {
            inner: Arc::new(UploadsInner {
                storage,
                registry,
                names: NameGenerator::new(),
                settings,
            }),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Public URL of a stored file.
    #[must_use]
    pub fn url_for(&self, file: &StoredFile) -> String {
        format!("{}{}/{}", self.settings.base_url, file.namespace, file.file_name())
    }
}
