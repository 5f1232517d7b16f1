use crate::error::UploadsError;
use fxhash::FxHashMap;
use stash_domain::config::NamespaceConfig;
use stash_storage::{NamespacedStorage, Storage};
use std::fmt;

/// A configured namespace: its shared secret and its storage directory.
#[derive(Clone)]
pub struct Namespace {
    id: String,
    auth_token: String,
    store: NamespacedStorage,
}

impl Namespace {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn store(&self) -> &NamespacedStorage {
        &self.store
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("auth_token", &"<redacted>")
            .field("dir", &self.store.dir())
            .finish()
    }
}

/// Immutable table of configured namespaces, built once at startup.
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    namespaces: FxHashMap<String, Namespace>,
}

impl NamespaceRegistry {
    /// Validates the namespace table and binds every entry to its directory under `storage`.
    ///
    /// # Errors
    /// Returns [`UploadsError::Config`] for an empty table, a malformed or duplicated id,
    /// or when `default_namespace` is not among the configured ones.
    pub fn new(
        configs: &[NamespaceConfig],
        default_namespace: &str,
        storage: &Storage,
    ) -> Result<Self, UploadsError> {
        if configs.is_empty() {
            return Err(UploadsError::config("At least one namespace must be configured"));
        }

        let mut namespaces = FxHashMap::default();
        for cfg in configs {
            let store = storage
                .namespace(cfg.id.as_str())
                .map_err(|_| UploadsError::config(format!("Invalid namespace id \"{}\"", cfg.id)))?;

            let namespace =
                Namespace { id: cfg.id.clone(), auth_token: cfg.auth_token.clone(), store };

            if namespaces.insert(cfg.id.clone(), namespace).is_some() {
                return Err(UploadsError::config(format!("Duplicate namespace id \"{}\"", cfg.id)));
            }
        }

        if !namespaces.contains_key(default_namespace) {
            return Err(UploadsError::config(format!(
                "Default namespace \"{default_namespace}\" is not configured"
            )));
        }

        Ok(Self { namespaces })
    }

    /// True iff a namespace with this id is configured.
    #[must_use]
    pub fn exists(&self, namespace_id: &str) -> bool {
        self.namespaces.contains_key(namespace_id)
    }

    /// True iff the namespace is configured and `presented_token` equals its token byte for byte.
    #[must_use]
    pub fn authorize(&self, namespace_id: &str, presented_token: &str) -> bool {
        self.namespaces
            .get(namespace_id)
            .is_some_and(|ns| ns.auth_token.as_bytes() == presented_token.as_bytes())
    }

    #[must_use]
    pub fn get(&self, namespace_id: &str) -> Option<&Namespace> {
        self.namespaces.get(namespace_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }
}
