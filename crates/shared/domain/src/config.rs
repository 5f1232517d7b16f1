use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfigInner {
    pub server: ServerConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub namespaces: Vec<NamespaceConfig>,
    pub logging: LoggingConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(flatten, default)]
    inner: Arc<ApiConfigInner>,
}

impl Deref for ApiConfig {
    type Target = ApiConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ApiConfig {
    fn deref_mut(&mut self) -> &mut ApiConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
}

/// Public-facing URLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Base URL prepended to `<namespace>/<file>` in upload responses.
    pub url: String,
    /// Target of the `GET /` redirect.
    pub redirect_to: String,
}

/// Upload storage knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
    pub default_namespace: String,
    /// Initial length of generated file names.
    pub char_length: usize,
    pub max_file_size_bytes: u64,
}

/// A storage bucket and the shared secret that guards uploads into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamespaceConfig {
    pub id: String,
    pub auth_token: String,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Rolling log files are written here when set.
    pub directory: Option<PathBuf>,
    pub json: bool,
}

// --- Default ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 3000 }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/".to_owned(),
            redirect_to: "https://github.com/celerry/sxcu".to_owned(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            default_namespace: "k".to_owned(),
            char_length: 6,
            max_file_size_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self { id: "k".to_owned(), auth_token: "change_me".to_owned() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), directory: None, json: false }
    }
}

impl Default for ApiConfigInner {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            namespaces: vec![NamespaceConfig::default()],
            logging: LoggingConfig::default(),
        }
    }
}
