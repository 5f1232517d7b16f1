use config::{Config, Environment, File, FileFormat};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tracing::info;

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "STASH";

/// Custom error type for config loading.
#[stash_derive::stash_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Config serialization error{}: {source}", format_context(.context))]
    Serialize { source: toml::ser::Error, context: Option<Cow<'static, str>> },

    #[error("Config file I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}

/// A reusable configuration loader that combines a TOML file with environment overrides.
///
/// This function implements a layered configuration strategy:
/// 1. **Base File**: Loads settings from the TOML file at `path`.
/// 2. **Environment Overrides**: Overlays values from environment variables prefixed with `STASH__`.
///    Nested structures are accessed using double underscores (e.g., `STASH__SERVER__PORT` maps to `server.port`).
///
/// # Errors
/// This function will return an error if:
/// * The configuration file cannot be found or parsed.
/// * The content of the file does not match the structure of type `T`.
///
/// # Example
/// ```rust
/// use stash_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// let cfg: AppConfig = load_config("config/local.toml").unwrap_or_default();
/// ```
pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();

    let builder = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        );

    info!("Loading config from {}", path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

/// Loads the configuration at `path`, first writing the serialized defaults of `T`
/// there when no file exists yet.
///
/// # Errors
/// Returns [`ConfigError::Serialize`] or [`ConfigError::Io`] if the default file cannot be
/// written, and any error of [`load_config`].
pub fn init_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Serialize + Default,
{
    let path = path.as_ref();

    if !path.exists() {
        let rendered = toml::to_string_pretty(&T::default()).context("Rendering defaults")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, rendered)
            .context(format!("Failed to write default config to {}", path.display()))?;
        info!(path = %path.display(), "Wrote default configuration");
    }

    load_config(path)
}
