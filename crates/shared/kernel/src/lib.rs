//! Kernel utilities shared across slices.
//! Keep this crate lightweight; it re-exports ergonomic helpers for names, config loading, and system routes.
//!
//! ## Name generation
//! Use `random_name!` for filesystem-safe alphanumeric names:
//! ```rust
//! # use stash_kernel::random_name;
//! let name = random_name!(6);
//! assert_eq!(name.len(), 6);
//! ```
//!
//! ## Config loading
//! ```rust,ignore
//! use stash_kernel::config::init_config;
//! let cfg: stash_kernel::domain::config::ApiConfig = init_config("server.toml").unwrap();
//! ```
pub mod config;
#[cfg(feature = "server")]
pub mod server;

/// The 62 symbols generated names are drawn from: `A-Z`, `a-z`, `0-9`.
pub const NAME_ALPHABET: &[char; 62] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l',
    'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

pub use nanoid::nanoid;
pub use stash_domain as domain;

/// Draws a uniformly random name from [`NAME_ALPHABET`].
#[macro_export]
macro_rules! random_name {
    () => {
        $crate::nanoid!(6, $crate::NAME_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::NAME_ALPHABET)
    };
}
