//! A sandboxed, flat-namespace file store.
//!
//! # Core Features
//!
//! - **Sandbox Security**: every resolved path must be a strict descendant of its
//!   namespace directory, checked both lexically and against the canonical on-disk path.
//! - **Exclusive Writes**: bytes are staged and synced, then published with a hard link
//!   that fails instead of replacing an existing file.
//! - **Streaming Reads**: [`NamespacedStorage::open`] hands out an async file handle.
//! - **Self-Healing**: stale staged files of interrupted writes are removed on startup.
//!
//! # Examples
//!
//! ```rust
//! use stash_storage::{Storage, StorageError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("uploads");
//!     let storage = Storage::builder().root(&root).connect().await?;
//!     let ns = storage.ensure_namespace("k").await?;
//!
//!     ns.write_new("abc123.txt", b"hello").await?;
//!     assert_eq!(ns.read("abc123.txt").await?, b"hello");
//!     assert_eq!(ns.count_matching(".txt").await?, 1);
//!
//!     // Layout on disk: <root>/k/abc123.txt
//!     assert!(ns.resolve("../abc123.txt").is_err());
//!     Ok(())
//! }
//! ```

mod builder;
mod engine;
mod error;
mod maintenance;
mod namespace;
mod security;

pub use builder::StorageBuilder;
pub use engine::{STAGING_DIR, Storage};
pub use error::{StorageError, StorageErrorExt};
pub use namespace::{NamespaceName, NamespacedStorage, StoredObject};
