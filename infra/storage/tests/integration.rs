use proptest::prelude::*;
use stash_storage::*;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

async fn storage(temp: &TempDir) -> Storage {
    Storage::builder().root(temp.path().join("uploads")).connect().await.unwrap()
}

#[tokio::test]
async fn test_path_traversal_blocked() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();

    assert!(matches!(ns.resolve("../etc/passwd"), Err(StorageError::PathTraversalAttempt { .. })));
    assert!(matches!(ns.resolve("a/b.png"), Err(StorageError::PathTraversalAttempt { .. })));
    assert!(matches!(ns.resolve(".."), Err(StorageError::PathTraversalAttempt { .. })));
    assert!(matches!(ns.resolve("."), Err(StorageError::PathTraversalAttempt { .. })));
    assert!(matches!(ns.resolve("/etc/passwd"), Err(StorageError::PathTraversalAttempt { .. })));
    assert!(matches!(ns.resolve(""), Err(StorageError::InvalidName { .. })));

    assert!(ns.write_new("../escape.txt", b"x").await.is_err());
    assert!(!storage.root().join("escape.txt").exists());
}

#[tokio::test]
async fn test_resolve_stays_in_namespace_dir() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("media").await.unwrap();

    let resolved = ns.resolve("abc123.png").unwrap();
    assert_eq!(resolved, storage.root().join("media").join("abc123.png"));
    assert!(ns.is_contained(&resolved));
    assert!(!ns.is_contained(ns.dir()));
    assert!(!ns.is_contained(storage.root().join("other").join("abc123.png")));
}

#[tokio::test]
async fn test_namespace_validation() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;

    assert!(storage.namespace("user_a-1").is_ok());
    assert!(matches!(storage.namespace(""), Err(StorageError::InvalidName { .. })));
    assert!(matches!(storage.namespace("../up"), Err(StorageError::InvalidName { .. })));
    assert!(matches!(storage.namespace(STAGING_DIR), Err(StorageError::InvalidName { .. })));
}

#[tokio::test]
async fn test_namespace_isolation() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;

    let ns_a = storage.ensure_namespace("a").await.unwrap();
    let ns_b = storage.ensure_namespace("b").await.unwrap();

    ns_a.write_new("photo.png", b"a").await.unwrap();
    ns_b.write_new("photo.png", b"b").await.unwrap();

    assert_eq!(ns_a.read("photo.png").await.unwrap(), b"a");
    assert_eq!(ns_b.read("photo.png").await.unwrap(), b"b");
}

#[tokio::test]
async fn test_write_new_never_overwrites() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();

    ns.write_new("taken.txt", b"first").await.unwrap();
    let err = ns.write_new("taken.txt", b"second").await.unwrap_err();

    assert!(matches!(err, StorageError::AlreadyExists { .. }));
    assert_eq!(ns.read("taken.txt").await.unwrap(), b"first");
}

#[tokio::test]
async fn test_staging_is_left_clean() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();

    ns.write_new("one.bin", b"1").await.unwrap();
    let _ = ns.write_new("one.bin", b"2").await;

    let staged = std::fs::read_dir(storage.root().join(STAGING_DIR)).unwrap().count();
    assert_eq!(staged, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exclusive_writes_have_single_winner() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = Arc::new(storage.ensure_namespace("k").await.unwrap());

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let ns = Arc::clone(&ns);
        handles.push(tokio::spawn(async move { ns.write_new("race.bin", &[i; 64]).await }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners.push(()),
            Err(StorageError::AlreadyExists { .. }) => {},
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let data = ns.read("race.bin").await.unwrap();
    assert_eq!(data.len(), 64);
    assert!(data.iter().all(|b| *b == data[0]), "published file must not be interleaved");
}

#[tokio::test]
async fn test_count_matching_semantics() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();

    for name in ["a.png", "b.png", "c.jpg", "noext", "archive.tar.gz"] {
        ns.write_new(name, b"x").await.unwrap();
    }
    std::fs::create_dir(ns.dir().join("dir.png")).unwrap();

    assert_eq!(ns.count_matching(".png").await.unwrap(), 2);
    assert_eq!(ns.count_matching(".jpg").await.unwrap(), 1);
    assert_eq!(ns.count_matching(".gz").await.unwrap(), 1);
    assert_eq!(ns.count_matching("").await.unwrap(), 1);
    assert_eq!(ns.count_matching(".webp").await.unwrap(), 0);
}

#[tokio::test]
async fn test_count_matching_missing_directory() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.namespace("never_created").unwrap();

    assert!(matches!(ns.count_matching(".png").await, Err(StorageError::DirectoryNotFound { .. })));
}

#[tokio::test]
async fn test_open_streams_exact_bytes() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();

    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    ns.write_new("blob.bin", &payload).await.unwrap();

    let mut object = ns.open("blob.bin").await.unwrap();
    assert_eq!(object.len, 10_000);

    let mut read_back = Vec::new();
    object.file.read_to_end(&mut read_back).await.unwrap();
    assert_eq!(read_back, payload);
}

#[tokio::test]
async fn test_open_missing_and_exists() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();

    assert!(!ns.exists("missing.png").await.unwrap());
    assert!(matches!(ns.open("missing.png").await, Err(StorageError::FileNotFound { .. })));

    std::fs::create_dir(ns.dir().join("folder")).unwrap();
    assert!(!ns.exists("folder").await.unwrap());
    assert!(matches!(ns.open("folder").await, Err(StorageError::FileNotFound { .. })));
}

#[tokio::test]
async fn test_root_containment() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;

    assert!(storage.is_contained("k"));
    assert!(!storage.is_contained(".."));
    assert!(!storage.is_contained("../../etc"));
    assert!(!storage.is_contained(storage.root()));
}

#[tokio::test]
async fn test_connect_without_create_fails_for_missing_root() {
    let temp = TempDir::new().unwrap();
    let result = Storage::builder().root(temp.path().join("missing")).create(false).connect().await;

    assert!(matches!(result, Err(StorageError::Io { .. })));
}

#[tokio::test]
async fn test_recent_staged_files_survive_reconnect() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let staged = storage.root().join(STAGING_DIR).join("99.1.stashtmp");
    std::fs::write(&staged, b"partial").unwrap();

    let _again = Storage::builder().root(temp.path().join("uploads")).connect().await.unwrap();

    assert!(staged.exists(), "fresh staged files belong to in-flight writes");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_is_rejected() {
    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), b"secret").unwrap();

    let storage = storage(&temp).await;
    let ns = storage.ensure_namespace("k").await.unwrap();
    std::os::unix::fs::symlink(outside.path().join("secret.txt"), ns.dir().join("link.txt"))
        .unwrap();

    assert!(!ns.is_contained(ns.dir().join("link.txt")));
    assert!(matches!(ns.open("link.txt").await, Err(StorageError::PathTraversalAttempt { .. })));
}

proptest! {
    #[test]
    fn prop_resolved_names_stay_inside(name in "[A-Za-z0-9._/-]{1,24}") {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let temp = TempDir::new().unwrap();
        let ns = rt.block_on(async {
            let storage = Storage::builder().root(temp.path()).connect().await.unwrap();
            storage.ensure_namespace("k").await.unwrap()
        });

        if let Ok(resolved) = ns.resolve(&name) {
            prop_assert!(resolved.starts_with(ns.dir()));
            prop_assert_ne!(resolved.as_path(), ns.dir());
            prop_assert_eq!(resolved.parent(), Some(ns.dir()));
        }
    }
}
