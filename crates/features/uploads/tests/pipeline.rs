use stash_domain::config::{ApiConfig, NamespaceConfig};
use stash_uploads::{UploadRequest, UploadedFile, Uploads, UploadsError};
use std::collections::HashSet;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

fn config(temp: &TempDir) -> ApiConfig {
    let mut cfg = ApiConfig::default();
    cfg.storage.uploads_dir = temp.path().join("uploads");
    cfg.web.url = "https://files.example.com".to_owned();
    cfg.namespaces = vec![
        NamespaceConfig { id: "k".to_owned(), auth_token: "secret".to_owned() },
        NamespaceConfig { id: "media".to_owned(), auth_token: "media-token".to_owned() },
    ];
    cfg
}

fn request(namespace: Option<&str>, token: Option<&str>, mime: &str, name: &str, data: &[u8]) -> UploadRequest {
    UploadRequest {
        namespace: namespace.map(ToOwned::to_owned),
        auth_token: token.map(ToOwned::to_owned),
        file: Some(UploadedFile {
            bytes: data.to_vec().into(),
            declared_mime: mime.to_owned(),
            original_filename: name.to_owned(),
        }),
    }
}

fn stored_files(uploads: &Uploads, namespace: &str) -> Vec<String> {
    let dir = uploads.storage().root().join(namespace);
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn connect_creates_namespace_directories() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    assert!(uploads.storage().root().join("k").is_dir());
    assert!(uploads.storage().root().join("media").is_dir());
    assert_eq!(uploads.settings().base_url, "https://files.example.com/");
}

#[tokio::test]
async fn upload_then_retrieve_returns_identical_bytes() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();
    let payload = b"\x89PNG\r\n\x1a\nnot really a png".to_vec();

    let url = uploads
        .upload(request(Some("media"), Some("media-token"), "image/png", "shot", &payload))
        .await
        .unwrap();

    let path = url.strip_prefix("https://files.example.com/").unwrap();
    let (namespace, file_name) = path.split_once('/').unwrap();
    assert_eq!(namespace, "media");
    assert!(file_name.ends_with(".png"));
    assert_eq!(file_name.len(), 6 + ".png".len());

    let mut retrieved = uploads.retrieve(path).await.unwrap();
    assert_eq!(retrieved.object.len, payload.len() as u64);

    let mut body = Vec::new();
    retrieved.object.file.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, payload);
}

#[tokio::test]
async fn default_namespace_applies_to_upload_and_retrieval() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    let url = uploads.upload(request(None, Some("secret"), "", "notes", b"plain")).await.unwrap();
    let file_name = url.rsplit('/').next().unwrap();
    assert!(url.starts_with("https://files.example.com/k/"));
    assert!(!file_name.contains('.'));

    let retrieved = uploads.retrieve(file_name).await.unwrap();
    assert_eq!(retrieved.namespace, "k");

    let empty = uploads.upload(request(Some(""), Some("secret"), "", "x", b"y")).await.unwrap();
    assert!(empty.starts_with("https://files.example.com/k/"));
}

#[tokio::test]
async fn unknown_namespace_is_a_bad_request() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    let err = uploads.upload(request(Some("nope"), Some("secret"), "", "a", b"x")).await.unwrap_err();
    assert!(matches!(err, UploadsError::BadRequest { .. }));
}

#[tokio::test]
async fn invalid_or_missing_token_is_rejected_without_writing() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    let wrong = uploads.upload(request(Some("k"), Some("media-token"), "", "a", b"x")).await;
    let missing = uploads.upload(request(Some("k"), None, "", "a", b"x")).await;

    assert!(matches!(wrong, Err(UploadsError::Unauthorized { .. })));
    assert!(matches!(missing, Err(UploadsError::Unauthorized { .. })));
    assert_eq!(wrong.unwrap_err().status_code(), 401);
    assert!(stored_files(&uploads, "k").is_empty());
}

#[tokio::test]
async fn missing_file_part_is_a_bad_request() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    let request = UploadRequest { namespace: None, auth_token: Some("secret".to_owned()), file: None };
    let err = uploads.upload(request).await.unwrap_err();
    assert!(matches!(err, UploadsError::BadRequest { .. }));
}

#[tokio::test]
async fn oversized_file_is_rejected_without_writing() {
    let temp = TempDir::new().unwrap();
    let mut cfg = config(&temp);
    cfg.storage.max_file_size_bytes = 8;
    let uploads = Uploads::connect(&cfg).await.unwrap();

    let err = uploads
        .upload(request(None, Some("secret"), "text/plain", "a.txt", b"123456789"))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadsError::PayloadTooLarge { .. }));
    assert_eq!(err.status_code(), 413);
    assert!(stored_files(&uploads, "k").is_empty());

    let ok = uploads.upload(request(None, Some("secret"), "text/plain", "a.txt", b"12345678")).await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn path_like_file_names_are_stored_inside_the_namespace() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    for original in ["a../evil", "../../etc/passwd", "dir.d\\shot.jpg"] {
        let url = uploads
            .upload(request(None, Some("secret"), "", original, b"data"))
            .await
            .unwrap_or_else(|err| panic!("{original}: {err}"));
        let file_name = url.strip_prefix("https://files.example.com/k/").unwrap();
        assert!(!file_name.contains(['/', '\\']), "{file_name}");
    }

    let mut names = stored_files(&uploads, "k");
    names.sort_unstable();
    assert_eq!(names.len(), 3);
    assert_eq!(names.iter().filter(|name| name.ends_with(".jpg")).count(), 1);
}

#[tokio::test]
async fn saturated_length_widens_generated_names() {
    let temp = TempDir::new().unwrap();
    let mut cfg = config(&temp);
    cfg.storage.char_length = 1;
    let uploads = Uploads::connect(&cfg).await.unwrap();

    let dir = uploads.storage().root().join("k");
    for ch in ('A'..='Z').chain('a'..='z').chain('0'..='9') {
        std::fs::write(dir.join(format!("{ch}.txt")), b"x").unwrap();
    }

    let url = uploads.upload(request(None, Some("secret"), "text/plain", "a", b"new")).await.unwrap();
    let file_name = url.rsplit('/').next().unwrap();
    let name = file_name.strip_suffix(".txt").unwrap();
    assert!(name.len() >= 2, "expected a widened name, got {name}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_uploads_never_share_a_name() {
    let temp = TempDir::new().unwrap();
    let mut cfg = config(&temp);
    cfg.storage.char_length = 1;
    let uploads = Uploads::connect(&cfg).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..48u32 {
        let uploads = uploads.clone();
        handles.push(tokio::spawn(async move {
            let data = i.to_le_bytes();
            let url = uploads.upload(request(None, Some("secret"), "image/png", "p", &data)).await?;
            Ok::<_, UploadsError>((url, data))
        }));
    }

    let mut urls = HashSet::new();
    for handle in handles {
        let (url, data) = handle.await.unwrap().unwrap();
        let path = url.strip_prefix("https://files.example.com/").unwrap().to_owned();

        let mut retrieved = uploads.retrieve(&path).await.unwrap();
        let mut body = Vec::new();
        retrieved.object.file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, data, "{path} was overwritten");

        assert!(urls.insert(url), "duplicate url handed out");
    }

    assert_eq!(stored_files(&uploads, "k").len(), 48);
}

#[tokio::test]
async fn traversal_attempts_are_unauthorized() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();
    std::fs::write(temp.path().join("secret.txt"), b"top secret").unwrap();

    for path in ["../secret.txt", "../../etc/passwd", "k/../../secret.txt", "k/..", "k/.", "/../secret.txt"] {
        let err = uploads.retrieve(path).await.unwrap_err();
        assert!(matches!(err, UploadsError::Unauthorized { .. }), "{path} -> {err}");
    }
}

#[tokio::test]
async fn unknown_namespace_or_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let uploads = Uploads::connect(&config(&temp)).await.unwrap();

    for path in ["nope/file.png", "k/missing.png", "missing.png", "k/", "a/b/c.png"] {
        let err = uploads.retrieve(path).await.unwrap_err();
        assert!(matches!(err, UploadsError::NotFound { .. }), "{path} -> {err}");
    }
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let temp = TempDir::new().unwrap();

    let mut cfg = config(&temp);
    cfg.storage.default_namespace = "missing".to_owned();
    assert!(matches!(Uploads::connect(&cfg).await, Err(UploadsError::Config { .. })));

    let mut cfg = config(&temp);
    cfg.storage.char_length = 0;
    assert!(matches!(Uploads::connect(&cfg).await, Err(UploadsError::Config { .. })));

    let mut cfg = config(&temp);
    cfg.storage.max_file_size_bytes = 0;
    assert!(matches!(Uploads::connect(&cfg).await, Err(UploadsError::Config { .. })));
}
