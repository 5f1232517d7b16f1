//! Upload and retrieval workflows, one pass per request.

use crate::Uploads;
use crate::error::UploadsError;
use crate::extension::resolve_extension;
use crate::registry::Namespace;
use bytes::Bytes;
use stash_domain::file::StoredFile;
use stash_storage::{StorageError, StoredObject};
use tracing::{debug, error, info, warn};

/// Exclusive publish attempts before an upload is failed.
pub const MAX_PUBLISH_ATTEMPTS: usize = 16;

/// The file part of an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub bytes: Bytes,
    pub declared_mime: String,
    pub original_filename: String,
}

/// A complete, already-buffered upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Target namespace; the default namespace when `None` or empty.
    pub namespace: Option<String>,
    pub auth_token: Option<String>,
    pub file: Option<UploadedFile>,
}

/// A file located by a retrieval request, opened for streaming.
#[derive(Debug)]
pub struct RetrievedFile {
    pub namespace: String,
    pub file_name: String,
    pub object: StoredObject,
}

impl Uploads {
    /// Runs the whole upload workflow and returns the public URL of the stored file.
    ///
    /// # Errors
    /// See [`admit`](Self::admit) and [`store`](Self::store); a missing file part is
    /// [`UploadsError::BadRequest`].
    pub async fn upload(&self, request: UploadRequest) -> Result<String, UploadsError> {
        let namespace = self.admit(request.namespace.as_deref(), request.auth_token.as_deref())?;
        let file = request.file.ok_or_else(|| UploadsError::bad_request("No file found in the request"))?;
        let stored = self.store(namespace, file).await?;
        Ok(self.url_for(&stored))
    }

    /// Resolves the target namespace and checks the presented token.
    ///
    /// Runs before the request body is read.
    ///
    /// # Errors
    /// [`UploadsError::BadRequest`] for an unknown namespace and
    /// [`UploadsError::Unauthorized`] for a missing or wrong token.
    pub fn admit(
        &self,
        namespace: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<&Namespace, UploadsError> {
        let id = self.namespace_or_default(namespace);

        let Some(ns) = self.registry.get(id) else {
            return Err(UploadsError::bad_request(format!("The namespace \"{id}\" doesn't exist")));
        };

        match auth_token {
            Some(token) if self.registry.authorize(id, token) => Ok(ns),
            presented => {
                error!(
                    namespace = id,
                    token = presented.unwrap_or("<none>"),
                    "Attempted unauthorized upload"
                );
                Err(UploadsError::unauthorized("Invalid authorization token"))
            },
        }
    }

    /// Names and persists an admitted file.
    ///
    /// A name is allocated before the size check, so an oversized file fails with
    /// nothing written. Lost publish races are retried with a fresh name.
    ///
    /// # Errors
    /// [`UploadsError::PayloadTooLarge`] above the configured limit, and
    /// [`UploadsError::Internal`] or [`UploadsError::Storage`] on allocation or disk failure.
    pub async fn store(
        &self,
        namespace: &Namespace,
        file: UploadedFile,
    ) -> Result<StoredFile, UploadsError> {
        let store = namespace.store();
        let extension = resolve_extension(&file.declared_mime, &file.original_filename);
        let size_bytes = file.bytes.len() as u64;

        let mut name = self.names.generate(store, &extension, self.settings.char_length).await?;

        if size_bytes > self.settings.max_file_size_bytes {
            return Err(UploadsError::payload_too_large(format!(
                "File size of {size_bytes} bytes is too large"
            )));
        }

        info!(namespace = namespace.id(), size = size_bytes, "Uploading file");

        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            let file_name = format!("{name}{extension}");
            match store.write_new(&file_name, &file.bytes).await {
                Ok(_) => {
                    info!(namespace = namespace.id(), file = %file_name, size = size_bytes, "File written to disk");
                    return Ok(StoredFile {
                        namespace: namespace.id().to_owned(),
                        name,
                        extension,
                        size_bytes,
                    });
                },
                Err(StorageError::AlreadyExists { .. }) => {
                    warn!(namespace = namespace.id(), file = %file_name, attempt, "Name taken concurrently, retrying");
                    name = self.names.generate(store, &extension, self.settings.char_length).await?;
                },
                Err(err) => return Err(err.into()),
            }
        }

        Err(UploadsError::Internal {
            message: "Could not publish the uploaded file".into(),
            context: Some(format!("{MAX_PUBLISH_ATTEMPTS} publish attempts collided").into()),
        })
    }

    /// Locates and opens the file addressed by `raw_path` (`<namespace>/<file>` or `<file>`).
    ///
    /// # Errors
    /// [`UploadsError::Unauthorized`] when the path escapes the uploads root or the
    /// namespace directory, [`UploadsError::NotFound`] for an unknown namespace or file.
    pub async fn retrieve(&self, raw_path: &str) -> Result<RetrievedFile, UploadsError> {
        let (segment, file_name) = split_request_path(raw_path);

        if !segment.is_empty() && !self.storage.is_contained(segment) {
            return Err(traversal(raw_path));
        }

        let namespace_id = self.namespace_or_default(Some(segment));
        let Some(namespace) = self.registry.get(namespace_id) else {
            return Err(UploadsError::not_found(format!(
                "Namespace \"{namespace_id}\" does not exist"
            )));
        };

        if file_name.is_empty() {
            return Err(UploadsError::not_found("No file name given"));
        }

        let store = namespace.store();
        if !store.is_contained(store.dir().join(file_name)) {
            return Err(traversal(raw_path));
        }

        let object = match store.open(file_name).await {
            Ok(object) => object,
            Err(StorageError::FileNotFound { .. } | StorageError::InvalidName { .. }) => {
                return Err(UploadsError::not_found(format!(
                    "File \"{file_name}\" does not exist in namespace \"{namespace_id}\""
                )));
            },
            Err(StorageError::PathTraversalAttempt { .. }) => return Err(traversal(raw_path)),
            Err(err) => return Err(err.into()),
        };

        debug!(namespace = namespace_id, file = file_name, size = object.len, "Serving file");

        Ok(RetrievedFile {
            namespace: namespace_id.to_owned(),
            file_name: file_name.to_owned(),
            object,
        })
    }

    fn namespace_or_default<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.filter(|ns| !ns.is_empty()).unwrap_or(&self.settings.default_namespace)
    }
}

/// Splits a request path into its directory part (the namespace) and its leaf.
pub(crate) fn split_request_path(raw_path: &str) -> (&str, &str) {
    let path = raw_path.trim_start_matches('/');
    path.rsplit_once('/').unwrap_or(("", path))
}

fn traversal(raw_path: &str) -> UploadsError {
    warn!(path = raw_path, "Rejected retrieval outside the uploads root");
    UploadsError::unauthorized("Unusual file path... path traversal?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_paths_split_on_last_separator() {
        assert_eq!(split_request_path("k/abc.png"), ("k", "abc.png"));
        assert_eq!(split_request_path("/k/abc.png"), ("k", "abc.png"));
        assert_eq!(split_request_path("abc.png"), ("", "abc.png"));
        assert_eq!(split_request_path("../../etc/passwd"), ("../../etc", "passwd"));
        assert_eq!(split_request_path("k/"), ("k", ""));
        assert_eq!(split_request_path("k/.."), ("k", ".."));
    }
}
