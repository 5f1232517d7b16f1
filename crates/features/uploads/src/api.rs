//! HTTP surface of the uploads slice.

use crate::{UploadedFile, Uploads, UploadsError};
use axum::body::Body;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, FromRef, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use stash_domain::constants::{FILE_FIELD, NAMESPACE_HEADER, UPLOADS_TAG};
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Headroom for multipart framing on top of the file size limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Public URL of the stored file.
    pub url: String,
}

/// Multipart form of an upload.
#[allow(dead_code)]
#[derive(ToSchema)]
struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/api/upload",
    params(
        ("x-namespace" = Option<String>, Header, description = "Target namespace, the default namespace when absent"),
        ("authorization" = String, Header, description = "Raw token of the target namespace"),
    ),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = OK, description = "File stored", body = UploadResponse),
        (status = BAD_REQUEST, description = "Unknown or unreadable namespace, or missing file part", body = String),
        (status = UNAUTHORIZED, description = "Missing or invalid token", body = String),
        (status = PAYLOAD_TOO_LARGE, description = "File exceeds the size limit", body = String),
    ),
    tag = UPLOADS_TAG,
)]
pub(crate) async fn upload_handler(
    State(uploads): State<Uploads>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadsError> {
    let namespace = namespace_header(&headers)?;
    let token = headers.get(header::AUTHORIZATION).and_then(|value| value.to_str().ok());
    let namespace = uploads.admit(namespace, token)?;

    let mut multipart =
        multipart.map_err(|rejection| UploadsError::bad_request(rejection.body_text()))?;
    let file = read_file_part(&mut multipart).await?;

    let stored = uploads.store(namespace, file).await?;
    Ok(Json(UploadResponse { url: uploads.url_for(&stored) }))
}

/// Serves a stored file as `<namespace>/<file>` or `<file>` in the default namespace.
pub(crate) async fn retrieve_handler(
    State(uploads): State<Uploads>,
    Path(path): Path<String>,
) -> Result<Response, UploadsError> {
    let retrieved = uploads.retrieve(&path).await?;
    let mime = mime_guess::from_path(&retrieved.file_name).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(retrieved.object.len));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    let stream = ReaderStream::new(retrieved.object.file);
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

/// Documented `/api` routes of the slice, with the request body capped at the file limit
/// plus multipart overhead.
pub fn api_router<S>(max_file_size_bytes: u64) -> OpenApiRouter<S>
where
    S: Clone + Send + Sync + 'static,
    Uploads: FromRef<S>,
{
    let limit = usize::try_from(max_file_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    OpenApiRouter::new().routes(routes!(upload_handler)).layer(DefaultBodyLimit::max(limit))
}

/// Catch-all retrieval route. Merge it last so it never shadows other routes.
pub fn file_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Uploads: FromRef<S>,
{
    Router::new().route("/{*path}", get(retrieve_handler))
}

/// A present but unreadable namespace header is rejected rather than treated as absent.
fn namespace_header(headers: &HeaderMap) -> Result<Option<&str>, UploadsError> {
    headers
        .get(NAMESPACE_HEADER)
        .map(|value| {
            value.to_str().map_err(|_| UploadsError::bad_request("The namespace header is not valid text"))
        })
        .transpose()
}

async fn read_file_part(multipart: &mut Multipart) -> Result<UploadedFile, UploadsError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(original_filename) = field.file_name().map(ToOwned::to_owned) else {
            continue;
        };
        let declared_mime = field.content_type().unwrap_or_default().to_owned();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(UploadedFile { bytes, declared_mime, original_filename });
    }

    Err(UploadsError::bad_request("No file found in the request"))
}

fn multipart_error(err: MultipartError) -> UploadsError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadsError::payload_too_large("Request body exceeds the upload size limit")
    } else {
        UploadsError::bad_request(err.body_text())
    }
}
