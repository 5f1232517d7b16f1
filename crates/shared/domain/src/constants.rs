/// `OpenAPI` tag for system endpoints.
pub const SYSTEM_TAG: &str = "System";
/// `OpenAPI` tag for upload endpoints.
pub const UPLOADS_TAG: &str = "Uploads";

/// Header selecting the target namespace of an upload.
pub const NAMESPACE_HEADER: &str = "x-namespace";
/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Upper bound for generated file name length.
pub const MAX_NAME_LENGTH: usize = 32;
