//! Extension resolution: canonical extension of a declared MIME type, falling back to
//! the uploaded file name.

/// Canonical extension (without the dot) for a MIME type, ignoring parameters and case.
///
/// The canonical extension is the first one mime-db lists for the type.
#[must_use]
pub fn mime_extension(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }
    mime2ext::mime2ext(essence.as_str())
}

/// Resolves the extension stored with an upload, leading dot included.
///
/// A recognized `declared_mime` wins; otherwise everything from the last dot of the final
/// path component of `original_filename` is used, or nothing when it has no dot.
///
/// ```rust
/// use stash_uploads::resolve_extension;
///
/// assert_eq!(resolve_extension("image/png", "photo"), ".png");
/// assert_eq!(resolve_extension("application/x-unknown", "archive.tar.gz"), ".gz");
/// assert_eq!(resolve_extension("", "noext"), "");
/// ```
#[must_use]
pub fn resolve_extension(declared_mime: &str, original_filename: &str) -> String {
    if let Some(ext) = mime_extension(declared_mime) {
        return format!(".{ext}");
    }

    // Clients may send a full path as the file name.
    let base = original_filename.rsplit(['/', '\\']).next().unwrap_or_default();
    base.rfind('.').map(|idx| base[idx..].to_owned()).unwrap_or_default()
}
