use crate::error::StorageError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Collapse `.` / `..` lexically while ensuring the path never escapes the sandbox root.
///
/// Allows `..` as long as it doesn't go "above" the empty relative base.
pub(crate) fn normalize_relative(path: &Path) -> Result<PathBuf, StorageError> {
    let mut out = PathBuf::new();

    for c in path.components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(StorageError::PathTraversalAttempt {
                        message: path.display().to_string().into(),
                        context: Some("Path attempted to escape sandbox via '..'".into()),
                    });
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathTraversalAttempt {
                    message: path.display().to_string().into(),
                    context: Some("Absolute paths are not allowed in sandbox".into()),
                });
            },
        }
    }

    Ok(out)
}

/// Lexically normalizes an absolute path. `..` at the filesystem root stays at the root.
fn normalize_absolute(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }

    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::Prefix(_) | Component::RootDir => out.push(c.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            Component::Normal(seg) => out.push(seg),
        }
    }
    Some(out)
}

/// Resolves a single file name inside the flat directory `dir`.
///
/// The name must normalize to exactly one plain path segment, so neither
/// subdirectories nor `..` survive resolution.
pub(crate) fn resolve_entry(dir: &Path, name: &str) -> Result<PathBuf, StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName {
            message: "EMPTY".into(),
            context: Some("File name cannot be empty".into()),
        });
    }

    let normalized = normalize_relative(Path::new(name))?;
    let mut components = normalized.components();
    let (Some(Component::Normal(segment)), None) = (components.next(), components.next()) else {
        return Err(StorageError::PathTraversalAttempt {
            message: name.to_owned().into(),
            context: Some("File names must not contain directories".into()),
        });
    };

    let resolved = dir.join(segment);
    if is_contained(dir, &resolved) {
        Ok(resolved)
    } else {
        Err(StorageError::PathTraversalAttempt {
            message: resolved.display().to_string().into(),
            context: Some("Resolved path is outside sandbox boundaries".into()),
        })
    }
}

/// Returns `true` iff `candidate` resolves to a strict descendant of `base`.
///
/// `base` must be a canonical path. The candidate is normalized lexically first, then
/// its nearest existing ancestor (or the candidate itself) is canonicalized so that
/// symlinks pointing outside `base` are rejected as well.
pub(crate) fn is_contained(base: &Path, candidate: &Path) -> bool {
    let absolute = if candidate.is_absolute() { candidate.to_path_buf() } else { base.join(candidate) };
    let Some(lexical) = normalize_absolute(&absolute) else {
        return false;
    };

    if lexical == base || !lexical.starts_with(base) {
        return false;
    }

    let mut current = Some(lexical.as_path());
    while let Some(path) = current {
        if path == base {
            return true;
        }

        match path.canonicalize() {
            Ok(canonical) if path == lexical => {
                return canonical.starts_with(base) && canonical != base;
            },
            Ok(canonical) => return canonical.starts_with(base),
            Err(e) if e.kind() == ErrorKind::NotFound => current = path.parent(),
            Err(_) => return false,
        }
    }

    false
}
