//! Zip-slip protection.
//!
//! Entry paths come from untrusted archives. Only paths that reduce to a
//! plain sequence of normal components are ever joined with a destination
//! directory; everything else is refused up front, lexically, before any
//! filesystem call.

use std::path::{Component, Path, PathBuf};

/// Reduce an archive entry path to a relative path that stays under any base.
///
/// Returns `None` for empty paths, absolute paths (leading `/` or `\`,
/// drive prefixes), and paths with a `..` segment anywhere. Trailing
/// separators, empty segments and `.` segments are dropped.
pub fn sanitize_entry_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() || trimmed.starts_with(['/', '\\']) {
        return None;
    }

    let mut relative = PathBuf::new();
    for segment in trimmed.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return None,
            _ if segment.contains('\0') => return None,
            _ => {
                // Catches platform prefixes such as `C:` on Windows.
                let mut components = Path::new(segment).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => relative.push(segment),
                    _ => return None,
                }
            }
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Where an entry lands under `base`, or `None` when it must be skipped.
pub fn destination_path(base: &Path, raw: &str) -> Option<PathBuf> {
    sanitize_entry_path(raw).map(|relative| base.join(relative))
}
