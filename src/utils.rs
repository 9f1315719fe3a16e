//! Utility functions for artifact naming and checksums

use crate::error::{Result, StoreError};
use std::path::{Component, Path};
use tokio::io::AsyncReadExt;

/// Suffix carried by a destination path while the engine is still writing it
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Suffix of the changelog sidecar next to each artifact
pub const CHANGELOG_SUFFIX: &str = ".changelog";

/// Read buffer for checksum computation
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Last path component as a string, if it is valid UTF-8
///
/// # Examples
///
/// ```
/// use update_stager::utils::file_name_of;
/// use std::path::Path;
///
/// assert_eq!(file_name_of(Path::new("/sdcard/updates/a.zip")), Some("a.zip"));
/// assert_eq!(file_name_of(Path::new("/")), None);
/// ```
pub fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Reject names that would resolve outside the updates directory
///
/// A valid name is non-empty, contains no `/` or `\\` and is exactly one
/// normal path component, so `.` and `..` are refused as well.
///
/// # Examples
///
/// ```
/// use update_stager::utils::validate_file_name;
///
/// assert!(validate_file_name("cm-10.3.0-mako.zip").is_ok());
/// assert!(validate_file_name("../cm-10.3.0-mako.zip").is_err());
/// ```
pub fn validate_file_name(file_name: &str) -> Result<()> {
    let mut components = Path::new(file_name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == file_name
    );
    if single_normal && !file_name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(StoreError::InvalidFileName {
            file_name: file_name.to_string(),
        }
        .into())
    }
}

/// Remove a trailing `.partial`, if present
pub fn strip_partial_suffix(name: &str) -> &str {
    name.strip_suffix(PARTIAL_SUFFIX).unwrap_or(name)
}

/// Hex-encoded MD5 of a file's contents
pub async fn md5_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Case-insensitive comparison of two hex checksums
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
