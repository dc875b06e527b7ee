//! Path utilities for naming, filtering and validating collection paths.
//!
//! This module keeps the small pieces of path logic shared by discovery,
//! member enumeration and document writing: extension checks, hidden-entry
//! detection, output naming and lossy display conversion.

use crate::error::{Error, Result};
use crate::types::{ARCHIVE_EXTENSIONS, DOCUMENT_EXTENSION, IMAGE_EXTENSIONS};

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Suffix appended to an output path while the document is being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Arguments
///
/// * `path` - The path to extract the file name from
///
/// # Returns
///
/// * `String` - The file name, using lossy conversion if necessary
pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Returns the last component of a slash-separated archive entry name.
pub fn entry_base_name(entry_name: &str) -> &str {
    entry_name
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(entry_name)
}

/// Checks if a file or entry name starts with a dot (hidden entry).
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Lowercased extension of a name, if it has one.
fn extension_lowercase(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn has_extension_in(name: &str, allowed: &[&str]) -> bool {
    extension_lowercase(name)
        .map(|ext| allowed.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True if the name carries one of the supported page image extensions.
pub fn is_supported_image_name(name: &str) -> bool {
    has_extension_in(name, IMAGE_EXTENSIONS)
}

/// True if the path names a page archive by extension.
pub fn is_archive_file(path: &Path) -> bool {
    has_extension_in(&file_name_lossy(path), ARCHIVE_EXTENSIONS)
}

/// Output document path for a collection base name inside `directory`.
///
/// The name is used verbatim (no lossy conversion) so that non-UTF-8 names
/// map to distinct outputs.
pub fn output_path_for(directory: &Path, base_name: &OsStr) -> PathBuf {
    let mut file_name = OsString::from(base_name);
    file_name.push(".");
    file_name.push(DOCUMENT_EXTENSION);
    directory.join(file_name)
}

/// Temporary path a document is written to before being renamed into place.
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Checks that a base directory is usable for a batch run.
///
/// # Arguments
///
/// * `path` - The directory to validate
///
/// # Returns
///
/// * `Result<()>` - Ok if the path exists and is a directory, a discovery error otherwise
pub fn validate_base_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Discovery(
            path.to_path_buf(),
            "Base directory is not set".to_string(),
        ));
    }
    if !path.exists() {
        return Err(Error::Discovery(
            path.to_path_buf(),
            "Base directory does not exist".to_string(),
        ));
    }
    if !path.is_dir() {
        return Err(Error::Discovery(
            path.to_path_buf(),
            "Base path is not a directory".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_file_name_lossy() {
        let path = Path::new("test/file.txt");
        assert_eq!(file_name_lossy(path), "file.txt");
        assert_eq!(file_name_lossy(Path::new("/")), "unknown");
    }

    #[test]
    fn test_entry_base_name() {
        assert_eq!(entry_base_name("chapter/01/page_003.png"), "page_003.png");
        assert_eq!(entry_base_name("page.png"), "page.png");
        assert_eq!(entry_base_name("nested\\dir\\a.jpg"), "a.jpg");
        assert_eq!(entry_base_name("folder/"), "folder");
    }

    #[test]
    fn test_is_hidden_name() {
        assert!(is_hidden_name(".hidden"));
        assert!(is_hidden_name(entry_base_name("__MACOSX/._resource.jpg")));
        assert!(!is_hidden_name("normal.txt"));
    }

    #[test]
    fn test_supported_image_names() {
        assert!(is_supported_image_name("001.JPG"));
        assert!(is_supported_image_name("scan.tif"));
        assert!(is_supported_image_name("cover.webp"));
        assert!(!is_supported_image_name("notes.txt"));
        assert!(!is_supported_image_name("jpg"));
    }

    #[test]
    fn test_archive_detection() {
        assert!(is_archive_file(Path::new("base/Volume 1.zip")));
        assert!(is_archive_file(Path::new("base/Volume 1.CBZ")));
        assert!(!is_archive_file(Path::new("base/Volume 1.rar")));
    }

    #[test]
    fn test_output_and_partial_paths() {
        let output = output_path_for(Path::new("base"), OsStr::new("Volume 1"));
        assert_eq!(output, Path::new("base").join("Volume 1.pdf"));
        assert_eq!(
            partial_path(&output),
            Path::new("base").join("Volume 1.pdf.partial")
        );
    }

    #[test]
    fn test_validate_base_dir_rejects_missing() {
        let result = validate_base_dir(Path::new("definitely/not/here"));
        assert!(matches!(result, Err(Error::Discovery(_, _))));
    }
}
