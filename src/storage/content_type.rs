//! MIME type guessing from file names

use std::path::Path;

/// MIME type conventionally associated with the extension of `file_name`.
pub fn guess_type(file_name: impl AsRef<Path>) -> Option<String> {
    mime_guess::from_path(file_name.as_ref())
        .first()
        .map(|mime| mime.essence_str().to_string())
}

/// Every extension (without the leading dot) conventionally used for `mime_type`.
pub fn guess_all_extensions(mime_type: &str) -> Vec<String> {
    mime_guess::get_mime_extensions_str(mime_type)
        .map(|extensions| extensions.iter().map(|ext| ext.to_string()).collect())
        .unwrap_or_default()
}

/// Strip leading dots and lowercase an extension hint; `None` if nothing is left
/// or the hint would escape the object's directory.
pub fn normalize_extension(extension: &str) -> Option<String> {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.contains(['/', '\\']) {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("notes.txt", Some("text/plain"))]
    #[case("photo.JPG", Some("image/jpeg"))]
    #[case("README", None)]
    fn test_guess_type(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(guess_type(name).as_deref(), expected);
    }

    #[test]
    fn test_text_extensions() {
        let extensions = guess_all_extensions("text/plain");
        assert!(extensions.iter().any(|e| e == "txt"));
        assert!(extensions.iter().all(|e| !e.starts_with('.')));
    }

    #[test]
    fn test_unknown_type_has_no_extensions() {
        assert!(guess_all_extensions("application/x-made-up").is_empty());
    }

    #[rstest]
    #[case(".TXT", Some("txt"))]
    #[case("md", Some("md"))]
    #[case("..", None)]
    #[case("a/b", None)]
    fn test_normalize_extension(#[case] hint: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_extension(hint).as_deref(), expected);
    }
}
