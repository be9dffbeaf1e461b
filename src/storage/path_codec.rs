//! Digest <-> sharded path mapping
//!
//! Every character of the digest becomes one directory level and the leaf
//! file is named with the full digest:
//!
//! ```text
//! e/6/9/d/.../9/1/e69de29bb2d1d6434b8b29ae775ad8c2e48c5391
//! ```
//!
//! With hex digests no directory ever holds more than 16 subdirectories,
//! whatever the size of the bucket. The trees are deep (40 levels for sha1).

use crate::error::{BucketError, Result};
use crate::storage::hasher::{Digest, HashScheme};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct PathCodec {
    scheme: HashScheme,
}

impl PathCodec {
    pub fn new(scheme: HashScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> HashScheme {
        self.scheme
    }

    /// Relative path of the object named `digest`.
    pub fn encode(&self, digest: &Digest) -> PathBuf {
        let mut path: PathBuf = digest
            .as_str()
            .chars()
            .map(|c| c.to_string())
            .collect();
        path.push(digest.as_str());
        path
    }

    /// Recover the digest from the directory segments of a relative object path.
    ///
    /// The leaf file name is deliberately ignored so callers can compare the
    /// result against it independently.
    ///
    /// # Errors
    ///
    /// `BucketError::Format` if the number of directory segments is not the
    /// digest length of the scheme, or if a segment is not a single lowercase
    /// hex character.
    pub fn decode(&self, relative_path: &Path) -> Result<Digest> {
        let mut segments = split_path(relative_path)?;
        // drop the leaf
        segments.pop();

        if segments.len() != self.scheme.hex_len() {
            return Err(BucketError::format_error(format!(
                "Path {} has {} directory levels, expected {}",
                relative_path.display(),
                segments.len(),
                self.scheme.hex_len()
            )));
        }

        let mut hex = String::with_capacity(segments.len());
        for segment in &segments {
            let mut chars = segment.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if matches!(c, '0'..='9' | 'a'..='f') => hex.push(c),
                _ => {
                    return Err(BucketError::format_error(format!(
                        "Path segment {:?} of {} is not a single hex character",
                        segment,
                        relative_path.display()
                    )))
                }
            }
        }

        Digest::parse_for(&hex, self.scheme)
    }
}

/// Split a relative path into its normal components, root to leaf.
///
/// Iterates components instead of recursing on `parent()`, so path depth is
/// bounded only by memory. `.` components are skipped; anything that cannot
/// occur in a bucket-relative path (roots, prefixes, `..`, non-UTF-8 names)
/// is a format error.
pub fn split_path(path: &Path) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| {
                    BucketError::format_error(format!(
                        "Non UTF-8 path segment in {}",
                        path.display()
                    ))
                })?;
                segments.push(name.to_string());
            }
            Component::CurDir => {}
            _ => {
                return Err(BucketError::format_error(format!(
                    "Path {} is not relative to the bucket root",
                    path.display()
                )))
            }
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::hasher::{ContentHasher, EMPTY_BLOB_SHA1};
    use rstest::rstest;

    const EMPTY_BLOB_PATH: &str = "e/6/9/d/e/2/9/b/b/2/d/1/d/6/4/3/4/b/8/b/2/9/a/e/7/7/5/a/d/8/c/2/e/4/8/c/5/3/9/1/e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    fn empty_digest() -> Digest {
        EMPTY_BLOB_SHA1.parse().unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let path = PathCodec::default().encode(&empty_digest());
        assert_eq!(path, PathBuf::from(EMPTY_BLOB_PATH));
        assert_eq!(path.components().count(), 41);
    }

    #[test]
    fn test_decode_known_path() {
        let digest = PathCodec::default()
            .decode(Path::new(EMPTY_BLOB_PATH))
            .unwrap();
        assert_eq!(digest, empty_digest());
    }

    #[test]
    fn test_decode_ignores_leaf_name() {
        let path = Path::new(EMPTY_BLOB_PATH).with_file_name("something-else");
        let digest = PathCodec::default().decode(&path).unwrap();
        assert_eq!(digest, empty_digest());
    }

    #[rstest]
    #[case("e/6/9/e69de29bb2d1d6434b8b29ae775ad8c2e48c5391")]
    #[case("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391")]
    #[case("e6/9/d/e/2/9/b/b/2/d/1/d/6/4/3/4/b/8/b/2/9/a/e/7/7/5/a/d/8/c/2/e/4/8/c/5/3/9/1/x/leaf")]
    #[case("E/6/9/d/e/2/9/b/b/2/d/1/d/6/4/3/4/b/8/b/2/9/a/e/7/7/5/a/d/8/c/2/e/4/8/c/5/3/9/1/leaf")]
    #[case("/e/6/9/d/e/2/9/b/b/2/d/1/d/6/4/3/4/b/8/b/2/9/a/e/7/7/5/a/d/8/c/2/e/4/8/c/5/3/9/1/leaf")]
    fn test_decode_rejects_malformed(#[case] path: &str) {
        let result = PathCodec::default().decode(Path::new(path));
        assert!(matches!(result, Err(BucketError::Format(_))), "path: {}", path);
    }

    #[test]
    fn test_split_path() {
        let segments = split_path(Path::new("e/6/9/d")).unwrap();
        assert_eq!(segments, vec!["e", "6", "9", "d"]);
        assert_eq!(split_path(Path::new("./a/b")).unwrap(), vec!["a", "b"]);
        assert!(split_path(Path::new("a/../b")).is_err());
    }

    #[test]
    fn test_sha256_layout() {
        let codec = PathCodec::new(HashScheme::Sha256);
        let digest = ContentHasher::new(HashScheme::Sha256).hash_bytes(b"x");
        let path = codec.encode(&digest);
        assert_eq!(path.components().count(), 65);
        assert_eq!(codec.decode(&path).unwrap(), digest);
        assert!(PathCodec::default().decode(&path).is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_encode_decode_roundtrip(content in prop::collection::vec(any::<u8>(), 0..512)) {
                let codec = PathCodec::default();
                let digest = ContentHasher::default().hash_bytes(&content);
                let path = codec.encode(&digest);

                prop_assert_eq!(codec.decode(&path).unwrap(), digest.clone());
                prop_assert_eq!(
                    path.file_name().and_then(|n| n.to_str()),
                    Some(digest.as_str())
                );
            }
        }
    }
}
