//! Git-style content hashing
//!
//! Objects are identified the way git identifies blobs: the hash covers a
//! header `"blob <decimal length>\0"` followed by the raw bytes. Two object
//! formats are supported, matching git's:
//!
//! - `sha1`: 40 hex characters (the classic object format, default)
//! - `sha256`: 64 hex characters
//!
//! The empty file hashes to `e69de29bb2d1d6434b8b29ae775ad8c2e48c5391`
//! under the sha1 scheme, the same value `git hash-object` reports.

use crate::error::{BucketError, Result};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Default read chunk for streaming hashes (64KB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Digest of the empty blob under the sha1 scheme.
pub const EMPTY_BLOB_SHA1: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

/// Hash algorithm used to name objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashScheme {
    #[default]
    Sha1,
    Sha256,
}

impl HashScheme {
    /// Number of hex characters in a digest of this scheme.
    pub const fn hex_len(self) -> usize {
        match self {
            HashScheme::Sha1 => 40,
            HashScheme::Sha256 => 64,
        }
    }

    /// Scheme whose digests have `len` hex characters, if any.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            40 => Some(HashScheme::Sha1),
            64 => Some(HashScheme::Sha256),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashScheme::Sha1 => "sha1",
            HashScheme::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashScheme {
    type Err = BucketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashScheme::Sha1),
            "sha256" => Ok(HashScheme::Sha256),
            other => Err(BucketError::format_error(format!(
                "Unknown hash scheme: {}",
                other
            ))),
        }
    }
}

/// Lowercase hex content digest identifying one stored object.
///
/// Outside this module a digest is opaque: it is only ever produced by
/// hashing, parsed from user input, or recovered from a stored path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme implied by the digest length.
    pub fn scheme(&self) -> HashScheme {
        // length is checked on construction
        HashScheme::from_hex_len(self.0.len()).unwrap_or_default()
    }

    /// Parse a digest that must belong to `scheme`.
    pub fn parse_for(s: &str, scheme: HashScheme) -> Result<Self> {
        let digest: Digest = s.parse()?;
        if digest.scheme() != scheme {
            return Err(BucketError::format_error(format!(
                "Digest {} is not a {} digest",
                digest, scheme
            )));
        }
        Ok(digest)
    }

    fn from_hex_unchecked(hex: String) -> Self {
        Digest(hex)
    }
}

impl FromStr for Digest {
    type Err = BucketError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        if HashScheme::from_hex_len(normalized.len()).is_none() {
            return Err(BucketError::format_error(format!(
                "Invalid digest length {} for {:?}",
                normalized.len(),
                s
            )));
        }
        if !normalized.bytes().all(is_lower_hex) {
            return Err(BucketError::format_error(format!(
                "Digest contains non-hex characters: {:?}",
                s
            )));
        }
        Ok(Digest(normalized))
    }
}

impl TryFrom<String> for Digest {
    type Error = BucketError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Digest {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Digest {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

/// Whether `name` has exactly the shape of a `scheme` digest.
///
/// Used to tell canonical objects apart from aliases (`<digest>.<ext>`),
/// sidecar files and temporary files while walking a bucket.
pub fn is_digest_shaped(name: &str, scheme: HashScheme) -> bool {
    name.len() == scheme.hex_len() && name.bytes().all(is_lower_hex)
}

/// Computes git-style blob digests.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    scheme: HashScheme,
    buffer_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(HashScheme::default())
    }
}

enum FramedHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl FramedHasher {
    fn new(scheme: HashScheme, len: u64) -> Self {
        let header = format!("blob {}\0", len);
        match scheme {
            HashScheme::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(header.as_bytes());
                FramedHasher::Sha1(hasher)
            }
            HashScheme::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(header.as_bytes());
                FramedHasher::Sha256(hasher)
            }
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            FramedHasher::Sha1(h) => h.update(bytes),
            FramedHasher::Sha256(h) => h.update(bytes),
        }
    }

    fn finalize(self) -> Digest {
        let hex = match self {
            FramedHasher::Sha1(h) => format!("{:x}", h.finalize()),
            FramedHasher::Sha256(h) => format!("{:x}", h.finalize()),
        };
        Digest::from_hex_unchecked(hex)
    }
}

impl ContentHasher {
    pub fn new(scheme: HashScheme) -> Self {
        Self {
            scheme,
            buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Override the read chunk size. Chunking bounds memory only; it never
    /// changes the resulting digest.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn scheme(&self) -> HashScheme {
        self.scheme
    }

    /// Digest of in-memory content.
    pub fn hash_bytes(&self, content: &[u8]) -> Digest {
        let mut hasher = FramedHasher::new(self.scheme, content.len() as u64);
        hasher.update(content);
        hasher.finalize()
    }

    /// Digest of a file, streamed in fixed-size chunks.
    ///
    /// The header uses the size reported by the filesystem before reading.
    /// The file is opened read-only and never modified.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be opened, stat'ed or read.
    pub fn hash_file(&self, file_path: &Path) -> Result<Digest> {
        let mut file = File::open(file_path).map_err(|e| {
            BucketError::io_error(
                format!("Failed to open file for hashing: {}", e),
                Some(file_path.to_path_buf()),
            )
        })?;

        let len = file
            .metadata()
            .map_err(|e| {
                BucketError::io_error(
                    format!("Failed to read file size: {}", e),
                    Some(file_path.to_path_buf()),
                )
            })?
            .len();

        let mut hasher = FramedHasher::new(self.scheme, len);
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = file.read(&mut buffer).map_err(|e| {
                BucketError::io_error(
                    format!("Failed to read file for hashing: {}", e),
                    Some(file_path.to_path_buf()),
                )
            })?;

            if bytes_read == 0 {
                break; // EOF
            }

            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize())
    }
}
