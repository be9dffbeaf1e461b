//! Per-object metadata side channel
//!
//! Provenance travels with each stored file, out of band from its content:
//!
//! | key                 | meaning                                     |
//! |---------------------|---------------------------------------------|
//! | `sha1`              | digest recorded at ingest (tamper check)    |
//! | `original-filename` | basename of the ingested file               |
//! | `Content-Type`      | MIME type guessed from that name (optional) |
//!
//! Two backends implement [`MetadataStore`]:
//!
//! - [`XattrMetadataStore`]: user extended attributes on the object itself,
//!   using the attribute names existing buckets already carry.
//! - [`SidecarMetadataStore`]: a hidden JSON file next to the object, for
//!   platforms or filesystems without extended attributes.
//!
//! Either way the attributes belong to one stored file: a missing object
//! has no attributes.

use crate::error::{BucketError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Attribute names understood by the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKey {
    Sha1,
    OriginalFilename,
    ContentType,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 3] = [
        MetadataKey::Sha1,
        MetadataKey::OriginalFilename,
        MetadataKey::ContentType,
    ];

    /// External (wire) name of the key.
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKey::Sha1 => "sha1",
            MetadataKey::OriginalFilename => "original-filename",
            MetadataKey::ContentType => "Content-Type",
        }
    }

    /// Extended attribute name used on disk.
    pub fn xattr_name(self) -> &'static str {
        match self {
            MetadataKey::Sha1 => "user.bucket.sha1",
            MetadataKey::OriginalFilename => "user.bucket.original_filename",
            MetadataKey::ContentType => "user.mime_type",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(rename = "Content-Type", skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,
    pub sha1: String,
    #[serde(rename = "original-filename")]
    pub original_filename: String,
}

impl ObjectMetadata {
    /// Key/value pairs to persist; `Content-Type` only when known.
    pub fn entries(&self) -> Vec<(MetadataKey, &str)> {
        let mut entries = vec![
            (MetadataKey::OriginalFilename, self.original_filename.as_str()),
            (MetadataKey::Sha1, self.sha1.as_str()),
        ];
        if let Some(content_type) = &self.content_type {
            entries.push((MetadataKey::ContentType, content_type.as_str()));
        }
        entries
    }
}

/// Key/value attributes attached to a stored file.
pub trait MetadataStore: fmt::Debug + Send + Sync {
    fn set(&self, object: &Path, key: MetadataKey, value: &str) -> Result<()>;

    fn get(&self, object: &Path, key: MetadataKey) -> Result<Option<String>>;

    fn has(&self, object: &Path, key: MetadataKey) -> Result<bool> {
        Ok(self.get(object, key)?.is_some())
    }

    /// Drop one attribute. Removing an absent attribute is not an error.
    fn remove(&self, object: &Path, key: MetadataKey) -> Result<()>;

    /// Write several attributes. Backends that can do it in one write override this.
    fn set_all(&self, object: &Path, entries: &[(MetadataKey, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(object, *key, value)?;
        }
        Ok(())
    }

    /// Make `entries` the object's whole record: keys not listed are removed.
    fn replace_all(&self, object: &Path, entries: &[(MetadataKey, &str)]) -> Result<()> {
        self.set_all(object, entries)?;
        for key in MetadataKey::ALL {
            if !entries.iter().any(|(k, _)| *k == key) && self.has(object, key)? {
                self.remove(object, key)?;
            }
        }
        Ok(())
    }

    fn backend(&self) -> MetadataBackend;
}

/// Which side channel holds the attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Xattr,
    Sidecar,
}

impl Default for MetadataBackend {
    fn default() -> Self {
        if cfg!(unix) {
            MetadataBackend::Xattr
        } else {
            MetadataBackend::Sidecar
        }
    }
}

impl MetadataBackend {
    pub fn open(self) -> Box<dyn MetadataStore> {
        match self {
            MetadataBackend::Xattr => Box::new(XattrMetadataStore),
            MetadataBackend::Sidecar => Box::new(SidecarMetadataStore),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataBackend::Xattr => "xattr",
            MetadataBackend::Sidecar => "sidecar",
        }
    }
}

impl fmt::Display for MetadataBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataBackend {
    type Err = BucketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xattr" => Ok(MetadataBackend::Xattr),
            "sidecar" => Ok(MetadataBackend::Sidecar),
            other => Err(BucketError::format_error(format!(
                "Unknown metadata backend: {}",
                other
            ))),
        }
    }
}

fn missing_object(object: &Path) -> BucketError {
    BucketError::not_found(format!("Object not found: {}", object.display()))
}

/// Extended attribute backend (`user.*` namespace).
#[derive(Debug, Clone, Copy, Default)]
pub struct XattrMetadataStore;

#[cfg(unix)]
impl MetadataStore for XattrMetadataStore {
    fn set(&self, object: &Path, key: MetadataKey, value: &str) -> Result<()> {
        xattr::set(object, key.xattr_name(), value.as_bytes()).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                missing_object(object)
            } else {
                BucketError::metadata_error(
                    format!("Failed to set {}: {}", key.xattr_name(), e),
                    Some(object.to_path_buf()),
                )
            }
        })
    }

    fn get(&self, object: &Path, key: MetadataKey) -> Result<Option<String>> {
        let value = xattr::get(object, key.xattr_name()).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                missing_object(object)
            } else {
                BucketError::metadata_error(
                    format!("Failed to read {}: {}", key.xattr_name(), e),
                    Some(object.to_path_buf()),
                )
            }
        })?;

        value
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|_| {
                    BucketError::metadata_error(
                        format!("Attribute {} is not valid UTF-8", key.xattr_name()),
                        Some(object.to_path_buf()),
                    )
                })
            })
            .transpose()
    }

    fn remove(&self, object: &Path, key: MetadataKey) -> Result<()> {
        if !self.has(object, key)? {
            return Ok(());
        }
        xattr::remove(object, key.xattr_name()).map_err(|e| {
            BucketError::metadata_error(
                format!("Failed to remove {}: {}", key.xattr_name(), e),
                Some(object.to_path_buf()),
            )
        })
    }

    fn backend(&self) -> MetadataBackend {
        MetadataBackend::Xattr
    }
}

#[cfg(not(unix))]
impl MetadataStore for XattrMetadataStore {
    fn set(&self, _object: &Path, _key: MetadataKey, _value: &str) -> Result<()> {
        Err(BucketError::UnsupportedPlatform(
            "extended attributes".to_string(),
        ))
    }

    fn get(&self, _object: &Path, _key: MetadataKey) -> Result<Option<String>> {
        Err(BucketError::UnsupportedPlatform(
            "extended attributes".to_string(),
        ))
    }

    fn remove(&self, _object: &Path, _key: MetadataKey) -> Result<()> {
        Err(BucketError::UnsupportedPlatform(
            "extended attributes".to_string(),
        ))
    }

    fn backend(&self) -> MetadataBackend {
        MetadataBackend::Xattr
    }
}

/// Sidecar backend: `.<object name>.attrs.json` next to the object.
///
/// The sidecar name never looks like a digest, so bucket walks skip it.
/// Writes go through a temporary file in the same directory and a rename,
/// so readers see either the old or the new record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarMetadataStore;

type Record = BTreeMap<String, String>;

impl SidecarMetadataStore {
    pub fn sidecar_path(object: &Path) -> PathBuf {
        let name = object
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        object.with_file_name(format!(".{}.attrs.json", name))
    }

    fn read_record(&self, object: &Path) -> Result<Record> {
        let sidecar = Self::sidecar_path(object);
        match fs::read(&sidecar) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                BucketError::metadata_error(
                    format!("Corrupt sidecar metadata: {}", e),
                    Some(sidecar.clone()),
                )
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Record::new()),
            Err(e) => Err(BucketError::io_error(
                format!("Failed to read sidecar metadata: {}", e),
                Some(sidecar),
            )),
        }
    }

    fn write_record(&self, object: &Path, record: &Record) -> Result<()> {
        let sidecar = Self::sidecar_path(object);
        let dir = sidecar
            .parent()
            .ok_or_else(|| missing_object(object))?;

        let json = serde_json::to_vec_pretty(record).map_err(|e| {
            BucketError::metadata_error(
                format!("Failed to encode sidecar metadata: {}", e),
                Some(sidecar.clone()),
            )
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            BucketError::io_error(
                format!("Failed to create temporary sidecar: {}", e),
                Some(dir.to_path_buf()),
            )
        })?;
        tmp.write_all(&json).map_err(|e| {
            BucketError::io_error(
                format!("Failed to write temporary sidecar: {}", e),
                Some(tmp.path().to_path_buf()),
            )
        })?;
        tmp.persist(&sidecar).map_err(|e| {
            BucketError::io_error(
                format!("Failed to replace sidecar metadata: {}", e.error),
                Some(sidecar.clone()),
            )
        })?;

        debug!(sidecar = %sidecar.display(), keys = record.len(), "Wrote sidecar metadata");
        Ok(())
    }

    fn ensure_object(object: &Path) -> Result<()> {
        if object.is_file() {
            Ok(())
        } else {
            Err(missing_object(object))
        }
    }
}

impl MetadataStore for SidecarMetadataStore {
    fn set(&self, object: &Path, key: MetadataKey, value: &str) -> Result<()> {
        self.set_all(object, &[(key, value)])
    }

    fn get(&self, object: &Path, key: MetadataKey) -> Result<Option<String>> {
        if !object.is_file() {
            if Self::sidecar_path(object).exists() {
                warn!(object = %object.display(), "Ignoring sidecar of a missing object");
            }
            return Err(missing_object(object));
        }
        Ok(self.read_record(object)?.remove(key.as_str()))
    }

    fn set_all(&self, object: &Path, entries: &[(MetadataKey, &str)]) -> Result<()> {
        Self::ensure_object(object)?;
        let mut record = self.read_record(object)?;
        for (key, value) in entries {
            record.insert(key.as_str().to_string(), (*value).to_string());
        }
        self.write_record(object, &record)
    }

    fn remove(&self, object: &Path, key: MetadataKey) -> Result<()> {
        Self::ensure_object(object)?;
        let mut record = self.read_record(object)?;
        if record.remove(key.as_str()).is_some() {
            self.write_record(object, &record)?;
        }
        Ok(())
    }

    fn replace_all(&self, object: &Path, entries: &[(MetadataKey, &str)]) -> Result<()> {
        Self::ensure_object(object)?;
        let record: Record = entries
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), (*value).to_string()))
            .collect();
        self.write_record(object, &record)
    }

    fn backend(&self) -> MetadataBackend {
        MetadataBackend::Sidecar
    }
}
