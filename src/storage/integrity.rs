//! Integrity verification for stored objects
//!
//! Every canonical object yielded by the bucket walk is checked three ways,
//! independently:
//!
//! 1. the digest spelled by its directory path equals its file name
//! 2. the recomputed content digest equals its file name
//! 3. the recorded `sha1` attribute equals its file name and its content
//!
//! Failed checks are data. They are yielded as [`Discrepancy`] values and
//! never abort the walk. The walk reads the live tree, so objects written
//! while it runs may be missed or seen half-written.

use crate::error::BucketError;
use crate::storage::bucket::{FileBucket, Objects, StoredObject};
use crate::storage::hasher::Digest;
use crate::storage::metadata::MetadataKey;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One failed check on one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Directory segments do not spell the file name
    InvalidPath {
        digest: Digest,
        relative_path: PathBuf,
    },
    /// Content no longer hashes to the file name
    CalculatedHashMismatch { digest: Digest, calculated: Digest },
    /// Recorded digest disagrees with the file name or the content
    StoredHashMismatch { digest: Digest, stored: String },
    MissingStoredHash { digest: Digest },
    Unreadable { digest: Digest, reason: String },
}

impl Discrepancy {
    /// Digest (file name) of the object the discrepancy belongs to.
    pub fn digest(&self) -> &Digest {
        match self {
            Discrepancy::InvalidPath { digest, .. }
            | Discrepancy::CalculatedHashMismatch { digest, .. }
            | Discrepancy::StoredHashMismatch { digest, .. }
            | Discrepancy::MissingStoredHash { digest }
            | Discrepancy::Unreadable { digest, .. } => digest,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::InvalidPath {
                digest,
                relative_path,
            } => write!(
                f,
                "{} stored at invalid path {}",
                digest,
                relative_path.display()
            ),
            Discrepancy::CalculatedHashMismatch { digest, calculated } => {
                write!(f, "{} does not match calculated hash {}", digest, calculated)
            }
            Discrepancy::StoredHashMismatch { digest, stored } => {
                write!(f, "{} does not match stored hash {}", digest, stored)
            }
            Discrepancy::MissingStoredHash { digest } => {
                write!(f, "{} has no stored hash", digest)
            }
            Discrepancy::Unreadable { digest, reason } => {
                write!(f, "{} could not be read: {}", digest, reason)
            }
        }
    }
}

/// Summary of a completed validation walk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Canonical objects visited
    pub objects_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ValidationReport {
    /// Check if validation passed (no discrepancies)
    pub fn is_valid(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.discrepancies.len()
    }

    /// Number of distinct objects with at least one discrepancy.
    pub fn affected_objects(&self) -> usize {
        let mut digests: Vec<&Digest> = self.discrepancies.iter().map(|d| d.digest()).collect();
        digests.sort();
        digests.dedup();
        digests.len()
    }
}

/// Lazy validation walk. Created by [`FileBucket::validate`].
///
/// Objects are checked one at a time as the iterator is advanced; the
/// discrepancies of the current object are buffered until consumed.
pub struct Validation<'a> {
    bucket: &'a FileBucket,
    objects: Objects,
    pending: VecDeque<Discrepancy>,
    checked: usize,
}

impl<'a> Validation<'a> {
    fn new(bucket: &'a FileBucket) -> Self {
        Self {
            bucket,
            objects: bucket.objects(),
            pending: VecDeque::new(),
            checked: 0,
        }
    }

    /// Objects checked so far.
    pub fn objects_checked(&self) -> usize {
        self.checked
    }

    fn check(&self, object: &StoredObject) -> Vec<Discrepancy> {
        let bucket = self.bucket;
        let digest = &object.digest;
        let mut found = Vec::new();

        let relative_path = object
            .path
            .strip_prefix(bucket.root())
            .unwrap_or(&object.path);
        if let Some(discrepancy) = check_path(bucket, digest, relative_path) {
            found.push(discrepancy);
        }

        let calculated = match bucket.hasher().hash_file(&object.path) {
            Ok(calculated) => {
                if &calculated != digest {
                    found.push(Discrepancy::CalculatedHashMismatch {
                        digest: digest.clone(),
                        calculated: calculated.clone(),
                    });
                }
                Some(calculated)
            }
            Err(e) => {
                found.push(Discrepancy::Unreadable {
                    digest: digest.clone(),
                    reason: e.to_string(),
                });
                None
            }
        };

        match bucket
            .metadata_store()
            .get(&object.path, MetadataKey::Sha1)
        {
            Ok(Some(stored)) => {
                let matches_content = calculated.as_ref().map_or(true, |c| c == stored.as_str());
                if digest != stored.as_str() || !matches_content {
                    found.push(Discrepancy::StoredHashMismatch {
                        digest: digest.clone(),
                        stored,
                    });
                }
            }
            Ok(None) => found.push(Discrepancy::MissingStoredHash {
                digest: digest.clone(),
            }),
            // removed between the walk and the lookup
            Err(BucketError::NotFound(reason)) => found.push(Discrepancy::Unreadable {
                digest: digest.clone(),
                reason,
            }),
            Err(e) => found.push(Discrepancy::Unreadable {
                digest: digest.clone(),
                reason: e.to_string(),
            }),
        }

        found
    }
}

fn check_path(bucket: &FileBucket, digest: &Digest, relative_path: &Path) -> Option<Discrepancy> {
    let invalid = || Discrepancy::InvalidPath {
        digest: digest.clone(),
        relative_path: relative_path.to_path_buf(),
    };

    match bucket.codec().decode(relative_path) {
        Ok(decoded) if &decoded == digest => None,
        Ok(decoded) => {
            debug!(
                digest = %digest,
                decoded = %decoded,
                "Directory path spells a different digest"
            );
            Some(invalid())
        }
        Err(e) => {
            debug!(
                digest = %digest,
                path = %relative_path.display(),
                error = %e,
                "Object path does not decode to a digest"
            );
            Some(invalid())
        }
    }
}

impl Iterator for Validation<'_> {
    type Item = Discrepancy;

    fn next(&mut self) -> Option<Discrepancy> {
        loop {
            if let Some(discrepancy) = self.pending.pop_front() {
                return Some(discrepancy);
            }

            let object = self.objects.next()?;
            self.checked += 1;

            let found = self.check(&object);
            if !found.is_empty() {
                warn!(
                    digest = %object.digest,
                    discrepancies = found.len(),
                    "Stored object failed validation"
                );
            }
            self.pending.extend(found);
        }
    }
}

impl FileBucket {
    /// Lazily check every canonical object. See the module docs.
    pub fn validate(&self) -> Validation<'_> {
        Validation::new(self)
    }

    /// Run the whole validation walk and collect the result.
    pub fn validate_report(&self) -> ValidationReport {
        let mut validation = self.validate();
        let discrepancies: Vec<Discrepancy> = validation.by_ref().collect();
        let report = ValidationReport {
            objects_checked: validation.objects_checked(),
            discrepancies,
        };

        info!(
            root = %self.root().display(),
            objects_checked = report.objects_checked,
            discrepancies = report.error_count(),
            "Bucket validation completed"
        );
        report
    }
}
