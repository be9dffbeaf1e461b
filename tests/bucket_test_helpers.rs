//! Bucket Test Helper Functions
//!
//! Shared setup for the integration tests: a bucket in a temporary
//! directory using the sidecar metadata backend (tmpfs and some CI
//! filesystems reject user extended attributes), plus a scratch area for
//! source files.

#![allow(dead_code)]

use filebucket::storage::SidecarMetadataStore;
use filebucket::{AddOptions, Digest, FileBucket};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A bucket plus a directory for source files, removed on drop.
pub struct TestBucket {
    pub bucket: FileBucket,
    pub temp_dir: TempDir,
}

impl TestBucket {
    pub fn root(&self) -> &Path {
        self.bucket.root()
    }

    /// Directory holding source files (outside the bucket)
    pub fn sources_dir(&self) -> PathBuf {
        self.temp_dir.path().join("sources")
    }

    /// Write a source file and return its path.
    pub fn write_source(&self, name: &str, content: &[u8]) -> PathBuf {
        let dir = self.sources_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Write a source file and copy it into the bucket.
    pub fn add_bytes(&self, name: &str, content: &[u8]) -> Digest {
        let source = self.write_source(name, content);
        self.bucket.add(&source, &AddOptions::copy()).unwrap()
    }

    /// Number of canonical objects in the bucket.
    pub fn object_count(&self) -> usize {
        self.bucket.iterate().count()
    }
}

/// Create a bucket for testing. The bucket root does not exist yet.
pub fn create_test_bucket() -> TestBucket {
    let temp_dir = TempDir::new().unwrap();
    let bucket = FileBucket::new(temp_dir.path().join("bucket"))
        .with_metadata_store(Arc::new(SidecarMetadataStore));
    TestBucket { bucket, temp_dir }
}

/// Append bytes to a stored object in place.
pub fn corrupt_object(path: &Path, extra: &[u8]) {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(extra).unwrap();
}
