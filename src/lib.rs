//! FileBucket - 内容寻址文件存储
//!
//! Files are named by the git blob digest of their content and stored one
//! directory level per digest character. Provenance (recorded digest,
//! original file name, MIME type) travels with each object in extended
//! attributes or a sidecar file, and the whole store can be re-validated
//! against its own layout at any time.
//!
//! ```no_run
//! use filebucket::{AddOptions, FileBucket};
//! use std::path::Path;
//!
//! # fn main() -> filebucket::Result<()> {
//! let bucket = FileBucket::new("/srv/bucket");
//! let digest = bucket.add(Path::new("notes.txt"), &AddOptions::copy())?;
//! println!("{} -> {}", digest, bucket.get(&digest).display());
//!
//! for discrepancy in bucket.validate() {
//!     eprintln!("{}", discrepancy);
//! }
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod utils;

pub use config::{BucketConfig, LoggingConfig, StorageConfig};
pub use error::{BucketError, Result};
pub use storage::{
    AddMode, AddOptions, ContentHasher, Digest, Discrepancy, FileBucket, HashScheme, LinkOptions,
    LinkReport, MetadataBackend, MetadataKey, MetadataStore, ObjectMetadata, PathCodec,
    ValidationReport,
};
