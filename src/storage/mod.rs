//! Content-Addressable Storage Module
//!
//! Files are stored under the git blob digest of their content, with one
//! directory level per digest character:
//!
//! ```text
//! bucket/
//! └── e/
//!     └── 6/
//!         └── 9/
//!             └── ...              # one level per hex character
//!                 ├── e69de29bb2d1d6434b8b29ae775ad8c2e48c5391
//!                 ├── e69de29bb2d1d6434b8b29ae775ad8c2e48c5391.txt -> e69de29bb2d1d6434b8b29ae775ad8c2e48c5391
//!                 └── .e69de29bb2d1d6434b8b29ae775ad8c2e48c5391.attrs.json   # sidecar backend only
//! ```
//!
//! - [`hasher`]: git-style blob digests (sha1, sha256)
//! - [`path_codec`]: digest <-> relative path
//! - [`metadata`]: provenance attributes (xattr or sidecar)
//! - [`content_type`]: MIME guessing for metadata and extension aliases
//! - [`bucket`]: the store itself
//! - [`integrity`]: the validation walk

pub mod bucket;
pub mod content_type;
pub mod hasher;
pub mod integrity;
pub mod metadata;
pub mod path_codec;

pub use bucket::{
    AddMode, AddOptions, FileBucket, LinkFailure, LinkOptions, LinkReport, Objects, StoredObject,
};
pub use hasher::{
    is_digest_shaped, ContentHasher, Digest, HashScheme, DEFAULT_READ_BUFFER_SIZE,
    EMPTY_BLOB_SHA1,
};
pub use integrity::{Discrepancy, Validation, ValidationReport};
pub use metadata::{
    MetadataBackend, MetadataKey, MetadataStore, ObjectMetadata, SidecarMetadataStore,
    XattrMetadataStore,
};
pub use path_codec::PathCodec;
