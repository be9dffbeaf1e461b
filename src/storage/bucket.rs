//! FileBucket: the content-addressable store
//!
//! Orchestrates hashing, path sharding and the metadata side channel:
//!
//! ```text
//! add(path) -> hash_file -> encode -> ensure_dir + copy/move -> set metadata -> digest
//! ```
//!
//! The engine never deletes or rewrites objects on its own. Re-adding the
//! same content writes the same bytes to the same place, so ingestion is
//! idempotent for unchanged content.
//!
//! ## Concurrency
//!
//! There is no locking. Adds of different content touch disjoint paths.
//! Adds of identical content race on one destination whose final bytes are
//! the same either way; the recorded `original-filename` is whichever write
//! landed last. Two concurrent *move* adds of the same source file cannot
//! both succeed: the loser gets a per-file `NotFound` error. Walks
//! (`iterate`, `validate`) read the live tree and may miss objects added
//! during the walk. Object bytes are renamed into place, so a walk never
//! sees a partially written object; its metadata may still lag behind.

use crate::config::StorageConfig;
use crate::error::{BucketError, Result};
use crate::storage::content_type::{guess_all_extensions, guess_type, normalize_extension};
use crate::storage::hasher::{is_digest_shaped, ContentHasher, Digest, HashScheme};
use crate::storage::metadata::{MetadataKey, MetadataStore, ObjectMetadata};
use crate::storage::path_codec::PathCodec;
use crate::utils::{copy_file, ensure_dir, move_file, remove_file, same_file, symlink_file};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// How `add` places the source file into the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    #[default]
    Copy,
    Move,
}

/// Per-call options for [`FileBucket::add`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    pub mode: AddMode,
    /// Hash and report the destination without touching the filesystem.
    pub dry_run: bool,
}

impl AddOptions {
    pub fn copy() -> Self {
        Self::default()
    }

    pub fn moving() -> Self {
        Self {
            mode: AddMode::Move,
            ..Self::default()
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Per-call options for [`FileBucket::link_extensions`].
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Extensions linked first, in addition to those of the content type.
    pub preferred_extensions: Vec<String>,
}

impl LinkOptions {
    pub fn with_preferred<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preferred_extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

/// An alias that could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub extension: String,
    pub reason: String,
}

/// Outcome of [`FileBucket::link_extensions`], one entry per extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Aliases created by this call
    pub created: Vec<String>,
    /// Aliases that already pointed at the object
    pub existing: Vec<String>,
    pub failed: Vec<LinkFailure>,
}

impl LinkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A canonical object found by walking the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Digest taken from the file name
    pub digest: Digest,
    /// Absolute (root-joined) path of the object
    pub path: PathBuf,
}

/// Content-addressable file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileBucket {
    root: PathBuf,
    hasher: ContentHasher,
    codec: PathCodec,
    metadata: Arc<dyn MetadataStore>,
}

impl FileBucket {
    /// Bucket at `root` using sha1 digests and the platform's default
    /// metadata backend. Does no I/O; the root is created by the first add.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let scheme = HashScheme::default();
        Self {
            root: root.into(),
            hasher: ContentHasher::new(scheme),
            codec: PathCodec::new(scheme),
            metadata: Arc::from(crate::storage::MetadataBackend::default().open()),
        }
    }

    /// Open the bucket described by `config`, creating its root if needed.
    ///
    /// # Errors
    ///
    /// No root is configured, or the root cannot be created. These are the
    /// only conditions fatal to a whole session.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let root = config
            .root
            .clone()
            .ok_or_else(|| BucketError::not_found("No bucket root configured"))?;

        ensure_dir(&root)?;

        let bucket = Self::new(root)
            .with_scheme(config.hash_scheme)
            .with_read_buffer_size(config.read_buffer_size)
            .with_metadata_store(Arc::from(config.metadata_backend.open()));

        debug!(
            root = %bucket.root.display(),
            scheme = %config.hash_scheme,
            metadata = %config.metadata_backend,
            "Opened bucket"
        );
        Ok(bucket)
    }

    pub fn with_scheme(mut self, scheme: HashScheme) -> Self {
        self.hasher = ContentHasher::new(scheme);
        self.codec = PathCodec::new(scheme);
        self
    }

    pub fn with_read_buffer_size(mut self, buffer_size: usize) -> Self {
        self.hasher = self.hasher.with_buffer_size(buffer_size);
        self
    }

    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = store;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheme(&self) -> HashScheme {
        self.codec.scheme()
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    pub fn metadata_store(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    /// Parse user input as a digest of this bucket's scheme.
    pub fn parse_digest(&self, input: &str) -> Result<Digest> {
        Digest::parse_for(input, self.scheme())
    }

    /// Store `source_path` and return its digest.
    ///
    /// The destination directories are created on demand. Object bytes are
    /// written to a temporary file and renamed into place, so an object
    /// already present is replaced atomically and an inode shared with the
    /// source is never truncated. The metadata record is replaced with this
    /// call's file name and content type.
    ///
    /// In move mode a symbolic link source is resolved: the target's bytes
    /// are stored and the link itself is removed.
    ///
    /// # Errors
    ///
    /// Per-file errors only: unreadable or vanished source, destination
    /// directory that cannot be created, metadata that cannot be written.
    pub fn add(&self, source_path: &Path, options: &AddOptions) -> Result<Digest> {
        if !source_path.is_file() {
            return Err(BucketError::not_found(format!(
                "Source file not found: {}",
                source_path.display()
            )));
        }

        let original_filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BucketError::format_error(format!(
                    "Source path has no file name: {}",
                    source_path.display()
                ))
            })?;

        let digest = self.hasher.hash_file(source_path)?;
        let destination = self.get(&digest);

        if options.dry_run {
            info!(
                digest = %digest,
                source = %source_path.display(),
                path = %destination.display(),
                "Dry run, not storing file"
            );
            return Ok(digest);
        }

        if let Some(parent) = destination.parent() {
            ensure_dir(parent)?;
        }

        if same_file(source_path, &destination) {
            debug!(
                digest = %digest,
                path = %destination.display(),
                "Source is the stored object itself, skipping write"
            );
            if options.mode == AddMode::Move && is_symlink(source_path) {
                remove_file(source_path)?;
            }
        } else {
            match options.mode {
                AddMode::Copy => {
                    copy_file(source_path, &destination)?;
                }
                AddMode::Move => move_file(source_path, &destination)?,
            }
        }

        let metadata = ObjectMetadata {
            content_type: guess_type(&original_filename),
            sha1: digest.to_string(),
            original_filename,
        };
        self.metadata.replace_all(&destination, &metadata.entries())?;

        info!(
            digest = %digest,
            path = %destination.display(),
            source = %source_path.display(),
            mode = ?options.mode,
            "Stored file in bucket"
        );

        Ok(digest)
    }

    /// Path where the object named `digest` lives. Pure: does not check
    /// that the object exists.
    pub fn get(&self, digest: &Digest) -> PathBuf {
        self.root.join(self.codec.encode(digest))
    }

    /// Whether the object named `digest` is present.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.get(digest).is_file()
    }

    /// Recorded provenance of an object.
    ///
    /// # Errors
    ///
    /// `BucketError::NotFound` if the object or one of its required
    /// attributes (`sha1`, `original-filename`) is absent.
    pub fn get_metadata(&self, digest: &Digest) -> Result<ObjectMetadata> {
        let path = self.get(digest);
        if !path.is_file() {
            return Err(BucketError::not_found(format!(
                "Object not found: {} at path: {}",
                digest,
                path.display()
            )));
        }

        let required = |key: MetadataKey| -> Result<String> {
            self.metadata.get(&path, key)?.ok_or_else(|| {
                BucketError::not_found(format!("Object {} has no {} attribute", digest, key))
            })
        };

        Ok(ObjectMetadata {
            sha1: required(MetadataKey::Sha1)?,
            original_filename: required(MetadataKey::OriginalFilename)?,
            content_type: self.metadata.get(&path, MetadataKey::ContentType)?,
        })
    }

    /// Create `<digest>.<ext>` symlinks next to the object, one per extension
    /// of its content type plus any preferred extensions.
    ///
    /// An alias that already points at the object is left alone and reported
    /// as existing; anything else occupying an alias name is left untouched and
    /// reported as failed. Failures never stop the remaining aliases.
    ///
    /// # Errors
    ///
    /// Only if the object or its metadata cannot be found.
    pub fn link_extensions(&self, digest: &Digest, options: &LinkOptions) -> Result<LinkReport> {
        let metadata = self.get_metadata(digest)?;
        let content_type = metadata
            .content_type
            .clone()
            .or_else(|| guess_type(&metadata.original_filename));

        let mut extensions: Vec<String> = Vec::new();
        let candidates = options
            .preferred_extensions
            .iter()
            .cloned()
            .chain(
                content_type
                    .as_deref()
                    .map(guess_all_extensions)
                    .unwrap_or_default(),
            )
            .filter_map(|ext| normalize_extension(&ext));
        for ext in candidates {
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }

        if extensions.is_empty() {
            warn!(
                digest = %digest,
                original_filename = %metadata.original_filename,
                "No known extensions for object, nothing to link"
            );
        }

        let object = self.get(digest);
        let target = Path::new(digest.as_str());
        let mut report = LinkReport::default();

        for ext in extensions {
            let alias = object.with_file_name(format!("{}.{}", digest, ext));
            match link_alias(target, &alias) {
                Ok(true) => report.created.push(ext),
                Ok(false) => report.existing.push(ext),
                Err(reason) => {
                    warn!(
                        digest = %digest,
                        alias = %alias.display(),
                        reason = %reason,
                        "Failed to create extension alias"
                    );
                    report.failed.push(LinkFailure {
                        extension: ext,
                        reason,
                    });
                }
            }
        }

        info!(
            digest = %digest,
            created = report.created.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "Linked extension aliases"
        );
        Ok(report)
    }

    /// Canonical objects in the bucket, in file-name order.
    ///
    /// Only regular files whose name has the digest shape are yielded, so
    /// aliases, sidecar metadata and stray files are skipped. Each call
    /// starts a fresh walk over the live tree.
    pub fn objects(&self) -> Objects {
        Objects::new(&self.root, self.scheme())
    }

    /// Digests of all canonical objects. See [`FileBucket::objects`].
    pub fn iterate(&self) -> impl Iterator<Item = Digest> {
        self.objects().map(|object| object.digest)
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Ok(true) when created, Ok(false) when the alias already points at `target`.
fn link_alias(target: &Path, alias: &Path) -> std::result::Result<bool, String> {
    match fs::symlink_metadata(alias) {
        Ok(meta) => {
            if meta.file_type().is_symlink() && fs::read_link(alias).ok().as_deref() == Some(target)
            {
                Ok(false)
            } else {
                Err("alias name is occupied by another entry".to_string())
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => match symlink_file(target, alias) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // created concurrently; accept only if it is ours
                match fs::read_link(alias) {
                    Ok(existing) if existing == target => Ok(false),
                    _ => Err(format!("alias created concurrently: {}", e)),
                }
            }
            Err(e) => Err(e.to_string()),
        },
        Err(e) => Err(e.to_string()),
    }
}

/// Iterator over the canonical objects of a bucket.
pub struct Objects {
    walker: Option<walkdir::IntoIter>,
    scheme: HashScheme,
}

impl Objects {
    fn new(root: &Path, scheme: HashScheme) -> Self {
        let walker = if root.is_dir() {
            Some(
                WalkDir::new(root)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter(),
            )
        } else {
            debug!(root = %root.display(), "Bucket root does not exist yet");
            None
        };
        Self { walker, scheme }
    }
}

impl Iterator for Objects {
    type Item = StoredObject;

    fn next(&mut self) -> Option<StoredObject> {
        let walker = self.walker.as_mut()?;
        loop {
            let entry = match walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable bucket entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let digest = match entry.file_name().to_str() {
                Some(name) if is_digest_shaped(name, self.scheme) => match name.parse() {
                    Ok(digest) => digest,
                    Err(_) => continue,
                },
                _ => continue,
            };

            return Some(StoredObject {
                digest,
                path: entry.into_path(),
            });
        }
    }
}
