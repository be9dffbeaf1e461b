//! `bucket list`

use crate::storage::FileBucket;
use eyre::Result;
use std::io::Write;
use tracing::warn;

/// Prints `<digest> <Content-Type>` per stored object, `-` when the type is
/// unknown or the metadata cannot be read.
pub fn run_list(bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    for digest in bucket.iterate() {
        let content_type = match bucket.get_metadata(&digest) {
            Ok(metadata) => metadata.content_type,
            Err(e) => {
                warn!(digest = %digest, error = %e, "Could not read object metadata");
                None
            }
        };
        writeln!(out, "{} {}", digest, content_type.as_deref().unwrap_or("-"))?;
    }
    Ok(0)
}
