//! Single-object commands: `get`, `info` and `link`

use crate::storage::{FileBucket, LinkOptions};
use clap::Args;
use eyre::{Result, WrapErr};
use std::io::Write;
use tracing::warn;

#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Object digest (hex).
    #[arg(value_name = "DIGEST")]
    pub digest: String,
}

/// Arguments for `bucket link`.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Extension to alias first (repeatable).
    #[arg(long = "prefer-ext", value_name = "EXT")]
    pub prefer_ext: Vec<String>,

    /// Object digest (hex).
    #[arg(value_name = "DIGEST")]
    pub digest: String,
}

pub fn run_get(args: &DigestArgs, bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    let digest = bucket.parse_digest(&args.digest)?;
    let path = bucket.get(&digest);
    if !bucket.contains(&digest) {
        warn!(digest = %digest, path = %path.display(), "Object not in bucket");
        return Ok(1);
    }
    writeln!(out, "{}", path.display())?;
    Ok(0)
}

pub fn run_info(args: &DigestArgs, bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    let digest = bucket.parse_digest(&args.digest)?;
    let metadata = bucket
        .get_metadata(&digest)
        .wrap_err_with(|| format!("No metadata for {}", digest))?;
    writeln!(out, "{}", serde_json::to_string_pretty(&metadata)?)?;
    Ok(0)
}

/// Prints the path of each alias created; existing aliases are silent.
pub fn run_link(args: &LinkArgs, bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    let digest = bucket.parse_digest(&args.digest)?;
    let options = LinkOptions::with_preferred(args.prefer_ext.iter().cloned());
    let report = bucket.link_extensions(&digest, &options)?;

    let object = bucket.get(&digest);
    for ext in &report.created {
        let alias = object.with_file_name(format!("{}.{}", digest, ext));
        writeln!(out, "{}", alias.display())?;
    }
    for failure in &report.failed {
        warn!(
            digest = %digest,
            extension = %failure.extension,
            reason = %failure.reason,
            "Alias not created"
        );
    }

    Ok(if report.is_complete() { 0 } else { 1 })
}
