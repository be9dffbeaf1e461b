//! `bucket validate`

use crate::storage::FileBucket;
use eyre::Result;
use std::io::Write;
use tracing::info;

/// Prints each discrepancy as it is found. Exit code 1 if there were any.
pub fn run_validate(bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    let mut validation = bucket.validate();
    let mut discrepancies = 0usize;

    for discrepancy in validation.by_ref() {
        writeln!(out, "{}", discrepancy)?;
        discrepancies += 1;
    }

    info!(
        root = %bucket.root().display(),
        objects_checked = validation.objects_checked(),
        discrepancies,
        "Validation finished"
    );
    Ok(if discrepancies == 0 { 0 } else { 1 })
}
