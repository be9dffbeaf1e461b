//! `bucket add`

use crate::storage::{AddOptions, FileBucket, LinkOptions};
use clap::Args;
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Arguments for `bucket add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Move, rather than copy, files into the bucket.
    #[arg(short = 'm', long = "move")]
    pub move_files: bool,

    /// Only report where files would be stored.
    #[arg(short = 'n', long)]
    pub noop: bool,

    /// Also create extension aliases for each stored file.
    #[arg(long)]
    pub link: bool,

    /// Extension to alias first (repeatable). Implies --link.
    #[arg(long = "prefer-ext", value_name = "EXT")]
    pub prefer_ext: Vec<String>,

    /// Files to store in the bucket.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

impl AddArgs {
    fn options(&self) -> AddOptions {
        let options = if self.move_files {
            AddOptions::moving()
        } else {
            AddOptions::copy()
        };
        options.dry_run(self.noop)
    }

    fn wants_links(&self) -> bool {
        !self.noop && (self.link || !self.prefer_ext.is_empty())
    }
}

/// Store every file; prints `<digest> <file>` per stored file.
pub fn run_add(args: &AddArgs, bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    let options = args.options();
    let link_options = LinkOptions::with_preferred(args.prefer_ext.iter().cloned());
    let mut failures = 0usize;

    for file in &args.files {
        let digest = match bucket.add(file, &options) {
            Ok(digest) => digest,
            Err(e) => {
                error!(file = %file.display(), error = %e, "Failed to add file");
                failures += 1;
                continue;
            }
        };
        writeln!(out, "{} {}", digest, file.display())?;

        if args.wants_links() {
            match bucket.link_extensions(&digest, &link_options) {
                Ok(report) if !report.is_complete() => {
                    warn!(
                        digest = %digest,
                        failed = report.failed.len(),
                        "Some extension aliases were not created"
                    );
                    failures += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(digest = %digest, error = %e, "Failed to link extensions");
                    failures += 1;
                }
            }
        }
    }

    info!(
        files = args.files.len(),
        failures,
        dry_run = args.noop,
        "Add finished"
    );
    Ok(if failures == 0 { 0 } else { 1 })
}
