//! Command-line shell over [`FileBucket`]
//!
//! Each subcommand is a thin `run_*` function that calls the engine, writes
//! its results to the given writer and returns a process exit code. Per-file
//! failures are logged and turn into exit code 1; they never stop a batch.

pub mod add;
pub mod list;
pub mod show;
pub mod validate;

use crate::config::BucketConfig;
use crate::error::BucketError;
use crate::storage::{FileBucket, MetadataBackend};
use clap::{Parser, Subcommand};
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;

pub use add::{run_add, AddArgs};
pub use list::run_list;
pub use show::{run_get, run_info, run_link, DigestArgs, LinkArgs};
pub use validate::run_validate;

/// Content-addressable file bucket
///
/// Stores files under the git blob digest of their content, one directory
/// level per digest character, and validates stored objects.
#[derive(Parser, Debug)]
#[command(name = "bucket", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a TOML configuration file.
    #[arg(long, global = true, env = "FILEBUCKET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bucket root directory (overrides `storage.root`).
    #[arg(short, long, value_name = "DIR", global = true)]
    pub bucket: Option<PathBuf>,

    /// Where object metadata is kept: xattr or sidecar.
    #[arg(long, value_name = "BACKEND", global = true)]
    pub metadata_backend: Option<MetadataBackend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store files in the bucket.
    Add(AddArgs),

    /// List stored objects and their content types.
    List,

    /// Print the stored path of an object.
    Get(DigestArgs),

    /// Print the recorded metadata of an object as JSON.
    Info(DigestArgs),

    /// Create `<digest>.<ext>` aliases for an object.
    Link(LinkArgs),

    /// Check every stored object against its path, content and metadata.
    Validate,
}

impl Cli {
    /// Configuration file and environment, with command-line overrides applied.
    pub fn load_config(&self) -> Result<BucketConfig> {
        let mut config = BucketConfig::load(self.config.as_deref())?;
        if let Some(root) = &self.bucket {
            config.storage.root = Some(root.clone());
        }
        if let Some(backend) = self.metadata_backend {
            config.storage.metadata_backend = backend;
        }
        Ok(config)
    }
}

/// Dispatch one subcommand against an opened bucket.
pub fn run(command: &Commands, bucket: &FileBucket, out: &mut impl Write) -> Result<u8> {
    match command {
        Commands::Add(args) => run_add(args, bucket, out),
        Commands::List => run_list(bucket, out),
        Commands::Get(args) => run_get(args, bucket, out),
        Commands::Info(args) => run_info(args, bucket, out),
        Commands::Link(args) => run_link(args, bucket, out),
        Commands::Validate => run_validate(bucket, out),
    }
}

/// Text to print for a command that failed.
///
/// Engine errors are rendered through miette so their diagnostic code and
/// help text reach the user; the outermost context line is kept on top.
pub fn render_error(error: eyre::Report) -> String {
    let context = error.to_string();
    match error.downcast::<BucketError>() {
        Ok(diagnostic) => {
            let wrapped = context != diagnostic.to_string();
            let report = miette::Report::new(diagnostic);
            let report = if wrapped { report.wrap_err(context) } else { report };
            format!("{:?}", report)
        }
        Err(error) => format!("Error: {error:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_render_error_shows_diagnostic_code() {
        let error = eyre::Report::new(BucketError::not_found("Object not found: nope.txt"));
        let rendered = render_error(error);
        assert!(rendered.contains("bucket::not_found"), "{}", rendered);
        assert!(rendered.contains("nope.txt"), "{}", rendered);
    }

    #[test]
    fn test_render_error_keeps_context() {
        let error = eyre::Report::new(BucketError::format_error("bad digest"))
            .wrap_err("Failed to open bucket");
        let rendered = render_error(error);
        assert!(rendered.contains("Failed to open bucket"), "{}", rendered);
        assert!(rendered.contains("bad digest"), "{}", rendered);
    }

    #[test]
    fn test_render_error_plain_report() {
        let rendered = render_error(eyre::eyre!("config missing"));
        assert_eq!(rendered, "Error: config missing");
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_flags() {
        let cli = Cli::try_parse_from([
            "bucket",
            "-vv",
            "--bucket",
            "/srv/bucket",
            "--metadata-backend",
            "sidecar",
            "add",
            "-m",
            "-n",
            "--prefer-ext",
            "md",
            "a.txt",
            "b.txt",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.bucket, Some(PathBuf::from("/srv/bucket")));
        assert_eq!(cli.metadata_backend, Some(MetadataBackend::Sidecar));
        match cli.command {
            Commands::Add(args) => {
                assert!(args.move_files);
                assert!(args.noop);
                assert!(!args.link);
                assert_eq!(args.prefer_ext, vec!["md".to_string()]);
                assert_eq!(args.files.len(), 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_add_requires_files() {
        assert!(Cli::try_parse_from(["bucket", "add"]).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["bucket", "--metadata-backend", "db", "list"]).is_err());
    }
}
