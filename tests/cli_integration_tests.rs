//! 命令行集成测试
//!
//! 通过 `Cli::try_parse_from` 解析参数并把输出写入内存缓冲区

mod bucket_test_helpers;

use bucket_test_helpers::corrupt_object;
use clap::Parser;
use filebucket::commands::{self, Cli};
use filebucket::storage::EMPTY_BLOB_SHA1;
use filebucket::FileBucket;
use rstest::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct CliEnv {
    temp_dir: TempDir,
}

impl CliEnv {
    fn root(&self) -> PathBuf {
        self.temp_dir.path().join("bucket")
    }

    fn source(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Run one invocation; returns (exit code, stdout).
    fn run(&self, args: &[&str]) -> (u8, String) {
        let root = self.root();
        let mut argv: Vec<String> = vec![
            "bucket".to_string(),
            "--bucket".to_string(),
            root.display().to_string(),
            "--metadata-backend".to_string(),
            "sidecar".to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));

        let cli = Cli::try_parse_from(argv).unwrap();
        let config = cli.load_config().unwrap();
        let bucket = FileBucket::from_config(&config.storage).unwrap();

        let mut out = Vec::new();
        let code = commands::run(&cli.command, &bucket, &mut out).unwrap();
        (code, String::from_utf8(out).unwrap())
    }
}

#[fixture]
fn env() -> CliEnv {
    CliEnv {
        temp_dir: TempDir::new().unwrap(),
    }
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

#[rstest]
fn test_add_then_list(env: CliEnv) {
    let notes = env.source("notes.txt", b"");
    let data = env.source("data", b"asdf");

    let (code, out) = env.run(&["add", path_str(&notes).as_str(), path_str(&data).as_str()]);
    assert_eq!(code, 0);
    assert_eq!(
        out,
        format!(
            "{} {}\n5e40c0877058c504203932e5136051cf3cd3519b {}\n",
            EMPTY_BLOB_SHA1,
            notes.display(),
            data.display()
        )
    );
    assert!(notes.exists());

    let (code, out) = env.run(&["list"]);
    assert_eq!(code, 0);
    assert_eq!(
        out,
        format!(
            "5e40c0877058c504203932e5136051cf3cd3519b -\n{} text/plain\n",
            EMPTY_BLOB_SHA1
        )
    );
}

#[rstest]
fn test_add_move_and_noop(env: CliEnv) {
    let moved = env.source("moved.txt", b"move me");
    let (code, _) = env.run(&["add", "-m", path_str(&moved).as_str()]);
    assert_eq!(code, 0);
    assert!(!moved.exists());

    let kept = env.source("kept.txt", b"keep me");
    let (code, out) = env.run(&["add", "-m", "-n", path_str(&kept).as_str()]);
    assert_eq!(code, 0);
    assert!(kept.exists());
    assert!(out.ends_with(&format!(" {}\n", kept.display())));

    let (_, listing) = env.run(&["list"]);
    assert_eq!(listing.lines().count(), 1);
}

#[rstest]
fn test_add_batch_with_missing_file(env: CliEnv) {
    let present = env.source("present.txt", b"here");
    let missing = env.temp_dir.path().join("missing.txt");

    let (code, out) = env.run(&["add", path_str(&missing).as_str(), path_str(&present).as_str()]);
    assert_eq!(code, 1);
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("present.txt"));
}

#[rstest]
fn test_get_and_info(env: CliEnv) {
    let notes = env.source("notes.txt", b"");
    env.run(&["add", path_str(&notes).as_str()]);

    let (code, out) = env.run(&["get", EMPTY_BLOB_SHA1]);
    assert_eq!(code, 0);
    assert!(out.trim_end().ends_with(EMPTY_BLOB_SHA1));
    assert!(Path::new(out.trim_end()).is_file());

    let (code, out) = env.run(&["info", EMPTY_BLOB_SHA1]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["sha1"], EMPTY_BLOB_SHA1);
    assert_eq!(json["original-filename"], "notes.txt");
    assert_eq!(json["Content-Type"], "text/plain");

    let (code, out) = env.run(&["get", "5e40c0877058c504203932e5136051cf3cd3519b"]);
    assert_eq!(code, 1);
    assert!(out.is_empty());
}

#[rstest]
fn test_validate_reports_corruption(env: CliEnv) {
    let notes = env.source("notes.txt", b"");
    env.run(&["add", path_str(&notes).as_str()]);

    let (code, out) = env.run(&["validate"]);
    assert_eq!(code, 0);
    assert!(out.is_empty());

    let (_, path) = env.run(&["get", EMPTY_BLOB_SHA1]);
    corrupt_object(Path::new(path.trim_end()), b"asdf");

    let (code, out) = env.run(&["validate"]);
    assert_eq!(code, 1);
    assert_eq!(out.lines().count(), 2);
    assert!(out.contains("does not match calculated hash"));
    assert!(out.contains("does not match stored hash"));
}

#[cfg(unix)]
#[rstest]
fn test_link_prints_created_aliases(env: CliEnv) {
    let readme = env.source("README", b"plain words");
    env.run(&["add", path_str(&readme).as_str()]);

    let (_, listing) = env.run(&["list"]);
    let stored = listing.split_whitespace().next().unwrap().to_string();
    assert!(listing.trim_end().ends_with(" -"));

    let (code, out) = env.run(&["link", "--prefer-ext", "md", stored.as_str()]);
    assert_eq!(code, 0);
    assert_eq!(out.lines().count(), 1);
    assert!(out.trim_end().ends_with(&format!("{}.md", stored)));

    let (code, out) = env.run(&["link", "--prefer-ext", "md", stored.as_str()]);
    assert_eq!(code, 0);
    assert!(out.is_empty());
}

#[rstest]
fn test_invalid_digest_is_an_error(env: CliEnv) {
    let cli = Cli::try_parse_from([
        "bucket",
        "--bucket",
        path_str(&env.root()).as_str(),
        "--metadata-backend",
        "sidecar",
        "get",
        "not-a-digest",
    ])
    .unwrap();
    let config = cli.load_config().unwrap();
    let bucket = FileBucket::from_config(&config.storage).unwrap();

    let mut out = Vec::new();
    assert!(commands::run(&cli.command, &bucket, &mut out).is_err());
}
