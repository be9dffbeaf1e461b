//! `bucket` - 命令行入口
//!
//! 负责：
//! - 解析命令行参数并加载配置
//! - 初始化日志系统
//! - 打开存储桶并分发子命令

use std::io;
use std::process::ExitCode;

use clap::Parser;
use eyre::WrapErr;

use filebucket::commands::{self, Cli};
use filebucket::{logging, FileBucket};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    // 保持 guard 存活直到进程退出，以便刷新日志文件
    let _guard = match logging::init(&config.logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    tracing::debug!("bucket v{} starting", env!("CARGO_PKG_VERSION"));

    let result = FileBucket::from_config(&config.storage)
        .wrap_err("Failed to open bucket")
        .and_then(|bucket| commands::run(&cli.command, &bucket, &mut io::stdout().lock()));

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::debug!("{e:#}");
            eprintln!("{}", commands::render_error(e));
            ExitCode::from(1)
        }
    }
}
