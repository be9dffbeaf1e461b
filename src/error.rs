use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/**
 * 存储引擎错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 所有错误都是按文件报告的：单个文件失败不会中止批量操作
 */
#[derive(Error, Debug, Diagnostic)]
pub enum BucketError {
    #[error("IO error: {0}")]
    #[diagnostic(code(bucket::io_error))]
    Io(#[from] std::io::Error),

    #[error("IO error: {message}")]
    #[diagnostic(code(bucket::io_error_detailed))]
    IoDetailed {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Format error: {0}")]
    #[diagnostic(
        code(bucket::format_error),
        help("Digests are lowercase hex strings of 40 (sha1) or 64 (sha256) characters")
    )]
    Format(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(bucket::not_found))]
    NotFound(String),

    #[error("Metadata error: {message}")]
    #[diagnostic(
        code(bucket::metadata_error),
        help("Check that the filesystem supports user extended attributes, or use the sidecar backend")
    )]
    Metadata {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Unsupported on this platform: {0}")]
    #[diagnostic(code(bucket::unsupported_platform))]
    UnsupportedPlatform(String),
}

impl BucketError {
    /**
     * 创建详细的IO错误
     */
    pub fn io_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        BucketError::IoDetailed {
            message: message.into(),
            path,
        }
    }

    /**
     * 创建格式错误
     */
    pub fn format_error(message: impl Into<String>) -> Self {
        BucketError::Format(message.into())
    }

    /**
     * 创建未找到错误
     */
    pub fn not_found(message: impl Into<String>) -> Self {
        BucketError::NotFound(message.into())
    }

    /**
     * 创建元数据错误
     */
    pub fn metadata_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        BucketError::Metadata {
            message: message.into(),
            path,
        }
    }

    /// Whether this error means the object (or one of its attributes) is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            BucketError::NotFound(_) => true,
            BucketError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, BucketError>;
