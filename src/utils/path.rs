//! 路径处理工具函数
//!
//! 提供跨平台的路径规范化与同一文件判断。

use std::io;
use std::path::{Path, PathBuf};

/// 规范化路径
///
/// 在 Windows 上使用 dunce 去除 UNC 前缀，在 Unix-like 系统上使用标准规范化。
///
/// # 参数
///
/// - `path` - 需要规范化的路径（必须存在）
///
/// # 返回值
///
/// - `Ok(PathBuf)` - 规范化后的路径
/// - `Err(io::Error)` - 路径不存在或无法访问
pub fn canonicalize_path(path: &Path) -> io::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        dunce::canonicalize(path)
    }
    #[cfg(not(target_os = "windows"))]
    {
        path.canonicalize()
    }
}

/// 判断两个路径是否指向同一个已存在的文件
///
/// 任一路径不存在时返回 `false`。用于避免把存储对象复制到它自身上
/// （`fs::copy` 会先截断目标文件）。
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (canonicalize_path(a), canonicalize_path(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
