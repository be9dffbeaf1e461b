//! 通用工具函数模块
//!
//! 提供路径处理与文件系统操作等通用工具。

pub mod fs;
pub mod path;

pub use fs::*;
pub use path::*;
