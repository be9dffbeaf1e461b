//! 文件系统操作工具
//!
//! 幂等目录创建、原子复制、跨文件系统移动与符号链接。

use crate::error::{BucketError, Result};
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// 确保目录存在（幂等）
///
/// 直接依赖 `create_dir_all` 的原生幂等语义，不做“先检查再创建”，
/// 因此并发调用之间没有竞争窗口。已存在的目录视为成功；
/// 路径被普通文件占用或其他失败返回错误。
///
/// # 参数
///
/// - `path` - 目录路径
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(BucketError::io_error(
            format!("Failed to create directory: {}", e),
            Some(path.to_path_buf()),
        )),
    }
}

/// 移动文件
///
/// 优先使用 `rename`；跨文件系统时退化为复制后删除源文件。
/// 源文件不存在（例如被另一个并发的移动操作抢先取走）时返回
/// `BucketError::NotFound`，调用方可按单个文件处理该错误。
///
/// 源路径是符号链接时移动的是链接指向的内容：先复制目标文件，再删除链接。
/// 源与目标是同一 inode 的两个硬链接时 `rename` 不做任何事，此时直接删除源路径。
///
/// # 参数
///
/// - `from` - 源文件
/// - `to` - 目标路径（已存在则被覆盖）
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    let source_meta = fs::symlink_metadata(from).map_err(|e| source_error(from, e))?;
    if source_meta.file_type().is_symlink() {
        debug!(
            from = %from.display(),
            to = %to.display(),
            "Source is a symbolic link, copying its target"
        );
        copy_file(from, to)?;
        return remove_file(from);
    }

    match fs::rename(from, to) {
        Ok(()) => {
            // both names were hard links to one inode
            if fs::symlink_metadata(from).is_ok() {
                remove_file(from)?;
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound && !from.exists() => Err(
            BucketError::not_found(format!("Source file vanished: {}", from.display())),
        ),
        Err(e) => {
            debug!(
                from = %from.display(),
                to = %to.display(),
                error = %e,
                "rename failed, falling back to copy and remove"
            );
            copy_file(from, to)?;
            remove_file(from)
        }
    }
}

/// 原子复制文件（覆盖目标）
///
/// 内容先写入目标目录中的临时文件，再重命名到目标路径：
/// 目标原有的 inode 从不被截断，与之硬链接的源文件保持不变，
/// 并发读者只会看到旧内容或完整的新内容。符号链接源按其目标内容复制。
///
/// # 返回值
///
/// 复制的字节数
pub fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    let dir = match to.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut source = File::open(from).map_err(|e| source_error(from, e))?;
    let permissions = source
        .metadata()
        .map_err(|e| source_error(from, e))?
        .permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        BucketError::io_error(
            format!("Failed to create temporary object: {}", e),
            Some(dir.to_path_buf()),
        )
    })?;
    let bytes = io::copy(&mut source, tmp.as_file_mut()).map_err(|e| {
        BucketError::io_error(
            format!("Failed to copy {} into bucket: {}", from.display(), e),
            Some(tmp.path().to_path_buf()),
        )
    })?;
    tmp.as_file().set_permissions(permissions).map_err(|e| {
        BucketError::io_error(
            format!("Failed to set object permissions: {}", e),
            Some(tmp.path().to_path_buf()),
        )
    })?;
    tmp.persist(to).map_err(|e| {
        BucketError::io_error(
            format!("Failed to place object: {}", e.error),
            Some(to.to_path_buf()),
        )
    })?;

    Ok(bytes)
}

/// 删除单个文件；符号链接只删除链接本身
pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| {
        BucketError::io_error(
            format!("Failed to remove moved source file: {}", e),
            Some(path.to_path_buf()),
        )
    })
}

fn source_error(from: &Path, e: io::Error) -> BucketError {
    if e.kind() == ErrorKind::NotFound {
        BucketError::not_found(format!("Source file not found: {}", from.display()))
    } else {
        BucketError::io_error(
            format!("Failed to read source file: {}", e),
            Some(from.to_path_buf()),
        )
    }
}

/// 创建指向 `target` 的文件符号链接 `link`
///
/// `target` 按原样写入链接（相对路径相对于链接所在目录解析）。
pub fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(target, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");
        assert!(!temp_dir.path().join("a").exists());

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_blocked_by_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("a");
        fs::write(&blocker, b"file").unwrap();

        let result = ensure_dir(&blocker.join("b"));
        assert!(matches!(result, Err(BucketError::IoDetailed { .. })));
    }

    #[test]
    fn test_move_file() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from.txt");
        let to = temp_dir.path().join("to.txt");
        fs::write(&from, b"payload").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"payload");
    }

    #[test]
    fn test_move_missing_source_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = move_file(
            &temp_dir.path().join("gone.txt"),
            &temp_dir.path().join("to.txt"),
        );
        assert!(matches!(result, Err(BucketError::NotFound(_))));
    }

    #[test]
    fn test_copy_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from.txt");
        let to = temp_dir.path().join("to.txt");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old content").unwrap();

        assert_eq!(copy_file(&from, &to).unwrap(), 3);
        assert_eq!(fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_copy_onto_hard_link_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let stored = temp_dir.path().join("stored");
        let linked = temp_dir.path().join("linked");
        fs::write(&stored, b"precious bytes").unwrap();
        fs::hard_link(&stored, &linked).unwrap();

        assert_eq!(copy_file(&linked, &stored).unwrap(), 14);
        assert_eq!(fs::read(&stored).unwrap(), b"precious bytes");
        assert_eq!(fs::read(&linked).unwrap(), b"precious bytes");
    }

    #[test]
    fn test_copy_leaves_no_temporary_files() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from.txt");
        let dest_dir = temp_dir.path().join("dest");
        fs::create_dir(&dest_dir).unwrap();
        fs::write(&from, b"payload").unwrap();

        copy_file(&from, &dest_dir.join("to.txt")).unwrap();
        let names: Vec<_> = fs::read_dir(&dest_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("to.txt")]);
    }

    #[test]
    fn test_move_hard_link_onto_itself_removes_source() {
        let temp_dir = TempDir::new().unwrap();
        let stored = temp_dir.path().join("stored");
        let linked = temp_dir.path().join("linked");
        fs::write(&stored, b"payload").unwrap();
        fs::hard_link(&stored, &linked).unwrap();

        move_file(&linked, &stored).unwrap();
        assert!(!linked.exists());
        assert_eq!(fs::read(&stored).unwrap(), b"payload");
    }

    #[cfg(unix)]
    #[test]
    fn test_move_symlink_copies_target() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real.txt");
        let link = temp_dir.path().join("link.txt");
        let to = temp_dir.path().join("to.txt");
        fs::write(&real, b"target bytes").unwrap();
        symlink_file(Path::new("real.txt"), &link).unwrap();

        move_file(&link, &to).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(fs::symlink_metadata(&to).unwrap().file_type().is_file());
        assert_eq!(fs::read(&to).unwrap(), b"target bytes");
        assert_eq!(fs::read(&real).unwrap(), b"target bytes");
    }
}
