//! 本地文件系统
//!
//! 实现 FileSystem 端口；写入先落临时文件再 rename，避免读者看到半写状态

use crate::kernel::services::ports::file::{DirEntry, FileSystem};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file: {}", path.display()),
            ));
        }
        fs::read(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            // Symlinks are reported as such and never followed.
            let metadata = entry.metadata()?;

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
                is_symlink: metadata.is_symlink(),
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });

        Ok(entries)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".zintel-tmp");
        let tmp = path.with_file_name(tmp_name);

        fs::write(&tmp, contents)?;
        if let Ok(metadata) = fs::metadata(path) {
            let _ = fs::set_permissions(&tmp, metadata.permissions());
        }
        fs::rename(&tmp, path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/file/local.rs"]
mod tests;
