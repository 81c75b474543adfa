//! 文件系统端口
//!
//! 搜索 / 跨文件替换只通过该 trait 访问磁盘，测试可以换成内存实现

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    pub size: u64,
}

pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Entries of `path`, in a stable order (directories are not recursed).
    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}
