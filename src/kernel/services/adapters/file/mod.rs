//! 文件系统适配器
//!
//! 目前只有本地磁盘实现

pub mod local;

pub use local::LocalFileSystem;
