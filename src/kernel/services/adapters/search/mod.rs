//! 搜索服务模块
//!
//! - Searcher: 单缓冲区匹配器 (literal / regex / 全词)
//! - SearchService: 单缓冲区后台搜索
//! - GlobalSearchService: 多文件搜索 (深度优先遍历 + 过滤)

mod global;
mod searcher;
mod service;

pub use global::{search_tree, FileFilter, GlobalSearchService, PROGRESS_INTERVAL};
pub use searcher::{search, Searcher};
pub use service::SearchService;
