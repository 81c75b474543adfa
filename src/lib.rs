//! zintel - 编辑器语言智能内核
//!
//! 模块结构：
//! - kernel::buffer: 不可变快照与坐标索引
//! - kernel::diagnostics: 语法与静态检查
//! - kernel::search / replace: 单文件与多文件搜索、替换
//! - kernel::host: 防抖调度与结果发布
//! - kernel::services: ports（契约）与 adapters（IO/异步实现）

pub mod kernel;
