//! Service adapters: OS/runtime specific implementations (IO/async).

pub mod diagnostics;
pub mod file;
pub mod paths;
pub mod runtime;
pub mod search;
pub mod settings;

pub use diagnostics::DiagnosticsService;
pub use file::LocalFileSystem;
pub use paths::{ensure_log_dir, get_config_dir, get_log_dir};
pub use runtime::AsyncRuntime;
pub use search::{FileFilter, GlobalSearchService, SearchService, Searcher};
pub use settings::{ensure_settings_file, get_settings_path, load_settings, SettingsError};
