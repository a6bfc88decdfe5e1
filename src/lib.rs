//! qqbook: CLI exporter for QQ Reader books, writing per-chapter Markdown or plain text.

pub mod browser;
pub mod cli;
pub mod config;
pub mod export;
pub mod formats;
pub mod model;

// Re-exports for CLI and consumers.
pub use browser::{BrowserConfig, ChromeSession};
pub use export::{
    chapter_action, export_book, parse_ignore_spec, AssetClient, AssetClientBuilder,
    BookSource, ChapterAction, ExportError, ExportOptions, IgnoreSet,
};
pub use formats::ExportMode;
pub use model::{ChapterMeta, ChapterPage, ContentBlock, ExportSummary};
