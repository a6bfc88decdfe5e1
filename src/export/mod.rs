//! Export pipeline: access filter, block extraction, asset materialization,
//! serialization, and the orchestrator that drives them per chapter.

pub mod assets;
mod error;
pub mod extract;
pub mod filter;

pub use assets::{AssetClient, AssetClientBuilder, AssetDescriptor};
pub use error::ExportError;
pub use filter::{chapter_action, parse_ignore_spec, ChapterAction, IgnoreSet};

use crate::formats::{fallback_markdown, render_markdown, render_text, ExportMode};
use crate::model::{ChapterMeta, ChapterPage, ContentBlock, ExportSummary};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed politeness delay between chapter page loads. Not adaptive.
pub const DEFAULT_CHAPTER_DELAY: Duration = Duration::from_millis(500);

/// Catalog and page-render collaborator boundary. The concrete
/// implementation is [ChromeSession](crate::browser::ChromeSession); tests
/// substitute an in-memory source.
pub trait BookSource {
    /// Ordered chapter catalog for one book. An empty or absent catalog is a
    /// fatal precondition for the run.
    fn catalog(&mut self, book_id: u64) -> Result<Vec<ChapterMeta>, ExportError>;

    /// Render one chapter and hand back its content root (or the full page
    /// when the root is missing).
    fn chapter_page(&mut self, book_id: u64, chapter_id: u64) -> Result<ChapterPage, ExportError>;
}

/// Options for one export run.
pub struct ExportOptions<'a> {
    pub ignore: &'a IgnoreSet,
    pub mode: ExportMode,
    pub output_dir: &'a Path,
    /// Called as (done, total) after each processed catalog entry.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    /// Delay between chapters. [DEFAULT_CHAPTER_DELAY] in production; tests
    /// set zero.
    pub chapter_delay: Duration,
}

/// Strip whitespace and path-separator characters from a chapter title so
/// the generated filename is safe on every platform. Idempotent.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '/' && *c != '\\')
        .collect()
}

/// Deterministic chapter filename: `{chapterId}-{sanitizedTitle}.{ext}`.
pub fn chapter_filename(id: u64, title: &str, mode: ExportMode) -> String {
    format!("{}-{}.{}", id, sanitize_title(title), mode.extension())
}

/// Serialized chapter plus the assets it references.
struct RenderedChapter {
    content: String,
    assets: Vec<ContentBlock>,
}

/// Run the extraction and serialization passes for one rendered page.
fn render_chapter(page: &ChapterPage, chapter_id: u64, mode: ExportMode) -> RenderedChapter {
    match (page, mode) {
        (ChapterPage::Content(html), ExportMode::Markdown) => {
            let blocks = extract::extract_blocks(html, chapter_id);
            let assets = blocks
                .iter()
                .filter(|b| matches!(b, ContentBlock::Image { .. }))
                .cloned()
                .collect();
            RenderedChapter {
                content: render_markdown(&blocks),
                assets,
            }
        }
        (ChapterPage::Content(html), ExportMode::Text) => RenderedChapter {
            content: render_text(&extract::extract_text(html)),
            assets: Vec::new(),
        },
        // Content root missing: degraded generic conversion, no images.
        (ChapterPage::Raw(html), _) => RenderedChapter {
            content: fallback_markdown(html),
            assets: Vec::new(),
        },
    }
}

/// Sequentially process the catalog: filter, render, extract, materialize
/// assets, serialize, persist. One chapter at a time; a fixed delay between
/// page loads.
pub fn export_book(
    source: &mut dyn BookSource,
    assets: &AssetClient,
    book_id: u64,
    options: &ExportOptions<'_>,
) -> Result<ExportSummary, ExportError> {
    let catalog = source.catalog(book_id)?;
    if catalog.is_empty() {
        return Err(ExportError::EmptyCatalog { book_id });
    }

    std::fs::create_dir_all(options.output_dir).map_err(|e| ExportError::CreateDir {
        path: options.output_dir.to_path_buf(),
        source: e,
    })?;

    let total = catalog.len() as u32;
    let mut summary = ExportSummary::default();
    let mut done = 0u32;
    let mut first_fetch = true;

    for meta in &catalog {
        done += 1;
        if let Some(ref p) = options.progress {
            p(done, total);
        }

        match chapter_action(meta, options.ignore) {
            ChapterAction::SkipPaid => {
                eprintln!("Chapter {}: paid and not purchased. Skipped.", meta.id);
                summary.skipped_paid += 1;
                continue;
            }
            ChapterAction::SkipIgnored => {
                eprintln!("Chapter {}: listed in --ignore. Skipped.", meta.id);
                summary.skipped_ignored += 1;
                continue;
            }
            ChapterAction::Fetch => {}
        }

        // Politeness delay between page loads, not before the first one.
        if !first_fetch && !options.chapter_delay.is_zero() {
            std::thread::sleep(options.chapter_delay);
        }
        first_fetch = false;

        let page = match source.chapter_page(book_id, meta.id) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Chapter {}: could not render page: {}. Failed.", meta.id, e);
                summary.failed += 1;
                continue;
            }
        };
        if matches!(page, ChapterPage::Raw(_)) {
            eprintln!(
                "Chapter {}: content root missing, using generic conversion.",
                meta.id
            );
        }

        let rendered = render_chapter(&page, meta.id, options.mode);

        // Asset failures fail this chapter's export; the run continues.
        let mut asset_failed = false;
        for block in &rendered.assets {
            if let Some(desc) = AssetDescriptor::from_block(block, options.output_dir) {
                if let Err(e) = assets.materialize(&desc) {
                    eprintln!("Chapter {}: {}. Export failed.", meta.id, e);
                    asset_failed = true;
                    break;
                }
            }
        }
        if asset_failed {
            summary.failed += 1;
            continue;
        }

        let path = options
            .output_dir
            .join(chapter_filename(meta.id, &meta.title, options.mode));
        std::fs::write(&path, &rendered.content).map_err(|e| ExportError::WriteChapter {
            path: path.clone(),
            source: e,
        })?;
        eprintln!("Wrote {}", path.display());
        summary.written.push(path);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// In-memory collaborator recording which chapters were rendered.
    struct FakeSource {
        catalog: Vec<ChapterMeta>,
        pages: Vec<(u64, ChapterPage)>,
        rendered: RefCell<Vec<u64>>,
    }

    impl BookSource for FakeSource {
        fn catalog(&mut self, _book_id: u64) -> Result<Vec<ChapterMeta>, ExportError> {
            Ok(self.catalog.clone())
        }

        fn chapter_page(
            &mut self,
            _book_id: u64,
            chapter_id: u64,
        ) -> Result<ChapterPage, ExportError> {
            self.rendered.borrow_mut().push(chapter_id);
            let page = self
                .pages
                .iter()
                .find(|(id, _)| *id == chapter_id)
                .map(|(_, p)| p.clone())
                .unwrap_or_else(|| ChapterPage::Content("<p>body</p>".to_string()));
            Ok(page)
        }
    }

    fn meta(id: u64, title: &str, free: bool, purchased: bool) -> ChapterMeta {
        ChapterMeta {
            id,
            title: title.to_string(),
            is_free: free,
            is_purchased: purchased,
        }
    }

    fn options<'a>(ignore: &'a IgnoreSet, output_dir: &'a Path) -> ExportOptions<'a> {
        ExportOptions {
            ignore,
            mode: ExportMode::Markdown,
            output_dir,
            progress: None,
            chapter_delay: Duration::ZERO,
        }
    }

    fn temp_output(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn sanitize_title_strips_whitespace_and_separators() {
        assert_eq!(sanitize_title("a b/c\\d"), "abcd");
        assert_eq!(sanitize_title("第一章 起点"), "第一章起点");
    }

    #[test]
    fn sanitize_title_is_idempotent() {
        let once = sanitize_title("My Title / Part 1");
        assert_eq!(sanitize_title(&once), once);
    }

    #[test]
    fn chapter_filename_shape() {
        assert_eq!(
            chapter_filename(3, "第一章 起点", ExportMode::Markdown),
            "3-第一章起点.md"
        );
        assert_eq!(
            chapter_filename(3, "Intro", ExportMode::Text),
            "3-Intro.txt"
        );
    }

    #[test]
    fn paid_chapter_never_reaches_the_renderer() {
        let dir = temp_output("qqbook_test_paid_skip");
        let mut source = FakeSource {
            catalog: vec![
                meta(1, "Intro", true, false),
                meta(2, "Locked", false, false),
            ],
            pages: vec![],
            rendered: RefCell::new(Vec::new()),
        };
        let assets = AssetClient::new().unwrap();
        let ignore = IgnoreSet::Empty;
        let summary = export_book(&mut source, &assets, 9, &options(&ignore, &dir)).unwrap();

        assert_eq!(source.rendered.borrow().as_slice(), &[1]);
        assert_eq!(summary.skipped_paid, 1);
        assert_eq!(summary.written.len(), 1);
        assert!(dir.join("1-Intro.md").exists());
        assert!(!dir.join("2-Locked.md").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn ignore_range_limits_fetches() {
        let dir = temp_output("qqbook_test_ignore_range");
        let mut source = FakeSource {
            catalog: (1..=5).map(|i| meta(i, "Ch", true, false)).collect(),
            pages: vec![],
            rendered: RefCell::new(Vec::new()),
        };
        let assets = AssetClient::new().unwrap();
        let ignore = parse_ignore_spec("2-4").unwrap();
        let summary = export_book(&mut source, &assets, 9, &options(&ignore, &dir)).unwrap();

        assert_eq!(source.rendered.borrow().as_slice(), &[1, 5]);
        assert_eq!(summary.skipped_ignored, 3);
        assert_eq!(summary.written.len(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_catalog_is_fatal() {
        let dir = temp_output("qqbook_test_empty_catalog");
        let mut source = FakeSource {
            catalog: vec![],
            pages: vec![],
            rendered: RefCell::new(Vec::new()),
        };
        let assets = AssetClient::new().unwrap();
        let ignore = IgnoreSet::Empty;
        let result = export_book(&mut source, &assets, 9, &options(&ignore, &dir));
        assert!(matches!(
            result,
            Err(ExportError::EmptyCatalog { book_id: 9 })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn stop_marker_content_is_truncated_in_written_file() {
        let dir = temp_output("qqbook_test_stop_marker");
        let html = format!(
            "<p>body text</p><p>notes {} trailing</p><p>more</p>",
            extract::STOP_MARKER
        );
        let mut source = FakeSource {
            catalog: vec![meta(1, "Intro", true, false)],
            pages: vec![(1, ChapterPage::Content(html))],
            rendered: RefCell::new(Vec::new()),
        };
        let assets = AssetClient::new().unwrap();
        let ignore = IgnoreSet::Empty;
        export_book(&mut source, &assets, 9, &options(&ignore, &dir)).unwrap();

        let written = std::fs::read_to_string(dir.join("1-Intro.md")).unwrap();
        assert!(written.contains("body text"));
        assert!(!written.contains("trailing"));
        assert!(!written.contains("more"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn raw_page_uses_fallback_conversion() {
        let dir = temp_output("qqbook_test_fallback");
        let mut source = FakeSource {
            catalog: vec![meta(4, "NoRoot", true, false)],
            pages: vec![(
                4,
                ChapterPage::Raw("<html><body><p>fallback body</p></body></html>".to_string()),
            )],
            rendered: RefCell::new(Vec::new()),
        };
        let assets = AssetClient::new().unwrap();
        let ignore = IgnoreSet::Empty;
        let summary = export_book(&mut source, &assets, 9, &options(&ignore, &dir)).unwrap();

        assert_eq!(summary.written.len(), 1);
        let written = std::fs::read_to_string(dir.join("4-NoRoot.md")).unwrap();
        assert!(written.contains("fallback body"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn text_mode_writes_txt_without_markup() {
        let dir = temp_output("qqbook_test_text_mode");
        let html = r#"<h1 class="firstTitle">T</h1><p>one <em>two</em></p>"#.to_string();
        let mut source = FakeSource {
            catalog: vec![meta(2, "Plain", true, false)],
            pages: vec![(2, ChapterPage::Content(html))],
            rendered: RefCell::new(Vec::new()),
        };
        let assets = AssetClient::new().unwrap();
        let ignore = IgnoreSet::Empty;
        let mut opts = options(&ignore, &dir);
        opts.mode = ExportMode::Text;
        export_book(&mut source, &assets, 9, &opts).unwrap();

        let written = std::fs::read_to_string(dir.join("2-Plain.txt")).unwrap();
        assert_eq!(written, "one two\n");
        std::fs::remove_dir_all(&dir).ok();
    }
}
