//! Document serializer: renders an ordered block sequence (or pre-joined
//! text) into the final chapter string for the chosen export mode.

use crate::export::extract::STOP_MARKER;
use crate::model::ContentBlock;

/// Export target selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Markdown,
    Text,
}

impl ExportMode {
    pub fn extension(self) -> &'static str {
        match self {
            ExportMode::Markdown => "md",
            ExportMode::Text => "txt",
        }
    }
}

/// Render one block to its markdown line. Headings carry a trailing newline
/// so they are followed by a blank line after joining.
fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading { level, text } => {
            format!("{} {}\n", "#".repeat(*level as usize), text)
        }
        ContentBlock::Text { text } => text.clone(),
        ContentBlock::Image {
            alt, relative_path, ..
        } => format!("![{}]({})", alt, relative_path),
    }
}

/// Render the block sequence as markdown. Block order is preserved; a
/// trailing newline is appended to the whole document.
pub fn render_markdown(blocks: &[ContentBlock]) -> String {
    let mut doc = blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n");
    doc.push('\n');
    doc
}

/// Text mode: paragraphs are already joined by the extractor; only the
/// trailing newline is added here.
pub fn render_text(text: &str) -> String {
    let mut doc = text.to_string();
    doc.push('\n');
    doc
}

/// Degraded path for chapters whose content root is missing: convert the
/// full page HTML through a generic HTML-to-markdown transform, then apply
/// the same stop-marker truncation.
pub fn fallback_markdown(full_page_html: &str) -> String {
    let mut md = html2md::parse_html(full_page_html);
    if let Some(index) = md.find(STOP_MARKER) {
        md.truncate(index);
    }
    let mut doc = md.trim_end().to_string();
    doc.push('\n');
    doc
}
