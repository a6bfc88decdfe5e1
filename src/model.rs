//! Canonical data model for the export pipeline.
//!
//! `ChapterMeta` mirrors one entry of the QQ Reader chapter catalog JSON
//! (`/api/book/detail/chapters`). `ContentBlock` is the semantic unit the
//! extractor produces and the serializer consumes.

use serde::{Deserialize, Deserializer, Serialize};

/// One catalog entry. Immutable once read; identifies one exportable unit.
///
/// The catalog encodes `free` and `purchased` as 0/1 integers; they are
/// decoded to bools here so the access filter reads naturally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterMeta {
    #[serde(rename = "cid")]
    pub id: u64,
    #[serde(rename = "chapterName")]
    pub title: String,
    #[serde(rename = "free", deserialize_with = "int_flag", default)]
    pub is_free: bool,
    #[serde(rename = "purchased", deserialize_with = "int_flag", default)]
    pub is_purchased: bool,
}

/// Accept 0/1 (or any integer) where the catalog means a boolean.
fn int_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let v = i64::deserialize(deserializer)?;
    Ok(v != 0)
}

/// One semantic unit of extracted chapter content, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Chapter or section heading. `level` is 1 or 2.
    Heading { level: u8, text: String },
    /// Paragraph text with inline emphasis markup already applied
    /// (`*italic*` / `**bold**` wrapping happens at extraction time).
    Text { text: String },
    /// Reference to an embedded image. `relative_path` is
    /// `images/{chapterId}/{filename}` with query parameters stripped.
    Image {
        alt: String,
        source_url: String,
        relative_path: String,
    },
}

/// What the page-render collaborator handed back for one chapter.
#[derive(Debug, Clone)]
pub enum ChapterPage {
    /// Inner HTML of the reader content root. Primary path.
    Content(String),
    /// Full page HTML; the content root was missing. Degraded path:
    /// serialized through the generic HTML-to-markdown fallback.
    Raw(String),
}

/// Outcome of a full export run.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Chapter files written, in catalog order.
    pub written: Vec<std::path::PathBuf>,
    pub skipped_paid: u32,
    pub skipped_ignored: u32,
    /// Chapters that failed (asset fetch or render failure) and were not written.
    pub failed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_meta_decodes_catalog_json() {
        let json = r#"{"cid":42,"chapterName":"第一章 起点","free":1,"purchased":0}"#;
        let meta: ChapterMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.id, 42);
        assert_eq!(meta.title, "第一章 起点");
        assert!(meta.is_free);
        assert!(!meta.is_purchased);
    }

    #[test]
    fn chapter_meta_int_flags_nonzero_is_true() {
        let json = r#"{"cid":7,"chapterName":"Locked","free":0,"purchased":1}"#;
        let meta: ChapterMeta = serde_json::from_str(json).unwrap();
        assert!(!meta.is_free);
        assert!(meta.is_purchased);
    }

    #[test]
    fn chapter_meta_missing_flags_default_false() {
        let json = r#"{"cid":1,"chapterName":"Intro"}"#;
        let meta: ChapterMeta = serde_json::from_str(json).unwrap();
        assert!(!meta.is_free);
        assert!(!meta.is_purchased);
    }

    #[test]
    fn catalog_array_decodes_in_order() {
        let json = r#"[
            {"cid":1,"chapterName":"A","free":1,"purchased":0},
            {"cid":2,"chapterName":"B","free":0,"purchased":0}
        ]"#;
        let catalog: Vec<ChapterMeta> = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].id, 1);
        assert_eq!(catalog[1].id, 2);
    }
}
