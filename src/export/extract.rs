//! DOM block extractor: converts the rendered chapter content into an
//! ordered sequence of [ContentBlock]s.
//!
//! The reader DOM is irregular: headings arrive both as real `h1`/`h2`
//! elements and as paragraphs carrying section-header classes, emphasis is
//! signalled by class names, tag names, or inline styles, and images sit
//! inside dedicated wrapper elements. The classification table below keeps
//! that dispatch explicit and testable without a live page.

use crate::model::ContentBlock;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

/// In-text token marking the start of back matter (bibliography). Everything
/// from the element containing it onward is excluded from the export.
pub const STOP_MARKER: &str = "◆参考书目";

/// Base against which relative image `src` attributes are resolved.
const SITE_BASE: &str = "https://book.qq.com/";

/// Chapter title heading class.
const FIRST_TITLE_CLASS: &str = "firstTitle";
/// Section title heading class.
const SECOND_TITLE_CLASS: &str = "secondTitle";
/// In-body illustration wrapper class.
const BODY_PIC_CLASS: &str = "bodyPic";
/// Cover image wrapper class (a heading element in the reader DOM).
const FRONT_COVER_CLASS: &str = "frontCover";
/// Paragraph classes whose text children are section headers, not body text.
const SECTION_HEADER_CLASSES: &[&str] = &["sectionTitle", "subTitle"];
/// Inline emphasis classes.
const ITALIC_CLASS: &str = "italic";
const BOLD_CLASS: &str = "bold";

/// Candidate content elements, matched in document order.
const CONTENT_SELECTOR: &str = "p, h1, h2, .bodyPic, .frontCover";

/// Structural role of one candidate element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    FirstTitle,
    SecondTitle,
    /// Paragraph whose text children become level-2 headings.
    SectionHeader,
    Paragraph,
    /// `bodyPic` or `frontCover` wrapper around an `<img>`.
    ImageWrapper,
}

/// Map a structural signature (tag name + class set) to a node class.
/// Image wrappers win over the heading tags because the cover wrapper is
/// itself a heading element.
pub fn classify<'a>(tag: &str, classes: impl Iterator<Item = &'a str>) -> Option<NodeClass> {
    let mut has_first = false;
    let mut has_second = false;
    let mut has_section_header = false;
    for class in classes {
        match class {
            c if c == BODY_PIC_CLASS || c == FRONT_COVER_CLASS => {
                return Some(NodeClass::ImageWrapper)
            }
            c if c == FIRST_TITLE_CLASS => has_first = true,
            c if c == SECOND_TITLE_CLASS => has_second = true,
            c if SECTION_HEADER_CLASSES.contains(&c) => has_section_header = true,
            _ => {}
        }
    }
    match tag {
        "h1" if has_second => Some(NodeClass::SecondTitle),
        "h1" => Some(NodeClass::FirstTitle),
        "h2" if has_first => Some(NodeClass::FirstTitle),
        "h2" => Some(NodeClass::SecondTitle),
        "p" if has_section_header => Some(NodeClass::SectionHeader),
        "p" => Some(NodeClass::Paragraph),
        _ => None,
    }
}

fn classify_element(el: ElementRef<'_>) -> Option<NodeClass> {
    classify(el.value().name(), el.value().classes())
}

/// Italic signal: dedicated class, `i`/`em` tag, or inline italic style.
fn is_italic(el: ElementRef<'_>) -> bool {
    let v = el.value();
    if v.classes().any(|c| c == ITALIC_CLASS) {
        return true;
    }
    if matches!(v.name(), "i" | "em") {
        return true;
    }
    v.attr("style")
        .map(|s| s.contains("italic"))
        .unwrap_or(false)
}

/// Bold signal on a span: dedicated class or inline bold font weight.
fn is_bold(el: ElementRef<'_>) -> bool {
    let v = el.value();
    if v.classes().any(|c| c == BOLD_CLASS) {
        return true;
    }
    if matches!(v.name(), "b" | "strong") {
        return true;
    }
    v.attr("style")
        .map(|s| s.contains("font-weight: bold") || s.contains("font-weight:bold"))
        .unwrap_or(false)
}

/// Contribution of one element child of a paragraph: emphasis wrapping is
/// applied here, at extraction time, not deferred to serialization.
fn inline_contribution(el: ElementRef<'_>) -> String {
    let text: String = el.text().collect();
    if text.is_empty() {
        return text;
    }
    if is_italic(el) {
        format!("*{}*", text)
    } else if is_bold(el) {
        format!("**{}**", text)
    } else {
        text
    }
}

/// Process one paragraph element. Appends the resulting blocks to `out` and
/// returns true when the stop marker was hit: the paragraph's partial text is
/// discarded entirely and extraction must terminate.
fn paragraph_blocks(el: ElementRef<'_>, section_header: bool, out: &mut Vec<ContentBlock>) -> bool {
    let mut accumulated = String::new();
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(t) => {
                let text: &str = t;
                if text.contains(STOP_MARKER) {
                    return true;
                }
                if section_header {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        out.push(ContentBlock::Heading {
                            level: 2,
                            text: trimmed.to_string(),
                        });
                    }
                } else {
                    accumulated.push_str(text);
                }
            }
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    accumulated.push_str(&inline_contribution(child_el));
                }
            }
            _ => {}
        }
        if accumulated.contains(STOP_MARKER) {
            return true;
        }
    }
    let text = accumulated.trim();
    if !text.is_empty() {
        out.push(ContentBlock::Text {
            text: text.to_string(),
        });
    }
    false
}

/// Derive the on-disk filename for an image: final path segment of the
/// resolved source URL with any query string stripped.
pub fn image_filename(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Build the Image block for a wrapper element, if it contains an `<img>`.
/// A wrapper without a discoverable image yields no block.
fn image_block(el: ElementRef<'_>, chapter_id: u64, img_sel: &Selector) -> Option<ContentBlock> {
    let img = el.select(img_sel).next()?;
    let src = img.value().attr("src")?;
    let base = Url::parse(SITE_BASE).ok()?;
    let resolved = base.join(src).ok()?;
    let filename = image_filename(&resolved)?;
    Some(ContentBlock::Image {
        alt: img.value().attr("alt").unwrap_or("").to_string(),
        source_url: resolved.to_string(),
        relative_path: format!("images/{}/{}", chapter_id, filename),
    })
}

/// Extract the ordered block sequence from the content-root inner HTML.
///
/// Block order is document order; no reordering happens downstream. Once the
/// stop marker is found, no further blocks are appended regardless of how
/// many sibling elements follow.
pub fn extract_blocks(html: &str, chapter_id: u64) -> Vec<ContentBlock> {
    let fragment = Html::parse_fragment(html);
    // These literals are valid selectors; parse cannot fail on them.
    let content_sel = match Selector::parse(CONTENT_SELECTOR) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let img_sel = match Selector::parse("img") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut blocks = Vec::new();
    for el in fragment.select(&content_sel) {
        match classify_element(el) {
            Some(NodeClass::ImageWrapper) => {
                if let Some(block) = image_block(el, chapter_id, &img_sel) {
                    blocks.push(block);
                }
            }
            Some(class @ (NodeClass::FirstTitle | NodeClass::SecondTitle)) => {
                let text: String = el.text().collect::<String>().trim().to_string();
                if text.contains(STOP_MARKER) {
                    break;
                }
                if !text.is_empty() {
                    let level = if class == NodeClass::FirstTitle { 1 } else { 2 };
                    blocks.push(ContentBlock::Heading { level, text });
                }
            }
            Some(NodeClass::SectionHeader) => {
                if paragraph_blocks(el, true, &mut blocks) {
                    break;
                }
            }
            Some(NodeClass::Paragraph) => {
                if paragraph_blocks(el, false, &mut blocks) {
                    break;
                }
            }
            None => {}
        }
    }
    blocks
}

/// Text-mode extraction: paragraph text only, in order, joined by newlines.
/// No styling, no images, no headings; stops at the same marker.
pub fn extract_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let p_sel = match Selector::parse("p") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };
    let mut paragraphs = Vec::new();
    for el in fragment.select(&p_sel) {
        let text: String = el.text().collect::<String>().trim().to_string();
        if text.contains(STOP_MARKER) {
            break;
        }
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    paragraphs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paragraphs_in_document_order() {
        let html = "<p>First.</p><p>Second.</p>";
        let blocks = extract_blocks(html, 1);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Text {
                    text: "First.".to_string()
                },
                ContentBlock::Text {
                    text: "Second.".to_string()
                },
            ]
        );
    }

    #[test]
    fn italic_child_variants_are_wrapped() {
        let cases = [
            r#"<p>before <span class="italic">slanted</span> after</p>"#,
            r#"<p>before <em>slanted</em> after</p>"#,
            r#"<p>before <i>slanted</i> after</p>"#,
            r#"<p>before <span style="font-style: italic">slanted</span> after</p>"#,
        ];
        for html in cases {
            let blocks = extract_blocks(html, 1);
            assert_eq!(
                blocks,
                vec![ContentBlock::Text {
                    text: "before *slanted* after".to_string()
                }],
                "case: {}",
                html
            );
        }
    }

    #[test]
    fn bold_span_is_wrapped_strong() {
        let html = r#"<p>a <span class="bold">loud</span> b</p>"#;
        let blocks = extract_blocks(html, 1);
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                text: "a **loud** b".to_string()
            }]
        );
    }

    #[test]
    fn unstyled_span_contributes_literal_text() {
        let html = r#"<p>a <span class="ornament">plain</span> b</p>"#;
        let blocks = extract_blocks(html, 1);
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                text: "a plain b".to_string()
            }]
        );
    }

    #[test]
    fn first_and_second_titles() {
        let html = r#"<h1 class="firstTitle">卷一</h1><h2 class="secondTitle">第一节</h2><p>Body.</p>"#;
        let blocks = extract_blocks(html, 1);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Heading {
                    level: 1,
                    text: "卷一".to_string()
                },
                ContentBlock::Heading {
                    level: 2,
                    text: "第一节".to_string()
                },
                ContentBlock::Text {
                    text: "Body.".to_string()
                },
            ]
        );
    }

    #[test]
    fn section_header_paragraph_emits_heading() {
        let html = r#"<p class="sectionTitle">小标题</p><p>Body.</p>"#;
        let blocks = extract_blocks(html, 1);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Heading {
                    level: 2,
                    text: "小标题".to_string()
                },
                ContentBlock::Text {
                    text: "Body.".to_string()
                },
            ]
        );
    }

    #[test]
    fn body_pic_wrapper_yields_image_block() {
        let html = r#"<div class="bodyPic"><img src="https://cdn.example.com/img/fig1.jpg?tok=abc" alt="figure one"/></div>"#;
        let blocks = extract_blocks(html, 12);
        assert_eq!(
            blocks,
            vec![ContentBlock::Image {
                alt: "figure one".to_string(),
                source_url: "https://cdn.example.com/img/fig1.jpg?tok=abc".to_string(),
                relative_path: "images/12/fig1.jpg".to_string(),
            }]
        );
    }

    #[test]
    fn front_cover_heading_wrapper_yields_image_block() {
        let html = r#"<h1 class="frontCover"><img src="/cover/987.png" alt="cover"/></h1>"#;
        let blocks = extract_blocks(html, 5);
        assert_eq!(
            blocks,
            vec![ContentBlock::Image {
                alt: "cover".to_string(),
                source_url: "https://book.qq.com/cover/987.png".to_string(),
                relative_path: "images/5/987.png".to_string(),
            }]
        );
    }

    #[test]
    fn image_wrapper_without_img_is_skipped() {
        let html = r#"<div class="bodyPic">no image here</div><p>After.</p>"#;
        let blocks = extract_blocks(html, 1);
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                text: "After.".to_string()
            }]
        );
    }

    #[test]
    fn image_path_is_deterministic_across_runs() {
        let html = r#"<div class="bodyPic"><img src="https://cdn.example.com/a/b.png?x=1"/></div>"#;
        let first = extract_blocks(html, 3);
        let second = extract_blocks(html, 3);
        assert_eq!(first, second);
        match &first[0] {
            ContentBlock::Image { relative_path, .. } => {
                assert_eq!(relative_path, "images/3/b.png");
            }
            other => panic!("expected image block, got {:?}", other),
        }
    }

    #[test]
    fn stop_marker_discards_containing_paragraph_and_rest() {
        let html = format!(
            "<p>Keep one.</p><p>body text {} trailing</p><p>Never seen.</p><h2>Later</h2>",
            STOP_MARKER
        );
        let blocks = extract_blocks(&html, 1);
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                text: "Keep one.".to_string()
            }]
        );
    }

    #[test]
    fn stop_marker_mid_paragraph_discards_partial_text() {
        // Marker arrives after a styled child: the earlier contributions of
        // the same paragraph must not leak into the output.
        let html = format!(
            "<p>Keep.</p><p>lead <em>styled</em> {}</p>",
            STOP_MARKER
        );
        let blocks = extract_blocks(&html, 1);
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                text: "Keep.".to_string()
            }]
        );
    }

    #[test]
    fn classify_table() {
        assert_eq!(
            classify("h1", ["firstTitle"].into_iter()),
            Some(NodeClass::FirstTitle)
        );
        assert_eq!(classify("h1", [].into_iter()), Some(NodeClass::FirstTitle));
        assert_eq!(
            classify("h2", ["secondTitle"].into_iter()),
            Some(NodeClass::SecondTitle)
        );
        assert_eq!(
            classify("h1", ["frontCover"].into_iter()),
            Some(NodeClass::ImageWrapper)
        );
        assert_eq!(
            classify("div", ["bodyPic"].into_iter()),
            Some(NodeClass::ImageWrapper)
        );
        assert_eq!(
            classify("p", ["sectionTitle"].into_iter()),
            Some(NodeClass::SectionHeader)
        );
        assert_eq!(
            classify("p", ["subTitle"].into_iter()),
            Some(NodeClass::SectionHeader)
        );
        assert_eq!(classify("p", [].into_iter()), Some(NodeClass::Paragraph));
        assert_eq!(classify("div", [].into_iter()), None);
    }

    #[test]
    fn extract_text_collects_paragraphs_only() {
        let html = r#"<h1 class="firstTitle">Title</h1><p>One.</p><div class="bodyPic"><img src="/a.png"/></div><p>Two.</p>"#;
        assert_eq!(extract_text(html), "One.\nTwo.");
    }

    #[test]
    fn extract_text_stops_at_marker() {
        let html = format!("<p>One.</p><p>notes {}</p><p>Two.</p>", STOP_MARKER);
        assert_eq!(extract_text(&html), "One.");
    }

    #[test]
    fn missing_content_yields_no_blocks() {
        assert!(extract_blocks("", 1).is_empty());
        assert!(extract_blocks("<div>nothing structured</div>", 1).is_empty());
    }
}
