#![allow(dead_code)]
//! Text layout and PDF rendering for passport documents.
//!
//! Paragraphs are wrapped with a greedy word-wrap driven by the standard
//! Helvetica AFM width tables, then laid onto A4 pages with a descending
//! vertical cursor. When the cursor would cross the bottom margin a new page
//! is started; content never renders past the visible page boundary.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN: f32 = 40.0;
pub const MAX_CONTENT_WIDTH: f32 = PAGE_WIDTH - MARGIN * 2.0;

const TOP_Y: f32 = 800.0;
const LINE_GAP: f32 = 2.0;
const PARAGRAPH_GAP: f32 = 6.0;
const HEADING_ADVANCE: f32 = 24.0;
const SUBHEADING_ADVANCE: f32 = 18.0;

const HEADING_SIZE: f32 = 16.0;
const SUBHEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 11.0;

const BACKGROUND: Rgb = (0.02, 0.06, 0.10);
const HEADING_COLOR: Rgb = (0.17, 0.34, 0.67);
const SUBHEADING_COLOR: Rgb = (0.9, 0.9, 0.9);
const BODY_COLOR: Rgb = (0.95, 0.95, 0.95);

type Rgb = (f32, f32, f32);

/// The two embedded standard fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    fn resource_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }

    fn base_font(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Width of `text` at `size` points, from the AFM width tables.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let table = match self {
            Font::Helvetica => &HELVETICA_WIDTHS,
            Font::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        let units: u32 = text.chars().map(|c| glyph_width(table, c)).sum();
        units as f32 * size / 1000.0
    }
}

/// Glyphs outside the printable-ASCII table get a nominal width.
const DEFAULT_GLYPH_WIDTH: u32 = 600;

fn glyph_width(table: &[u16; 95], c: char) -> u32 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        table[(code - 32) as usize] as u32
    } else {
        DEFAULT_GLYPH_WIDTH
    }
}

/// Greedy word-wrap: append each word to the current line unless the line
/// plus a space plus the word would exceed `max_width`, in which case the
/// line is flushed and the word starts a new one. A single word wider than
/// `max_width` is emitted as one oversized line — words are never split.
pub fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };
        if font.text_width(&candidate, size) > max_width && !line.is_empty() {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// One positioned line of text.
#[derive(Debug, Clone)]
struct PlacedLine {
    y: f32,
    size: f32,
    font: Font,
    color: Rgb,
    text: String,
}

/// Multi-page layout with a descending cursor.
pub struct LayoutEngine {
    pages: Vec<Vec<PlacedLine>>,
    y: f32,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: TOP_Y,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Start a new page if a line of `size` points would cross the bottom
    /// margin.
    fn ensure_room(&mut self, size: f32) {
        if self.y - size < MARGIN {
            self.pages.push(Vec::new());
            self.y = TOP_Y;
        }
    }

    fn place(&mut self, size: f32, font: Font, color: Rgb, text: String) {
        self.ensure_room(size);
        let line = PlacedLine {
            y: self.y,
            size,
            font,
            color,
            text,
        };
        // pages is never empty
        self.pages.last_mut().expect("current page").push(line);
    }

    pub fn heading(&mut self, text: &str) {
        self.place(
            HEADING_SIZE,
            Font::HelveticaBold,
            HEADING_COLOR,
            text.to_string(),
        );
        self.y -= HEADING_ADVANCE;
    }

    pub fn subheading(&mut self, text: &str) {
        self.place(
            SUBHEADING_SIZE,
            Font::HelveticaBold,
            SUBHEADING_COLOR,
            text.to_string(),
        );
        self.y -= SUBHEADING_ADVANCE;
    }

    pub fn paragraph(&mut self, text: &str) {
        self.paragraph_sized(text, BODY_SIZE);
    }

    pub fn paragraph_sized(&mut self, text: &str, size: f32) {
        for line in wrap_text(text, Font::Helvetica, size, MAX_CONTENT_WIDTH) {
            self.place(size, Font::Helvetica, BODY_COLOR, line);
            self.y -= size + LINE_GAP;
        }
        self.y -= PARAGRAPH_GAP;
    }

    /// Serialize the laid-out pages to PDF bytes.
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Font::Helvetica.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Font::HelveticaBold.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in &self.pages {
            let mut operations = vec![
                Operation::new(
                    "rg",
                    vec![
                        Object::Real(BACKGROUND.0),
                        Object::Real(BACKGROUND.1),
                        Object::Real(BACKGROUND.2),
                    ],
                ),
                Operation::new(
                    "re",
                    vec![
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(PAGE_WIDTH),
                        Object::Real(PAGE_HEIGHT),
                    ],
                ),
                Operation::new("f", vec![]),
            ];

            for line in page {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "rg",
                    vec![
                        Object::Real(line.color.0),
                        Object::Real(line.color.1),
                        Object::Real(line.color.2),
                    ],
                ));
                operations.push(Operation::new(
                    "Tf",
                    vec![line.font.resource_name().into(), Object::Real(line.size)],
                ));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Real(MARGIN), Object::Real(line.y)],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(
                        to_winansi(&line.text),
                        StringFormat::Literal,
                    )],
                ));
                operations.push(Operation::new("ET", vec![]));
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

/// Map text to WinAnsi bytes for the standard fonts; characters outside
/// latin-1 become '?'.
fn to_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

// Standard Helvetica AFM widths for chars 32..=126, in 1/1000 em units.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_scales_with_size() {
        let narrow = Font::Helvetica.text_width("Hello", 10.0);
        let wide = Font::Helvetica.text_width("Hello", 20.0);
        assert!((wide - narrow * 2.0).abs() < 0.001);
    }

    #[test]
    fn test_wrapped_lines_fit_max_width() {
        let text = "The site benefits from good access to the strategic road network \
                    and lies outside the designated green belt, although surface water \
                    flooding has been recorded along the eastern boundary.";
        let lines = wrap_text(text, Font::Helvetica, 11.0, 200.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(
                Font::Helvetica.text_width(line, 11.0) <= 200.0,
                "line too wide: {line}"
            );
        }
        // Nothing dropped.
        let rejoined = lines.join(" ");
        assert_eq!(rejoined, text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_oversized_word_emitted_whole() {
        let word = "Llanfairpwllgwyngyllgogerychwyrndrobwllllantysiliogogogoch";
        let lines = wrap_text(&format!("see {word} above"), Font::Helvetica, 11.0, 50.0);
        assert!(lines.contains(&word.to_string()));
    }

    #[test]
    fn test_wrap_empty() {
        assert!(wrap_text("", Font::Helvetica, 11.0, 200.0).is_empty());
        assert!(wrap_text("   ", Font::Helvetica, 11.0, 200.0).is_empty());
    }

    #[test]
    fn test_single_word_single_line() {
        let lines = wrap_text("approved", Font::Helvetica, 11.0, 200.0);
        assert_eq!(lines, vec!["approved".to_string()]);
    }

    #[test]
    fn test_long_content_paginated_not_overflowed() {
        let mut engine = LayoutEngine::new();
        engine.heading("Digital Site Passport");
        for i in 0..40 {
            engine.subheading(&format!("Section {i}"));
            engine.paragraph(
                "A reasonably long paragraph describing constraints, access, \
                 drainage and local plan policy context for the parcel in question.",
            );
        }
        assert!(engine.page_count() > 1);
        // No placed line sits below the bottom margin on any page.
        for page in &engine.pages {
            for line in page {
                assert!(line.y >= MARGIN, "line rendered past bottom margin");
            }
        }
    }

    #[test]
    fn test_short_content_single_page() {
        let mut engine = LayoutEngine::new();
        engine.heading("Digital Site Passport");
        engine.paragraph("One short paragraph.");
        assert_eq!(engine.page_count(), 1);
    }

    #[test]
    fn test_render_produces_pdf_bytes() {
        let mut engine = LayoutEngine::new();
        engine.heading("Digital Site Passport");
        engine.paragraph("Parcel facts go here.");
        let bytes = engine.render().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_winansi_replaces_non_latin1() {
        assert_eq!(to_winansi("m\u{00b2}"), vec![b'm', 0xB2]);
        assert_eq!(to_winansi("\u{4e16}"), vec![b'?']);
    }
}
