//! Paginated export: one titled block per observation with the attached image
//! re-encoded as an embedded JPEG.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::warn;

use crate::error::{ReportError, Result};
use crate::report::{ImageAttachment, Observation, Report};

// A4 in points
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 10.0;
const LINE_SPACING: f32 = 1.4;

const MAX_IMAGE_WIDTH: f32 = 260.0;
const MAX_IMAGE_HEIGHT: f32 = 200.0;
const JPEG_QUALITY: u8 = 85;

/// Room a heading needs so it never sits alone at the bottom of a page
const KEEP_WITH_HEADING: f32 = 80.0;

/// Encoded document plus the per-observation problems that were degraded to
/// inline notes.
#[derive(Debug)]
pub struct PdfDocument {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<ReportError>,
}

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Average glyph width as a fraction of the font size (Helvetica).
    fn average_width(self) -> f32 {
        match self {
            Font::Regular => 0.5,
            Font::Bold => 0.55,
        }
    }
}

#[derive(Default)]
struct Page {
    operations: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

/// Top-down flow layout over a growing list of pages.
struct Layout<'a> {
    doc: &'a mut Document,
    pages: Vec<Page>,
    cursor_y: f32,
    image_count: usize,
}

impl<'a> Layout<'a> {
    fn new(doc: &'a mut Document) -> Self {
        let mut layout = Self {
            doc,
            pages: Vec::new(),
            cursor_y: 0.0,
            image_count: 0,
        };
        layout.new_page();
        layout
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    fn page(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.new_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor_y - height < MARGIN {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        self.cursor_y -= height;
    }

    fn text_line(&mut self, font: Font, size: f32, text: &str) {
        let line_height = size * LINE_SPACING;
        self.ensure_space(line_height);
        self.cursor_y -= line_height;
        let y = self.cursor_y;
        self.page().operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource_name().into(), size.into()]),
            Operation::new("Td", vec![MARGIN.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn paragraph(&mut self, font: Font, size: f32, text: &str) {
        let max_chars = (CONTENT_WIDTH / (size * font.average_width())) as usize;
        for line in wrap(text, max_chars) {
            self.text_line(font, size, &line);
        }
    }

    fn image(&mut self, jpeg: EncodedImage) {
        let (width, height) = fit(jpeg.width as f32, jpeg.height as f32);
        self.ensure_space(height + BODY_SIZE);
        self.cursor_y -= height;
        let y = self.cursor_y;

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => jpeg.width as i64,
                "Height" => jpeg.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg.bytes,
        );
        let image_id = self.doc.add_object(stream);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let page = self.page();
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0_i64.into(),
                    0_i64.into(),
                    height.into(),
                    MARGIN.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        page.images.push((name, image_id));
    }

    fn separator(&mut self) {
        self.gap(BODY_SIZE * 0.6);
        self.ensure_space(BODY_SIZE);
        let y = self.cursor_y;
        self.page().operations.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![0.5_f32.into()]),
            Operation::new("m", vec![MARGIN.into(), y.into()]),
            Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.gap(BODY_SIZE * 1.2);
    }

    fn finish(self) -> Vec<Page> {
        self.pages
    }
}

struct EncodedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

/// Decodes the attachment and re-encodes it as baseline RGB JPEG.
fn reencode_jpeg(image: &ImageAttachment) -> Result<EncodedImage> {
    let decoded = image::load_from_memory(image.bytes())?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(EncodedImage {
        bytes,
        width,
        height,
    })
}

/// Scales pixel dimensions into the image box, keeping the aspect ratio.
fn fit(width: f32, height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (MAX_IMAGE_WIDTH / width)
        .min(MAX_IMAGE_HEIGHT / height)
        .min(1.0);
    (width * scale, height * scale)
}

/// Greedy word wrap by character count; explicit newlines are kept and words
/// longer than a line are split.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Maps text onto the WinAnsi code page used by the standard fonts.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            '\u{2022}' => 0x95,
            '\u{20AC}' => 0x80,
            '\t' => b' ',
            c if (c as u32) >= 0x20 && (c as u32) < 0x7F => c as u8,
            c if (c as u32) >= 0xA0 && (c as u32) <= 0xFF => c as u8,
            _ => b'?',
        })
        .collect()
}

fn observation_block(
    layout: &mut Layout<'_>,
    serial: usize,
    obs: &Observation,
    diagnostics: &mut Vec<ReportError>,
) {
    layout.ensure_space(KEEP_WITH_HEADING);
    layout.paragraph(Font::Bold, HEADING_SIZE, &format!("Observation #{}", serial));
    layout.gap(BODY_SIZE * 0.3);
    layout.paragraph(
        Font::Regular,
        BODY_SIZE,
        &format!(
            "Priority: {}    Recorded: {}",
            obs.priority(),
            obs.created_at().format("%Y-%m-%d %H:%M UTC")
        ),
    );
    layout.gap(BODY_SIZE * 0.3);
    layout.paragraph(Font::Bold, BODY_SIZE, "Observation:");
    layout.paragraph(Font::Regular, BODY_SIZE, obs.observation_text());
    layout.gap(BODY_SIZE * 0.3);
    layout.paragraph(Font::Bold, BODY_SIZE, "Recommendation:");
    layout.paragraph(Font::Regular, BODY_SIZE, obs.recommendation());

    if let Some(image) = obs.image() {
        layout.gap(BODY_SIZE * 0.5);
        match reencode_jpeg(image) {
            Ok(jpeg) => layout.image(jpeg),
            Err(e) => {
                warn!(
                    "Observation #{} ({}): image could not be embedded: {}",
                    serial,
                    obs.id(),
                    e
                );
                layout.paragraph(
                    Font::Regular,
                    BODY_SIZE,
                    &format!("[Image could not be embedded: {}]", e),
                );
                diagnostics.push(ReportError::Encoding {
                    message: format!("observation #{}: {}", serial, e),
                });
            }
        }
    }

    layout.separator();
}

/// Encodes the report with the current time as the generation timestamp.
pub fn encode(report: &Report) -> Result<PdfDocument> {
    encode_at(report, Utc::now())
}

pub fn encode_at(report: &Report, generated_at: DateTime<Utc>) -> Result<PdfDocument> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let font_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut diagnostics = Vec::new();
    let mut layout = Layout::new(&mut doc);
    layout.paragraph(Font::Bold, TITLE_SIZE, "Audit Report");
    layout.paragraph(
        Font::Regular,
        BODY_SIZE,
        &format!(
            "Generated {} | Observations: {}",
            generated_at.format("%Y-%m-%d %H:%M UTC"),
            report.len()
        ),
    );
    layout.gap(BODY_SIZE);
    if report.is_empty() {
        layout.paragraph(Font::Regular, BODY_SIZE, "The report is empty.");
    }
    for (serial, obs) in report.numbered() {
        observation_block(&mut layout, serial, obs, &mut diagnostics);
    }
    let pages = layout.finish();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: page.operations,
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let mut xobjects = Dictionary::new();
        for (name, id) in page.images {
            xobjects.set(name.into_bytes(), id);
        }
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => font_regular,
                    "F2" => font_bold,
                },
                "XObject" => xobjects,
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let media_box: Vec<Object> = vec![
        Object::Integer(0),
        Object::Integer(0),
        PAGE_WIDTH.into(),
        PAGE_HEIGHT.into(),
    ];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => media_box,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Audit Report"),
        "Producer" => Object::string_literal("audit-report"),
        "CreationDate" => Object::string_literal(generated_at.format("D:%Y%m%d%H%M%SZ").to_string()),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(PdfDocument { bytes, diagnostics })
}
