//! PDF serialization of composed pages.
//!
//! Builds the object graph directly with `lopdf`: one shared font resource per base-14
//! font, one content stream per page, and one 8-bit RGB image XObject per image draw
//! operation. All streams are Flate-compressed. Coordinates arrive in millimetres from
//! the top-left corner and are converted to points from the bottom-left.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;
use tracing::debug;

use crate::illustration::DecodedImage;
use crate::layout::font_metrics::{measure_mm, Font, TextStyle, PT_TO_MM};
use crate::layout::page::{Align, DrawOp, Page, PageConfig, Rgb};

/// Download name of the exported document.
pub const PDF_FILE_NAME: &str = "prescricao-libras.pdf";
const DOCUMENT_TITLE: &str = "LibrasMed - Orientação Médica";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no pages to render")]
    NoPages,

    #[error("PDF encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF write failed: {0}")]
    Io(#[from] std::io::Error),
}

fn pt(mm: f32) -> f32 {
    mm / PT_TO_MM
}

/// Resource name of a font inside every page's `/Font` dictionary.
fn font_resource(font: Font) -> &'static str {
    match font {
        Font::Helvetica => "F1",
        Font::HelveticaBold => "F2",
        Font::HelveticaOblique => "F3",
        Font::CourierBold => "F4",
    }
}

/// Serializes `pages` into a complete PDF file.
pub fn render_pdf(pages: &[Page], config: &PageConfig) -> Result<Vec<u8>, RenderError> {
    if pages.is_empty() {
        return Err(RenderError::NoPages);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in Font::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font_resource(font), font_id);
    }
    let fonts_id = doc.add_object(fonts);

    let width_pt = pt(config.width_mm);
    let height_pt = pt(config.height_mm);
    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());

    for page in pages {
        let mut ctx = PageContext::new(height_pt);
        let mut xobjects = Dictionary::new();

        for op in &page.ops {
            match op {
                DrawOp::Image {
                    x_mm,
                    y_mm,
                    width_mm,
                    height_mm,
                    image,
                } => {
                    let name = format!("Im{}", xobjects.len() + 1);
                    let image_id = doc.add_object(image_xobject(image)?);
                    xobjects.set(name.as_str(), image_id);
                    ctx.draw_image(&name, *x_mm, *y_mm, *width_mm, *height_mm);
                }
                other => ctx.draw(other),
            }
        }

        let content = ctx.finish().encode()?;
        let content_id = doc.add_object(compressed_stream(Dictionary::new(), &content)?);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => fonts_id,
                "XObject" => xobjects,
            },
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::from(*id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(to_win_ansi(DOCUMENT_TITLE), StringFormat::Literal),
        "Producer" => Object::string_literal(concat!("librasmed ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    debug!(pages = pages.len(), bytes = out.len(), "PDF rendered");
    Ok(out)
}

fn compressed_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream, RenderError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, encoder.finish()?))
}

fn image_xobject(image: &DecodedImage) -> Result<Stream, RenderError> {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    compressed_stream(dict, &image.rgb)
}

/// Maps text to WinAnsi (CP1252) bytes. Latin-1 code points pass through; anything the
/// encoding lacks becomes `?`.
pub fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Page drawing context
// ────────────────────────────────────────────────────────────────────────────

struct PageContext {
    page_height_pt: f32,
    content: Content,
}

impl PageContext {
    fn new(page_height_pt: f32) -> Self {
        Self {
            page_height_pt,
            content: Content { operations: vec![] },
        }
    }

    fn finish(self) -> Content {
        self.content
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.content.operations.push(Operation::new(operator, operands));
    }

    /// PDF y (points, from the bottom) of a millimetre offset from the top.
    fn y(&self, y_mm: f32) -> f32 {
        self.page_height_pt - pt(y_mm)
    }

    fn fill_color(&mut self, color: Rgb) {
        self.push("rg", rgb_operands(color));
    }

    fn stroke_color(&mut self, color: Rgb) {
        self.push("RG", rgb_operands(color));
    }

    fn draw(&mut self, op: &DrawOp) {
        match op {
            DrawOp::Text {
                x_mm,
                y_mm,
                style,
                align,
                lines,
            } => self.draw_text(*x_mm, *y_mm, *style, *align, lines),
            DrawOp::Rect {
                x_mm,
                y_mm,
                width_mm,
                height_mm,
                fill,
                stroke,
            } => {
                if fill.is_none() && stroke.is_none() {
                    return;
                }
                if let Some(color) = fill {
                    self.fill_color(*color);
                }
                if let Some(color) = stroke {
                    self.stroke_color(*color);
                    self.push("w", vec![0.5_f32.into()]);
                }
                let bottom = self.y(y_mm + height_mm);
                self.push(
                    "re",
                    vec![pt(*x_mm).into(), bottom.into(), pt(*width_mm).into(), pt(*height_mm).into()],
                );
                let paint = match (fill, stroke) {
                    (Some(_), Some(_)) => "B",
                    (Some(_), None) => "f",
                    _ => "S",
                };
                self.push(paint, vec![]);
            }
            DrawOp::Line {
                x1_mm,
                y1_mm,
                x2_mm,
                y2_mm,
                width_mm,
                color,
            } => {
                self.stroke_color(*color);
                self.push("w", vec![pt(*width_mm).into()]);
                let (y1, y2) = (self.y(*y1_mm), self.y(*y2_mm));
                self.push("m", vec![pt(*x1_mm).into(), y1.into()]);
                self.push("l", vec![pt(*x2_mm).into(), y2.into()]);
                self.push("S", vec![]);
            }
            // Image XObjects need document access; handled by `render_pdf`.
            DrawOp::Image { .. } => {}
        }
    }

    fn draw_text(&mut self, x_mm: f32, y_mm: f32, style: TextStyle, align: Align, lines: &[String]) {
        let size = style.size_pt();
        let line_h = style.line_height_mm();
        // Baseline sits half a cap height below the middle of the line box.
        let baseline_offset = line_h / 2.0 + 0.35 * size * PT_TO_MM;

        self.fill_color(style.color());
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let x = match align {
                Align::Left => x_mm,
                Align::Center => x_mm - measure_mm(line, style) / 2.0,
                Align::Right => x_mm - measure_mm(line, style),
            };
            let baseline = self.y(y_mm + i as f32 * line_h + baseline_offset);

            self.push("BT", vec![]);
            self.push(
                "Tf",
                vec![Object::Name(font_resource(style.font()).as_bytes().to_vec()), size.into()],
            );
            self.push("Td", vec![pt(x).into(), baseline.into()]);
            self.push(
                "Tj",
                vec![Object::String(to_win_ansi(line), StringFormat::Literal)],
            );
            self.push("ET", vec![]);
        }
    }

    fn draw_image(&mut self, name: &str, x_mm: f32, y_mm: f32, width_mm: f32, height_mm: f32) {
        let bottom = self.y(y_mm + height_mm);
        self.push("q", vec![]);
        self.push(
            "cm",
            vec![
                pt(width_mm).into(),
                0.into(),
                0.into(),
                pt(height_mm).into(),
                pt(x_mm).into(),
                bottom.into(),
            ],
        );
        self.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.push("Q", vec![]);
    }
}

fn rgb_operands(color: Rgb) -> Vec<Object> {
    let Rgb(r, g, b) = color;
    vec![
        (r as f32 / 255.0).into(),
        (g as f32 / 255.0).into(),
        (b as f32 / 255.0).into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_entry;
    use crate::illustration::asset::test_png;
    use crate::layout::{compose, default_page_config, DocumentModel, DocumentSymptom};
    use chrono::NaiveDate;

    fn model(symptoms: usize, with_image: bool) -> DocumentModel {
        DocumentModel {
            translation: None,
            symptoms: (0..symptoms)
                .map(|i| DocumentSymptom {
                    entry: test_entry(&format!("s{i}"), "Dor de cabeça"),
                    image: with_image.then(|| test_png(4, 4, [10, 120, 200, 255])),
                })
                .collect(),
            issued_on: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        }
    }

    fn render(model: &DocumentModel) -> Vec<u8> {
        let config = default_page_config();
        let pages = compose(model, &config).unwrap();
        render_pdf(&pages, &config).unwrap()
    }

    #[test]
    fn test_empty_document_is_single_page_pdf() {
        let bytes = render(&model(0, false));
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_page_count_matches_composition() {
        let model = model(20, true);
        let config = default_page_config();
        let pages = compose(&model, &config).unwrap();
        let bytes = render_pdf(&pages, &config).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), pages.len());
    }

    #[test]
    fn test_media_box_is_a4_in_points() {
        let bytes = render(&model(0, false));
        let doc = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let width = media_box[2].as_float().unwrap();
        let height = media_box[3].as_float().unwrap();
        assert!((width - 595.28).abs() < 0.1);
        assert!((height - 841.89).abs() < 0.1);
    }

    #[test]
    fn test_images_become_xobjects() {
        let bytes = render(&model(2, true));
        let doc = Document::load_mem(&bytes).unwrap();
        let images = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                s.dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|n| n == b"Image")
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(images, 2);
    }

    #[test]
    fn test_empty_page_list_rejected() {
        assert!(matches!(
            render_pdf(&[], &default_page_config()),
            Err(RenderError::NoPages)
        ));
    }

    #[test]
    fn test_win_ansi_keeps_portuguese_accents() {
        assert_eq!(to_win_ansi("ção"), vec![0xE7, 0xE3, b'o']);
        assert_eq!(to_win_ansi("a–b"), vec![b'a', 0x96, b'b']);
        assert_eq!(to_win_ansi("✓"), vec![b'?']);
    }
}
