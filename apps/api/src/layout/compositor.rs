//! Document Compositor: lays the translation and the selected symptoms out on pages.
//!
//! # Block order
//! header → original text → gloss (boxed) → explanation → primary illustration →
//! symptoms header → one row per symptom.
//!
//! # Page-break rule
//! Each block is measured first. If it does not fit between the cursor and the footer
//! reservation, and the cursor is not already at the top of a fresh page, a new page
//! is started. Text sections and symptom rows taller than a whole page flow line-by-line
//! instead; a symptom row keeps its image slot with the first fragment. The symptoms
//! header is kept on the same page as the first row.
//! The footer caption is added to every page once all blocks are placed.
//!
//! `compose` is synchronous and pure: same model and config, same pages.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::catalog::SymptomEntry;
use crate::illustration::{DecodedImage, Illustration};
use crate::layout::font_metrics::{measure_mm, wrap_text, TextStyle};
use crate::layout::page::{
    Align, BlockKind, DrawOp, LayoutError, Page, PageConfig, PlacedBlock, Rgb,
};
use crate::translation::TranslationResult;

pub const HEADER_TITLE: &str = "LibrasMed - Orientação Médica";
pub const FOOTER_CAPTION: &str =
    "Este documento é um auxílio gerado por IA. Consulte sempre um profissional de saúde ou intérprete.";
pub const ORIGINAL_HEADING: &str = "Prescrição Original:";
pub const GLOSS_HEADING: &str = "Tradução em Libras (Glossa):";
pub const EXPLANATION_HEADING: &str = "Instruções ao Paciente:";
pub const SYMPTOMS_HEADING: &str = "Sintomas em Libras:";
pub const NO_IMAGE_LABEL: &str = "sem imagem";
pub const IMAGE_UNAVAILABLE_NOTE: &str = "(imagem indisponível)";

const HEADER_HEIGHT_MM: f32 = 8.0;
const HEADER_GAP_MM: f32 = 10.0;
const ORIGINAL_GAP_MM: f32 = 6.0;
const GLOSS_GAP_MM: f32 = 8.0;
const EXPLANATION_GAP_MM: f32 = 8.0;
const GLOSS_PADDING_MM: f32 = 3.0;

pub const ILLUSTRATION_MAX_SIDE_MM: f32 = 100.0;
pub const ILLUSTRATION_MIN_SIDE_MM: f32 = 30.0;
const ILLUSTRATION_GAP_MM: f32 = 8.0;

pub const SYMPTOMS_HEADER_HEIGHT_MM: f32 = 7.0;
pub const SYMPTOMS_HEADER_GAP_MM: f32 = 4.0;
pub const SYMPTOM_IMAGE_SIDE_MM: f32 = 30.0;
pub const SYMPTOM_ROW_PADDING_MM: f32 = 3.0;
pub const SYMPTOM_ROW_GAP_MM: f32 = 4.0;
const SYMPTOM_TEXT_GAP_MM: f32 = 5.0;
const WARNING_GAP_MM: f32 = 2.0;

/// Distance from the bottom edge to the top of the page number line. The caption sits
/// directly above it, however many lines it wraps to.
const FOOTER_PAGE_NUMBER_OFFSET_MM: f32 = 9.0;
const FOOTER_LINE_GAP_MM: f32 = 0.5;

const GLOSS_FILL: Rgb = Rgb(240, 253, 244);
const RULE_COLOR: Rgb = Rgb(200, 200, 200);
const PLACEHOLDER_FILL: Rgb = Rgb(243, 244, 246);
const PLACEHOLDER_STROKE: Rgb = Rgb(209, 213, 219);

const EPSILON: f32 = 1e-3;

// ────────────────────────────────────────────────────────────────────────────
// Input model
// ────────────────────────────────────────────────────────────────────────────

/// Everything the compositor needs, already resolved. No I/O happens during composition.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    pub translation: Option<TranslationResult>,
    /// Selected symptoms in catalog order, each with its cached image if any.
    pub symptoms: Vec<DocumentSymptom>,
    pub issued_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct DocumentSymptom {
    pub entry: SymptomEntry,
    pub image: Option<Illustration>,
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Converts a document model into fixed-size pages ready for rendering.
pub fn compose(model: &DocumentModel, config: &PageConfig) -> Result<Vec<Page>, LayoutError> {
    config.validate()?;

    let mut composer = Composer::new(config);
    composer.place_header(model.issued_on);

    if let Some(translation) = &model.translation {
        composer.place_translation(translation);
    }

    let rows: Vec<SymptomRow> = model
        .symptoms
        .iter()
        .map(|symptom| SymptomRow::measure(symptom, config))
        .collect();
    if let Some(first) = rows.first() {
        composer.place_symptoms_header(first.first_fragment_height(config));
        for row in rows {
            composer.place_symptom(row);
        }
    }

    let pages = composer.finish();
    debug!(pages = pages.len(), "Document composed");
    Ok(pages)
}

// ────────────────────────────────────────────────────────────────────────────
// Composer state
// ────────────────────────────────────────────────────────────────────────────

struct Composer<'a> {
    config: &'a PageConfig,
    pages: Vec<Page>,
}

/// A heading followed by wrapped lines, optionally drawn inside a filled box.
struct TextSection {
    kind: BlockKind,
    heading: &'static str,
    lines: Vec<String>,
    style: TextStyle,
    boxed: bool,
    gap: f32,
}

/// What goes in the left slot of a symptom row.
enum SymptomSlot {
    Image(DecodedImage),
    Placeholder,
    /// The cached image could not be decoded; the row is text-only.
    Unavailable,
}

/// One wrapped line of a symptom row's text column.
struct RowLine {
    style: TextStyle,
    text: String,
    /// Extra space above this line when it does not open a fragment.
    gap_before: f32,
}

impl RowLine {
    fn height(&self) -> f32 {
        self.style.line_height_mm()
    }
}

/// A symptom row measured against the page width, ready to be placed.
struct SymptomRow {
    id: String,
    slot: SymptomSlot,
    text_x: f32,
    lines: Vec<RowLine>,
}

impl SymptomRow {
    fn measure(symptom: &DocumentSymptom, cfg: &PageConfig) -> Self {
        let entry = &symptom.entry;
        let slot = match &symptom.image {
            None => SymptomSlot::Placeholder,
            Some(illustration) => match illustration.decode() {
                Ok(image) => SymptomSlot::Image(image),
                Err(e) => {
                    warn!(symptom = %entry.id, "Symptom image could not be embedded, rendering text only: {e}");
                    SymptomSlot::Unavailable
                }
            },
        };

        let slot_w = match slot {
            SymptomSlot::Unavailable => 0.0,
            _ => SYMPTOM_IMAGE_SIDE_MM + SYMPTOM_TEXT_GAP_MM,
        };
        let text_w = cfg.content_width() - slot_w;

        let mut lines = Vec::new();
        let mut push = |style: TextStyle, text: &str, gap: f32| {
            for (i, line) in wrap_text(text, style, text_w).into_iter().enumerate() {
                lines.push(RowLine {
                    style,
                    text: line,
                    gap_before: if i == 0 { gap } else { 0.0 },
                });
            }
        };
        push(TextStyle::Heading, &entry.label, 0.0);
        push(TextStyle::Body, &entry.libras_description, 0.0);
        if let Some(warning) = entry.warning.as_deref() {
            push(TextStyle::Warning, warning, WARNING_GAP_MM);
        }
        if matches!(slot, SymptomSlot::Unavailable) {
            push(TextStyle::Placeholder, IMAGE_UNAVAILABLE_NOTE, 0.0);
        }

        Self {
            id: entry.id.clone(),
            slot,
            text_x: cfg.margin_mm + slot_w,
            lines,
        }
    }

    fn slot_height(&self) -> f32 {
        match self.slot {
            SymptomSlot::Unavailable => 0.0,
            _ => SYMPTOM_IMAGE_SIDE_MM,
        }
    }

    fn text_height(&self) -> f32 {
        self.lines.iter().map(|l| l.gap_before + l.height()).sum()
    }

    /// Height of the whole row with padding.
    fn height(&self) -> f32 {
        self.slot_height().max(self.text_height()) + 2.0 * SYMPTOM_ROW_PADDING_MM
    }

    /// Room the row needs at the cursor before it may start: the whole row when it fits
    /// on a fresh page, otherwise the slot and the first line.
    fn first_fragment_height(&self, cfg: &PageConfig) -> f32 {
        let row_h = self.height();
        if row_h <= cfg.usable_height() {
            return row_h;
        }
        let first_line = self.lines.first().map_or(0.0, RowLine::height);
        self.slot_height().max(first_line) + 2.0 * SYMPTOM_ROW_PADDING_MM
    }
}

impl<'a> Composer<'a> {
    fn new(config: &'a PageConfig) -> Self {
        Self {
            config,
            pages: vec![Page::new(1, config.margin_mm)],
        }
    }

    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn cursor(&self) -> f32 {
        self.pages.last().map_or(self.config.margin_mm, |p| p.cursor_mm)
    }

    fn remaining(&self) -> f32 {
        self.config.content_bottom() - self.cursor()
    }

    fn at_top(&self) -> bool {
        (self.cursor() - self.config.margin_mm).abs() < EPSILON
    }

    fn break_page(&mut self) {
        let number = self.pages.len() + 1;
        self.pages.push(Page::new(number, self.config.margin_mm));
    }

    /// Breaks the page if `height` does not fit, then records the block and returns its y.
    fn reserve(&mut self, kind: BlockKind, height: f32) -> f32 {
        if height > self.remaining() + EPSILON && !self.at_top() {
            self.break_page();
        }
        let y = self.cursor();
        self.page().blocks.push(PlacedBlock {
            kind,
            y_mm: y,
            height_mm: height,
        });
        y
    }

    fn advance(&mut self, by: f32) {
        self.page().cursor_mm += by;
    }

    fn push(&mut self, op: DrawOp) {
        self.page().ops.push(op);
    }

    fn push_text(&mut self, x: f32, y: f32, style: TextStyle, align: Align, lines: Vec<String>) {
        if !lines.is_empty() {
            self.push(DrawOp::Text {
                x_mm: x,
                y_mm: y,
                style,
                align,
                lines,
            });
        }
    }

    // ── blocks ──────────────────────────────────────────────────────────────

    fn place_header(&mut self, issued_on: NaiveDate) {
        let cfg = self.config;
        let y = self.reserve(BlockKind::Header, HEADER_HEIGHT_MM);
        self.push_text(
            cfg.margin_mm,
            y,
            TextStyle::Title,
            Align::Left,
            vec![HEADER_TITLE.to_string()],
        );
        self.push_text(
            cfg.width_mm - cfg.margin_mm,
            y + 1.5,
            TextStyle::Caption,
            Align::Right,
            vec![format!("Data: {}", issued_on.format("%d/%m/%Y"))],
        );
        self.push(DrawOp::Line {
            x1_mm: cfg.margin_mm,
            y1_mm: y + HEADER_HEIGHT_MM,
            x2_mm: cfg.width_mm - cfg.margin_mm,
            y2_mm: y + HEADER_HEIGHT_MM,
            width_mm: 0.5,
            color: RULE_COLOR,
        });
        self.advance(HEADER_HEIGHT_MM + HEADER_GAP_MM);
    }

    fn place_translation(&mut self, translation: &TranslationResult) {
        let width = self.config.content_width();

        self.place_section(TextSection {
            kind: BlockKind::OriginalText,
            heading: ORIGINAL_HEADING,
            lines: wrap_text(&translation.original_text, TextStyle::Body, width),
            style: TextStyle::Body,
            boxed: false,
            gap: ORIGINAL_GAP_MM,
        });
        self.place_section(TextSection {
            kind: BlockKind::Gloss,
            heading: GLOSS_HEADING,
            lines: wrap_text(
                &translation.libras_gloss,
                TextStyle::Gloss,
                width - 2.0 * GLOSS_PADDING_MM,
            ),
            style: TextStyle::Gloss,
            boxed: true,
            gap: GLOSS_GAP_MM,
        });
        self.place_section(TextSection {
            kind: BlockKind::Explanation,
            heading: EXPLANATION_HEADING,
            lines: wrap_text(&translation.explanation, TextStyle::Body, width),
            style: TextStyle::Body,
            boxed: false,
            gap: EXPLANATION_GAP_MM,
        });

        if let Some(illustration) = &translation.illustration {
            self.place_illustration(illustration);
        }
    }

    /// Places a heading + body. Keeps the section whole when it fits on one page,
    /// otherwise flows the body lines across as many pages as needed.
    fn place_section(&mut self, section: TextSection) {
        if section.lines.is_empty() {
            return;
        }

        let cfg = self.config;
        let heading_h = TextStyle::Heading.line_height_mm();
        let line_h = section.style.line_height_mm();
        let pad = if section.boxed {
            2.0 * GLOSS_PADDING_MM
        } else {
            0.0
        };
        let total = heading_h + section.lines.len() as f32 * line_h + pad;
        let needed = if total <= cfg.usable_height() {
            total
        } else {
            heading_h + line_h + pad
        };
        if needed > self.remaining() + EPSILON && !self.at_top() {
            self.break_page();
        }

        let mut next = 0;
        let mut first = true;
        while next < section.lines.len() {
            let head = if first { heading_h } else { 0.0 };
            let available = self.remaining() - head - pad;
            let mut fit = ((available + EPSILON) / line_h).floor().max(0.0) as usize;
            if fit == 0 {
                if !self.at_top() {
                    self.break_page();
                    continue;
                }
                // Taller than a whole page: overflow rather than loop forever.
                fit = 1;
            }

            let take = fit.min(section.lines.len() - next);
            let y = self.cursor();
            let body_y = y + head;
            let fragment_h = take as f32 * line_h + pad;

            if first {
                self.push_text(
                    cfg.margin_mm,
                    y,
                    TextStyle::Heading,
                    Align::Left,
                    vec![section.heading.to_string()],
                );
            }
            let lines = section.lines[next..next + take].to_vec();
            if section.boxed {
                self.push(DrawOp::Rect {
                    x_mm: cfg.margin_mm,
                    y_mm: body_y,
                    width_mm: cfg.content_width(),
                    height_mm: fragment_h,
                    fill: Some(GLOSS_FILL),
                    stroke: None,
                });
                self.push_text(
                    cfg.margin_mm + GLOSS_PADDING_MM,
                    body_y + GLOSS_PADDING_MM,
                    section.style,
                    Align::Left,
                    lines,
                );
            } else {
                self.push_text(cfg.margin_mm, body_y, section.style, Align::Left, lines);
            }

            self.page().blocks.push(PlacedBlock {
                kind: section.kind.clone(),
                y_mm: y,
                height_mm: head + fragment_h,
            });
            self.advance(head + fragment_h);

            next += take;
            first = false;
            if next < section.lines.len() {
                self.break_page();
            }
        }

        self.advance(section.gap);
    }

    /// Capped square, centred. Skipped when less than the minimum side is left.
    fn place_illustration(&mut self, illustration: &Illustration) {
        let cfg = self.config;
        let image = match illustration.decode() {
            Ok(image) => image,
            Err(e) => {
                warn!("Primary illustration could not be embedded, using text note: {e}");
                let note_h = TextStyle::Placeholder.line_height_mm();
                let y = self.reserve(BlockKind::Illustration, note_h);
                self.push_text(
                    cfg.margin_mm,
                    y,
                    TextStyle::Placeholder,
                    Align::Left,
                    vec![IMAGE_UNAVAILABLE_NOTE.to_string()],
                );
                self.advance(note_h + ILLUSTRATION_GAP_MM);
                return;
            }
        };

        let available = self.remaining();
        if available < ILLUSTRATION_MIN_SIDE_MM {
            debug!(
                available_mm = available,
                "Not enough room left for the primary illustration, skipping it"
            );
            return;
        }

        let side = ILLUSTRATION_MAX_SIDE_MM
            .min(cfg.content_width())
            .min(available);
        let y = self.reserve(BlockKind::Illustration, side);
        self.push(DrawOp::Image {
            x_mm: (cfg.width_mm - side) / 2.0,
            y_mm: y,
            width_mm: side,
            height_mm: side,
            image,
        });
        self.advance(side + ILLUSTRATION_GAP_MM);
    }

    /// Places the symptoms heading, on a new page if it would not share a page with
    /// `first_row_h` of the first row.
    fn place_symptoms_header(&mut self, first_row_h: f32) {
        let cfg = self.config;
        let header_h = SYMPTOMS_HEADER_HEIGHT_MM + SYMPTOMS_HEADER_GAP_MM;
        if header_h + first_row_h > self.remaining() + EPSILON && !self.at_top() {
            self.break_page();
        }
        let y = self.reserve(BlockKind::SymptomsHeader, SYMPTOMS_HEADER_HEIGHT_MM);
        self.push_text(
            cfg.margin_mm,
            y,
            TextStyle::Heading,
            Align::Left,
            vec![SYMPTOMS_HEADING.to_string()],
        );
        self.push(DrawOp::Line {
            x1_mm: cfg.margin_mm,
            y1_mm: y + SYMPTOMS_HEADER_HEIGHT_MM - 1.0,
            x2_mm: cfg.width_mm - cfg.margin_mm,
            y2_mm: y + SYMPTOMS_HEADER_HEIGHT_MM - 1.0,
            width_mm: 0.3,
            color: RULE_COLOR,
        });
        self.advance(header_h);
    }

    /// Image slot on the left, label / description / warning on the right. A row taller
    /// than a fresh page continues its text on the following pages.
    fn place_symptom(&mut self, row: SymptomRow) {
        let cfg = self.config;
        let pad = 2.0 * SYMPTOM_ROW_PADDING_MM;
        let slot_h = row.slot_height();

        if row.first_fragment_height(cfg) > self.remaining() + EPSILON && !self.at_top() {
            self.break_page();
        }

        let SymptomRow {
            id,
            slot,
            text_x,
            lines,
        } = row;
        let mut slot = Some(slot);
        let mut next = 0;

        loop {
            let first = slot.is_some();
            let available = self.remaining() - pad;

            let mut used = 0.0;
            let mut take = 0;
            for (i, line) in lines[next..].iter().enumerate() {
                let gap = if i == 0 { 0.0 } else { line.gap_before };
                if used + gap + line.height() > available + EPSILON {
                    break;
                }
                used += gap + line.height();
                take += 1;
            }
            if take == 0 && next < lines.len() {
                if !self.at_top() {
                    self.break_page();
                    continue;
                }
                // A single line taller than a whole page: overflow rather than loop forever.
                used = lines[next].height();
                take = 1;
            }

            let fragment_h = (if first { slot_h.max(used) } else { used }) + pad;
            let y = self.reserve(BlockKind::Symptom { id: id.clone() }, fragment_h);
            let top = y + SYMPTOM_ROW_PADDING_MM;

            if let Some(slot) = slot.take() {
                self.place_symptom_slot(slot, top);
            }
            self.place_row_lines(text_x, top, &lines[next..next + take]);
            self.advance(fragment_h);

            next += take;
            if next >= lines.len() {
                break;
            }
            self.break_page();
        }

        self.advance(SYMPTOM_ROW_GAP_MM);
    }

    fn place_symptom_slot(&mut self, slot: SymptomSlot, top: f32) {
        let cfg = self.config;
        match slot {
            SymptomSlot::Image(image) => self.push(DrawOp::Image {
                x_mm: cfg.margin_mm,
                y_mm: top,
                width_mm: SYMPTOM_IMAGE_SIDE_MM,
                height_mm: SYMPTOM_IMAGE_SIDE_MM,
                image,
            }),
            SymptomSlot::Placeholder => {
                self.push(DrawOp::Rect {
                    x_mm: cfg.margin_mm,
                    y_mm: top,
                    width_mm: SYMPTOM_IMAGE_SIDE_MM,
                    height_mm: SYMPTOM_IMAGE_SIDE_MM,
                    fill: Some(PLACEHOLDER_FILL),
                    stroke: Some(PLACEHOLDER_STROKE),
                });
                let label_y = top
                    + (SYMPTOM_IMAGE_SIDE_MM - TextStyle::Placeholder.line_height_mm()) / 2.0;
                self.push_text(
                    cfg.margin_mm + SYMPTOM_IMAGE_SIDE_MM / 2.0,
                    label_y,
                    TextStyle::Placeholder,
                    Align::Center,
                    vec![NO_IMAGE_LABEL.to_string()],
                );
            }
            SymptomSlot::Unavailable => {}
        }
    }

    /// Draws consecutive lines of the same style as one text run.
    fn place_row_lines(&mut self, x: f32, top: f32, lines: &[RowLine]) {
        let mut y = top;
        let mut i = 0;
        while i < lines.len() {
            let style = lines[i].style;
            if i > 0 {
                y += lines[i].gap_before;
            }
            let mut run = vec![lines[i].text.clone()];
            let mut j = i + 1;
            while j < lines.len() && lines[j].style == style && lines[j].gap_before == 0.0 {
                run.push(lines[j].text.clone());
                j += 1;
            }
            let run_h = run.len() as f32 * style.line_height_mm();
            self.push_text(x, y, style, Align::Left, run);
            y += run_h;
            i = j;
        }
    }

    /// Adds the footer caption and page number to every page.
    fn finish(mut self) -> Vec<Page> {
        let cfg = self.config;
        let total = self.pages.len();
        let center = cfg.width_mm / 2.0;
        let caption = fit_footer(FOOTER_CAPTION, cfg.content_width());
        let number_y = cfg.height_mm - FOOTER_PAGE_NUMBER_OFFSET_MM;
        let caption_y = number_y
            - FOOTER_LINE_GAP_MM
            - caption.len() as f32 * TextStyle::Footer.line_height_mm();
        for page in &mut self.pages {
            page.ops.push(DrawOp::Text {
                x_mm: center,
                y_mm: caption_y,
                style: TextStyle::Footer,
                align: Align::Center,
                lines: caption.clone(),
            });
            page.ops.push(DrawOp::Text {
                x_mm: center,
                y_mm: number_y,
                style: TextStyle::Footer,
                align: Align::Center,
                lines: vec![format!("Página {} de {}", page.number, total)],
            });
        }
        self.pages
    }
}

/// The caption is a single line on A4; narrower pages get it wrapped.
fn fit_footer(caption: &str, width: f32) -> Vec<String> {
    if measure_mm(caption, TextStyle::Footer) <= width {
        vec![caption.to_string()]
    } else {
        wrap_text(caption, TextStyle::Footer, width)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
