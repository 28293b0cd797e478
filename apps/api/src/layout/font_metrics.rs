//! Static font-metric tables for the PDF base-14 fonts the document uses.
//!
//! Widths are the Adobe AFM advance widths in 1/1000 em. Measuring with them gives the
//! same line breaks the PDF viewer will show, which is what the compositor needs to
//! decide page breaks without a font engine.
//! Tables cover ASCII 0x20..=0x7E; index = (char as usize) - 32. Accented Latin letters
//! are measured as their base letter, anything else falls back to the average width.

use serde::{Deserialize, Serialize};

use crate::layout::page::Rgb;

/// Millimetres per PostScript point.
pub const PT_TO_MM: f32 = 25.4 / 72.0;

// ────────────────────────────────────────────────────────────────────────────
// Fonts and text styles
// ────────────────────────────────────────────────────────────────────────────

/// The base-14 fonts referenced by the exported PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Font {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    CourierBold,
}

impl Font {
    pub const ALL: [Font; 4] = [
        Font::Helvetica,
        Font::HelveticaBold,
        Font::HelveticaOblique,
        Font::CourierBold,
    ];

    /// PostScript name written into the PDF font dictionary.
    pub fn base_font(self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
            Font::HelveticaOblique => "Helvetica-Oblique",
            Font::CourierBold => "Courier-Bold",
        }
    }

    pub fn metrics(self) -> &'static FontMetricTable {
        match self {
            // Oblique shares the upright advance widths.
            Font::Helvetica | Font::HelveticaOblique => &HELVETICA_TABLE,
            Font::HelveticaBold => &HELVETICA_BOLD_TABLE,
            Font::CourierBold => &COURIER_TABLE,
        }
    }
}

/// Typographic role of a text run. Each role has a fixed font, size, line height and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    Title,
    Caption,
    Heading,
    Body,
    Gloss,
    Warning,
    Placeholder,
    Footer,
}

impl TextStyle {
    pub fn font(self) -> Font {
        match self {
            TextStyle::Title | TextStyle::Heading | TextStyle::Warning => Font::HelveticaBold,
            TextStyle::Caption | TextStyle::Body => Font::Helvetica,
            TextStyle::Gloss => Font::CourierBold,
            TextStyle::Placeholder | TextStyle::Footer => Font::HelveticaOblique,
        }
    }

    pub fn size_pt(self) -> f32 {
        match self {
            TextStyle::Title => 16.0,
            TextStyle::Heading | TextStyle::Gloss => 11.0,
            TextStyle::Body => 10.0,
            TextStyle::Caption | TextStyle::Warning => 9.0,
            TextStyle::Placeholder | TextStyle::Footer => 8.0,
        }
    }

    /// Vertical advance per wrapped line.
    pub fn line_height_mm(self) -> f32 {
        match self {
            TextStyle::Title => 7.0,
            TextStyle::Heading | TextStyle::Gloss => 5.0,
            TextStyle::Body | TextStyle::Caption | TextStyle::Warning => 4.0,
            TextStyle::Placeholder | TextStyle::Footer => 3.5,
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            TextStyle::Title => Rgb(16, 185, 129),
            TextStyle::Caption => Rgb(100, 100, 100),
            TextStyle::Heading | TextStyle::Body => Rgb(0, 0, 0),
            TextStyle::Gloss => Rgb(0, 100, 0),
            TextStyle::Warning => Rgb(185, 28, 28),
            TextStyle::Placeholder => Rgb(120, 120, 120),
            TextStyle::Footer => Rgb(150, 150, 150),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for one font.
///
/// `widths[i]` = advance of ASCII character `(i + 32)` in 1/1000 em.
///
/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    widths: [u16; 95],
    /// Fallback for characters outside the table, in 1/1000 em.
    pub average_char_width: u16,
}

impl FontMetricTable {
    /// Measures the advance width of a string in em units.
    pub fn measure_em(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c) as f32).sum::<f32>() / 1000.0
    }

    fn char_width(&self, c: char) -> u16 {
        let c = fold_accent(c);
        let code = c as usize;
        if (32..=126).contains(&code) {
            self.widths[code - 32]
        } else {
            self.average_char_width
        }
    }
}

/// Maps accented Latin-1 letters to their unaccented base letter.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Measuring and wrapping
// ────────────────────────────────────────────────────────────────────────────

/// Rendered width of `text` in millimetres at the style's font size.
pub fn measure_mm(text: &str, style: TextStyle) -> f32 {
    style.font().metrics().measure_em(text) * style.size_pt() * PT_TO_MM
}

/// Greedy word wrap into lines no wider than `max_width_mm`.
///
/// Explicit newlines start a new line; blank input yields no lines. A word wider than
/// the whole line is broken between characters.
pub fn wrap_text(text: &str, style: TextStyle, max_width_mm: f32) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let space_w = measure_mm(" ", style);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_w = 0.0_f32;

        for word in paragraph.split_whitespace() {
            let word_w = measure_mm(word, style);

            if word_w > max_width_mm {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let mut pieces = break_word(word, style, max_width_mm);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                current_w = measure_mm(&last, style);
                current = last;
                continue;
            }

            if current.is_empty() {
                current.push_str(word);
                current_w = word_w;
            } else if current_w + space_w + word_w <= max_width_mm {
                current.push(' ');
                current.push_str(word);
                current_w += space_w + word_w;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_w = word_w;
            }
        }

        // Blank paragraphs keep their vertical space.
        lines.push(current);
    }

    // Trailing blank lines carry no content.
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Splits an over-long word into chunks that each fit the line (at least one char each).
fn break_word(word: &str, style: TextStyle, max_width_mm: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        let mut candidate = current.clone();
        candidate.push(c);
        if !current.is_empty() && measure_mm(&candidate, style) > max_width_mm {
            pieces.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    widths: [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // sp../
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
        278, 278, 584, 584, 584, 556, 1015, // :..@
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
        278, 278, 278, 469, 556, 333, // [..`
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
        334, 260, 334, 584, // {..~
    ],
    average_char_width: 520,
};

static HELVETICA_BOLD_TABLE: FontMetricTable = FontMetricTable {
    widths: [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // sp../
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
        333, 333, 584, 584, 584, 611, 975, // :..@
        722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A-M
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
        333, 278, 333, 584, 556, 333, // [..`
        556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a-m
        611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n-z
        389, 280, 389, 584, // {..~
    ],
    average_char_width: 560,
};

static COURIER_TABLE: FontMetricTable = FontMetricTable {
    widths: [600; 95],
    average_char_width: 600,
};

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_empty_is_zero() {
        assert_eq!(measure_mm("", TextStyle::Body), 0.0);
    }

    #[test]
    fn test_courier_is_monospaced() {
        let a = measure_mm("iiii", TextStyle::Gloss);
        let b = measure_mm("MMMM", TextStyle::Gloss);
        assert!((a - b).abs() < 1e-4);
        // 4 chars × 0.6em × 11pt
        assert!((a - 4.0 * 0.6 * 11.0 * PT_TO_MM).abs() < 1e-3);
    }

    #[test]
    fn test_accented_letters_measure_like_base_letters() {
        let table = Font::Helvetica.metrics();
        assert_eq!(table.measure_em("ação"), table.measure_em("acao"));
    }

    #[test]
    fn test_bold_wider_than_regular() {
        assert!(
            Font::HelveticaBold.metrics().measure_em("medicamento")
                > Font::Helvetica.metrics().measure_em("medicamento")
        );
    }

    #[test]
    fn test_wrap_blank_text_yields_no_lines() {
        assert!(wrap_text("   \n ", TextStyle::Body, 100.0).is_empty());
    }

    #[test]
    fn test_wrap_short_text_single_line() {
        let lines = wrap_text("Tomar 1 comprimido", TextStyle::Body, 180.0);
        assert_eq!(lines, vec!["Tomar 1 comprimido".to_string()]);
    }

    #[test]
    fn test_wrap_lines_never_exceed_width() {
        let text = "Tome um comprimido a cada seis horas se houver dor ou febre, ".repeat(6);
        let lines = wrap_text(&text, TextStyle::Body, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(measure_mm(line, TextStyle::Body) <= 60.0, "line too wide: {line}");
        }
        // No words are lost or reordered.
        assert_eq!(
            lines.join(" ").split_whitespace().collect::<Vec<_>>(),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_wrap_honours_explicit_newlines() {
        let lines = wrap_text("primeira\n\nterceira", TextStyle::Body, 180.0);
        assert_eq!(lines, vec!["primeira", "", "terceira"]);
    }

    #[test]
    fn test_wrap_breaks_overlong_word() {
        let word = "A".repeat(80);
        let lines = wrap_text(&word, TextStyle::Gloss, 30.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        for line in &lines {
            assert!(measure_mm(line, TextStyle::Gloss) <= 30.0);
        }
    }

    #[test]
    fn test_every_style_has_positive_metrics() {
        for style in [
            TextStyle::Title,
            TextStyle::Caption,
            TextStyle::Heading,
            TextStyle::Body,
            TextStyle::Gloss,
            TextStyle::Warning,
            TextStyle::Placeholder,
            TextStyle::Footer,
        ] {
            assert!(style.size_pt() > 0.0);
            // Line height leaves room for the glyphs.
            assert!(style.line_height_mm() >= style.size_pt() * PT_TO_MM * 0.9);
        }
    }
}
