//! Page geometry and the positioned draw operations the compositor emits.
//!
//! All coordinates are millimetres from the top-left corner of the page; the PDF
//! renderer converts to points and flips the y axis.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::illustration::DecodedImage;
use crate::layout::font_metrics::TextStyle;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("invalid page config: {0}")]
    InvalidPageConfig(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

/// Fixed page geometry for one export.
///
/// `footer_reservation_mm` is measured from the bottom edge: no block may extend below
/// `height_mm - footer_reservation_mm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    pub footer_reservation_mm: f32,
}

/// A4 portrait, 15mm margins, 20mm reserved for the footer caption.
pub fn default_page_config() -> PageConfig {
    PageConfig {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_mm: 15.0,
        footer_reservation_mm: 20.0,
    }
}

impl PageConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let fields = [
            ("width_mm", self.width_mm),
            ("height_mm", self.height_mm),
            ("margin_mm", self.margin_mm),
            ("footer_reservation_mm", self.footer_reservation_mm),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidPageConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.width_mm <= 2.0 * self.margin_mm {
            return Err(LayoutError::InvalidPageConfig(
                "width must exceed twice the margin".to_string(),
            ));
        }
        if self.height_mm <= 2.0 * self.margin_mm {
            return Err(LayoutError::InvalidPageConfig(
                "height must exceed twice the margin".to_string(),
            ));
        }
        if self.margin_mm + self.footer_reservation_mm >= self.height_mm {
            return Err(LayoutError::InvalidPageConfig(
                "footer reservation leaves no room for content".to_string(),
            ));
        }
        Ok(())
    }

    /// Page width minus left and right margins.
    pub fn content_width(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    /// Lowest y any block may reach.
    pub fn content_bottom(&self) -> f32 {
        self.height_mm - self.footer_reservation_mm
    }

    /// Vertical space on a fresh page.
    pub fn usable_height(&self) -> f32 {
        self.content_bottom() - self.margin_mm
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Draw operations
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Horizontal anchor of a text run relative to its `x_mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    /// Pre-wrapped lines; `y_mm` is the top of the first line box.
    Text {
        x_mm: f32,
        y_mm: f32,
        style: TextStyle,
        align: Align,
        lines: Vec<String>,
    },
    Rect {
        x_mm: f32,
        y_mm: f32,
        width_mm: f32,
        height_mm: f32,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    },
    Line {
        x1_mm: f32,
        y1_mm: f32,
        x2_mm: f32,
        y2_mm: f32,
        width_mm: f32,
        color: Rgb,
    },
    Image {
        x_mm: f32,
        y_mm: f32,
        width_mm: f32,
        height_mm: f32,
        #[serde(skip)]
        image: DecodedImage,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Blocks and pages
// ────────────────────────────────────────────────────────────────────────────

/// The semantic unit a region of the page belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Header,
    OriginalText,
    Gloss,
    Explanation,
    Illustration,
    SymptomsHeader,
    Symptom { id: String },
}

/// Vertical extent committed for a block (or one fragment of a flowing text block).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedBlock {
    #[serde(flatten)]
    pub kind: BlockKind,
    pub y_mm: f32,
    pub height_mm: f32,
}

/// One output page: placed blocks, their draw operations, and the vertical cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub blocks: Vec<PlacedBlock>,
    pub ops: Vec<DrawOp>,
    /// Next free y offset.
    pub cursor_mm: f32,
}

impl Page {
    pub fn new(number: usize, top_margin_mm: f32) -> Self {
        Self {
            number,
            blocks: Vec::new(),
            ops: Vec::new(),
            cursor_mm: top_margin_mm,
        }
    }

    /// All text lines on the page drawn in `style`, in draw order.
    #[cfg(test)]
    pub fn text_lines(&self, style: TextStyle) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text {
                    style: s, lines, ..
                } if *s == style => Some(lines),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }

    #[cfg(test)]
    pub fn image_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Image { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_config_is_valid_a4() {
        let config = default_page_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.content_width(), 180.0);
        assert_eq!(config.content_bottom(), 277.0);
        assert_eq!(config.usable_height(), 262.0);
    }

    #[test]
    fn test_non_positive_values_rejected() {
        let config = PageConfig {
            margin_mm: 0.0,
            ..default_page_config()
        };
        assert!(config.validate().is_err());

        let config = PageConfig {
            footer_reservation_mm: f32::NAN,
            ..default_page_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_margins_must_fit_page() {
        let config = PageConfig {
            width_mm: 30.0,
            ..default_page_config()
        };
        assert_eq!(
            config.validate(),
            Err(LayoutError::InvalidPageConfig(
                "width must exceed twice the margin".to_string()
            ))
        );
    }

    #[test]
    fn test_footer_reservation_must_leave_content_room() {
        let config = PageConfig {
            footer_reservation_mm: 290.0,
            ..default_page_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_block_kind_serializes_flat() {
        let block = PlacedBlock {
            kind: BlockKind::Symptom {
                id: "febre".to_string(),
            },
            y_mm: 40.0,
            height_mm: 36.0,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["kind"], "symptom");
        assert_eq!(json["id"], "febre");
        assert_eq!(json["height_mm"], 36.0);
    }
}
