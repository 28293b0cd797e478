// Document layout: page geometry, font metrics + wrapping, and the compositor.
// Composition is CPU-bound (image decoding) and must run inside tokio::task::spawn_blocking.

pub mod compositor;
pub mod font_metrics;
pub mod page;

// Re-export the public API consumed by other modules (session, render, handlers).
pub use compositor::{compose, DocumentModel, DocumentSymptom};
pub use page::{default_page_config, Page, PageConfig};
