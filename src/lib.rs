//! scorelayout: alignment, justification and collision-aware positioning
//! for engraved scores.
//!
//! The engine takes a score tree ([`Document`]) and a [`Style`] and computes
//! where everything goes: the horizontal slot of every note, the vertical
//! position of every staff, and the geometry of slurs, ties, hairpins, text
//! directions and lyrics. Drawing is left to the caller; glyph extents come
//! from a [`GlyphMetrics`] implementation.
//!
//! # Example
//! ```no_run
//! use scorelayout::lay_out_json;
//!
//! let document = std::fs::read_to_string("score.json").unwrap();
//! let layout = lay_out_json(&document, r#"{ "breaks": "auto" }"#).unwrap();
//! println!("{layout}");
//! ```

pub mod error;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod style;

use log::info;

pub use error::{LayoutError, Result};
pub use layout::{
    ConnectorLayout, ElementLayout, Geometry, LayoutResult, MeasureLayout, PageLayout, PositionerLayout,
    StaffLayout, SyllableLayout, SystemLayout,
};
pub use metrics::{ApproximateMetrics, GlyphBounds, GlyphMetrics};
pub use model::*;
pub use style::{Breaks, Style};

use layout::ScoreLayout;

/// Lay out a document.
///
/// With [`Breaks::Auto`] the encoded systems and pages are ignored and
/// measures are cast off to fit the page; otherwise the encoded breaks are
/// kept. Only an invalid style or document is an error: problems with
/// individual elements are logged and the element is skipped.
pub fn lay_out(document: &Document, style: &Style, metrics: &dyn GlyphMetrics) -> Result<LayoutResult> {
    style.validate()?;

    let cast_off;
    let document = match style.breaks {
        Breaks::Auto => {
            cast_off = layout::cast_off(document, style, metrics)?;
            &cast_off
        }
        Breaks::Encoded => document,
    };

    let result = ScoreLayout::new(document, style, metrics)?.run();
    info!(
        "Laid out {} measures in {} systems on {} pages",
        document.measure_count(),
        result.system_count(),
        result.pages.len()
    );
    Ok(result)
}

/// Lay out a JSON document with a JSON style using the built-in glyph
/// estimates, and return the layout as JSON.
pub fn lay_out_json(document: &str, style: &str) -> Result<String> {
    let document = document_from_json(document)?;
    let style = style_from_json(style)?;
    let result = lay_out(&document, &style, &ApproximateMetrics)?;
    layout_to_json(&result)
}

/// Parse a score tree from JSON.
pub fn document_from_json(json: &str) -> Result<Document> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a style from JSON. Missing fields keep their defaults.
pub fn style_from_json(json: &str) -> Result<Style> {
    Style::from_json(json)
}

/// Convert a layout to a JSON string.
pub fn layout_to_json(layout: &LayoutResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(layout)?)
}
