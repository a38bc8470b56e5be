//! Style configuration consumed by the layout engine.
//!
//! Lengths are expressed in drawing units (half a staff space at a staff
//! size of 100%) unless the field name says otherwise. Page dimensions are
//! absolute layout points. Every field has a default so a partial JSON
//! object is a valid style.
//!
//! ```
//! use scorelayout::Style;
//!
//! let style = Style::from_json(r#"{ "spacing_linear": 0.3, "justify": false }"#).unwrap();
//! assert!(!style.justify);
//! assert_eq!(style.unit, Style::default().unit);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// How systems and pages are broken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breaks {
    /// Keep the pages and systems encoded in the document.
    #[default]
    Encoded,
    /// Re-flow all measures into systems and pages that fit the page size.
    Auto,
}

/// Per-class horizontal margins (left and right of an element's box).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassMargins {
    pub note: f64,
    pub rest: f64,
    pub clef: f64,
    pub key_sig: f64,
    pub meter_sig: f64,
    pub mensur: f64,
    pub barline: f64,
    pub accid: f64,
    pub dot: f64,
    pub multi_rest: f64,
}

impl Default for ClassMargins {
    fn default() -> Self {
        Self {
            note: 0.5,
            rest: 0.5,
            clef: 1.0,
            key_sig: 1.0,
            meter_sig: 1.0,
            mensur: 1.0,
            barline: 0.5,
            accid: 0.25,
            dot: 0.25,
            multi_rest: 1.5,
        }
    }
}

/// Vertical margins used when stacking staves and placing floating content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalMargins {
    /// Added below every staff when computing its shift.
    pub staff: f64,
    /// Added to each verse line.
    pub syl: f64,
    /// Gap between a floating element and what it is placed against.
    pub floating: f64,
}

impl Default for VerticalMargins {
    fn default() -> Self {
        Self {
            staff: 0.0,
            syl: 0.5,
            floating: 1.0,
        }
    }
}

/// All margins, grouped by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub left: ClassMargins,
    pub right: ClassMargins,
    pub bottom: VerticalMargins,
}

/// Style and spacing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Size of one drawing unit in layout points at a staff size of 100%.
    pub unit: f64,
    /// Page width in layout points.
    pub page_width: f64,
    /// Page height in layout points.
    pub page_height: f64,
    pub page_margin_left: f64,
    pub page_margin_right: f64,
    pub page_margin_top: f64,
    pub page_margin_bottom: f64,
    /// System margins in layout points (inside the page margins).
    pub system_margin_left: f64,
    pub system_margin_right: f64,
    /// Linear coefficient of the duration spacing formula.
    pub spacing_linear: f64,
    /// Exponent of the duration spacing formula, in (0, 1].
    pub spacing_non_linear: f64,
    /// Skip duration-based spacing and only separate colliding boxes.
    pub even_spacing: bool,
    pub min_measure_width: f64,
    /// Left padding of every measure.
    pub left_position: f64,
    /// Minimum distance between two staves.
    pub spacing_staff: f64,
    /// Distance between two systems.
    pub spacing_system: f64,
    pub staff_line_width: f64,
    pub stem_width: f64,
    pub barline_width: f64,
    pub slur_min_height: f64,
    pub slur_max_height: f64,
    pub slur_thickness: f64,
    pub tie_thickness: f64,
    /// Opening of a hairpin.
    pub hairpin_size: f64,
    /// Lyric (and text) font size.
    pub lyric_size: f64,
    /// Stretch or compress systems to the available width.
    pub justify: bool,
    pub breaks: Breaks,
    pub margins: Margins,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            unit: 90.0,
            page_width: 21000.0,
            page_height: 29700.0,
            page_margin_left: 500.0,
            page_margin_right: 500.0,
            page_margin_top: 500.0,
            page_margin_bottom: 500.0,
            system_margin_left: 0.0,
            system_margin_right: 0.0,
            spacing_linear: 0.25,
            spacing_non_linear: 0.6,
            even_spacing: false,
            min_measure_width: 15.0,
            left_position: 0.8,
            spacing_staff: 8.0,
            spacing_system: 6.0,
            staff_line_width: 0.15,
            stem_width: 0.2,
            barline_width: 0.3,
            slur_min_height: 1.0,
            slur_max_height: 3.0,
            slur_thickness: 0.6,
            tie_thickness: 0.5,
            hairpin_size: 3.0,
            lyric_size: 4.5,
            justify: true,
            breaks: Breaks::Encoded,
            margins: Margins::default(),
        }
    }
}

impl Style {
    /// Parse a style from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let style: Style = serde_json::from_str(json)?;
        style.validate()?;
        Ok(style)
    }

    /// Check that the style describes a usable page.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("unit", self.unit),
            ("page_width", self.page_width),
            ("page_height", self.page_height),
            ("spacing_linear", self.spacing_linear),
            ("min_measure_width", self.min_measure_width),
            ("lyric_size", self.lyric_size),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LayoutError::invalid_style(
                    field,
                    format!("must be a positive number, got {value}"),
                ));
            }
        }

        let non_negative = [
            ("page_margin_left", self.page_margin_left),
            ("page_margin_right", self.page_margin_right),
            ("page_margin_top", self.page_margin_top),
            ("page_margin_bottom", self.page_margin_bottom),
            ("system_margin_left", self.system_margin_left),
            ("system_margin_right", self.system_margin_right),
            ("left_position", self.left_position),
            ("spacing_staff", self.spacing_staff),
            ("spacing_system", self.spacing_system),
            ("staff_line_width", self.staff_line_width),
            ("stem_width", self.stem_width),
            ("barline_width", self.barline_width),
            ("slur_min_height", self.slur_min_height),
            ("slur_thickness", self.slur_thickness),
            ("tie_thickness", self.tie_thickness),
            ("hairpin_size", self.hairpin_size),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(LayoutError::invalid_style(
                    field,
                    format!("must be zero or positive, got {value}"),
                ));
            }
        }

        if !(self.spacing_non_linear > 0.0 && self.spacing_non_linear <= 1.0) {
            return Err(LayoutError::invalid_style(
                "spacing_non_linear",
                format!("must be in (0, 1], got {}", self.spacing_non_linear),
            ));
        }
        if self.slur_max_height < self.slur_min_height {
            return Err(LayoutError::invalid_style(
                "slur_max_height",
                "must not be smaller than slur_min_height",
            ));
        }
        if self.system_width() <= 0.0 {
            return Err(LayoutError::invalid_style(
                "page_width",
                "margins leave no room for a system",
            ));
        }
        if self.page_height - self.page_margin_top - self.page_margin_bottom <= 0.0 {
            return Err(LayoutError::invalid_style(
                "page_height",
                "margins leave no room for a system",
            ));
        }
        Ok(())
    }

    /// Drawing unit for a staff size given in percent.
    pub fn drawing_unit(&self, staff_size: u32) -> f64 {
        self.unit * f64::from(staff_size) / 100.0
    }

    /// Distance between two staff lines.
    pub fn double_unit(&self, staff_size: u32) -> f64 {
        2.0 * self.drawing_unit(staff_size)
    }

    /// Height of a five-line staff, which is also the music font size.
    pub fn staff_size(&self, staff_size: u32) -> f64 {
        4.0 * self.double_unit(staff_size)
    }

    /// Lyric font size for a staff size.
    pub fn lyric_font_size(&self, staff_size: u32) -> f64 {
        self.drawing_unit(staff_size) * self.lyric_size
    }

    /// Width between the page margins, before system margins.
    pub fn system_full_width(&self) -> f64 {
        self.page_width - self.page_margin_left - self.page_margin_right
    }

    /// Width available to measure content.
    pub fn system_width(&self) -> f64 {
        self.system_full_width() - self.system_margin_left - self.system_margin_right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_is_valid() {
        assert!(Style::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let style = Style::from_json(r#"{ "breaks": "auto", "margins": { "left": { "note": 2.0 } } }"#)
            .expect("valid style");
        assert_eq!(style.breaks, Breaks::Auto);
        assert_eq!(style.margins.left.note, 2.0);
        assert_eq!(style.margins.left.rest, ClassMargins::default().rest);
        assert_eq!(style.page_width, 21000.0);
    }

    #[test]
    fn rejects_bad_exponent() {
        let err = Style::from_json(r#"{ "spacing_non_linear": 1.5 }"#).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::InvalidStyle { field: "spacing_non_linear", .. }
        ));
    }

    #[test]
    fn rejects_margins_wider_than_page() {
        let style = Style {
            page_margin_left: 15000.0,
            page_margin_right: 6000.0,
            ..Style::default()
        };
        assert!(style.validate().is_err());
    }

    #[test]
    fn unit_scales_with_staff_size() {
        let style = Style::default();
        assert_eq!(style.drawing_unit(100), 90.0);
        assert_eq!(style.drawing_unit(50), 45.0);
        assert_eq!(style.staff_size(100), 720.0);
    }
}
