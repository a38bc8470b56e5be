//! Hairpin geometry: two oblique edges opening or closing along the span.

use serde::Serialize;

use super::geometry::{BoundingBox, Point};
use super::spanning::SpanningType;
use crate::model::HairpinForm;
use crate::style::Style;

/// The two edges of a hairpin, relative to its center line at y = 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HairpinGeometry {
    pub upper: [Point; 2],
    pub lower: [Point; 2],
    pub thickness: f64,
}

impl HairpinGeometry {
    pub fn bbox(&self) -> BoundingBox {
        let points = [self.upper[0], self.upper[1], self.lower[0], self.lower[1]];
        BoundingBox::from_points(&points)
            .unwrap_or_default()
            .inflated(self.thickness / 2.0)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> HairpinGeometry {
        let t = |p: Point| p.translated(dx, dy);
        HairpinGeometry {
            upper: [t(self.upper[0]), t(self.upper[1])],
            lower: [t(self.lower[0]), t(self.lower[1])],
            thickness: self.thickness,
        }
    }
}

/// Openings at the start and end of a hairpin instance. A split hairpin
/// opens (or closes) halfway at the system break, and a hairpin crossing a
/// whole system runs between one and two thirds of the full opening.
pub fn hairpin_openings(form: HairpinForm, spanning: SpanningType, size: f64) -> (f64, f64) {
    match form {
        HairpinForm::Cres => match spanning {
            SpanningType::StartEnd => (0.0, size),
            SpanningType::Start => (0.0, size / 2.0),
            SpanningType::End => (size / 2.0, size),
            SpanningType::Middle => (size / 3.0, 2.0 * size / 3.0),
        },
        HairpinForm::Dim => match spanning {
            SpanningType::StartEnd => (size, 0.0),
            SpanningType::Start => (size, size / 2.0),
            SpanningType::End => (size / 2.0, 0.0),
            SpanningType::Middle => (2.0 * size / 3.0, size / 3.0),
        },
    }
}

/// Edges of a hairpin instance between `x1` and `x2`.
pub fn hairpin_geometry(
    form: HairpinForm,
    spanning: SpanningType,
    x1: f64,
    x2: f64,
    unit: f64,
    style: &Style,
) -> HairpinGeometry {
    let (start, end) = hairpin_openings(form, spanning, style.hairpin_size * unit);
    let y = -style.stem_width * unit / 2.0;
    HairpinGeometry {
        upper: [Point::new(x1, y + start / 2.0), Point::new(x2, y + end / 2.0)],
        lower: [Point::new(x1, y - start / 2.0), Point::new(x2, y - end / 2.0)],
        thickness: style.stem_width * unit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn crescendo_opens_towards_the_end() {
        let style = Style::default();
        let g = hairpin_geometry(HairpinForm::Cres, SpanningType::StartEnd, 0.0, 1000.0, 90.0, &style);
        let size = style.hairpin_size * 90.0;
        assert_approx_eq!(f64, g.upper[0].y, g.lower[0].y);
        assert_approx_eq!(f64, g.upper[1].y - g.lower[1].y, size);
        assert_approx_eq!(f64, g.upper[1].x, 1000.0);
    }

    #[test]
    fn split_openings() {
        let size = 300.0;
        assert_eq!(hairpin_openings(HairpinForm::Cres, SpanningType::Start, size), (0.0, 150.0));
        assert_eq!(hairpin_openings(HairpinForm::Cres, SpanningType::End, size), (150.0, 300.0));
        assert_eq!(hairpin_openings(HairpinForm::Dim, SpanningType::Start, size), (300.0, 150.0));
        assert_eq!(hairpin_openings(HairpinForm::Dim, SpanningType::Middle, size), (200.0, 100.0));
    }
}
