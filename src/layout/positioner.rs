//! Floating positioners: placed boxes of slurs, ties, hairpins, text
//! directions and lyrics on one staff.
//!
//! A positioner keeps the content box of its element, staff-relative, and a
//! vertical offset `y_rel` found while stacking. Curves are laid out in place
//! and never moved; everything else starts one margin away from the staff
//! and is pushed outwards past the boxes already recorded on its side.

use serde::Serialize;

use super::geometry::BoundingBox;
use super::hairpins::HairpinGeometry;
use super::slurs::CurveGeometry;
use super::spanning::SpanningType;
use crate::model::Place;

/// Class of a floating element. The declaration order is the order in
/// which the classes are adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FloatingClass {
    Tie,
    Slur,
    Hairpin,
    Dynam,
    Tempo,
    Dir,
    Syl,
}

impl FloatingClass {
    /// All classes in adjustment order.
    pub const ADJUSTMENT_ORDER: [FloatingClass; 7] = [
        FloatingClass::Tie,
        FloatingClass::Slur,
        FloatingClass::Hairpin,
        FloatingClass::Dynam,
        FloatingClass::Tempo,
        FloatingClass::Dir,
        FloatingClass::Syl,
    ];

    pub fn is_curve(self) -> bool {
        matches!(self, FloatingClass::Tie | FloatingClass::Slur)
    }
}

/// Drawable geometry of a positioner, before `y_rel` is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionerGeometry {
    Curve(CurveGeometry),
    Hairpin(HairpinGeometry),
    /// Text anchored at `(x, y)` on its baseline
    Text { x: f64, y: f64 },
}

/// One floating element instance on one staff.
#[derive(Debug, Clone)]
pub struct FloatingPositioner {
    /// Index of the spanning element in the layout
    pub spanner: usize,
    pub id: Option<String>,
    pub class: FloatingClass,
    pub spanning: SpanningType,
    pub place: Place,
    pub geometry: PositionerGeometry,
    content: BoundingBox,
    y_rel: f64,
}

impl FloatingPositioner {
    pub fn new(
        spanner: usize,
        id: Option<String>,
        class: FloatingClass,
        spanning: SpanningType,
        place: Place,
        geometry: PositionerGeometry,
        content: BoundingBox,
    ) -> Self {
        Self {
            spanner,
            id,
            class,
            spanning,
            place,
            geometry,
            content,
            y_rel: 0.0,
        }
    }

    /// Box of the content once moved by `y_rel`.
    pub fn bbox(&self) -> BoundingBox {
        self.content.translated(0.0, self.y_rel)
    }

    pub fn y_rel(&self) -> f64 {
        self.y_rel
    }

    pub fn horizontal_overlap(&self, other: &BoundingBox) -> bool {
        self.content.horizontal_overlap(other)
    }

    /// Place the content one `margin` away from the staff, or, given an
    /// overlapping box on the same side, beyond that box. A positioner
    /// only moves outwards.
    pub fn calc_drawing_y_rel(&mut self, staff_height: f64, margin: f64, against: Option<&BoundingBox>) {
        let c = self.content;
        match (self.place, against) {
            (Place::Above, None) => self.y_rel = margin - c.y1,
            (Place::Below, None) => self.y_rel = -staff_height - margin - c.y2,
            (Place::Above, Some(b)) => self.y_rel = self.y_rel.max(b.y2 + margin - c.y1),
            (Place::Below, Some(b)) => self.y_rel = self.y_rel.min(b.y1 - margin - c.y2),
        }
    }

    /// Geometry with `y_rel` applied.
    pub fn placed_geometry(&self) -> PositionerGeometry {
        match &self.geometry {
            PositionerGeometry::Curve(curve) => PositionerGeometry::Curve(*curve),
            PositionerGeometry::Hairpin(hairpin) => PositionerGeometry::Hairpin(hairpin.translated(0.0, self.y_rel)),
            PositionerGeometry::Text { x, y } => PositionerGeometry::Text { x: *x, y: y + self.y_rel },
        }
    }
}
