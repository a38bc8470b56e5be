//! Slur and tie geometry.
//!
//! Both produce a cubic bezier between two endpoints. Slurs rotate the frame
//! so that the endpoints are level, then grow the curve (or move its ends)
//! until it clears the notes it passes over. Ties connect two notes of the
//! same pitch and skip the clearance pass.

use std::cmp::Ordering;

use log::{debug, warn};
use serde::Serialize;

use super::constants::{
    SLUR_CONTROL_POINT_FACTOR, SLUR_CURVE_FACTOR, SLUR_HEIGHT_FACTOR, SLUR_MAX_SLOPE,
    SLUR_MIN_HEIGHT_ANGLE,
};
use super::elements::{BeamPosition, StaffMetrics};
use super::geometry::{bezier_bounds, bezier_y_at, BoundingBox, Point};
use super::spanning::SpanningType;
use crate::model::{CurveDir, StemDir};
use crate::style::Style;

/// A note, chord or timestamp a curve attaches to or passes over.
/// Coordinates are system-relative in x and staff-relative in y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveAnchor {
    pub x: f64,
    pub y: f64,
    /// Drawing top, including an upward stem
    pub top: f64,
    /// Drawing bottom, including a downward stem
    pub bottom: f64,
    /// Lowest and highest tone of the chord the anchor belongs to
    pub chord_extremes: Option<(f64, f64)>,
    /// Position of a chord tone within its chord: lowest, middle or highest
    pub chord_position: Option<Ordering>,
    pub stem_dir: Option<StemDir>,
    pub beam: Option<BeamPosition>,
    pub dots: u8,
    pub layer_n: u32,
    /// A timestamp rather than a note
    pub timestamp: bool,
}

impl CurveAnchor {
    /// An anchor at a timestamp, resting on the top line.
    pub fn at_timestamp(x: f64, layer_n: u32) -> Self {
        Self {
            x,
            y: 0.0,
            top: 0.0,
            bottom: 0.0,
            chord_extremes: None,
            chord_position: None,
            stem_dir: None,
            beam: None,
            dots: 0,
            layer_n,
            timestamp: true,
        }
    }
}

/// Final curve of a slur or tie instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveGeometry {
    /// Start, first control point, second control point, end
    pub points: [Point; 4],
    /// Rotation of the curve frame in radians
    pub angle: f64,
    pub thickness: f64,
    pub dir: CurveDir,
}

impl CurveGeometry {
    /// Box around the curve and its thickness.
    pub fn bbox(&self) -> BoundingBox {
        let b = bezier_bounds(&self.points);
        BoundingBox::new(
            b.x1,
            b.y1 - self.thickness / 2.0,
            b.x2,
            b.y2 + self.thickness / 2.0,
        )
    }
}

/// Everything a slur or tie instance needs to be drawn on one staff.
pub struct CurveInput<'a> {
    pub spanning: SpanningType,
    pub staff: &'a StaffMetrics,
    pub start: CurveAnchor,
    pub end: CurveAnchor,
    /// Horizontal extent of the instance, system edges for split ends
    pub x1: f64,
    pub x2: f64,
    /// Stem direction imposed by the start layer
    pub layer_stem_dir: Option<StemDir>,
    pub curve_dir: Option<CurveDir>,
    pub bulge: Option<f64>,
    /// Notes and chords of the same staff and layer, in any order
    pub content: &'a [CurveAnchor],
}

impl CurveInput<'_> {
    fn stem_dir(&self) -> Option<StemDir> {
        match self.spanning {
            SpanningType::StartEnd | SpanningType::Start => self.start.stem_dir,
            SpanningType::End => self.end.stem_dir,
            SpanningType::Middle => Some(StemDir::Down),
        }
    }

    /// Direction of the curve: explicit, then the layer, then the chord
    /// position, then opposite the stem, then the staff position.
    fn direction(&self, stem_dir: Option<StemDir>, y: f64) -> CurveDir {
        if let Some(dir) = self.curve_dir {
            return dir;
        }
        if let Some(layer_dir) = self.layer_stem_dir {
            return match layer_dir {
                StemDir::Up => CurveDir::Above,
                StemDir::Down => CurveDir::Below,
            };
        }
        match self.start.chord_position {
            Some(Ordering::Less) => return CurveDir::Below,
            Some(Ordering::Greater) => return CurveDir::Above,
            Some(Ordering::Equal) => {
                return if stem_dir != Some(StemDir::Up) {
                    CurveDir::Above
                } else {
                    CurveDir::Below
                };
            }
            None => {}
        }
        match stem_dir {
            Some(StemDir::Up) => CurveDir::Below,
            Some(StemDir::Down) => CurveDir::Above,
            None => {
                let center = -2.0 * self.staff.double_unit;
                if y > center {
                    CurveDir::Above
                } else {
                    CurveDir::Below
                }
            }
        }
    }
}

fn sign(dir: CurveDir) -> f64 {
    match dir {
        CurveDir::Above => 1.0,
        CurveDir::Below => -1.0,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Slurs
// ═══════════════════════════════════════════════════════════════════════

/// Compute the curve of a slur instance.
pub fn slur_geometry(input: &CurveInput<'_>, style: &Style) -> CurveGeometry {
    let staff = input.staff;
    let unit = staff.unit;

    if input.start.layer_n != input.end.layer_n {
        warn!("Slurs between different layers may not be fully supported");
    }

    let stem_dir = input.stem_dir();
    let dir = input.direction(stem_dir, input.start.y);
    let above = dir == CurveDir::Above;

    let (mut x1, mut x2) = (input.x1, input.x2);
    let (mut y1, mut y2) = (0.0, 0.0);
    let is_short = x2 - x1 < 3.0 * staff.double_unit;

    if input.spanning.has_start() {
        let start = &input.start;
        let inner = is_short || start.beam.is_some_and(|b| !b.last);
        if above {
            if start.stem_dir == Some(StemDir::Down) || inner {
                y1 = start.top;
            } else {
                // On the side of the stem.
                if !start.timestamp {
                    x1 += 2.0 * unit;
                }
                y1 = start.chord_extremes.map_or(start.y, |(_, max)| max) + 3.0 * unit;
            }
        } else if start.stem_dir == Some(StemDir::Up) || inner {
            y1 = start.bottom;
        } else {
            y1 = start.chord_extremes.map_or(start.y, |(min, _)| min) - 3.0 * unit;
        }
    }
    if input.spanning.has_end() {
        let end = &input.end;
        let inner = is_short || end.beam.is_some_and(|b| !b.first);
        if above {
            if end.stem_dir == Some(StemDir::Down) || inner {
                y2 = end.top;
            } else {
                y2 = end.chord_extremes.map_or(end.y, |(_, max)| max) + 3.0 * unit;
            }
        } else if end.stem_dir == Some(StemDir::Up) || inner {
            y2 = end.bottom;
        } else {
            if !end.timestamp {
                x2 -= 2.0 * unit;
            }
            y2 = end.chord_extremes.map_or(end.y, |(min, _)| min) - 3.0 * unit;
        }
    }

    // Ends not attached to a note stay clear of the staff.
    let clamp = |other: f64| {
        if above {
            other.max(0.0)
        } else {
            other.min(-staff.staff_height)
        }
    };
    if input.spanning == SpanningType::Start || input.end.timestamp {
        y2 = clamp(y1);
    }
    if input.spanning == SpanningType::End {
        y1 = clamp(y2);
    }
    if input.start.timestamp {
        y1 = clamp(y2);
    } else if input.spanning == SpanningType::Middle {
        y1 = if above { 0.0 } else { -staff.staff_height };
        y2 = y1;
    }

    y1 += sign(dir) * unit;
    y2 += sign(dir) * unit;

    let content: Vec<&CurveAnchor> = input
        .content
        .iter()
        .filter(|c| !c.timestamp)
        .collect();
    let (points, angle) = adjust_slur(
        Point::new(x1, y1),
        Point::new(x2, y2),
        dir,
        input.bulge,
        &content,
        staff,
        style,
    );

    CurveGeometry {
        points,
        angle,
        thickness: unit * style.slur_thickness,
        dir,
    }
}

/// Fit the curve between `p1` and `p2` around the content. Returns the
/// bezier points in the unrotated frame and the rotation angle.
fn adjust_slur(
    mut p1: Point,
    mut p2: Point,
    dir: CurveDir,
    bulge: Option<f64>,
    content: &[&CurveAnchor],
    staff: &StaffMetrics,
    style: &Style,
) -> ([Point; 4], f64) {
    let unit = staff.unit;
    let mut angle = adjusted_slur_angle(&mut p1, &mut p2, dir);
    let mut rotated_p2 = p2.rotated(-angle, p1);

    let height = match bulge {
        Some(bulge) => unit * bulge,
        None => {
            let dist = (rotated_p2.x - p1.x).abs();
            (dist / SLUR_HEIGHT_FACTOR)
                .max(style.slur_min_height * unit)
                .min(style.slur_max_height * unit)
        }
    } * 4.0
        / 3.0;

    let (mut c1, mut c2) = control_points(p1, rotated_p2, dir, height, staff.staff_height);

    let between: Vec<&CurveAnchor> = content
        .iter()
        .copied()
        .filter(|c| c.x > p1.x.min(p2.x) && c.x < p1.x.max(p2.x))
        .collect();
    let mut points = spanning_points(&between, p1, angle, dir, unit);

    if !points.is_empty() {
        let (mut adjusted_c1, mut adjusted_c2) = (c1, c2);
        adjust_slur_curve(&mut points, p1, rotated_p2, &mut adjusted_c1, &mut adjusted_c2, dir, angle, true);
        adjust_slur_position(&points, &mut p1, &mut rotated_p2, adjusted_c1, adjusted_c2, dir, &mut angle, true);

        // Second pass from the default height with the moved endpoints.
        (c1, c2) = control_points(p1, rotated_p2, dir, height, staff.staff_height);
        for point in &mut points {
            point.at = spanning_point(between[point.anchor], p1, angle, dir, unit);
        }
        if let Some(max_height) = adjust_slur_curve(&mut points, p1, rotated_p2, &mut c1, &mut c2, dir, angle, false) {
            adjust_slur_position(&points, &mut p1, &mut rotated_p2, c1, c2, dir, &mut angle, true);
            (c1, c2) = control_points(p1, rotated_p2, dir, max_height, staff.staff_height);
        }
    }

    let p2 = rotated_p2.rotated(angle, p1);
    let c1 = c1.rotated(angle, p1);
    let c2 = c2.rotated(angle, p1);
    ([p1, c1, c2, p2], angle)
}

/// Slope of the line between the endpoints, limited to the maximum slope
/// by moving one endpoint.
pub(crate) fn adjusted_slur_angle(p1: &mut Point, p2: &mut Point, dir: CurveDir) -> f64 {
    let angle = (p2.y - p1.y).atan2(p2.x - p1.x);
    if angle.abs() <= SLUR_MAX_SLOPE {
        return angle;
    }
    let side = (p2.x - p1.x) * SLUR_MAX_SLOPE.sin() / (std::f64::consts::FRAC_PI_2 - SLUR_MAX_SLOPE).sin();
    if p2.y > p1.y {
        match dir {
            CurveDir::Above => p1.y = p2.y - side,
            CurveDir::Below => p2.y = p1.y + side,
        }
        SLUR_MAX_SLOPE
    } else {
        match dir {
            CurveDir::Above => p2.y = p1.y - side,
            CurveDir::Below => p1.y = p2.y + side,
        }
        -SLUR_MAX_SLOPE
    }
}

/// Control points at a fraction of the span, `height` away from the ends.
pub(crate) fn control_points(p1: Point, p2: Point, dir: CurveDir, height: f64, staff_size: f64) -> (Point, Point) {
    let c_pos = ((p2.x - p1.x) / SLUR_CONTROL_POINT_FACTOR).min(staff_size);
    let h = sign(dir) * height;
    (
        Point::new(p1.x + c_pos, p1.y + h),
        Point::new(p2.x - c_pos, p2.y + h),
    )
}

/// A point the curve must clear, in the rotated frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpanPoint {
    /// Index of the anchor it comes from
    pub anchor: usize,
    pub at: Point,
}

fn spanning_point(anchor: &CurveAnchor, p1: Point, angle: f64, dir: CurveDir, unit: f64) -> Point {
    let y = match dir {
        CurveDir::Above => anchor.top,
        CurveDir::Below => anchor.bottom,
    };
    let p = Point::new(anchor.x, y).rotated(-angle, p1);
    p.translated(0.0, sign(dir) * 2.0 * unit)
}

fn spanning_points(content: &[&CurveAnchor], p1: Point, angle: f64, dir: CurveDir, unit: f64) -> Vec<SpanPoint> {
    content
        .iter()
        .enumerate()
        .map(|(anchor, c)| SpanPoint {
            anchor,
            at: spanning_point(c, p1, angle, dir, unit),
        })
        .collect()
}

/// Whether the curve passes beyond the point on its side.
fn clears(curve_y: f64, point: &Point, dir: CurveDir) -> bool {
    match dir {
        CurveDir::Above => curve_y >= point.y,
        CurveDir::Below => curve_y <= point.y,
    }
}

/// Raise the control points so that the curve clears `points`, within a
/// height limit that depends on the span and the angle. Points already
/// clear are dropped. Returns the limit when it was reached.
#[allow(clippy::too_many_arguments)]
pub(crate) fn adjust_slur_curve(
    points: &mut Vec<SpanPoint>,
    p1: Point,
    p2: Point,
    c1: &mut Point,
    c2: &mut Point,
    dir: CurveDir,
    angle: f64,
    pos_ratio: bool,
) -> Option<f64> {
    let bezier = [p1, *c1, *c2, p2];
    let dist = (p2.x - p1.x).abs();
    let current_height = (c1.y - p1.y).abs();
    let max_height = dist / (angle.abs().max(SLUR_MIN_HEIGHT_ANGLE) * (SLUR_CURVE_FACTOR + 5.0));

    if max_height <= current_height {
        return None;
    }

    let mut max_ratio: f64 = 1.0;
    points.retain(|span_point| {
        let point = &span_point.at;
        let y = bezier_y_at(&bezier, point.x);
        if clears(y, point, dir) {
            return false;
        }
        let mut pos_x_ratio = 1.0;
        if pos_ratio && dist > 0.0 {
            let mut pos_x = point.x - p1.x;
            if pos_x > dist / 2.0 {
                pos_x = p2.x - point.x;
            }
            pos_x_ratio = pos_x / (dist / 2.0);
        }
        let denom = p1.y - y;
        if denom.abs() > f64::EPSILON {
            let ratio = (p1.y - point.y) / denom * pos_x_ratio;
            max_ratio = max_ratio.max(ratio);
        }
        true
    });

    let mut reached_max = false;
    if current_height * max_ratio > max_height {
        reached_max = true;
        max_ratio = if current_height > 0.0 {
            max_height / current_height
        } else {
            1.0
        };
    }
    if max_ratio > 1.0 {
        c1.y = p1.y + sign(dir) * current_height * max_ratio;
        c2.y = c1.y;
    }
    reached_max.then_some(max_height)
}

/// Move the endpoints by the remaining clearance and update the angle.
/// `p2` is in the rotated frame before and after.
#[allow(clippy::too_many_arguments)]
pub(crate) fn adjust_slur_position(
    points: &[SpanPoint],
    p1: &mut Point,
    p2: &mut Point,
    c1: Point,
    c2: Point,
    dir: CurveDir,
    angle: &mut f64,
    force_both_sides: bool,
) {
    if points.is_empty() {
        return;
    }
    let bezier = [*p1, c1, c2, *p2];
    let dist = (p2.x - p1.x).abs();
    let (mut shift_left, mut shift_right): (f64, f64) = (0.0, 0.0);

    for point in points.iter().map(|p| &p.at) {
        let y = bezier_y_at(&bezier, point.x);
        let mut pos_x = point.x - p1.x;
        let mut left_point = true;
        if pos_x > dist / 2.0 {
            pos_x = p2.x - point.x;
            left_point = false;
        }
        let pos_x_ratio = if dist > 0.0 { pos_x / (dist / 2.0) } else { 1.0 };

        let shift = if clears(y, point, dir) {
            0.0
        } else {
            (point.y - y).abs()
        };
        if shift > 0.0 {
            let left = if force_both_sides || left_point { shift } else { shift * pos_x_ratio };
            let right = if force_both_sides || !left_point { shift } else { shift * pos_x_ratio };
            shift_left = shift_left.max(left);
            shift_right = shift_right.max(right);
        }
    }

    let mut unrotated = p2.rotated(*angle, *p1);
    p1.y += sign(dir) * shift_left;
    unrotated.y += sign(dir) * shift_right;
    *angle = adjusted_slur_angle(p1, &mut unrotated, dir);
    *p2 = unrotated.rotated(-*angle, *p1);
}

// ═══════════════════════════════════════════════════════════════════════
// Ties
// ═══════════════════════════════════════════════════════════════════════

/// Compute the curve of a tie instance. A tie crossing a whole system is
/// not drawn.
pub fn tie_geometry(input: &CurveInput<'_>, style: &Style) -> Option<CurveGeometry> {
    let staff = input.staff;
    let unit = staff.unit;
    let (start, end) = (&input.start, &input.end);

    if start.timestamp || end.timestamp {
        debug!("Tie without a start or end note is not drawn");
        return None;
    }
    if start.layer_n != end.layer_n {
        warn!("Ties between different layers may not be fully supported");
    }

    let (mut x1, mut x2) = (input.x1, input.x2);
    let chord_tone = start.chord_position.is_some();
    let is_short = !chord_tone && x2 - x1 < 3.0 * staff.double_unit;

    let (mut y1, mut y2, stem_dir) = match input.spanning {
        SpanningType::StartEnd => {
            if !is_short {
                x1 += 1.5 * unit;
                x2 -= 1.5 * unit;
                x1 += staff.double_unit * f64::from(start.dots);
            }
            (start.y, end.y, start.stem_dir)
        }
        SpanningType::Start => {
            if !is_short {
                x1 += 1.5 * unit;
            }
            (start.y, start.y, start.stem_dir)
        }
        SpanningType::End => {
            if !is_short {
                x2 -= 1.5 * unit;
            }
            (end.y, end.y, end.stem_dir)
        }
        SpanningType::Middle => {
            debug!("Tie across an entire system is not supported");
            return None;
        }
    };

    let dir = input.direction(stem_dir, y1);
    let offset = sign(dir) * (unit / 2.0 + if is_short { unit } else { 0.0 });
    y1 += offset;
    y2 += offset;

    let height = match input.bulge {
        Some(bulge) => unit * bulge,
        None if x2 - x1 > 2.0 * staff.staff_height => 2.0 * unit,
        None => unit,
    } * 4.0
        / 3.0;

    let h = sign(dir) * height;
    let c1 = Point::new(x1 + (x2 - x1) / 4.0, y1 + h);
    let c2 = Point::new(x1 + (x2 - x1) / 4.0 * 3.0, y2 + h);

    Some(CurveGeometry {
        points: [Point::new(x1, y1), c1, c2, Point::new(x2, y2)],
        angle: 0.0,
        thickness: unit * style.tie_thickness,
        dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StaffDef;
    use float_cmp::{approx_eq, assert_approx_eq};

    fn staff() -> StaffMetrics {
        StaffMetrics::new(&StaffDef::new(1), 0, &Style::default())
    }

    fn note(staff: &StaffMetrics, x: f64, loc: i32, stem_dir: Option<StemDir>) -> CurveAnchor {
        let y = staff.loc_y(loc);
        let u = staff.unit;
        CurveAnchor {
            x,
            y,
            top: if stem_dir == Some(StemDir::Up) { y + 7.0 * u } else { y + u },
            bottom: if stem_dir == Some(StemDir::Down) { y - 7.0 * u } else { y - u },
            chord_extremes: None,
            chord_position: None,
            stem_dir,
            beam: None,
            dots: 0,
            layer_n: 1,
            timestamp: false,
        }
    }

    #[test]
    fn angle_is_limited_to_max_slope() {
        let mut p1 = Point::new(0.0, 0.0);
        let mut p2 = Point::new(100.0, 200.0);
        let angle = adjusted_slur_angle(&mut p1, &mut p2, CurveDir::Above);
        assert_approx_eq!(f64, angle, SLUR_MAX_SLOPE);
        let slope = (p2.y - p1.y) / (p2.x - p1.x);
        assert!(approx_eq!(f64, slope, SLUR_MAX_SLOPE.tan(), epsilon = 1e-9));
        // Above: the lower end is raised.
        assert_approx_eq!(f64, p2.y, 200.0);
        assert!(p1.y > 0.0);
    }

    #[test]
    fn control_points_stay_within_a_staff_height() {
        let (c1, c2) = control_points(Point::new(0.0, 0.0), Point::new(10000.0, 0.0), CurveDir::Below, 100.0, 720.0);
        assert_approx_eq!(f64, c1.x, 720.0);
        assert_approx_eq!(f64, c2.x, 10000.0 - 720.0);
        assert_approx_eq!(f64, c1.y, -100.0);
    }

    #[test]
    fn stem_up_slur_goes_below() {
        let staff = staff();
        let style = Style::default();
        let start = note(&staff, 0.0, 2, Some(StemDir::Up));
        let end = note(&staff, 1800.0, 2, Some(StemDir::Up));
        let input = CurveInput {
            spanning: SpanningType::StartEnd,
            staff: &staff,
            start,
            end,
            x1: start.x,
            x2: end.x,
            layer_stem_dir: None,
            curve_dir: None,
            bulge: None,
            content: &[],
        };
        let curve = slur_geometry(&input, &style);
        assert_eq!(curve.dir, CurveDir::Below);
        // Attached at the bottom of the heads, one unit lower.
        assert_approx_eq!(f64, curve.points[0].y, start.bottom - staff.unit);
        assert!(curve.points[1].y < curve.points[0].y);
        assert_approx_eq!(f64, curve.thickness, staff.unit * style.slur_thickness);
    }

    #[test]
    fn explicit_direction_wins() {
        let staff = staff();
        let style = Style::default();
        let start = note(&staff, 0.0, 2, Some(StemDir::Up));
        let end = note(&staff, 1800.0, 2, Some(StemDir::Up));
        let input = CurveInput {
            spanning: SpanningType::StartEnd,
            staff: &staff,
            start,
            end,
            x1: start.x,
            x2: end.x,
            layer_stem_dir: Some(StemDir::Down),
            curve_dir: Some(CurveDir::Above),
            bulge: Some(2.0),
            content: &[],
        };
        let curve = slur_geometry(&input, &style);
        assert_eq!(curve.dir, CurveDir::Above);
        assert!(curve.points[1].y > curve.points[0].y);
    }

    #[test]
    fn middle_tie_is_not_drawn() {
        let staff = staff();
        let a = note(&staff, 0.0, 4, None);
        let input = CurveInput {
            spanning: SpanningType::Middle,
            staff: &staff,
            start: a,
            end: a,
            x1: 0.0,
            x2: 5000.0,
            layer_stem_dir: None,
            curve_dir: None,
            bulge: None,
            content: &[],
        };
        assert!(tie_geometry(&input, &Style::default()).is_none());
    }

    #[test]
    fn tie_control_points_at_quarters() {
        let staff = staff();
        let start = note(&staff, 0.0, 6, Some(StemDir::Down));
        // Shorter than two staff heights once inset.
        let end = note(&staff, 1200.0, 6, Some(StemDir::Down));
        let input = CurveInput {
            spanning: SpanningType::StartEnd,
            staff: &staff,
            start,
            end,
            x1: start.x,
            x2: end.x,
            layer_stem_dir: None,
            curve_dir: None,
            bulge: None,
            content: &[],
        };
        let curve = tie_geometry(&input, &Style::default()).expect("tie");
        let [p1, c1, c2, p2] = curve.points;
        assert_eq!(curve.dir, CurveDir::Above);
        assert_approx_eq!(f64, p1.x, 1.5 * staff.unit);
        assert_approx_eq!(f64, p2.x, 1200.0 - 1.5 * staff.unit);
        assert_approx_eq!(f64, c1.x - p1.x, (p2.x - p1.x) / 4.0);
        assert_approx_eq!(f64, c2.x - p1.x, (p2.x - p1.x) * 3.0 / 4.0);
        assert_approx_eq!(f64, p1.y, start.y + staff.unit / 2.0);
        assert_approx_eq!(f64, c1.y - p1.y, staff.unit * 4.0 / 3.0);
    }

    #[test]
    fn tie_to_a_timestamp_is_not_drawn() {
        let staff = staff();
        let start = note(&staff, 0.0, 6, None);
        let end = CurveAnchor::at_timestamp(1500.0, 1);
        let input = CurveInput {
            spanning: SpanningType::StartEnd,
            staff: &staff,
            start,
            end,
            x1: start.x,
            x2: end.x,
            layer_stem_dir: None,
            curve_dir: None,
            bulge: None,
            content: &[],
        };
        assert!(tie_geometry(&input, &Style::default()).is_none());
        let reversed = CurveInput { start: end, end: start, ..input };
        assert!(tie_geometry(&reversed, &Style::default()).is_none());
    }

    #[test]
    fn unvalidated_height_limits_do_not_panic() {
        let staff = staff();
        let style = Style {
            slur_min_height: 4.0,
            slur_max_height: 1.0,
            ..Style::default()
        };
        let start = note(&staff, 0.0, 2, Some(StemDir::Down));
        let end = note(&staff, 3000.0, 2, Some(StemDir::Down));
        let input = CurveInput {
            spanning: SpanningType::StartEnd,
            staff: &staff,
            start,
            end,
            x1: start.x,
            x2: end.x,
            layer_stem_dir: None,
            curve_dir: None,
            bulge: None,
            content: &[],
        };
        let curve = slur_geometry(&input, &style);
        // The maximum wins.
        assert_approx_eq!(f64, curve.points[1].y - curve.points[0].y, staff.unit * 4.0 / 3.0);
    }

    #[test]
    fn long_tie_is_twice_as_high() {
        let staff = staff();
        let start = note(&staff, 0.0, 6, Some(StemDir::Down));
        let end = note(&staff, 2000.0, 6, Some(StemDir::Down));
        let input = CurveInput {
            spanning: SpanningType::StartEnd,
            staff: &staff,
            start,
            end,
            x1: start.x,
            x2: end.x,
            layer_stem_dir: None,
            curve_dir: None,
            bulge: None,
            content: &[],
        };
        let curve = tie_geometry(&input, &Style::default()).expect("tie");
        let [p1, c1, _, p2] = curve.points;
        assert!(p2.x - p1.x > 2.0 * staff.staff_height);
        assert_approx_eq!(f64, c1.y - p1.y, 2.0 * staff.unit * 4.0 / 3.0);
    }
}
