//! Lyrics: verse bands below the staff and the connectors between
//! syllables.

use super::elements::StaffMetrics;
use super::geometry::BoundingBox;
use super::spanning::SpanningType;
use crate::model::SylConnector;
use crate::style::Style;

// ── Lyrics constants ────────────────────────────────────────────────
/// Dash length, in drawing units.
const DASH_LENGTH: f64 = 4.0 / 3.0;
/// Distance between dashes, in staff heights.
const DASH_SPACE: f64 = 5.0 / 3.0;
/// Dash height above the baseline, in drawing units.
const DASH_RAISE: f64 = 2.0 / 3.0;

/// Vertical metrics of one lyric line, in layout points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LyricLine {
    /// Cap height + descender + margin
    pub height: f64,
    pub descender: f64,
    pub margin: f64,
}

impl LyricLine {
    /// Space reserved below a staff for `verse_count` verses.
    pub fn band_height(&self, verse_count: u32) -> f64 {
        f64::from(verse_count) * self.height
    }

    /// Staff-relative baseline of verse `verse` (1-based) once the staff
    /// overflow below, verse band included, is final.
    pub fn baseline(&self, staff_height: f64, overflow_below: f64, verse_count: u32, verse: u32) -> f64 {
        let rank = verse_count.saturating_sub(verse);
        -(staff_height + overflow_below) + f64::from(rank) * self.height + self.descender + self.margin
    }
}

/// Segments of a lyric connector instance between `x1` and `x2`.
/// `text_width` is the width of the syllable the connector starts from.
#[allow(clippy::too_many_arguments)]
pub fn connector_segments(
    kind: SylConnector,
    spanning: SpanningType,
    mut x1: f64,
    x2: f64,
    y: f64,
    text_width: f64,
    staff: &StaffMetrics,
    style: &Style,
) -> Vec<BoundingBox> {
    let unit = staff.unit;
    if spanning.has_start() {
        // The syllable is drawn two units back.
        x1 += text_width - 2.0 * unit;
    }
    let thickness = style.barline_width * unit;
    match kind {
        SylConnector::Dash => dash_segments(x1, x2 - 2.0 * unit, y + unit * DASH_RAISE, staff, thickness),
        SylConnector::Underscore => {
            vec![BoundingBox::new(x1 + unit / 2.0, y, x2, y + thickness)]
        }
    }
}

/// Evenly spaced dashes between `x1` and `x2`, at least one.
fn dash_segments(x1: f64, x2: f64, y: f64, staff: &StaffMetrics, thickness: f64) -> Vec<BoundingBox> {
    let length = staff.unit * DASH_LENGTH;
    let space = staff.staff_height * DASH_SPACE;
    let dist = x2 - x1;
    let mut count = if space > 0.0 { (dist / space).floor() as i64 } else { 0 };
    let mut margin = dist / 2.0;
    if count < 2 {
        count = 1;
    } else {
        margin = (dist - (count - 1) as f64 * space) / 2.0;
    }
    margin -= length / 2.0;

    (0..count)
        .map(|i| {
            let x = x1 + margin + i as f64 * space;
            BoundingBox::new(x - length / 2.0, y, x + length / 2.0, y + thickness)
        })
        .collect()
}
