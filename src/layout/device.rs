//! Measurement device: bounding boxes of drawing elements.
//!
//! Layout passes need the extent an element would have once drawn. Instead
//! of rendering, they ask a [`MeasurementDevice`] which computes the box
//! from glyph metrics. Boxes are relative to the element x and
//! staff-relative in y.

use super::constants::{GRACE_FACTOR, KEY_SIG_ACCID_GAP, MULTI_REST_WIDTH, STEM_LENGTH};
use super::elements::{DrawingElement, ElementKind, StaffMetrics};
use super::geometry::BoundingBox;
use crate::metrics::{smufl, GlyphMetrics};
use crate::model::{Accidental, BarRendition, ClefShape, Duration, StemDir};
use crate::style::Style;

/// Which extents a pass needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureMode {
    /// Only the x-extents; y is zero.
    HorizontalOnly,
    Full,
}

/// Computes element extents without drawing them.
pub(crate) trait MeasurementDevice {
    /// Box of a layer element, attribute or barline. `None` for elements
    /// that draw nothing themselves.
    fn element_box(
        &self,
        elements: &[DrawingElement],
        index: usize,
        staff: &StaffMetrics,
        mode: MeasureMode,
    ) -> Option<BoundingBox>;

    /// Box of a text run with its baseline at y = 0.
    fn text_box(&self, text: &str, font_size: f64) -> BoundingBox;

    /// Height of one lyric line: cap height, descender and margin.
    fn lyric_line_height(&self, font_size: f64, margin: f64) -> f64;

    /// Descender of the lyric font.
    fn lyric_descender(&self, font_size: f64) -> f64;
}

/// Measurement backed by glyph metrics and the style.
pub(crate) struct BBoxDevice<'a> {
    metrics: &'a dyn GlyphMetrics,
    style: &'a Style,
}

impl<'a> BBoxDevice<'a> {
    pub fn new(metrics: &'a dyn GlyphMetrics, style: &'a Style) -> Self {
        Self { metrics, style }
    }

    /// Box of a glyph drawn at `(0, y)`.
    fn glyph_box(&self, code: char, font_size: f64, y: f64) -> BoundingBox {
        let b = self.metrics.glyph_bounds(code, font_size);
        BoundingBox::new(b.x, y + b.y, b.x + b.width, y + b.y + b.height)
    }

    fn note_box(&self, e: &DrawingElement, locs: &[(i32, Option<Accidental>)], staff: &StaffMetrics) -> BoundingBox {
        let unit = staff.unit * if e.grace { GRACE_FACTOR } else { 1.0 };
        let font_size = staff.music_font_size() * if e.grace { GRACE_FACTOR } else { 1.0 };
        let head = notehead(e.dur);

        let mut bbox: Option<BoundingBox> = None;
        let mut accid_width: f64 = 0.0;
        for &(loc, accid) in locs {
            let b = self.glyph_box(head, font_size, staff.loc_y(loc));
            bbox = Some(bbox.map_or(b, |u| u.union(&b)));
            if let Some(accid) = accid {
                let w = self.metrics.glyph_bounds(accidental_glyph(accid), font_size).width;
                accid_width = accid_width.max(w);
            }
        }
        let Some(mut bbox) = bbox else {
            return BoundingBox::default();
        };
        let head_width = bbox.x2;

        match e.stem_dir {
            Some(StemDir::Up) => {
                bbox.y2 = bbox.y2.max(bbox.y2 - unit + STEM_LENGTH * unit);
                if e.dur.flag_count() > 0 && e.beam.is_none() {
                    let flag = self.metrics.glyph_bounds(smufl::FLAG_8TH_UP, font_size);
                    bbox.x2 = head_width + flag.width;
                }
            }
            Some(StemDir::Down) => {
                bbox.y1 = bbox.y1.min(bbox.y1 + unit - STEM_LENGTH * unit);
            }
            None => {}
        }

        if accid_width > 0.0 {
            bbox.x1 = -(accid_width + 0.5 * unit);
        }
        if e.dots > 0 {
            bbox.x2 += unit * (1.0 + 1.5 * f64::from(e.dots));
        }
        let (loc_min, loc_max) = locs
            .iter()
            .fold((i32::MAX, i32::MIN), |(lo, hi), &(l, _)| (lo.min(l), hi.max(l)));
        if loc_min < -1 || loc_max > staff.top_loc() + 1 {
            bbox.x1 = bbox.x1.min(-unit / 2.0);
            bbox.x2 += unit / 2.0;
        }
        bbox
    }

    fn key_sig_box(&self, fifths: i32, staff: &StaffMetrics) -> Option<BoundingBox> {
        if fifths == 0 {
            return None;
        }
        let code = if fifths > 0 {
            smufl::ACCIDENTAL_SHARP
        } else {
            smufl::ACCIDENTAL_FLAT
        };
        let font_size = staff.music_font_size();
        let count = f64::from(fifths.unsigned_abs());
        let b = self.metrics.glyph_bounds(code, font_size);
        let width = count * b.width + (count - 1.0) * KEY_SIG_ACCID_GAP * staff.unit;
        let top = self.glyph_box(code, font_size, 0.0);
        let bottom = self.glyph_box(code, font_size, staff.loc_y(staff.middle_loc() - 1));
        Some(BoundingBox::new(0.0, bottom.y1, width, top.y2))
    }

    fn meter_sig_box(&self, count: u32, unit: u32, symbol: bool, staff: &StaffMetrics) -> BoundingBox {
        let font_size = staff.music_font_size();
        if symbol {
            return self.glyph_box(smufl::TIME_SIG_COMMON, font_size, staff.center_y());
        }
        let digit = self.metrics.glyph_bounds(smufl::TIME_SIG_0, font_size);
        let digits = count.to_string().len().max(unit.to_string().len()) as f64;
        BoundingBox::new(0.0, -staff.staff_height, digits * digit.width, 0.0)
    }

    fn barline_box(&self, rend: BarRendition, staff: &StaffMetrics) -> Option<BoundingBox> {
        let thin = self.style.barline_width * staff.unit;
        let gap = staff.unit;
        let dots = self.metrics.glyph_bounds(smufl::AUGMENTATION_DOT, staff.music_font_size()).width + gap;
        let width = match rend {
            BarRendition::Invisible => return None,
            BarRendition::Single => thin,
            BarRendition::Double => 2.0 * thin + gap,
            BarRendition::End => thin + gap + 2.0 * thin,
            BarRendition::RptStart | BarRendition::RptEnd => thin + gap + 2.0 * thin + dots,
        };
        Some(BoundingBox::new(0.0, -staff.staff_height, width, 0.0))
    }
}

impl MeasurementDevice for BBoxDevice<'_> {
    fn element_box(
        &self,
        elements: &[DrawingElement],
        index: usize,
        staff: &StaffMetrics,
        mode: MeasureMode,
    ) -> Option<BoundingBox> {
        let e = elements.get(index)?;
        let font_size = staff.music_font_size();
        let bbox = match &e.kind {
            ElementKind::Note { loc, accid, chord: None } => self.note_box(e, &[(*loc, *accid)], staff),
            // Chord tones are measured with their chord.
            ElementKind::Note { chord: Some(_), .. } => return None,
            ElementKind::Chord { tones, .. } => {
                let locs: Vec<(i32, Option<Accidental>)> = tones
                    .iter()
                    .filter_map(|&t| match elements.get(t).map(|t| &t.kind) {
                        Some(ElementKind::Note { loc, accid, .. }) => Some((*loc, *accid)),
                        _ => None,
                    })
                    .collect();
                self.note_box(e, &locs, staff)
            }
            ElementKind::Rest { .. } => self.glyph_box(rest_glyph(e.dur), font_size, e.y),
            ElementKind::MeasureRest => self.glyph_box(smufl::REST_WHOLE, font_size, e.y + staff.unit * 2.0),
            ElementKind::MultiRest { .. } => BoundingBox::new(
                0.0,
                e.y - staff.unit,
                MULTI_REST_WIDTH * staff.unit,
                e.y + staff.unit,
            ),
            ElementKind::Clef { shape, .. } => self.glyph_box(clef_glyph(*shape), font_size, e.y),
            ElementKind::KeySig { fifths } => self.key_sig_box(*fifths, staff)?,
            ElementKind::MeterSig { count, unit, symbol } => self.meter_sig_box(*count, *unit, *symbol, staff),
            ElementKind::Mensur => self.glyph_box(smufl::MENSURATION_CIRCLE, font_size, e.y),
            ElementKind::BarLine { rend } => self.barline_box(*rend, staff)?,
            ElementKind::Dot { .. } => self.glyph_box(smufl::AUGMENTATION_DOT, font_size, e.y),
            ElementKind::Accid { accid, .. } => self.glyph_box(accidental_glyph(*accid), font_size, e.y),
            ElementKind::Beam | ElementKind::Tuplet => return None,
        };
        Some(match mode {
            MeasureMode::HorizontalOnly => bbox.flattened(),
            MeasureMode::Full => bbox,
        })
    }

    fn text_box(&self, text: &str, font_size: f64) -> BoundingBox {
        let width = self.metrics.text_width(text, font_size);
        let (ascent, descent) = text.chars().fold((0.0f64, 0.0f64), |(a, d), c| {
            (
                a.max(self.metrics.glyph_height(c, font_size)),
                d.max(self.metrics.glyph_descender(c, font_size)),
            )
        });
        BoundingBox::new(0.0, -descent, width, ascent)
    }

    fn lyric_line_height(&self, font_size: f64, margin: f64) -> f64 {
        self.metrics.glyph_height('I', font_size) + self.lyric_descender(font_size) + margin
    }

    fn lyric_descender(&self, font_size: f64) -> f64 {
        self.metrics.glyph_descender('q', font_size)
    }
}

fn notehead(dur: Duration) -> char {
    match dur {
        Duration::Long | Duration::Breve => smufl::NOTEHEAD_BREVE,
        Duration::Whole => smufl::NOTEHEAD_WHOLE,
        Duration::Half => smufl::NOTEHEAD_HALF,
        _ => smufl::NOTEHEAD_BLACK,
    }
}

fn rest_glyph(dur: Duration) -> char {
    match dur {
        Duration::Long => smufl::REST_LONGA,
        Duration::Breve => smufl::REST_DOUBLE_WHOLE,
        Duration::Whole => smufl::REST_WHOLE,
        Duration::Half => smufl::REST_HALF,
        Duration::Quarter => smufl::REST_QUARTER,
        Duration::Eighth => smufl::REST_8TH,
        Duration::Sixteenth => smufl::REST_16TH,
        Duration::ThirtySecond => smufl::REST_32ND,
        Duration::SixtyFourth => smufl::REST_64TH,
        Duration::OneTwentyEighth => smufl::REST_128TH,
    }
}

fn clef_glyph(shape: ClefShape) -> char {
    match shape {
        ClefShape::G => smufl::G_CLEF,
        ClefShape::F => smufl::F_CLEF,
        ClefShape::C => smufl::C_CLEF,
    }
}

fn accidental_glyph(accid: Accidental) -> char {
    match accid {
        Accidental::Sharp => smufl::ACCIDENTAL_SHARP,
        Accidental::Flat => smufl::ACCIDENTAL_FLAT,
        Accidental::Natural => smufl::ACCIDENTAL_NATURAL,
        Accidental::DoubleSharp => smufl::ACCIDENTAL_DOUBLE_SHARP,
        Accidental::DoubleFlat => smufl::ACCIDENTAL_DOUBLE_FLAT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::elements::{flatten_layer, LayerContext};
    use crate::metrics::ApproximateMetrics;
    use crate::model::{Layer, LayerElement, Note, StaffDef};
    use float_cmp::assert_approx_eq;

    fn measure(elements: Vec<LayerElement>) -> (Vec<DrawingElement>, StaffMetrics) {
        let style = Style::default();
        let staff = StaffMetrics::new(&StaffDef::new(1), 0, &style);
        let layer = Layer {
            n: 1,
            stem_dir: None,
            elements,
        };
        let mut ctx = LayerContext::new(&staff, &layer, 0, 1, 1024.0);
        let mut out = Vec::new();
        flatten_layer(&layer, &mut ctx, &mut out);
        (out, staff)
    }

    #[test]
    fn stem_up_reaches_seven_units_above_the_head() {
        let style = Style::default();
        let metrics = ApproximateMetrics;
        let device = BBoxDevice::new(&metrics, &style);
        let (elements, staff) = measure(vec![LayerElement::Note(Note {
            loc: 2,
            ..Note::default()
        })]);
        let b = device
            .element_box(&elements, 0, &staff, MeasureMode::Full)
            .expect("note box");
        let y = staff.loc_y(2);
        assert_approx_eq!(f64, b.y2, y + 7.0 * staff.unit);
        assert_approx_eq!(f64, b.y1, y - staff.unit);
        assert_approx_eq!(f64, b.x1, 0.0);
    }

    #[test]
    fn accidental_and_dots_widen_the_note() {
        let style = Style::default();
        let metrics = ApproximateMetrics;
        let device = BBoxDevice::new(&metrics, &style);
        let (elements, staff) = measure(vec![LayerElement::Note(Note {
            loc: 6,
            dur: Duration::Whole,
            dots: 1,
            accid: Some(Accidental::Sharp),
            ..Note::default()
        })]);
        let b = device
            .element_box(&elements, 0, &staff, MeasureMode::HorizontalOnly)
            .expect("note box");
        assert!(b.x1 < -0.5 * staff.unit);
        assert!(b.x2 > staff.unit * 2.5);
        assert_approx_eq!(f64, b.y1, 0.0);
        assert_approx_eq!(f64, b.y2, 0.0);
    }

    #[test]
    fn invisible_barline_has_no_box() {
        let style = Style::default();
        let metrics = ApproximateMetrics;
        let device = BBoxDevice::new(&metrics, &style);
        let (elements, staff) = measure(vec![LayerElement::BarLine(crate::model::BarLine {
            id: None,
            rend: BarRendition::Invisible,
        })]);
        assert!(device.element_box(&elements, 0, &staff, MeasureMode::Full).is_none());
    }

    #[test]
    fn text_box_spans_descender_to_cap_height() {
        let style = Style::default();
        let metrics = ApproximateMetrics;
        let device = BBoxDevice::new(&metrics, &style);
        let b = device.text_box("Allegro", 100.0);
        assert_approx_eq!(f64, b.y2, 72.0);
        assert_approx_eq!(f64, b.y1, -22.0);
    }
}
