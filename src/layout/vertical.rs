//! Vertical layout: staff positions, floating elements and system stacking.
//!
//! Every system gets a fresh [`SystemAligner`]. Element boxes protruding
//! from their staff are recorded first, then the floating elements are laid
//! out on each staff they are drawn on and adjusted class by class. The staff
//! shifts follow from the recorded overflow and the systems of each page are
//! stacked from the top margin.

use log::{debug, warn};

use super::aligner::AlignmentType;
use super::device::{MeasureMode, MeasurementDevice};
use super::elements::{ElementKind, ElementRole, StaffMetrics};
use super::geometry::BoundingBox;
use super::hairpins::hairpin_geometry;
use super::horizontal::set_bounding_boxes;
use super::lyrics::LyricLine;
use super::positioner::{FloatingClass, FloatingPositioner, PositionerGeometry};
use super::prepare::{ElementRef, Endpoint, SpannerKind};
use super::slurs::{slur_geometry, tie_geometry, CurveAnchor, CurveInput};
use super::spanning::{span_extent, PlacedMeasure, SpanningType};
use super::system_aligner::SystemAligner;
use super::ScoreLayout;
use crate::model::{CurveDir, Place};

/// Run the vertical passes over all systems.
pub(super) fn lay_out_vertically(layout: &mut ScoreLayout<'_>) {
    for measure in &mut layout.measures {
        set_bounding_boxes(&mut measure.elements, &layout.staves, &layout.device, MeasureMode::Full);
    }
    for s in 0..layout.systems.len() {
        init_system_aligner(layout, s);
    }
    for i in 0..layout.spanners.len() {
        place_spanner(layout, i);
    }
    for s in 0..layout.systems.len() {
        stack_staves(layout, s);
    }
    stack_systems(layout);
}

// ═══════════════════════════════════════════════════════════════════════
// Staff slots
// ═══════════════════════════════════════════════════════════════════════

/// Create the staff slots of a system and record the verse counts and the
/// overflowing element boxes.
fn init_system_aligner(layout: &mut ScoreLayout<'_>, s: usize) {
    let style = layout.style;
    let threshold = style.staff_line_width * style.unit / 2.0;
    let mut aligner = SystemAligner::new();
    for (i, staff) in layout.staves.iter().enumerate() {
        aligner.staff_alignment_at(i, staff);
    }

    for measure in &layout.measures[layout.systems[s].measures.clone()] {
        for e in &measure.elements {
            let Some(alignment) = aligner.by_staff_n_mut(e.staff_n) else {
                continue;
            };
            if let Some(verse) = e.lyrics.iter().map(|syl| syl.n).max() {
                alignment.set_verse_count(verse);
            }
            if let Some(b) = e.bbox {
                alignment.add_overflow_box(b.translated(measure.x + e.x, 0.0), threshold);
            }
        }
    }
    layout.systems[s].aligner = aligner;
}

// ═══════════════════════════════════════════════════════════════════════
// Anchors
// ═══════════════════════════════════════════════════════════════════════

impl ScoreLayout<'_> {
    /// System-relative x of an element.
    pub(super) fn element_x(&self, r: ElementRef) -> f64 {
        let measure = &self.measures[r.measure];
        measure.x + measure.elements.get(r.element).map_or(0.0, |e| e.x)
    }

    /// System-relative x of an endpoint; a timestamp sits at its slot.
    pub(super) fn endpoint_x(&self, endpoint: Endpoint) -> f64 {
        match endpoint {
            Endpoint::Element(r) => self.element_x(r),
            Endpoint::Timestamp { measure, marker } => {
                let frame = &self.measures[measure];
                let slot = frame.timestamps.get(marker).slot;
                frame.x + slot.map_or(0.0, |id| frame.aligner.get(id).x_rel())
            }
        }
    }

    /// A note or chord as a curve anchor. Chord tones take their box and
    /// extremes from the chord.
    fn anchor(&self, r: ElementRef) -> CurveAnchor {
        let measure = &self.measures[r.measure];
        let e = &measure.elements[r.element];
        let staff = self.staves.get(e.staff_index);
        let parent = e.chord_parent().and_then(|p| measure.elements.get(p));

        let chord = |kind: &ElementKind| match kind {
            ElementKind::Chord { loc_min, loc_max, .. } => Some((*loc_min, *loc_max)),
            _ => None,
        };
        let extremes = parent.map_or_else(|| chord(&e.kind), |p| chord(&p.kind));
        let chord_position = match (e.kind.clone(), extremes) {
            (ElementKind::Note { loc, chord: Some(_), .. }, Some((min, max))) => Some(if loc == min {
                std::cmp::Ordering::Less
            } else if loc == max {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }),
            _ => None,
        };

        let unit = staff.map_or(self.style.unit, |s| s.unit);
        let bbox = e
            .bbox
            .or_else(|| parent.and_then(|p| p.bbox))
            .unwrap_or_else(|| BoundingBox::new(0.0, e.y - unit, 0.0, e.y + unit));
        CurveAnchor {
            x: measure.x + e.x,
            y: e.y,
            top: bbox.y2,
            bottom: bbox.y1,
            chord_extremes: extremes.and_then(|(min, max)| staff.map(|s| (s.loc_y(min), s.loc_y(max)))),
            chord_position,
            stem_dir: e.stem_dir,
            beam: e.beam,
            dots: e.dots,
            layer_n: e.layer_n,
            timestamp: false,
        }
    }

    fn endpoint_anchor(&self, endpoint: Endpoint, layer_n: u32) -> CurveAnchor {
        match endpoint {
            Endpoint::Element(r) => self.anchor(r),
            Endpoint::Timestamp { .. } => CurveAnchor::at_timestamp(self.endpoint_x(endpoint), layer_n),
        }
    }

    /// Notes and chords of one staff and layer in a system.
    fn curve_content(&self, s: usize, staff_n: u32, layer_n: u32) -> Vec<CurveAnchor> {
        let mut content = Vec::new();
        for m in self.systems[s].measures.clone() {
            for (i, e) in self.measures[m].elements.iter().enumerate() {
                let candidate = e.role == ElementRole::Content
                    && e.staff_n == staff_n
                    && e.layer_n == layer_n
                    && !e.grace
                    && e.chord_parent().is_none()
                    && (e.is_note() || e.is_chord());
                if candidate {
                    content.push(self.anchor(ElementRef { measure: m, element: i }));
                }
            }
        }
        content
    }

    /// Tempo marks sit over the meter signature, or the first note.
    fn tempo_x(&self, m: usize) -> f64 {
        let measure = &self.measures[m];
        let aligner = &measure.aligner;
        let slot = aligner
            .first_of_kind(AlignmentType::MetersigAttr)
            .or_else(|| aligner.first_of_kind(AlignmentType::Default));
        measure.x + slot.map_or(0.0, |id| aligner.get(id).x_rel())
    }

    fn placed_measure(&self, m: usize) -> PlacedMeasure<'_> {
        let measure = &self.measures[m];
        PlacedMeasure {
            x: measure.x,
            aligner: &measure.aligner,
        }
    }
}

/// Dynamics written with dynamic letters only are centred on their note.
fn is_dynamic_letters(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| matches!(c, 'p' | 'm' | 'f' | 'r' | 's' | 'z' | 'n'))
}

// ═══════════════════════════════════════════════════════════════════════
// Floating elements
// ═══════════════════════════════════════════════════════════════════════

/// Lay out one spanner on every staff and system it is drawn in.
fn place_spanner(layout: &mut ScoreLayout<'_>, i: usize) {
    let spanner = &layout.spanners[i];
    let start_system = layout.measures[spanner.start.measure()].system;
    let end_system = layout.measures[spanner.end.measure()].system;
    let text = spanner.kind.text().is_some();

    for s in start_system..=end_system {
        let Some(spanning) = SpanningType::for_system(start_system, end_system, s) else {
            continue;
        };
        if text && !spanning.has_start() {
            continue;
        }
        for &staff_n in &spanner.staves {
            let Some(staff) = layout.staves.iter().find(|st| st.n == staff_n).copied() else {
                warn!(
                    "{} is on staff {staff_n}, which is missing from the score definition",
                    spanner.id.as_deref().unwrap_or("A floating element")
                );
                continue;
            };
            let Some(positioner) = build_positioner(layout, i, s, spanning, &staff) else {
                continue;
            };
            if let Some(alignment) = layout.systems[s].aligner.by_staff_n_mut(staff_n) {
                alignment.set_positioner(positioner);
            }
        }
    }
}

fn build_positioner(
    layout: &ScoreLayout<'_>,
    i: usize,
    s: usize,
    spanning: SpanningType,
    staff: &StaffMetrics,
) -> Option<FloatingPositioner> {
    let style = layout.style;
    let spanner = &layout.spanners[i];
    let system = &layout.systems[s];
    if system.measures.is_empty() {
        return None;
    }
    let first = layout.placed_measure(system.measures.start);
    let last = layout.placed_measure(system.measures.end - 1);
    let start_x = layout.endpoint_x(spanner.start);
    let end_x = layout.endpoint_x(spanner.end);
    let (x1, x2) = span_extent(spanning, start_x, end_x, &first, &last, staff.double_unit);
    let class = spanner.kind.class();
    let new = |place: Place, geometry: PositionerGeometry, content: BoundingBox| {
        FloatingPositioner::new(i, spanner.id.clone(), class, spanning, place, geometry, content)
    };

    match &spanner.kind {
        SpannerKind::Slur | SpannerKind::Tie => {
            let content = layout.curve_content(s, staff.n, spanner.layer_n);
            let layer_stem_dir = spanner
                .start
                .element()
                .and_then(|r| layout.measures[r.measure].elements.get(r.element))
                .and_then(|e| e.layer_stem_dir);
            let input = CurveInput {
                spanning,
                staff,
                start: layout.endpoint_anchor(spanner.start, spanner.layer_n),
                end: layout.endpoint_anchor(spanner.end, spanner.layer_n),
                x1,
                x2,
                layer_stem_dir,
                curve_dir: spanner.curve_dir,
                bulge: spanner.bulge,
                content: &content,
            };
            let geometry = match spanner.kind {
                SpannerKind::Slur => slur_geometry(&input, style),
                _ => tie_geometry(&input, style)?,
            };
            let place = match geometry.dir {
                CurveDir::Above => Place::Above,
                CurveDir::Below => Place::Below,
            };
            Some(new(place, PositionerGeometry::Curve(geometry), geometry.bbox()))
        }
        SpannerKind::Hairpin(form) => {
            let geometry = hairpin_geometry(*form, spanning, x1, x2, staff.unit, style);
            Some(new(spanner.place, PositionerGeometry::Hairpin(geometry), geometry.bbox()))
        }
        SpannerKind::Dynam(text) | SpannerKind::Tempo(text) | SpannerKind::Dir(text) => {
            let b = layout.device.text_box(text, style.lyric_font_size(staff.scale));
            let mut x = match spanner.kind {
                SpannerKind::Tempo(_) => layout.tempo_x(spanner.start.measure()),
                _ => start_x,
            };
            if matches!(spanner.kind, SpannerKind::Dynam(_)) && is_dynamic_letters(text) {
                x -= b.width() / 2.0;
            }
            Some(new(spanner.place, PositionerGeometry::Text { x, y: 0.0 }, b.translated(x, 0.0)))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Stacking
// ═══════════════════════════════════════════════════════════════════════

/// Vertical metrics of the lyric lines of a staff.
pub(super) fn lyric_line(layout: &ScoreLayout<'_>, staff: &StaffMetrics) -> LyricLine {
    let style = layout.style;
    let font_size = style.lyric_font_size(staff.scale);
    let margin = style.margins.bottom.syl * staff.unit;
    LyricLine {
        height: layout.device.lyric_line_height(font_size, margin),
        descender: layout.device.lyric_descender(font_size),
        margin,
    }
}

/// Adjust the floating elements of a system and position its staves.
fn stack_staves(layout: &mut ScoreLayout<'_>, s: usize) {
    let style = layout.style;
    let threshold = style.staff_line_width * style.unit / 2.0;
    let margin = style.margins.bottom.floating * style.unit;
    let line_heights: Vec<f64> = layout.staves.iter().map(|st| lyric_line(layout, st).height).collect();

    let aligner = &mut layout.systems[s].aligner;
    for class in FloatingClass::ADJUSTMENT_ORDER {
        if class == FloatingClass::Syl {
            for (alignment, height) in aligner.staves_mut().iter_mut().zip(&line_heights) {
                alignment.adjust_floating_positioners(class, margin, threshold, *height);
            }
        } else {
            aligner.adjust_floating_positioners(class, margin, threshold, 0.0);
        }
    }
    aligner.calc_staff_overlap();
    aligner.set_alignment_y_pos(style);
    let height = aligner.integrate_y_shift();
    layout.systems[s].height = height;
}

/// Stack the systems of every page from the top margin down.
fn stack_systems(layout: &mut ScoreLayout<'_>) {
    let style = layout.style;
    for (p, page) in layout.pages.iter().enumerate() {
        let mut y = style.page_height - style.page_margin_top;
        for s in page.systems.clone() {
            let system = &mut layout.systems[s];
            system.y = y;
            y -= system.height + style.spacing_system * style.unit;
        }
        if y < style.page_margin_bottom {
            debug!("Page {} content runs {:.0} below the bottom margin", p + 1, style.page_margin_bottom - y);
        }
    }
}
