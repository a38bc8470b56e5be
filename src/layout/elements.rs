//! Drawing elements: the score tree flattened for one layout run.
//!
//! Every measure gets a flat list of [`DrawingElement`]s built from its
//! staves and layers. Chords are followed by their tones, beams and tuplets
//! become container elements, and the system-start attributes and barlines
//! are added as elements of their own. Layout passes then write slot
//! references, bounding boxes and positions into these elements, leaving the
//! score tree untouched.

use serde::Serialize;

use super::aligner::{AlignmentId, AlignmentType};
use super::constants::{DUR_1, DUR_MAX};
use super::geometry::BoundingBox;
use crate::model::{
    Accidental, BarRendition, ClefShape, Duration, Layer, LayerElement, Note, StaffDef, StemDir,
    Syl, TieMark,
};
use crate::style::Style;

// ═══════════════════════════════════════════════════════════════════════
// Staff metrics
// ═══════════════════════════════════════════════════════════════════════

/// Size of one staff, derived from its definition and the style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffMetrics {
    pub n: u32,
    /// Position of the staff in the score definition
    pub index: usize,
    pub lines: u32,
    /// Notational size in percent
    pub scale: u32,
    pub unit: f64,
    pub double_unit: f64,
    /// Distance from the top to the bottom line
    pub staff_height: f64,
    pub transposition: Option<i32>,
}

impl StaffMetrics {
    pub fn new(def: &StaffDef, index: usize, style: &Style) -> Self {
        let unit = style.drawing_unit(def.scale);
        let double_unit = 2.0 * unit;
        Self {
            n: def.n,
            index,
            lines: def.lines,
            scale: def.scale,
            unit,
            double_unit,
            staff_height: f64::from(def.lines.saturating_sub(1)) * double_unit,
            transposition: def.transposition,
        }
    }

    /// Staff-relative y of a position in half spaces above the bottom line.
    pub fn loc_y(&self, loc: i32) -> f64 {
        -self.staff_height + f64::from(loc) * self.unit
    }

    /// Position of the middle line.
    pub fn middle_loc(&self) -> i32 {
        self.lines as i32 - 1
    }

    /// Position of the top line.
    pub fn top_loc(&self) -> i32 {
        2 * (self.lines as i32 - 1)
    }

    pub fn center_y(&self) -> f64 {
        -self.staff_height / 2.0
    }

    /// Font size of music glyphs on this staff.
    pub fn music_font_size(&self) -> f64 {
        8.0 * self.unit
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Drawing elements
// ═══════════════════════════════════════════════════════════════════════

/// What an element draws, with the attributes measurement needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Note {
        loc: i32,
        accid: Option<Accidental>,
        /// Index of the enclosing chord element
        chord: Option<usize>,
    },
    Chord {
        /// Indices of the tone elements
        tones: Vec<usize>,
        loc_min: i32,
        loc_max: i32,
    },
    Rest {
        loc: i32,
    },
    MeasureRest,
    MultiRest {
        num: u32,
    },
    Clef {
        shape: ClefShape,
        line: u32,
    },
    KeySig {
        fifths: i32,
    },
    MeterSig {
        count: u32,
        unit: u32,
        symbol: bool,
    },
    Mensur,
    BarLine {
        rend: BarRendition,
    },
    Dot {
        loc: i32,
    },
    Accid {
        accid: Accidental,
        loc: i32,
    },
    Beam,
    Tuplet,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Note { .. } => "note",
            ElementKind::Chord { .. } => "chord",
            ElementKind::Rest { .. } => "rest",
            ElementKind::MeasureRest => "mRest",
            ElementKind::MultiRest { .. } => "multiRest",
            ElementKind::Clef { .. } => "clef",
            ElementKind::KeySig { .. } => "keySig",
            ElementKind::MeterSig { .. } => "meterSig",
            ElementKind::Mensur => "mensur",
            ElementKind::BarLine { .. } => "barLine",
            ElementKind::Dot { .. } => "dot",
            ElementKind::Accid { .. } => "accid",
            ElementKind::Beam => "beam",
            ElementKind::Tuplet => "tuplet",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ElementKind::Beam | ElementKind::Tuplet)
    }
}

/// Where an element sits in the measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementRole {
    /// Layer content
    Content,
    /// Clef, key, meter or mensuration drawn at a system start or change
    Attribute,
    LeftBarline,
    RightBarline,
}

/// Position of an element inside a beam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeamPosition {
    pub first: bool,
    pub last: bool,
}

/// Slot an element is aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef {
    Measure(AlignmentId),
    /// A grace note: the owner slot in the measure and the slot in its grace aligner
    Grace {
        owner: AlignmentId,
        slot: AlignmentId,
    },
}

/// One element of a measure prepared for layout.
#[derive(Debug, Clone)]
pub struct DrawingElement {
    pub id: Option<String>,
    pub kind: ElementKind,
    pub role: ElementRole,
    pub staff_n: u32,
    pub staff_index: usize,
    pub layer_n: u32,
    /// Time in alignment units from the start of the measure
    pub time: f64,
    /// Alignment duration, zero for elements that do not advance time
    pub duration: f64,
    pub dur: Duration,
    pub dots: u8,
    /// Stem direction used for drawing; `None` for stemless elements
    pub stem_dir: Option<StemDir>,
    /// Stem direction imposed by the enclosing layer, explicitly or because
    /// the staff has several layers
    pub layer_stem_dir: Option<StemDir>,
    pub grace: bool,
    pub beam: Option<BeamPosition>,
    pub tie: Option<TieMark>,
    pub lyrics: Vec<Syl>,
    pub slot: Option<SlotRef>,
    /// Box relative to the element x, staff-relative in y
    pub bbox: Option<BoundingBox>,
    /// Position from the measure start
    pub x: f64,
    /// Staff-relative y of the element origin
    pub y: f64,
}

impl DrawingElement {
    fn new(kind: ElementKind, role: ElementRole, staff: &StaffMetrics, layer_n: u32) -> Self {
        Self {
            id: None,
            kind,
            role,
            staff_n: staff.n,
            staff_index: staff.index,
            layer_n,
            time: 0.0,
            duration: 0.0,
            dur: Duration::Quarter,
            dots: 0,
            stem_dir: None,
            layer_stem_dir: None,
            grace: false,
            beam: None,
            tie: None,
            lyrics: Vec::new(),
            slot: None,
            bbox: None,
            x: 0.0,
            y: 0.0,
        }
    }

    /// A system-start or changed attribute on a staff.
    pub fn attribute(kind: ElementKind, staff: &StaffMetrics) -> Self {
        let y = match kind {
            ElementKind::Clef { line, .. } => staff.loc_y(2 * (line as i32 - 1)),
            ElementKind::Mensur => staff.loc_y(staff.middle_loc()),
            _ => staff.loc_y(0),
        };
        let mut element = Self::new(kind, ElementRole::Attribute, staff, 0);
        element.y = y;
        element
    }

    /// A barline at the start or end of the measure on a staff.
    pub fn barline(rend: BarRendition, role: ElementRole, staff: &StaffMetrics) -> Self {
        let mut element = Self::new(ElementKind::BarLine { rend }, role, staff, 0);
        element.y = 0.0;
        element
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, ElementKind::Note { .. })
    }

    pub fn is_chord(&self) -> bool {
        matches!(self.kind, ElementKind::Chord { .. })
    }

    /// A note that belongs to a chord.
    pub fn chord_parent(&self) -> Option<usize> {
        match self.kind {
            ElementKind::Note { chord, .. } => chord,
            _ => None,
        }
    }

    /// Lowest and highest staff position of a note, chord or rest.
    pub fn loc_range(&self) -> Option<(i32, i32)> {
        match self.kind {
            ElementKind::Note { loc, .. } | ElementKind::Rest { loc } => Some((loc, loc)),
            ElementKind::Chord { loc_min, loc_max, .. } => Some((loc_min, loc_max)),
            _ => None,
        }
    }

    /// Kind of the measure slot the element aligns to.
    pub fn alignment_type(&self) -> Option<AlignmentType> {
        let attribute = self.role == ElementRole::Attribute;
        let kind = match &self.kind {
            _ if self.chord_parent().is_some() => return None,
            ElementKind::Note { .. } | ElementKind::Chord { .. } | ElementKind::Rest { .. } => {
                if self.grace {
                    AlignmentType::GraceNote
                } else {
                    AlignmentType::Default
                }
            }
            ElementKind::MeasureRest => AlignmentType::FullMeasure,
            ElementKind::MultiRest { .. } => AlignmentType::FullMeasure2,
            ElementKind::Clef { .. } if attribute => AlignmentType::ClefAttr,
            ElementKind::Clef { .. } => AlignmentType::Clef,
            ElementKind::KeySig { .. } if attribute => AlignmentType::KeysigAttr,
            ElementKind::KeySig { .. } => AlignmentType::Keysig,
            ElementKind::Mensur if attribute => AlignmentType::MensurAttr,
            ElementKind::Mensur => AlignmentType::Mensur,
            ElementKind::MeterSig { .. } if attribute => AlignmentType::MetersigAttr,
            ElementKind::MeterSig { .. } => AlignmentType::Metersig,
            ElementKind::BarLine { .. } => match self.role {
                ElementRole::RightBarline => AlignmentType::MeasureEnd,
                _ => AlignmentType::Barline,
            },
            ElementKind::Dot { .. } => AlignmentType::Dot,
            ElementKind::Accid { .. } => AlignmentType::Accid,
            ElementKind::Beam | ElementKind::Tuplet => AlignmentType::Container,
        };
        Some(kind)
    }
}

/// Alignment duration of a written duration with dots, scaled by the
/// tuplet ratio `numbase / num`.
pub fn alignment_duration(dur: Duration, dots: u8, tuplet_ratio: f64) -> f64 {
    let base = DUR_MAX / 2f64.powi(dur.actual_dur() - DUR_1);
    base * (2.0 - 0.5f64.powi(i32::from(dots))) * tuplet_ratio
}

// ═══════════════════════════════════════════════════════════════════════
// Flattening
// ═══════════════════════════════════════════════════════════════════════

/// Layer being flattened, with the running time.
pub(crate) struct LayerContext<'a> {
    pub staff: &'a StaffMetrics,
    pub layer_n: u32,
    /// Position of the layer among the layers of its staff
    pub layer_index: usize,
    pub layer_count: usize,
    pub layer_stem_dir: Option<StemDir>,
    /// Alignment duration of a full measure, used by measure rests
    pub measure_duration: f64,
    time: f64,
}

impl<'a> LayerContext<'a> {
    pub fn new(staff: &'a StaffMetrics, layer: &Layer, layer_index: usize, layer_count: usize, measure_duration: f64) -> Self {
        Self {
            staff,
            layer_n: layer.n,
            layer_index,
            layer_count,
            layer_stem_dir: layer.stem_dir,
            measure_duration,
            time: 0.0,
        }
    }

    /// Running time after the last element.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Stem direction imposed by the layer, if any.
    fn layer_direction(&self) -> Option<StemDir> {
        self.layer_stem_dir.or(if self.layer_count > 1 {
            Some(if self.layer_index == 0 {
                StemDir::Up
            } else {
                StemDir::Down
            })
        } else {
            None
        })
    }

    /// Direction from the staff position alone.
    fn position_direction(&self, loc: i32) -> StemDir {
        if loc >= self.staff.middle_loc() {
            StemDir::Down
        } else {
            StemDir::Up
        }
    }
}

/// Append the elements of a layer to `out` and return the layer end time.
pub(crate) fn flatten_layer(layer: &Layer, ctx: &mut LayerContext<'_>, out: &mut Vec<DrawingElement>) -> f64 {
    flatten_elements(&layer.elements, ctx, 1.0, None, out);
    ctx.time
}

fn flatten_elements(
    elements: &[LayerElement],
    ctx: &mut LayerContext<'_>,
    ratio: f64,
    beam_dir: Option<StemDir>,
    out: &mut Vec<DrawingElement>,
) {
    for element in elements {
        flatten_element(element, ctx, ratio, beam_dir, out);
    }
}

fn flatten_element(
    element: &LayerElement,
    ctx: &mut LayerContext<'_>,
    ratio: f64,
    beam_dir: Option<StemDir>,
    out: &mut Vec<DrawingElement>,
) {
    let staff = ctx.staff;
    let new = |kind: ElementKind, ctx: &LayerContext<'_>| {
        let mut e = DrawingElement::new(kind, ElementRole::Content, staff, ctx.layer_n);
        e.time = ctx.time;
        e.layer_stem_dir = ctx.layer_direction();
        e
    };

    match element {
        LayerElement::Note(note) => {
            let index = out.len();
            let mut e = new(
                ElementKind::Note {
                    loc: note.loc,
                    accid: note.accid,
                    chord: None,
                },
                ctx,
            );
            fill_note(&mut e, note, ratio);
            e.y = staff.loc_y(note.loc);
            e.stem_dir = stem_direction(note.dur, note.stem_dir, beam_dir, note.loc, note.loc, ctx);
            e.lyrics = note.lyrics.clone();
            out.push(e);
            advance(ctx, &out[index]);
        }
        LayerElement::Chord(chord) => {
            let index = out.len();
            let loc_min = chord.notes.iter().map(|n| n.loc).min().unwrap_or(0);
            let loc_max = chord.notes.iter().map(|n| n.loc).max().unwrap_or(0);
            let mut e = new(
                ElementKind::Chord {
                    tones: Vec::new(),
                    loc_min,
                    loc_max,
                },
                ctx,
            );
            e.id = chord.id.clone();
            e.dur = chord.dur;
            e.dots = chord.dots;
            e.grace = chord.grace;
            e.duration = alignment_duration(chord.dur, chord.dots, ratio);
            e.y = staff.loc_y(loc_min);
            e.stem_dir = stem_direction(chord.dur, chord.stem_dir, beam_dir, loc_min, loc_max, ctx);
            e.lyrics = chord.lyrics.clone();
            let stem_dir = e.stem_dir;
            out.push(e);

            let mut tones = Vec::with_capacity(chord.notes.len());
            for note in &chord.notes {
                tones.push(out.len());
                let mut tone = new(
                    ElementKind::Note {
                        loc: note.loc,
                        accid: note.accid,
                        chord: Some(index),
                    },
                    ctx,
                );
                fill_note(&mut tone, note, ratio);
                tone.dur = chord.dur;
                tone.dots = chord.dots;
                tone.grace = chord.grace;
                tone.duration = out[index].duration;
                tone.y = staff.loc_y(note.loc);
                tone.stem_dir = stem_dir;
                tone.lyrics = note.lyrics.clone();
                out.push(tone);
            }
            if let ElementKind::Chord { tones: t, .. } = &mut out[index].kind {
                *t = tones;
            }
            advance(ctx, &out[index]);
        }
        LayerElement::Rest(rest) => {
            let loc = rest.loc.unwrap_or_else(|| staff.middle_loc());
            let mut e = new(ElementKind::Rest { loc }, ctx);
            e.id = rest.id.clone();
            e.dur = rest.dur;
            e.dots = rest.dots;
            e.duration = alignment_duration(rest.dur, rest.dots, ratio);
            e.y = staff.loc_y(loc);
            ctx.time += e.duration;
            out.push(e);
        }
        LayerElement::MeasureRest(rest) => {
            let mut e = new(ElementKind::MeasureRest, ctx);
            e.id = rest.id.clone();
            e.dur = Duration::Whole;
            e.duration = ctx.measure_duration;
            e.y = staff.loc_y(staff.middle_loc());
            ctx.time += e.duration;
            out.push(e);
        }
        LayerElement::MultiRest(rest) => {
            let mut e = new(ElementKind::MultiRest { num: rest.num }, ctx);
            e.id = rest.id.clone();
            e.dur = Duration::Whole;
            e.duration = ctx.measure_duration;
            e.y = staff.loc_y(staff.middle_loc());
            ctx.time += e.duration;
            out.push(e);
        }
        LayerElement::Clef(clef) => {
            let mut e = new(
                ElementKind::Clef {
                    shape: clef.shape,
                    line: clef.line,
                },
                ctx,
            );
            e.id = clef.id.clone();
            e.y = staff.loc_y(2 * (clef.line as i32 - 1));
            out.push(e);
        }
        LayerElement::KeySig(key) => {
            let mut e = new(ElementKind::KeySig { fifths: key.fifths }, ctx);
            e.id = key.id.clone();
            e.y = staff.loc_y(0);
            out.push(e);
        }
        LayerElement::MeterSig(meter) => {
            let mut e = new(
                ElementKind::MeterSig {
                    count: meter.count,
                    unit: meter.unit,
                    symbol: meter.symbol,
                },
                ctx,
            );
            e.id = meter.id.clone();
            e.y = staff.loc_y(0);
            out.push(e);
        }
        LayerElement::Mensur(mensur) => {
            let mut e = new(ElementKind::Mensur, ctx);
            e.id = mensur.id.clone();
            e.y = staff.loc_y(staff.middle_loc());
            out.push(e);
        }
        LayerElement::BarLine(bar) => {
            let mut e = new(ElementKind::BarLine { rend: bar.rend }, ctx);
            e.id = bar.id.clone();
            out.push(e);
        }
        LayerElement::Dot(dot) => {
            let loc = dot.loc.unwrap_or_else(|| staff.middle_loc());
            let mut e = new(ElementKind::Dot { loc }, ctx);
            e.id = dot.id.clone();
            e.y = staff.loc_y(loc);
            out.push(e);
        }
        LayerElement::Accid(accid) => {
            let loc = accid.loc.unwrap_or_else(|| staff.middle_loc());
            let mut e = new(
                ElementKind::Accid {
                    accid: accid.accid,
                    loc,
                },
                ctx,
            );
            e.id = accid.id.clone();
            e.y = staff.loc_y(loc);
            out.push(e);
        }
        LayerElement::Beam(beam) => {
            let mut e = new(ElementKind::Beam, ctx);
            e.id = beam.id.clone();
            out.push(e);

            let dir = beam_dir.or_else(|| beam_direction(&beam.elements, ctx));
            let first_member = out.len();
            flatten_elements(&beam.elements, ctx, ratio, dir, out);
            mark_beam_members(out, first_member);
        }
        LayerElement::Tuplet(tuplet) => {
            let mut e = new(ElementKind::Tuplet, ctx);
            e.id = tuplet.id.clone();
            out.push(e);

            let tuplet_ratio = if tuplet.num > 0 {
                f64::from(tuplet.numbase) / f64::from(tuplet.num)
            } else {
                1.0
            };
            flatten_elements(&tuplet.elements, ctx, ratio * tuplet_ratio, beam_dir, out);
        }
    }
}

fn fill_note(e: &mut DrawingElement, note: &Note, ratio: f64) {
    e.id = note.id.clone();
    e.dur = note.dur;
    e.dots = note.dots;
    e.grace = note.grace;
    e.tie = note.tie;
    e.duration = alignment_duration(note.dur, note.dots, ratio);
}

/// Grace notes and chord tones do not move the running time.
fn advance(ctx: &mut LayerContext<'_>, element: &DrawingElement) {
    if !element.grace {
        ctx.time += element.duration;
    }
}

fn stem_direction(
    dur: Duration,
    explicit: Option<StemDir>,
    beam_dir: Option<StemDir>,
    loc_min: i32,
    loc_max: i32,
    ctx: &LayerContext<'_>,
) -> Option<StemDir> {
    if !dur.has_stem() {
        return None;
    }
    if let Some(dir) = explicit.or(beam_dir).or_else(|| ctx.layer_direction()) {
        return Some(dir);
    }
    // The tone furthest from the middle line decides.
    let middle = ctx.staff.middle_loc();
    let loc = if (loc_max - middle).abs() >= (middle - loc_min).abs() {
        loc_max
    } else {
        loc_min
    };
    Some(ctx.position_direction(loc))
}

/// One direction for all stems of a beam.
fn beam_direction(elements: &[LayerElement], ctx: &LayerContext<'_>) -> Option<StemDir> {
    if let Some(dir) = ctx.layer_direction() {
        return Some(dir);
    }
    let middle = ctx.staff.middle_loc();
    let mut furthest: Option<i32> = None;
    let mut visit = |loc: i32| {
        if furthest.map_or(true, |f| (loc - middle).abs() > (f - middle).abs()) {
            furthest = Some(loc);
        }
    };
    collect_locs(elements, &mut visit);
    furthest.map(|loc| ctx.position_direction(loc))
}

fn collect_locs(elements: &[LayerElement], visit: &mut impl FnMut(i32)) {
    for element in elements {
        match element {
            LayerElement::Note(note) => visit(note.loc),
            LayerElement::Chord(chord) => chord.notes.iter().for_each(|n| visit(n.loc)),
            LayerElement::Beam(beam) => collect_locs(&beam.elements, visit),
            LayerElement::Tuplet(tuplet) => collect_locs(&tuplet.elements, visit),
            _ => {}
        }
    }
}

/// Flag the notes, chords and rests of a beam with their position in it.
/// Chord tones share the position of their chord.
fn mark_beam_members(out: &mut [DrawingElement], first_member: usize) {
    let members: Vec<usize> = (first_member..out.len())
        .filter(|&i| out[i].chord_parent().is_none() && out[i].loc_range().is_some())
        .collect();
    for (n, &i) in members.iter().enumerate() {
        let position = out[i].beam.get_or_insert_with(BeamPosition::default);
        position.first |= n == 0;
        position.last |= n + 1 == members.len();
    }
    for i in first_member..out.len() {
        if let Some(parent) = out[i].chord_parent() {
            out[i].beam = out[parent].beam;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Beam, Chord, Rest, Tuplet};
    use float_cmp::assert_approx_eq;
    use pretty_assertions::assert_eq;

    fn staff() -> StaffMetrics {
        StaffMetrics::new(&StaffDef::new(1), 0, &Style::default())
    }

    fn note(loc: i32, dur: Duration) -> LayerElement {
        LayerElement::Note(Note {
            loc,
            dur,
            ..Note::default()
        })
    }

    fn flatten(elements: Vec<LayerElement>, layer_count: usize) -> Vec<DrawingElement> {
        let staff = staff();
        let layer = Layer {
            n: 1,
            stem_dir: None,
            elements,
        };
        let mut ctx = LayerContext::new(&staff, &layer, 0, layer_count, 1024.0);
        let mut out = Vec::new();
        flatten_layer(&layer, &mut ctx, &mut out);
        out
    }

    #[test]
    fn durations_follow_dots_and_tuplets() {
        assert_approx_eq!(f64, alignment_duration(Duration::Whole, 0, 1.0), 1024.0);
        assert_approx_eq!(f64, alignment_duration(Duration::Quarter, 1, 1.0), 384.0);
        assert_approx_eq!(f64, alignment_duration(Duration::Eighth, 0, 2.0 / 3.0), 128.0 * 2.0 / 3.0);
        assert_approx_eq!(f64, alignment_duration(Duration::Breve, 0, 1.0), 2048.0);
    }

    #[test]
    fn staff_positions_are_relative_to_top_line() {
        let s = staff();
        assert_approx_eq!(f64, s.loc_y(8), 0.0);
        assert_approx_eq!(f64, s.loc_y(0), -720.0);
        assert_approx_eq!(f64, s.center_y(), -360.0);
    }

    #[test]
    fn running_time_advances_by_duration() {
        let out = flatten(
            vec![
                note(4, Duration::Quarter),
                LayerElement::Rest(Rest {
                    dur: Duration::Half,
                    ..Rest::default()
                }),
                note(2, Duration::Quarter),
            ],
            1,
        );
        let times: Vec<f64> = out.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 256.0, 768.0]);
    }

    #[test]
    fn stems_follow_position_and_layers() {
        let single = flatten(vec![note(6, Duration::Quarter), note(1, Duration::Quarter)], 1);
        assert_eq!(single[0].stem_dir, Some(StemDir::Down));
        assert_eq!(single[1].stem_dir, Some(StemDir::Up));

        let shared = flatten(vec![note(6, Duration::Quarter)], 2);
        assert_eq!(shared[0].stem_dir, Some(StemDir::Up));

        let whole = flatten(vec![note(6, Duration::Whole)], 1);
        assert_eq!(whole[0].stem_dir, None);
    }

    #[test]
    fn chord_is_followed_by_its_tones() {
        let out = flatten(
            vec![LayerElement::Chord(Chord {
                dur: Duration::Half,
                notes: vec![
                    Note { loc: 2, ..Note::default() },
                    Note { loc: 6, ..Note::default() },
                ],
                ..Chord::default()
            })],
            1,
        );
        assert_eq!(out.len(), 3);
        match &out[0].kind {
            ElementKind::Chord { tones, loc_min, loc_max } => {
                assert_eq!(tones, &vec![1, 2]);
                assert_eq!((*loc_min, *loc_max), (2, 6));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(out[2].chord_parent(), Some(0));
        assert_eq!(out[2].alignment_type(), None);
        assert_eq!(out[1].stem_dir, out[0].stem_dir);
    }

    #[test]
    fn beam_members_know_first_and_last() {
        let out = flatten(
            vec![LayerElement::Tuplet(Tuplet {
                id: None,
                num: 3,
                numbase: 2,
                elements: vec![LayerElement::Beam(Beam {
                    id: None,
                    elements: vec![note(3, Duration::Eighth), note(4, Duration::Eighth), note(9, Duration::Eighth)],
                })],
            })],
            1,
        );
        let notes: Vec<&DrawingElement> = out.iter().filter(|e| e.is_note()).collect();
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].beam, Some(BeamPosition { first: true, last: false }));
        assert_eq!(notes[2].beam, Some(BeamPosition { first: false, last: true }));
        // The note furthest from the middle line points every stem down.
        assert!(notes.iter().all(|n| n.stem_dir == Some(StemDir::Down)));
        assert_approx_eq!(f64, notes[1].time, 128.0 * 2.0 / 3.0);
    }

    #[test]
    fn grace_notes_do_not_advance_time() {
        let out = flatten(
            vec![
                LayerElement::Note(Note {
                    loc: 4,
                    dur: Duration::Eighth,
                    grace: true,
                    ..Note::default()
                }),
                note(4, Duration::Quarter),
            ],
            1,
        );
        assert_eq!(out[0].time, 0.0);
        assert_eq!(out[1].time, 0.0);
        assert_eq!(out[0].alignment_type(), Some(AlignmentType::GraceNote));
    }
}
