//! Horizontal layout: slots, ideal spacing, collision shifts and measure
//! positions.
//!
//! The passes run in a fixed order for every measure: slots are created
//! from element times, placed by duration, pushed apart where element boxes
//! collide and finally integrated into positions. Grace clusters are shifted
//! and integrated inside their own aligner before the measure itself.

use super::aligner::{AlignmentId, AlignmentType, MeasureAligner};
use super::constants::{DEFINITION_FACTOR, DUR_1, MEASURE_START_TIME, SPACING_CONSTANT};
use super::device::{MeasureMode, MeasurementDevice};
use super::elements::{DrawingElement, ElementKind, ElementRole, SlotRef, StaffMetrics};
use super::geometry::BoundingBox;
use super::MeasureFrame;
use crate::style::{ClassMargins, Style};

// ═══════════════════════════════════════════════════════════════════════
// Slots
// ═══════════════════════════════════════════════════════════════════════

/// Give every element of the measure its slot, stack grace notes onto the
/// grace slot of the beat they lead into and register the timestamps.
pub(crate) fn align_horizontally(measure: &mut MeasureFrame) {
    let MeasureFrame {
        aligner,
        timestamps,
        elements,
        beat_duration,
        end_time,
        ..
    } = measure;

    let mut pending: Vec<usize> = Vec::new();
    for i in 0..elements.len() {
        if elements[i].chord_parent().is_some() {
            continue;
        }
        let Some(kind) = elements[i].alignment_type() else {
            continue;
        };
        if kind == AlignmentType::GraceNote {
            let same_cluster = pending.first().map_or(true, |&first| {
                let (a, b) = (&elements[first], &elements[i]);
                a.staff_n == b.staff_n && a.layer_n == b.layer_n
            });
            if !same_cluster {
                flush_grace_cluster(aligner, elements, &mut pending);
            }
            pending.push(i);
            continue;
        }
        flush_grace_cluster(aligner, elements, &mut pending);

        let e = &elements[i];
        let slot = match (kind, e.role) {
            (AlignmentType::MeasureEnd, _) => aligner.right(),
            (_, ElementRole::Attribute | ElementRole::LeftBarline) => {
                Some(aligner.alignment_at_time(MEASURE_START_TIME, kind))
            }
            _ => Some(aligner.alignment_at_time(e.time, kind)),
        };
        elements[i].slot = slot.map(SlotRef::Measure);
    }
    flush_grace_cluster(aligner, elements, &mut pending);

    // Chord tones share the slot of their chord.
    for i in 0..elements.len() {
        if let Some(parent) = elements[i].chord_parent() {
            elements[i].slot = elements[parent].slot;
        }
    }

    let mut max_time = *end_time;
    for id in timestamps.ids().to_vec() {
        let time = timestamps.get(id).time;
        let slot_time = if time < 0.0 { time } else { time * *beat_duration };
        let slot = aligner.alignment_at_time(slot_time, AlignmentType::Default);
        timestamps.get_mut(id).slot = Some(slot);
        max_time = max_time.max(slot_time);
    }
    aligner.set_max_time(max_time);
}

/// Stack the pending grace notes onto the grace slot at their time.
fn flush_grace_cluster(aligner: &mut MeasureAligner, elements: &mut [DrawingElement], pending: &mut Vec<usize>) {
    let Some(&first) = pending.first() else {
        return;
    };
    let owner = aligner.alignment_at_time(elements[first].time, AlignmentType::GraceNote);
    let grace = aligner.get_mut(owner).grace_aligner_mut();
    for &i in pending.iter() {
        grace.stack_note(i, elements[i].duration);
    }
    for (i, slot) in grace.align_stack() {
        elements[i].slot = Some(SlotRef::Grace { owner, slot });
    }
    pending.clear();
}

// ═══════════════════════════════════════════════════════════════════════
// Ideal spacing
// ═══════════════════════════════════════════════════════════════════════

/// Ideal distance for a time interval. When the longest duration of the
/// score is longer than a whole note, the interval is scaled so that the
/// longest duration gets the space of a whole note.
pub fn horizontal_space_for_duration(interval: f64, longest_dur: i32, linear: f64, non_linear: f64) -> f64 {
    let mut interval = interval;
    if longest_dur < DUR_1 {
        interval /= 2f64.powi(DUR_1 - longest_dur);
    }
    interval.powf(non_linear) * linear * SPACING_CONSTANT
}

/// Place the slots of a measure by duration, from the start of the measure.
pub(crate) fn set_alignment_x_pos(aligner: &mut MeasureAligner, longest_dur: i32, style: &Style) {
    aligner.reset_positions();
    if style.even_spacing {
        return;
    }
    let mut previous_time = 0.0;
    let mut previous_x = 0.0;
    for id in aligner.ids().to_vec() {
        let alignment = aligner.get_mut(id);
        let interval = alignment.time() - previous_time;
        let space = if interval > 0.0 {
            horizontal_space_for_duration(interval, longest_dur, style.spacing_linear, style.spacing_non_linear)
        } else {
            0.0
        };
        let x = previous_x + space * DEFINITION_FACTOR;
        alignment.set_x_rel(x);
        previous_time = alignment.time();
        previous_x = x;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Measurement
// ═══════════════════════════════════════════════════════════════════════

/// Measure every element of a measure.
pub(crate) fn set_bounding_boxes(
    elements: &mut [DrawingElement],
    staves: &[StaffMetrics],
    device: &dyn MeasurementDevice,
    mode: MeasureMode,
) {
    for i in 0..elements.len() {
        let Some(staff) = staves.get(elements[i].staff_index) else {
            debug_assert!(false, "element on unknown staff {}", elements[i].staff_n);
            continue;
        };
        let bbox = device.element_box(elements, i, staff, mode);
        elements[i].bbox = bbox;
    }
}

fn class_margin(margins: &ClassMargins, kind: &ElementKind) -> f64 {
    match kind {
        ElementKind::Note { .. } | ElementKind::Chord { .. } => margins.note,
        ElementKind::Rest { .. } | ElementKind::MeasureRest => margins.rest,
        ElementKind::MultiRest { .. } => margins.multi_rest,
        ElementKind::Clef { .. } => margins.clef,
        ElementKind::KeySig { .. } => margins.key_sig,
        ElementKind::MeterSig { .. } => margins.meter_sig,
        ElementKind::Mensur => margins.mensur,
        ElementKind::BarLine { .. } => margins.barline,
        ElementKind::Accid { .. } => margins.accid,
        ElementKind::Dot { .. } => margins.dot,
        ElementKind::Beam | ElementKind::Tuplet => 0.0,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Collision shifts
// ═══════════════════════════════════════════════════════════════════════

/// Push `alignment` right when an element with box `b` would start before
/// `min_pos`, and return the position where the next element may start.
fn shift_against(
    aligner: &mut MeasureAligner,
    id: AlignmentId,
    b: &BoundingBox,
    left: f64,
    right: f64,
    min_pos: f64,
) -> f64 {
    let alignment = aligner.get_mut(id);
    let negative_offset = -b.x1 + left;
    if alignment.x_rel() - negative_offset < min_pos {
        alignment.set_x_shift(min_pos - alignment.x_rel() + negative_offset);
    }
    alignment.set_max_width(b.x2 + right);
    alignment.x_rel() + b.x2 + right
}

/// Separate the notes of every grace cluster and compute the cluster widths.
pub(crate) fn adjust_grace_x_pos(measure: &mut MeasureFrame, staves: &[StaffMetrics], style: &Style) {
    let MeasureFrame { aligner, elements, .. } = measure;

    for owner in aligner.ids().to_vec() {
        let Some(grace) = aligner.get_mut(owner).grace_aligner_opt_mut() else {
            continue;
        };

        let mut layers: Vec<(u32, u32)> = Vec::new();
        for e in elements.iter() {
            if matches!(e.slot, Some(SlotRef::Grace { owner: o, .. }) if o == owner) {
                let key = (e.staff_n, e.layer_n);
                if !layers.contains(&key) {
                    layers.push(key);
                }
            }
        }

        for (staff_n, layer_n) in layers {
            let mut min_pos = 0.0;
            for e in elements.iter().filter(|e| e.staff_n == staff_n && e.layer_n == layer_n) {
                let Some(SlotRef::Grace { owner: o, slot }) = e.slot else {
                    continue;
                };
                let (Some(b), true) = (e.bbox, o == owner) else {
                    continue;
                };
                let unit = staves.get(e.staff_index).map_or(style.unit, |s| s.unit);
                let left = class_margin(&style.margins.left, &e.kind) * unit;
                let right = class_margin(&style.margins.right, &e.kind) * unit;
                min_pos = shift_against(grace.aligner_mut(), slot, &b, left, right, min_pos);
            }
        }
        grace.integrate_x_shift();
    }
}

/// Record the shifts that keep the elements of each layer from colliding.
/// Attributes and the left barline of a staff precede every layer of it;
/// the right barline is shifted against the widest layer.
pub(crate) fn adjust_x_pos(measure: &mut MeasureFrame, staves: &[StaffMetrics], style: &Style) {
    let MeasureFrame { aligner, elements, .. } = measure;

    let mut staff_ns: Vec<u32> = Vec::new();
    for e in elements.iter() {
        if !staff_ns.contains(&e.staff_n) {
            staff_ns.push(e.staff_n);
        }
    }

    for staff_n in staff_ns {
        let mut layers: Vec<u32> = Vec::new();
        for e in elements.iter().filter(|e| e.staff_n == staff_n && e.role == ElementRole::Content) {
            if !layers.contains(&e.layer_n) {
                layers.push(e.layer_n);
            }
        }
        if layers.is_empty() {
            layers.push(0);
        }

        let mut widest: f64 = 0.0;
        for layer_n in layers {
            let mut min_pos = 0.0;
            let mut grace_owners: Vec<AlignmentId> = Vec::new();
            let members = elements.iter().filter(|e| {
                e.staff_n == staff_n
                    && match e.role {
                        ElementRole::Attribute | ElementRole::LeftBarline => true,
                        ElementRole::Content => e.layer_n == layer_n,
                        ElementRole::RightBarline => false,
                    }
            });
            for e in members {
                let unit = staves.get(e.staff_index).map_or(style.unit, |s| s.unit);
                let left = class_margin(&style.margins.left, &e.kind) * unit;
                let right = class_margin(&style.margins.right, &e.kind) * unit;
                match e.slot {
                    Some(SlotRef::Grace { owner, .. }) => {
                        if grace_owners.contains(&owner) {
                            continue;
                        }
                        grace_owners.push(owner);
                        let width = aligner.get(owner).grace_aligner().map_or(0.0, |g| g.width());
                        let alignment = aligner.get_mut(owner);
                        let negative_offset = width + left;
                        if alignment.x_rel() - negative_offset < min_pos {
                            alignment.set_x_shift(min_pos - alignment.x_rel() + negative_offset);
                        }
                        min_pos = alignment.x_rel();
                    }
                    Some(SlotRef::Measure(id)) => {
                        let Some(b) = e.bbox else {
                            continue;
                        };
                        min_pos = shift_against(aligner, id, &b, left, right, min_pos);
                    }
                    None => {}
                }
            }
            widest = widest.max(min_pos);
        }

        for e in elements
            .iter()
            .filter(|e| e.staff_n == staff_n && e.role == ElementRole::RightBarline)
        {
            let Some(SlotRef::Measure(id)) = e.slot else {
                continue;
            };
            let unit = staves.get(e.staff_index).map_or(style.unit, |s| s.unit);
            let left = class_margin(&style.margins.left, &e.kind) * unit;
            let right = class_margin(&style.margins.right, &e.kind) * unit;
            // An invisible barline still closes the measure.
            let b = e.bbox.unwrap_or_default();
            shift_against(aligner, id, &b, left, right, widest);
        }
    }
}

/// Fold the shifts into positions with the measure padding and minimum width.
pub(crate) fn integrate_x_shift(aligner: &mut MeasureAligner, style: &Style) {
    aligner.integrate_x_shift(style.left_position * style.unit, style.min_measure_width * style.unit);
}

/// Copy the slot positions into the elements. Grace notes end at their
/// owner slot.
pub(crate) fn set_element_x(measure: &mut MeasureFrame) {
    let MeasureFrame { aligner, elements, .. } = measure;
    for e in elements.iter_mut() {
        e.x = match e.slot {
            Some(SlotRef::Measure(id)) => aligner.get(id).x_rel(),
            Some(SlotRef::Grace { owner, slot }) => {
                let alignment = aligner.get(owner);
                match alignment.grace_aligner() {
                    Some(grace) => alignment.x_rel() - grace.width() + grace.aligner().get(slot).x_rel(),
                    None => alignment.x_rel(),
                }
            }
            None => 0.0,
        };
    }
}

/// Place measures side by side from `start` and return the right edge.
pub(crate) fn align_measures(measures: &mut [MeasureFrame], start: f64) -> f64 {
    let mut x = start;
    for measure in measures {
        measure.x = x;
        x += measure.aligner.width();
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::aligner::TimestampAligner;
    use crate::layout::device::BBoxDevice;
    use crate::layout::elements::{flatten_layer, LayerContext};
    use crate::metrics::ApproximateMetrics;
    use crate::model::{Duration, Layer, LayerElement, Note, StaffDef};
    use float_cmp::assert_approx_eq;
    use pretty_assertions::assert_eq;

    fn note(loc: i32, dur: Duration, grace: bool) -> LayerElement {
        LayerElement::Note(Note {
            loc,
            dur,
            grace,
            ..Note::default()
        })
    }

    fn frame(layers: Vec<Vec<LayerElement>>) -> (MeasureFrame, StaffMetrics) {
        let style = Style::default();
        let staff = StaffMetrics::new(&StaffDef::new(1), 0, &style);
        let count = layers.len();
        let mut elements = Vec::new();
        let mut end_time: f64 = 0.0;
        for (index, elements_of_layer) in layers.into_iter().enumerate() {
            let layer = Layer {
                n: index as u32 + 1,
                stem_dir: None,
                elements: elements_of_layer,
            };
            let mut ctx = LayerContext::new(&staff, &layer, index, count, 1024.0);
            end_time = end_time.max(flatten_layer(&layer, &mut ctx, &mut elements));
        }
        elements.push(DrawingElement::barline(
            crate::model::BarRendition::Single,
            ElementRole::RightBarline,
            &staff,
        ));
        let measure = MeasureFrame {
            id: None,
            n: None,
            system: 0,
            aligner: MeasureAligner::new(),
            timestamps: TimestampAligner::default(),
            elements,
            x: 0.0,
            beat_duration: 256.0,
            beats: 4.0,
            end_time,
        };
        (measure, staff)
    }

    fn lay_out(measure: &mut MeasureFrame, staff: &StaffMetrics, style: &Style) {
        let metrics = ApproximateMetrics;
        let device = BBoxDevice::new(&metrics, style);
        let staves = [*staff];
        align_horizontally(measure);
        set_alignment_x_pos(&mut measure.aligner, 4, style);
        set_bounding_boxes(&mut measure.elements, &staves, &device, MeasureMode::HorizontalOnly);
        adjust_grace_x_pos(measure, &staves, style);
        adjust_x_pos(measure, &staves, style);
        integrate_x_shift(&mut measure.aligner, style);
        set_element_x(measure);
    }

    #[test]
    fn longer_intervals_get_more_space_sub_linearly() {
        let quarter = horizontal_space_for_duration(256.0, 4, 0.25, 0.6);
        let half = horizontal_space_for_duration(512.0, 4, 0.25, 0.6);
        assert!(half > quarter);
        assert!(half < 2.0 * quarter);
        // A score with breves spaces a breve like a whole note.
        let breve = horizontal_space_for_duration(2048.0, 1, 0.25, 0.6);
        let whole = horizontal_space_for_duration(1024.0, 2, 0.25, 0.6);
        assert_approx_eq!(f64, breve, whole);
    }

    #[test]
    fn slots_follow_time_and_elements_follow_slots() {
        let style = Style::default();
        let (mut measure, staff) = frame(vec![vec![
            note(4, Duration::Quarter, false),
            note(5, Duration::Quarter, false),
            note(6, Duration::Half, false),
        ]]);
        lay_out(&mut measure, &staff, &style);

        let xs: Vec<f64> = measure.elements.iter().take(3).map(|e| e.x).collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        let end = measure.aligner.get(measure.aligner.right().unwrap());
        assert_approx_eq!(f64, end.time(), 1024.0);
        assert!(end.x_rel() > xs[2]);
        // Boxes never overlap after the shifts.
        for pair in measure.elements[..3].windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.x + a.bbox.unwrap().x2 <= b.x + b.bbox.unwrap().x1);
        }
    }

    #[test]
    fn even_spacing_only_separates_boxes() {
        let style = Style {
            even_spacing: true,
            ..Style::default()
        };
        let (mut measure, staff) = frame(vec![vec![note(4, Duration::Whole, false), note(4, Duration::Eighth, false)]]);
        lay_out(&mut measure, &staff, &style);
        let first = &measure.elements[0];
        let second = &measure.elements[1];
        let margins = (style.margins.right.note + style.margins.left.note) * staff.unit;
        assert_approx_eq!(f64, second.x - (first.x + first.bbox.unwrap().x2), margins);
    }

    #[test]
    fn grace_notes_end_at_their_owner() {
        let style = Style::default();
        let (mut measure, staff) = frame(vec![vec![
            note(4, Duration::Eighth, true),
            note(5, Duration::Sixteenth, true),
            note(4, Duration::Quarter, false),
        ]]);
        lay_out(&mut measure, &staff, &style);

        let owner = match measure.elements[0].slot {
            Some(SlotRef::Grace { owner, .. }) => owner,
            other => panic!("unexpected slot {other:?}"),
        };
        assert_eq!(measure.aligner.get(owner).kind(), AlignmentType::GraceNote);
        let grace = measure.aligner.get(owner).grace_aligner().unwrap();
        assert_eq!(grace.aligner().len(), 2);
        let owner_x = measure.aligner.get(owner).x_rel();
        let (g1, g2, main) = (&measure.elements[0], &measure.elements[1], &measure.elements[2]);
        assert!(g1.x < g2.x);
        assert!(g2.x < owner_x);
        assert!(owner_x <= main.x);
        assert_approx_eq!(f64, g1.x, owner_x - grace.width() + grace.aligner().get(grace.aligner().ids()[0]).x_rel());
    }

    #[test]
    fn second_layer_shares_slots() {
        let style = Style::default();
        let (mut measure, staff) = frame(vec![
            vec![note(6, Duration::Half, false), note(6, Duration::Half, false)],
            vec![note(1, Duration::Quarter, false), note(1, Duration::Quarter, false), note(1, Duration::Half, false)],
        ]);
        lay_out(&mut measure, &staff, &style);
        let upper_second = &measure.elements[1];
        let lower_third = &measure.elements[4];
        assert_eq!(upper_second.slot, lower_third.slot);
        assert_approx_eq!(f64, upper_second.x, lower_third.x);
        // Default slots at 0, 256 and 512 plus both sentinels.
        assert_eq!(measure.aligner.len(), 5);
    }

    #[test]
    fn timestamps_get_default_slots() {
        let style = Style::default();
        let (mut measure, staff) = frame(vec![vec![note(4, Duration::Whole, false)]]);
        let on_beat_three = measure.timestamps.timestamp_at(3.0);
        let before_first = measure.timestamps.timestamp_at(0.5);
        lay_out(&mut measure, &staff, &style);

        let slot = measure.timestamps.get(on_beat_three).slot.unwrap();
        assert_approx_eq!(f64, measure.aligner.get(slot).time(), 512.0);
        let early = measure.timestamps.get(before_first).slot.unwrap();
        assert_approx_eq!(f64, measure.aligner.get(early).time(), -0.5);
        assert!(measure.aligner.get(early).x_rel() <= measure.elements[0].x);
    }
}
