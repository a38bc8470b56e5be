//! Justification: stretching or compressing systems to the page width.

use log::{debug, warn};

use super::aligner::{AlignmentType, MeasureAligner};
use super::constants::JUSTIFICATION_WARNING_RATIO;
use super::MeasureFrame;

/// Scale the slots of one measure by `ratio`. The slots of the
/// non-justifiable margin keep their position, the measure end is scaled
/// directly and everything else is scaled from the margin by a ratio
/// corrected so that the measure still ends at `ceil(ratio * end)`.
pub fn justify_measure(aligner: &mut MeasureAligner, ratio: f64) {
    let width = aligner.width();
    let margin = aligner.non_justifiable_margin();
    let measure_ratio = if width > 0.0 {
        (ratio - 1.0) * (margin / width) + ratio
    } else {
        ratio
    };

    for id in aligner.ids().to_vec() {
        let alignment = aligner.get_mut(id);
        let kind = alignment.kind();
        let x = alignment.x_rel();
        match kind {
            AlignmentType::MeasureStart => {}
            AlignmentType::MeasureEnd => alignment.set_x_rel((ratio * x).ceil()),
            _ if kind.is_attribute() => {}
            _ => alignment.set_x_rel(((x - margin) * measure_ratio).ceil() + margin),
        }
    }
}

/// Ratio that makes `total` fill `target`, or `None` when the system is
/// left as it is: an empty system, or the final system when it would be
/// stretched.
pub fn justification_ratio(total: f64, target: f64, is_last_system: bool) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    let ratio = target / total;
    if ratio < JUSTIFICATION_WARNING_RATIO {
        warn!("Justification ratio {ratio:.3} is low, content is compressed");
    }
    if is_last_system && ratio > 1.0 {
        debug!("Final system not stretched (ratio {ratio:.3})");
        return None;
    }
    Some(ratio)
}

/// Justify the measures of one system. Measure positions start after the
/// staff labels; the returned ratio is 1 when nothing changed.
pub(crate) fn justify_system(measures: &mut [MeasureFrame], labels_width: f64, target: f64, is_last_system: bool) -> f64 {
    let total: f64 = measures.iter().map(|m| m.aligner.width()).sum();
    let Some(ratio) = justification_ratio(total, target, is_last_system) else {
        return 1.0;
    };
    debug!("Justifying {} measures with ratio {ratio:.3}", measures.len());
    // Each measure starts where the rounded end of the previous one lies.
    let mut x = labels_width;
    for measure in measures.iter_mut() {
        measure.x = x;
        justify_measure(&mut measure.aligner, ratio);
        x += measure.aligner.width();
    }
    ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::{approx_eq, assert_approx_eq};
    use proptest::prelude::*;

    /// A measure with a clef, a key signature and notes at fixed positions.
    fn measure(notes: &[f64], end: f64) -> MeasureAligner {
        let mut aligner = MeasureAligner::new();
        let clef = aligner.alignment_at_time(-1.0, AlignmentType::ClefAttr);
        let key = aligner.alignment_at_time(-1.0, AlignmentType::KeysigAttr);
        aligner.get_mut(clef).set_x_shift(72.0);
        aligner.get_mut(clef).set_max_width(250.0);
        aligner.get_mut(key).set_x_shift(260.0);
        aligner.get_mut(key).set_max_width(200.0);
        aligner.integrate_x_shift(0.0, 0.0);
        for (i, &x) in notes.iter().enumerate() {
            let id = aligner.alignment_at_time(256.0 * i as f64, AlignmentType::Default);
            aligner.get_mut(id).set_x_rel(x);
        }
        let right = aligner.right().unwrap();
        aligner.set_max_time(256.0 * notes.len() as f64);
        aligner.get_mut(right).set_x_rel(end);
        aligner
    }

    #[test]
    fn margin_slots_stay_and_end_scales_directly() {
        let mut aligner = measure(&[600.0, 900.0], 1400.0);
        let margin = aligner.non_justifiable_margin();
        assert_approx_eq!(f64, margin, 532.0);
        let before: Vec<(AlignmentType, f64)> = aligner.iter().map(|a| (a.kind(), a.x_rel())).collect();

        let ratio = 1.5;
        justify_measure(&mut aligner, ratio);

        for ((kind, x), after) in before.iter().zip(aligner.iter()) {
            if kind.is_attribute() || *kind == AlignmentType::MeasureStart {
                assert_approx_eq!(f64, after.x_rel(), *x);
            }
        }
        let end = aligner.get(aligner.right().unwrap());
        assert_approx_eq!(f64, end.x_rel(), (1.5f64 * 1400.0).ceil());
    }

    #[test]
    fn content_scales_from_the_margin() {
        let mut aligner = measure(&[600.0], 1000.0);
        let margin = aligner.non_justifiable_margin();
        let ratio = 2.0;
        let measure_ratio = (ratio - 1.0) * (margin / 1000.0) + ratio;
        justify_measure(&mut aligner, ratio);
        let note = aligner.first_of_kind(AlignmentType::Default).unwrap();
        assert_approx_eq!(f64, aligner.get(note).x_rel(), ((600.0 - margin) * measure_ratio).ceil() + margin);
    }

    #[test]
    fn final_system_is_never_stretched() {
        assert_eq!(justification_ratio(1000.0, 2000.0, true), None);
        assert_eq!(justification_ratio(1000.0, 2000.0, false), Some(2.0));
        // Compression still applies to the final system.
        assert_eq!(justification_ratio(1000.0, 500.0, true), Some(0.5));
        assert_eq!(justification_ratio(0.0, 500.0, false), None);
    }

    fn frames(ends: &[f64], labels_width: f64) -> Vec<MeasureFrame> {
        let mut x = labels_width;
        ends.iter()
            .map(|&end| {
                let aligner = measure(&[550.0], end);
                let frame = MeasureFrame {
                    id: None,
                    n: None,
                    system: 0,
                    x,
                    aligner,
                    timestamps: Default::default(),
                    elements: Vec::new(),
                    beat_duration: 256.0,
                    beats: 4.0,
                    end_time: 1024.0,
                };
                x += frame.aligner.width();
                frame
            })
            .collect()
    }

    #[test]
    fn justified_measures_abut() {
        let mut measures = frames(&[1003.0, 1207.0, 1111.0], 300.0);
        let total: f64 = measures.iter().map(|m| m.aligner.width()).sum();
        let ratio = justify_system(&mut measures, 300.0, total * 1.37, false);
        assert_approx_eq!(f64, ratio, 1.37);

        assert_approx_eq!(f64, measures[0].x, 300.0);
        for pair in measures.windows(2) {
            assert_eq!(pair[0].x + pair[0].aligner.width(), pair[1].x);
        }
    }

    proptest! {
        #[test]
        fn end_maps_to_ceil_of_ratio(
            end in 600.0f64..5000.0,
            target in 600.0f64..8000.0,
        ) {
            let mut aligner = measure(&[550.0], end);
            let width = aligner.width();
            let ratio = target / width;
            justify_measure(&mut aligner, ratio);
            let right = aligner.get(aligner.right().unwrap());
            prop_assert!(approx_eq!(f64, right.x_rel(), (ratio * end).ceil(), epsilon = 1e-9));
            let margin_end = aligner.non_justifiable_margin();
            for a in aligner.iter().filter(|a| a.kind().is_attribute()) {
                prop_assert!(a.x_rel() <= margin_end);
            }
        }
    }
}
