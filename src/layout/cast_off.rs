//! Automatic breaking: fill systems greedily, then pages.
//!
//! All measures are first laid out horizontally in one continuous system.
//! A new system starts whenever the next measure, together with the clef
//! and key drawn at a system start, would not fit the available width.
//! The systems are then stacked vertically and split into pages at the
//! bottom margin.

use std::ops::Range;

use log::debug;

use super::{vertical, MeasureFrame, ScoreLayout};
use crate::error::Result;
use crate::metrics::GlyphMetrics;
use crate::model::{Document, Measure, Page, System};
use crate::style::Style;

/// Rebuild the page and system structure of `doc` to fit the page.
pub(crate) fn cast_off(doc: &Document, style: &Style, metrics: &dyn GlyphMetrics) -> Result<Document> {
    let measures: Vec<Measure> = doc.measures().cloned().collect();
    if measures.is_empty() {
        return Ok(doc.clone());
    }

    let continuous = with_systems(doc, vec![vec![measures.clone()]]);
    let mut layout = ScoreLayout::new(&continuous, style, metrics)?;
    layout.reset();
    layout.prepare();
    layout.lay_out_horizontally();
    let systems = system_breaks(&layout.measures, style.system_width(), layout.labels_width(true));
    debug!("Cast off {} measures into {} systems", measures.len(), systems.len());

    let system_measures: Vec<Vec<Measure>> = systems.iter().map(|r| measures[r.clone()].to_vec()).collect();
    let single_page = with_systems(doc, vec![system_measures.clone()]);
    let mut layout = ScoreLayout::new(&single_page, style, metrics)?;
    layout.reset();
    layout.prepare();
    layout.lay_out_horizontally();
    layout.justify();
    vertical::lay_out_vertically(&mut layout);
    let heights: Vec<f64> = layout.systems.iter().map(|s| s.height).collect();

    let usable = style.page_height - style.page_margin_top - style.page_margin_bottom;
    let pages = page_breaks(&heights, usable, style.spacing_system * style.unit);
    debug!("Cast off {} systems into {} pages", heights.len(), pages.len());

    let pages = pages
        .into_iter()
        .map(|range| system_measures[range].to_vec())
        .collect();
    Ok(with_systems(doc, pages))
}

fn with_systems(doc: &Document, pages: Vec<Vec<Vec<Measure>>>) -> Document {
    Document {
        score_def: doc.score_def.clone(),
        pages: pages
            .into_iter()
            .map(|systems| Page {
                systems: systems.into_iter().map(|measures| System { measures }).collect(),
            })
            .collect(),
    }
}

/// Measure ranges of the systems. `measures` are laid out in one system
/// starting after the full staff labels; later systems reserve
/// `abbr_labels_width` for the abbreviated ones instead. A measure wider
/// than the page gets a system of its own.
pub(crate) fn system_breaks(measures: &[MeasureFrame], available: f64, abbr_labels_width: f64) -> Vec<Range<usize>> {
    let Some(first) = measures.first() else {
        return Vec::new();
    };
    // Later systems repeat the clef and key of the first measure.
    let header = first.aligner.non_justifiable_margin();

    let mut systems = Vec::new();
    let mut start = 0;
    for (m, frame) in measures.iter().enumerate() {
        let right = frame.x + frame.aligner.width();
        let width = if systems.is_empty() {
            right
        } else {
            let start_frame = &measures[start];
            let extra = (header - start_frame.aligner.non_justifiable_margin()).max(0.0);
            right - start_frame.x + extra + abbr_labels_width
        };
        if m > start && width > available {
            systems.push(start..m);
            start = m;
        }
    }
    systems.push(start..measures.len());
    systems
}

/// System ranges of the pages. A page takes systems while their heights
/// and the spacing between them fit `usable`.
pub(crate) fn page_breaks(heights: &[f64], usable: f64, spacing: f64) -> Vec<Range<usize>> {
    let mut pages = Vec::new();
    let mut start = 0;
    let mut used = 0.0;
    for (s, &height) in heights.iter().enumerate() {
        let needed = if s > start { used + spacing + height } else { height };
        if s > start && needed > usable {
            pages.push(start..s);
            start = s;
            used = height;
        } else {
            used = needed;
        }
    }
    if !heights.is_empty() {
        pages.push(start..heights.len());
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::aligner::{MeasureAligner, TimestampAligner};
    use pretty_assertions::assert_eq;

    fn frame(x: f64, width: f64, margin: f64) -> MeasureFrame {
        let mut aligner = MeasureAligner::new();
        let end = aligner.right().unwrap();
        aligner.get_mut(end).set_x_rel(width);
        aligner.set_non_justifiable_margin(margin);
        MeasureFrame {
            id: None,
            n: None,
            system: 0,
            aligner,
            timestamps: TimestampAligner::default(),
            elements: Vec::new(),
            x,
            beat_duration: 256.0,
            beats: 4.0,
            end_time: 0.0,
        }
    }

    /// Measures side by side; the first one carries the system-start margin.
    fn row(widths: &[f64], first_margin: f64) -> Vec<MeasureFrame> {
        let mut x = 0.0;
        let mut frames = Vec::new();
        for (i, &w) in widths.iter().enumerate() {
            frames.push(frame(x, w, if i == 0 { first_margin } else { 0.0 }));
            x += w;
        }
        frames
    }

    #[test]
    fn systems_fill_greedily() {
        let frames = row(&[1000.0; 7], 0.0);
        assert_eq!(system_breaks(&frames, 3500.0, 0.0), vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn a_wide_measure_gets_its_own_system() {
        let frames = row(&[1000.0, 9000.0, 1000.0], 0.0);
        assert_eq!(system_breaks(&frames, 5000.0, 0.0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn later_systems_leave_room_for_the_header() {
        // Two plain measures would fit in 2500 without the repeated clef
        // and key of 600.
        let frames = row(&[1600.0, 1000.0, 1000.0, 1000.0], 600.0);
        assert_eq!(system_breaks(&frames, 2500.0, 0.0), vec![0..1, 1..2, 2..3, 3..4]);
        assert_eq!(system_breaks(&frames, 2600.0, 0.0), vec![0..2, 2..4]);
    }

    #[test]
    fn abbreviated_labels_push_a_measure_to_the_next_system() {
        let frames = row(&[1600.0, 1000.0, 1000.0, 1000.0], 600.0);
        assert_eq!(system_breaks(&frames, 2600.0, 0.0), vec![0..2, 2..4]);
        // 1000 + 1000 + 600 header + 100 labels no longer fits.
        assert_eq!(system_breaks(&frames, 2600.0, 100.0), vec![0..2, 2..3, 3..4]);
    }

    #[test]
    fn pages_split_at_the_bottom_margin() {
        assert_eq!(page_breaks(&[1000.0, 1000.0, 1000.0, 1000.0], 2500.0, 200.0), vec![0..2, 2..4]);
        assert_eq!(page_breaks(&[], 2500.0, 200.0), Vec::<Range<usize>>::new());
        // A system taller than the page still gets a page.
        assert_eq!(page_breaks(&[4000.0, 100.0], 2500.0, 200.0), vec![0..1, 1..2]);
    }
}
