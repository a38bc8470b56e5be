//! Vertical stacking: one slot per staff of a system.
//!
//! A [`SystemAligner`] holds a [`StaffAlignment`] per staff plus a bottom
//! sentinel that is always last and gives the system its height. Each staff
//! slot collects the boxes protruding above and below its lines, the
//! floating positioners drawn on it and monotone overflow accumulators. The
//! y positions are then derived top to bottom from these accumulators, the
//! same way slot x positions are integrated from their shifts.

use log::debug;

use super::elements::StaffMetrics;
use super::geometry::BoundingBox;
use super::positioner::{FloatingClass, FloatingPositioner};
use crate::model::Place;
use crate::style::Style;

// ═══════════════════════════════════════════════════════════════════════
// StaffAlignment
// ═══════════════════════════════════════════════════════════════════════

/// Which text directions, dynamics and hairpins a staff carries on each
/// side. Recorded while adjusting; not used for spacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionFlags {
    pub dir_above: bool,
    pub dir_below: bool,
    pub dynam_above: bool,
    pub dynam_below: bool,
    pub hairpin_above: bool,
    pub hairpin_below: bool,
}

impl DirectionFlags {
    fn record(&mut self, class: FloatingClass, place: Place) {
        let above = place == Place::Above;
        match class {
            FloatingClass::Dir | FloatingClass::Tempo => {
                self.dir_above |= above;
                self.dir_below |= !above;
            }
            FloatingClass::Dynam => {
                self.dynam_above |= above;
                self.dynam_below |= !above;
            }
            FloatingClass::Hairpin => {
                self.hairpin_above |= above;
                self.hairpin_below |= !above;
            }
            _ => {}
        }
    }
}

/// Vertical slot of one staff. The bottom sentinel has no staff.
#[derive(Debug, Clone)]
pub struct StaffAlignment {
    staff: Option<StaffMetrics>,
    y_rel: f64,
    y_shift: f64,
    overflow_above: f64,
    overflow_below: f64,
    overlap: f64,
    verse_count: u32,
    flags: DirectionFlags,
    above_boxes: Vec<BoundingBox>,
    below_boxes: Vec<BoundingBox>,
    positioners: Vec<FloatingPositioner>,
}

impl StaffAlignment {
    fn new(staff: Option<StaffMetrics>) -> Self {
        Self {
            staff,
            y_rel: 0.0,
            y_shift: 0.0,
            overflow_above: 0.0,
            overflow_below: 0.0,
            overlap: 0.0,
            verse_count: 0,
            flags: DirectionFlags::default(),
            above_boxes: Vec::new(),
            below_boxes: Vec::new(),
            positioners: Vec::new(),
        }
    }

    pub fn staff(&self) -> Option<&StaffMetrics> {
        self.staff.as_ref()
    }

    pub fn staff_height(&self) -> f64 {
        self.staff.map_or(0.0, |s| s.staff_height)
    }

    pub fn y_rel(&self) -> f64 {
        self.y_rel
    }

    pub fn y_shift(&self) -> f64 {
        self.y_shift
    }

    /// Keep the largest downward shift requested.
    pub fn set_y_shift(&mut self, y_shift: f64) {
        if y_shift < self.y_shift {
            self.y_shift = y_shift;
        }
    }

    pub fn overflow_above(&self) -> f64 {
        self.overflow_above
    }

    pub fn set_overflow_above(&mut self, overflow: f64) {
        if overflow > self.overflow_above {
            self.overflow_above = overflow;
        }
    }

    pub fn overflow_below(&self) -> f64 {
        self.overflow_below
    }

    pub fn set_overflow_below(&mut self, overflow: f64) {
        if overflow > self.overflow_below {
            self.overflow_below = overflow;
        }
    }

    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    pub fn set_overlap(&mut self, overlap: f64) {
        if overlap > self.overlap {
            self.overlap = overlap;
        }
    }

    pub fn verse_count(&self) -> u32 {
        self.verse_count
    }

    /// A staff with lyrics has at least one verse.
    pub fn set_verse_count(&mut self, count: u32) {
        let count = count.max(1);
        if count > self.verse_count {
            self.verse_count = count;
        }
    }

    pub fn flags(&self) -> DirectionFlags {
        self.flags
    }

    pub fn above_boxes(&self) -> &[BoundingBox] {
        &self.above_boxes
    }

    pub fn below_boxes(&self) -> &[BoundingBox] {
        &self.below_boxes
    }

    /// Extent of a box above the top line.
    pub fn calc_overflow_above(&self, b: &BoundingBox) -> f64 {
        b.y2
    }

    /// Extent of a box below the bottom line.
    pub fn calc_overflow_below(&self, b: &BoundingBox) -> f64 {
        -(b.y1 + self.staff_height())
    }

    /// Record a laid-out element box if it protrudes above or below the
    /// staff by more than `threshold`.
    pub fn add_overflow_box(&mut self, b: BoundingBox, threshold: f64) {
        let above = self.calc_overflow_above(&b);
        if above > threshold {
            self.set_overflow_above(above);
            self.above_boxes.push(b);
        }
        let below = self.calc_overflow_below(&b);
        if below > threshold {
            self.set_overflow_below(below);
            self.below_boxes.push(b);
        }
    }

    pub fn positioners(&self) -> &[FloatingPositioner] {
        &self.positioners
    }

    /// Store the positioner of a spanning element instance, replacing an
    /// earlier one for the same element.
    pub fn set_positioner(&mut self, positioner: FloatingPositioner) {
        match self.positioners.iter_mut().find(|p| p.spanner == positioner.spanner) {
            Some(existing) => *existing = positioner,
            None => self.positioners.push(positioner),
        }
    }

    /// Place the positioners of one class and record their overflow.
    ///
    /// Curves keep their position and only add their boxes. Lyrics are not
    /// positioners: they reserve `verse_count` lines of `lyric_line_height`
    /// below the staff and then drop the boxes below, so that the next
    /// staff does not check its overlap against them.
    pub fn adjust_floating_positioners(
        &mut self,
        class: FloatingClass,
        margin: f64,
        threshold: f64,
        lyric_line_height: f64,
    ) {
        if self.staff.is_none() {
            return;
        }
        if class == FloatingClass::Syl {
            if self.verse_count > 0 {
                self.set_overflow_below(self.overflow_below + f64::from(self.verse_count) * lyric_line_height);
                self.below_boxes.clear();
            }
            return;
        }

        let staff_height = self.staff_height();
        for i in 0..self.positioners.len() {
            if self.positioners[i].class != class {
                continue;
            }

            if class.is_curve() {
                let b = self.positioners[i].bbox();
                self.add_overflow_box(b, threshold);
                continue;
            }

            let positioner = &mut self.positioners[i];
            let place = positioner.place;
            positioner.calc_drawing_y_rel(staff_height, margin, None);
            let boxes = match place {
                Place::Above => &self.above_boxes,
                Place::Below => &self.below_boxes,
            };
            for b in boxes {
                if positioner.horizontal_overlap(b) {
                    positioner.calc_drawing_y_rel(staff_height, margin, Some(b));
                }
            }

            let b = positioner.bbox();
            self.flags.record(class, place);
            match place {
                Place::Above => {
                    let overflow = self.calc_overflow_above(&b);
                    self.above_boxes.push(b);
                    self.set_overflow_above(overflow);
                }
                Place::Below => {
                    let overflow = self.calc_overflow_below(&b);
                    self.below_boxes.push(b);
                    self.set_overflow_below(overflow);
                }
            }
        }
    }

    fn integrate_y_shift(&mut self, shift: f64) -> f64 {
        self.y_rel += self.y_shift + shift;
        let shift = shift + self.y_shift;
        self.y_shift = 0.0;
        shift
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SystemAligner
// ═══════════════════════════════════════════════════════════════════════

/// The staff slots of one system, top to bottom, and the bottom sentinel.
#[derive(Debug, Clone)]
pub struct SystemAligner {
    staves: Vec<StaffAlignment>,
}

impl Default for SystemAligner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAligner {
    pub fn new() -> Self {
        Self {
            staves: vec![StaffAlignment::new(None)],
        }
    }

    /// Number of staff slots, without the bottom sentinel.
    pub fn staff_count(&self) -> usize {
        self.staves.len() - 1
    }

    /// The slot at `index`, creating it for `staff` when `index` is the next
    /// free position. Slots are created contiguously; a gap returns `None`.
    pub fn staff_alignment_at(&mut self, index: usize, staff: &StaffMetrics) -> Option<&mut StaffAlignment> {
        let count = self.staff_count();
        if index > count {
            debug_assert!(index <= count, "staff alignment {index} created after {count}");
            return None;
        }
        if index == count {
            self.staves.insert(count, StaffAlignment::new(Some(*staff)));
        }
        self.staves.get_mut(index)
    }

    /// Staff slots without the bottom sentinel.
    pub fn staves(&self) -> &[StaffAlignment] {
        &self.staves[..self.staff_count()]
    }

    pub fn staves_mut(&mut self) -> &mut [StaffAlignment] {
        let count = self.staff_count();
        &mut self.staves[..count]
    }

    pub fn bottom(&self) -> &StaffAlignment {
        &self.staves[self.staves.len() - 1]
    }

    /// The slot of staff number `n`.
    pub fn by_staff_n(&self, n: u32) -> Option<&StaffAlignment> {
        self.staves().iter().find(|s| s.staff.is_some_and(|staff| staff.n == n))
    }

    pub fn by_staff_n_mut(&mut self, n: u32) -> Option<&mut StaffAlignment> {
        self.staves_mut()
            .iter_mut()
            .find(|s| s.staff.is_some_and(|staff| staff.n == n))
    }

    pub fn adjust_floating_positioners(&mut self, class: FloatingClass, margin: f64, threshold: f64, lyric_line_height: f64) {
        for staff in self.staves_mut() {
            staff.adjust_floating_positioners(class, margin, threshold, lyric_line_height);
        }
    }

    /// Record the overlap between each staff and the one above it: every
    /// box protruding below the upper staff is checked against every
    /// horizontally overlapping box protruding above the lower staff.
    pub fn calc_staff_overlap(&mut self) {
        for i in 1..self.staff_count() {
            let (upper, lower) = self.staves.split_at_mut(i);
            let previous = &upper[i - 1];
            let current = &mut lower[0];
            for below in &previous.below_boxes {
                for above in current.above_boxes.iter().filter(|a| below.horizontal_overlap(a)) {
                    let required = previous.calc_overflow_below(below) + current.calc_overflow_above(above);
                    let spacing = previous.overflow_below.max(current.overflow_above);
                    if required > spacing {
                        current.overlap = current.overlap.max(required - spacing);
                    }
                }
            }
        }
    }

    /// Compute the shift of every slot from the overflow of the slot above.
    pub fn set_alignment_y_pos(&mut self, style: &Style) {
        let spacing = style.spacing_staff * style.unit;
        let mut previous_height = 0.0;
        let mut previous_below = spacing;
        let mut previous_verse_count = 0;

        for staff in &mut self.staves {
            let max_overflow_above = if previous_verse_count > 0 {
                previous_below + staff.overflow_above
            } else {
                previous_below.max(staff.overflow_above) + staff.overlap
            };
            let unit = staff.staff.map_or(style.unit, |s| s.unit);
            let shift = max_overflow_above.max(spacing) + style.margins.bottom.staff * unit;
            staff.set_y_shift(-shift - previous_height);

            previous_height = staff.staff_height();
            previous_below = staff.overflow_below;
            previous_verse_count = staff.verse_count;
        }
    }

    /// Fold the shifts into positions and return the system height.
    pub fn integrate_y_shift(&mut self) -> f64 {
        let mut shift = 0.0;
        for staff in &mut self.staves {
            shift = staff.integrate_y_shift(shift);
        }
        let height = self.height();
        debug!("System height {height:.0} for {} staves", self.staff_count());
        height
    }

    /// Distance from the system top to the bottom sentinel.
    pub fn height(&self) -> f64 {
        -self.bottom().y_rel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::positioner::PositionerGeometry;
    use crate::layout::spanning::SpanningType;
    use crate::model::StaffDef;
    use float_cmp::assert_approx_eq;
    use proptest::prelude::*;

    fn staff(n: u32, index: usize) -> StaffMetrics {
        StaffMetrics::new(&StaffDef::new(n), index, &Style::default())
    }

    fn system(count: u32) -> SystemAligner {
        let mut aligner = SystemAligner::new();
        for n in 1..=count {
            aligner.staff_alignment_at((n - 1) as usize, &staff(n, (n - 1) as usize));
        }
        aligner
    }

    #[test]
    fn bottom_sentinel_stays_last() {
        let aligner = system(3);
        assert_eq!(aligner.staff_count(), 3);
        assert!(aligner.bottom().staff().is_none());
        assert_eq!(aligner.staves()[2].staff().map(|s| s.n), Some(3));
        assert!(aligner.by_staff_n(2).is_some());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn gap_in_staff_slots_is_refused() {
        let mut aligner = system(1);
        assert!(aligner.staff_alignment_at(3, &staff(4, 3)).is_none());
    }

    #[test]
    fn default_spacing_without_overflow() {
        let style = Style::default();
        let mut aligner = system(2);
        aligner.set_alignment_y_pos(&style);
        aligner.integrate_y_shift();
        let spacing = style.spacing_staff * style.unit;
        let first = aligner.staves()[0].y_rel();
        let second = aligner.staves()[1].y_rel();
        assert_approx_eq!(f64, first, -spacing);
        assert_approx_eq!(f64, second - first, -(spacing + 720.0));
        assert_approx_eq!(f64, aligner.height(), 2.0 * (spacing + 720.0) + spacing);
    }

    #[test]
    fn overlapping_overflow_adds_the_excess() {
        let style = Style::default();
        let mut aligner = system(2);
        // 800 below the upper staff and 600 above the lower one, same x.
        aligner.staves_mut()[0].add_overflow_box(BoundingBox::new(0.0, -1520.0, 400.0, -700.0), 0.0);
        aligner.staves_mut()[1].add_overflow_box(BoundingBox::new(200.0, -400.0, 600.0, 600.0), 0.0);
        // A far-away box that must not count.
        aligner.staves_mut()[1].add_overflow_box(BoundingBox::new(5000.0, -400.0, 5400.0, 650.0), 0.0);

        aligner.calc_staff_overlap();
        let lower = &aligner.staves()[1];
        assert_approx_eq!(f64, lower.overflow_above(), 650.0);
        let expected = (800.0 + 600.0) - 800.0f64.max(650.0);
        assert_approx_eq!(f64, lower.overlap(), expected);

        aligner.set_alignment_y_pos(&style);
        let spacing = style.spacing_staff * style.unit;
        let shift = -aligner.staves()[1].y_shift();
        assert!(shift >= spacing + expected + style.margins.bottom.staff * style.unit);
        assert_approx_eq!(f64, shift, 800.0 + expected + 720.0);
    }

    #[test]
    fn verses_stack_without_max() {
        let style = Style::default();
        let mut aligner = system(2);
        aligner.staves_mut()[0].set_verse_count(2);
        aligner.staves_mut()[0].adjust_floating_positioners(FloatingClass::Syl, 90.0, 0.0, 500.0);
        aligner.staves_mut()[1].set_overflow_above(400.0);
        assert_approx_eq!(f64, aligner.staves()[0].overflow_below(), 1000.0);
        assert!(aligner.staves()[0].below_boxes().is_empty());

        aligner.set_alignment_y_pos(&style);
        assert_approx_eq!(f64, aligner.staves()[1].y_shift(), -(1000.0 + 400.0) - 720.0);
    }

    #[test]
    fn floating_text_is_pushed_below_a_slur() {
        let mut aligner = system(1);
        let staff = &mut aligner.staves_mut()[0];
        staff.add_overflow_box(BoundingBox::new(0.0, -1400.0, 1000.0, -800.0), 45.0);
        staff.set_positioner(FloatingPositioner::new(
            0,
            Some("d1".into()),
            FloatingClass::Dynam,
            SpanningType::StartEnd,
            Place::Below,
            PositionerGeometry::Text { x: 500.0, y: 0.0 },
            BoundingBox::new(500.0, -40.0, 800.0, 200.0),
        ));
        staff.adjust_floating_positioners(FloatingClass::Dynam, 90.0, 45.0, 0.0);

        let placed = staff.positioners()[0].bbox();
        assert_approx_eq!(f64, placed.y2, -1400.0 - 90.0);
        assert_approx_eq!(f64, staff.overflow_below(), -(placed.y1 + 720.0));
        assert!(staff.flags().dynam_below);
        assert_eq!(staff.below_boxes().len(), 2);
    }

    proptest! {
        #[test]
        fn accumulators_never_decrease(values in prop::collection::vec(-2000.0f64..2000.0, 1..30)) {
            let mut aligner = system(1);
            let staff = &mut aligner.staves_mut()[0];
            let mut last = (0.0, 0.0, 0.0, 0.0);
            for v in values {
                staff.set_overflow_above(v);
                staff.set_overflow_below(v);
                staff.set_overlap(v);
                staff.set_y_shift(v);
                prop_assert!(staff.overflow_above() >= last.0);
                prop_assert!(staff.overflow_below() >= last.1);
                prop_assert!(staff.overlap() >= last.2);
                prop_assert!(staff.y_shift() <= last.3);
                last = (staff.overflow_above(), staff.overflow_below(), staff.overlap(), staff.y_shift());
            }
        }
    }
}
