//! Alignment slots: the horizontal time axis of a measure.
//!
//! A [`MeasureAligner`] keeps its [`Alignment`]s in an arena so that the ids
//! handed to layer elements stay valid while new slots are inserted. The
//! reading order lives in a separate index vector kept sorted by
//! `(time, type)`.

use serde::Serialize;

use super::constants::{MEASURE_START_TIME, TIME_EPSILON};

/// Kind of a slot. The declaration order is the tie-break rank between
/// slots at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlignmentType {
    MeasureStart,
    Barline,
    ClefAttr,
    KeysigAttr,
    MensurAttr,
    MetersigAttr,
    Clef,
    Keysig,
    Mensur,
    Metersig,
    Dot,
    GraceNote,
    Container,
    FullMeasure,
    FullMeasure2,
    Accid,
    Default,
    MeasureEnd,
}

impl AlignmentType {
    /// Clef, key, mensuration and meter drawn as system-start attributes,
    /// together with everything ranked before them.
    pub fn is_non_justifiable(self) -> bool {
        self <= AlignmentType::MetersigAttr
    }

    /// Attribute slots keep their position when a measure is justified.
    pub fn is_attribute(self) -> bool {
        (AlignmentType::ClefAttr..=AlignmentType::MetersigAttr).contains(&self)
    }
}

pub type AlignmentId = usize;

/// Two times that identify the same slot.
pub(crate) fn are_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < TIME_EPSILON
}

// ═══════════════════════════════════════════════════════════════════════
// Alignment
// ═══════════════════════════════════════════════════════════════════════

/// One horizontal time slot of a measure.
#[derive(Debug, Clone)]
pub struct Alignment {
    time: f64,
    kind: AlignmentType,
    x_rel: f64,
    x_shift: f64,
    max_width: f64,
    grace_aligner: Option<Box<GraceAligner>>,
}

impl Alignment {
    pub fn new(time: f64, kind: AlignmentType) -> Self {
        Self {
            time,
            kind,
            x_rel: 0.0,
            x_shift: 0.0,
            max_width: 0.0,
            grace_aligner: None,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn kind(&self) -> AlignmentType {
        self.kind
    }

    pub fn x_rel(&self) -> f64 {
        self.x_rel
    }

    pub fn set_x_rel(&mut self, x_rel: f64) {
        self.x_rel = x_rel;
    }

    pub fn x_shift(&self) -> f64 {
        self.x_shift
    }

    /// Keep the largest shift requested during the pass.
    pub fn set_x_shift(&mut self, x_shift: f64) {
        if x_shift > self.x_shift {
            self.x_shift = x_shift;
        }
    }

    pub fn max_width(&self) -> f64 {
        self.max_width
    }

    /// Keep the largest width requested during the pass.
    pub fn set_max_width(&mut self, max_width: f64) {
        if max_width > self.max_width {
            self.max_width = max_width;
        }
    }

    /// Fold the pending shift into `x_rel` after `shift` accumulated from
    /// the previous slots, and return the new accumulated shift.
    fn integrate_x_shift(&mut self, shift: f64) -> f64 {
        self.x_rel += self.x_shift + shift;
        let shift = shift + self.x_shift;
        self.x_shift = 0.0;
        shift
    }

    pub fn grace_aligner(&self) -> Option<&GraceAligner> {
        self.grace_aligner.as_deref()
    }

    /// The grace aligner of this slot, created on first use.
    pub fn grace_aligner_mut(&mut self) -> &mut GraceAligner {
        self.grace_aligner.get_or_insert_with(Box::default)
    }

    pub(crate) fn grace_aligner_opt_mut(&mut self) -> Option<&mut GraceAligner> {
        self.grace_aligner.as_deref_mut()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// MeasureAligner
// ═══════════════════════════════════════════════════════════════════════

/// The ordered slots of one measure.
#[derive(Debug, Clone)]
pub struct MeasureAligner {
    alignments: Vec<Alignment>,
    order: Vec<AlignmentId>,
    left: Option<AlignmentId>,
    right: Option<AlignmentId>,
    non_justifiable_margin: f64,
}

impl Default for MeasureAligner {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasureAligner {
    /// A measure aligner with its measure-start and measure-end slots.
    pub fn new() -> Self {
        let mut aligner = Self::without_sentinels();
        let left = aligner.push(Alignment::new(MEASURE_START_TIME, AlignmentType::MeasureStart), None);
        let right = aligner.push(Alignment::new(0.0, AlignmentType::MeasureEnd), None);
        aligner.left = Some(left);
        aligner.right = Some(right);
        aligner
    }

    /// An aligner without measure-start or measure-end, as used for grace notes.
    pub fn without_sentinels() -> Self {
        Self {
            alignments: Vec::new(),
            order: Vec::new(),
            left: None,
            right: None,
            non_justifiable_margin: 0.0,
        }
    }

    fn push(&mut self, alignment: Alignment, index: Option<usize>) -> AlignmentId {
        let id = self.alignments.len();
        self.alignments.push(alignment);
        match index {
            Some(i) => self.order.insert(i, id),
            None => self.order.push(id),
        }
        id
    }

    /// Find the slot for `(time, kind)` or insert a new one at its sorted
    /// position. The measure-end slot always stays last.
    pub fn alignment_at_time(&mut self, time: f64, kind: AlignmentType) -> AlignmentId {
        let mut index = None;
        for (i, &id) in self.order.iter().enumerate() {
            let alignment = &self.alignments[id];
            if are_equal(alignment.time, time) {
                if alignment.kind == kind {
                    return id;
                } else if alignment.kind > kind {
                    index = Some(i);
                    break;
                }
            }
            if alignment.time > time && !are_equal(alignment.time, time) {
                index = Some(i);
                break;
            }
        }
        let index = index.unwrap_or(match self.right {
            Some(_) => self.order.len().saturating_sub(1),
            None => self.order.len(),
        });
        self.push(Alignment::new(time, kind), Some(index))
    }

    /// Extend the measure-end time to at least `time`.
    pub fn set_max_time(&mut self, time: f64) {
        if let Some(right) = self.right {
            let end = &mut self.alignments[right];
            if end.time < time {
                end.time = time;
            }
        }
    }

    pub fn get(&self, id: AlignmentId) -> &Alignment {
        &self.alignments[id]
    }

    pub fn get_mut(&mut self, id: AlignmentId) -> &mut Alignment {
        &mut self.alignments[id]
    }

    /// Slot ids in reading order.
    pub fn ids(&self) -> &[AlignmentId] {
        &self.order
    }

    /// Slots in reading order.
    pub fn iter(&self) -> impl Iterator<Item = &Alignment> {
        self.order.iter().map(move |&id| &self.alignments[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn left(&self) -> Option<AlignmentId> {
        self.left
    }

    pub fn right(&self) -> Option<AlignmentId> {
        self.right
    }

    /// First slot of the given kind in reading order.
    pub fn first_of_kind(&self, kind: AlignmentType) -> Option<AlignmentId> {
        self.order
            .iter()
            .copied()
            .find(|&id| self.alignments[id].kind == kind)
    }

    pub fn last(&self) -> Option<AlignmentId> {
        self.order.last().copied()
    }

    /// Width of the measure: position of the end slot plus its width.
    pub fn width(&self) -> f64 {
        self.right
            .map(|id| {
                let end = &self.alignments[id];
                end.x_rel + end.max_width
            })
            .unwrap_or(0.0)
    }

    pub fn non_justifiable_margin(&self) -> f64 {
        self.non_justifiable_margin
    }

    pub fn set_non_justifiable_margin(&mut self, margin: f64) {
        self.non_justifiable_margin = margin;
    }

    /// Fold the collision shifts of all slots into their positions.
    ///
    /// `left_position` is the padding of the measure start and
    /// `min_measure_width` the minimal width of the justifiable content.
    pub fn integrate_x_shift(&mut self, left_position: f64, min_measure_width: f64) {
        let mut shift = left_position;
        let mut justifiable_shift: Option<f64> = None;
        let mut min_width = min_measure_width;

        for i in 0..self.order.len() {
            let id = self.order[i];
            let alignment = &mut self.alignments[id];
            shift = alignment.integrate_x_shift(shift);
            let kind = alignment.kind;
            let edge = alignment.x_rel + alignment.max_width;

            if justifiable_shift.is_none() {
                if kind.is_non_justifiable() {
                    self.non_justifiable_margin = edge;
                } else {
                    justifiable_shift = Some(self.non_justifiable_margin);
                }
            }

            let alignment = &mut self.alignments[id];
            match kind {
                AlignmentType::FullMeasure2 => min_width *= 2.0,
                AlignmentType::MeasureEnd => {
                    let floor = min_width + justifiable_shift.unwrap_or(self.non_justifiable_margin);
                    alignment.x_rel = alignment.x_rel.max(floor);
                }
                _ => {}
            }
        }
    }

    /// Clear positions and shifts before a new horizontal pass.
    pub fn reset_positions(&mut self) {
        for alignment in &mut self.alignments {
            alignment.x_rel = 0.0;
            alignment.x_shift = 0.0;
            alignment.max_width = 0.0;
        }
        self.non_justifiable_margin = 0.0;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// GraceAligner
// ═══════════════════════════════════════════════════════════════════════

/// A grace note waiting to be aligned: drawing element index and duration.
#[derive(Debug, Clone, Copy)]
struct StackedNote {
    element: usize,
    duration: f64,
}

/// Slots of a grace-note cluster, aligned right to left from the beat the
/// cluster leads into.
#[derive(Debug, Clone)]
pub struct GraceAligner {
    aligner: MeasureAligner,
    stack: Vec<StackedNote>,
    width: f64,
}

impl Default for GraceAligner {
    fn default() -> Self {
        Self {
            aligner: MeasureAligner::without_sentinels(),
            stack: Vec::new(),
            width: 0.0,
        }
    }
}

impl GraceAligner {
    /// Add a grace note in reading order.
    pub fn stack_note(&mut self, element: usize, duration: f64) {
        self.stack.push(StackedNote { element, duration });
    }

    /// Give every stacked note a slot. The last note read sits at time 0
    /// and each earlier note recedes by the durations that follow it.
    /// Returns `(element, slot)` pairs and empties the stack.
    pub fn align_stack(&mut self) -> Vec<(usize, AlignmentId)> {
        let mut time = 0.0;
        let mut assigned = Vec::with_capacity(self.stack.len());
        for note in self.stack.drain(..).rev() {
            let id = self.aligner.alignment_at_time(time, AlignmentType::Default);
            assigned.push((note.element, id));
            time -= note.duration;
        }
        assigned.reverse();
        assigned
    }

    pub fn aligner(&self) -> &MeasureAligner {
        &self.aligner
    }

    pub fn aligner_mut(&mut self) -> &mut MeasureAligner {
        &mut self.aligner
    }

    /// Total width of the cluster.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Accumulate the shifts of the cluster slots left to right and set
    /// the total width from the last slot.
    pub fn integrate_x_shift(&mut self) {
        let mut shift = 0.0;
        for &id in &self.aligner.order {
            let alignment = &mut self.aligner.alignments[id];
            alignment.x_rel = alignment.x_shift + shift;
            shift += alignment.x_shift;
            alignment.x_shift = 0.0;
        }
        if let Some(last) = self.aligner.last() {
            let last = self.aligner.get(last);
            self.width = last.x_rel + last.max_width;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TimestampAligner
// ═══════════════════════════════════════════════════════════════════════

pub type TimestampId = usize;

/// A synthetic time marker created for a `tstamp` value.
#[derive(Debug, Clone)]
pub struct Timestamp {
    /// Normalized time: `tstamp - 1.0`, in beats
    pub time: f64,
    /// Slot of the marker in the measure aligner
    pub slot: Option<AlignmentId>,
}

/// Deduplicated timestamps of one measure, sorted by time.
#[derive(Debug, Clone, Default)]
pub struct TimestampAligner {
    markers: Vec<Timestamp>,
    order: Vec<TimestampId>,
}

impl TimestampAligner {
    /// Find or create the marker for a timestamp given in beats, where
    /// values below 1.0 fall before the first beat.
    pub fn timestamp_at(&mut self, tstamp: f64) -> TimestampId {
        let time = tstamp - 1.0;
        let mut index = self.order.len();
        for (i, &id) in self.order.iter().enumerate() {
            let marker_time = self.markers[id].time;
            if are_equal(marker_time, time) {
                return id;
            }
            if marker_time > time {
                index = i;
                break;
            }
        }
        let id = self.markers.len();
        self.markers.push(Timestamp { time, slot: None });
        self.order.insert(index, id);
        id
    }

    pub fn get(&self, id: TimestampId) -> &Timestamp {
        &self.markers[id]
    }

    pub fn get_mut(&mut self, id: TimestampId) -> &mut Timestamp {
        &mut self.markers[id]
    }

    /// Markers in time order.
    pub fn iter(&self) -> impl Iterator<Item = &Timestamp> {
        self.order.iter().map(move |&id| &self.markers[id])
    }

    pub fn ids(&self) -> &[TimestampId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
