//! Split-element spanning: which part of a spanning element a system draws.

use serde::Serialize;

use super::aligner::{AlignmentType, MeasureAligner};

/// Part of a spanning element drawn in one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpanningType {
    /// Start and end are both in the system.
    StartEnd,
    /// Only the start; the element runs to the system end.
    Start,
    /// Only the end; the element comes from the system start.
    End,
    /// Neither; the element crosses the whole system.
    Middle,
}

impl SpanningType {
    /// Spanning case of an element running from `start_system` to
    /// `end_system` when drawn in `system`. `None` outside that range.
    pub fn for_system(start_system: usize, end_system: usize, system: usize) -> Option<Self> {
        if system < start_system || system > end_system {
            return None;
        }
        Some(match (system == start_system, system == end_system) {
            (true, true) => SpanningType::StartEnd,
            (true, false) => SpanningType::Start,
            (false, true) => SpanningType::End,
            (false, false) => SpanningType::Middle,
        })
    }

    pub fn has_start(self) -> bool {
        matches!(self, SpanningType::StartEnd | SpanningType::Start)
    }

    pub fn has_end(self) -> bool {
        matches!(self, SpanningType::StartEnd | SpanningType::End)
    }
}

/// A measure of a system with its position.
pub(crate) struct PlacedMeasure<'a> {
    pub x: f64,
    pub aligner: &'a MeasureAligner,
}

/// Left edge of a system's content for elements coming from an earlier
/// system: the first default slot of the first measure minus a lead-in of
/// two staff spaces.
pub(crate) fn system_content_start(first: &PlacedMeasure<'_>, double_unit: f64) -> f64 {
    match first.aligner.first_of_kind(AlignmentType::Default) {
        Some(id) => first.x + first.aligner.get(id).x_rel() - 2.0 * double_unit,
        None => first.x,
    }
}

/// Right edge of a system's content for elements continuing to a later
/// system: the right barline of the last measure.
pub(crate) fn system_content_end(last: &PlacedMeasure<'_>) -> f64 {
    match last.aligner.right() {
        Some(id) => last.x + last.aligner.get(id).x_rel(),
        None => last.x,
    }
}

/// Horizontal extent of one instance of a spanning element. Missing
/// endpoints are replaced by the system edges.
pub(crate) fn span_extent(
    spanning: SpanningType,
    start_x: f64,
    end_x: f64,
    first: &PlacedMeasure<'_>,
    last: &PlacedMeasure<'_>,
    double_unit: f64,
) -> (f64, f64) {
    match spanning {
        SpanningType::StartEnd => (start_x, end_x),
        SpanningType::Start => (start_x, system_content_end(last)),
        SpanningType::End => (system_content_start(first, double_unit), end_x),
        SpanningType::Middle => (
            system_content_start(first, double_unit),
            system_content_end(last),
        ),
    }
}
