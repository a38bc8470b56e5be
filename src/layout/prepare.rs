//! Endpoint preparation: resolving what floating elements attach to.
//!
//! Runs after reset and before the horizontal pass, since timestamps
//! register slots of their own. Control events become [`Spanner`]s, tie
//! attributes are paired note to note and lyric syllables with a connector
//! are paired with the note where the connector ends.

use std::collections::HashMap;

use log::{debug, warn};

use super::aligner::TimestampId;
use super::elements::{DrawingElement, ElementKind, ElementRole};
use super::positioner::FloatingClass;
use super::MeasureFrame;
use crate::model::{ControlKind, CurveDir, HairpinForm, Measure, Place, Syl, SylConnector, TieMark};

// ═══════════════════════════════════════════════════════════════════════
// Endpoints
// ═══════════════════════════════════════════════════════════════════════

/// A drawing element: measure index in document order and element index
/// within the measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub measure: usize,
    pub element: usize,
}

/// Where a spanning element starts or ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Element(ElementRef),
    Timestamp { measure: usize, marker: TimestampId },
}

impl Endpoint {
    pub fn measure(self) -> usize {
        match self {
            Endpoint::Element(r) => r.measure,
            Endpoint::Timestamp { measure, .. } => measure,
        }
    }

    pub fn element(self) -> Option<ElementRef> {
        match self {
            Endpoint::Element(r) => Some(r),
            Endpoint::Timestamp { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpannerKind {
    Slur,
    Tie,
    Hairpin(HairpinForm),
    Dynam(String),
    Tempo(String),
    Dir(String),
}

impl SpannerKind {
    fn from_control(kind: &ControlKind) -> Self {
        match kind {
            ControlKind::Slur => SpannerKind::Slur,
            ControlKind::Tie => SpannerKind::Tie,
            ControlKind::Hairpin { form } => SpannerKind::Hairpin(*form),
            ControlKind::Dynam { text } => SpannerKind::Dynam(text.clone()),
            ControlKind::Tempo { text } => SpannerKind::Tempo(text.clone()),
            ControlKind::Dir { text } => SpannerKind::Dir(text.clone()),
        }
    }

    pub fn class(&self) -> FloatingClass {
        match self {
            SpannerKind::Slur => FloatingClass::Slur,
            SpannerKind::Tie => FloatingClass::Tie,
            SpannerKind::Hairpin(_) => FloatingClass::Hairpin,
            SpannerKind::Dynam(_) => FloatingClass::Dynam,
            SpannerKind::Tempo(_) => FloatingClass::Tempo,
            SpannerKind::Dir(_) => FloatingClass::Dir,
        }
    }

    /// Tempo marks and directives go above the staff, the rest below.
    pub fn default_place(&self) -> Place {
        match self {
            SpannerKind::Tempo(_) | SpannerKind::Dir(_) => Place::Above,
            _ => Place::Below,
        }
    }

    /// Whether the element is meaningless without an end point.
    fn needs_end(&self) -> bool {
        matches!(self, SpannerKind::Slur | SpannerKind::Tie | SpannerKind::Hairpin(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SpannerKind::Dynam(text) | SpannerKind::Tempo(text) | SpannerKind::Dir(text) => Some(text),
            _ => None,
        }
    }
}

/// A floating element with resolved endpoints. Text elements without an
/// end point end where they start.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanner {
    pub id: Option<String>,
    pub kind: SpannerKind,
    pub staves: Vec<u32>,
    pub layer_n: u32,
    pub start: Endpoint,
    pub end: Endpoint,
    pub place: Place,
    pub curve_dir: Option<CurveDir>,
    pub bulge: Option<f64>,
}

/// A dash or extender running from a syllable.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricConnector {
    pub syl_id: Option<String>,
    pub text: String,
    pub staff_n: u32,
    pub layer_n: u32,
    pub verse: u32,
    pub kind: SylConnector,
    pub start: ElementRef,
    pub end: ElementRef,
}

// ═══════════════════════════════════════════════════════════════════════
// Id resolution
// ═══════════════════════════════════════════════════════════════════════

/// Every element id with the places it occurs, in document order.
pub(crate) fn build_id_index(measures: &[MeasureFrame]) -> HashMap<String, Vec<ElementRef>> {
    let mut index: HashMap<String, Vec<ElementRef>> = HashMap::new();
    for (m, measure) in measures.iter().enumerate() {
        for (e, element) in measure.elements.iter().enumerate() {
            if let Some(id) = &element.id {
                index.entry(id.clone()).or_default().push(ElementRef { measure: m, element: e });
            }
        }
    }
    index
}

/// Resolve `id` as seen from measure `from`: the closest occurrence at or
/// before it, else the first one after it.
pub(crate) fn resolve_id(index: &HashMap<String, Vec<ElementRef>>, id: &str, from: usize) -> Option<ElementRef> {
    let refs = index.get(id)?;
    refs.iter()
        .rev()
        .find(|r| r.measure <= from)
        .or_else(|| refs.iter().find(|r| r.measure > from))
        .copied()
}

// ═══════════════════════════════════════════════════════════════════════
// Control events
// ═══════════════════════════════════════════════════════════════════════

/// Turn the control events of every measure into spanners. `measures` and
/// `frames` run in parallel, in document order. Events whose endpoints
/// cannot be found are logged and dropped.
pub(crate) fn prepare_control_events(
    measures: &[&Measure],
    frames: &mut [MeasureFrame],
    index: &HashMap<String, Vec<ElementRef>>,
) -> Vec<Spanner> {
    let mut spanners = Vec::new();
    let mut unmatched: Vec<String> = Vec::new();

    for (m, measure) in measures.iter().enumerate() {
        for event in &measure.control_events {
            let label = event.id.clone().unwrap_or_else(|| format!("<{} in measure {}>", event_name(&event.kind), m + 1));
            let kind = SpannerKind::from_control(&event.kind);

            let start = match (&event.start_id, event.tstamp) {
                (Some(id), _) => resolve_id(index, id, m).map(Endpoint::Element),
                (None, Some(tstamp)) => timestamp(frames, m, tstamp),
                (None, None) => None,
            };
            let Some(start) = start else {
                unmatched.push(label);
                continue;
            };

            let end = match (&event.end_id, event.tstamp2) {
                (Some(id), _) => resolve_id(index, id, start.measure()).map(Endpoint::Element),
                (None, Some(t2)) => timestamp(frames, m + t2.measures as usize, t2.beat),
                (None, None) => None,
            };
            let end = match end {
                Some(end) => end,
                None if !kind.needs_end() => start,
                None => {
                    unmatched.push(label);
                    continue;
                }
            };
            if end.measure() < start.measure() {
                warn!("{label} ends before it starts");
                unmatched.push(label);
                continue;
            }

            let start_element = start.element().map(|r| &frames[r.measure].elements[r.element]);
            let staves = if !event.staff.is_empty() {
                event.staff.clone()
            } else if let Some(e) = start_element {
                vec![e.staff_n]
            } else {
                warn!("{label} has neither a staff nor a start element");
                unmatched.push(label);
                continue;
            };
            let layer_n = event.layer.or_else(|| start_element.map(|e| e.layer_n)).unwrap_or(1);

            if let (Some(a), Some(b)) = (start_element, end.element().map(|r| &frames[r.measure].elements[r.element])) {
                if kind.needs_end() && (a.staff_n != b.staff_n || a.layer_n != b.layer_n) {
                    warn!("{label} connects different layers, using the start layer");
                }
            }

            spanners.push(Spanner {
                id: event.id.clone(),
                place: event.place.unwrap_or_else(|| kind.default_place()),
                kind,
                staves,
                layer_n,
                start,
                end,
                curve_dir: event.curve_dir,
                bulge: event.bulge,
            });
        }
    }

    if !unmatched.is_empty() {
        warn!("{} control events could not be matched", unmatched.len());
        for label in &unmatched {
            warn!("  unmatched: {label}");
        }
    }
    spanners
}

fn event_name(kind: &ControlKind) -> &'static str {
    match kind {
        ControlKind::Slur => "slur",
        ControlKind::Tie => "tie",
        ControlKind::Hairpin { .. } => "hairpin",
        ControlKind::Dynam { .. } => "dynam",
        ControlKind::Tempo { .. } => "tempo",
        ControlKind::Dir { .. } => "dir",
    }
}

/// The timestamp marker for `tstamp` in measure `m`, if that measure exists.
fn timestamp(frames: &mut [MeasureFrame], m: usize, tstamp: f64) -> Option<Endpoint> {
    let frame = frames.get_mut(m)?;
    if tstamp > frame.beats + 1.0 {
        warn!("Timestamp {tstamp} lies outside measure {}", m + 1);
    }
    let marker = frame.timestamps.timestamp_at(tstamp);
    Some(Endpoint::Timestamp { measure: m, marker })
}

// ═══════════════════════════════════════════════════════════════════════
// Attribute ties
// ═══════════════════════════════════════════════════════════════════════

/// Distinct (staff, layer) pairs of the layer content, in order of appearance.
fn layer_keys(frames: &[MeasureFrame]) -> Vec<(u32, u32)> {
    let mut keys = Vec::new();
    for e in frames.iter().flat_map(|f| f.elements.iter()) {
        let key = (e.staff_n, e.layer_n);
        if e.role == ElementRole::Content && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Elements of one layer across all measures, in reading order.
fn layer_stream(frames: &[MeasureFrame], staff_n: u32, layer_n: u32) -> impl Iterator<Item = (ElementRef, &DrawingElement)> {
    frames.iter().enumerate().flat_map(move |(m, frame)| {
        frame
            .elements
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.role == ElementRole::Content && e.staff_n == staff_n && e.layer_n == layer_n)
            .map(move |(i, e)| (ElementRef { measure: m, element: i }, e))
    })
}

/// Pair tie attributes note to note. An initial or medial tie is closed by
/// the next medial or terminal tie on the same staff position.
pub(crate) fn match_attribute_ties(frames: &[MeasureFrame]) -> Vec<Spanner> {
    let mut spanners = Vec::new();
    for (staff_n, layer_n) in layer_keys(frames) {
        let mut open: Vec<(i32, ElementRef)> = Vec::new();
        for (r, e) in layer_stream(frames, staff_n, layer_n) {
            let ElementKind::Note { loc, .. } = e.kind else {
                continue;
            };
            if matches!(e.tie, Some(TieMark::M | TieMark::T)) {
                match open.iter().position(|(l, _)| *l == loc) {
                    Some(i) => {
                        let (_, start) = open.remove(i);
                        spanners.push(Spanner {
                            id: None,
                            kind: SpannerKind::Tie,
                            staves: vec![staff_n],
                            layer_n,
                            start: Endpoint::Element(start),
                            end: Endpoint::Element(r),
                            place: Place::Below,
                            curve_dir: None,
                            bulge: None,
                        });
                    }
                    None => debug!("Tie end on {} has no start", e.id.as_deref().unwrap_or("<note>")),
                }
            }
            if matches!(e.tie, Some(TieMark::I | TieMark::M)) {
                open.push((loc, r));
            }
        }
        for (_, r) in open {
            let id = frames[r.measure].elements[r.element].id.as_deref().unwrap_or("<note>");
            warn!("Unresolved tie on {id} in measure {}", r.measure + 1);
        }
    }
    spanners
}

// ═══════════════════════════════════════════════════════════════════════
// Lyric connectors
// ═══════════════════════════════════════════════════════════════════════

/// The syllable of `verse` on a note or chord, chord tones included.
fn syllable<'a>(frame: &'a MeasureFrame, e: &'a DrawingElement, verse: u32) -> Option<&'a Syl> {
    if let Some(syl) = e.lyrics.iter().find(|s| s.n == verse) {
        return Some(syl);
    }
    match &e.kind {
        ElementKind::Chord { tones, .. } => tones
            .iter()
            .filter_map(|&t| frame.elements.get(t))
            .find_map(|tone| tone.lyrics.iter().find(|s| s.n == verse)),
        _ => None,
    }
}

/// Pair every syllable carrying a connector with the note the connector
/// ends at: the next syllable for dashes, the last note before it (or the
/// last note of the layer) for extenders.
pub(crate) fn match_lyric_connectors(frames: &[MeasureFrame]) -> Vec<LyricConnector> {
    let mut connectors = Vec::new();
    for (staff_n, layer_n) in layer_keys(frames) {
        let notes: Vec<(ElementRef, &DrawingElement)> = layer_stream(frames, staff_n, layer_n)
            .filter(|(_, e)| !e.grace && e.chord_parent().is_none() && (e.is_note() || e.is_chord()))
            .collect();

        let mut verses: Vec<u32> = Vec::new();
        for (r, e) in &notes {
            let frame = &frames[r.measure];
            let tones = match &e.kind {
                ElementKind::Chord { tones, .. } => tones.as_slice(),
                _ => &[],
            };
            let syls = e.lyrics.iter().chain(tones.iter().filter_map(|&t| frame.elements.get(t)).flat_map(|t| t.lyrics.iter()));
            for syl in syls {
                if !verses.contains(&syl.n) {
                    verses.push(syl.n);
                }
            }
        }

        for verse in verses {
            let mut pending: Option<(&Syl, ElementRef)> = None;
            let mut last_note: Option<ElementRef> = None;
            for (r, e) in &notes {
                if let Some(syl) = syllable(&frames[r.measure], e, verse) {
                    if let Some((from, start)) = pending.take() {
                        let end = match from.con {
                            Some(SylConnector::Underscore) => last_note.unwrap_or(start),
                            _ => *r,
                        };
                        connectors.push(connector(from, staff_n, layer_n, verse, start, end));
                    }
                    if syl.con.is_some() {
                        pending = Some((syl, *r));
                    }
                }
                last_note = Some(*r);
            }
            if let Some((from, start)) = pending {
                match from.con {
                    Some(SylConnector::Underscore) => {
                        let end = last_note.unwrap_or(start);
                        connectors.push(connector(from, staff_n, layer_n, verse, start, end));
                    }
                    _ => warn!("Dash after \"{}\" has no following syllable", from.text),
                }
            }
        }
    }
    connectors
}

fn connector(syl: &Syl, staff_n: u32, layer_n: u32, verse: u32, start: ElementRef, end: ElementRef) -> LyricConnector {
    LyricConnector {
        syl_id: syl.id.clone(),
        text: syl.text.clone(),
        staff_n,
        layer_n,
        verse,
        kind: syl.con.unwrap_or(SylConnector::Dash),
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::aligner::{MeasureAligner, TimestampAligner};
    use crate::layout::elements::{flatten_layer, LayerContext, StaffMetrics};
    use crate::model::{ControlEvent, Duration, Layer, LayerElement, MeasureBeat, Note, StaffDef};
    use crate::style::Style;
    use pretty_assertions::assert_eq;

    fn note(id: &str, loc: i32) -> Note {
        Note {
            id: Some(id.to_string()),
            loc,
            dur: Duration::Quarter,
            ..Note::default()
        }
    }

    fn tied(id: &str, loc: i32, tie: TieMark) -> Note {
        Note {
            tie: Some(tie),
            ..note(id, loc)
        }
    }

    fn sung(id: &str, text: &str, con: Option<SylConnector>) -> Note {
        Note {
            lyrics: vec![Syl {
                id: None,
                n: 1,
                text: text.to_string(),
                con,
                wordpos: None,
            }],
            ..note(id, 4)
        }
    }

    fn frame(notes: Vec<Note>) -> MeasureFrame {
        let style = Style::default();
        let staff = StaffMetrics::new(&StaffDef::new(1), 0, &style);
        let layer = Layer {
            n: 1,
            stem_dir: None,
            elements: notes.into_iter().map(LayerElement::Note).collect(),
        };
        let mut ctx = LayerContext::new(&staff, &layer, 0, 1, 1024.0);
        let mut elements = Vec::new();
        let end_time = flatten_layer(&layer, &mut ctx, &mut elements);
        MeasureFrame {
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
        }
    }

    #[test]
    fn ids_resolve_backward_first() {
        let frames = vec![frame(vec![note("a", 4)]), frame(vec![note("b", 4)]), frame(vec![note("a", 5)])];
        let index = build_id_index(&frames);
        assert_eq!(resolve_id(&index, "a", 1), Some(ElementRef { measure: 0, element: 0 }));
        assert_eq!(resolve_id(&index, "a", 2), Some(ElementRef { measure: 2, element: 0 }));
        assert_eq!(resolve_id(&index, "b", 0), Some(ElementRef { measure: 1, element: 0 }));
        assert_eq!(resolve_id(&index, "c", 0), None);
    }

    #[test]
    fn control_events_resolve_ids_and_timestamps() {
        let mut slur = ControlEvent::new(ControlKind::Slur);
        slur.start_id = Some("a".into());
        slur.end_id = Some("b".into());
        let mut hairpin = ControlEvent::new(ControlKind::Hairpin { form: HairpinForm::Cres });
        hairpin.staff = vec![1];
        hairpin.tstamp = Some(1.0);
        hairpin.tstamp2 = Some(MeasureBeat { measures: 1, beat: 3.0 });
        let mut lost = ControlEvent::new(ControlKind::Slur);
        lost.start_id = Some("a".into());
        lost.end_id = Some("missing".into());
        let mut dynam = ControlEvent::new(ControlKind::Dynam { text: "p".into() });
        dynam.start_id = Some("a".into());

        let first = Measure {
            control_events: vec![slur, hairpin, lost, dynam],
            ..Measure::default()
        };
        let second = Measure::default();
        let mut frames = vec![frame(vec![note("a", 4), note("x", 5)]), frame(vec![note("b", 6)])];
        let index = build_id_index(&frames);
        let spanners = prepare_control_events(&[&first, &second], &mut frames, &index);

        assert_eq!(spanners.len(), 3);
        assert_eq!(spanners[0].kind, SpannerKind::Slur);
        assert_eq!(spanners[0].end, Endpoint::Element(ElementRef { measure: 1, element: 0 }));
        assert_eq!(spanners[0].staves, vec![1]);
        assert_eq!(spanners[0].place, Place::Below);

        assert!(matches!(spanners[1].start, Endpoint::Timestamp { measure: 0, .. }));
        assert!(matches!(spanners[1].end, Endpoint::Timestamp { measure: 1, .. }));
        assert_eq!(frames[0].timestamps.len(), 1);
        assert_eq!(frames[1].timestamps.iter().next().map(|t| t.time), Some(2.0));

        assert_eq!(spanners[2].kind, SpannerKind::Dynam("p".into()));
        assert_eq!(spanners[2].end, spanners[2].start);
    }

    #[test]
    fn end_id_resolves_from_the_start_measure() {
        // "b" occurs twice; the closest one at or before the start wins.
        let mut slur = ControlEvent::new(ControlKind::Slur);
        slur.start_id = Some("s".into());
        slur.end_id = Some("b".into());
        let first = Measure {
            control_events: vec![slur],
            ..Measure::default()
        };
        let (second, third) = (Measure::default(), Measure::default());
        let mut frames = vec![
            frame(vec![note("a", 4), note("b", 4)]),
            frame(vec![]),
            frame(vec![note("s", 4), note("b", 5)]),
        ];
        let index = build_id_index(&frames);
        let spanners = prepare_control_events(&[&first, &second, &third], &mut frames, &index);

        assert_eq!(spanners.len(), 1);
        assert_eq!(spanners[0].start, Endpoint::Element(ElementRef { measure: 2, element: 0 }));
        assert_eq!(spanners[0].end, Endpoint::Element(ElementRef { measure: 2, element: 1 }));
    }

    #[test]
    fn ties_pair_by_staff_position_across_measures() {
        let frames = vec![
            frame(vec![tied("a", 4, TieMark::I), tied("b", 6, TieMark::I), note("c", 2)]),
            frame(vec![tied("d", 6, TieMark::T), tied("e", 4, TieMark::M)]),
            frame(vec![tied("f", 4, TieMark::T), tied("g", 3, TieMark::I)]),
        ];
        let ties = match_attribute_ties(&frames);
        let pairs: Vec<(ElementRef, ElementRef)> = ties
            .iter()
            .map(|t| (t.start.element().unwrap(), t.end.element().unwrap()))
            .collect();
        let at = |measure, element| ElementRef { measure, element };
        assert_eq!(pairs, vec![(at(0, 1), at(1, 0)), (at(0, 0), at(1, 1)), (at(1, 1), at(2, 0))]);
        assert!(ties.iter().all(|t| t.kind == SpannerKind::Tie));
    }

    #[test]
    fn dashes_end_at_the_next_syllable_and_extenders_before_it() {
        let frames = vec![
            frame(vec![
                sung("a", "Glo", Some(SylConnector::Dash)),
                note("b", 4),
                sung("c", "ri", Some(SylConnector::Dash)),
                sung("d", "a", Some(SylConnector::Underscore)),
            ]),
            frame(vec![note("e", 4), note("f", 4), sung("g", "in", None), note("h", 4)]),
        ];
        let connectors = match_lyric_connectors(&frames);
        let at = |measure, element| ElementRef { measure, element };
        let spans: Vec<(&str, SylConnector, ElementRef, ElementRef)> = connectors
            .iter()
            .map(|c| (c.text.as_str(), c.kind, c.start, c.end))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("Glo", SylConnector::Dash, at(0, 0), at(0, 2)),
                ("ri", SylConnector::Dash, at(0, 2), at(0, 3)),
                ("a", SylConnector::Underscore, at(0, 3), at(1, 1)),
            ]
        );
    }

    #[test]
    fn trailing_extender_runs_to_the_last_note() {
        let frames = vec![frame(vec![sung("a", "Amen", Some(SylConnector::Underscore)), note("b", 4), note("c", 4)])];
        let connectors = match_lyric_connectors(&frames);
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].end, ElementRef { measure: 0, element: 2 });
    }
}
