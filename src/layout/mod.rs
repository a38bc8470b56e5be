//! Layout engine: turns a score tree into positioned slots, staves and
//! floating elements.
//!
//! The engine runs a fixed sequence of passes over a [`ScoreLayout`]:
//!
//! 1. **reset**: flatten the tree into drawing elements per measure and
//!    rebuild every aligner
//! 2. **prepare**: resolve control-event endpoints, attribute ties and
//!    lyric connectors
//! 3. **horizontal**: slots, ideal spacing, collision shift, measure
//!    alignment
//! 4. **justify**: stretch every system to the page width
//! 5. **vertical**: overflow, floating elements, staff and system stacking
//!
//! Later passes read state left by earlier ones, so the order is fixed.
//! Running the sequence twice gives the same result.

pub mod aligner;
mod cast_off;
pub(crate) mod constants;
pub mod device;
pub mod elements;
pub mod geometry;
pub mod hairpins;
pub mod horizontal;
pub mod justify;
pub mod lyrics;
pub mod positioner;
pub mod prepare;
pub mod slurs;
pub mod spanning;
pub mod system_aligner;
mod vertical;

use std::ops::Range;

use log::{debug, warn};
use serde::Serialize;

use self::aligner::{Alignment, AlignmentType, MeasureAligner, TimestampAligner};
use self::constants::{DUR_1, DUR_MAX};
use self::device::{BBoxDevice, MeasureMode, MeasurementDevice};
use self::elements::{flatten_layer, DrawingElement, ElementKind, ElementRole, LayerContext, StaffMetrics};
use self::geometry::{BoundingBox, Point};
use self::lyrics::connector_segments;
use self::positioner::{FloatingClass, FloatingPositioner, PositionerGeometry};
use self::prepare::{LyricConnector, Spanner};
use self::spanning::{span_extent, SpanningType};
use self::system_aligner::{StaffAlignment, SystemAligner};
use crate::error::{LayoutError, Result};
use crate::metrics::GlyphMetrics;
use crate::model::{Clef, CurveDir, Document, KeySig, Measure, Mensur, MeterSig, Place, ScoreDef, SylConnector};
use crate::style::Style;

pub(crate) use self::cast_off::cast_off;

// ═══════════════════════════════════════════════════════════════════════
// Working state
// ═══════════════════════════════════════════════════════════════════════

/// One measure while it is laid out.
#[derive(Debug, Clone)]
pub(crate) struct MeasureFrame {
    pub id: Option<String>,
    pub n: Option<u32>,
    /// Index of the system the measure is drawn in
    pub system: usize,
    pub aligner: MeasureAligner,
    pub timestamps: TimestampAligner,
    pub elements: Vec<DrawingElement>,
    /// System-relative x of the measure start
    pub x: f64,
    /// Alignment duration of one beat of the meter
    pub beat_duration: f64,
    pub beats: f64,
    /// Time at which the measure content ends
    pub end_time: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct SystemFrame {
    pub measures: Range<usize>,
    pub aligner: SystemAligner,
    pub labels_width: f64,
    /// Right edge of the last measure
    pub width: f64,
    /// Top of the system on the page
    pub y: f64,
    pub justification_ratio: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct PageFrame {
    pub systems: Range<usize>,
}

/// Clef, key, meter and mensuration in effect on a staff.
#[derive(Debug, Clone, Default)]
struct StaffAttributes {
    clef: Option<Clef>,
    key: Option<KeySig>,
    meter: Option<MeterSig>,
    mensur: Option<Mensur>,
}

/// Attributes changed by a measure's score definition.
#[derive(Debug, Clone, Copy, Default)]
struct AttributeChanges {
    clef: bool,
    key: bool,
    meter: bool,
    mensur: bool,
}

impl StaffAttributes {
    fn initial(doc: &Document, n: u32) -> Self {
        let def = doc.staff_def(n);
        Self {
            clef: def.and_then(|d| d.clef.clone()),
            key: def.and_then(|d| d.key_sig.clone()).or_else(|| doc.score_def.key_sig.clone()),
            meter: def.and_then(|d| d.meter_sig.clone()).or_else(|| doc.score_def.meter_sig.clone()),
            mensur: doc.score_def.mensur.clone(),
        }
    }

    /// Apply a score definition change. Staff-level values win over
    /// score-level ones.
    fn apply(&mut self, n: u32, change: &ScoreDef) -> AttributeChanges {
        let mut changes = AttributeChanges::default();
        if let Some(key) = &change.key_sig {
            self.key = Some(key.clone());
            changes.key = true;
        }
        if let Some(meter) = &change.meter_sig {
            self.meter = Some(meter.clone());
            changes.meter = true;
        }
        if let Some(mensur) = &change.mensur {
            self.mensur = Some(mensur.clone());
            changes.mensur = true;
        }
        if let Some(def) = change.staff_defs.iter().find(|d| d.n == n) {
            if let Some(clef) = &def.clef {
                self.clef = Some(clef.clone());
                changes.clef = true;
            }
            if let Some(key) = &def.key_sig {
                self.key = Some(key.clone());
                changes.key = true;
            }
            if let Some(meter) = &def.meter_sig {
                self.meter = Some(meter.clone());
                changes.meter = true;
            }
        }
        changes
    }
}

/// The whole document while it is laid out.
pub(crate) struct ScoreLayout<'a> {
    doc: &'a Document,
    style: &'a Style,
    device: BBoxDevice<'a>,
    staves: Vec<StaffMetrics>,
    measures: Vec<MeasureFrame>,
    systems: Vec<SystemFrame>,
    pages: Vec<PageFrame>,
    spanners: Vec<Spanner>,
    connectors: Vec<LyricConnector>,
    /// Duration code of the longest note or rest in the document
    longest_dur: i32,
}

impl<'a> ScoreLayout<'a> {
    pub fn new(doc: &'a Document, style: &'a Style, metrics: &'a dyn GlyphMetrics) -> Result<Self> {
        if doc.score_def.staff_defs.is_empty() && doc.measures().any(|m| !m.staves.is_empty()) {
            return Err(LayoutError::EmptyStaffDefinition);
        }
        let staves = doc
            .score_def
            .staff_defs
            .iter()
            .enumerate()
            .map(|(i, def)| StaffMetrics::new(def, i, style))
            .collect();
        Ok(Self {
            doc,
            style,
            device: BBoxDevice::new(metrics, style),
            staves,
            measures: Vec::new(),
            systems: Vec::new(),
            pages: Vec::new(),
            spanners: Vec::new(),
            connectors: Vec::new(),
            longest_dur: DUR_1,
        })
    }

    /// Run every pass and collect the result.
    pub fn run(&mut self) -> LayoutResult {
        self.reset();
        self.prepare();
        self.lay_out_horizontally();
        self.justify();
        vertical::lay_out_vertically(self);
        self.output()
    }

    // ── Reset ──────────────────────────────────────────────────────────

    /// Room reserved for staff labels before the first system, or before
    /// later systems when `abbreviated`.
    fn labels_width(&self, abbreviated: bool) -> f64 {
        labels_width(self.doc, &self.device, self.style, abbreviated)
    }

    /// Rebuild every measure frame from the tree.
    fn reset(&mut self) {
        self.measures.clear();
        self.systems.clear();
        self.pages.clear();
        self.spanners.clear();
        self.connectors.clear();

        let doc = self.doc;
        let mut running: Vec<StaffAttributes> = self
            .staves
            .iter()
            .map(|staff| StaffAttributes::initial(doc, staff.n))
            .collect();

        for page in &doc.pages {
            let first_system = self.systems.len();
            for system in &page.systems {
                let s = self.systems.len();
                let start = self.measures.len();
                for (i, measure) in system.measures.iter().enumerate() {
                    let changes: Vec<AttributeChanges> = match &measure.score_def {
                        Some(def) => running
                            .iter_mut()
                            .zip(&self.staves)
                            .map(|(attrs, staff)| attrs.apply(staff.n, def))
                            .collect(),
                        None => vec![AttributeChanges::default(); self.staves.len()],
                    };
                    let first = start + i == 0;
                    let frame = self.reset_measure(measure, s, i == 0, first, &running, &changes);
                    self.measures.push(frame);
                }
                self.systems.push(SystemFrame {
                    measures: start..self.measures.len(),
                    aligner: SystemAligner::new(),
                    labels_width: 0.0,
                    width: 0.0,
                    y: 0.0,
                    justification_ratio: 1.0,
                    height: 0.0,
                });
            }
            self.pages.push(PageFrame {
                systems: first_system..self.systems.len(),
            });
        }

        let (full, abbreviated) = (self.labels_width(false), self.labels_width(true));
        for (s, system) in self.systems.iter_mut().enumerate() {
            system.labels_width = if s == 0 { full } else { abbreviated };
        }
        self.longest_dur = self
            .measures
            .iter()
            .flat_map(|m| &m.elements)
            .filter(|e| e.chord_parent().is_none() && matches!(e.kind, ElementKind::Note { .. } | ElementKind::Chord { .. } | ElementKind::Rest { .. }))
            .map(|e| e.dur.actual_dur())
            .min()
            .unwrap_or(DUR_1);
        debug!(
            "Reset {} pages, {} systems, {} measures",
            self.pages.len(),
            self.systems.len(),
            self.measures.len()
        );
    }

    fn reset_measure(
        &self,
        measure: &Measure,
        system: usize,
        system_start: bool,
        first: bool,
        running: &[StaffAttributes],
        changes: &[AttributeChanges],
    ) -> MeasureFrame {
        let meter = running.first().and_then(|a| a.meter.as_ref());
        let (count, unit) = meter.map_or((4, 4), |m| (m.count.max(1), m.unit.max(1)));
        let beat_duration = DUR_MAX / f64::from(unit);
        let measure_duration = f64::from(count) * beat_duration;

        for staff in &measure.staves {
            if !self.staves.iter().any(|s| s.n == staff.n) {
                warn!(
                    "Measure {} has staff {}, which is missing from the score definition",
                    measure.n.map_or_else(|| "?".to_string(), |n| n.to_string()),
                    staff.n
                );
            }
        }

        let mut elements = Vec::new();
        let mut end_time: Option<f64> = None;
        for (i, staff) in self.staves.iter().enumerate() {
            let attrs = &running[i];
            let changed = changes.get(i).copied().unwrap_or_default();

            if system_start || changed.clef {
                if let Some(clef) = &attrs.clef {
                    let kind = ElementKind::Clef { shape: clef.shape, line: clef.line };
                    let mut e = DrawingElement::attribute(kind, staff);
                    e.id = clef.id.clone();
                    elements.push(e);
                }
            }
            if let Some(key) = &attrs.key {
                if (system_start && key.fifths != 0) || changed.key {
                    let mut e = DrawingElement::attribute(ElementKind::KeySig { fifths: key.fifths }, staff);
                    e.id = key.id.clone();
                    elements.push(e);
                }
            }
            if let Some(mensur) = &attrs.mensur {
                if first || changed.mensur {
                    let mut e = DrawingElement::attribute(ElementKind::Mensur, staff);
                    e.id = mensur.id.clone();
                    elements.push(e);
                }
            }
            if let Some(meter) = &attrs.meter {
                if first || changed.meter {
                    let kind = ElementKind::MeterSig {
                        count: meter.count,
                        unit: meter.unit,
                        symbol: meter.symbol,
                    };
                    let mut e = DrawingElement::attribute(kind, staff);
                    e.id = meter.id.clone();
                    elements.push(e);
                }
            }
            if let Some(rend) = measure.left_barline {
                elements.push(DrawingElement::barline(rend, ElementRole::LeftBarline, staff));
            }

            if let Some(content) = measure.staves.iter().find(|s| s.n == staff.n) {
                let layer_count = content.layers.len();
                for (index, layer) in content.layers.iter().enumerate() {
                    let mut ctx = LayerContext::new(staff, layer, index, layer_count, measure_duration);
                    let end = flatten_layer(layer, &mut ctx, &mut elements);
                    end_time = Some(end_time.map_or(end, |t| t.max(end)));
                }
            }
            elements.push(DrawingElement::barline(measure.right_barline, ElementRole::RightBarline, staff));
        }

        MeasureFrame {
            id: measure.id.clone(),
            n: measure.n,
            system,
            aligner: MeasureAligner::new(),
            timestamps: TimestampAligner::default(),
            elements,
            x: 0.0,
            beat_duration,
            beats: f64::from(count),
            end_time: end_time.unwrap_or(measure_duration),
        }
    }

    // ── Prepare ────────────────────────────────────────────────────────

    fn prepare(&mut self) {
        let index = prepare::build_id_index(&self.measures);
        let measures: Vec<&Measure> = self.doc.measures().collect();
        let mut spanners = prepare::prepare_control_events(&measures, &mut self.measures, &index);
        spanners.extend(prepare::match_attribute_ties(&self.measures));
        self.spanners = spanners;
        self.connectors = prepare::match_lyric_connectors(&self.measures);
        debug!(
            "Prepared {} floating elements and {} lyric connectors",
            self.spanners.len(),
            self.connectors.len()
        );
    }

    // ── Horizontal ─────────────────────────────────────────────────────

    fn lay_out_horizontally(&mut self) {
        let style = self.style;
        for measure in &mut self.measures {
            horizontal::align_horizontally(measure);
            horizontal::set_alignment_x_pos(&mut measure.aligner, self.longest_dur, style);
            horizontal::set_bounding_boxes(&mut measure.elements, &self.staves, &self.device, MeasureMode::HorizontalOnly);
            horizontal::adjust_grace_x_pos(measure, &self.staves, style);
            horizontal::adjust_x_pos(measure, &self.staves, style);
            horizontal::integrate_x_shift(&mut measure.aligner, style);
            horizontal::set_element_x(measure);
        }
        for system in &mut self.systems {
            system.width = horizontal::align_measures(&mut self.measures[system.measures.clone()], system.labels_width);
        }
    }

    // ── Justification ──────────────────────────────────────────────────

    fn justify(&mut self) {
        if !self.style.justify {
            return;
        }
        let count = self.systems.len();
        let available = self.style.system_width();
        for (s, system) in self.systems.iter_mut().enumerate() {
            let labels = system.labels_width;
            let frames = &mut self.measures[system.measures.clone()];
            system.justification_ratio = justify::justify_system(frames, labels, available - labels, s + 1 == count);
            for frame in frames.iter_mut() {
                horizontal::set_element_x(frame);
            }
            system.width = frames.last().map_or(labels, |m| m.x + m.aligner.width());
        }
    }

    // ── Output ─────────────────────────────────────────────────────────

    /// Left edge of every system on the page.
    fn system_x(&self) -> f64 {
        self.style.page_margin_left + self.style.system_margin_left
    }

    fn output(&self) -> LayoutResult {
        let pages = self
            .pages
            .iter()
            .map(|page| PageLayout {
                width: self.style.page_width,
                height: self.style.page_height,
                systems: page.systems.clone().map(|s| self.system_output(s)).collect(),
            })
            .collect();
        LayoutResult { pages }
    }

    fn system_output(&self, s: usize) -> SystemLayout {
        let system = &self.systems[s];
        let x = self.system_x();
        let staff_y = |n: u32| system.aligner.by_staff_n(n).map_or(system.y, |a| system.y + a.y_rel());

        let staves = system
            .aligner
            .staves()
            .iter()
            .filter_map(|alignment| {
                let staff = alignment.staff()?;
                Some(StaffLayout {
                    n: staff.n,
                    y: system.y + alignment.y_rel(),
                    y_rel: alignment.y_rel(),
                    staff_height: alignment.staff_height(),
                    overflow_above: alignment.overflow_above(),
                    overflow_below: alignment.overflow_below(),
                    overlap: alignment.overlap(),
                    verse_count: alignment.verse_count(),
                    transposition: staff.transposition,
                })
            })
            .collect();

        let mut measures = Vec::new();
        let mut syllables = Vec::new();
        for frame in &self.measures[system.measures.clone()] {
            let mx = x + frame.x;
            let elements = frame
                .elements
                .iter()
                .filter(|e| !e.kind.is_container())
                .map(|e| ElementLayout {
                    id: e.id.clone(),
                    kind: e.kind.name(),
                    staff: e.staff_n,
                    layer: e.layer_n,
                    x: mx + e.x,
                    y: staff_y(e.staff_n) + e.y,
                    bbox: e.bbox.map(|b| b.translated(mx + e.x, staff_y(e.staff_n))),
                })
                .collect();
            measures.push(MeasureLayout {
                id: frame.id.clone(),
                n: frame.n,
                x: mx,
                width: frame.aligner.width(),
                non_justifiable_margin: frame.aligner.non_justifiable_margin(),
                alignments: frame.aligner.iter().map(AlignmentLayout::from_alignment).collect(),
                elements,
            });

            for e in frame.elements.iter().filter(|e| !e.lyrics.is_empty()) {
                let Some(alignment) = system.aligner.by_staff_n(e.staff_n) else {
                    continue;
                };
                let Some(staff) = alignment.staff() else {
                    continue;
                };
                for syl in &e.lyrics {
                    syllables.push(SyllableLayout {
                        id: syl.id.clone(),
                        text: syl.text.clone(),
                        staff: e.staff_n,
                        verse: syl.n,
                        x: mx + e.x - 2.0 * staff.unit,
                        y: system.y + alignment.y_rel() + self.verse_baseline(alignment, staff, syl.n),
                    });
                }
            }
        }

        let positioners = system
            .aligner
            .staves()
            .iter()
            .flat_map(|alignment| {
                let y = system.y + alignment.y_rel();
                let n = alignment.staff().map_or(0, |staff| staff.n);
                alignment.positioners().iter().map(move |p| (n, y, p))
            })
            .map(|(n, y, p)| self.positioner_output(n, x, y, p))
            .collect();

        let connectors = (0..self.connectors.len())
            .filter_map(|c| self.connector_output(c, s))
            .collect();

        SystemLayout {
            index: s,
            x,
            y: system.y,
            width: system.width,
            height: system.height,
            justification_ratio: system.justification_ratio,
            staves,
            measures,
            positioners,
            syllables,
            connectors,
        }
    }

    /// Staff-relative baseline of a verse.
    fn verse_baseline(&self, alignment: &StaffAlignment, staff: &StaffMetrics, verse: u32) -> f64 {
        vertical::lyric_line(self, staff).baseline(
            alignment.staff_height(),
            alignment.overflow_below(),
            alignment.verse_count(),
            verse,
        )
    }

    fn positioner_output(&self, staff_n: u32, x: f64, y: f64, p: &FloatingPositioner) -> PositionerLayout {
        let geometry = match p.placed_geometry() {
            PositionerGeometry::Curve(curve) => Geometry::Curve {
                points: curve.points.map(|pt| pt.translated(x, y)),
                angle: curve.angle,
                thickness: curve.thickness,
                dir: curve.dir,
            },
            PositionerGeometry::Hairpin(hairpin) => {
                let hairpin = hairpin.translated(x, y);
                Geometry::Hairpin {
                    upper: hairpin.upper,
                    lower: hairpin.lower,
                    thickness: hairpin.thickness,
                }
            }
            PositionerGeometry::Text { x: tx, y: ty } => Geometry::Text {
                x: x + tx,
                y: y + ty,
                text: self
                    .spanners
                    .get(p.spanner)
                    .and_then(|s| s.kind.text())
                    .unwrap_or_default()
                    .to_string(),
            },
        };
        PositionerLayout {
            id: p.id.clone(),
            class: p.class,
            staff: staff_n,
            spanning: p.spanning,
            place: p.place,
            y_rel: p.y_rel(),
            bbox: p.bbox().translated(x, y),
            geometry,
        }
    }

    /// The instance of lyric connector `c` drawn in system `s`, if any.
    fn connector_output(&self, c: usize, s: usize) -> Option<ConnectorLayout> {
        let connector = &self.connectors[c];
        let start_system = self.measures[connector.start.measure].system;
        let end_system = self.measures[connector.end.measure].system;
        let spanning = SpanningType::for_system(start_system, end_system, s)?;
        let system = &self.systems[s];
        if system.measures.is_empty() {
            return None;
        }
        let alignment = system.aligner.by_staff_n(connector.staff_n)?;
        let staff = alignment.staff()?;

        let start_x = self.element_x(connector.start);
        let end_x = match connector.kind {
            SylConnector::Underscore => {
                let end = &self.measures[connector.end.measure].elements[connector.end.element];
                self.element_x(connector.end) + end.bbox.map_or(0.0, |b| b.x2)
            }
            SylConnector::Dash => self.element_x(connector.end),
        };
        let first = spanning::PlacedMeasure {
            x: self.measures[system.measures.start].x,
            aligner: &self.measures[system.measures.start].aligner,
        };
        let last_frame = &self.measures[system.measures.end - 1];
        let last = spanning::PlacedMeasure {
            x: last_frame.x,
            aligner: &last_frame.aligner,
        };
        let (x1, x2) = span_extent(spanning, start_x, end_x, &first, &last, staff.double_unit);

        let x = self.system_x();
        let y = system.y + alignment.y_rel() + self.verse_baseline(alignment, staff, connector.verse);
        let text_width = self
            .device
            .text_box(&connector.text, self.style.lyric_font_size(staff.scale))
            .width();
        let segments = connector_segments(connector.kind, spanning, x + x1, x + x2, y, text_width, staff, self.style);

        Some(ConnectorLayout {
            syl_id: connector.syl_id.clone(),
            staff: connector.staff_n,
            verse: connector.verse,
            spanning,
            kind: connector.kind,
            segments,
        })
    }
}

/// Width of the staff labels drawn before the first system, or of the
/// abbreviated labels drawn before later ones.
fn labels_width(doc: &Document, device: &BBoxDevice<'_>, style: &Style, abbreviated: bool) -> f64 {
    let widest = doc
        .score_def
        .staff_defs
        .iter()
        .filter_map(|def| {
            let label = if abbreviated { def.label_abbr.as_deref() } else { def.label.as_deref() }?;
            Some(device.text_box(label, style.lyric_font_size(def.scale)).width())
        })
        .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))));
    widest.map_or(0.0, |w| w + 2.0 * style.unit)
}

// ═══════════════════════════════════════════════════════════════════════
// Output
// ═══════════════════════════════════════════════════════════════════════

/// Positions of everything laid out, page by page. Coordinates are
/// absolute: x from the left page edge, y upwards from the page bottom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    pub pages: Vec<PageLayout>,
}

impl LayoutResult {
    pub fn system_count(&self) -> usize {
        self.pages.iter().map(|p| p.systems.len()).sum()
    }

    /// All systems in reading order.
    pub fn systems(&self) -> impl Iterator<Item = &SystemLayout> {
        self.pages.iter().flat_map(|p| p.systems.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub systems: Vec<SystemLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemLayout {
    /// Index of the system in the document
    pub index: usize,
    pub x: f64,
    /// Top of the system
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub justification_ratio: f64,
    pub staves: Vec<StaffLayout>,
    pub measures: Vec<MeasureLayout>,
    pub positioners: Vec<PositionerLayout>,
    pub syllables: Vec<SyllableLayout>,
    pub connectors: Vec<ConnectorLayout>,
}

impl SystemLayout {
    pub fn staff(&self, n: u32) -> Option<&StaffLayout> {
        self.staves.iter().find(|s| s.n == n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffLayout {
    pub n: u32,
    /// Top line
    pub y: f64,
    /// Top line relative to the system top
    pub y_rel: f64,
    pub staff_height: f64,
    pub overflow_above: f64,
    pub overflow_below: f64,
    pub overlap: f64,
    pub verse_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transposition: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLayout {
    pub id: Option<String>,
    pub n: Option<u32>,
    pub x: f64,
    pub width: f64,
    pub non_justifiable_margin: f64,
    pub alignments: Vec<AlignmentLayout>,
    pub elements: Vec<ElementLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentLayout {
    pub time: f64,
    pub kind: AlignmentType,
    pub x_rel: f64,
    pub max_width: f64,
    /// Slots of a grace-note cluster leading into this slot
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grace: Vec<AlignmentLayout>,
}

impl AlignmentLayout {
    fn from_alignment(alignment: &Alignment) -> Self {
        Self {
            time: alignment.time(),
            kind: alignment.kind(),
            x_rel: alignment.x_rel(),
            max_width: alignment.max_width(),
            grace: alignment
                .grace_aligner()
                .map(|g| g.aligner().iter().map(Self::from_alignment).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementLayout {
    pub id: Option<String>,
    pub kind: &'static str,
    pub staff: u32,
    pub layer: u32,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionerLayout {
    pub id: Option<String>,
    pub class: FloatingClass,
    pub staff: u32,
    pub spanning: SpanningType,
    pub place: Place,
    pub y_rel: f64,
    pub bbox: BoundingBox,
    pub geometry: Geometry,
}

/// Drawable geometry of a floating element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Geometry {
    Curve {
        points: [Point; 4],
        angle: f64,
        thickness: f64,
        dir: CurveDir,
    },
    Hairpin {
        upper: [Point; 2],
        lower: [Point; 2],
        thickness: f64,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
    },
}

/// A syllable drawn on its baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyllableLayout {
    pub id: Option<String>,
    pub text: String,
    pub staff: u32,
    pub verse: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorLayout {
    pub syl_id: Option<String>,
    pub staff: u32,
    pub verse: u32,
    pub spanning: SpanningType,
    pub kind: SylConnector,
    pub segments: Vec<BoundingBox>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ApproximateMetrics;
    use crate::model::{ClefShape, Duration, Layer, LayerElement, Note, Page, Staff, StaffDef, System};
    use float_cmp::assert_approx_eq;
    use pretty_assertions::assert_eq;

    fn note(loc: i32) -> LayerElement {
        LayerElement::Note(Note {
            loc,
            dur: Duration::Quarter,
            ..Note::default()
        })
    }

    fn measure(notes: Vec<LayerElement>, score_def: Option<ScoreDef>) -> Measure {
        Measure {
            score_def,
            staves: vec![Staff {
                n: 1,
                layers: vec![Layer {
                    n: 1,
                    stem_dir: None,
                    elements: notes,
                }],
            }],
            ..Measure::default()
        }
    }

    fn document(systems: Vec<Vec<Measure>>) -> Document {
        let mut staff = StaffDef::new(1);
        staff.clef = Some(Clef {
            id: None,
            shape: ClefShape::G,
            line: 2,
        });
        staff.key_sig = Some(KeySig { id: None, fifths: 2 });
        Document {
            score_def: ScoreDef {
                staff_defs: vec![staff],
                meter_sig: Some(MeterSig {
                    id: None,
                    count: 3,
                    unit: 4,
                    symbol: false,
                }),
                ..ScoreDef::default()
            },
            pages: vec![Page {
                systems: systems.into_iter().map(|measures| System { measures }).collect(),
            }],
        }
    }

    fn kinds(frame: &MeasureFrame) -> Vec<&'static str> {
        frame.elements.iter().map(|e| e.kind.name()).collect()
    }

    #[test]
    fn attributes_at_system_start_and_changes() {
        let change = ScoreDef {
            key_sig: Some(KeySig { id: None, fifths: -1 }),
            ..ScoreDef::default()
        };
        let doc = document(vec![
            vec![measure(vec![note(2)], None), measure(vec![note(4)], Some(change))],
            vec![measure(vec![note(6)], None)],
        ]);
        let style = Style::default();
        let metrics = ApproximateMetrics;
        let mut layout = ScoreLayout::new(&doc, &style, &metrics).expect("valid document");
        layout.reset();

        assert_eq!(kinds(&layout.measures[0]), vec!["clef", "keySig", "meterSig", "note", "barLine"]);
        assert_eq!(kinds(&layout.measures[1]), vec!["keySig", "note", "barLine"]);
        assert_eq!(kinds(&layout.measures[2]), vec!["clef", "keySig", "note", "barLine"]);
        assert_eq!(layout.measures[2].system, 1);
        assert_approx_eq!(f64, layout.measures[0].beat_duration, 256.0);
        assert_approx_eq!(f64, layout.measures[0].beats, 3.0);
    }

    #[test]
    fn measures_abut_within_a_system() {
        let doc = document(vec![vec![measure(vec![note(2), note(4)], None), measure(vec![note(6)], None)]]);
        let style = Style {
            justify: false,
            ..Style::default()
        };
        let metrics = ApproximateMetrics;
        let mut layout = ScoreLayout::new(&doc, &style, &metrics).expect("valid document");
        let result = layout.run();
        let system = &result.pages[0].systems[0];
        let first = &system.measures[0];
        let second = &system.measures[1];
        assert_approx_eq!(f64, second.x, first.x + first.width);
        assert_approx_eq!(f64, system.justification_ratio, 1.0);
    }

    #[test]
    fn missing_staff_definitions_are_an_error() {
        let doc = Document {
            score_def: ScoreDef::default(),
            pages: vec![Page {
                systems: vec![System {
                    measures: vec![measure(vec![note(2)], None)],
                }],
            }],
        };
        let style = Style::default();
        let metrics = ApproximateMetrics;
        assert!(matches!(
            ScoreLayout::new(&doc, &style, &metrics),
            Err(LayoutError::EmptyStaffDefinition)
        ));
    }
}
