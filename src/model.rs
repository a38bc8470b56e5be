//! Score tree consumed by the layout engine.
//!
//! The tree mirrors the page → system → measure → staff → layer → element
//! hierarchy of an engraved score. It is produced by a separate parsing
//! component (or deserialized from JSON) and is never mutated by layout.

use serde::{Deserialize, Serialize};

/// A complete document to lay out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Staff definitions and initial attributes
    #[serde(default)]
    pub score_def: ScoreDef,
    /// Encoded pages. With automatic breaking only the measure order matters.
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Document {
    /// All measures in document order.
    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.pages
            .iter()
            .flat_map(|p| p.systems.iter())
            .flat_map(|s| s.measures.iter())
    }

    /// Number of measures in the document.
    pub fn measure_count(&self) -> usize {
        self.measures().count()
    }

    /// Look up a staff definition by staff number.
    pub fn staff_def(&self, n: u32) -> Option<&StaffDef> {
        self.score_def.staff_defs.iter().find(|s| s.n == n)
    }
}

/// Score-level definitions. Also used for attribute changes at a measure start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreDef {
    #[serde(default)]
    pub staff_defs: Vec<StaffDef>,
    pub key_sig: Option<KeySig>,
    pub meter_sig: Option<MeterSig>,
    pub mensur: Option<Mensur>,
}

/// Definition of one staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffDef {
    /// Staff number
    pub n: u32,
    /// Number of staff lines
    #[serde(default = "default_lines")]
    pub lines: u32,
    /// Notational size in percent
    #[serde(default = "default_scale")]
    pub scale: u32,
    pub clef: Option<Clef>,
    pub key_sig: Option<KeySig>,
    pub meter_sig: Option<MeterSig>,
    /// Transposition in semitones (informational)
    pub transposition: Option<i32>,
    /// Label drawn before the first system
    pub label: Option<String>,
    /// Abbreviated label drawn before every later system
    pub label_abbr: Option<String>,
}

fn default_lines() -> u32 {
    5
}

fn default_scale() -> u32 {
    100
}

impl StaffDef {
    /// A five-line staff of normal size.
    pub fn new(n: u32) -> Self {
        Self {
            n,
            lines: default_lines(),
            scale: default_scale(),
            clef: None,
            key_sig: None,
            meter_sig: None,
            transposition: None,
            label: None,
            label_abbr: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub systems: Vec<System>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System {
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// A single measure (bar) across all staves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measure {
    pub id: Option<String>,
    /// Measure number
    pub n: Option<u32>,
    pub left_barline: Option<BarRendition>,
    #[serde(default)]
    pub right_barline: BarRendition,
    /// Attribute changes taking effect at the start of this measure
    pub score_def: Option<ScoreDef>,
    #[serde(default)]
    pub staves: Vec<Staff>,
    /// Slurs, ties, hairpins, dynamics, tempo marks and directives
    #[serde(default)]
    pub control_events: Vec<ControlEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Staff {
    pub n: u32,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

/// One voice within a staff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layer {
    pub n: u32,
    /// Stem direction hint applying to the whole layer
    pub stem_dir: Option<StemDir>,
    #[serde(default)]
    pub elements: Vec<LayerElement>,
}

// ═══════════════════════════════════════════════════════════════════════
// Layer elements
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LayerElement {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    MeasureRest(MeasureRest),
    MultiRest(MultiRest),
    Clef(Clef),
    KeySig(KeySig),
    MeterSig(MeterSig),
    Mensur(Mensur),
    BarLine(BarLine),
    Dot(Dot),
    Accid(Accid),
    Beam(Beam),
    Tuplet(Tuplet),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<String>,
    /// Written duration. Chord tones take the duration of their chord.
    #[serde(default)]
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
    /// Staff position in half spaces above the bottom line
    pub loc: i32,
    pub stem_dir: Option<StemDir>,
    #[serde(default)]
    pub grace: bool,
    pub accid: Option<Accidental>,
    /// Tie encoded as an attribute
    pub tie: Option<TieMark>,
    #[serde(default)]
    pub lyrics: Vec<Syl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chord {
    pub id: Option<String>,
    #[serde(default)]
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
    pub stem_dir: Option<StemDir>,
    #[serde(default)]
    pub grace: bool,
    pub notes: Vec<Note>,
    #[serde(default)]
    pub lyrics: Vec<Syl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rest {
    pub id: Option<String>,
    #[serde(default)]
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
    /// Vertical position; the middle line when absent
    pub loc: Option<i32>,
}

/// A rest filling the whole measure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasureRest {
    pub id: Option<String>,
}

/// A rest spanning several measures, drawn in one measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiRest {
    pub id: Option<String>,
    pub num: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clef {
    pub id: Option<String>,
    pub shape: ClefShape,
    /// Staff line (1 = bottom) the clef sits on
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClefShape {
    G,
    F,
    C,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeySig {
    pub id: Option<String>,
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterSig {
    pub id: Option<String>,
    pub count: u32,
    pub unit: u32,
    /// Draw the common-time symbol instead of digits
    #[serde(default)]
    pub symbol: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mensur {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarLine {
    pub id: Option<String>,
    #[serde(default)]
    pub rend: BarRendition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarRendition {
    #[default]
    Single,
    Double,
    End,
    RptStart,
    RptEnd,
    Invisible,
}

/// A standalone dot, as in mensural notation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dot {
    pub id: Option<String>,
    pub loc: Option<i32>,
}

/// A standalone accidental.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accid {
    pub id: Option<String>,
    pub accid: Accidental,
    pub loc: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Beam {
    pub id: Option<String>,
    pub elements: Vec<LayerElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuplet {
    pub id: Option<String>,
    pub num: u32,
    pub numbase: u32,
    pub elements: Vec<LayerElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDir {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

/// Tie role of a note: initial, medial or terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieMark {
    I,
    M,
    T,
}

// ── Durations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Duration {
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "breve")]
    Breve,
    #[serde(rename = "1")]
    Whole,
    #[serde(rename = "2")]
    Half,
    #[default]
    #[serde(rename = "4")]
    Quarter,
    #[serde(rename = "8")]
    Eighth,
    #[serde(rename = "16")]
    Sixteenth,
    #[serde(rename = "32")]
    ThirtySecond,
    #[serde(rename = "64")]
    SixtyFourth,
    #[serde(rename = "128")]
    OneTwentyEighth,
}

impl Duration {
    /// Duration code with the whole note at 2; larger codes are shorter.
    pub fn actual_dur(self) -> i32 {
        match self {
            Duration::Long => 0,
            Duration::Breve => 1,
            Duration::Whole => 2,
            Duration::Half => 3,
            Duration::Quarter => 4,
            Duration::Eighth => 5,
            Duration::Sixteenth => 6,
            Duration::ThirtySecond => 7,
            Duration::SixtyFourth => 8,
            Duration::OneTwentyEighth => 9,
        }
    }

    /// Number of flags or beams for the duration.
    pub fn flag_count(self) -> u32 {
        (self.actual_dur() - Duration::Quarter.actual_dur()).max(0) as u32
    }

    /// Whether the duration is drawn with a stem.
    pub fn has_stem(self) -> bool {
        self >= Duration::Half
    }
}

// ── Lyrics ──────────────────────────────────────────────────────────

/// One lyric syllable attached to a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Syl {
    pub id: Option<String>,
    /// Verse number
    #[serde(default = "default_verse")]
    pub n: u32,
    pub text: String,
    pub con: Option<SylConnector>,
    pub wordpos: Option<WordPos>,
}

fn default_verse() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SylConnector {
    /// Dashes between the syllables of a word
    Dash,
    /// Extender line after the last syllable of a word
    Underscore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordPos {
    Initial,
    Medial,
    Terminal,
}

// ═══════════════════════════════════════════════════════════════════════
// Control events (floating elements)
// ═══════════════════════════════════════════════════════════════════════

/// An annotation positioned relative to, but not embedded in, the notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEvent {
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: ControlKind,
    /// Staves the event is drawn on; the start element's staff when empty
    #[serde(default)]
    pub staff: Vec<u32>,
    /// Layer used for timestamp endpoints
    pub layer: Option<u32>,
    pub start_id: Option<String>,
    pub end_id: Option<String>,
    /// Start position in beats within the measure (0 is before the first beat)
    pub tstamp: Option<f64>,
    pub tstamp2: Option<MeasureBeat>,
    pub place: Option<Place>,
    pub curve_dir: Option<CurveDir>,
    /// Explicit curve height in drawing units
    pub bulge: Option<f64>,
}

impl ControlEvent {
    /// A control event with no endpoints or overrides.
    pub fn new(kind: ControlKind) -> Self {
        Self {
            id: None,
            kind,
            staff: Vec::new(),
            layer: None,
            start_id: None,
            end_id: None,
            tstamp: None,
            tstamp2: None,
            place: None,
            curve_dir: None,
            bulge: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlKind {
    Slur,
    Tie,
    Hairpin { form: HairpinForm },
    Dynam { text: String },
    Tempo { text: String },
    Dir { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HairpinForm {
    Cres,
    Dim,
}

/// An end position given as a number of measures ahead plus a beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureBeat {
    #[serde(default)]
    pub measures: u32,
    pub beat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Place {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveDir {
    Above,
    Below,
}
