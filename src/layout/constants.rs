//! Shared constants for the layout engine (layout points unless noted).

// ── Time ────────────────────────────────────────────────────────────
/// Alignment duration of a whole note.
pub(crate) const DUR_MAX: f64 = 1024.0;
/// Duration code of the whole note; longer values are shorter notes.
pub(crate) const DUR_1: i32 = 2;
/// Time of the measure-start slot and of system-start attributes.
pub(crate) const MEASURE_START_TIME: f64 = -1.0;
/// Two times closer than this are the same slot.
pub(crate) const TIME_EPSILON: f64 = 0.001;

// ── Horizontal spacing ──────────────────────────────────────────────
/// Scale of the ideal spacing formula.
pub(crate) const DEFINITION_FACTOR: f64 = 10.0;
/// Experimental constant of the ideal spacing formula.
pub(crate) const SPACING_CONSTANT: f64 = 10.0;
/// Below this ratio the justification warns about compressed content.
pub(crate) const JUSTIFICATION_WARNING_RATIO: f64 = 0.8;

// ── Notes ───────────────────────────────────────────────────────────
pub(crate) const STEM_LENGTH: f64 = 7.0; // in drawing units
pub(crate) const MULTI_REST_WIDTH: f64 = 10.0; // in drawing units
pub(crate) const KEY_SIG_ACCID_GAP: f64 = 0.3; // in drawing units
/// Size of grace notes relative to normal notes.
pub(crate) const GRACE_FACTOR: f64 = 0.75;

// ── Slurs and ties ──────────────────────────────────────────────────
pub(crate) const SLUR_MAX_SLOPE: f64 = 20.0 * std::f64::consts::PI / 180.0;
pub(crate) const SLUR_HEIGHT_FACTOR: f64 = 8.0;
pub(crate) const SLUR_CONTROL_POINT_FACTOR: f64 = 5.0;
pub(crate) const SLUR_CURVE_FACTOR: f64 = 5.0;
/// Lower bound on the angle used when capping the curve height.
pub(crate) const SLUR_MIN_HEIGHT_ANGLE: f64 = 0.2;
/// Number of samples taken along a bezier to bound it.
pub(crate) const BEZIER_SAMPLES: usize = 16;
