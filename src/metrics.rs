//! Glyph metrics: the font collaborator of the layout engine.
//!
//! The engine never loads fonts itself. It asks a [`GlyphMetrics`]
//! implementation for the bounds of SMuFL music glyphs and text characters
//! at a given point size. [`ApproximateMetrics`] provides estimates close to
//! a Bravura-like music font and a proportional text face, which is enough
//! for layout without a real font.

/// SMuFL code points used by the engine.
pub mod smufl {
    pub const NOTEHEAD_WHOLE: char = '\u{E0A2}';
    pub const NOTEHEAD_HALF: char = '\u{E0A3}';
    pub const NOTEHEAD_BLACK: char = '\u{E0A4}';
    pub const NOTEHEAD_BREVE: char = '\u{E0A0}';
    pub const G_CLEF: char = '\u{E050}';
    pub const C_CLEF: char = '\u{E05C}';
    pub const F_CLEF: char = '\u{E062}';
    pub const TIME_SIG_0: char = '\u{E080}';
    pub const TIME_SIG_COMMON: char = '\u{E08A}';
    pub const AUGMENTATION_DOT: char = '\u{E1E7}';
    pub const FLAG_8TH_UP: char = '\u{E240}';
    pub const ACCIDENTAL_FLAT: char = '\u{E260}';
    pub const ACCIDENTAL_NATURAL: char = '\u{E261}';
    pub const ACCIDENTAL_SHARP: char = '\u{E262}';
    pub const ACCIDENTAL_DOUBLE_SHARP: char = '\u{E263}';
    pub const ACCIDENTAL_DOUBLE_FLAT: char = '\u{E264}';
    pub const REST_LONGA: char = '\u{E4E1}';
    pub const REST_DOUBLE_WHOLE: char = '\u{E4E2}';
    pub const REST_WHOLE: char = '\u{E4E3}';
    pub const REST_HALF: char = '\u{E4E4}';
    pub const REST_QUARTER: char = '\u{E4E5}';
    pub const REST_8TH: char = '\u{E4E6}';
    pub const REST_16TH: char = '\u{E4E7}';
    pub const REST_32ND: char = '\u{E4E8}';
    pub const REST_64TH: char = '\u{E4E9}';
    pub const REST_128TH: char = '\u{E4EA}';
    pub const MENSURATION_CIRCLE: char = '\u{E911}';
}

/// Bounds of a glyph relative to its origin, y pointing up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlyphBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl GlyphBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    fn scaled(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Font metrics provider.
///
/// `point_size` is the em size in layout points. For music glyphs it is the
/// height of a five-line staff.
pub trait GlyphMetrics {
    /// Bounds of a single code point.
    fn glyph_bounds(&self, code: char, point_size: f64) -> GlyphBounds;

    /// Advance width of a text run.
    fn text_width(&self, text: &str, point_size: f64) -> f64 {
        text.chars()
            .map(|c| self.glyph_bounds(c, point_size).width)
            .sum()
    }

    /// Height of a glyph above the baseline.
    fn glyph_height(&self, code: char, point_size: f64) -> f64 {
        let bounds = self.glyph_bounds(code, point_size);
        bounds.y + bounds.height
    }

    /// Depth of a glyph below the baseline, as a positive value.
    fn glyph_descender(&self, code: char, point_size: f64) -> f64 {
        (-self.glyph_bounds(code, point_size).y).max(0.0)
    }
}

// ── Approximate metrics ─────────────────────────────────────────────

const TEXT_CHAR_WIDTH_FACTOR: f64 = 0.55;
const TEXT_NARROW_WIDTH_FACTOR: f64 = 0.3;
const TEXT_CAP_HEIGHT: f64 = 0.72;
const TEXT_X_HEIGHT: f64 = 0.5;
const TEXT_DESCENDER: f64 = 0.22;

/// Estimated metrics, in em fractions of the point size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMetrics;

impl ApproximateMetrics {
    fn music_bounds(code: char) -> Option<GlyphBounds> {
        use smufl::*;

        let b = match code {
            NOTEHEAD_BLACK | NOTEHEAD_HALF => GlyphBounds::new(0.0, -0.125, 0.295, 0.25),
            NOTEHEAD_WHOLE => GlyphBounds::new(0.0, -0.125, 0.42, 0.25),
            NOTEHEAD_BREVE => GlyphBounds::new(0.0, -0.14, 0.6, 0.28),
            G_CLEF => GlyphBounds::new(0.0, -0.66, 0.67, 1.76),
            F_CLEF => GlyphBounds::new(0.0, -0.64, 0.69, 0.9),
            C_CLEF => GlyphBounds::new(0.0, -0.5, 0.67, 1.0),
            TIME_SIG_COMMON => GlyphBounds::new(0.0, -0.25, 0.42, 0.5),
            c if (TIME_SIG_0..='\u{E089}').contains(&c) => GlyphBounds::new(0.0, -0.25, 0.45, 0.5),
            AUGMENTATION_DOT => GlyphBounds::new(0.0, -0.05, 0.1, 0.1),
            FLAG_8TH_UP => GlyphBounds::new(0.0, -0.8, 0.26, 0.8),
            ACCIDENTAL_FLAT => GlyphBounds::new(0.0, -0.18, 0.23, 0.63),
            ACCIDENTAL_NATURAL => GlyphBounds::new(0.0, -0.34, 0.17, 0.68),
            ACCIDENTAL_SHARP => GlyphBounds::new(0.0, -0.35, 0.25, 0.7),
            ACCIDENTAL_DOUBLE_SHARP => GlyphBounds::new(0.0, -0.125, 0.25, 0.25),
            ACCIDENTAL_DOUBLE_FLAT => GlyphBounds::new(0.0, -0.18, 0.41, 0.63),
            REST_LONGA => GlyphBounds::new(0.0, -0.25, 0.125, 0.5),
            REST_DOUBLE_WHOLE => GlyphBounds::new(0.0, 0.0, 0.125, 0.25),
            REST_WHOLE => GlyphBounds::new(0.0, -0.13, 0.29, 0.13),
            REST_HALF => GlyphBounds::new(0.0, 0.0, 0.29, 0.13),
            REST_QUARTER => GlyphBounds::new(0.0, -0.37, 0.27, 0.75),
            REST_8TH => GlyphBounds::new(0.0, -0.25, 0.25, 0.5),
            REST_16TH => GlyphBounds::new(0.0, -0.5, 0.3, 0.75),
            REST_32ND => GlyphBounds::new(0.0, -0.5, 0.35, 1.0),
            REST_64TH => GlyphBounds::new(0.0, -0.75, 0.4, 1.25),
            REST_128TH => GlyphBounds::new(0.0, -0.75, 0.45, 1.5),
            MENSURATION_CIRCLE => GlyphBounds::new(0.0, -0.3, 0.6, 0.6),
            _ => return None,
        };
        Some(b)
    }

    fn text_bounds(code: char) -> GlyphBounds {
        let width = match code {
            'i' | 'j' | 'l' | 't' | 'f' | 'I' | '.' | ',' | '\'' | ' ' | '-' => {
                TEXT_NARROW_WIDTH_FACTOR
            }
            _ => TEXT_CHAR_WIDTH_FACTOR,
        };
        let descends = matches!(code, 'g' | 'j' | 'p' | 'q' | 'y');
        let tall = code.is_uppercase()
            || code.is_ascii_digit()
            || matches!(code, 'b' | 'd' | 'f' | 'h' | 'k' | 'l' | 't');
        let top = if tall { TEXT_CAP_HEIGHT } else { TEXT_X_HEIGHT };
        let bottom = if descends { -TEXT_DESCENDER } else { 0.0 };
        GlyphBounds::new(0.0, bottom, width, top - bottom)
    }
}

impl GlyphMetrics for ApproximateMetrics {
    fn glyph_bounds(&self, code: char, point_size: f64) -> GlyphBounds {
        Self::music_bounds(code)
            .unwrap_or_else(|| Self::text_bounds(code))
            .scaled(point_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn notehead_is_one_space_high() {
        let m = ApproximateMetrics;
        // A five-line staff of 720 points has spaces of 180 points.
        let b = m.glyph_bounds(smufl::NOTEHEAD_BLACK, 720.0);
        assert_approx_eq!(f64, b.height, 180.0);
        assert_approx_eq!(f64, b.y, -90.0);
    }

    #[test]
    fn text_height_and_descender() {
        let m = ApproximateMetrics;
        assert_approx_eq!(f64, m.glyph_height('I', 100.0), 72.0);
        assert_approx_eq!(f64, m.glyph_descender('q', 100.0), 22.0);
        assert_approx_eq!(f64, m.glyph_descender('a', 100.0), 0.0);
    }

    #[test]
    fn text_width_sums_characters() {
        let m = ApproximateMetrics;
        let w = m.text_width("la", 10.0);
        assert_approx_eq!(f64, w, 3.0 + 5.5);
    }
}
