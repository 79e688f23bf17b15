//! Options chosen when a line is constructed.

use crate::types::Color;

/// Whether a line's geometry is clipped tightly to its bounds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SizeMode {
    /// Geometry stays where the glyph runs put it.
    #[default]
    Natural,
    /// Geometry is moved to the origin and clipped to its stroke bounds.
    Draw,
}

/// The two palettes of a karaoke line.
///
/// "Unsung" colors paint the part of the line not yet reached by the
/// progress; "sung" colors paint the completed part.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorSet {
    /// Fill of the unsung region.
    pub fill_unsung: Color,
    /// Fill of the sung region.
    pub fill_sung: Color,
    /// Stroke of the unsung region.
    pub stroke_unsung: Color,
    /// Stroke of the sung region.
    pub stroke_sung: Color,
    /// Glow behind the unsung region.
    pub glow_unsung: Color,
    /// Glow behind the sung region.
    pub glow_sung: Color,
}

impl Default for ColorSet {
    fn default() -> Self {
        Self {
            fill_unsung: [1.0, 1.0, 1.0, 1.0],
            fill_sung: [0.35, 0.75, 1.0, 1.0],
            stroke_unsung: [0.0, 0.0, 0.0, 1.0],
            stroke_sung: [0.0, 0.0, 0.0, 1.0],
            glow_unsung: [0.0, 0.0, 0.0, 0.5],
            glow_sung: [0.0, 0.0, 0.0, 0.5],
        }
    }
}

/// Visual constants of the karaoke effect.
///
/// None of these affect correctness; they shape the look. All lengths are in
/// drawing units before multiplication by the line scale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlowTuning {
    /// Extra room around each region's clip so the glow is not cut off.
    pub clip_margin: f32,
    /// Width of the soft sung/unsung transition band.
    pub transition_width: f32,
    /// Horizontal stretch of the glow around the progress boundary.
    pub stretch: f32,
    /// Blur standard deviation per unit of scale.
    pub blur_ratio: f32,
}

impl Default for GlowTuning {
    fn default() -> Self {
        Self {
            clip_margin: 100.0,
            transition_width: 6.0,
            stretch: 1.008,
            blur_ratio: 2.0 / 3.0,
        }
    }
}

/// Everything needed to build a line besides its glyph runs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineOptions {
    /// Outline stroke width; `0.0` disables the stroke.
    pub stroke_width: f32,
    /// Uniform scale applied to the glyph outlines (typically the DPI scale).
    pub scale: f32,
    /// Whether geometry is clipped tightly to its bounds.
    pub size_mode: SizeMode,
    /// Sung/unsung palettes.
    pub colors: ColorSet,
    /// Visual constants.
    pub tuning: GlowTuning,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            stroke_width: 0.0,
            scale: 1.0,
            size_mode: SizeMode::Natural,
            colors: ColorSet::default(),
            tuning: GlowTuning::default(),
        }
    }
}

impl LineOptions {
    /// Sets the stroke width.
    #[must_use]
    pub fn with_stroke_width(mut self, stroke_width: f32) -> Self {
        self.stroke_width = stroke_width;
        self
    }

    /// Sets the scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the size mode.
    #[must_use]
    pub fn with_size_mode(mut self, size_mode: SizeMode) -> Self {
        self.size_mode = size_mode;
        self
    }

    /// Sets the palettes.
    #[must_use]
    pub fn with_colors(mut self, colors: ColorSet) -> Self {
        self.colors = colors;
        self
    }

    /// Sets the visual constants.
    #[must_use]
    pub fn with_tuning(mut self, tuning: GlowTuning) -> Self {
        self.tuning = tuning;
        self
    }
}
