//! Shaped glyph runs and their conversion into outlines.
//!
//! Shaping and font resolution happen elsewhere; this module only consumes
//! their result. Outlines are extracted through [`OutlineSource`], which is
//! implemented for [`ttf_parser::Face`].

use lyon::math::{point, vector, Angle, Point, Transform, Vector};
use lyon::path::Path;

/// Anything that can draw a glyph outline in font units (y up).
pub trait OutlineSource {
    /// Design units per em, used to scale outlines to the font size.
    fn units_per_em(&self) -> f32;

    /// Draws the outline of `glyph_id` into `builder`.
    ///
    /// Returns `false` when the glyph has no outline (e.g. a space).
    fn outline_glyph(&self, glyph_id: u16, builder: &mut dyn ttf_parser::OutlineBuilder)
        -> bool;
}

impl OutlineSource for ttf_parser::Face<'_> {
    fn units_per_em(&self) -> f32 {
        f32::from(ttf_parser::Face::units_per_em(self))
    }

    fn outline_glyph(
        &self,
        glyph_id: u16,
        builder: &mut dyn ttf_parser::OutlineBuilder,
    ) -> bool {
        ttf_parser::Face::outline_glyph(self, ttf_parser::GlyphId(glyph_id), builder).is_some()
    }
}

/// Rotation applied to a whole run around its baseline origin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GlyphOrientation {
    /// No rotation.
    #[default]
    Upright,
    /// Rotated 90 degrees clockwise.
    Clockwise90,
    /// Rotated 180 degrees.
    Clockwise180,
    /// Rotated 270 degrees clockwise.
    Clockwise270,
}

impl GlyphOrientation {
    fn angle(self) -> Angle {
        match self {
            Self::Upright => Angle::degrees(0.0),
            Self::Clockwise90 => Angle::degrees(90.0),
            Self::Clockwise180 => Angle::degrees(180.0),
            Self::Clockwise270 => Angle::degrees(270.0),
        }
    }
}

/// A positioned glyph inside a run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Glyph {
    /// Glyph index in the font.
    pub id: u16,
    /// Advance along the baseline, in drawing units.
    pub advance: f32,
    /// Offset from the pen position, in drawing units.
    pub offset: Vector,
}

impl Glyph {
    /// A glyph with no offset.
    pub fn new(id: u16, advance: f32) -> Self {
        Self {
            id,
            advance,
            offset: vector(0.0, 0.0),
        }
    }
}

/// A run of shaped glyphs sharing one font face and size.
#[derive(Clone)]
pub struct GlyphRun<'a> {
    /// Baseline origin of the run.
    pub origin: Point,
    /// Face the glyph indices refer to.
    pub face: &'a dyn OutlineSource,
    /// Font size in drawing units per em.
    pub font_size: f32,
    /// Glyphs in visual order.
    pub glyphs: Vec<Glyph>,
    /// Glyphs are rotated 90 degrees counter-clockwise (vertical text set
    /// sideways).
    pub sideways: bool,
    /// Unicode bidi level; odd levels advance right-to-left.
    pub bidi_level: u8,
    /// Rotation of the whole run.
    pub orientation: GlyphOrientation,
}

impl std::fmt::Debug for GlyphRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphRun")
            .field("origin", &self.origin)
            .field("font_size", &self.font_size)
            .field("glyphs", &self.glyphs)
            .field("sideways", &self.sideways)
            .field("bidi_level", &self.bidi_level)
            .field("orientation", &self.orientation)
            .finish_non_exhaustive()
    }
}

impl<'a> GlyphRun<'a> {
    /// A left-to-right, upright run.
    pub fn new(
        origin: Point,
        face: &'a dyn OutlineSource,
        font_size: f32,
        glyphs: Vec<Glyph>,
    ) -> Self {
        Self {
            origin,
            face,
            font_size,
            glyphs,
            sideways: false,
            bidi_level: 0,
            orientation: GlyphOrientation::Upright,
        }
    }

    /// Whether the run advances right-to-left.
    pub fn is_rtl(&self) -> bool {
        self.bidi_level % 2 == 1
    }

    /// Builds the filled outline of every glyph in the run.
    ///
    /// Returns `None` when no glyph has an outline.
    pub fn outline(&self) -> Option<Path> {
        let units_per_em = self.face.units_per_em();
        if units_per_em <= 0.0 {
            return None;
        }
        let em_scale = self.font_size / units_per_em;
        // Font units are y-up.
        let mut glyph_space = Transform::scale(em_scale, -em_scale);
        if self.sideways {
            glyph_space = glyph_space.then_rotate(Angle::degrees(-90.0));
        }
        let run_space = Transform::rotation(self.orientation.angle())
            .then_translate(self.origin.to_vector());

        let mut builder = LyonOutlineBuilder::new();
        let mut pen = 0.0;
        for glyph in &self.glyphs {
            let x = if self.is_rtl() {
                pen -= glyph.advance;
                pen
            } else {
                let x = pen;
                pen += glyph.advance;
                x
            };
            builder.transform = glyph_space
                .then_translate(vector(x, 0.0) + glyph.offset)
                .then(&run_space);
            if !self.face.outline_glyph(glyph.id, &mut builder) {
                builder.abandon_contour();
            }
        }
        builder.build()
    }
}

/// Converts `ttf-parser` outline callbacks into a `lyon` path, applying a
/// per-glyph transform.
struct LyonOutlineBuilder {
    builder: lyon::path::path::Builder,
    transform: Transform,
    contour_open: bool,
    has_contours: bool,
}

impl LyonOutlineBuilder {
    fn new() -> Self {
        Self {
            builder: Path::builder(),
            transform: Transform::identity(),
            contour_open: false,
            has_contours: false,
        }
    }

    fn map(&self, x: f32, y: f32) -> Point {
        self.transform.transform_point(point(x, y))
    }

    fn abandon_contour(&mut self) {
        if self.contour_open {
            self.builder.end(false);
            self.contour_open = false;
        }
    }

    fn build(mut self) -> Option<Path> {
        if self.contour_open {
            self.builder.close();
        }
        self.has_contours.then(|| self.builder.build())
    }
}

impl ttf_parser::OutlineBuilder for LyonOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        if self.contour_open {
            self.builder.close();
        }
        let at = self.map(x, y);
        self.builder.begin(at);
        self.contour_open = true;
        self.has_contours = true;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let to = self.map(x, y);
        self.builder.line_to(to);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let ctrl = self.map(x1, y1);
        let to = self.map(x, y);
        self.builder.quadratic_bezier_to(ctrl, to);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let ctrl1 = self.map(x1, y1);
        let ctrl2 = self.map(x2, y2);
        let to = self.map(x, y);
        self.builder.cubic_bezier_to(ctrl1, ctrl2, to);
    }

    fn close(&mut self) {
        if self.contour_open {
            self.builder.close();
            self.contour_open = false;
        }
    }
}
