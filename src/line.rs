//! Progress-driven drawing of a single lyric line.
//!
//! The line is split at `bounds.left + bounds.width * progress` into a sung
//! region on the left and an unsung region on the right. Each region is drawn
//! inside its own clip layer (with room for the glow), and while the boundary
//! is inside the line a gradient pass softens the color change.

use lyon::math::{point, Box2D};

use crate::backend::{Backend, Brush};
use crate::bloom;
use crate::cache::{build_line_geometry, CachedGeometry, GeometryArena};
use crate::config::{ColorSet, GlowTuning, LineOptions};
use crate::glyph::GlyphRun;
use crate::stops::{self, Stops};
use crate::types::{Color, GradientStop};

/// Progress below this counts as "nothing sung".
pub const PROGRESS_EPSILON: f32 = 0.001;

/// Progress above this counts as "fully sung".
pub const PROGRESS_COMPLETE: f32 = 1.0 - PROGRESS_EPSILON;

/// The capabilities every line style offers.
pub trait LyricLine {
    /// Backend geometry handle the line owns.
    type Geometry;

    /// Stroke bounds of the line, fixed at construction.
    fn bounds(&self) -> Box2D;

    /// Draws the line with `progress` (0 = nothing sung, 1 = all sung).
    ///
    /// `low_frame_rate` skips the glow and paints flat colors instead of the
    /// transition gradient.
    fn draw<B: Backend<Geometry = Self::Geometry>>(
        &self,
        backend: &mut B,
        progress: f32,
        low_frame_rate: bool,
    );

    /// Releases every cached geometry. The line cannot be drawn afterwards.
    fn dispose<B: Backend<Geometry = Self::Geometry>>(self, backend: &mut B);
}

/// Available line styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LineStyle {
    /// Two-region karaoke fill with a trailing glow.
    #[default]
    Classic,
}

impl LineStyle {
    /// Builds a line in this style.
    pub fn build<B: Backend>(
        self,
        backend: &mut B,
        runs: &[GlyphRun<'_>],
        options: &LineOptions,
    ) -> LineDrawing<B::Geometry> {
        match self {
            Self::Classic => LineDrawing::Classic(ClassicLine::new(backend, runs, options)),
        }
    }
}

/// A line of any style, chosen at construction.
#[derive(Debug)]
pub enum LineDrawing<G> {
    /// See [`ClassicLine`].
    Classic(ClassicLine<G>),
}

impl<G> LyricLine for LineDrawing<G> {
    type Geometry = G;

    fn bounds(&self) -> Box2D {
        match self {
            Self::Classic(line) => line.bounds(),
        }
    }

    fn draw<B: Backend<Geometry = Self::Geometry>>(
        &self,
        backend: &mut B,
        progress: f32,
        low_frame_rate: bool,
    ) {
        match self {
            Self::Classic(line) => line.draw(backend, progress, low_frame_rate),
        }
    }

    fn dispose<B: Backend<Geometry = Self::Geometry>>(self, backend: &mut B) {
        match self {
            Self::Classic(line) => line.dispose(backend),
        }
    }
}

/// The classic karaoke line.
///
/// Sung text is painted in the second palette and unsung text in the first,
/// with a narrow gradient at the boundary and a blurred glow behind each
/// region.
#[derive(Debug)]
pub struct ClassicLine<G> {
    geometry: GeometryArena<G>,
    bounds: Box2D,
    colors: ColorSet,
    scale: f32,
    tuning: GlowTuning,
}

impl<G> ClassicLine<G> {
    /// Builds the line's cached geometry from shaped glyph runs.
    pub fn new<B: Backend<Geometry = G>>(
        backend: &mut B,
        runs: &[GlyphRun<'_>],
        options: &LineOptions,
    ) -> Self {
        let built = build_line_geometry(backend, runs, options);
        Self {
            geometry: built.arena,
            bounds: built.bounds,
            colors: options.colors,
            scale: options.scale,
            tuning: options.tuning,
        }
    }

    /// Number of cached geometries owned by the line.
    pub fn geometry_count(&self) -> usize {
        self.geometry.len()
    }

    /// Clip rectangle of the sung region, or `None` when it has no area.
    pub fn sung_clip(&self, progress: f32) -> Option<Box2D> {
        let b = self.bounds;
        let margin = self.tuning.clip_margin * self.scale;
        let left = b.min.x - margin;
        let top = b.min.y - margin;
        let mut width = b.width() * progress + margin;
        let height = b.height() + 2.0 * margin;
        if progress > PROGRESS_COMPLETE {
            width += margin;
        }
        rect(left, top, width, height)
    }

    /// Clip rectangle of the unsung region, or `None` when it has no area.
    pub fn unsung_clip(&self, progress: f32) -> Option<Box2D> {
        let b = self.bounds;
        let margin = self.tuning.clip_margin * self.scale;
        let mut left = b.min.x + b.width() * progress;
        let top = b.min.y - margin;
        let mut width = b.width() + margin;
        let height = b.height() + 2.0 * margin;
        if progress < PROGRESS_EPSILON {
            left -= margin;
            width += margin;
        }
        rect(left, top, width, height)
    }

    /// Gradient stops of the transition band at `progress`, sung color
    /// first.
    pub fn transition_stops(&self, progress: f32, sung: Color, unsung: Color) -> Stops {
        let mut stops = [GradientStop::default(); stops::STOP_COUNT];
        self.fill_transition_stops(&mut stops, progress, sung, unsung);
        stops
    }

    fn fill_transition_stops(&self, stops: &mut Stops, progress: f32, sung: Color, unsung: Color) {
        let band = self.tuning.transition_width * self.scale / self.bounds.width();
        let end = (progress + band).min(1.0);
        stops[0] = GradientStop::new(0.0, sung);
        stops[1] = GradientStop::new(progress, sung);
        stops[2] = GradientStop::new(end, unsung);
        stops[3] = GradientStop::new(1.0, unsung);
    }

    fn draw_flat<B: Backend<Geometry = G>>(
        &self,
        backend: &mut B,
        fill: &CachedGeometry<G>,
        fill_color: Color,
        stroke_color: Color,
    ) {
        backend.draw_geometry(fill.handle(), &Brush::Solid(fill_color));
        if let Some(stroke) = self.geometry.stroke() {
            backend.draw_geometry(stroke.handle(), &Brush::Solid(stroke_color));
        }
    }

    fn draw_transition<B: Backend<Geometry = G>>(
        &self,
        backend: &mut B,
        fill: &CachedGeometry<G>,
        progress: f32,
    ) {
        let b = self.bounds;
        let start = point(b.min.x, b.min.y);
        let end = point(b.max.x, b.min.y);
        let colors = &self.colors;

        stops::with_thread_pool(|pool| {
            let mut stops = pool.rent();
            self.fill_transition_stops(&mut stops, progress, colors.fill_sung, colors.fill_unsung);
            backend.draw_geometry(
                fill.handle(),
                &Brush::LinearGradient {
                    start,
                    end,
                    stops: &stops[..],
                },
            );

            if let Some(stroke) = self.geometry.stroke() {
                stops[0].color = colors.stroke_sung;
                stops[1].color = colors.stroke_sung;
                stops[2].color = colors.stroke_unsung;
                stops[3].color = colors.stroke_unsung;
                backend.draw_geometry(
                    stroke.handle(),
                    &Brush::LinearGradient {
                        start,
                        end,
                        stops: &stops[..],
                    },
                );
            }
        });
    }
}

impl<G> LyricLine for ClassicLine<G> {
    type Geometry = G;

    fn bounds(&self) -> Box2D {
        self.bounds
    }

    fn draw<B: Backend<Geometry = Self::Geometry>>(
        &self,
        backend: &mut B,
        progress: f32,
        low_frame_rate: bool,
    ) {
        let Some(fill) = self.geometry.fill() else {
            return;
        };
        let colors = &self.colors;

        if progress > PROGRESS_EPSILON {
            if let Some(clip) = self.sung_clip(progress) {
                let mut layer = backend.clip_layer(clip);
                bloom::draw_glow(
                    &mut *layer,
                    fill,
                    progress,
                    colors.glow_sung,
                    self.scale,
                    low_frame_rate,
                    &self.tuning,
                );
                if progress > PROGRESS_COMPLETE || low_frame_rate {
                    self.draw_flat(&mut *layer, fill, colors.fill_sung, colors.stroke_sung);
                }
            }
        }

        if progress < PROGRESS_COMPLETE {
            if let Some(clip) = self.unsung_clip(progress) {
                let mut layer = backend.clip_layer(clip);
                bloom::draw_glow(
                    &mut *layer,
                    fill,
                    progress,
                    colors.glow_unsung,
                    self.scale,
                    low_frame_rate,
                    &self.tuning,
                );
                if progress < PROGRESS_EPSILON || low_frame_rate {
                    self.draw_flat(&mut *layer, fill, colors.fill_unsung, colors.stroke_unsung);
                }
            }
        }

        if !low_frame_rate && (PROGRESS_EPSILON..=PROGRESS_COMPLETE).contains(&progress) {
            self.draw_transition(backend, fill, progress);
        }

        log::trace!("drew line at progress {progress:.3} (low frame rate: {low_frame_rate})");
    }

    fn dispose<B: Backend<Geometry = Self::Geometry>>(mut self, backend: &mut B) {
        let failures = self.geometry.release_all(backend);
        if failures > 0 {
            log::warn!("{failures} cached geometries failed to release");
        }
    }
}

fn rect(left: f32, top: f32, width: f32, height: f32) -> Option<Box2D> {
    (width > 0.0 && height > 0.0)
        .then(|| Box2D::new(point(left, top), point(left + width, top + height)))
}
