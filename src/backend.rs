//! The capabilities a line consumes from a 2D graphics backend.
//!
//! A [`Backend`] owns the GPU side of cached geometry, provides axis-aligned
//! clip layers, draws cached geometry with a [`Brush`] and composites blurred
//! [`CommandList`]s. [`GlowBackend`](crate::GlowBackend) implements it on
//! OpenGL; tests use a recording implementation.

use std::ops::{Deref, DerefMut};

use lyon::math::{Box2D, Point, Transform};

use crate::cache::CachedGeometry;
use crate::error::Error;
use crate::types::{Color, GradientStop, Mesh};

/// How a cached geometry is painted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Brush<'a> {
    /// A flat color.
    Solid(Color),
    /// A linear gradient along `start`→`end`, in drawing coordinates.
    ///
    /// Positions before the first or after the last stop take that stop's
    /// color.
    LinearGradient {
        /// Where offset `0.0` lies.
        start: Point,
        /// Where offset `1.0` lies.
        end: Point,
        /// Stops in nondecreasing offset order.
        stops: &'a [GradientStop],
    },
}

/// Quality/speed trade-off hint for blur effects.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BlurOptimization {
    /// Fewest samples.
    Speed,
    /// A middle ground.
    #[default]
    Balanced,
    /// Full-resolution kernel.
    Quality,
}

/// A single recorded flat-color fill.
#[derive(Debug)]
pub struct RecordedFill<'a, G> {
    /// Geometry to fill.
    pub geometry: &'a G,
    /// Fill color.
    pub color: Color,
    /// Bounds of the geometry.
    pub bounds: Box2D,
}

/// An off-screen recording of drawing commands, used as an effect source.
#[derive(Debug)]
pub struct CommandList<'a, G> {
    fills: Vec<RecordedFill<'a, G>>,
}

impl<'a, G> CommandList<'a, G> {
    /// An empty recording.
    pub fn new() -> Self {
        Self { fills: Vec::new() }
    }

    /// Records a flat-color fill of a cached geometry.
    pub fn fill_geometry(&mut self, geometry: &'a CachedGeometry<G>, color: Color) {
        self.fills.push(RecordedFill {
            geometry: geometry.handle(),
            color,
            bounds: geometry.bounds(),
        });
    }

    /// Recorded fills, in drawing order.
    pub fn fills(&self) -> &[RecordedFill<'a, G>] {
        &self.fills
    }

    /// Tight bounds of everything recorded; zero when empty.
    pub fn bounds(&self) -> Box2D {
        self.fills
            .iter()
            .map(|fill| fill.bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(Box2D::zero)
    }
}

impl<G> Default for CommandList<'_, G> {
    fn default() -> Self {
        Self::new()
    }
}

/// A gaussian blur of a transformed [`CommandList`].
#[derive(Debug)]
pub struct BlurEffect<'a, G> {
    /// What gets blurred.
    pub source: &'a CommandList<'a, G>,
    /// Applied to the source before blurring.
    pub transform: Transform,
    /// Standard deviation of the gaussian, in drawing units.
    pub std_deviation: f32,
    /// Speed/quality hint.
    pub optimization: BlurOptimization,
}

/// A 2D drawing backend.
///
/// All calls happen on the thread owning the drawing target.
pub trait Backend {
    /// Backend handle for a cached, repeatedly drawable mesh.
    type Geometry;

    /// Uploads a mesh so it can be drawn repeatedly.
    fn cache_geometry(&mut self, mesh: Mesh) -> Self::Geometry;

    /// Releases a cached geometry. Called exactly once per handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Release`] when the backend could not free the
    /// resources behind the handle.
    fn release_geometry(&mut self, geometry: Self::Geometry) -> Result<(), Error>;

    /// Restricts drawing to `rect`, intersected with any enclosing clip.
    fn push_clip(&mut self, rect: Box2D);

    /// Undoes the matching [`push_clip`](Self::push_clip).
    fn pop_clip(&mut self);

    /// Draws a cached geometry.
    fn draw_geometry(&mut self, geometry: &Self::Geometry, brush: &Brush<'_>);

    /// Draws a blurred, transformed command list.
    fn draw_blurred(&mut self, effect: &BlurEffect<'_, Self::Geometry>);

    /// Pushes a clip and returns a guard that pops it when dropped.
    fn clip_layer(&mut self, rect: Box2D) -> ClipLayer<'_, Self>
    where
        Self: Sized,
    {
        self.push_clip(rect);
        ClipLayer { backend: self }
    }
}

/// A scoped clip layer; see [`Backend::clip_layer`].
#[derive(Debug)]
pub struct ClipLayer<'a, B: Backend> {
    backend: &'a mut B,
}

impl<B: Backend> Deref for ClipLayer<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: Backend> DerefMut for ClipLayer<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: Backend> Drop for ClipLayer<'_, B> {
    fn drop(&mut self) {
        self.backend.pop_clip();
    }
}

#[cfg(test)]
mod tests {
    use lyon::math::point;

    use super::*;
    use crate::testing::{Command, RecordingBackend};

    #[test]
    fn clip_layer_pops_on_drop() {
        let mut backend = RecordingBackend::default();
        {
            let mut layer = backend.clip_layer(Box2D::new(point(0.0, 0.0), point(1.0, 1.0)));
            layer.push_clip(Box2D::new(point(0.0, 0.0), point(0.5, 0.5)));
            layer.pop_clip();
        }
        assert_eq!(backend.clip_depth(), 0);
        assert!(matches!(backend.commands.last(), Some(Command::PopClip)));
    }

    #[test]
    fn command_list_bounds_cover_all_fills() {
        let mut backend = RecordingBackend::default();
        let a = CachedGeometry::upload(
            &mut backend,
            crate::cache::GeometryKind::Fill,
            crate::testing::quad_mesh(0.0, 0.0, 1.0, 1.0),
        );
        let b = CachedGeometry::upload(
            &mut backend,
            crate::cache::GeometryKind::Fill,
            crate::testing::quad_mesh(4.0, -2.0, 5.0, 0.5),
        );
        let mut list = CommandList::new();
        assert_eq!(list.bounds(), Box2D::zero());
        list.fill_geometry(&a, [1.0; 4]);
        list.fill_geometry(&b, [1.0; 4]);
        assert_eq!(list.fills().len(), 2);
        assert_eq!(
            list.bounds(),
            Box2D::new(point(0.0, -2.0), point(5.0, 1.0))
        );
    }
}
