//! Progressive karaoke rendering of a single lyric line.
//!
//! A line is built once from shaped [`GlyphRun`]s: the glyph outlines are
//! unioned into one geometry, tessellated via [lyon] and cached on a
//! [`Backend`]. Every frame it is drawn with a progress value in `[0, 1]`:
//! the part left of the progress boundary in the "sung" palette, the rest in
//! the "unsung" palette, with a soft gradient band at the boundary and a
//! blurred glow behind each region.
//!
//! [`GlowBackend`] implements [`Backend`] on OpenGL via [glow] (feature
//! `glow`, on by default). Any other 2D API can be plugged in by
//! implementing [`Backend`].
//!
//! # Features
//!
//! - **Outline union** of overlapping glyphs, so strokes and glows do not
//!   double up where glyphs touch.
//! - **Optional stroke**, tessellated at its width or drawn as a hairline
//!   when one unit wide or thinner.
//! - **Low-frame-rate mode** that drops the glow and the gradient band.
//! - **Natural or draw-size geometry**: keep the runs' placement, or move
//!   the line to the origin and clip it to its stroke bounds.
//!
//! # Safety
//!
//! Creating and using a [`GlowBackend`] requires a valid, current OpenGL
//! context. Its frame methods are `unsafe` because they issue raw GL calls.
//!
//! [glow]: https://docs.rs/glow
//! [lyon]: https://docs.rs/lyon

mod backend;
mod bloom;
mod cache;
mod config;
mod error;
mod geometry;
mod glyph;
mod line;
#[cfg(feature = "glow")]
mod render;
#[cfg(feature = "glow")]
mod shaders;
mod stops;
#[cfg(test)]
mod testing;
mod types;

pub use backend::{
    Backend, BlurEffect, BlurOptimization, Brush, ClipLayer, CommandList, RecordedFill,
};
pub use bloom::{draw_glow, glow_radius, glow_transform};
pub use cache::{
    build_line_geometry, tessellate_fill, tessellate_stroke, CachedGeometry, GeometryArena,
    GeometryKind, LineGeometry, StrokeBehavior,
};
pub use config::{ColorSet, GlowTuning, LineOptions, SizeMode};
pub use error::Error;
pub use geometry::{stroke_options, Geometry, TOLERANCE};
pub use glyph::{Glyph, GlyphOrientation, GlyphRun, OutlineSource};
pub use line::{
    ClassicLine, LineDrawing, LineStyle, LyricLine, PROGRESS_COMPLETE, PROGRESS_EPSILON,
};
#[cfg(feature = "glow")]
pub use render::{GlGeometry, GlowBackend};
pub use stops::{with_thread_pool, GradientStopPool, Stops, StopsRental, STOP_COUNT};
pub use types::{vertex_bounds, Color, GradientStop, Mesh, Primitive, Vertex};
