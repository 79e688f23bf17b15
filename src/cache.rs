//! Cached line geometry: tessellation via lyon, backend handles, and the
//! arena that owns them.

use lyon::math::{Box2D, Point, Transform};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, StrokeTessellator,
    StrokeVertex, VertexBuffers,
};

use crate::backend::Backend;
use crate::config::{LineOptions, SizeMode};
use crate::error::Error;
use crate::geometry::{self, Geometry, TOLERANCE};
use crate::glyph::GlyphRun;
use crate::types::{Mesh, Primitive, Vertex};

/// What a cached geometry represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    /// The filled outline.
    Fill,
    /// The outline's stroke.
    Stroke,
}

/// How a stroke reacts to the drawing transform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StrokeBehavior {
    /// The stroke is tessellated at its width and scales with the transform.
    Normal,
    /// The stroke is always one device pixel wide.
    Hairline,
}

impl StrokeBehavior {
    /// Strokes wider than one unit are real outlines; thinner ones would
    /// vanish at small scales and are drawn as hairlines.
    pub fn for_width(stroke_width: f32) -> Self {
        if stroke_width > 1.0 {
            Self::Normal
        } else {
            Self::Hairline
        }
    }
}

/// A backend-resident, repeatedly drawable geometry with its bounds.
#[derive(Debug)]
pub struct CachedGeometry<G> {
    kind: GeometryKind,
    bounds: Box2D,
    handle: G,
}

impl<G> CachedGeometry<G> {
    /// Hands `mesh` to the backend.
    pub fn upload<B: Backend<Geometry = G>>(
        backend: &mut B,
        kind: GeometryKind,
        mesh: Mesh,
    ) -> Self {
        let bounds = mesh.bounds;
        Self {
            kind,
            bounds,
            handle: backend.cache_geometry(mesh),
        }
    }

    /// What the geometry represents.
    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Bounds of the tessellated mesh.
    pub fn bounds(&self) -> Box2D {
        self.bounds
    }

    /// The backend handle.
    pub fn handle(&self) -> &G {
        &self.handle
    }

    /// Gives the handle back to the backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend's release error.
    pub fn release<B: Backend<Geometry = G>>(self, backend: &mut B) -> Result<(), Error> {
        backend.release_geometry(self.handle)
    }
}

/// The cached geometries owned by one line: a fill and an optional stroke.
///
/// Everything is released together by [`release_all`](Self::release_all).
/// Dropping an arena that still holds geometry leaks the backend resources
/// and logs a warning.
#[derive(Debug)]
pub struct GeometryArena<G> {
    entries: Vec<CachedGeometry<G>>,
}

impl<G> GeometryArena<G> {
    /// An arena without geometry.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of geometries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena holds no geometry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fill geometry, if any.
    pub fn fill(&self) -> Option<&CachedGeometry<G>> {
        self.find(GeometryKind::Fill)
    }

    /// The stroke geometry, if any.
    pub fn stroke(&self) -> Option<&CachedGeometry<G>> {
        self.find(GeometryKind::Stroke)
    }

    fn find(&self, kind: GeometryKind) -> Option<&CachedGeometry<G>> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    fn push(&mut self, geometry: CachedGeometry<G>) {
        self.entries.push(geometry);
    }

    /// Releases every geometry exactly once.
    ///
    /// A failed release is logged and does not stop the remaining ones.
    /// Returns the number of failures.
    pub fn release_all<B: Backend<Geometry = G>>(&mut self, backend: &mut B) -> usize {
        let mut failures = 0;
        for entry in self.entries.drain(..) {
            let kind = entry.kind;
            if let Err(err) = entry.release(backend) {
                log::warn!("releasing {kind:?} geometry failed: {err}");
                failures += 1;
            }
        }
        failures
    }
}

impl<G> Drop for GeometryArena<G> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            log::warn!(
                "line dropped without dispose, leaking {} cached geometries",
                self.entries.len()
            );
        }
    }
}

/// Output of [`build_line_geometry`].
#[derive(Debug)]
pub struct LineGeometry<G> {
    /// Fill and optional stroke.
    pub arena: GeometryArena<G>,
    /// Stroke bounds of the line, origin-based in [`SizeMode::Draw`].
    pub bounds: Box2D,
}

/// Builds the cached fill (and stroke) geometry for a line of glyph runs.
///
/// The runs' outlines are unioned, scaled, measured and, in
/// [`SizeMode::Draw`], moved to the origin and clipped to their stroke
/// bounds. No runs, or runs without outlines, give an empty arena and zero
/// bounds.
pub fn build_line_geometry<B: Backend>(
    backend: &mut B,
    runs: &[GlyphRun<'_>],
    options: &LineOptions,
) -> LineGeometry<B::Geometry> {
    let outline = runs
        .iter()
        .filter_map(GlyphRun::outline)
        .map(Geometry::from_path)
        .reduce(Geometry::union);

    let Some(outline) = outline else {
        log::debug!("no outlines in {} glyph runs, line draws nothing", runs.len());
        return LineGeometry {
            arena: GeometryArena::empty(),
            bounds: Box2D::zero(),
        };
    };

    let mut outline = outline.transformed(&Transform::scale(options.scale, options.scale));
    let mut bounds = outline.stroke_bounds(options.stroke_width);

    if options.size_mode == SizeMode::Draw {
        let size = bounds.size();
        let origin_box = Box2D::from_size(size);
        outline = outline
            .transformed(&Transform::translation(-bounds.min.x, -bounds.min.y))
            .intersect_rect(origin_box);
        bounds = origin_box;
    }

    let mut arena = GeometryArena::empty();
    arena.push(CachedGeometry::upload(
        backend,
        GeometryKind::Fill,
        tessellate_fill(&outline),
    ));
    if options.stroke_width > 0.0 {
        let behavior = StrokeBehavior::for_width(options.stroke_width);
        arena.push(CachedGeometry::upload(
            backend,
            GeometryKind::Stroke,
            tessellate_stroke(&outline, options.stroke_width, behavior),
        ));
    }

    log::debug!(
        "built line geometry from {} runs: {} cached, bounds {:?}",
        runs.len(),
        arena.len(),
        bounds
    );
    LineGeometry { arena, bounds }
}

/// Tessellate an outline into an indexed triangle mesh.
pub fn tessellate_fill(outline: &Geometry) -> Mesh {
    let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();

    let result = tessellator.tessellate_path(
        outline.path(),
        &FillOptions::tolerance(TOLERANCE).with_fill_rule(FillRule::NonZero),
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| Vertex {
            position: vertex.position().to_array(),
        }),
    );

    match result {
        Ok(()) => Mesh::new(geometry.vertices, geometry.indices, Primitive::Triangles),
        Err(err) => {
            log::warn!("fill tessellation failed: {err:?}");
            Mesh::empty(Primitive::Triangles)
        }
    }
}

/// Tessellate an outline's stroke.
///
/// [`StrokeBehavior::Normal`] produces triangles covering the stroke at
/// `stroke_width`; [`StrokeBehavior::Hairline`] produces line segments along
/// the flattened outline.
pub fn tessellate_stroke(
    outline: &Geometry,
    stroke_width: f32,
    behavior: StrokeBehavior,
) -> Mesh {
    match behavior {
        StrokeBehavior::Normal => {
            let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
            let result = StrokeTessellator::new().tessellate_path(
                outline.path(),
                &geometry::stroke_options(stroke_width),
                &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| Vertex {
                    position: vertex.position().to_array(),
                }),
            );
            match result {
                Ok(()) => Mesh::new(geometry.vertices, geometry.indices, Primitive::Triangles),
                Err(err) => {
                    log::warn!("stroke tessellation failed: {err:?}");
                    Mesh::empty(Primitive::Triangles)
                }
            }
        }
        StrokeBehavior::Hairline => hairline_mesh(&geometry::flattened_contours(outline.path())),
    }
}

fn hairline_mesh(contours: &[Vec<Point>]) -> Mesh {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for contour in contours.iter().filter(|c| c.len() > 1) {
        let Ok(base) = u32::try_from(vertices.len()) else {
            log::warn!("hairline outline too large, truncating");
            break;
        };
        vertices.extend(contour.iter().map(|p| Vertex {
            position: p.to_array(),
        }));
        let count = u32::try_from(contour.len()).unwrap_or(0);
        for i in 0..count {
            indices.push(base + i);
            indices.push(base + (i + 1) % count);
        }
    }
    Mesh::new(vertices, indices, Primitive::Lines)
}
