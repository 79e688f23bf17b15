//! Owned vector outlines and the boolean/affine operations the line builder
//! needs.
//!
//! Outlines use non-zero fill semantics. Union is computed from the non-zero
//! tessellation of both operands, each first reduced to its own coverage
//! outline: every triangle edge that is not shared with a neighbouring
//! triangle lies on the boundary of the covered area, and chaining those
//! edges yields the outline of the union. Rectangle
//! intersection clips the flattened contours against each rectangle edge in
//! turn.

use std::collections::HashMap;

use lyon::math::{point, Box2D, Point, Transform};
use lyon::path::iterator::PathIterator;
use lyon::path::{Path, PathEvent};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, LineJoin, StrokeOptions,
    StrokeTessellator, StrokeVertex, VertexBuffers,
};

/// Flattening tolerance, in drawing units.
pub const TOLERANCE: f32 = 0.01;

/// Miter limit used for strokes and their bounds.
pub const MITER_LIMIT: f32 = 10.0;

/// A vector outline with non-zero fill semantics.
///
/// Operations that combine outlines consume their operands, so intermediate
/// results of a fold are dropped as soon as they have been folded in.
#[derive(Clone, Debug)]
pub struct Geometry {
    path: Path,
}

impl Geometry {
    /// Wraps an existing path.
    pub fn from_path(path: Path) -> Self {
        Self { path }
    }

    /// An axis-aligned rectangle.
    pub fn rectangle(rect: Box2D) -> Self {
        let mut builder = Path::builder();
        builder.begin(rect.min);
        builder.line_to(point(rect.max.x, rect.min.y));
        builder.line_to(rect.max);
        builder.line_to(point(rect.min.x, rect.max.y));
        builder.close();
        Self {
            path: builder.build(),
        }
    }

    /// The underlying path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the outline has no contours.
    pub fn is_empty(&self) -> bool {
        self.path.iter().next().is_none()
    }

    /// Applies an affine transform.
    #[must_use]
    pub fn transformed(self, transform: &Transform) -> Self {
        Self {
            path: self.path.transformed(transform),
        }
    }

    /// Geometric union of two outlines.
    ///
    /// Overlapping areas are covered once; the result's contours follow the
    /// outer boundary of the combined area (holes stay holes). Each operand
    /// is first reduced to its own coverage outline, so operands wound in
    /// opposite directions do not cancel where they overlap.
    #[must_use]
    pub fn union(self, other: Geometry) -> Self {
        let mut builder = Path::builder();
        append_events(&mut builder, &self.normalized().path);
        append_events(&mut builder, &other.normalized().path);
        let combined = builder.build();

        match coverage_outline(&combined) {
            Some(outline) => Self { path: outline },
            None => {
                log::debug!("union produced no boundary, keeping overlapping contours");
                Self { path: combined }
            }
        }
    }

    /// The outline of this geometry's own non-zero coverage. Outer contours
    /// have positive signed area and holes negative.
    fn normalized(self) -> Self {
        if self.is_empty() {
            return self;
        }
        match coverage_outline(&self.path) {
            Some(path) => Self { path },
            None => self,
        }
    }

    /// Clips the outline to an axis-aligned rectangle.
    #[must_use]
    pub fn intersect_rect(self, rect: Box2D) -> Self {
        let mut builder = Path::builder();
        for contour in flattened_contours(&self.path) {
            let clipped = clip_polygon(&contour, &rect);
            push_polygon(&mut builder, &clipped);
        }
        Self {
            path: builder.build(),
        }
    }

    /// Tight bounds of the filled area.
    pub fn bounds(&self) -> Box2D {
        let contours = flattened_contours(&self.path);
        if contours.iter().all(Vec::is_empty) {
            return Box2D::zero();
        }
        Box2D::from_points(contours.iter().flatten())
    }

    /// Bounds of the area touched when the outline is filled and then stroked
    /// with `stroke_width`, including miter joins.
    pub fn stroke_bounds(&self, stroke_width: f32) -> Box2D {
        let fill = self.bounds();
        if stroke_width <= 0.0 || self.is_empty() {
            return fill;
        }

        let mut buffers: VertexBuffers<Point, u32> = VertexBuffers::new();
        let result = StrokeTessellator::new().tessellate_path(
            &self.path,
            &stroke_options(stroke_width),
            &mut BuffersBuilder::new(&mut buffers, |vertex: StrokeVertex| vertex.position()),
        );
        if let Err(err) = result {
            log::warn!("stroke bounds tessellation failed: {err:?}");
            return fill;
        }
        Box2D::from_points(buffers.vertices.iter().chain([&fill.min, &fill.max]))
    }
}

/// Stroke options shared by stroke tessellation and stroke bounds.
pub fn stroke_options(stroke_width: f32) -> StrokeOptions {
    StrokeOptions::tolerance(TOLERANCE)
        .with_line_width(stroke_width)
        .with_line_join(LineJoin::Miter)
        .with_miter_limit(MITER_LIMIT)
}

fn append_events(builder: &mut lyon::path::path::Builder, path: &Path) {
    for event in path.iter() {
        match event {
            PathEvent::Begin { at } => {
                builder.begin(at);
            }
            PathEvent::Line { to, .. } => {
                builder.line_to(to);
            }
            PathEvent::Quadratic { ctrl, to, .. } => {
                builder.quadratic_bezier_to(ctrl, to);
            }
            PathEvent::Cubic {
                ctrl1, ctrl2, to, ..
            } => {
                builder.cubic_bezier_to(ctrl1, ctrl2, to);
            }
            PathEvent::End { close, .. } => builder.end(close),
        }
    }
}

fn push_polygon(builder: &mut lyon::path::path::Builder, polygon: &[Point]) {
    let Some((first, rest)) = polygon.split_first() else {
        return;
    };
    if rest.len() < 2 {
        return;
    }
    builder.begin(*first);
    for p in rest {
        builder.line_to(*p);
    }
    builder.close();
}

/// Splits a path into flattened contours, one point list per contour.
pub(crate) fn flattened_contours(path: &Path) -> Vec<Vec<Point>> {
    let mut contours = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for event in path.iter().flattened(TOLERANCE) {
        match event {
            PathEvent::Begin { at } => {
                current.clear();
                current.push(at);
            }
            PathEvent::Line { to, .. } => current.push(to),
            PathEvent::End { .. } => {
                if current.len() > 1 && current.first() == current.last() {
                    current.pop();
                }
                contours.push(std::mem::take(&mut current));
            }
            // Flattening only emits lines.
            PathEvent::Quadratic { to, .. } | PathEvent::Cubic { to, .. } => current.push(to),
        }
    }
    contours
}

/// Largest distance from a segment at which a vertex still counts as lying
/// on it.
const ON_EDGE_DISTANCE: f32 = TOLERANCE * 0.01;

/// Hash key of a vertex position. `-0.0` and `0.0` share a key.
fn vertex_key(p: Point) -> (u32, u32) {
    ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits())
}

/// Directed edge multiset where an edge cancels against its reverse.
#[derive(Default)]
struct BoundaryEdges {
    counts: HashMap<(u32, u32), u32>,
}

impl BoundaryEdges {
    fn add(&mut self, from: u32, to: u32) {
        if let Some(count) = self.counts.get_mut(&(to, from)) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&(to, from));
            }
        } else {
            *self.counts.entry((from, to)).or_insert(0) += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Remaining edges, each repeated by its multiplicity, in a stable
    /// order.
    fn sorted(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<(u32, u32)> = self
            .counts
            .iter()
            .flat_map(|(&edge, &count)| std::iter::repeat_n(edge, count as usize))
            .collect();
        edges.sort_unstable();
        edges
    }
}

/// Whether `p` lies strictly between `a` and `b` on the segment `a`-`b`.
fn lies_inside_segment(p: Point, a: Point, b: Point) -> bool {
    let ab = b - a;
    let e = ON_EDGE_DISTANCE;
    if p.x < a.x.min(b.x) - e
        || p.x > a.x.max(b.x) + e
        || p.y < a.y.min(b.y) - e
        || p.y > a.y.max(b.y) + e
    {
        return false;
    }
    let length = ab.length();
    if length <= ON_EDGE_DISTANCE || p == a || p == b {
        return false;
    }
    let distance = ab.cross(p - a).abs() / length;
    let t = ab.dot(p - a) / (length * length);
    distance <= ON_EDGE_DISTANCE && t > 0.0 && t < 1.0
}

/// Splits every edge at the boundary vertices lying on it, so that edges
/// meeting a T-junction from the other side can cancel.
fn split_at_junctions(edges: &BoundaryEdges, points: &[Point]) -> BoundaryEdges {
    let mut vertices: Vec<u32> = edges.counts.keys().flat_map(|&(a, b)| [a, b]).collect();
    vertices.sort_unstable();
    vertices.dedup();

    let mut split = BoundaryEdges::default();
    for (from, to) in edges.sorted() {
        let (a, b) = (points[from as usize], points[to as usize]);
        let ab = b - a;
        let mut inner: Vec<(f32, u32)> = vertices
            .iter()
            .copied()
            .filter(|&v| lies_inside_segment(points[v as usize], a, b))
            .map(|v| (ab.dot(points[v as usize] - a), v))
            .collect();
        inner.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut current = from;
        for (_, v) in inner {
            split.add(current, v);
            current = v;
        }
        split.add(current, to);
    }
    split
}

/// Drops vertices that lie on the segment joining their neighbours.
fn remove_collinear(polygon: Vec<Point>) -> Vec<Point> {
    let mut points = polygon;
    loop {
        let n = points.len();
        if n < 3 {
            return points;
        }
        let redundant = (0..n).find(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            let p = points[i];
            p == prev || lies_inside_segment(p, prev, next)
        });
        match redundant {
            Some(i) => {
                points.remove(i);
            }
            None => return points,
        }
    }
}

fn signed_area(polygon: &[Point]) -> f32 {
    let n = polygon.len();
    (0..n)
        .map(|i| polygon[i].to_vector().cross(polygon[(i + 1) % n].to_vector()))
        .sum::<f32>()
        * 0.5
}

/// Boundary of the non-zero coverage of `path`, as closed polygons.
///
/// Outer contours wind one way and holes the other, so the result fills the
/// same area under the non-zero rule without any overlap.
fn coverage_outline(path: &Path) -> Option<Path> {
    let mut buffers: VertexBuffers<Point, u32> = VertexBuffers::new();
    let result = FillTessellator::new().tessellate_path(
        path,
        &FillOptions::tolerance(TOLERANCE).with_fill_rule(FillRule::NonZero),
        &mut BuffersBuilder::new(&mut buffers, |vertex: FillVertex| vertex.position()),
    );
    if let Err(err) = result {
        log::warn!("union tessellation failed: {err:?}");
        return None;
    }

    // The tessellator may emit the same position more than once.
    let mut canonical: HashMap<(u32, u32), u32> = HashMap::new();
    let mut points: Vec<Point> = Vec::new();
    let ids: Vec<u32> = buffers
        .vertices
        .iter()
        .map(|p| {
            *canonical.entry(vertex_key(*p)).or_insert_with(|| {
                points.push(*p);
                u32::try_from(points.len() - 1).unwrap_or(u32::MAX)
            })
        })
        .collect();

    // Directed edges of consistently oriented triangles; an interior edge
    // appears once in each direction and cancels out.
    let mut edges = BoundaryEdges::default();
    for tri in buffers.indices.chunks_exact(3) {
        let [mut a, mut b, c] = [
            ids[tri[0] as usize],
            ids[tri[1] as usize],
            ids[tri[2] as usize],
        ];
        if a == b || b == c || a == c {
            continue;
        }
        let (pa, pb, pc) = (points[a as usize], points[b as usize], points[c as usize]);
        let area = (pb - pa).cross(pc - pa);
        if area == 0.0 {
            continue;
        }
        if area < 0.0 {
            std::mem::swap(&mut a, &mut b);
        }
        edges.add(a, b);
        edges.add(b, c);
        edges.add(c, a);
    }
    let edges = split_at_junctions(&edges, &points);
    if edges.is_empty() {
        return None;
    }

    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    for (from, to) in edges.sorted() {
        outgoing.entry(from).or_default().push(to);
    }

    let mut builder = Path::builder();
    let mut starts: Vec<u32> = outgoing.keys().copied().collect();
    starts.sort_unstable();
    for start in starts {
        while let Some(next) = outgoing.get_mut(&start).and_then(Vec::pop) {
            let mut polygon = vec![points[start as usize]];
            let mut current = next;
            while current != start {
                polygon.push(points[current as usize]);
                let Some(step) = outgoing.get_mut(&current).and_then(Vec::pop) else {
                    log::trace!("open boundary chain at vertex {current}, closing it");
                    break;
                };
                current = step;
            }
            let polygon = remove_collinear(polygon);
            if signed_area(&polygon).abs() > ON_EDGE_DISTANCE * ON_EDGE_DISTANCE {
                push_polygon(&mut builder, &polygon);
            }
        }
    }
    Some(builder.build())
}

/// Clips a closed polygon against a rectangle, one edge at a time.
fn clip_polygon(polygon: &[Point], rect: &Box2D) -> Vec<Point> {
    let mut output = polygon.to_vec();
    for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
        let Some(&last) = output.last() else {
            break;
        };
        let input = std::mem::take(&mut output);
        let mut prev = last;
        for &current in &input {
            let current_in = edge.inside(current, rect);
            let prev_in = edge.inside(prev, rect);
            if current_in {
                if !prev_in {
                    output.push(edge.intersect(prev, current, rect));
                }
                output.push(current);
            } else if prev_in {
                output.push(edge.intersect(prev, current, rect));
            }
            prev = current;
        }
    }
    output
}

#[derive(Copy, Clone)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    fn inside(self, p: Point, rect: &Box2D) -> bool {
        match self {
            Self::Left => p.x >= rect.min.x,
            Self::Right => p.x <= rect.max.x,
            Self::Top => p.y >= rect.min.y,
            Self::Bottom => p.y <= rect.max.y,
        }
    }

    /// Where segment `a`-`b` crosses this edge. Only called for segments
    /// with one end on each side.
    fn intersect(self, a: Point, b: Point, rect: &Box2D) -> Point {
        match self {
            Self::Left | Self::Right => {
                let x = if matches!(self, Self::Left) {
                    rect.min.x
                } else {
                    rect.max.x
                };
                let t = (x - a.x) / (b.x - a.x);
                point(x, a.y + (b.y - a.y) * t)
            }
            Self::Top | Self::Bottom => {
                let y = if matches!(self, Self::Top) {
                    rect.min.y
                } else {
                    rect.max.y
                };
                let t = (y - a.y) / (b.y - a.y);
                point(a.x + (b.x - a.x) * t, y)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::approx_eq;

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Geometry {
        Geometry::rectangle(Box2D::new(point(x0, y0), point(x1, y1)))
    }

    fn contour_count(geometry: &Geometry) -> usize {
        geometry
            .path()
            .iter()
            .filter(|e| matches!(e, PathEvent::Begin { .. }))
            .count()
    }

    /// Signed area under the non-zero rule, summed over contours.
    fn area(geometry: &Geometry) -> f32 {
        flattened_contours(geometry.path())
            .iter()
            .map(|c| {
                let n = c.len();
                (0..n)
                    .map(|i| {
                        let (a, b) = (c[i], c[(i + 1) % n]);
                        a.x * b.y - b.x * a.y
                    })
                    .sum::<f32>()
                    * 0.5
            })
            .sum::<f32>()
            .abs()
    }

    #[test]
    fn union_of_overlapping_squares_is_one_contour() {
        let merged = square(0.0, 0.0, 2.0, 2.0).union(square(1.0, 1.0, 3.0, 3.0));
        assert_eq!(contour_count(&merged), 1);
        assert!(approx_eq(area(&merged), 7.0));
        let bounds = merged.bounds();
        assert!(approx_eq(bounds.min.x, 0.0));
        assert!(approx_eq(bounds.max.x, 3.0));
    }

    fn reversed_square(x0: f32, y0: f32, x1: f32, y1: f32) -> Geometry {
        let mut builder = Path::builder();
        builder.begin(point(x0, y0));
        builder.line_to(point(x0, y1));
        builder.line_to(point(x1, y1));
        builder.line_to(point(x1, y0));
        builder.close();
        Geometry::from_path(builder.build())
    }

    #[test]
    fn union_of_opposite_windings_fills_overlap_once() {
        let merged = square(0.0, 0.0, 2.0, 2.0).union(reversed_square(1.0, 0.0, 3.0, 2.0));
        assert_eq!(contour_count(&merged), 1);
        assert!(approx_eq(area(&merged), 6.0));
        let bounds = merged.bounds();
        assert!(approx_eq(bounds.min.x, 0.0));
        assert!(approx_eq(bounds.max.x, 3.0));
        assert!(approx_eq(bounds.max.y, 2.0));
    }

    #[test]
    fn union_of_opposite_circles_covers_both() {
        let circle = |cx: f32, reversed: bool| {
            let mut builder = Path::builder();
            let steps = 64;
            for i in 0..steps {
                #[allow(clippy::cast_precision_loss)]
                let mut angle = i as f32 / steps as f32 * std::f32::consts::TAU;
                if reversed {
                    angle = -angle;
                }
                let p = point(cx + 10.0 * angle.cos(), 10.0 * angle.sin());
                if i == 0 {
                    builder.begin(p);
                } else {
                    builder.line_to(p);
                }
            }
            builder.close();
            Geometry::from_path(builder.build())
        };
        let left = circle(0.0, false);
        let single = area(&left);
        let merged = left.union(circle(10.0, true));
        assert_eq!(contour_count(&merged), 1);
        // Two circles of radius r at distance r overlap by (2π/3 - √3/2) r².
        let overlap = (2.0 * std::f32::consts::PI / 3.0 - 3.0_f32.sqrt() / 2.0) * 100.0;
        let expected = 2.0 * single - overlap;
        assert!((area(&merged) - expected).abs() < 2.0, "{}", area(&merged));
    }

    #[test]
    fn negative_zero_shares_vertex_key() {
        assert_eq!(vertex_key(point(-0.0, 1.0)), vertex_key(point(0.0, 1.0)));
        assert_eq!(vertex_key(point(2.0, -0.0)), vertex_key(point(2.0, 0.0)));

        let merged = square(-0.0, -0.0, 2.0, 2.0).union(square(0.0, 0.0, 2.0, 2.0));
        assert_eq!(contour_count(&merged), 1);
        assert!(approx_eq(area(&merged), 4.0));
    }

    #[test]
    fn bounds_cover_every_point() {
        let merged = square(0.0, 0.0, 2.0, 2.0).union(square(5.0, 1.0, 6.0, 4.0));
        let bounds = merged.bounds();
        assert!(approx_eq(bounds.min.x, 0.0));
        assert!(approx_eq(bounds.min.y, 0.0));
        assert!(approx_eq(bounds.max.x, 6.0));
        assert!(approx_eq(bounds.max.y, 4.0));
    }

    #[test]
    fn union_of_disjoint_squares_keeps_both() {
        let merged = square(0.0, 0.0, 1.0, 1.0).union(square(5.0, 0.0, 6.0, 1.0));
        assert_eq!(contour_count(&merged), 2);
        assert!(approx_eq(area(&merged), 2.0));
    }

    #[test]
    fn union_with_contained_square_drops_inner_edges() {
        let merged = square(0.0, 0.0, 4.0, 4.0).union(square(1.0, 1.0, 2.0, 2.0));
        assert_eq!(contour_count(&merged), 1);
        assert!(approx_eq(area(&merged), 16.0));
    }

    #[test]
    fn union_preserves_holes() {
        // Outer square and a reversed inner square form a frame.
        let mut builder = Path::builder();
        builder.begin(point(0.0, 0.0));
        builder.line_to(point(4.0, 0.0));
        builder.line_to(point(4.0, 4.0));
        builder.line_to(point(0.0, 4.0));
        builder.close();
        builder.begin(point(1.0, 1.0));
        builder.line_to(point(1.0, 3.0));
        builder.line_to(point(3.0, 3.0));
        builder.line_to(point(3.0, 1.0));
        builder.close();
        let frame = Geometry::from_path(builder.build());
        let merged = frame.union(square(10.0, 0.0, 11.0, 1.0));
        assert_eq!(contour_count(&merged), 3);

        let mut buffers: VertexBuffers<Point, u32> = VertexBuffers::new();
        FillTessellator::new()
            .tessellate_path(
                merged.path(),
                &FillOptions::tolerance(TOLERANCE),
                &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| v.position()),
            )
            .unwrap();
        let covered: f32 = buffers
            .indices
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (
                    buffers.vertices[t[0] as usize],
                    buffers.vertices[t[1] as usize],
                    buffers.vertices[t[2] as usize],
                );
                ((b - a).cross(c - a) * 0.5).abs()
            })
            .sum();
        assert!(approx_eq(covered, 13.0));
    }

    #[test]
    fn intersect_rect_clips_overflow() {
        let window = Box2D::new(point(0.0, 0.0), point(2.0, 2.0));
        let clipped = square(-1.0, -1.0, 3.0, 3.0).intersect_rect(window);
        let bounds = clipped.bounds();
        assert!(approx_eq(bounds.min.x, 0.0));
        assert!(approx_eq(bounds.min.y, 0.0));
        assert!(approx_eq(bounds.max.x, 2.0));
        assert!(approx_eq(bounds.max.y, 2.0));
        assert!(approx_eq(area(&clipped), 4.0));
    }

    #[test]
    fn intersect_rect_drops_outside_contours() {
        let geometry = square(0.0, 0.0, 1.0, 1.0).union(square(10.0, 10.0, 11.0, 11.0));
        let clipped = geometry.intersect_rect(Box2D::new(point(0.0, 0.0), point(2.0, 2.0)));
        assert_eq!(contour_count(&clipped), 1);
    }

    #[test]
    fn transformed_scales_bounds() {
        let scaled = square(1.0, 2.0, 3.0, 4.0).transformed(&Transform::scale(2.0, 2.0));
        let bounds = scaled.bounds();
        assert!(approx_eq(bounds.min.x, 2.0));
        assert!(approx_eq(bounds.min.y, 4.0));
        assert!(approx_eq(bounds.max.x, 6.0));
        assert!(approx_eq(bounds.max.y, 8.0));
    }

    #[test]
    fn stroke_bounds_extend_past_fill() {
        let geometry = square(0.0, 0.0, 10.0, 10.0);
        let fill = geometry.stroke_bounds(0.0);
        assert!(approx_eq(fill.min.x, 0.0));
        assert!(approx_eq(fill.max.x, 10.0));

        let stroked = geometry.stroke_bounds(2.0);
        assert!(approx_eq(stroked.min.x, -1.0));
        assert!(approx_eq(stroked.min.y, -1.0));
        assert!(approx_eq(stroked.max.x, 11.0));
        assert!(approx_eq(stroked.max.y, 11.0));
    }

    #[test]
    fn empty_geometry_has_zero_bounds() {
        let empty = Geometry::from_path(Path::new());
        assert!(empty.is_empty());
        assert_eq!(empty.bounds(), Box2D::zero());
        assert_eq!(empty.stroke_bounds(3.0), Box2D::zero());
    }
}
