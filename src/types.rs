//! Plain data shared between the geometry builder, the renderer and the
//! backends.

use bytemuck::{Pod, Zeroable};
use lyon::math::{point, Box2D};

/// A straight-alpha RGBA color with components in `0.0..=1.0`.
pub type Color = [f32; 4];

/// A vertex in a tessellated outline, ready for the GPU.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Position in drawing coordinates.
    pub position: [f32; 2],
}

/// How the indices of a [`Mesh`] are to be assembled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Every three indices form a filled triangle.
    Triangles,
    /// Every two indices form a one-pixel line segment.
    ///
    /// Used for hairline strokes, which stay one device pixel wide regardless
    /// of the active transform.
    Lines,
}

/// A tessellated outline stored as indexed vertex data.
///
/// Produced once at line construction and handed to
/// [`Backend::cache_geometry`](crate::Backend::cache_geometry), which turns
/// it into a repeatedly drawable handle.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<Vertex>,
    /// Indices into [`vertices`](Self::vertices).
    pub indices: Vec<u32>,
    /// How [`indices`](Self::indices) are assembled.
    pub primitive: Primitive,
    /// Tight bounds of all vertices.
    pub bounds: Box2D,
}

impl Mesh {
    /// A mesh without any vertices.
    pub fn empty(primitive: Primitive) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            primitive,
            bounds: Box2D::zero(),
        }
    }

    /// Builds a mesh and computes its bounds from the vertices.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, primitive: Primitive) -> Self {
        let bounds = vertex_bounds(&vertices);
        Self {
            vertices,
            indices,
            primitive,
            bounds,
        }
    }

    /// Whether the mesh would draw nothing.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A single stop of a linear gradient.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient line, `0.0..=1.0`.
    pub offset: f32,
    /// Color at [`offset`](Self::offset).
    pub color: Color,
}

impl GradientStop {
    /// Creates a stop.
    pub const fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// Compute the axis-aligned bounds of a vertex slice.
///
/// Returns a zero box for an empty slice.
pub fn vertex_bounds(vertices: &[Vertex]) -> Box2D {
    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for v in vertices {
        for axis in 0..2 {
            min[axis] = min[axis].min(v.position[axis]);
            max[axis] = max[axis].max(v.position[axis]);
        }
    }
    if max[0] < min[0] || max[1] < min[1] {
        Box2D::zero()
    } else {
        Box2D::new(point(min[0], min[1]), point(max[0], max[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_box_eq(actual: Box2D, expected: [f32; 4]) {
        let got = [actual.min.x, actual.min.y, actual.max.x, actual.max.y];
        assert!(
            got.iter()
                .zip(expected.iter())
                .all(|(a, b)| (a - b).abs() < f32::EPSILON),
            "expected {expected:?}, got {got:?}",
        );
    }

    #[test]
    fn vertex_bounds_known_values() {
        let vertices = [
            Vertex {
                position: [5.0, 1.0],
            },
            Vertex {
                position: [2.0, 3.0],
            },
            Vertex {
                position: [8.0, 2.0],
            },
        ];
        assert_box_eq(vertex_bounds(&vertices), [2.0, 1.0, 8.0, 3.0]);
    }

    #[test]
    fn vertex_bounds_empty_returns_zero_box() {
        assert_box_eq(vertex_bounds(&[]), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn vertex_bounds_single_vertex() {
        let vertices = [Vertex {
            position: [3.0, 7.0],
        }];
        let bounds = vertex_bounds(&vertices);
        assert_box_eq(bounds, [3.0, 7.0, 3.0, 7.0]);
        assert!(bounds.width().abs() < f32::EPSILON);
    }

    #[test]
    fn vertex_bounds_negative_coordinates() {
        let vertices = [
            Vertex {
                position: [-5.0, -10.0],
            },
            Vertex {
                position: [5.0, 10.0],
            },
        ];
        assert_box_eq(vertex_bounds(&vertices), [-5.0, -10.0, 5.0, 10.0]);
    }

    #[test]
    fn mesh_new_computes_bounds() {
        let mesh = Mesh::new(
            vec![
                Vertex {
                    position: [0.0, 0.0],
                },
                Vertex {
                    position: [4.0, 0.0],
                },
                Vertex {
                    position: [0.0, 2.0],
                },
            ],
            vec![0, 1, 2],
            Primitive::Triangles,
        );
        assert!(!mesh.is_empty());
        assert_box_eq(mesh.bounds, [0.0, 0.0, 4.0, 2.0]);
        assert!(Mesh::empty(Primitive::Lines).is_empty());
    }
}
