//! Test doubles shared by the unit tests.

use std::collections::HashSet;

use lyon::math::{point, Box2D, Point, Transform};
use lyon::path::Path;

use crate::backend::{Backend, BlurEffect, BlurOptimization, Brush};
use crate::error::Error;
use crate::glyph::OutlineSource;
use crate::types::{Color, GradientStop, Mesh, Primitive, Vertex};

/// Float comparison with a tolerance suited to tessellated output.
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

/// Bounds of every endpoint and control point in `path`.
pub fn path_bounds(path: &Path) -> Box2D {
    lyon::algorithms::aabb::bounding_box(path.iter())
}

/// A font whose glyph 1 is a box and whose other glyphs are blank.
///
/// The box spans (50, 0)..(550, 700) in a 1000-unit em, so at a font size of
/// 10 it covers x 0.5..5.5 and sits 7 units above the baseline.
#[derive(Debug, Default)]
pub struct BoxFont;

impl OutlineSource for BoxFont {
    fn units_per_em(&self) -> f32 {
        1000.0
    }

    fn outline_glyph(&self, glyph_id: u16, builder: &mut dyn ttf_parser::OutlineBuilder) -> bool {
        if glyph_id != 1 {
            return false;
        }
        builder.move_to(50.0, 0.0);
        builder.line_to(550.0, 0.0);
        builder.line_to(550.0, 700.0);
        builder.line_to(50.0, 700.0);
        builder.close();
        true
    }
}

/// An axis-aligned quad as a two-triangle mesh.
pub fn quad_mesh(x0: f32, y0: f32, x1: f32, y1: f32) -> Mesh {
    let vertices = [point(x0, y0), point(x1, y0), point(x1, y1), point(x0, y1)]
        .iter()
        .map(|p: &Point| Vertex {
            position: p.to_array(),
        })
        .collect();
    Mesh::new(vertices, vec![0, 1, 2, 0, 2, 3], Primitive::Triangles)
}

/// A brush with its borrowed stops copied out.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedBrush {
    Solid(Color),
    Gradient {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
    },
}

/// A call made on a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    PushClip(Box2D),
    PopClip,
    Draw {
        geometry: usize,
        brush: RecordedBrush,
    },
    Blur {
        sources: Vec<(usize, Color)>,
        transform: Transform,
        std_deviation: f32,
        optimization: BlurOptimization,
    },
}

/// A backend that records every call instead of drawing.
///
/// Geometry handles are indices into `meshes`.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub commands: Vec<Command>,
    pub meshes: Vec<Mesh>,
    pub created: Vec<usize>,
    pub released: Vec<usize>,
    pub release_attempts: Vec<usize>,
    /// Handles whose release reports an error.
    pub fail_release: HashSet<usize>,
}

impl RecordingBackend {
    pub fn mesh(&self, id: usize) -> &Mesh {
        &self.meshes[id]
    }

    /// Clips pushed and not yet popped.
    pub fn clip_depth(&self) -> usize {
        self.commands.iter().fold(0, |depth, command| match command {
            Command::PushClip(_) => depth + 1,
            Command::PopClip => depth - 1,
            _ => depth,
        })
    }
}

impl Backend for RecordingBackend {
    type Geometry = usize;

    fn cache_geometry(&mut self, mesh: Mesh) -> usize {
        let id = self.meshes.len();
        self.meshes.push(mesh);
        self.created.push(id);
        id
    }

    fn release_geometry(&mut self, geometry: usize) -> Result<(), Error> {
        self.release_attempts.push(geometry);
        if self.fail_release.contains(&geometry) {
            return Err(Error::Release(format!("geometry {geometry} is busy")));
        }
        assert!(
            !self.released.contains(&geometry),
            "geometry {geometry} released twice"
        );
        self.released.push(geometry);
        Ok(())
    }

    fn push_clip(&mut self, rect: Box2D) {
        self.commands.push(Command::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.commands.push(Command::PopClip);
    }

    fn draw_geometry(&mut self, geometry: &usize, brush: &Brush<'_>) {
        let brush = match *brush {
            Brush::Solid(color) => RecordedBrush::Solid(color),
            Brush::LinearGradient { start, end, stops } => RecordedBrush::Gradient {
                start,
                end,
                stops: stops.to_vec(),
            },
        };
        self.commands.push(Command::Draw {
            geometry: *geometry,
            brush,
        });
    }

    fn draw_blurred(&mut self, effect: &BlurEffect<'_, usize>) {
        self.commands.push(Command::Blur {
            sources: effect
                .source
                .fills()
                .iter()
                .map(|fill| (*fill.geometry, fill.color))
                .collect(),
            transform: effect.transform,
            std_deviation: effect.std_deviation,
            optimization: effect.optimization,
        });
    }
}
