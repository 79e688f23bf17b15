//! The directional glow trailing the progress boundary.

use lyon::math::{vector, Transform};

use crate::backend::{Backend, BlurEffect, BlurOptimization, CommandList};
use crate::cache::CachedGeometry;
use crate::config::GlowTuning;
use crate::types::Color;

/// Source transform of the glow: a slight horizontal stretch anchored at the
/// progress boundary of a surface `surface_width` wide.
pub fn glow_transform(surface_width: f32, progress: f32, stretch: f32) -> Transform {
    let anchor = surface_width * progress;
    Transform::translation(-anchor, 0.0)
        .then_scale(stretch, 1.0)
        .then_translate(vector(anchor, 0.0))
}

/// Blur standard deviation for a line drawn at `scale`.
pub fn glow_radius(scale: f32, tuning: &GlowTuning) -> f32 {
    scale * tuning.blur_ratio
}

/// Draws the blurred, stretched smear of `fill` in `color`.
///
/// Does nothing in low-frame-rate mode.
pub fn draw_glow<B: Backend>(
    backend: &mut B,
    fill: &CachedGeometry<B::Geometry>,
    progress: f32,
    color: Color,
    scale: f32,
    low_frame_rate: bool,
    tuning: &GlowTuning,
) {
    if low_frame_rate {
        return;
    }

    let mut source = CommandList::new();
    source.fill_geometry(fill, color);
    let surface = source.bounds();

    let effect = BlurEffect {
        source: &source,
        transform: glow_transform(surface.width(), progress, tuning.stretch),
        std_deviation: glow_radius(scale, tuning),
        optimization: BlurOptimization::Speed,
    };
    backend.draw_blurred(&effect);
}

#[cfg(test)]
mod tests {
    use lyon::math::point;

    use super::*;
    use crate::cache::GeometryKind;
    use crate::testing::{approx_eq, quad_mesh, Command, RecordingBackend};

    #[test]
    fn stretch_is_anchored_at_progress() {
        let transform = glow_transform(200.0, 0.25, 1.008);
        let anchor = transform.transform_point(point(50.0, 7.0));
        assert!(approx_eq(anchor.x, 50.0));
        assert!(approx_eq(anchor.y, 7.0));

        let right = transform.transform_point(point(150.0, 0.0));
        assert!(approx_eq(right.x, 50.0 + 100.0 * 1.008));
        let left = transform.transform_point(point(0.0, 0.0));
        assert!(approx_eq(left.x, 50.0 - 50.0 * 1.008));
    }

    #[test]
    fn radius_follows_scale() {
        let tuning = GlowTuning::default();
        assert!(approx_eq(glow_radius(1.0, &tuning), 2.0 / 3.0));
        assert!(approx_eq(glow_radius(1.5, &tuning), 1.0));
    }

    #[test]
    fn glow_blurs_fill_with_color() {
        let mut backend = RecordingBackend::default();
        let fill = CachedGeometry::upload(
            &mut backend,
            GeometryKind::Fill,
            quad_mesh(10.0, 0.0, 110.0, 20.0),
        );
        let color = [0.2, 0.4, 0.6, 0.8];
        draw_glow(
            &mut backend,
            &fill,
            0.5,
            color,
            3.0,
            false,
            &GlowTuning::default(),
        );

        let [Command::Blur {
            sources,
            transform,
            std_deviation,
            optimization,
        }] = backend.commands.as_slice()
        else {
            panic!("expected one blur, got {:?}", backend.commands);
        };
        assert_eq!(sources, &vec![(*fill.handle(), color)]);
        assert!(approx_eq(*std_deviation, 2.0));
        assert_eq!(*optimization, BlurOptimization::Speed);
        // Anchored at half the surface width, not at its right edge.
        let anchor = transform.transform_point(point(50.0, 0.0));
        assert!(approx_eq(anchor.x, 50.0));
        assert!(fill.release(&mut backend).is_ok());
    }

    #[test]
    fn low_frame_rate_skips_glow() {
        let mut backend = RecordingBackend::default();
        let fill = CachedGeometry::upload(
            &mut backend,
            GeometryKind::Fill,
            quad_mesh(0.0, 0.0, 10.0, 10.0),
        );
        draw_glow(
            &mut backend,
            &fill,
            0.5,
            [1.0; 4],
            1.0,
            true,
            &GlowTuning::default(),
        );
        assert!(backend.commands.is_empty());
        assert!(fill.release(&mut backend).is_ok());
    }
}
