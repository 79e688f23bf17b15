//! The OpenGL backend: owns GL state, uploads cached geometry and issues
//! draw calls for lines.

use std::sync::Arc;

use glow::{HasContext, PixelPackData, PixelUnpackData};
use lyon::math::{Box2D, Transform};

use crate::backend::{Backend, BlurEffect, BlurOptimization, Brush};
use crate::error::Error;
use crate::shaders::{self, MAX_STOPS};
use crate::types::{Color, GradientStop, Mesh, Primitive, Vertex};

/// GL internal format for RGBA8 textures, pre-cast to the `i32` that
/// `tex_image_2d` expects.
#[expect(clippy::cast_possible_wrap)]
const RGBA8_INTERNAL_FORMAT: i32 = glow::RGBA8 as i32;

/// Upper bound on blur samples per side, keeping huge radii affordable.
const MAX_BLUR_TAPS: i32 = 32;

/// The unit square as two triangles, for fullscreen passes.
const QUAD_VERTICES: [Vertex; 6] = [
    Vertex { position: [0.0, 0.0] },
    Vertex { position: [1.0, 0.0] },
    Vertex { position: [1.0, 1.0] },
    Vertex { position: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0] },
    Vertex { position: [0.0, 1.0] },
];

/// Convert a `u32` to `i32` for GL API calls, saturating.
fn gl_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Cached uniform locations for the path shader program.
struct PathUniforms {
    /// `u_transform`: drawing space to pixels.
    transform: glow::UniformLocation,
    /// `u_resolution`: viewport size in pixels.
    resolution: glow::UniformLocation,
    /// `u_stop_count`: 0 = solid, else number of gradient stops.
    stop_count: glow::UniformLocation,
    /// `u_color`: solid color.
    color: glow::UniformLocation,
    /// `u_start`: where gradient offset 0 lies.
    start: glow::UniformLocation,
    /// `u_end`: where gradient offset 1 lies.
    end: glow::UniformLocation,
    /// `u_offsets`: stop offsets.
    offsets: glow::UniformLocation,
    /// `u_colors`: stop colors.
    colors: glow::UniformLocation,
}

/// Cached uniform locations for the blur shader program.
struct BlurUniforms {
    texture: glow::UniformLocation,
    texel: glow::UniformLocation,
    sigma: glow::UniformLocation,
    taps: glow::UniformLocation,
    paired: glow::UniformLocation,
}

/// An offscreen render target sampled by the blur passes.
struct Offscreen {
    fbo: glow::Framebuffer,
    texture: glow::Texture,
}

#[derive(Debug)]
struct GlBuffers {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ebo: glow::Buffer,
}

/// A mesh uploaded once into GPU buffers.
///
/// Empty meshes, and meshes that failed to upload, hold no buffers and draw
/// nothing.
#[derive(Debug)]
pub struct GlGeometry {
    buffers: Option<GlBuffers>,
    index_count: i32,
    mode: u32,
}

impl GlGeometry {
    fn empty(mode: u32) -> Self {
        Self {
            buffers: None,
            index_count: 0,
            mode,
        }
    }

    /// Whether any GPU buffers back this geometry.
    pub fn is_resident(&self) -> bool {
        self.buffers.is_some()
    }
}

/// Number and layout of blur samples.
#[derive(Copy, Clone, Debug, PartialEq)]
struct BlurKernel {
    /// Samples on each side of the center.
    taps: i32,
    /// Each sample reads two adjacent texels at once, placed between them
    /// by their weights so linear filtering blends both.
    paired: bool,
}

impl BlurKernel {
    /// Speed reaches two standard deviations with paired samples, Balanced
    /// three with paired samples and Quality three with one sample per
    /// texel.
    fn new(std_deviation: f32, optimization: BlurOptimization) -> Self {
        let (sigmas, paired) = match optimization {
            BlurOptimization::Speed => (2.0, true),
            BlurOptimization::Balanced => (3.0, true),
            BlurOptimization::Quality => (3.0, false),
        };
        let reach = (sigmas * std_deviation.max(0.0)).ceil();
        let texels_per_tap = if paired { 2.0 } else { 1.0 };
        // Bounded by MAX_BLUR_TAPS before the cast.
        #[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let taps = (reach / texels_per_tap)
            .ceil()
            .min(MAX_BLUR_TAPS as f32) as i32;
        Self { taps, paired }
    }
}

/// Path shader uniforms for a gradient brush.
#[derive(Copy, Clone, Debug, PartialEq)]
struct GradientUniforms {
    count: i32,
    offsets: [f32; MAX_STOPS],
    colors: [f32; MAX_STOPS * 4],
}

impl GradientUniforms {
    /// Packs up to [`MAX_STOPS`] stops; unused slots repeat the last stop.
    fn new(stops: &[GradientStop]) -> Self {
        let used = &stops[..stops.len().min(MAX_STOPS)];
        let mut offsets = [0.0; MAX_STOPS];
        let mut colors = [0.0; MAX_STOPS * 4];
        if let Some(last) = used.last() {
            for i in 0..MAX_STOPS {
                let stop = used.get(i).unwrap_or(last);
                offsets[i] = stop.offset;
                colors[i * 4..i * 4 + 4].copy_from_slice(&stop.color);
            }
        }
        Self {
            count: i32::try_from(used.len()).unwrap_or(0),
            offsets,
            colors,
        }
    }
}

/// Column-major `mat3` of a 2D affine transform.
fn transform_matrix(transform: &Transform) -> [f32; 9] {
    [
        transform.m11,
        transform.m12,
        0.0,
        transform.m21,
        transform.m22,
        0.0,
        transform.m31,
        transform.m32,
        1.0,
    ]
}

/// Intersects a new clip with the enclosing one. Disjoint clips give an
/// empty rectangle.
fn intersect_clip(outer: Option<&Box2D>, rect: Box2D) -> Box2D {
    match outer {
        Some(outer) => rect.intersection(outer).unwrap_or_else(Box2D::zero),
        None => rect,
    }
}

/// Converts a clip in drawing coordinates (y down) to a GL scissor box
/// `[x, y, width, height]` (y up), covering every partially clipped pixel.
fn scissor_box(rect: &Box2D, [width, height]: [u32; 2]) -> [i32; 4] {
    #[expect(clippy::cast_precision_loss)]
    let (w, h) = (width as f32, height as f32);
    let left = rect.min.x.floor().max(0.0).min(w);
    let right = rect.max.x.ceil().max(left).min(w);
    let top = rect.min.y.floor().max(0.0).min(h);
    let bottom = rect.max.y.ceil().max(top).min(h);
    // Clamped to the viewport, which fits in i32.
    #[expect(clippy::cast_possible_truncation)]
    let px = |v: f32| v as i32;
    [px(left), px(h - bottom), px(right - left), px(bottom - top)]
}

/// Reverses the row order of a tightly packed image.
fn flip_rows(pixels: &mut [u8], stride: usize) {
    if stride == 0 {
        return;
    }
    let rows = pixels.len() / stride;
    for row in 0..rows / 2 {
        let (upper, lower) = pixels.split_at_mut((rows - row - 1) * stride);
        upper[row * stride..(row + 1) * stride].swap_with_slice(&mut lower[..stride]);
    }
}

/// Converts premultiplied RGBA8 pixels to straight alpha.
fn unpremultiply(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = u16::from(px[3]);
        if alpha == 0 || alpha == 255 {
            continue;
        }
        for channel in &mut px[..3] {
            let straight = (u16::from(*channel) * 255 + alpha / 2) / alpha;
            *channel = u8::try_from(straight).unwrap_or(u8::MAX);
        }
    }
}

/// A [`Backend`] drawing into an OpenGL framebuffer.
///
/// Geometry is uploaded once into its own vertex array and index buffer.
/// Clip layers map to a scissor stack, brushes to the path shader and blur
/// effects to two offscreen textures ping-ponged through a separable
/// gaussian.
///
/// # Example
///
/// ```no_run
/// # use karaoke_line_renderer::{GlowBackend, LineOptions, LineStyle, LyricLine};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>, runs: &[karaoke_line_renderer::GlyphRun<'_>]) {
/// // During setup (with a current GL context):
/// let mut backend = unsafe { GlowBackend::new(gl) }.unwrap();
/// let line = LineStyle::Classic.build(&mut backend, runs, &LineOptions::default());
///
/// // Each frame:
/// unsafe { backend.begin_frame(None, [800, 600]) };
/// line.draw(&mut backend, 0.5, false);
/// unsafe { backend.end_frame() };
///
/// // Teardown:
/// line.dispose(&mut backend);
/// unsafe { backend.destroy() };
/// # }
/// ```
pub struct GlowBackend {
    /// The OpenGL context, shared via [`Arc`] so it can be stored alongside
    /// resources that reference it.
    gl: Arc<glow::Context>,

    /// Compiled shader program for cached geometry.
    path_program: glow::Program,
    /// Cached uniform locations for [`path_program`](Self::path_program).
    path_uniforms: PathUniforms,

    /// Compiled shader program for one blur direction.
    blur_program: glow::Program,
    /// Cached uniform locations for [`blur_program`](Self::blur_program).
    blur_uniforms: BlurUniforms,

    /// Vertex array holding [`QUAD_VERTICES`].
    quad_vao: glow::VertexArray,
    /// Vertex buffer behind [`quad_vao`](Self::quad_vao).
    quad_vbo: glow::Buffer,

    /// Receives the blur source.
    ping: Offscreen,
    /// Receives the horizontal blur pass.
    pong: Offscreen,
    /// Current dimensions of the offscreen textures.
    offscreen_size: [u32; 2],

    /// Framebuffer of the current frame; `None` is the default framebuffer.
    target: Option<glow::Framebuffer>,
    /// Viewport size of the current frame.
    size: [u32; 2],
    /// Active clips, each already intersected with its parent.
    clips: Vec<Box2D>,
}

impl GlowBackend {
    /// Create a new backend.
    ///
    /// Compiles shader programs and creates the offscreen framebuffers
    /// (sized lazily on the first frame).
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid, and must stay current
    /// whenever the backend is used, including through the [`Backend`]
    /// methods. The caller must ensure that [`destroy`](Self::destroy) is
    /// called before the context is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if shader compilation, program linking, uniform
    /// lookup, or GL resource creation fails.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Result<Self, Error> {
        let path_program = unsafe {
            shaders::compile_program(&gl, shaders::PATH_VERTEX_SRC, shaders::PATH_FRAGMENT_SRC)?
        };
        let blur_program = unsafe {
            shaders::compile_program(&gl, shaders::QUAD_VERTEX_SRC, shaders::BLUR_FRAGMENT_SRC)?
        };

        let path_uniforms = unsafe {
            PathUniforms {
                transform: shaders::uniform(&gl, path_program, "u_transform")?,
                resolution: shaders::uniform(&gl, path_program, "u_resolution")?,
                stop_count: shaders::uniform(&gl, path_program, "u_stop_count")?,
                color: shaders::uniform(&gl, path_program, "u_color")?,
                start: shaders::uniform(&gl, path_program, "u_start")?,
                end: shaders::uniform(&gl, path_program, "u_end")?,
                offsets: shaders::uniform(&gl, path_program, "u_offsets")?,
                colors: shaders::uniform(&gl, path_program, "u_colors")?,
            }
        };

        let blur_uniforms = unsafe {
            BlurUniforms {
                texture: shaders::uniform(&gl, blur_program, "u_texture")?,
                texel: shaders::uniform(&gl, blur_program, "u_texel")?,
                sigma: shaders::uniform(&gl, blur_program, "u_sigma")?,
                taps: shaders::uniform(&gl, blur_program, "u_taps")?,
                paired: shaders::uniform(&gl, blur_program, "u_paired")?,
            }
        };

        let (quad_vao, quad_vbo) = unsafe {
            let vao = gl.create_vertex_array().map_err(Error::Resource)?;
            let vbo = gl.create_buffer().map_err(Error::Resource)?;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&QUAD_VERTICES),
                glow::STATIC_DRAW,
            );
            Self::position_attribute(&gl);
            gl.bind_vertex_array(None);
            (vao, vbo)
        };

        let (ping, pong) = unsafe {
            let ping = Offscreen {
                fbo: gl.create_framebuffer().map_err(Error::Resource)?,
                texture: gl.create_texture().map_err(Error::Resource)?,
            };
            let pong = Offscreen {
                fbo: gl.create_framebuffer().map_err(Error::Resource)?,
                texture: gl.create_texture().map_err(Error::Resource)?,
            };
            (ping, pong)
        };

        log::debug!("OpenGL line backend initialized");

        Ok(Self {
            gl,
            path_program,
            path_uniforms,
            blur_program,
            blur_uniforms,
            quad_vao,
            quad_vbo,
            ping,
            pong,
            offscreen_size: [0, 0],
            target: None,
            size: [0, 0],
            clips: Vec::new(),
        })
    }

    /// Start drawing into `target` (`None` for the default framebuffer) with
    /// a viewport of `[width, height]` pixels.
    ///
    /// Drawing coordinates map one-to-one to pixels with the origin at the
    /// top left. The target is not cleared; see [`clear`](Self::clear).
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    pub unsafe fn begin_frame(&mut self, target: Option<glow::Framebuffer>, size: [u32; 2]) {
        if self.offscreen_size != size {
            unsafe { self.resize_offscreen(size) };
        }
        self.target = target;
        self.size = size;
        self.clips.clear();

        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, target);
            gl.viewport(0, 0, gl_size(size[0]), gl_size(size[1]));
            // Set up blending for premultiplied alpha.
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
            gl.disable(glow::SCISSOR_TEST);
        }
    }

    /// Clear the whole frame target to a straight-alpha color.
    ///
    /// # Safety
    ///
    /// Must be called between [`begin_frame`](Self::begin_frame) and
    /// [`end_frame`](Self::end_frame).
    pub unsafe fn clear(&self, [r, g, b, a]: Color) {
        let gl = &self.gl;
        unsafe {
            gl.disable(glow::SCISSOR_TEST);
            gl.clear_color(r * a, g * a, b * a, a);
            gl.clear(glow::COLOR_BUFFER_BIT);
            self.apply_scissor();
        }
    }

    /// Finish the frame and restore the GL state touched by drawing.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    pub unsafe fn end_frame(&mut self) {
        if !self.clips.is_empty() {
            log::warn!("{} clip layers still open at end of frame", self.clips.len());
            self.clips.clear();
        }
        let gl = &self.gl;
        unsafe {
            gl.disable(glow::SCISSOR_TEST);
            gl.disable(glow::BLEND);
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
    }

    /// Read back the frame target as a straight-alpha image.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new), after at least one
    /// [`begin_frame`](Self::begin_frame).
    pub unsafe fn capture(&self) -> image::RgbaImage {
        let [width, height] = self.size;
        let stride = width as usize * 4;
        let mut pixels = vec![0; stride * height as usize];
        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, self.target);
            gl.read_pixels(
                0,
                0,
                gl_size(width),
                gl_size(height),
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(pixels.as_mut_slice())),
            );
        }
        // GL rows run bottom to top.
        flip_rows(&mut pixels, stride);
        unpremultiply(&mut pixels);
        image::RgbaImage::from_raw(width, height, pixels)
            .unwrap_or_else(|| image::RgbaImage::new(width, height))
    }

    /// Clean up all GL resources owned by this backend.
    ///
    /// Lines must be disposed first; their geometry is not tracked here.
    ///
    /// # Safety
    ///
    /// Must be called with the same GL context that was used to create the
    /// backend, and must be called exactly once.
    pub unsafe fn destroy(&self) {
        let gl = &self.gl;
        unsafe {
            gl.delete_program(self.path_program);
            gl.delete_program(self.blur_program);
            gl.delete_vertex_array(self.quad_vao);
            gl.delete_buffer(self.quad_vbo);
            for offscreen in [&self.ping, &self.pong] {
                gl.delete_framebuffer(offscreen.fbo);
                gl.delete_texture(offscreen.texture);
            }
        }
    }

    /// Point attribute 0 at the `vec2` position of the bound vertex buffer.
    unsafe fn position_attribute(gl: &glow::Context) {
        unsafe {
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(
                0,
                2,
                glow::FLOAT,
                false,
                // Vertex is 8 bytes, well within i32 range.
                #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                {
                    std::mem::size_of::<Vertex>() as i32
                },
                0,
            );
        }
    }

    /// Upload a mesh into its own vertex array.
    unsafe fn upload(&self, mesh: &Mesh) -> Result<GlGeometry, Error> {
        let mode = match mesh.primitive {
            Primitive::Triangles => glow::TRIANGLES,
            Primitive::Lines => glow::LINES,
        };
        if mesh.is_empty() {
            return Ok(GlGeometry::empty(mode));
        }
        let index_count =
            i32::try_from(mesh.indices.len()).map_err(|_| Error::MeshTooLarge(mesh.indices.len()))?;

        let gl = &self.gl;
        let buffers = unsafe {
            let vao = gl.create_vertex_array().map_err(Error::Resource)?;
            let vbo = gl.create_buffer().map_err(Error::Resource)?;
            let ebo = gl.create_buffer().map_err(Error::Resource)?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.vertices),
                glow::STATIC_DRAW,
            );
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.indices),
                glow::STATIC_DRAW,
            );
            Self::position_attribute(gl);
            gl.bind_vertex_array(None);

            GlBuffers { vao, vbo, ebo }
        };

        Ok(GlGeometry {
            buffers: Some(buffers),
            index_count,
            mode,
        })
    }

    /// Draw cached geometry with the path shader.
    unsafe fn draw_mesh(&self, geometry: &GlGeometry, transform: &Transform, brush: &Brush<'_>) {
        let Some(buffers) = &geometry.buffers else {
            return;
        };
        let gl = &self.gl;
        let u = &self.path_uniforms;
        #[expect(clippy::cast_precision_loss)]
        let resolution = [self.size[0] as f32, self.size[1] as f32];

        unsafe {
            gl.use_program(Some(self.path_program));
            gl.uniform_2_f32(Some(&u.resolution), resolution[0], resolution[1]);
            gl.uniform_matrix_3_f32_slice(Some(&u.transform), false, &transform_matrix(transform));

            match *brush {
                Brush::Solid([r, g, b, a]) => {
                    gl.uniform_1_i32(Some(&u.stop_count), 0);
                    gl.uniform_4_f32(Some(&u.color), r, g, b, a);
                }
                Brush::LinearGradient { start, end, stops } => {
                    let gradient = GradientUniforms::new(stops);
                    if gradient.count == 0 {
                        return;
                    }
                    gl.uniform_1_i32(Some(&u.stop_count), gradient.count);
                    gl.uniform_2_f32(Some(&u.start), start.x, start.y);
                    gl.uniform_2_f32(Some(&u.end), end.x, end.y);
                    gl.uniform_4_f32_slice(Some(&u.offsets), &gradient.offsets);
                    gl.uniform_4_f32_slice(Some(&u.colors), &gradient.colors);
                }
            }

            gl.bind_vertex_array(Some(buffers.vao));
            gl.draw_elements(geometry.mode, geometry.index_count, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
        }
    }

    /// Bind an offscreen target and clear it to transparent.
    unsafe fn bind_offscreen(&self, offscreen: &Offscreen) {
        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(offscreen.fbo));
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// Blur `source` along one axis into the bound framebuffer.
    unsafe fn blur_pass(
        &self,
        source: glow::Texture,
        texel: [f32; 2],
        sigma: f32,
        kernel: BlurKernel,
    ) {
        let gl = &self.gl;
        let u = &self.blur_uniforms;
        unsafe {
            gl.use_program(Some(self.blur_program));
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(source));
            gl.uniform_1_i32(Some(&u.texture), 0);
            gl.uniform_2_f32(Some(&u.texel), texel[0], texel[1]);
            gl.uniform_1_f32(Some(&u.sigma), sigma);
            gl.uniform_1_i32(Some(&u.taps), kernel.taps);
            gl.uniform_1_i32(Some(&u.paired), i32::from(kernel.paired));

            gl.bind_vertex_array(Some(self.quad_vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 6);
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    /// Apply the innermost clip as the scissor box.
    unsafe fn apply_scissor(&self) {
        let gl = &self.gl;
        unsafe {
            match self.clips.last() {
                Some(clip) => {
                    let [x, y, w, h] = scissor_box(clip, self.size);
                    gl.enable(glow::SCISSOR_TEST);
                    gl.scissor(x, y, w, h);
                }
                None => gl.disable(glow::SCISSOR_TEST),
            }
        }
    }

    /// Resize (or initially create) the offscreen textures to match the
    /// given viewport dimensions.
    unsafe fn resize_offscreen(&mut self, [width, height]: [u32; 2]) {
        let gl = &self.gl;
        for offscreen in [&self.ping, &self.pong] {
            unsafe {
                gl.bind_texture(glow::TEXTURE_2D, Some(offscreen.texture));
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    RGBA8_INTERNAL_FORMAT,
                    gl_size(width),
                    gl_size(height),
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    PixelUnpackData::Slice(None),
                );
                // GL constant values are small enough that the cast is always safe.
                #[expect(clippy::cast_possible_wrap)]
                {
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MIN_FILTER,
                        glow::LINEAR as i32,
                    );
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MAG_FILTER,
                        glow::LINEAR as i32,
                    );
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_WRAP_S,
                        glow::CLAMP_TO_EDGE as i32,
                    );
                    gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_WRAP_T,
                        glow::CLAMP_TO_EDGE as i32,
                    );
                }
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(offscreen.fbo));
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    glow::TEXTURE_2D,
                    Some(offscreen.texture),
                    0,
                );
            }
        }
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        log::debug!("resized blur targets to {width}x{height}");
        self.offscreen_size = [width, height];
    }
}

// Every GL call below relies on the contract of `GlowBackend::new`: the
// context is current whenever the backend is used.
impl Backend for GlowBackend {
    type Geometry = GlGeometry;

    fn cache_geometry(&mut self, mesh: Mesh) -> GlGeometry {
        match unsafe { self.upload(&mesh) } {
            Ok(geometry) => geometry,
            Err(err) => {
                log::warn!("caching geometry failed, it will not be drawn: {err}");
                GlGeometry::empty(glow::TRIANGLES)
            }
        }
    }

    fn release_geometry(&mut self, geometry: GlGeometry) -> Result<(), Error> {
        if let Some(buffers) = geometry.buffers {
            let gl = &self.gl;
            unsafe {
                gl.delete_vertex_array(buffers.vao);
                gl.delete_buffer(buffers.vbo);
                gl.delete_buffer(buffers.ebo);
            }
        }
        Ok(())
    }

    fn push_clip(&mut self, rect: Box2D) {
        let clip = intersect_clip(self.clips.last(), rect);
        self.clips.push(clip);
        unsafe { self.apply_scissor() };
    }

    fn pop_clip(&mut self) {
        if self.clips.pop().is_none() {
            log::warn!("pop_clip without a matching push_clip");
        }
        unsafe { self.apply_scissor() };
    }

    fn draw_geometry(&mut self, geometry: &GlGeometry, brush: &Brush<'_>) {
        unsafe { self.draw_mesh(geometry, &Transform::identity(), brush) };
    }

    fn draw_blurred(&mut self, effect: &BlurEffect<'_, GlGeometry>) {
        let fills = effect.source.fills();
        let [width, height] = self.size;
        if fills.is_empty() || width == 0 || height == 0 {
            return;
        }
        let kernel = BlurKernel::new(effect.std_deviation, effect.optimization);
        #[expect(clippy::cast_precision_loss)]
        let texel = [1.0 / width as f32, 1.0 / height as f32];

        unsafe {
            // Source, unclipped, into ping.
            self.gl.disable(glow::SCISSOR_TEST);
            self.bind_offscreen(&self.ping);
            for fill in fills {
                self.draw_mesh(fill.geometry, &effect.transform, &Brush::Solid(fill.color));
            }

            // Horizontal pass into pong.
            self.bind_offscreen(&self.pong);
            self.blur_pass(
                self.ping.texture,
                [texel[0], 0.0],
                effect.std_deviation,
                kernel,
            );

            // Vertical pass onto the frame target, clipped.
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, self.target);
            self.apply_scissor();
            self.blur_pass(
                self.pong.texture,
                [0.0, texel[1]],
                effect.std_deviation,
                kernel,
            );
        }
    }
}
