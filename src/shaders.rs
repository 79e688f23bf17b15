//! GLSL shader sources and compilation helpers.
//!
//! All shaders target GLSL 1.40 (OpenGL 3.1), which is widely supported on
//! desktop platforms.

use glow::HasContext;

use crate::error::Error;

/// Most gradient stops the path shader interpolates.
pub const MAX_STOPS: usize = 4;

/// Vertex shader for cached geometry.
///
/// Transforms drawing-space vertices by an affine transform into pixels and
/// passes the untransformed position on for gradient interpolation.
///
/// # Uniforms
///
/// | Name           | Type   | Description                              |
/// |----------------|--------|------------------------------------------|
/// | `u_transform`  | `mat3` | Drawing space to pixels                  |
/// | `u_resolution` | `vec2` | Viewport size in pixels                  |
pub const PATH_VERTEX_SRC: &str = r"#version 140

in vec2 a_position;

uniform mat3 u_transform;
uniform vec2 u_resolution;

// Drawing-space position for gradient interpolation
out vec2 v_local;

void main() {
    v_local = a_position;

    vec2 world = (u_transform * vec3(a_position, 1.0)).xy;

    // Convert from [0, resolution] to [-1, 1] (flip Y for GL)
    vec2 ndc = (world / u_resolution) * 2.0 - 1.0;
    ndc.y = -ndc.y;

    gl_Position = vec4(ndc, 0.0, 1.0);
}
";

/// Fragment shader for cached geometry.
///
/// `u_stop_count == 0` paints `u_color`; otherwise the first `u_stop_count`
/// stops form a linear gradient along `u_start`→`u_end`, clamped to the
/// outer stops. Output is premultiplied.
///
/// # Uniforms
///
/// | Name           | Type      | Description                         |
/// |----------------|-----------|-------------------------------------|
/// | `u_stop_count` | `int`     | 0 for solid, else number of stops   |
/// | `u_color`      | `vec4`    | Solid color                         |
/// | `u_start`      | `vec2`    | Gradient offset 0, drawing space    |
/// | `u_end`        | `vec2`    | Gradient offset 1, drawing space    |
/// | `u_offsets`    | `vec4`    | Stop offsets                        |
/// | `u_colors`     | `vec4[4]` | Stop colors                         |
pub const PATH_FRAGMENT_SRC: &str = r"#version 140

in vec2 v_local;

uniform int u_stop_count;
uniform vec4 u_color;
uniform vec2 u_start;
uniform vec2 u_end;
uniform vec4 u_offsets;
uniform vec4 u_colors[4];

out vec4 frag_color;

void main() {
    if (u_stop_count == 0) {
        frag_color = u_color;
    } else {
        vec2 axis = u_end - u_start;
        float len2 = dot(axis, axis);
        float t = (len2 > 0.0) ? dot(v_local - u_start, axis) / len2 : 0.0;

        frag_color = u_colors[0];
        for (int i = 1; i < u_stop_count; ++i) {
            float a = u_offsets[i - 1];
            float b = u_offsets[i];
            if (t >= b) {
                frag_color = u_colors[i];
            } else {
                if (t > a) {
                    frag_color = mix(u_colors[i - 1], u_colors[i], (t - a) / (b - a));
                }
                break;
            }
        }
    }

    // Premultiply alpha for correct blending
    frag_color.rgb *= frag_color.a;
}
";

/// Vertex shader for fullscreen passes over an offscreen texture.
///
/// Expects the unit square `[0,1]x[0,1]` as input.
pub const QUAD_VERTEX_SRC: &str = r"#version 140

in vec2 a_position;

out vec2 v_uv;

void main() {
    v_uv = a_position;
    gl_Position = vec4(a_position * 2.0 - 1.0, 0.0, 1.0);
}
";

/// One direction of a separable gaussian blur.
///
/// Input and output are premultiplied.
///
/// # Uniforms
///
/// | Name        | Type        | Description                            |
/// |-------------|-------------|----------------------------------------|
/// | `u_texture` | `sampler2D` | Source texture                         |
/// | `u_texel`   | `vec2`      | One texel along the blur direction     |
/// | `u_sigma`   | `float`     | Standard deviation in texels           |
/// | `u_taps`    | `int`       | Samples on each side of the center     |
/// | `u_paired`  | `int`       | 1 = each sample blends two texels      |
pub const BLUR_FRAGMENT_SRC: &str = r"#version 140

in vec2 v_uv;

uniform sampler2D u_texture;
uniform vec2 u_texel;
uniform float u_sigma;
uniform int u_taps;
uniform int u_paired;

out vec4 frag_color;

void main() {
    vec4 sum = texture(u_texture, v_uv);
    float total = 1.0;

    if (u_sigma > 0.0) {
        float denom = 2.0 * u_sigma * u_sigma;
        for (int i = 1; i <= u_taps; ++i) {
            float x;
            float w;
            if (u_paired == 1) {
                // Texels k and k + 1, sampled between them in proportion to
                // their weights.
                float k = float(2 * i - 1);
                float w1 = exp(-(k * k) / denom);
                float w2 = exp(-((k + 1.0) * (k + 1.0)) / denom);
                w = w1 + w2;
                x = w > 0.0 ? (k * w1 + (k + 1.0) * w2) / w : k;
            } else {
                x = float(i);
                w = exp(-(x * x) / denom);
            }
            vec2 offset = u_texel * x;
            sum += w * (texture(u_texture, v_uv + offset) + texture(u_texture, v_uv - offset));
            total += 2.0 * w;
        }
    }

    frag_color = sum / total;
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// The compiled shader objects are detached and deleted after successful
/// linking, so only the program handle needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns [`Error::ShaderCompile`] or [`Error::ProgramLink`] with the
/// driver's info log, or [`Error::Resource`] if GL refuses to create the
/// objects.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, Error> {
    let program = unsafe { gl.create_program() }.map_err(Error::Resource)?;

    let vs = match unsafe { compile_shader(gl, glow::VERTEX_SHADER, vertex_src) } {
        Ok(vs) => vs,
        Err(err) => {
            unsafe { gl.delete_program(program) };
            return Err(err);
        }
    };
    let fs = match unsafe { compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) } {
        Ok(fs) => fs,
        Err(err) => {
            unsafe {
                gl.delete_shader(vs);
                gl.delete_program(program);
            }
            return Err(err);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(Error::ProgramLink(log));
        }

        // Shaders can be detached and deleted after successful linking.
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Look up a uniform the renderer relies on.
///
/// # Safety
///
/// Requires a valid, current OpenGL context and a linked `program`.
///
/// # Errors
///
/// Returns [`Error::MissingUniform`] when the driver does not report the
/// uniform, e.g. because it was optimized out.
pub unsafe fn uniform(
    gl: &glow::Context,
    program: glow::Program,
    name: &'static str,
) -> Result<glow::UniformLocation, Error> {
    unsafe { gl.get_uniform_location(program, name) }.ok_or(Error::MissingUniform(name))
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader, Error> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(Error::Resource)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(Error::ShaderCompile(log));
        }

        Ok(shader)
    }
}
