//! Error type shared by the backends.

use thiserror::Error;

/// Errors reported while setting up a backend or managing its resources.
///
/// Drawing itself never fails; degenerate input simply draws nothing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A shader stage failed to compile.
    #[error("shader compile error: {0}")]
    ShaderCompile(String),
    /// A shader program failed to link.
    #[error("program link error: {0}")]
    ProgramLink(String),
    /// A uniform the renderer relies on is missing from a linked program.
    #[error("uniform `{0}` missing from shader program")]
    MissingUniform(&'static str),
    /// The graphics API refused to create an object.
    #[error("failed to create GPU resource: {0}")]
    Resource(String),
    /// A mesh has more indices than a single draw call can address.
    #[error("mesh has {0} indices, more than a single draw call supports")]
    MeshTooLarge(usize),
    /// A cached geometry could not be released.
    #[error("failed to release cached geometry: {0}")]
    Release(String),
}
