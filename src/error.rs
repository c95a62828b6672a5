// src/error.rs
//! Error handling for the rendering pipeline.
//!
//! Fatal conditions abort the current render call by propagating through
//! `?`; degraded conditions (unknown color formats, failed hot reloads) are
//! handled locally with a logged warning and never surface here.

use thiserror::Error;

/// Shader stage tag carried by compile errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A shader stage failed to compile. Carries the full driver
    /// diagnostic and the offending source text.
    #[error("{stage} shader failed to compile: {log}\n--- source ---\n{source_text}")]
    ShaderCompile {
        stage: ShaderStage,
        log: String,
        source_text: String,
    },

    /// Program linking failed after both stages compiled.
    #[error("shader program failed to link: {log}")]
    ShaderLink { log: String },

    /// The scene reached the light pass with no light sources. The
    /// lighting shader has no usable default, so this is fatal.
    #[error("scene contains no light sources")]
    NoLights,

    /// More lights than the fixed shader limit.
    #[error("scene contains {count} lights, limit is {max}")]
    TooManyLights { count: usize, max: usize },

    /// An operation needs a driver feature that is not present.
    #[error("driver feature not supported: {0}")]
    MissingFeature(&'static str),

    /// The renderer was ticked without a root canvas.
    #[error("no root canvas is set")]
    NoRootCanvas,

    /// A 3D canvas was rendered without a scene attached.
    #[error("canvas has no scene attached")]
    MissingScene,

    /// A 3D canvas was rendered without a viewing volume attached.
    #[error("canvas has no viewing volume attached")]
    MissingCamera,

    /// A buffer upload was requested while no CPU-side data is resident.
    #[error("data buffer {0} has no resident data to upload")]
    EmptyBuffer(u64),

    /// A texture upload was requested for a texture with neither resident
    /// pixels nor a pixel source.
    #[error("texture {0} has no pixel data and no pixel source")]
    EmptyTexture(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
