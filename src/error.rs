use std::fmt;
use std::io;
use thiserror::Error;

use crate::renderer::shader::Stage;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("no graphics adapter found")]
    NoAdapter,

    #[error("no queue family can draw to the window surface")]
    NoQueueFamily,

    #[error("failed to compile {stage} shader: {log}")]
    ShaderCompile { stage: Stage, log: String },

    #[error("compiled {stage} shader is not valid SPIR-V")]
    Spirv {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("failed to link pipeline: {0}")]
    PipelineLink(String),

    #[error("no CPU-visible memory type fits the upload")]
    NoUploadMemoryType,

    #[error("refusing to upload an empty buffer")]
    EmptyBuffer,

    #[error("shape `{name}` has vertices at different depths")]
    UnevenDepth { name: &'static str },

    #[error("failed to {op}: {detail}")]
    Gpu { op: &'static str, detail: String },
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Wraps a gfx-hal error, keeping the name of the call that produced it.
pub fn gpu<E: fmt::Debug>(op: &'static str) -> impl FnOnce(E) -> RenderError {
    move |err| RenderError::Gpu {
        op,
        detail: format!("{:?}", err),
    }
}
