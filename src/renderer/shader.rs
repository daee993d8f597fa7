use gfx_hal::pso;
use glsl_to_spirv::ShaderType;
use log::error;
use std::fmt;

use crate::error::{RenderError, Result};

pub const VERTEX_SOURCE: &str = include_str!("../data/painter.vert");
pub const FRAGMENT_SOURCE: &str = include_str!("../data/painter.frag");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn shader_type(self) -> ShaderType {
        match self {
            Stage::Vertex => ShaderType::Vertex,
            Stage::Fragment => ShaderType::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        })
    }
}

/// Compiles GLSL to SPIR-V words. Compiler output is logged before the
/// error is returned.
pub fn compile(stage: Stage, source: &str) -> Result<Vec<u32>> {
    let file = glsl_to_spirv::compile(source, stage.shader_type()).map_err(|log| {
        error!("error compiling {} shader:\n{}", stage, log);
        RenderError::ShaderCompile { stage, log }
    })?;
    pso::read_spirv(file).map_err(|source| RenderError::Spirv { stage, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn bundled_shaders_compile() {
        for &(stage, source) in &[
            (Stage::Vertex, VERTEX_SOURCE),
            (Stage::Fragment, FRAGMENT_SOURCE),
        ] {
            let words = compile(stage, source).unwrap();
            assert_eq!(words[0], SPIRV_MAGIC);
        }
    }

    #[test]
    fn broken_source_reports_stage() {
        match compile(Stage::Fragment, "#version 450\nvoid main() { nope }\n") {
            Err(RenderError::ShaderCompile { stage, .. }) => assert_eq!(stage, Stage::Fragment),
            other => panic!("unexpected {:?}", other.map(|w| w.len())),
        }
    }
}
