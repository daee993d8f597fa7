use std::mem;

/// Number of `f32` components in one vertex: xyz position then rgba color.
pub const COMPONENTS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// One interleaved view over a vertex buffer, matched by `location` in the
/// vertex shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub location: u32,
    pub components: u32,
    pub offset: u32,
}

const FLOAT: u32 = mem::size_of::<f32>() as u32;

impl Vertex {
    pub const STRIDE: u32 = COMPONENTS as u32 * FLOAT;

    pub const POSITION: Attribute = Attribute {
        location: 0,
        components: 3,
        offset: 0,
    };

    pub const COLOR: Attribute = Attribute {
        location: 1,
        components: 4,
        offset: 3 * FLOAT,
    };

    pub const ATTRIBUTES: [Attribute; 2] = [Self::POSITION, Self::COLOR];

    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Vertex { position, color }
    }

    pub fn depth(&self) -> f32 {
        self.position[2]
    }
}
