use crate::error::{RenderError, Result};
use crate::renderer::vertex::Vertex;

/// Vertices per quad.
pub const CORNERS: usize = 4;

/// Triangle fan over a quad: vertex 0 is shared by both triangles.
pub const FAN_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// A flat quad drawn as a triangle fan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub name: &'static str,
    vertices: [Vertex; CORNERS],
}

impl Shape {
    /// Rejects quads whose corners do not all sit at the same depth.
    pub fn new(name: &'static str, vertices: [Vertex; CORNERS]) -> Result<Self> {
        let depth = vertices[0].depth();
        if vertices.iter().any(|v| v.depth() != depth) {
            return Err(RenderError::UnevenDepth { name });
        }
        Ok(Shape { name, vertices })
    }

    /// Corners in fan order. Only reachable through `new`, so they always
    /// share one depth.
    pub fn vertices(&self) -> &[Vertex; CORNERS] {
        &self.vertices
    }

    pub fn depth(&self) -> f32 {
        self.vertices[0].depth()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [&Vertex; 3]> + '_ {
        FAN_INDICES.chunks(3).map(move |tri| {
            [
                &self.vertices[tri[0] as usize],
                &self.vertices[tri[1] as usize],
                &self.vertices[tri[2] as usize],
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::vertex::COMPONENTS;
    use std::mem;

    const QUAD_FLOATS: usize = CORNERS * COMPONENTS;

    fn quad(z: [f32; 4]) -> [Vertex; CORNERS] {
        let c = [1.0, 1.0, 1.0, 1.0];
        [
            Vertex::new([-1.0, -1.0, z[0]], c),
            Vertex::new([1.0, -1.0, z[1]], c),
            Vertex::new([1.0, 1.0, z[2]], c),
            Vertex::new([-1.0, 1.0, z[3]], c),
        ]
    }

    #[test]
    fn rejects_uneven_depth() {
        match Shape::new("tilted", quad([0.0, 0.0, 0.1, 0.0])) {
            Err(RenderError::UnevenDepth { name }) => assert_eq!(name, "tilted"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn vertices_come_back_in_fan_order() {
        let corners = quad([0.5; 4]);
        let shape = Shape::new("flat", corners).unwrap();
        assert_eq!(shape.vertices(), &corners);
        assert!(shape.vertices().iter().all(|v| v.depth() == shape.depth()));
    }

    #[test]
    fn depth_comes_from_shared_z() {
        let shape = Shape::new("flat", quad([-0.25; 4])).unwrap();
        assert_eq!(shape.depth(), -0.25);
    }

    #[test]
    fn vertex_buffer_is_28_floats() {
        let shape = Shape::new("flat", quad([0.0; 4])).unwrap();
        assert_eq!(QUAD_FLOATS, 28);
        assert_eq!(
            mem::size_of_val(shape.vertices()),
            QUAD_FLOATS * mem::size_of::<f32>()
        );
    }

    #[test]
    fn fan_has_two_triangles_around_vertex_zero() {
        let shape = Shape::new("flat", quad([0.0; 4])).unwrap();
        let tris: Vec<_> = shape.triangles().collect();
        assert_eq!(tris.len(), 2);
        for tri in &tris {
            assert_eq!(tri[0], &shape.vertices()[0]);
        }
        assert_eq!(tris[0][1], &shape.vertices()[1]);
        assert_eq!(tris[0][2], &shape.vertices()[2]);
        assert_eq!(tris[1][1], &shape.vertices()[2]);
        assert_eq!(tris[1][2], &shape.vertices()[3]);
    }
}
