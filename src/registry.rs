use crate::error::Result;
use crate::renderer::vertex::Vertex;
use crate::shape::Shape;

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
const PINK: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

/// A centered axis-aligned square.
#[derive(Debug, Clone, Copy)]
pub struct Rectangle {
    pub name: &'static str,
    pub half_extent: f32,
    pub depth: f32,
    pub color: [f32; 4],
}

pub const RECTANGLES: [Rectangle; 4] = [
    Rectangle {
        name: "red",
        half_extent: 0.8,
        depth: -0.6,
        color: RED,
    },
    Rectangle {
        name: "green",
        half_extent: 0.6,
        depth: -0.3,
        color: GREEN,
    },
    Rectangle {
        name: "blue",
        half_extent: 0.4,
        depth: 0.0,
        color: BLUE,
    },
    Rectangle {
        name: "pink",
        half_extent: 0.2,
        depth: 0.3,
        color: PINK,
    },
];

impl Rectangle {
    /// Corners in fan order: bottom left, bottom right, top right, top left.
    pub fn to_shape(&self) -> Result<Shape> {
        let (h, z, c) = (self.half_extent, self.depth, self.color);
        Shape::new(
            self.name,
            [
                Vertex::new([-h, -h, z], c),
                Vertex::new([h, -h, z], c),
                Vertex::new([h, h, z], c),
                Vertex::new([-h, h, z], c),
            ],
        )
    }
}

/// Expands the rectangle table into the scene, in table order.
pub fn load() -> Result<Vec<Shape>> {
    RECTANGLES.iter().map(Rectangle::to_shape).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_four_quads() {
        let scene = load().unwrap();
        assert_eq!(scene.len(), 4);
        let names: Vec<_> = scene.iter().map(|s| s.name).collect();
        assert_eq!(names, ["red", "green", "blue", "pink"]);
    }

    #[test]
    fn quads_share_depth_and_color() {
        for (rect, shape) in RECTANGLES.iter().zip(load().unwrap()) {
            assert_eq!(shape.depth(), rect.depth);
            assert!(shape.vertices().iter().all(|v| v.color == rect.color));
        }
    }

    #[test]
    fn corners_wind_around_the_center() {
        let shape = RECTANGLES[0].to_shape().unwrap();
        let xy: Vec<_> = shape
            .vertices()
            .iter()
            .map(|v| (v.position[0], v.position[1]))
            .collect();
        assert_eq!(xy, [(-0.8, -0.8), (0.8, -0.8), (0.8, 0.8), (-0.8, 0.8)]);
    }
}
