//! Software canvas: fills fan triangles on the CPU with no depth test, the
//! same way the GPU pipeline is configured.

use image::{Rgba, RgbaImage};
use std::convert::Infallible;

use crate::painter::Canvas;
use crate::renderer::vertex::Vertex;
use crate::shape::Shape;

pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Raster {
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn fill(&mut self, tri: [&Vertex; 3]) {
        let (w, h) = self.image.dimensions();
        let [a, b, c] = tri;
        let area = edge(a, b, c.position[0], c.position[1]);
        if area == 0.0 {
            return;
        }
        for py in 0..h {
            for px in 0..w {
                // pixel centers in normalized device coordinates, y up
                let x = (px as f32 + 0.5) / w as f32 * 2.0 - 1.0;
                let y = 1.0 - (py as f32 + 0.5) / h as f32 * 2.0;
                let wa = edge(b, c, x, y) / area;
                let wb = edge(c, a, x, y) / area;
                let wc = edge(a, b, x, y) / area;
                if wa < 0.0 || wb < 0.0 || wc < 0.0 {
                    continue;
                }
                let mut rgba = [0u8; 4];
                for (i, channel) in rgba.iter_mut().enumerate() {
                    let v = wa * a.color[i] + wb * b.color[i] + wc * c.color[i];
                    *channel = (v.max(0.0).min(1.0) * 255.0).round() as u8;
                }
                self.image.put_pixel(px, py, Rgba(rgba));
            }
        }
    }
}

fn edge(from: &Vertex, to: &Vertex, x: f32, y: f32) -> f32 {
    let (fx, fy) = (from.position[0], from.position[1]);
    let (tx, ty) = (to.position[0], to.position[1]);
    (tx - fx) * (y - fy) - (ty - fy) * (x - fx)
}

impl Canvas for Raster {
    type Error = Infallible;

    fn draw_fan(&mut self, shape: &Shape) -> Result<(), Infallible> {
        for tri in shape.triangles() {
            self.fill(tri);
        }
        Ok(())
    }
}
