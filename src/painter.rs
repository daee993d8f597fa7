//! Painter's algorithm: draw far to near so nearer quads overwrite farther
//! ones without a depth test.

use log::debug;

use crate::shape::Shape;

/// Something a quad can be drawn onto.
pub trait Canvas {
    type Error;

    /// Uploads the quad's vertices and draws its triangle fan.
    fn draw_fan(&mut self, shape: &Shape) -> Result<(), Self::Error>;
}

/// Orders shapes farthest first. Ascending depth, stable for ties.
pub fn sort_back_to_front(shapes: &mut [Shape]) {
    shapes.sort_by(|a, b| a.depth().total_cmp(&b.depth()));
}

/// Draws every shape in slice order, one upload and draw each.
pub fn paint<C: Canvas>(canvas: &mut C, shapes: &[Shape]) -> Result<(), C::Error> {
    for shape in shapes {
        debug!(
            "drawing {} at depth {} as {} triangles",
            shape.name,
            shape.depth(),
            shape.triangles().count()
        );
        canvas.draw_fan(shape)?;
    }
    Ok(())
}
