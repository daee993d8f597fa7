use gfx_hal::window::Extent2D;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub title: &'static str,
    /// Reported to the backend instance.
    pub app_version: u32,
    pub extent: Extent2D,
    pub min_extent: (f64, f64),
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Config {
            title: "painter's quads",
            app_version: 1,
            extent: Extent2D {
                width: 1024,
                height: 768,
            },
            min_extent: (64.0, 64.0),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
