use gfx_hal::{adapter::Adapter, format as f, prelude::*, pso, window, Backend};
use log::info;

use crate::error::{gpu, Result};

pub struct Swapchain<'a, B: Backend> {
    device: &'a B::Device,
    adapter: &'a Adapter<B>,
    pub viewport: pso::Viewport,
    pub dims: window::Extent2D,
    pub surface: &'a mut B::Surface,
    pub format: f::Format,
}

impl<'a, B: Backend> Swapchain<'a, B> {
    pub fn new(
        device: &'a B::Device,
        surface: &'a mut B::Surface,
        adapter: &'a Adapter<B>,
        dims: window::Extent2D,
    ) -> Result<Self> {
        let format = pick_format(surface.supported_formats(&adapter.physical_device));

        let viewport = pso::Viewport {
            rect: pso::Rect {
                x: 0,
                y: 0,
                w: dims.width as _,
                h: dims.height as _,
            },
            depth: 0.0..1.0,
        };

        let mut swapchain = Swapchain {
            device,
            surface,
            adapter,
            viewport,
            format,
            dims,
        };

        swapchain.recreate()?;
        Ok(swapchain)
    }

    pub fn resize(&mut self, dims: window::Extent2D) -> Result<()> {
        self.dims = dims;
        self.recreate()
    }

    pub fn recreate(&mut self) -> Result<()> {
        let caps = self.surface.capabilities(&self.adapter.physical_device);

        let mut swap_config = window::SwapchainConfig::from_caps(&caps, self.format, self.dims);
        swap_config.present_mode = window::PresentMode::FIFO;
        let extent = swap_config.extent;
        unsafe {
            self.surface
                .configure_swapchain(self.device, swap_config)
                .map_err(gpu("configure swapchain"))?;
        }
        info!("swapchain configured at {}x{}", extent.width, extent.height);

        self.dims = extent;
        self.viewport.rect.w = extent.width as _;
        self.viewport.rect.h = extent.height as _;
        Ok(())
    }
}

/// Prefers an sRGB format. `None` means the surface takes anything.
fn pick_format(formats: Option<Vec<f::Format>>) -> f::Format {
    let formats = formats.unwrap_or_default();
    formats
        .iter()
        .find(|format| format.base_format().1 == f::ChannelType::Srgb)
        .or_else(|| formats.first())
        .copied()
        .unwrap_or(f::Format::Rgba8Srgb)
}

impl<'a, B: Backend> Drop for Swapchain<'a, B> {
    fn drop(&mut self) {
        unsafe { self.surface.unconfigure_swapchain(self.device) }
    }
}
