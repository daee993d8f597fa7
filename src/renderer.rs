use gfx_hal::{
    adapter::{self, MemoryType},
    buffer as b, command, format as f, image as i, pass, pool,
    prelude::*,
    queue::{family::QueueFamilyId, Submission},
    window, Backend, IndexType, Limits,
};
use log::{debug, info, warn};

use std::borrow::Borrow;
use std::iter;
use std::fmt;
use std::mem::{self, ManuallyDrop};
use std::ptr;

mod buffer;
mod memory;
mod pipeline;
pub mod shader;
mod swapchain;
pub mod vertex;

use crate::error::{gpu, RenderError, Result};
use crate::painter::{self, Canvas};
use crate::shape::{Shape, FAN_INDICES};
use memory::Memory;
use pipeline::Pipeline;
use swapchain::Swapchain;

pub struct Renderer<'a, B: Backend> {
    device: &'a B::Device,
    memory_types: Vec<MemoryType>,
    limits: Limits,
    clear_color: [f32; 4],
    command_buffer: B::CommandBuffer,
    submission_complete_semaphore: ManuallyDrop<B::Semaphore>,
    submission_complete_fence: ManuallyDrop<B::Fence>,
    command_pool: ManuallyDrop<B::CommandPool>,
    fan_indices: ManuallyDrop<Memory<'a, B>>,
    swapchain: ManuallyDrop<Swapchain<'a, B>>,
    render_pass: ManuallyDrop<B::RenderPass>,
    pipeline: ManuallyDrop<Pipeline<'a, B>>,
}

/// Binding state for one frame. Every draw goes through this instead of
/// relying on whatever the command buffer last had bound.
struct Frame<'f, 'a, B: Backend> {
    device: &'a B::Device,
    limits: &'f Limits,
    memory_types: &'f [MemoryType],
    fan_indices: &'f B::Buffer,
    cmd_buffer: &'f mut B::CommandBuffer,
    /// Vertex buffers referenced by recorded draws; freed once the frame's
    /// fence has signalled.
    uploads: Vec<Memory<'a, B>>,
}

impl<'f, 'a, B: Backend> Canvas for Frame<'f, 'a, B> {
    type Error = RenderError;

    fn draw_fan(&mut self, shape: &Shape) -> Result<()> {
        let vertices = Memory::upload(
            self.device,
            shape.vertices(),
            b::Usage::VERTEX,
            self.limits,
            self.memory_types,
        )?;
        unsafe {
            self.cmd_buffer.bind_vertex_buffers(
                0,
                iter::once((&*vertices.buffer.buf, b::SubRange::WHOLE)),
            );
            self.cmd_buffer.bind_index_buffer(b::IndexBufferView {
                buffer: self.fan_indices,
                range: b::SubRange::WHOLE,
                index_type: IndexType::U16,
            });
            self.cmd_buffer
                .draw_indexed(0..FAN_INDICES.len() as u32, 0, 0..1);
        }
        self.uploads.push(vertices);
        Ok(())
    }
}

/// Swapchain rebuilds one `render` call may spend before a stale surface
/// becomes an error.
const REBUILDS_PER_RENDER: u32 = 1;

#[derive(Debug)]
enum FrameStatus {
    Presented,
    /// The swapchain no longer matches the surface.
    Stale { op: &'static str, detail: String },
}

impl FrameStatus {
    fn stale<E: fmt::Debug>(op: &'static str, err: E) -> Self {
        FrameStatus::Stale {
            op,
            detail: format!("{:?}", err),
        }
    }
}

/// Draws until a frame is presented, rebuilding between stale attempts.
/// Returns how many frames were drawn.
fn redraw_on_stale<T, D, R>(target: &mut T, mut draw: D, mut rebuild: R) -> Result<u32>
where
    D: FnMut(&mut T) -> Result<FrameStatus>,
    R: FnMut(&mut T) -> Result<()>,
{
    let mut rebuilds_left = REBUILDS_PER_RENDER;
    let mut frames = 0;
    loop {
        frames += 1;
        match draw(target)? {
            FrameStatus::Presented => return Ok(frames),
            FrameStatus::Stale { op, detail } => {
                if rebuilds_left == 0 {
                    return Err(RenderError::Gpu { op, detail });
                }
                rebuilds_left -= 1;
                warn!("failed to {} ({}), recreating swapchain", op, detail);
                rebuild(target)?;
            }
        }
    }
}

/// A frame's framebuffer and vertex buffers may only be freed once the GPU
/// is done with them: either the fence signalled or the device went idle.
fn safe_to_release<E>(
    finished: &std::result::Result<(), E>,
    idle: impl FnOnce() -> bool,
) -> bool {
    finished.is_ok() || idle()
}

impl<'a, B> Renderer<'a, B>
where
    B: Backend,
{
    pub fn new(
        surface: &'a mut B::Surface,
        adapter: &'a adapter::Adapter<B>,
        device: &'a B::Device,
        family: QueueFamilyId,
        init_dims: window::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        let memory_types = adapter.physical_device.memory_properties().memory_types;
        let limits = adapter.physical_device.limits();

        let fan_indices = Memory::upload(
            device,
            &FAN_INDICES,
            b::Usage::INDEX,
            &limits,
            &memory_types,
        )?;
        let swapchain = Swapchain::new(device, surface, adapter, init_dims)?;
        let render_pass = Self::create_render_pass(device, swapchain.format)?;
        let pipeline = Pipeline::new(device, &render_pass)?;

        let mut command_pool = unsafe {
            device.create_command_pool(family, pool::CommandPoolCreateFlags::empty())
        }
        .map_err(gpu("create command pool"))?;
        let command_buffer = unsafe { command_pool.allocate_one(command::Level::Primary) };
        let submission_complete_semaphore = device
            .create_semaphore()
            .map_err(gpu("create semaphore"))?;
        let submission_complete_fence = device
            .create_fence(false)
            .map_err(gpu("create fence"))?;

        info!("renderer ready, surface format {:?}", swapchain.format);

        Ok(Renderer {
            device,
            memory_types,
            limits,
            clear_color,
            command_buffer,
            submission_complete_semaphore: ManuallyDrop::new(submission_complete_semaphore),
            submission_complete_fence: ManuallyDrop::new(submission_complete_fence),
            command_pool: ManuallyDrop::new(command_pool),
            fan_indices: ManuallyDrop::new(fan_indices),
            swapchain: ManuallyDrop::new(swapchain),
            render_pass: ManuallyDrop::new(render_pass),
            pipeline: ManuallyDrop::new(pipeline),
        })
    }

    pub fn resize(&mut self, dims: window::Extent2D) -> Result<()> {
        self.swapchain.resize(dims)
    }

    /// Draws `shapes` in slice order into the next swapchain image, presents
    /// it, and waits for the GPU to finish before returning. A stale
    /// swapchain is rebuilt and the frame drawn again.
    pub fn render(&mut self, queue: &mut B::CommandQueue, shapes: &[Shape]) -> Result<()> {
        let frames = redraw_on_stale(
            self,
            |renderer| renderer.draw_frame(queue, shapes),
            |renderer| renderer.swapchain.recreate(),
        )?;
        debug!("presented {} shapes after {} attempt(s)", shapes.len(), frames);
        Ok(())
    }

    fn draw_frame(
        &mut self,
        queue: &mut B::CommandQueue,
        shapes: &[Shape],
    ) -> Result<FrameStatus> {
        let surface_image = match unsafe { self.swapchain.surface.acquire_image(!0) } {
            Ok((image, _)) => image,
            Err(err) => return Ok(FrameStatus::stale("acquire swapchain image", err)),
        };

        let framebuffer = unsafe {
            self.device.create_framebuffer(
                &self.render_pass,
                iter::once(surface_image.borrow()),
                i::Extent {
                    width: self.swapchain.dims.width,
                    height: self.swapchain.dims.height,
                    depth: 1,
                },
            )
        }
        .map_err(gpu("create framebuffer"))?;

        unsafe {
            self.command_pool.reset(false);
        }

        let uploads = match self.record(&framebuffer, shapes) {
            Ok(uploads) => uploads,
            Err(err) => {
                unsafe { self.device.destroy_framebuffer(framebuffer) };
                return Err(err);
            }
        };

        let presented = unsafe {
            let submission = Submission {
                command_buffers: iter::once(&self.command_buffer),
                wait_semaphores: None,
                signal_semaphores: iter::once(&*self.submission_complete_semaphore),
            };
            queue.submit(submission, Some(&*self.submission_complete_fence));

            queue.present_surface(
                &mut self.swapchain.surface,
                surface_image,
                Some(&*self.submission_complete_semaphore),
            )
        };

        let finished = unsafe {
            self.device
                .wait_for_fence(&self.submission_complete_fence, !0)
                .map_err(gpu("wait for fence"))
                .and_then(|_| {
                    self.device
                        .reset_fence(&self.submission_complete_fence)
                        .map_err(gpu("reset fence"))
                })
        };
        let device = self.device;
        let idle = || match device.wait_idle() {
            Ok(()) => true,
            Err(err) => {
                warn!("device did not go idle: {:?}", err);
                false
            }
        };
        if safe_to_release(&finished, idle) {
            unsafe { device.destroy_framebuffer(framebuffer) };
            drop(uploads);
        } else {
            warn!("frame never finished, leaking its framebuffer and buffers");
            mem::forget(framebuffer);
            mem::forget(uploads);
        }
        finished?;

        Ok(match presented {
            Ok(_) => FrameStatus::Presented,
            Err(err) => FrameStatus::stale("present surface", err),
        })
    }

    fn record(
        &mut self,
        framebuffer: &B::Framebuffer,
        shapes: &[Shape],
    ) -> Result<Vec<Memory<'a, B>>> {
        let cmd_buffer = &mut self.command_buffer;
        unsafe {
            cmd_buffer.begin_primary(command::CommandBufferFlags::ONE_TIME_SUBMIT);
            cmd_buffer.set_viewports(0, &[self.swapchain.viewport.clone()]);
            cmd_buffer.set_scissors(0, &[self.swapchain.viewport.rect]);
            cmd_buffer.bind_graphics_pipeline(&self.pipeline.pipeline);
            cmd_buffer.begin_render_pass(
                &self.render_pass,
                framebuffer,
                self.swapchain.viewport.rect,
                &[command::ClearValue {
                    color: command::ClearColor {
                        float32: self.clear_color,
                    },
                }],
                command::SubpassContents::Inline,
            );
        }

        let mut frame: Frame<B> = Frame {
            device: self.device,
            limits: &self.limits,
            memory_types: &self.memory_types,
            fan_indices: &*self.fan_indices.buffer.buf,
            cmd_buffer,
            uploads: Vec::with_capacity(shapes.len()),
        };
        let painted = painter::paint(&mut frame, shapes);
        let Frame {
            cmd_buffer,
            uploads,
            ..
        } = frame;

        unsafe {
            cmd_buffer.end_render_pass();
            cmd_buffer.finish();
        }
        painted.map(|()| uploads)
    }

    fn create_render_pass(device: &B::Device, format: f::Format) -> Result<B::RenderPass> {
        let attachment = pass::Attachment {
            format: Some(format),
            samples: 1,
            ops: pass::AttachmentOps::new(
                pass::AttachmentLoadOp::Clear,
                pass::AttachmentStoreOp::Store,
            ),
            stencil_ops: pass::AttachmentOps::DONT_CARE,
            layouts: i::Layout::Undefined..i::Layout::Present,
        };

        let subpass = pass::SubpassDesc {
            colors: &[(0, i::Layout::ColorAttachmentOptimal)],
            depth_stencil: None,
            inputs: &[],
            resolves: &[],
            preserves: &[],
        };

        unsafe {
            device.create_render_pass(
                &[attachment],
                &[subpass],
                iter::empty::<pass::SubpassDependency>(),
            )
        }
        .map_err(gpu("create render pass"))
    }
}

impl<'a, B: Backend> Drop for Renderer<'a, B> {
    fn drop(&mut self) {
        let device = self.device;
        if let Err(err) = device.wait_idle() {
            warn!("device did not go idle before teardown: {:?}", err);
        }
        unsafe {
            ManuallyDrop::drop(&mut self.fan_indices);
            device.destroy_command_pool(ManuallyDrop::into_inner(ptr::read(&self.command_pool)));
            device.destroy_semaphore(ManuallyDrop::into_inner(ptr::read(
                &self.submission_complete_semaphore,
            )));
            device.destroy_fence(ManuallyDrop::into_inner(ptr::read(
                &self.submission_complete_fence,
            )));
            ManuallyDrop::drop(&mut self.pipeline);
            device.destroy_render_pass(ManuallyDrop::into_inner(ptr::read(&self.render_pass)));
            ManuallyDrop::drop(&mut self.swapchain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Surface {
        stale_frames: u32,
        drawn: u32,
        rebuilt: u32,
    }

    fn draw(surface: &mut Surface) -> Result<FrameStatus> {
        surface.drawn += 1;
        if surface.stale_frames > 0 {
            surface.stale_frames -= 1;
            return Ok(FrameStatus::stale("present surface", "OutOfDate"));
        }
        Ok(FrameStatus::Presented)
    }

    fn rebuild(surface: &mut Surface) -> Result<()> {
        surface.rebuilt += 1;
        Ok(())
    }

    #[test]
    fn fresh_swapchain_draws_once() {
        let mut surface = Surface::default();
        assert_eq!(redraw_on_stale(&mut surface, draw, rebuild).unwrap(), 1);
        assert_eq!(surface.rebuilt, 0);
    }

    #[test]
    fn failed_present_rebuilds_and_draws_again() {
        let mut surface = Surface {
            stale_frames: 1,
            ..Surface::default()
        };
        assert_eq!(redraw_on_stale(&mut surface, draw, rebuild).unwrap(), 2);
        assert_eq!(surface.rebuilt, 1);
        assert_eq!(surface.drawn, 2);
    }

    #[test]
    fn stale_after_rebuild_is_an_error() {
        let mut surface = Surface {
            stale_frames: 2,
            ..Surface::default()
        };
        match redraw_on_stale(&mut surface, draw, rebuild) {
            Err(RenderError::Gpu { op, .. }) => assert_eq!(op, "present surface"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(surface.rebuilt, 1);
    }

    #[test]
    fn finished_frame_releases_without_idling() {
        let finished: std::result::Result<(), ()> = Ok(());
        assert!(safe_to_release(&finished, || panic!("idle not needed")));
    }

    #[test]
    fn unfinished_frame_waits_for_idle() {
        let finished = Err("device lost");
        assert!(safe_to_release(&finished, || true));
        assert!(!safe_to_release(&finished, || false));
    }
}
