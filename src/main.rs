#[cfg(feature = "metal")]
use gfx_backend_metal as back;

#[cfg(feature = "vulkan")]
use gfx_backend_vulkan as back;

mod config;
mod error;
mod painter;
#[cfg(test)]
mod raster;
mod registry;
mod renderer;
mod shape;

use config::Config;
use error::RenderError;
use renderer::Renderer;
use shape::Shape;

use gfx_hal::{adapter::Adapter, prelude::*, queue::family::QueueGroup, window, Backend, Features};
use log::{error, info};
use std::process;
use std::sync::mpsc::{self, Receiver};
use std::thread;

enum Signal {
    Redraw,
    Resize(window::Extent2D),
    Close,
}

fn main() {
    env_logger::init();
    let config = Config::default();

    let mut scene = match registry::load() {
        Ok(scene) => scene,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };
    painter::sort_back_to_front(&mut scene);

    let event_loop = winit::event_loop::EventLoop::new();
    let wb = winit::window::WindowBuilder::new()
        .with_title(config.title)
        .with_inner_size(winit::dpi::Size::Physical(winit::dpi::PhysicalSize::new(
            config.extent.width,
            config.extent.height,
        )))
        .with_min_inner_size(winit::dpi::Size::Logical(winit::dpi::LogicalSize::new(
            config.min_extent.0,
            config.min_extent.1,
        )));
    let window = match wb.build(&event_loop) {
        Ok(window) => window,
        Err(err) => {
            error!("{}", RenderError::ContextUnavailable(err.to_string()));
            process::exit(1);
        }
    };

    let (signals, receiver) = mpsc::channel();
    let handler = thread::spawn(move || {
        if let Err(err) = present(window, config, &scene, receiver) {
            error!("{}", err);
            process::exit(1);
        }
    });
    let mut handler = Some(handler);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = winit::event_loop::ControlFlow::Wait;
        let signal = match event {
            winit::event::Event::WindowEvent { event, .. } => match event {
                winit::event::WindowEvent::CloseRequested => Signal::Close,
                winit::event::WindowEvent::Resized(size) => Signal::Resize(window::Extent2D {
                    width: size.width,
                    height: size.height,
                }),
                _ => return,
            },
            winit::event::Event::RedrawRequested(_) => Signal::Redraw,
            _ => return,
        };

        if handler.is_none() {
            return;
        }
        let closing = matches!(signal, Signal::Close);
        // a dropped receiver means the render thread is gone
        if signals.send(signal).is_err() || closing {
            let status = join_render_thread(handler.take());
            if status != 0 || !closing {
                process::exit(1);
            }
            info!("closed");
            *control_flow = winit::event_loop::ControlFlow::Exit;
        }
    });
}

/// Waits for the render thread and turns its outcome into an exit status.
fn join_render_thread(handler: Option<thread::JoinHandle<()>>) -> i32 {
    match handler.map(thread::JoinHandle::join) {
        None | Some(Ok(())) => 0,
        Some(Err(panic)) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|reason| reason.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            error!("render thread panicked: {}", reason);
            1
        }
    }
}

/// Owns the GPU for the lifetime of the window: acquires a context, draws
/// the scene once, then re-presents it on request.
fn present(
    window: winit::window::Window,
    config: Config,
    scene: &[Shape],
    signals: Receiver<Signal>,
) -> Result<(), RenderError> {
    let instance = back::Instance::create(config.title, config.app_version)
        .map_err(|err| RenderError::ContextUnavailable(format!("{:?}", err)))?;
    let mut surface = unsafe { instance.create_surface(&window) }
        .map_err(|err| RenderError::ContextUnavailable(format!("{:?}", err)))?;

    let mut adapters = instance.enumerate_adapters();
    if adapters.is_empty() {
        return Err(RenderError::NoAdapter);
    }
    let adapter = adapters.remove(0);
    info!("using adapter {}", adapter.info.name);

    let family = adapter
        .queue_families
        .iter()
        .find(|family| {
            surface.supports_queue_family(family) && family.queue_type().supports_graphics()
        })
        .ok_or(RenderError::NoQueueFamily)?;
    let mut gpu = unsafe {
        adapter
            .physical_device
            .open(&[(family, &[1.0])], Features::empty())
    }
    .map_err(error::gpu("open device"))?;

    let mut queue_group = gpu.queue_groups.pop().ok_or(RenderError::NoQueueFamily)?;
    let device = gpu.device;

    let outcome = serve(
        &mut surface,
        &adapter,
        &device,
        &mut queue_group,
        &config,
        scene,
        &signals,
    );

    unsafe {
        instance.destroy_surface(surface);
    }
    outcome
}

fn serve<B: Backend>(
    surface: &mut B::Surface,
    adapter: &Adapter<B>,
    device: &B::Device,
    queue_group: &mut QueueGroup<B>,
    config: &Config,
    scene: &[Shape],
    signals: &Receiver<Signal>,
) -> Result<(), RenderError> {
    let mut renderer = Renderer::new(
        surface,
        adapter,
        device,
        queue_group.family,
        config.extent,
        config.clear_color,
    )?;
    let queue = &mut queue_group.queues[0];

    renderer.render(queue, scene)?;
    for signal in signals.iter() {
        match signal {
            Signal::Redraw => renderer.render(queue, scene)?,
            // minimized windows report a zero extent
            Signal::Resize(dims) if dims.width == 0 || dims.height == 0 => {}
            Signal::Resize(dims) => {
                renderer.resize(dims)?;
                renderer.render(queue, scene)?;
            }
            Signal::Close => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_render_thread_exits_zero() {
        let handler = thread::spawn(|| ());
        assert_eq!(join_render_thread(Some(handler)), 0);
    }

    #[test]
    fn panicked_render_thread_exits_one() {
        let handler = thread::spawn(|| panic!("no surface formats"));
        assert_eq!(join_render_thread(Some(handler)), 1);
    }

    #[test]
    fn already_joined_thread_exits_zero() {
        assert_eq!(join_render_thread(None), 0);
    }
}
