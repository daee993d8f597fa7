use gfx_hal::{format as f, pass::Subpass, prelude::*, pso, Backend};
use log::{error, info};
use std::iter;
use std::mem::ManuallyDrop;
use std::ops::Range;
use std::ptr;

use super::shader::{self, Stage};
use super::vertex::{Attribute, Vertex};
use crate::error::{gpu, RenderError, Result};

const ENTRY_NAME: &str = "main";

pub struct Pipeline<'a, B: Backend> {
    device: &'a B::Device,
    pub pipeline: ManuallyDrop<B::GraphicsPipeline>,
    pub pipeline_layout: ManuallyDrop<B::PipelineLayout>,
}

impl<'a, B: Backend> Pipeline<'a, B> {
    pub fn new(device: &'a B::Device, render_pass: &B::RenderPass) -> Result<Self> {
        let pipeline_layout = unsafe {
            device.create_pipeline_layout(
                iter::empty::<B::DescriptorSetLayout>(),
                iter::empty::<(pso::ShaderStageFlags, Range<u32>)>(),
            )
        }
        .map_err(gpu("create pipeline layout"))?;

        match Self::link(device, render_pass, &pipeline_layout) {
            Ok(pipeline) => {
                info!("linked painter pipeline");
                Ok(Pipeline {
                    device,
                    pipeline: ManuallyDrop::new(pipeline),
                    pipeline_layout: ManuallyDrop::new(pipeline_layout),
                })
            }
            Err(err) => {
                unsafe { device.destroy_pipeline_layout(pipeline_layout) };
                Err(err)
            }
        }
    }

    fn link(
        device: &B::Device,
        render_pass: &B::RenderPass,
        pipeline_layout: &B::PipelineLayout,
    ) -> Result<B::GraphicsPipeline> {
        let vs_module = Self::load_module(device, Stage::Vertex, shader::VERTEX_SOURCE)?;
        let fs_module = match Self::load_module(device, Stage::Fragment, shader::FRAGMENT_SOURCE) {
            Ok(module) => module,
            Err(err) => {
                unsafe { device.destroy_shader_module(vs_module) };
                return Err(err);
            }
        };

        let shader_entries = pso::GraphicsShaderSet {
            vertex: pso::EntryPoint {
                entry: ENTRY_NAME,
                module: &vs_module,
                specialization: pso::Specialization::default(),
            },
            hull: None,
            domain: None,
            geometry: None,
            fragment: Some(pso::EntryPoint {
                entry: ENTRY_NAME,
                module: &fs_module,
                specialization: pso::Specialization::default(),
            }),
        };

        let subpass = Subpass {
            index: 0,
            main_pass: render_pass,
        };

        // fans are expanded through the index buffer
        let mut pipeline_desc = pso::GraphicsPipelineDesc::new(
            shader_entries,
            pso::Primitive::TriangleList,
            pso::Rasterizer::FILL,
            pipeline_layout,
            subpass,
        );
        // no depth test and no blending: draw order alone decides coverage
        pipeline_desc.blender.targets.push(pso::ColorBlendDesc {
            mask: pso::ColorMask::ALL,
            blend: None,
        });

        pipeline_desc.vertex_buffers.push(pso::VertexBufferDesc {
            binding: 0,
            stride: Vertex::STRIDE,
            rate: pso::VertexInputRate::Vertex,
        });
        for attribute in Vertex::ATTRIBUTES.iter() {
            pipeline_desc.attributes.push(attribute_desc(attribute));
        }

        let pipeline = unsafe { device.create_graphics_pipeline(&pipeline_desc, None) };

        unsafe {
            device.destroy_shader_module(vs_module);
            device.destroy_shader_module(fs_module);
        }

        pipeline.map_err(|err| {
            error!("error linking shader pipeline: {:?}", err);
            RenderError::PipelineLink(format!("{:?}", err))
        })
    }

    fn load_module(device: &B::Device, stage: Stage, source: &str) -> Result<B::ShaderModule> {
        let spirv = shader::compile(stage, source)?;
        unsafe { device.create_shader_module(&spirv) }.map_err(gpu("create shader module"))
    }
}

fn attribute_desc(attribute: &Attribute) -> pso::AttributeDesc {
    let format = match attribute.components {
        1 => f::Format::R32Sfloat,
        2 => f::Format::Rg32Sfloat,
        3 => f::Format::Rgb32Sfloat,
        _ => f::Format::Rgba32Sfloat,
    };
    pso::AttributeDesc {
        location: attribute.location,
        binding: 0,
        element: pso::Element {
            format,
            offset: attribute.offset,
        },
    }
}

impl<'a, B: Backend> Drop for Pipeline<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_graphics_pipeline(ManuallyDrop::into_inner(ptr::read(&self.pipeline)));
            self.device
                .destroy_pipeline_layout(ManuallyDrop::into_inner(ptr::read(
                    &self.pipeline_layout,
                )));
        }
    }
}
