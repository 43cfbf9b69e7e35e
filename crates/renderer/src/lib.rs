//! Tiled GPU color-correction renderer.
//!
//! Frames that exceed the device's maximum texture extent are split into
//! tiles (see the `tiling` crate); each tile is uploaded, run through one
//! fullscreen-quad pass at the tile's exact viewport size, read back, and
//! composed into the output frame. Tiles touch disjoint regions, so the
//! result is pixel-identical to an untiled render and tiles may be
//! processed concurrently.
//!
//! The GPU device, queue and the two pass pipelines (hue/saturation and
//! brightness) live in [`GpuContext`], created once and injected wherever
//! rendering happens. The `cpu` module mirrors the shader math exactly and
//! stands in for the GPU in tests and headless environments without an
//! adapter.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use thiserror::Error;
use tracing::{debug, info_span};
use wgpu::util::DeviceExt;

use animation::ColorCorrection;
use tiling::{PixelRect, Tile, TilingError};

pub mod cpu;
mod dispatch;
pub use dispatch::{render_frame_parallel, CancelToken};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("tile source rect {rect:?} outside source frame {width}x{height}")]
    TileBounds {
        rect: PixelRect,
        width: u32,
        height: u32,
    },
    #[error(transparent)]
    Tiling(#[from] TilingError),
    #[error("buffer readback failed")]
    BufferMap,
    #[error("frame render cancelled")]
    Cancelled,
}

/// Per-pass shader parameters, bound as the pass's uniform buffer.
///
/// Both variants run through the same tiling machinery; they differ only
/// in pipeline and uniform layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassParams {
    /// Rotate hue and scale saturation in HSV space, leaving value
    /// untouched.
    HueSaturation(ColorCorrection),
    /// Scale RGB uniformly.
    Brightness(f32),
}

/// A CPU-resident RGBA8 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    /// Copy out the pixels of `rect`, tightly packed. Fails when the rect
    /// is not fully inside the frame.
    pub fn sub_rect(&self, rect: &PixelRect) -> Result<Vec<u8>, RenderError> {
        if !self.bounds().contains(rect) {
            return Err(RenderError::TileBounds {
                rect: *rect,
                width: self.width,
                height: self.height,
            });
        }
        let row_bytes = rect.width as usize * 4;
        let mut out = Vec::with_capacity(row_bytes * rect.height as usize);
        for row in 0..rect.height as usize {
            let src = (rect.y as usize + row) * self.width as usize * 4 + rect.x as usize * 4;
            out.extend_from_slice(&self.pixels[src..src + row_bytes]);
        }
        Ok(out)
    }

    /// Write tightly packed `pixels` into `rect`. Only that region is
    /// touched.
    pub fn write_rect(&mut self, rect: &PixelRect, pixels: &[u8]) -> Result<(), RenderError> {
        if !self.bounds().contains(rect) {
            return Err(RenderError::TileBounds {
                rect: *rect,
                width: self.width,
                height: self.height,
            });
        }
        let row_bytes = rect.width as usize * 4;
        debug_assert_eq!(pixels.len(), row_bytes * rect.height as usize);
        for row in 0..rect.height as usize {
            let dst = (rect.y as usize + row) * self.width as usize * 4 + rect.x as usize * 4;
            self.pixels[dst..dst + row_bytes].copy_from_slice(&pixels[row * row_bytes..][..row_bytes]);
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    tex_coords: [f32; 2],
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [-1.0, -1.0],
        tex_coords: [0.0, 1.0],
    },
    Vertex {
        position: [1.0, -1.0],
        tex_coords: [1.0, 1.0],
    },
    Vertex {
        position: [1.0, 1.0],
        tex_coords: [1.0, 0.0],
    },
    Vertex {
        position: [-1.0, 1.0],
        tex_coords: [0.0, 0.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2, 2, 3, 0];

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct HueSaturationUniforms {
    hue: f32,
    saturation: f32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BrightnessUniforms {
    brightness: f32,
    _padding: [f32; 3],
}

/// Process-wide GPU state: device, queue and the two color pipelines.
/// Created once at startup and passed by reference into rendering; nothing
/// here is a global.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    hue_saturation_pipeline: wgpu::RenderPipeline,
    brightness_pipeline: wgpu::RenderPipeline,

    texture_bind_group_layout: wgpu::BindGroupLayout,
    uniform_bind_group_layout: wgpu::BindGroupLayout,

    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

impl GpuContext {
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("No suitable adapter found"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Color Corrector Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
                label: Some("texture_bind_group_layout"),
            });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let hue_saturation_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Hue/Saturation Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/hue_saturation.wgsl"
            ))),
        });

        let brightness_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Brightness Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/brightness.wgsl"
            ))),
        });

        let hue_saturation_pipeline = Self::create_render_pipeline(
            &device,
            "Hue/Saturation Pipeline",
            &hue_saturation_shader,
            &texture_bind_group_layout,
            &uniform_bind_group_layout,
        );

        let brightness_pipeline = Self::create_render_pipeline(
            &device,
            "Brightness Pipeline",
            &brightness_shader,
            &texture_bind_group_layout,
            &uniform_bind_group_layout,
        );

        Ok(Self {
            device,
            queue,
            hue_saturation_pipeline,
            brightness_pipeline,
            texture_bind_group_layout,
            uniform_bind_group_layout,
            vertex_buffer,
            index_buffer,
        })
    }

    fn create_render_pipeline(
        device: &wgpu::Device,
        label: &str,
        shader: &wgpu::ShaderModule,
        texture_bind_group_layout: &wgpu::BindGroupLayout,
        uniform_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> wgpu::RenderPipeline {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", label)),
            bind_group_layouts: &[texture_bind_group_layout, uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// The largest tile one draw may address on this device.
    pub fn max_tile_extent(&self) -> (u32, u32) {
        let max = self.device.limits().max_texture_dimension_2d;
        (max, max)
    }

    fn pipeline_for(&self, pass: &PassParams) -> &wgpu::RenderPipeline {
        match pass {
            PassParams::HueSaturation(_) => &self.hue_saturation_pipeline,
            PassParams::Brightness(_) => &self.brightness_pipeline,
        }
    }

    fn uniform_bytes(pass: &PassParams) -> Vec<u8> {
        match pass {
            PassParams::HueSaturation(cc) => bytemuck::bytes_of(&HueSaturationUniforms {
                hue: cc.hue_radians,
                saturation: cc.saturation,
                _padding: [0.0; 2],
            })
            .to_vec(),
            PassParams::Brightness(b) => bytemuck::bytes_of(&BrightnessUniforms {
                brightness: *b,
                _padding: [0.0; 3],
            })
            .to_vec(),
        }
    }

    /// Render one tile: upload its source rect, run the pass at the tile's
    /// viewport size, read the target back. Returns the tile's pixels,
    /// tightly packed; the caller composes them into `tile.dest_rect`.
    ///
    /// A source rect outside the frame fails with
    /// [`RenderError::TileBounds`] and leaves nothing written, so the
    /// frame-level caller can skip or retry just this tile.
    pub fn render_tile(
        &self,
        tile: &Tile,
        source: &FrameBuffer,
        pass: &PassParams,
    ) -> Result<Vec<u8>, RenderError> {
        let pending = self.submit_tile(tile, source, pass)?;
        self.map_to_cpu(&pending)
    }

    /// Encode and submit one tile's pass without waiting for the result.
    /// The returned [`PendingTile`] owns the staging buffer the readback
    /// lands in; [`Self::map_to_cpu`] resolves it.
    fn submit_tile(
        &self,
        tile: &Tile,
        source: &FrameBuffer,
        pass: &PassParams,
    ) -> Result<PendingTile, RenderError> {
        let tile_pixels = source.sub_rect(&tile.source_rect)?;
        let (width, height) = (tile.viewport.width, tile.viewport.height);

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let input_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tile.input"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &input_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &tile_pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent,
        );

        let output_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tile.output"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        &input_texture.create_view(&wgpu::TextureViewDescriptor::default()),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("tile.texture-bind-group"),
        });

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tile.uniforms"),
                contents: &Self::uniform_bytes(pass),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("tile.uniform-bind-group"),
        });

        let row_pitch = align_to(width * 4, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tile.staging"),
            size: row_pitch as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tile.encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tile.pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_pass.set_pipeline(self.pipeline_for(pass));
            render_pass.set_bind_group(0, &texture_bind_group, &[]);
            render_pass.set_bind_group(1, &uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..INDICES.len() as u32, 0, 0..1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(row_pitch),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        Ok(PendingTile {
            staging: staging_buffer,
            row_pitch,
            width,
            height,
        })
    }

    fn map_to_cpu(&self, pending: &PendingTile) -> Result<Vec<u8>, RenderError> {
        let (row_pitch, width, height) = (pending.row_pitch, pending.width, pending.height);
        let staging = &pending.staging;
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            _ => return Err(RenderError::BufferMap),
        }

        let mapped = slice.get_mapped_range();
        let row_stride = width as usize * 4;
        let mut pixels = vec![0u8; row_stride * height as usize];
        for row in 0..height as usize {
            let src = row * row_pitch as usize;
            pixels[row * row_stride..][..row_stride].copy_from_slice(&mapped[src..src + row_stride]);
        }
        drop(mapped);
        staging.unmap();
        Ok(pixels)
    }

    /// Render a whole frame, tiled to the device's texture limit.
    pub fn render_frame(
        &self,
        source: &FrameBuffer,
        pass: &PassParams,
    ) -> Result<FrameBuffer, RenderError> {
        let (max_w, max_h) = self.max_tile_extent();
        self.render_frame_tiled(source, pass, (max_w as i64, max_h as i64))
    }

    /// Render a whole frame with an explicit tile-size cap. Every tile's
    /// pass is encoded and submitted, in row-major order, before the first
    /// readback blocks, so the queue keeps the device busy while earlier
    /// tiles drain back to the CPU. Composition stays deterministic: tiles
    /// are mapped and written in the order they were planned.
    pub fn render_frame_tiled(
        &self,
        source: &FrameBuffer,
        pass: &PassParams,
        max_tile: (i64, i64),
    ) -> Result<FrameBuffer, RenderError> {
        let span = info_span!(
            "render_frame",
            width = source.width,
            height = source.height
        );
        let _guard = span.enter();

        let tiles = tiling::plan((source.width as i64, source.height as i64), max_tile)?;

        let mut in_flight = Vec::with_capacity(tiles.len());
        for tile in &tiles {
            debug!(?tile.dest_rect, "submitting tile");
            in_flight.push((tile, self.submit_tile(tile, source, pass)?));
        }

        let mut output = FrameBuffer::new(source.width, source.height);
        for (tile, pending) in &in_flight {
            let pixels = self.map_to_cpu(pending)?;
            output.write_rect(&tile.dest_rect, &pixels)?;
        }
        Ok(output)
    }
}

/// A tile whose pass has been submitted but not yet read back.
struct PendingTile {
    staging: wgpu::Buffer,
    row_pitch: u32,
    width: u32,
    height: u32,
}

pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}
