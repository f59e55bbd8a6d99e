//! wgpu implementation of [`GraphicsBackend`].
//!
//! Programs are parsed and validated with naga before they reach the device.
//! Their parameter table is reflected from the module: each member of the
//! `params` uniform struct becomes a scalar, vector or array parameter
//! written at its naga-computed offset, and each sampled-texture global
//! becomes a texture parameter bound at its binding index. Members whose
//! name starts with `_` are layout padding and are not exposed.
//!
//! Every draw records and submits its own command buffer, so the per-program
//! uniform buffer can be rewritten between draws of the same program.

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashMap;

use super::backend::{
    BackendCaps, BackendKind, DrawCall, GraphicsBackend, KernelEncoding,
    ParamInfo, ParamKind, ParamValue, ProgramId, ProgramSource, TextureFormat,
    TextureId,
};
use super::pipeline_helpers::{
    bytes_per_texel, create_program_pipeline, layout_entry, linear_sampler,
    wgpu_format, SlotKind,
};
use crate::error::BlurError;

/// Errors that can occur while acquiring a headless wgpu device.
#[derive(Debug)]
pub enum WgpuInitError {
    /// No compatible GPU adapter found.
    AdapterRequest(wgpu::RequestAdapterError),
    /// GPU device request failed (limits or features not met).
    DeviceRequest(wgpu::RequestDeviceError),
}

impl fmt::Display for WgpuInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterRequest(e) => {
                write!(f, "no compatible GPU adapter found: {e}")
            }
            Self::DeviceRequest(e) => write!(f, "device request failed: {e}"),
        }
    }
}

impl std::error::Error for WgpuInitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AdapterRequest(e) => Some(e),
            Self::DeviceRequest(e) => Some(e),
        }
    }
}

/// Where a reflected parameter lives on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Uniform { offset: u32 },
    Texture { binding: u32 },
}

/// Parameter table and bind layout recovered from a naga module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reflection {
    pub(crate) params: Vec<ParamInfo>,
    locations: Vec<Location>,
    /// Binding and byte size of the `params` uniform struct.
    uniform: Option<(u32, u32)>,
    sampler: Option<u32>,
}

impl Reflection {
    fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::new();
        if let Some((binding, _)) = self.uniform {
            entries.push(layout_entry(binding, SlotKind::Uniform));
        }
        if let Some(binding) = self.sampler {
            entries.push(layout_entry(binding, SlotKind::Sampler));
        }
        for location in &self.locations {
            if let Location::Texture { binding } = *location {
                entries.push(layout_entry(binding, SlotKind::Texture));
            }
        }
        entries
    }

    /// Uniform buffer length, rounded up to the 16-byte uniform alignment.
    fn uniform_len(&self) -> u32 {
        self.uniform
            .map_or(16, |(_, size)| size.max(1).div_ceil(16) * 16)
    }
}

/// Reflect the parameter table of a validated module.
pub(crate) fn reflect(module: &naga::Module) -> Result<Reflection, String> {
    let mut reflection = Reflection {
        params: Vec::new(),
        locations: Vec::new(),
        uniform: None,
        sampler: None,
    };
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = var.binding.as_ref().map(|b| b.binding) else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        match (var.space, &module.types[var.ty].inner) {
            (
                naga::AddressSpace::Uniform,
                naga::TypeInner::Struct { members, span },
            ) => {
                if reflection.uniform.is_some() {
                    return Err(format!(
                        "second uniform block `{name}`; programs take one"
                    ));
                }
                reflection.uniform = Some((binding, *span));
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    if member_name.starts_with('_') {
                        continue;
                    }
                    let kind = member_kind(module, member.ty).ok_or_else(|| {
                        format!("unsupported type for parameter `{member_name}`")
                    })?;
                    reflection.params.push(ParamInfo {
                        name: member_name,
                        kind,
                    });
                    reflection.locations.push(Location::Uniform {
                        offset: member.offset,
                    });
                }
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => {
                reflection.params.push(ParamInfo {
                    name,
                    kind: ParamKind::Texture,
                });
                reflection.locations.push(Location::Texture { binding });
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => {
                reflection.sampler = Some(binding);
            }
            _ => return Err(format!("unsupported global `{name}`")),
        }
    }
    Ok(reflection)
}

fn member_kind(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
) -> Option<ParamKind> {
    match module.types[ty].inner {
        naga::TypeInner::Scalar(scalar) => {
            if scalar == naga::Scalar::F32 {
                Some(ParamKind::Float)
            } else if scalar == naga::Scalar::I32 {
                Some(ParamKind::Int)
            } else if scalar == naga::Scalar::U32 {
                Some(ParamKind::Bool)
            } else {
                None
            }
        }
        naga::TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => {
            match size {
                naga::VectorSize::Bi => Some(ParamKind::Vec2),
                naga::VectorSize::Quad => Some(ParamKind::Vec4),
                naga::VectorSize::Tri => None,
            }
        }
        naga::TypeInner::Array {
            base,
            size: naga::ArraySize::Constant(len),
            ..
        } => match module.types[base].inner {
            naga::TypeInner::Vector {
                size: naga::VectorSize::Quad,
                scalar,
            } if scalar == naga::Scalar::F32 => {
                let len = usize::try_from(len.get()).ok()?;
                Some(ParamKind::FloatArray(len * 4))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Parse and validate WGSL, then reflect it.
pub(crate) fn parse_program(
    source: &ProgramSource,
) -> Result<(naga::Module, Reflection), BlurError> {
    let compile_error = |message: String| BlurError::ShaderCompile {
        name: source.name.clone(),
        message,
    };
    let module = naga::front::wgsl::parse_str(&source.text)
        .map_err(|e| compile_error(e.emit_to_string(&source.text)))?;
    let _ = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| compile_error(e.emit_to_string(&source.text)))?;
    let reflection = reflect(&module).map_err(compile_error)?;
    Ok((module, reflection))
}

fn put(buffer: &mut [u8], offset: u32, bytes: &[u8]) {
    let start = offset as usize;
    let end = (start + bytes.len()).min(buffer.len());
    if let Some(dst) = buffer.get_mut(start..end) {
        dst.copy_from_slice(&bytes[..end - start]);
    }
}

fn write_uniform(buffer: &mut [u8], offset: u32, value: &ParamValue) {
    match value {
        ParamValue::Float(v) => put(buffer, offset, bytemuck::bytes_of(v)),
        ParamValue::Int(v) => put(buffer, offset, bytemuck::bytes_of(v)),
        ParamValue::Bool(v) => {
            put(buffer, offset, bytemuck::bytes_of(&u32::from(*v)));
        }
        ParamValue::Vec2(v) => {
            put(buffer, offset, bytemuck::cast_slice(&v.to_array()));
        }
        ParamValue::Vec4(v) => {
            put(buffer, offset, bytemuck::cast_slice(&v.to_array()));
        }
        ParamValue::FloatArray(v) => {
            put(buffer, offset, bytemuck::cast_slice(v.as_slice()));
        }
        ParamValue::Texture(_) => {}
    }
}

fn encode_texels(format: TextureFormat, texels: &[[f32; 4]]) -> Vec<u8> {
    match format {
        TextureFormat::Rgba8Unorm => texels
            .iter()
            .flatten()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect(),
        TextureFormat::Rgba16Float => texels
            .iter()
            .flatten()
            .flat_map(|c| half::f16::from_f32(*c).to_le_bytes())
            .collect(),
    }
}

fn decode_row(format: TextureFormat, row: &[u8], out: &mut Vec<[f32; 4]>) {
    match format {
        TextureFormat::Rgba8Unorm => {
            for px in row.chunks_exact(4) {
                out.push([
                    f32::from(px[0]) / 255.0,
                    f32::from(px[1]) / 255.0,
                    f32::from(px[2]) / 255.0,
                    f32::from(px[3]) / 255.0,
                ]);
            }
        }
        TextureFormat::Rgba16Float => {
            for px in row.chunks_exact(8) {
                let c = |i: usize| {
                    half::f16::from_le_bytes([px[i], px[i + 1]]).to_f32()
                };
                out.push([c(0), c(2), c(4), c(6)]);
            }
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: TextureFormat,
}

struct GpuProgram {
    name: String,
    shader: wgpu::ShaderModule,
    bind_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    reflection: Reflection,
    uniform_buffer: wgpu::Buffer,
    uniform_len: usize,
}

/// wgpu device-backed [`GraphicsBackend`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    dummy: GpuTexture,
    textures: FxHashMap<TextureId, GpuTexture>,
    programs: FxHashMap<ProgramId, GpuProgram>,
    next_texture: u32,
    next_program: u32,
    depth: u32,
}

impl WgpuBackend {
    /// Acquire a headless device on the default adapter, blocking.
    ///
    /// # Errors
    ///
    /// Returns [`WgpuInitError`] if no adapter or device is available.
    pub fn new() -> Result<Self, WgpuInitError> {
        pollster::block_on(Self::request())
    }

    /// Acquire a headless device on the default adapter.
    ///
    /// # Errors
    ///
    /// Returns [`WgpuInitError`] if no adapter or device is available.
    pub async fn request() -> Result<Self, WgpuInitError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(WgpuInitError::AdapterRequest)?;
        let info = adapter.get_info();
        log::info!("blur device: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Blur Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(WgpuInitError::DeviceRequest)?;
        Ok(Self::from_device(device, queue))
    }

    /// Wrap a device and queue owned by the host.
    #[must_use]
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sampler = linear_sampler(&device);
        let dummy = allocate(&device, 1, 1, TextureFormat::Rgba8Unorm, "Blur Dummy");
        queue.write_texture(
            dummy.texture.as_image_copy(),
            &[0u8; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        Self {
            device,
            queue,
            sampler,
            dummy,
            textures: FxHashMap::default(),
            programs: FxHashMap::default(),
            next_texture: 1,
            next_program: 1,
            depth: 0,
        }
    }

    /// The underlying device.
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The wgpu texture behind a handle, for hosts that sample the result
    /// directly.
    #[must_use]
    pub fn texture(&self, texture: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&texture).map(|t| &t.texture)
    }

    /// Copy a texture back to host memory as row-major RGBA floats.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::UnknownTexture`] for a stale handle and
    /// [`BlurError::Readback`] if the staging buffer cannot be mapped.
    pub fn read_texture(
        &self,
        texture: TextureId,
    ) -> Result<Vec<[f32; 4]>, BlurError> {
        let source = self
            .textures
            .get(&texture)
            .ok_or(BlurError::UnknownTexture(texture))?;
        let unpadded = source.width * bytes_per_texel(source.format);
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blur Readback"),
            size: u64::from(padded) * u64::from(source.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Blur Readback Encoder"),
                });
        encoder.copy_texture_to_buffer(
            source.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(source.height),
                },
            },
            wgpu::Extent3d {
                width: source.width,
                height: source.height,
                depth_or_array_layers: 1,
            },
        );
        let _ = self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BlurError::Readback(e.to_string())),
            Err(e) => return Err(BlurError::Readback(e.to_string())),
        }

        let mut texels =
            Vec::with_capacity(source.width as usize * source.height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks_exact(padded as usize) {
                decode_row(source.format, &row[..unpadded as usize], &mut texels);
            }
        }
        staging.unmap();
        Ok(texels)
    }

    fn insert_texture(&mut self, texture: GpuTexture) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        let _ = self.textures.insert(id, texture);
        id
    }
}

fn allocate(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: TextureFormat,
    label: &str,
) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu_format(format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        width,
        height,
        format,
    }
}

impl GraphicsBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn caps(&self) -> BackendCaps {
        BackendCaps {
            kernel_encoding: KernelEncoding::Texture,
        }
    }

    fn enter_graphics(&mut self) -> Result<(), BlurError> {
        self.depth += 1;
        Ok(())
    }

    fn leave_graphics(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureId, BlurError> {
        let (width, height) = (width.max(1), height.max(1));
        let texture =
            allocate(&self.device, width, height, format, "Blur Render Target");
        Ok(self.insert_texture(texture))
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
        texels: &[[f32; 4]],
    ) -> Result<TextureId, BlurError> {
        if width == 0
            || height == 0
            || texels.len() != width as usize * height as usize
        {
            return Err(BlurError::InvalidDraw(format!(
                "{} texels supplied for a {width}x{height} texture",
                texels.len()
            )));
        }
        let texture = allocate(&self.device, width, height, format, "Blur Texture");
        self.queue.write_texture(
            texture.texture.as_image_copy(),
            &encode_texels(format, texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_texel(format)),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(self.insert_texture(texture))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(gpu) = self.textures.remove(&texture) {
            gpu.texture.destroy();
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    fn compile_program(
        &mut self,
        source: &ProgramSource,
    ) -> Result<ProgramId, BlurError> {
        let (module, reflection) = parse_program(source)?;
        let label = source.name.as_str();
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
            });
        let bind_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{label} Bind Group Layout")),
                    entries: &reflection.layout_entries(),
                });
        let pipeline_layout =
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&format!("{label} Pipeline Layout")),
                    bind_group_layouts: &[&bind_layout],
                    push_constant_ranges: &[],
                });
        let uniform_len = reflection.uniform_len();
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Params")),
            size: u64::from(uniform_len),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        log::debug!(
            "compiled program `{label}`: {} params, {uniform_len}-byte uniform",
            reflection.params.len()
        );

        let id = ProgramId(self.next_program);
        self.next_program += 1;
        let _ = self.programs.insert(
            id,
            GpuProgram {
                name: source.name.clone(),
                shader,
                bind_layout,
                pipeline_layout,
                pipelines: FxHashMap::default(),
                reflection,
                uniform_buffer,
                uniform_len: uniform_len as usize,
            },
        );
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(gpu) = self.programs.remove(&program) {
            gpu.uniform_buffer.destroy();
        }
    }

    fn program_params(&self, program: ProgramId) -> Option<&[ParamInfo]> {
        self.programs
            .get(&program)
            .map(|p| p.reflection.params.as_slice())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), BlurError> {
        let program = self
            .programs
            .get_mut(&call.program)
            .ok_or(BlurError::UnknownProgram(call.program))?;
        let reflection = &program.reflection;
        if call.values.len() != reflection.params.len() {
            return Err(BlurError::InvalidDraw(format!(
                "{} values for {} parameters",
                call.values.len(),
                reflection.params.len()
            )));
        }
        let target = self
            .textures
            .get(&call.target)
            .ok_or(BlurError::UnknownTexture(call.target))?;

        let mut uniform = vec![0u8; program.uniform_len];
        let mut views = Vec::new();
        for (location, value) in reflection.locations.iter().zip(call.values) {
            match (*location, value) {
                (Location::Texture { binding }, Some(ParamValue::Texture(id))) => {
                    if *id == call.target {
                        return Err(BlurError::InvalidDraw(format!(
                            "target {id:?} is also bound as a source"
                        )));
                    }
                    let source = self
                        .textures
                        .get(id)
                        .ok_or(BlurError::UnknownTexture(*id))?;
                    views.push((binding, &source.view));
                }
                (Location::Texture { binding }, _) => {
                    views.push((binding, &self.dummy.view));
                }
                (Location::Uniform { offset }, Some(value)) => {
                    write_uniform(&mut uniform, offset, value);
                }
                (Location::Uniform { .. }, None) => {}
            }
        }

        let mut entries = Vec::with_capacity(views.len() + 2);
        if let Some((binding, _)) = reflection.uniform {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: program.uniform_buffer.as_entire_binding(),
            });
        }
        if let Some(binding) = reflection.sampler {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        for (binding, view) in views {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", program.name)),
            layout: &program.bind_layout,
            entries: &entries,
        });

        let format = wgpu_format(target.format);
        let pipeline = program.pipelines.entry(format).or_insert_with(|| {
            create_program_pipeline(
                &self.device,
                &program.name,
                &program.shader,
                &program.pipeline_layout,
                format,
            )
        });

        self.queue.write_buffer(&program.uniform_buffer, 0, &uniform);
        let mut encoder =
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Blur Draw Encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&program.name),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        let _ = self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
