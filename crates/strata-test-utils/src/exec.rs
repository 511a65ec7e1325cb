//! Resource storage and in-order command execution for [`SoftDevice`].
//!
//! [`SoftDevice`]: crate::SoftDevice

use std::collections::HashMap;
use std::sync::Arc;

use strata_core::{
    AddressMode, Binding, Bindings, BufferDesc, BufferId, BufferView, Command, CommandList,
    ComputeKernel, DeviceError, DispatchArgs, DispatchThread, DrawIndexedIndirectArgs, Format,
    KernelError, ProgramId, TextureDesc, TextureId, TextureView, ThreadContext,
};

use crate::device::{lock, DrawRecord, Inner};

pub(crate) struct SoftBuffer {
    pub(crate) desc: BufferDesc,
    bytes: Vec<u8>,
}

pub(crate) struct SoftTexture {
    desc: TextureDesc,
    /// Indexed by `slice * mip_levels + mip`.
    subresources: Vec<Vec<u8>>,
}

#[derive(Default)]
pub(crate) struct Storage {
    pub(crate) buffers: HashMap<BufferId, SoftBuffer>,
    pub(crate) textures: HashMap<TextureId, SoftTexture>,
}

impl Storage {
    pub(crate) fn allocated_bytes(&self) -> u64 {
        self.buffers.values().map(|b| b.bytes.len() as u64).sum()
    }

    pub(crate) fn insert_buffer(&mut self, id: BufferId, desc: BufferDesc) {
        let bytes = vec![0u8; desc.byte_size() as usize];
        self.buffers.insert(id, SoftBuffer { desc, bytes });
    }

    pub(crate) fn insert_texture(&mut self, id: TextureId, desc: TextureDesc) {
        let texel = desc.format.byte_size() as usize;
        let mut subresources = Vec::new();
        for _slice in 0..desc.array_slices {
            for mip in 0..desc.mip_levels {
                let (w, h) = desc.mip_extent(mip);
                subresources.push(vec![0u8; w as usize * h as usize * texel]);
            }
        }
        self.textures.insert(id, SoftTexture { desc, subresources });
    }

    /// Byte range of `len` bytes at `byte_offset` within `view`.
    fn span(&self, view: &BufferView, byte_offset: u64, len: u64) -> Result<(usize, usize), DeviceError> {
        if !view.is_alive() {
            return Err(DeviceError::ResourceReleased);
        }
        let buffer = self
            .buffers
            .get(&view.buffer())
            .ok_or(DeviceError::UnknownBuffer { id: view.buffer() })?;
        let end = byte_offset.checked_add(len);
        match end {
            Some(end) if end <= view.byte_len() => {}
            _ => {
                return Err(DeviceError::OutOfBounds {
                    offset: byte_offset,
                    len,
                    size: view.byte_len(),
                })
            }
        }
        let start = view.byte_offset() + byte_offset;
        if start + len > buffer.bytes.len() as u64 {
            return Err(DeviceError::OutOfBounds {
                offset: start,
                len,
                size: buffer.bytes.len() as u64,
            });
        }
        Ok((start as usize, (start + len) as usize))
    }

    pub(crate) fn write(&mut self, view: &BufferView, byte_offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let (start, end) = self.span(view, byte_offset, data.len() as u64)?;
        if let Some(buffer) = self.buffers.get_mut(&view.buffer()) {
            buffer.bytes[start..end].copy_from_slice(data);
        }
        Ok(())
    }

    pub(crate) fn read(&self, view: &BufferView, byte_offset: u64, len: u64) -> Result<Vec<u8>, DeviceError> {
        let (start, end) = self.span(view, byte_offset, len)?;
        Ok(self.buffers[&view.buffer()].bytes[start..end].to_vec())
    }

    fn texture(&self, view: &TextureView) -> Result<&SoftTexture, DeviceError> {
        if !view.is_alive() {
            return Err(DeviceError::ResourceReleased);
        }
        self.textures
            .get(&view.texture())
            .ok_or(DeviceError::UnknownTexture { id: view.texture() })
    }

    pub(crate) fn read_texture(&self, view: &TextureView, mip: u32, slice: u32) -> Result<Vec<u8>, DeviceError> {
        let texture = self.texture(view)?;
        let index = subresource_index(&texture.desc, mip, slice)?;
        Ok(texture.subresources[index].clone())
    }
}

fn subresource_index(desc: &TextureDesc, mip: u32, slice: u32) -> Result<usize, DeviceError> {
    if mip >= desc.mip_levels || slice >= desc.array_slices {
        return Err(DeviceError::InvalidDescription {
            reason: format!(
                "subresource mip {mip} slice {slice} outside '{}' ({} mips, {} slices)",
                desc.name, desc.mip_levels, desc.array_slices
            ),
        });
    }
    Ok((slice * desc.mip_levels + mip) as usize)
}

// ── Command execution ───────────────────────────────────────────

pub(crate) fn execute(inner: &Inner, list: CommandList) -> Result<(), DeviceError> {
    let mut storage = lock(&inner.storage);
    lock(&inner.stats).submissions += 1;
    for command in list.into_commands() {
        match command {
            Command::Dispatch { pipeline, groups } => {
                let kernel = resolve(inner, pipeline.program())?;
                run_dispatch(&mut storage, &*kernel, pipeline.program(), pipeline.bindings(), groups)?;
                lock(&inner.stats).dispatches += 1;
            }
            Command::DispatchIndirect {
                pipeline,
                args,
                byte_offset,
            } => {
                let bytes = storage.read(&args, byte_offset, std::mem::size_of::<DispatchArgs>() as u64)?;
                let args: DispatchArgs = bytemuck::pod_read_unaligned(&bytes);
                let kernel = resolve(inner, pipeline.program())?;
                run_dispatch(
                    &mut storage,
                    &*kernel,
                    pipeline.program(),
                    pipeline.bindings(),
                    [args.x, args.y, args.z],
                )?;
                lock(&inner.stats).indirect_dispatches += 1;
            }
            Command::CopyBuffer {
                src,
                src_offset,
                dst,
                dst_offset,
                bytes,
            } => {
                let data = storage.read(&src, src_offset, bytes)?;
                storage.write(&dst, dst_offset, &data)?;
                let mut stats = lock(&inner.stats);
                stats.copies += 1;
                stats.copied_bytes += bytes;
            }
            Command::CopyBufferToTexture {
                src,
                src_offset,
                row_pitch,
                dst,
                mip,
                slice,
                x,
                y,
                width,
                height,
            } => {
                copy_to_texture(&mut storage, &src, src_offset, row_pitch, &dst, mip, slice, (x, y), (width, height))?;
                let mut stats = lock(&inner.stats);
                stats.copies += 1;
                stats.copied_bytes += u64::from(width) * u64::from(height) * u64::from(dst.format().byte_size());
            }
            Command::ClearBuffer { dst, value } => {
                let pattern = value.to_ne_bytes();
                let fill: Vec<u8> = pattern.iter().copied().cycle().take(dst.byte_len() as usize).collect();
                storage.write(&dst, 0, &fill)?;
                lock(&inner.stats).clears += 1;
            }
            Command::ClearTexture { dst, value } => {
                storage.texture(&dst)?;
                let pattern = value.to_ne_bytes();
                if let Some(texture) = storage.textures.get_mut(&dst.texture()) {
                    for sub in &mut texture.subresources {
                        for (i, byte) in sub.iter_mut().enumerate() {
                            *byte = pattern[i % 4];
                        }
                    }
                }
                lock(&inner.stats).clears += 1;
            }
            Command::DrawIndexedIndirect {
                pipeline,
                index_buffer,
                args,
                args_offset,
                count,
                count_offset,
                max_draws,
            } => {
                let record = run_draws(&storage, pipeline.program(), &index_buffer, &args, args_offset, &count, count_offset, max_draws)?;
                lock(&inner.stats).draws.push(record);
            }
        }
    }
    Ok(())
}

fn resolve(inner: &Inner, program: ProgramId) -> Result<Arc<dyn ComputeKernel>, DeviceError> {
    let kernels = match inner.kernels.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    kernels
        .get(&program)
        .cloned()
        .ok_or(DeviceError::UnknownProgram { program })
}

fn check_bindings(storage: &Storage, bindings: &Bindings) -> Result<(), DeviceError> {
    if !bindings.resources_alive() {
        return Err(DeviceError::ResourceReleased);
    }
    for (_, binding) in bindings.iter() {
        match binding {
            Binding::Buffer(view) if !storage.buffers.contains_key(&view.buffer()) => {
                return Err(DeviceError::UnknownBuffer { id: view.buffer() });
            }
            Binding::Texture(view) if !storage.textures.contains_key(&view.texture()) => {
                return Err(DeviceError::UnknownTexture { id: view.texture() });
            }
            _ => {}
        }
    }
    Ok(())
}

fn run_dispatch(
    storage: &mut Storage,
    kernel: &dyn ComputeKernel,
    program: ProgramId,
    bindings: &Bindings,
    groups: [u32; 3],
) -> Result<(), DeviceError> {
    check_bindings(storage, bindings)?;
    let size = kernel.workgroup_size().max(1);
    let mut ctx = SoftContext { storage, bindings };
    for gz in 0..groups[2] {
        for gy in 0..groups[1] {
            for gx in 0..groups[0] {
                for local in 0..size {
                    let thread = DispatchThread {
                        global: gx * size + local,
                        group: [gx, gy, gz],
                        local,
                    };
                    kernel
                        .invoke(&mut ctx, thread)
                        .map_err(|error| DeviceError::Kernel { program, error })?;
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn copy_to_texture(
    storage: &mut Storage,
    src: &BufferView,
    src_offset: u64,
    row_pitch: u32,
    dst: &TextureView,
    mip: u32,
    slice: u32,
    origin: (u32, u32),
    extent: (u32, u32),
) -> Result<(), DeviceError> {
    let texture = storage.texture(dst)?;
    let index = subresource_index(&texture.desc, mip, slice)?;
    let (mip_w, mip_h) = texture.desc.mip_extent(mip);
    let texel = texture.desc.format.byte_size() as u64;
    if origin.0 + extent.0 > mip_w || origin.1 + extent.1 > mip_h {
        return Err(DeviceError::OutOfBounds {
            offset: u64::from(origin.1) * u64::from(mip_w) + u64::from(origin.0),
            len: u64::from(extent.0) * u64::from(extent.1),
            size: u64::from(mip_w) * u64::from(mip_h),
        });
    }
    let row_bytes = u64::from(extent.0) * texel;
    let mut rows = Vec::with_capacity(extent.1 as usize);
    for row in 0..u64::from(extent.1) {
        rows.push(storage.read(src, src_offset + row * u64::from(row_pitch), row_bytes)?);
    }
    if let Some(texture) = storage.textures.get_mut(&dst.texture()) {
        let sub = &mut texture.subresources[index];
        for (row, data) in rows.iter().enumerate() {
            let y = u64::from(origin.1) + row as u64;
            let start = ((y * u64::from(mip_w) + u64::from(origin.0)) * texel) as usize;
            sub[start..start + data.len()].copy_from_slice(data);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_draws(
    storage: &Storage,
    program: ProgramId,
    index_buffer: &BufferView,
    args: &BufferView,
    args_offset: u64,
    count: &BufferView,
    count_offset: u64,
    max_draws: u32,
) -> Result<DrawRecord, DeviceError> {
    let count_bytes = storage.read(count, count_offset, 4)?;
    let gpu_count: u32 = bytemuck::pod_read_unaligned(&count_bytes);
    let draws = gpu_count.min(max_draws);
    let stride = std::mem::size_of::<DrawIndexedIndirectArgs>() as u64;
    let mut record = DrawRecord {
        program,
        draws,
        indexes: 0,
        args: Vec::with_capacity(draws as usize),
    };
    for i in 0..u64::from(draws) {
        let bytes = storage.read(args, args_offset + i * stride, stride)?;
        let draw: DrawIndexedIndirectArgs = bytemuck::pod_read_unaligned(&bytes);
        let end = u64::from(draw.first_index) + u64::from(draw.index_count);
        if end > index_buffer.element_count() {
            return Err(DeviceError::OutOfBounds {
                offset: u64::from(draw.first_index),
                len: u64::from(draw.index_count),
                size: index_buffer.element_count(),
            });
        }
        record.indexes += u64::from(draw.index_count) * u64::from(draw.instance_count);
        record.args.push(draw);
    }
    Ok(record)
}

// ── Kernel context ──────────────────────────────────────────────

struct SoftContext<'a> {
    storage: &'a mut Storage,
    bindings: &'a Bindings,
}

impl SoftContext<'_> {
    fn buffer_binding(&self, name: &str) -> Result<&BufferView, KernelError> {
        match self.bindings.get(name) {
            Some(Binding::Buffer(view)) => Ok(view),
            Some(_) => Err(KernelError::BindingKind {
                name: name.to_string(),
                expected: "buffer",
            }),
            None => Err(KernelError::MissingBinding {
                name: name.to_string(),
            }),
        }
    }

    fn texture_binding(&self, name: &str) -> Result<&TextureView, KernelError> {
        match self.bindings.get(name) {
            Some(Binding::Texture(view)) => Ok(view),
            Some(_) => Err(KernelError::BindingKind {
                name: name.to_string(),
                expected: "texture",
            }),
            None => Err(KernelError::MissingBinding {
                name: name.to_string(),
            }),
        }
    }

    /// Byte range of `len` bytes of element `index` in `binding`.
    fn element_span(&self, binding: &str, index: u64, len: usize) -> Result<(BufferId, usize, usize), KernelError> {
        let view = self.buffer_binding(binding)?;
        if index >= view.element_count() {
            return Err(KernelError::OutOfBounds {
                binding: binding.to_string(),
                index,
                len: view.element_count(),
            });
        }
        if len > view.stride() as usize {
            return Err(KernelError::StrideMismatch {
                binding: binding.to_string(),
                requested: len,
                stride: view.stride(),
            });
        }
        let start = ((view.first_element() + index) * u64::from(view.stride())) as usize;
        Ok((view.buffer(), start, start + len))
    }
}

impl ThreadContext for SoftContext<'_> {
    fn read_element(&self, binding: &str, index: u64, out: &mut [u8]) -> Result<(), KernelError> {
        let (id, start, end) = self.element_span(binding, index, out.len())?;
        let buffer = self.storage.buffers.get(&id).ok_or_else(|| KernelError::MissingBinding {
            name: binding.to_string(),
        })?;
        out.copy_from_slice(&buffer.bytes[start..end]);
        Ok(())
    }

    fn write_element(&mut self, binding: &str, index: u64, data: &[u8]) -> Result<(), KernelError> {
        let (id, start, end) = self.element_span(binding, index, data.len())?;
        let buffer = self.storage.buffers.get_mut(&id).ok_or_else(|| KernelError::MissingBinding {
            name: binding.to_string(),
        })?;
        buffer.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn atomic_add(&mut self, binding: &str, index: u64, value: u32) -> Result<u32, KernelError> {
        let mut bytes = [0u8; 4];
        self.read_element(binding, index, &mut bytes)?;
        let previous = u32::from_ne_bytes(bytes);
        self.write_element(binding, index, &previous.wrapping_add(value).to_ne_bytes())?;
        Ok(previous)
    }

    fn element_count(&self, binding: &str) -> Result<u64, KernelError> {
        Ok(self.buffer_binding(binding)?.element_count())
    }

    fn constant_bytes(&self, binding: &str) -> Result<&[u8], KernelError> {
        match self.bindings.get(binding) {
            Some(Binding::Constants(bytes)) => Ok(bytes),
            Some(_) => Err(KernelError::BindingKind {
                name: binding.to_string(),
                expected: "constant block",
            }),
            None => Err(KernelError::MissingBinding {
                name: binding.to_string(),
            }),
        }
    }

    fn sample(&self, texture: &str, sampler: &str, mip: u32, x: i64, y: i64) -> Result<f32, KernelError> {
        let view = self.texture_binding(texture)?;
        let address = match self.bindings.get(sampler) {
            Some(Binding::Sampler(desc)) => desc.address,
            Some(_) => {
                return Err(KernelError::BindingKind {
                    name: sampler.to_string(),
                    expected: "sampler",
                })
            }
            None => {
                return Err(KernelError::MissingBinding {
                    name: sampler.to_string(),
                })
            }
        };
        let soft = self.storage.textures.get(&view.texture()).ok_or_else(|| KernelError::MissingBinding {
            name: texture.to_string(),
        })?;
        let mip = mip.min(soft.desc.mip_levels.saturating_sub(1));
        let (w, h) = soft.desc.mip_extent(mip);
        let (x, y) = match address {
            AddressMode::Clamp => (x.clamp(0, i64::from(w) - 1), y.clamp(0, i64::from(h) - 1)),
            AddressMode::Wrap => (x.rem_euclid(i64::from(w)), y.rem_euclid(i64::from(h))),
        };
        let texel = soft.desc.format.byte_size() as usize;
        let start = (y as usize * w as usize + x as usize) * texel;
        let bytes = &soft.subresources[mip as usize][start..start + texel];
        Ok(decode_texel(soft.desc.format, bytes))
    }

    fn texture_extent(&self, texture: &str, mip: u32) -> Result<(u32, u32), KernelError> {
        Ok(self.texture_binding(texture)?.mip_extent(mip))
    }
}

fn decode_texel(format: Format, bytes: &[u8]) -> f32 {
    match format {
        Format::R8Unorm | Format::R8G8B8A8Unorm => f32::from(bytes[0]) / 255.0,
        Format::R16Uint => f32::from(u16::from_ne_bytes([bytes[0], bytes[1]])),
        Format::R32Uint | Format::R32G32B32A32Uint => {
            u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
        }
        Format::R32Sint => i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        _ => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}
