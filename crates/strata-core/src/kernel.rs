//! Execution contract for programs run by a software device.
//!
//! A [`ComputeKernel`] is invoked once per thread of a dispatch. It reaches
//! its resources only through a [`ThreadContext`], addressed by binding
//! name and element index, which mirrors how a shader sees typed buffers,
//! atomic counters, constant blocks and sampled textures.

use bytemuck::Pod;

use crate::error::KernelError;

/// Identifies one invocation within a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchThread {
    /// Linear thread index along x across all groups.
    pub global: u32,
    /// Workgroup coordinates.
    pub group: [u32; 3],
    /// Index within the workgroup.
    pub local: u32,
}

/// A program's view of its bound resources during one invocation.
///
/// The raw methods move bytes; the typed helpers on
/// `dyn ThreadContext` (`load`, `store`, `constants`) wrap them for
/// [`Pod`] records.
pub trait ThreadContext {
    /// Copy element `index` of buffer binding `binding` into `out`.
    fn read_element(&self, binding: &str, index: u64, out: &mut [u8]) -> Result<(), KernelError>;

    /// Overwrite element `index` of buffer binding `binding`.
    fn write_element(&mut self, binding: &str, index: u64, data: &[u8]) -> Result<(), KernelError>;

    /// Atomically add to a `u32` element and return the previous value.
    fn atomic_add(&mut self, binding: &str, index: u64, value: u32) -> Result<u32, KernelError>;

    /// Number of elements in a buffer binding.
    fn element_count(&self, binding: &str) -> Result<u64, KernelError>;

    /// Bytes of a constant block.
    fn constant_bytes(&self, binding: &str) -> Result<&[u8], KernelError>;

    /// Sample texel `(x, y)` of `mip`, slice 0, addressed through the
    /// sampler bound at `sampler`. Returns the texel as `f32`.
    fn sample(
        &self,
        texture: &str,
        sampler: &str,
        mip: u32,
        x: i64,
        y: i64,
    ) -> Result<f32, KernelError>;

    /// Extent of `mip` of a texture binding.
    fn texture_extent(&self, texture: &str, mip: u32) -> Result<(u32, u32), KernelError>;
}

impl dyn ThreadContext + '_ {
    /// Load element `index` of `binding` as a `T`.
    pub fn load<T: Pod>(&self, binding: &str, index: u64) -> Result<T, KernelError> {
        let mut value = T::zeroed();
        self.read_element(binding, index, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Store `value` at element `index` of `binding`.
    pub fn store<T: Pod>(&mut self, binding: &str, index: u64, value: &T) -> Result<(), KernelError> {
        self.write_element(binding, index, bytemuck::bytes_of(value))
    }

    /// Read the constant block `binding` as a `T`.
    pub fn constants<T: Pod>(&self, binding: &str) -> Result<T, KernelError> {
        let bytes = self.constant_bytes(binding)?;
        let size = std::mem::size_of::<T>();
        if bytes.len() < size {
            return Err(KernelError::StrideMismatch {
                binding: binding.to_string(),
                requested: size,
                stride: bytes.len() as u32,
            });
        }
        Ok(bytemuck::pod_read_unaligned(&bytes[..size]))
    }
}

/// A program executable one thread at a time.
pub trait ComputeKernel: Send + Sync {
    /// Threads per workgroup along x.
    fn workgroup_size(&self) -> u32;

    /// Run one thread.
    fn invoke(&self, ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError>;
}

/// Signature of a kernel body.
pub type KernelBody = fn(&mut dyn ThreadContext, DispatchThread) -> Result<(), KernelError>;

/// A [`ComputeKernel`] backed by a plain function.
#[derive(Clone, Copy, Debug)]
pub struct FnKernel {
    workgroup_size: u32,
    body: KernelBody,
}

impl FnKernel {
    /// A kernel running `body` in workgroups of `workgroup_size` threads.
    pub const fn new(workgroup_size: u32, body: KernelBody) -> Self {
        Self {
            workgroup_size,
            body,
        }
    }
}

impl ComputeKernel for FnKernel {
    fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    fn invoke(&self, ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
        (self.body)(ctx, thread)
    }
}
