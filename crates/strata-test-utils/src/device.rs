//! The software device and its fence timeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use strata_core::{
    BufferDesc, BufferId, BufferView, CommandList, ComputeKernel, Device, DeviceError,
    DrawIndexedIndirectArgs, FenceValue, ProgramId, TextureDesc, TextureId, TextureView,
};

use crate::exec::{self, Storage};

/// One executed indirect draw command.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    /// Draws issued: the GPU count clamped to `max_draws`.
    pub draws: u32,
    /// Sum of `index_count * instance_count` over the issued draws.
    pub indexes: u64,
    pub args: Vec<DrawIndexedIndirectArgs>,
}

/// Counters of executed work.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SoftStats {
    pub submissions: u64,
    pub dispatches: u64,
    pub indirect_dispatches: u64,
    pub copies: u64,
    pub copied_bytes: u64,
    pub clears: u64,
    pub draws: Vec<DrawRecord>,
}

struct Timeline {
    submitted: u64,
    completed: u64,
    lost: Option<String>,
}

pub(crate) struct Inner {
    pub(crate) storage: Mutex<Storage>,
    pub(crate) kernels: RwLock<HashMap<ProgramId, Arc<dyn ComputeKernel>>>,
    pub(crate) stats: Mutex<SoftStats>,
    timeline: Mutex<Timeline>,
    timeline_cv: Condvar,
    paused: Mutex<bool>,
    paused_cv: Condvar,
    next_id: AtomicU64,
    memory_budget: Option<u64>,
}

/// A CPU implementation of [`Device`].
///
/// Use through `Arc<dyn Device>`; the concrete `Arc<SoftDevice>` keeps the
/// test hooks reachable.
pub struct SoftDevice {
    inner: Arc<Inner>,
    queue: Mutex<Option<Sender<(CommandList, u64)>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SoftDevice {
    /// A device with unlimited memory.
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// A device that refuses allocations beyond `bytes` in total.
    pub fn with_memory_budget(bytes: u64) -> Arc<Self> {
        Self::build(Some(bytes))
    }

    fn build(memory_budget: Option<u64>) -> Arc<Self> {
        let inner = Arc::new(Inner {
            storage: Mutex::new(Storage::default()),
            kernels: RwLock::new(HashMap::new()),
            stats: Mutex::new(SoftStats::default()),
            timeline: Mutex::new(Timeline {
                submitted: 0,
                completed: 0,
                lost: None,
            }),
            timeline_cv: Condvar::new(),
            paused: Mutex::new(false),
            paused_cv: Condvar::new(),
            next_id: AtomicU64::new(1),
            memory_budget,
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let gpu = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name("soft-gpu".into())
            .spawn(move || gpu_loop(&gpu, &rx))
            .expect("failed to spawn soft-gpu thread");
        Arc::new(Self {
            inner,
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// This device as the trait object the core consumes.
    pub fn as_device(self: &Arc<Self>) -> Arc<dyn Device> {
        Arc::clone(self) as Arc<dyn Device>
    }

    /// Register the kernel that executes `program`.
    pub fn register_kernel(&self, program: ProgramId, kernel: Arc<dyn ComputeKernel>) {
        write_lock(&self.inner.kernels).insert(program, kernel);
    }

    /// Hold back execution of submitted work until [`resume`](Self::resume).
    pub fn pause(&self) {
        *lock(&self.inner.paused) = true;
    }

    /// Let execution continue.
    pub fn resume(&self) {
        *lock(&self.inner.paused) = false;
        self.inner.paused_cv.notify_all();
    }

    /// Mark the device lost; pending and future waits fail.
    pub fn lose(&self, reason: &str) {
        let mut timeline = lock(&self.inner.timeline);
        timeline.lost = Some(reason.to_string());
        self.inner.timeline_cv.notify_all();
    }

    /// Block until every submitted list has executed.
    pub fn wait_idle(&self) -> Result<(), DeviceError> {
        let submitted = FenceValue(lock(&self.inner.timeline).submitted);
        self.wait_fence(submitted, strata_core::DEFAULT_FENCE_TIMEOUT)
    }

    /// Overwrite buffer bytes directly, bypassing the mappable check.
    ///
    /// Waits for the device to go idle first so the write is ordered
    /// after everything already submitted.
    pub fn poke(&self, view: &BufferView, byte_offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        self.wait_idle()?;
        let mut storage = lock(&self.inner.storage);
        storage.write(view, byte_offset, data)
    }

    /// Snapshot of the execution counters.
    pub fn stats(&self) -> SoftStats {
        lock(&self.inner.stats).clone()
    }

    /// Number of live buffer resources.
    pub fn live_buffers(&self) -> usize {
        lock(&self.inner.storage).buffers.len()
    }

    /// Number of live texture resources.
    pub fn live_textures(&self) -> usize {
        lock(&self.inner.storage).textures.len()
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Device for SoftDevice {
    fn create_buffer_resource(&self, desc: &BufferDesc) -> Result<BufferId, DeviceError> {
        let bytes = desc.byte_size();
        let mut storage = lock(&self.inner.storage);
        if let Some(budget) = self.inner.memory_budget {
            if storage.allocated_bytes() + bytes > budget {
                return Err(DeviceError::OutOfMemory {
                    requested_bytes: bytes,
                });
            }
        }
        let id = BufferId(self.next_id());
        storage.insert_buffer(id, desc.clone());
        Ok(id)
    }

    fn release_buffer_resource(&self, id: BufferId) {
        lock(&self.inner.storage).buffers.remove(&id);
    }

    fn create_texture_resource(&self, desc: &TextureDesc) -> Result<TextureId, DeviceError> {
        let id = TextureId(self.next_id());
        lock(&self.inner.storage).insert_texture(id, desc.clone());
        Ok(id)
    }

    fn release_texture_resource(&self, id: TextureId) {
        lock(&self.inner.storage).textures.remove(&id);
    }

    fn submit(&self, list: CommandList) -> Result<FenceValue, DeviceError> {
        let mut timeline = lock(&self.inner.timeline);
        if let Some(reason) = &timeline.lost {
            return Err(DeviceError::Lost {
                reason: reason.clone(),
            });
        }
        timeline.submitted += 1;
        let fence = timeline.submitted;
        let queue = lock(&self.queue);
        let sender = queue.as_ref().ok_or_else(|| DeviceError::Lost {
            reason: "device shut down".into(),
        })?;
        sender.send((list, fence)).map_err(|_| DeviceError::Lost {
            reason: "soft-gpu thread exited".into(),
        })?;
        Ok(FenceValue(fence))
    }

    fn completed_fence(&self) -> FenceValue {
        FenceValue(lock(&self.inner.timeline).completed)
    }

    fn wait_fence(&self, value: FenceValue, timeout: Duration) -> Result<(), DeviceError> {
        let start = Instant::now();
        let mut timeline = lock(&self.inner.timeline);
        loop {
            if timeline.completed >= value.0 {
                return Ok(());
            }
            if let Some(reason) = &timeline.lost {
                return Err(DeviceError::Lost {
                    reason: reason.clone(),
                });
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(DeviceError::Timeout {
                    fence: value,
                    waited,
                });
            }
            timeline = match self.inner.timeline_cv.wait_timeout(timeline, timeout - waited) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn write_buffer(&self, view: &BufferView, byte_offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let mut storage = lock(&self.inner.storage);
        let buffer = storage
            .buffers
            .get(&view.buffer())
            .ok_or(DeviceError::UnknownBuffer { id: view.buffer() })?;
        if !buffer.desc.usage.contains(strata_core::BufferUsage::UPLOAD) {
            return Err(DeviceError::NotMappable { id: view.buffer() });
        }
        storage.write(view, byte_offset, data)
    }

    fn read_buffer(&self, view: &BufferView, byte_offset: u64, len: u64) -> Result<Vec<u8>, DeviceError> {
        self.wait_idle()?;
        lock(&self.inner.storage).read(view, byte_offset, len)
    }

    fn read_texture(&self, view: &TextureView, mip: u32, slice: u32) -> Result<Vec<u8>, DeviceError> {
        self.wait_idle()?;
        lock(&self.inner.storage).read_texture(view, mip, slice)
    }
}

impl Drop for SoftDevice {
    fn drop(&mut self) {
        self.resume();
        lock(&self.queue).take();
        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }
    }
}

fn gpu_loop(inner: &Inner, rx: &Receiver<(CommandList, u64)>) {
    while let Ok((list, fence)) = rx.recv() {
        {
            let mut paused = lock(&inner.paused);
            while *paused {
                paused = match inner.paused_cv.wait(paused) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        }
        if lock(&inner.timeline).lost.is_some() {
            continue;
        }
        let name = list.name().to_string();
        let result = exec::execute(inner, list);
        let mut timeline = lock(&inner.timeline);
        match result {
            Ok(()) => timeline.completed = fence,
            Err(err) => {
                log::error!("soft-gpu: command list '{name}' failed: {err}");
                timeline.lost = Some(format!("'{name}': {err}"));
            }
        }
        inner.timeline_cv.notify_all();
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
