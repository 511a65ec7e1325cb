//! User-facing [`ResidencyManager`] API and shutdown.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Sender;
use strata_core::{
    create_buffer, Buffer, BufferDesc, BufferLayout, BufferUsage, Device, Format,
};

use crate::config::ResidencyConfig;
use crate::error::ResidencyError;
use crate::future::ResidencyFuture;
use crate::metrics::{ResidencyMetrics, ResidencyStats};
use crate::task::{Completion, Destination, TextureRegion, TextureUpload, UploadSource, UploadTask};
use crate::worker::Worker;

/// Report from [`ResidencyManager::shutdown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Time spent draining and joining the worker, in milliseconds.
    pub total_ms: u64,
    /// Whether the worker thread was joined cleanly.
    pub worker_joined: bool,
    /// Counters at the moment the worker stopped.
    pub stats: ResidencyStats,
}

/// Streams bytes into GPU buffers and textures from any thread.
///
/// Uploads are queued to a single worker thread that stages them through
/// a CPU-visible ring buffer and records the copies. Each call returns a
/// [`ResidencyFuture`] that resolves once the copy's fence has signaled.
pub struct ResidencyManager {
    device: Arc<dyn Device>,
    config: ResidencyConfig,
    tasks: Option<Sender<UploadTask>>,
    worker: Option<JoinHandle<()>>,
    metrics: Arc<ResidencyMetrics>,
}

// Compile-time assertion: ResidencyManager must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ResidencyManager>();
    assert::<ResidencyFuture>();
};

impl ResidencyManager {
    /// Create the upload ring and start the worker.
    pub fn new(device: Arc<dyn Device>, config: ResidencyConfig) -> Result<Self, ResidencyError> {
        config.validate()?;

        let staging = create_buffer(
            &device,
            BufferDesc::new(
                "residency-ring",
                BufferLayout::Format(Format::R8Unorm),
                config.upload_buffer_bytes,
            )
            .usage(BufferUsage::UPLOAD | BufferUsage::COPY_SRC),
        )?;

        let (tx, rx) = crossbeam_channel::bounded(config.queue_capacity);
        let metrics = Arc::new(ResidencyMetrics::default());
        let worker = Worker::new(
            Arc::clone(&device),
            config.clone(),
            staging,
            Arc::clone(&metrics),
        );
        let handle = thread::Builder::new()
            .name("strata-residency".into())
            .spawn(move || worker.run(rx))
            .map_err(|err| ResidencyError::WorkerSpawn {
                reason: err.to_string(),
            })?;

        Ok(Self {
            device,
            config,
            tasks: Some(tx),
            worker: Some(handle),
            metrics,
        })
    }

    /// Upload a copy of `bytes` to `dst` at `dst_byte_offset`.
    ///
    /// The bytes are copied before the call returns, so the caller's
    /// slice may be transient.
    pub fn upload_temp(
        &self,
        dst: &Buffer,
        dst_byte_offset: u64,
        bytes: &[u8],
    ) -> Result<ResidencyFuture, ResidencyError> {
        check_buffer_bounds(dst, dst_byte_offset, bytes.len() as u64)?;
        self.enqueue(
            UploadSource::Copied(bytes.to_vec()),
            Destination::Buffer {
                view: dst.raw(),
                byte_offset: dst_byte_offset,
            },
        )
    }

    /// Upload shared `bytes` to `dst` without copying them first.
    pub fn upload_shared(
        &self,
        dst: &Buffer,
        dst_byte_offset: u64,
        bytes: Arc<[u8]>,
    ) -> Result<ResidencyFuture, ResidencyError> {
        check_buffer_bounds(dst, dst_byte_offset, bytes.len() as u64)?;
        self.enqueue(
            UploadSource::Shared(bytes),
            Destination::Buffer {
                view: dst.raw(),
                byte_offset: dst_byte_offset,
            },
        )
    }

    /// Upload a region of one texture subresource.
    pub fn upload_texture(&self, upload: TextureUpload<'_>) -> Result<ResidencyFuture, ResidencyError> {
        let desc = upload.texture.desc();
        if upload.mip >= desc.mip_levels || upload.slice >= desc.array_slices {
            return Err(ResidencyError::InvalidUpload {
                reason: format!(
                    "subresource (mip {}, slice {}) outside '{}' with {} mips and {} slices",
                    upload.mip, upload.slice, desc.name, desc.mip_levels, desc.array_slices
                ),
            });
        }
        let (width, height) = desc.mip_extent(upload.mip);
        let fits = |origin: u32, extent: u32, size: u32| {
            origin.checked_add(extent).is_some_and(|end| end <= size)
        };
        if !fits(upload.x, upload.src_width, width) || !fits(upload.y, upload.src_height, height) {
            return Err(ResidencyError::InvalidUpload {
                reason: format!(
                    "region {}x{} at ({}, {}) leaves mip {} of {width}x{height}",
                    upload.src_width, upload.src_height, upload.x, upload.y, upload.mip
                ),
            });
        }
        let needed = u64::from(upload.src_width)
            * u64::from(upload.src_height)
            * u64::from(desc.format.byte_size());
        if (upload.source.len() as u64) < needed {
            return Err(ResidencyError::InvalidUpload {
                reason: format!(
                    "region needs {needed} source bytes, got {}",
                    upload.source.len()
                ),
            });
        }

        let source = if upload.copy_on_upload {
            UploadSource::Copied(upload.source.to_vec())
        } else {
            UploadSource::Shared(upload.source)
        };
        self.enqueue(
            source,
            Destination::Texture(TextureRegion {
                view: upload.texture.srv(),
                x: upload.x,
                y: upload.y,
                width: upload.src_width,
                height: upload.src_height,
                mip: upload.mip,
                slice: upload.slice,
            }),
        )
    }

    /// Queue a task. Blocks while the queue is full.
    fn enqueue(
        &self,
        source: UploadSource,
        destination: Destination,
    ) -> Result<ResidencyFuture, ResidencyError> {
        let tasks = self.tasks.as_ref().ok_or(ResidencyError::ShuttingDown)?;
        let completion = Completion::new();
        let task = UploadTask {
            source,
            destination,
            completion: Arc::clone(&completion),
        };
        tasks.send(task).map_err(|_| ResidencyError::ShuttingDown)?;
        self.metrics.task_submitted();
        Ok(ResidencyFuture::new(
            completion,
            Arc::clone(&self.device),
            self.config.fence_timeout,
        ))
    }

    /// Current counters.
    pub fn stats(&self) -> ResidencyStats {
        self.metrics.snapshot()
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ResidencyConfig {
        &self.config
    }

    /// Stop accepting work, let the worker finish every queued task and
    /// wait (bounded) for in-flight copies, then join it.
    ///
    /// Idempotent; later calls return at once with the final counters.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let start = Instant::now();
        self.tasks.take();
        let worker_joined = match self.worker.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        };
        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            worker_joined,
            stats: self.metrics.snapshot(),
        };
        log::info!(
            "residency manager shut down in {} ms ({} of {} uploads completed)",
            report.total_ms,
            report.stats.tasks_completed,
            report.stats.tasks_submitted
        );
        report
    }
}

impl Drop for ResidencyManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for ResidencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidencyManager")
            .field("config", &self.config)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn check_buffer_bounds(dst: &Buffer, offset: u64, len: u64) -> Result<(), ResidencyError> {
    let size = dst.byte_size();
    if offset.checked_add(len).is_none_or(|end| end > size) {
        return Err(ResidencyError::OutOfBounds { offset, len, size });
    }
    Ok(())
}
