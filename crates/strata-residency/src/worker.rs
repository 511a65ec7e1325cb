//! The upload worker thread.
//!
//! One worker owns the ring buffer and every queued-to-dispatched
//! transition. Per task it:
//!
//! 1. validates the destination,
//! 2. splits the source into chunks (buffers) or row bands (textures)
//!    that fit the ring,
//! 3. stages each piece, records a copy and submits it, tagging the ring
//!    region with the returned fence,
//! 4. marks the task dispatched with the fence of its last piece.
//!
//! Between tasks, and whenever the idle poll fires, it reclaims ring space
//! and promotes dispatched tasks whose fences have completed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use strata_core::{Buffer, BufferView, CommandList, Device, FenceValue};

use crate::config::ResidencyConfig;
use crate::error::ResidencyError;
use crate::metrics::ResidencyMetrics;
use crate::ring::{RingAllocation, UploadRing};
use crate::task::{Completion, Destination, TaskState, TextureRegion, UploadTask};

/// Placement alignment of buffer chunks in the ring.
pub const BUFFER_PLACEMENT_ALIGNMENT: u64 = 16;

/// Row pitch alignment of texture bands.
pub const TEXTURE_PITCH_ALIGNMENT: u64 = 256;

/// Placement alignment of texture bands in the ring.
pub const TEXTURE_PLACEMENT_ALIGNMENT: u64 = 512;

pub(crate) struct Worker {
    device: Arc<dyn Device>,
    config: ResidencyConfig,
    staging: Buffer,
    ring: UploadRing,
    in_flight: VecDeque<(FenceValue, Arc<Completion>)>,
    metrics: Arc<ResidencyMetrics>,
}

impl Worker {
    pub(crate) fn new(
        device: Arc<dyn Device>,
        config: ResidencyConfig,
        staging: Buffer,
        metrics: Arc<ResidencyMetrics>,
    ) -> Self {
        let ring = UploadRing::new(staging.byte_size());
        Self {
            device,
            config,
            staging,
            ring,
            in_flight: VecDeque::new(),
            metrics,
        }
    }

    /// Serve `tasks` until every sender is gone, then drain.
    pub(crate) fn run(mut self, tasks: Receiver<UploadTask>) {
        log::debug!(
            "residency worker started with a {} byte ring",
            self.ring.capacity()
        );
        loop {
            match tasks.recv_timeout(self.config.poll_interval) {
                Ok(task) => self.process(task),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.retire();
        }
        self.drain();
    }

    fn process(&mut self, task: UploadTask) {
        let UploadTask {
            source,
            destination,
            completion,
        } = task;
        completion.set(TaskState::Staged);

        let bytes = source.bytes();
        let result = match &destination {
            Destination::Buffer { view, byte_offset } => self.upload_buffer(bytes, view, *byte_offset),
            Destination::Texture(region) => self.upload_texture(bytes, region),
        };

        match result {
            Ok(Some(fence)) => {
                completion.set(TaskState::Dispatched { fence });
                self.in_flight.push_back((fence, completion));
            }
            Ok(None) => {
                completion.set(TaskState::Complete);
                self.metrics.task_completed();
            }
            Err(err) => {
                log::warn!("residency upload failed: {err}");
                completion.set(TaskState::Failed(err));
                self.metrics.task_failed();
            }
        }
    }

    /// Returns the fence of the last chunk, or `None` for an empty upload.
    fn upload_buffer(
        &mut self,
        data: &[u8],
        view: &BufferView,
        byte_offset: u64,
    ) -> Result<Option<FenceValue>, ResidencyError> {
        if !view.is_alive() {
            return Err(ResidencyError::DestinationReleased);
        }
        let len = data.len() as u64;
        if byte_offset.checked_add(len).is_none_or(|end| end > view.byte_len()) {
            return Err(ResidencyError::OutOfBounds {
                offset: byte_offset,
                len,
                size: view.byte_len(),
            });
        }

        let chunk_size = self.ring.max_allocation_space() as usize;
        let mut last = None;
        let mut written = 0u64;
        for chunk in data.chunks(chunk_size) {
            let staged = self.stage(chunk.len() as u64, BUFFER_PLACEMENT_ALIGNMENT)?;
            self.device
                .write_buffer(&self.staging.raw(), staged.offset, chunk)?;

            let mut cmd = self.device.create_command_list("residency-buffer");
            cmd.copy_buffer_region(
                &self.staging.raw(),
                staged.offset,
                view,
                byte_offset + written,
                staged.bytes,
            );
            last = Some(self.submit(cmd, staged.bytes)?);
            written += staged.bytes;
        }
        Ok(last)
    }

    /// Returns the fence of the last band, or `None` for an empty region.
    fn upload_texture(
        &mut self,
        data: &[u8],
        region: &TextureRegion,
    ) -> Result<Option<FenceValue>, ResidencyError> {
        let view = &region.view;
        if !view.is_alive() {
            return Err(ResidencyError::DestinationReleased);
        }
        if region.width == 0 || region.height == 0 {
            return Ok(None);
        }

        let texel = u64::from(view.format().byte_size());
        let row_bytes = u64::from(region.width) * texel;
        let pitch = row_bytes.div_ceil(TEXTURE_PITCH_ALIGNMENT) * TEXTURE_PITCH_ALIGNMENT;
        let needed = row_bytes * u64::from(region.height);
        if (data.len() as u64) < needed {
            return Err(ResidencyError::InvalidUpload {
                reason: format!("region needs {needed} source bytes, got {}", data.len()),
            });
        }
        let rows_per_band = self.ring.max_allocation_space() / pitch;
        if rows_per_band == 0 {
            return Err(ResidencyError::InvalidUpload {
                reason: format!(
                    "a row pitch of {pitch} bytes exceeds the ring's largest chunk of {}",
                    self.ring.max_allocation_space()
                ),
            });
        }

        let mut row = 0u32;
        let mut last = None;
        while row < region.height {
            let rows = u64::from(region.height - row).min(rows_per_band) as u32;
            let band_bytes = pitch * u64::from(rows);
            let staged = self.stage(band_bytes, TEXTURE_PLACEMENT_ALIGNMENT)?;

            let mut band = vec![0u8; band_bytes as usize];
            for r in 0..rows as usize {
                let src = (row as usize + r) * row_bytes as usize;
                let dst = r * pitch as usize;
                band[dst..dst + row_bytes as usize]
                    .copy_from_slice(&data[src..src + row_bytes as usize]);
            }
            self.device
                .write_buffer(&self.staging.raw(), staged.offset, &band)?;

            let mut cmd = self.device.create_command_list("residency-texture");
            cmd.copy_buffer_to_texture(
                &self.staging.raw(),
                staged.offset,
                pitch as u32,
                view,
                region.mip,
                region.slice,
                (region.x, region.y + row),
                (region.width, rows),
            );
            last = Some(self.submit(cmd, band_bytes)?);
            row += rows;
        }
        Ok(last)
    }

    fn submit(&mut self, cmd: CommandList, bytes: u64) -> Result<FenceValue, ResidencyError> {
        let fence = self.device.submit(cmd)?;
        self.ring.tag(fence);
        self.metrics.chunk_staged(bytes);
        Ok(fence)
    }

    /// Reserve ring space, blocking on the oldest in-flight fence while
    /// the ring is full.
    fn stage(&mut self, bytes: u64, align: u64) -> Result<RingAllocation, ResidencyError> {
        loop {
            if let Some(allocation) = self.ring.allocate(bytes, align) {
                return Ok(allocation);
            }
            let Some(oldest) = self.ring.oldest_fence() else {
                return Err(ResidencyError::InvalidUpload {
                    reason: format!(
                        "{bytes} bytes cannot fit a {} byte ring",
                        self.ring.capacity()
                    ),
                });
            };
            let start = Instant::now();
            let waited = self.device.wait_fence(oldest, self.config.fence_timeout);
            self.metrics.stalled(start.elapsed());
            log::debug!(
                "residency ring full ({} of {} bytes), stalled {:?} on {oldest}",
                self.ring.used(),
                self.ring.capacity(),
                start.elapsed()
            );
            waited?;
            self.retire();
        }
    }

    /// Reclaim ring space and complete tasks whose fences have signaled.
    fn retire(&mut self) {
        let completed = self.device.completed_fence();
        self.ring.reclaim(completed);
        while let Some((fence, _)) = self.in_flight.front() {
            if *fence > completed {
                break;
            }
            if let Some((_, completion)) = self.in_flight.pop_front() {
                completion.set(TaskState::Complete);
                self.metrics.task_completed();
            }
        }
    }

    /// Wait for everything in flight before the worker exits.
    fn drain(&mut self) {
        if let Some(&(last, _)) = self.in_flight.back() {
            if let Err(err) = self.device.wait_fence(last, self.config.fence_timeout) {
                log::warn!("residency worker exiting with uploads in flight: {err}");
                let err = ResidencyError::from(err);
                for (_, completion) in self.in_flight.drain(..) {
                    completion.set(TaskState::Failed(err.clone()));
                    self.metrics.task_failed();
                }
            }
        }
        self.retire();
        log::debug!("residency worker stopped");
    }
}
