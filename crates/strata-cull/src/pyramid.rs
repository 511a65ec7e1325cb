//! Hierarchical max-depth texture for occlusion tests.
//!
//! Each texel of mip `n + 1` holds the farthest depth of the mip `n`
//! texels it covers, so a single sample at the right mip bounds the depth
//! of everything already drawn over a screen rectangle.

use std::sync::Arc;
use std::time::Duration;

use strata_core::{
    create_buffer, create_texture, BufferDesc, BufferLayout, BufferUsage, CommandList, Device,
    Format, Texture, TextureDesc, TextureView,
};

use crate::config::CullerConfig;
use crate::error::CullError;

/// An `R32Float` texture with a full mip chain of max depths.
#[derive(Debug)]
pub struct DepthPyramid {
    texture: Texture,
    fence_timeout: Duration,
}

impl DepthPyramid {
    /// A pyramid whose base level is `width` x `height`.
    pub fn new(device: &Arc<dyn Device>, width: u32, height: u32) -> Result<Self, CullError> {
        Self::with_config(device, width, height, &CullerConfig::default())
    }

    /// A pyramid whose [`upload`](Self::upload) waits at most
    /// `config.fence_timeout`.
    pub fn with_config(
        device: &Arc<dyn Device>,
        width: u32,
        height: u32,
        config: &CullerConfig,
    ) -> Result<Self, CullError> {
        let mips = TextureDesc::full_mip_chain(width, height);
        let texture = create_texture(
            device,
            TextureDesc::new("depth-pyramid", width, height, Format::R32Float).mip_levels(mips),
        )?;
        log::debug!("depth pyramid {width}x{height} with {mips} mips");
        Ok(Self {
            texture,
            fence_timeout: config.fence_timeout,
        })
    }

    /// Shader-readable view of every mip.
    pub fn srv(&self) -> TextureView {
        self.texture.srv()
    }

    /// Mip levels in the chain.
    pub fn mip_levels(&self) -> u32 {
        self.texture.desc().mip_levels
    }

    /// Extent of mip 0.
    pub fn size(&self) -> (u32, u32) {
        let desc = self.texture.desc();
        (desc.width, desc.height)
    }

    /// Record a reset of every mip to `depth`.
    pub fn clear(&self, cmd: &mut CommandList, depth: f32) {
        cmd.clear_texture(&self.texture.srv(), depth.to_bits());
    }

    /// Reduce a row-major base-level depth image and upload the whole
    /// chain. Blocks until the copy completes.
    pub fn upload(&self, device: &Arc<dyn Device>, depth: &[f32]) -> Result<(), CullError> {
        let (width, height) = self.size();
        let expected = u64::from(width) * u64::from(height);
        if depth.len() as u64 != expected {
            return Err(CullError::DepthExtent {
                expected,
                actual: depth.len() as u64,
            });
        }
        let levels = reduce_max(width, height, depth, self.mip_levels());
        let total: usize = levels.iter().map(Vec::len).sum();
        let staging = create_buffer(
            device,
            BufferDesc::new("depth-pyramid/staging", BufferLayout::Format(Format::R32Float), total as u64)
                .usage(BufferUsage::UPLOAD | BufferUsage::COPY_SRC),
        )?;

        let view = self.texture.srv();
        let mut cmd = device.create_command_list("depth-pyramid/upload");
        let mut offset = 0u64;
        for (mip, level) in levels.iter().enumerate() {
            let (w, h) = view.mip_extent(mip as u32);
            device.write_buffer(&staging.raw(), offset, bytemuck::cast_slice::<f32, u8>(level))?;
            cmd.copy_buffer_to_texture(&staging.raw(), offset, w * 4, &view, mip as u32, 0, (0, 0), (w, h));
            offset += level.len() as u64 * 4;
        }
        device.submit_blocking(cmd, self.fence_timeout)?;
        Ok(())
    }
}

/// Max-reduce a `width` x `height` image into `mips` levels, level 0
/// being the image itself.
///
/// Destination texel `x` covers source texels
/// `floor(x * sw / dw) .. ceil((x + 1) * sw / dw)`, so odd extents never
/// drop a row or column.
pub fn reduce_max(width: u32, height: u32, base: &[f32], mips: u32) -> Vec<Vec<f32>> {
    let mut levels = vec![base.to_vec()];
    let (mut sw, mut sh) = (width.max(1), height.max(1));
    for _ in 1..mips {
        let (dw, dh) = ((sw / 2).max(1), (sh / 2).max(1));
        let src = &levels[levels.len() - 1];
        let mut dst = Vec::with_capacity(dw as usize * dh as usize);
        for y in 0..dh {
            let (y0, y1) = cover(y, sh, dh);
            for x in 0..dw {
                let (x0, x1) = cover(x, sw, dw);
                let mut max = f32::NEG_INFINITY;
                for sy in y0..y1 {
                    for sx in x0..x1 {
                        max = max.max(src[(sy * sw + sx) as usize]);
                    }
                }
                dst.push(max);
            }
        }
        levels.push(dst);
        (sw, sh) = (dw, dh);
    }
    levels
}

fn cover(d: u32, src: u32, dst: u32) -> (u32, u32) {
    let start = d * src / dst;
    let end = ((d + 1) * src).div_ceil(dst);
    (start, end.min(src).max(start + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{DeviceError, DEFAULT_FENCE_TIMEOUT};
    use strata_test_utils::SoftDevice;

    #[test]
    fn reduction_keeps_the_farthest_depth() {
        #[rustfmt::skip]
        let base = [
            0.1, 0.2, 0.3,
            0.4, 0.9, 0.1,
            0.1, 0.1, 0.7,
        ];
        let levels = reduce_max(3, 3, &base, 2);
        assert_eq!(levels.len(), 2);
        // 3 -> 1 covers every row and column.
        assert_eq!(levels[1], vec![0.9]);
    }

    #[test]
    fn even_extents_halve_exactly() {
        let base: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let levels = reduce_max(4, 4, &base, 3);
        assert_eq!(levels[1], vec![5.0, 7.0, 13.0, 15.0]);
        assert_eq!(levels[2], vec![15.0]);
    }

    #[test]
    fn upload_fills_every_mip() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        let pyramid = DepthPyramid::new(&device, 4, 2).unwrap();
        assert_eq!(pyramid.mip_levels(), 3);

        let mut depth = vec![0.25f32; 8];
        depth[5] = 0.75;
        pyramid.upload(&device, &depth).unwrap();

        let top = device.read_texture(&pyramid.srv(), 2, 0).unwrap();
        let top: Vec<f32> = bytemuck::pod_collect_to_vec(&top);
        assert_eq!(top, vec![0.75]);
    }

    #[test]
    fn upload_gives_up_after_the_configured_timeout() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        let config = CullerConfig::default().fence_timeout(Duration::from_millis(20));
        let pyramid = DepthPyramid::with_config(&device, 2, 2, &config).unwrap();
        soft.pause();
        let result = pyramid.upload(&device, &[0.5; 4]);
        soft.resume();
        assert!(matches!(result, Err(CullError::Device(DeviceError::Timeout { .. }))));
    }

    #[test]
    fn upload_rejects_mismatched_extents() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        let pyramid = DepthPyramid::new(&device, 4, 4).unwrap();
        assert_eq!(
            pyramid.upload(&device, &[0.0; 3]),
            Err(CullError::DepthExtent {
                expected: 16,
                actual: 3
            })
        );
    }

    #[test]
    fn clear_resets_every_mip() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        let pyramid = DepthPyramid::new(&device, 2, 2).unwrap();
        let mut cmd = device.create_command_list("clear");
        pyramid.clear(&mut cmd, 1.0);
        device.submit_blocking(cmd, DEFAULT_FENCE_TIMEOUT).unwrap();
        for mip in 0..pyramid.mip_levels() {
            let bytes = device.read_texture(&pyramid.srv(), mip, 0).unwrap();
            let texels: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
            assert!(texels.iter().all(|&d| d == 1.0));
        }
    }
}
