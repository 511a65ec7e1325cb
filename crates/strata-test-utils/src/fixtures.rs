//! Small helpers shared by the workspace's tests.

use bytemuck::Pod;
use strata_core::{BufferView, Device, DeviceError};

/// `len` bytes of a deterministic, seed-dependent pattern.
///
/// Consecutive bytes differ, so misaligned or truncated copies show up
/// as mismatches.
pub fn byte_pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed).wrapping_add((i >> 8) as u8))
        .collect()
}

/// Read element `index` of `view` as a `T`.
pub fn read_pod<T: Pod>(device: &dyn Device, view: &BufferView, index: u64) -> Result<T, DeviceError> {
    let size = std::mem::size_of::<T>() as u64;
    let bytes = device.read_buffer(view, index * u64::from(view.stride()), size)?;
    Ok(bytemuck::pod_read_unaligned(&bytes))
}

/// Read the first `count` elements of `view` as `T`s.
pub fn read_pods<T: Pod>(device: &dyn Device, view: &BufferView, count: u64) -> Result<Vec<T>, DeviceError> {
    let stride = u64::from(view.stride());
    let size = std::mem::size_of::<T>() as u64;
    let bytes = device.read_buffer(view, 0, count * stride)?;
    Ok(bytes
        .chunks_exact(stride as usize)
        .map(|chunk| bytemuck::pod_read_unaligned(&chunk[..size as usize]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_depend_on_seed() {
        assert_ne!(byte_pattern(64, 1), byte_pattern(64, 2));
        assert_eq!(byte_pattern(64, 1), byte_pattern(64, 1));
    }

    #[test]
    fn consecutive_pattern_bytes_differ() {
        let p = byte_pattern(1024, 0);
        assert!(p.windows(2).all(|w| w[0] != w[1]));
    }
}
