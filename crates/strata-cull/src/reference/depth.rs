use glam::Vec2;
use strata_core::{Aabb, KernelError, ThreadContext};

use crate::camera::CullConstants;
use crate::program::binding;

/// Whether `world` lies entirely behind the depth already in the pyramid.
///
/// Only rejects when every corner projects in front of the camera; the
/// footprint is sampled at the mip where it spans about one texel.
pub(super) fn occluded(ctx: &dyn ThreadContext, c: &CullConstants, world: &Aabb) -> Result<bool, KernelError> {
    if c.depth_test == 0 {
        return Ok(false);
    }
    let view_projection = c.view_projection();
    let mut lo = Vec2::splat(f32::INFINITY);
    let mut hi = Vec2::splat(f32::NEG_INFINITY);
    let mut nearest = f32::INFINITY;
    for corner in world.corners() {
        let clip = view_projection * corner.extend(1.0);
        if clip.w <= f32::EPSILON {
            return Ok(false);
        }
        let ndc = clip.truncate() / clip.w;
        if ndc.z < 0.0 {
            return Ok(false);
        }
        let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        lo = lo.min(uv);
        hi = hi.max(uv);
        nearest = nearest.min(ndc.z);
    }
    let lo = lo.clamp(Vec2::ZERO, Vec2::ONE);
    let hi = hi.clamp(Vec2::ZERO, Vec2::ONE);

    let footprint = (hi - lo) * Vec2::from(c.pyramid_size);
    let texels = footprint.max_element().max(1.0);
    let mip = (texels.log2().ceil() as u32).min(c.mip_count.saturating_sub(1));
    let (w, h) = ctx.texture_extent(binding::DEPTH_PYRAMID, mip)?;
    let (wf, hf) = (w as f32, h as f32);
    let x0 = (lo.x * wf).floor() as i64;
    let y0 = (lo.y * hf).floor() as i64;
    let x1 = ((hi.x * wf).floor() as i64).min(i64::from(w) - 1);
    let y1 = ((hi.y * hf).floor() as i64).min(i64::from(h) - 1);

    let mut farthest = f32::NEG_INFINITY;
    for y in y0..=y1.max(y0) {
        for x in x0..=x1.max(x0) {
            let depth = ctx.sample(binding::DEPTH_PYRAMID, binding::DEPTH_SAMPLER, mip, x, y)?;
            farthest = farthest.max(depth);
        }
    }
    Ok(nearest > farthest)
}
