//! Views of the scene metadata the culling programs read.

use std::sync::Arc;

use bytemuck::Pod;
use strata_core::{
    create_buffer, Bindings, Buffer, BufferDesc, BufferLayout, BufferUsage, BufferView, Device,
};

use crate::error::CullError;
use crate::program::binding;
use crate::record::{BoundingBox, ClusterBinding, ClusterCone, InstanceLod, InstanceTransform, MaterialClass};

/// Per-instance and per-cluster metadata buffers.
///
/// Typically the parallel buffers of the scene's instance and cluster
/// arenas. Instance buffers are indexed by instance pointer, cluster
/// buffers by cluster pointer, and `index_data` by the index pointers in
/// `cluster_binding`.
#[derive(Clone, Debug)]
pub struct SceneBindings {
    /// [`BoundingBox`](crate::BoundingBox) per instance, object space.
    pub instance_bounds: BufferView,
    /// [`InstanceTransform`](crate::InstanceTransform) per instance.
    pub instance_transform: BufferView,
    /// [`InstanceLod`](crate::InstanceLod) per instance.
    pub instance_lod: BufferView,
    /// Raw [`MaterialClass`](crate::MaterialClass) per instance.
    pub instance_material: BufferView,
    /// [`BoundingBox`](crate::BoundingBox) per cluster, object space.
    pub cluster_bounds: BufferView,
    /// [`ClusterCone`](crate::ClusterCone) per cluster, object space.
    pub cluster_cone: BufferView,
    /// [`ClusterBinding`](crate::ClusterBinding) per cluster.
    pub cluster_binding: BufferView,
    /// Scene index arena.
    pub index_data: BufferView,
    /// Instances to cull, starting at instance pointer 0.
    pub instance_count: u32,
}

impl SceneBindings {
    /// Whether every viewed buffer still exists.
    pub fn is_alive(&self) -> bool {
        self.views().iter().all(|v| v.is_alive())
    }

    /// Add every metadata view to `bindings`.
    pub fn apply(&self, bindings: Bindings) -> Bindings {
        bindings
            .buffer(binding::INSTANCE_BOUNDS, self.instance_bounds.clone())
            .buffer(binding::INSTANCE_TRANSFORM, self.instance_transform.clone())
            .buffer(binding::INSTANCE_LOD, self.instance_lod.clone())
            .buffer(binding::INSTANCE_MATERIAL, self.instance_material.clone())
            .buffer(binding::CLUSTER_BOUNDS, self.cluster_bounds.clone())
            .buffer(binding::CLUSTER_CONE, self.cluster_cone.clone())
            .buffer(binding::CLUSTER_BINDING, self.cluster_binding.clone())
            .buffer(binding::INDEX_DATA, self.index_data.clone())
    }

    fn views(&self) -> [&BufferView; 8] {
        [
            &self.instance_bounds,
            &self.instance_transform,
            &self.instance_lod,
            &self.instance_material,
            &self.cluster_bounds,
            &self.cluster_cone,
            &self.cluster_binding,
            &self.index_data,
        ]
    }
}

// ── CPU-built scenes ────────────────────────────────────────────

/// Scene metadata assembled on the CPU.
///
/// Instance vectors are parallel and indexed by instance pointer; cluster
/// vectors are parallel and indexed by cluster pointer.
#[derive(Clone, Debug, Default)]
pub struct SceneData {
    /// Object-space bounds per instance.
    pub instance_bounds: Vec<BoundingBox>,
    /// Transform per instance.
    pub instance_transforms: Vec<InstanceTransform>,
    /// Cluster range per instance.
    pub instance_lods: Vec<InstanceLod>,
    /// Material class per instance.
    pub instance_materials: Vec<MaterialClass>,
    /// Object-space bounds per cluster.
    pub cluster_bounds: Vec<BoundingBox>,
    /// Normal cone per cluster.
    pub cluster_cones: Vec<ClusterCone>,
    /// Index range per cluster.
    pub cluster_bindings: Vec<ClusterBinding>,
    /// Index data addressed by the cluster bindings.
    pub indexes: Vec<u32>,
}

impl SceneData {
    /// Instances described.
    pub fn instance_count(&self) -> usize {
        self.instance_bounds.len()
    }

    /// Append an instance whose clusters were already pushed and return
    /// its instance pointer.
    pub fn push_instance(
        &mut self,
        bounds: BoundingBox,
        transform: InstanceTransform,
        lod: InstanceLod,
        material: MaterialClass,
    ) -> u32 {
        self.instance_bounds.push(bounds);
        self.instance_transforms.push(transform);
        self.instance_lods.push(lod);
        self.instance_materials.push(material);
        (self.instance_bounds.len() - 1) as u32
    }

    /// Append a cluster and its indexes; returns its cluster pointer.
    pub fn push_cluster(&mut self, bounds: BoundingBox, cone: ClusterCone, indexes: &[u32], vertex_pointer: u32) -> u32 {
        let binding = ClusterBinding::new(self.indexes.len() as u32, indexes.len() as u32, vertex_pointer);
        self.indexes.extend_from_slice(indexes);
        self.cluster_bounds.push(bounds);
        self.cluster_cones.push(cone);
        self.cluster_bindings.push(binding);
        (self.cluster_bounds.len() - 1) as u32
    }

    fn check(&self) -> Result<(), CullError> {
        let instances = self.instance_bounds.len();
        let clusters = self.cluster_bounds.len();
        if self.instance_transforms.len() != instances
            || self.instance_lods.len() != instances
            || self.instance_materials.len() != instances
        {
            return Err(CullError::InvalidConfig {
                reason: "instance vectors differ in length".into(),
            });
        }
        if self.cluster_cones.len() != clusters || self.cluster_bindings.len() != clusters {
            return Err(CullError::InvalidConfig {
                reason: "cluster vectors differ in length".into(),
            });
        }
        Ok(())
    }
}

/// Scene metadata buffers owned together, uploaded from a [`SceneData`].
#[derive(Debug)]
pub struct SceneBuffers {
    buffers: [Buffer; 8],
    instance_count: u32,
}

impl SceneBuffers {
    /// Upload `data` into fresh mappable buffers.
    pub fn upload(device: &Arc<dyn Device>, data: &SceneData) -> Result<Self, CullError> {
        data.check()?;
        let materials: Vec<u32> = data.instance_materials.iter().map(|m| m.to_raw()).collect();
        let buffers = [
            upload(device, "scene/instance-bounds", &data.instance_bounds)?,
            upload(device, "scene/instance-transform", &data.instance_transforms)?,
            upload(device, "scene/instance-lod", &data.instance_lods)?,
            upload(device, "scene/instance-material", &materials)?,
            upload(device, "scene/cluster-bounds", &data.cluster_bounds)?,
            upload(device, "scene/cluster-cone", &data.cluster_cones)?,
            upload(device, "scene/cluster-binding", &data.cluster_bindings)?,
            upload(device, "scene/index-data", &data.indexes)?,
        ];
        log::debug!(
            "uploaded scene with {} instances and {} clusters",
            data.instance_count(),
            data.cluster_bounds.len()
        );
        Ok(Self {
            buffers,
            instance_count: data.instance_count() as u32,
        })
    }

    /// Views of every buffer.
    pub fn bindings(&self) -> SceneBindings {
        let [ib, it, il, im, cb, cc, cbi, idx] = &self.buffers;
        SceneBindings {
            instance_bounds: ib.srv(),
            instance_transform: it.srv(),
            instance_lod: il.srv(),
            instance_material: im.srv(),
            cluster_bounds: cb.srv(),
            cluster_cone: cc.srv(),
            cluster_binding: cbi.srv(),
            index_data: idx.srv(),
            instance_count: self.instance_count,
        }
    }

    /// Mappable view of the transforms, for per-frame updates.
    pub fn transforms(&self) -> BufferView {
        self.buffers[1].uav()
    }
}

fn upload<T: Pod>(device: &Arc<dyn Device>, name: &str, items: &[T]) -> Result<Buffer, CullError> {
    let buffer = create_buffer(
        device,
        BufferDesc::new(name, BufferLayout::of::<T>(), items.len().max(1) as u64)
            .usage(BufferUsage::storage() | BufferUsage::UPLOAD),
    )?;
    if !items.is_empty() {
        device.write_buffer(&buffer.raw(), 0, bytemuck::cast_slice(items))?;
    }
    Ok(buffer)
}
