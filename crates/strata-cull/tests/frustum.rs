//! Frustum culling never drops a visible instance and never keeps one
//! clearly outside the view.

mod common;

use glam::{Mat4, Vec3};
use proptest::prelude::*;
use strata_cull::{
    BoundingBox, CullerConfig, DataLine, FrustumCullingOutput, FrustumCuller, InstanceLod, LinePair,
    MaterialClass, SceneBuffers, SceneData, ShadowPartition,
};
use strata_test_utils::read_pods;

use common::{counter, pair};

const MARGIN: f32 = 1e-2;

fn arb_instance() -> impl Strategy<Value = (Vec3, Vec3)> {
    (
        (-50.0f32..50.0, -50.0f32..50.0, -2.0f32..2.0),
        (0.05f32..4.0, 0.05f32..4.0, 0.05f32..1.0),
    )
        .prop_map(|(c, e)| (Vec3::new(c.0, c.1, c.2), Vec3::new(e.0, e.1, e.2)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn survivors_are_exactly_the_overlapping_boxes(
        instances in prop::collection::vec(arb_instance(), 1..64),
        center in (-20.0f32..20.0, -20.0f32..20.0),
        half_extent in 2.0f32..30.0,
    ) {
        let (_soft, device) = common::device();
        let mut data = SceneData::default();
        for &(c, e) in &instances {
            // Local box around the origin, moved into place by the transform.
            data.push_instance(
                BoundingBox::from_center_extents(Vec3::ZERO, e),
                Mat4::from_translation(c).into(),
                InstanceLod { cluster_pointer: 0, cluster_count: 1 },
                MaterialClass::Opaque,
            );
        }
        let buffers = SceneBuffers::upload(&device, &data).unwrap();
        let culler = FrustumCuller::new(&device, CullerConfig::new(64)).unwrap();
        let (line, mut draw) = pair(&device, "instances", 64);
        let camera = common::overhead(Vec3::new(center.0, center.1, 0.0), half_extent);

        let mut cmd = device.create_command_list("frustum");
        culler
            .instance_cull_no_depth(&mut cmd, &camera, &buffers.bindings(), LinePair::new(&line, &mut draw))
            .unwrap();
        common::run(&device, cmd);

        let kept = counter(&device, culler.instance_count(ShadowPartition::Opaque));
        prop_assert_eq!(counter(&device, draw.count()), kept);
        let list: Vec<FrustumCullingOutput> =
            read_pods(&*device, &culler.instance_list(ShadowPartition::Opaque), u64::from(kept)).unwrap();
        let survivors: Vec<u32> = list.iter().map(|o| o.instance_pointer).collect();

        for (i, &(c, e)) in instances.iter().enumerate() {
            // Signed gap between the box and the view square; negative
            // means overlap.
            let gap = ((c.x - center.0).abs() - e.x - half_extent)
                .max((c.y - center.1).abs() - e.y - half_extent);
            let listed = survivors.contains(&(i as u32));
            if gap < -MARGIN {
                prop_assert!(listed, "visible instance {} dropped (gap {})", i, gap);
            } else if gap > MARGIN {
                prop_assert!(!listed, "instance {} outside the view kept (gap {})", i, gap);
            }
        }
        // Each survivor reserved its own cluster slot.
        let mut bases: Vec<u32> = list.iter().map(|o| o.cluster_base).collect();
        bases.sort_unstable();
        prop_assert_eq!(bases, (0..kept).collect::<Vec<_>>());
    }
}
