//! The count-delta protocol between append and draw lines, executed on
//! the software device.

mod common;

use std::sync::Arc;

use strata_core::Device;
use strata_cull::{begin_delta, end_delta, BufferMath, BufferMathOperation, ClusterDataLine, DataLine};
use strata_test_utils::SoftDevice;

use common::{counter, pair};

/// Start the append count at `start`, append `added` records inside a
/// delta, and return the draw line's `(index, count)`.
fn delta(soft: &Arc<SoftDevice>, device: &Arc<dyn Device>, start: u32, added: u32) -> (u32, u32) {
    let (append, mut draw) = pair(device, "line", 16);
    soft.poke(&append.count().raw(), 0, &start.to_ne_bytes()).unwrap();

    let mut cmd = device.create_command_list("delta");
    begin_delta(&mut cmd, &append, &mut draw);
    BufferMath::perform_constant(
        &mut cmd,
        &append.count().uav(),
        BufferMathOperation::Addition,
        1,
        0,
        added,
    );
    end_delta(&mut cmd, &append, &draw);
    common::run(device, cmd);

    assert_eq!(draw.records(), append.records(), "draw line aliases the append records");
    (counter(device, draw.index()), counter(device, draw.count()))
}

#[test]
fn empty_passes_describe_no_records() {
    let (soft, device) = common::device();
    assert_eq!(delta(&soft, &device, 0, 0), (0, 0));
    assert_eq!(delta(&soft, &device, 7, 0), (7, 0));
}

#[test]
fn single_appends_are_counted() {
    let (soft, device) = common::device();
    assert_eq!(delta(&soft, &device, 0, 1), (0, 1));
    assert_eq!(delta(&soft, &device, 12, 1), (12, 1));
}

#[test]
fn counts_near_the_top_of_the_range() {
    let (soft, device) = common::device();
    assert_eq!(delta(&soft, &device, u32::MAX - 5, 5), (u32::MAX - 5, 5));
    assert_eq!(delta(&soft, &device, 0, u32::MAX), (0, u32::MAX));
}

#[test]
fn a_reset_append_line_saturates_to_zero() {
    let (soft, device) = common::device();
    let (append, mut draw): (ClusterDataLine, ClusterDataLine) = pair(&device, "line", 4);
    soft.poke(&append.count().raw(), 0, &9u32.to_ne_bytes()).unwrap();

    let mut cmd = device.create_command_list("delta");
    begin_delta(&mut cmd, &append, &mut draw);
    append.reset(&mut cmd);
    end_delta(&mut cmd, &append, &draw);
    common::run(&device, cmd);

    assert_eq!(counter(&device, draw.index()), 9);
    assert_eq!(counter(&device, draw.count()), 0);
}

#[test]
fn consecutive_passes_describe_only_their_own_records() {
    let (_soft, device) = common::device();
    let (append, mut draw) = pair(&device, "line", 16);

    let mut cmd = device.create_command_list("passes");
    for added in [3, 4] {
        begin_delta(&mut cmd, &append, &mut draw);
        BufferMath::perform_constant(
            &mut cmd,
            &append.count().uav(),
            BufferMathOperation::Addition,
            1,
            0,
            added,
        );
        end_delta(&mut cmd, &append, &draw);
    }
    common::run(&device, cmd);

    assert_eq!(counter(&device, append.count()), 7);
    assert_eq!(counter(&device, draw.index()), 3);
    assert_eq!(counter(&device, draw.count()), 4);
}
