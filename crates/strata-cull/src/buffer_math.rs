//! Element-wise `u32` arithmetic recorded as compute passes.
//!
//! The culling stages never read counts back to the CPU. Whenever a stage
//! needs "how many records did the last pass append", it records a
//! subtraction of two GPU counters instead.

use bytemuck::{Pod, Zeroable};
use strata_core::{Bindings, BufferView, CommandList, ComputePipeline};

use crate::program::{binding, GROUP_SIZE, MATH_OPERATION, MATH_OPERATION_CONSTANT};

/// An element-wise operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferMathOperation {
    /// `a + b`, wrapping.
    Addition,
    /// `a - b`, saturating at zero.
    Subtraction,
    /// `a / b`; division by zero yields zero.
    Division,
    /// `a * b`, wrapping.
    Multiplication,
    /// `b`.
    Set,
}

impl BufferMathOperation {
    /// Value stored in the parameter block.
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Addition => 0,
            Self::Subtraction => 1,
            Self::Division => 2,
            Self::Multiplication => 3,
            Self::Set => 4,
        }
    }

    /// Decode a stored value.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Addition),
            1 => Some(Self::Subtraction),
            2 => Some(Self::Division),
            3 => Some(Self::Multiplication),
            4 => Some(Self::Set),
            _ => None,
        }
    }

    /// Apply the operation.
    pub fn apply(self, a: u32, b: u32) -> u32 {
        match self {
            Self::Addition => a.wrapping_add(b),
            Self::Subtraction => a.saturating_sub(b),
            Self::Division => a.checked_div(b).unwrap_or(0),
            Self::Multiplication => a.wrapping_mul(b),
            Self::Set => b,
        }
    }
}

/// Parameter block of the math programs.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MathParams {
    /// [`BufferMathOperation::to_raw`].
    pub operation: u32,
    /// Elements to process.
    pub count: u32,
    /// First element of `src_a` (or the in/out buffer).
    pub a_offset: u32,
    /// First element of `src_b`.
    pub b_offset: u32,
    /// First element of the output.
    pub output_offset: u32,
    /// Operand of the constant form.
    pub value: u32,
    _pad: [u32; 2],
}

/// Element ranges of a math pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MathRange {
    /// Elements to process.
    pub count: u32,
    /// First element of the first operand.
    pub a_offset: u32,
    /// First element of the second operand.
    pub b_offset: u32,
    /// First element of the output.
    pub output_offset: u32,
}

impl MathRange {
    /// The first element of every buffer.
    pub const SINGLE: Self = Self {
        count: 1,
        a_offset: 0,
        b_offset: 0,
        output_offset: 0,
    };
}

/// Records count arithmetic.
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferMath;

impl BufferMath {
    /// `output[o + i] = op(src_a[a + i], src_b[b + i])` for `i < range.count`.
    pub fn perform(
        cmd: &mut CommandList,
        src_a: &BufferView,
        src_b: &BufferView,
        output: &BufferView,
        operation: BufferMathOperation,
        range: MathRange,
    ) {
        if range.count == 0 {
            return;
        }
        let params = MathParams {
            operation: operation.to_raw(),
            count: range.count,
            a_offset: range.a_offset,
            b_offset: range.b_offset,
            output_offset: range.output_offset,
            ..MathParams::default()
        };
        let bindings = Bindings::new()
            .buffer(binding::SRC_A, src_a.clone())
            .buffer(binding::SRC_B, src_b.clone())
            .buffer(binding::OUTPUT, output.clone())
            .constants(binding::PARAMS, &params);
        cmd.dispatch(
            ComputePipeline::new(MATH_OPERATION, bindings),
            range.count.div_ceil(GROUP_SIZE),
            1,
            1,
        );
    }

    /// `buffer[offset + i] = op(buffer[offset + i], value)` for `i < count`.
    pub fn perform_constant(
        cmd: &mut CommandList,
        buffer: &BufferView,
        operation: BufferMathOperation,
        count: u32,
        offset: u32,
        value: u32,
    ) {
        if count == 0 {
            return;
        }
        let params = MathParams {
            operation: operation.to_raw(),
            count,
            a_offset: offset,
            value,
            ..MathParams::default()
        };
        let bindings = Bindings::new()
            .buffer(binding::OUTPUT, buffer.clone())
            .constants(binding::PARAMS, &params);
        cmd.dispatch(
            ComputePipeline::new(MATH_OPERATION_CONSTANT, bindings),
            count.div_ceil(GROUP_SIZE),
            1,
            1,
        );
    }

    /// `output[0] = max(a[0] - b[0], 0)`.
    pub fn subtract(cmd: &mut CommandList, a: &BufferView, b: &BufferView, output: &BufferView) {
        Self::perform(
            cmd,
            a,
            b,
            output,
            BufferMathOperation::Subtraction,
            MathRange::SINGLE,
        );
    }

    /// Copy counter 0 of `src` into counter 0 of `dst`.
    pub fn copy_count(cmd: &mut CommandList, src: &BufferView, dst: &BufferView) {
        cmd.copy_buffer_region(src, 0, dst, 0, 4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Command;

    #[test]
    fn subtraction_saturates_and_division_by_zero_is_zero() {
        use BufferMathOperation::*;
        assert_eq!(Subtraction.apply(3, 5), 0);
        assert_eq!(Subtraction.apply(5, 3), 2);
        assert_eq!(Division.apply(9, 0), 0);
        assert_eq!(Division.apply(9, 2), 4);
        assert_eq!(Addition.apply(u32::MAX, 1), 0);
        assert_eq!(Set.apply(1, 8), 8);
        for op in [Addition, Subtraction, Division, Multiplication, Set] {
            assert_eq!(BufferMathOperation::from_raw(op.to_raw()), Some(op));
        }
        assert_eq!(BufferMathOperation::from_raw(9), None);
    }

    #[test]
    fn empty_ranges_record_nothing() {
        let mut cmd = CommandList::new("math");
        BufferMath::perform_constant(&mut cmd, &dummy_view(), BufferMathOperation::Set, 0, 0, 1);
        assert!(cmd.is_empty());
    }

    #[test]
    fn wide_ranges_cover_every_element() {
        let mut cmd = CommandList::new("math");
        let view = dummy_view();
        let range = MathRange {
            count: 130,
            ..MathRange::SINGLE
        };
        BufferMath::perform(&mut cmd, &view, &view, &view, BufferMathOperation::Addition, range);
        match &cmd.commands()[0] {
            Command::Dispatch { groups, pipeline } => {
                assert_eq!(groups, &[3, 1, 1]);
                assert_eq!(pipeline.program(), MATH_OPERATION);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn dummy_view() -> BufferView {
        use strata_core::{create_buffer, BufferDesc, BufferLayout, Format};
        let soft = strata_test_utils::SoftDevice::new();
        let buffer = create_buffer(
            &soft.as_device(),
            BufferDesc::new("x", BufferLayout::Format(Format::R32Uint), 1),
        )
        .unwrap();
        buffer.srv()
    }
}
