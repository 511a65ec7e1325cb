use strata_core::{DispatchArgs, DispatchThread, KernelError, ThreadContext};

use super::load;
use crate::buffer_math::{BufferMathOperation, MathParams};
use crate::job::CreateArgsParams;
use crate::program::binding;

pub(super) fn create_dispatch_args(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    if thread.global != 0 {
        return Ok(());
    }
    let params: CreateArgsParams = ctx.constants(binding::PARAMS)?;
    let count: u32 = load(ctx, binding::COUNT, u64::from(params.count_offset))?;
    ctx.store(binding::ARGS, 0, &DispatchArgs::for_threads(count, params.group_size))
}

pub(super) fn math_operation(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let params: MathParams = ctx.constants(binding::PARAMS)?;
    if thread.global >= params.count {
        return Ok(());
    }
    let Some(operation) = BufferMathOperation::from_raw(params.operation) else {
        return Ok(());
    };
    let i = u64::from(thread.global);
    let a: u32 = load(ctx, binding::SRC_A, u64::from(params.a_offset) + i)?;
    let b: u32 = load(ctx, binding::SRC_B, u64::from(params.b_offset) + i)?;
    ctx.store(
        binding::OUTPUT,
        u64::from(params.output_offset) + i,
        &operation.apply(a, b),
    )
}

pub(super) fn math_operation_constant(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let params: MathParams = ctx.constants(binding::PARAMS)?;
    if thread.global >= params.count {
        return Ok(());
    }
    let Some(operation) = BufferMathOperation::from_raw(params.operation) else {
        return Ok(());
    };
    let i = u64::from(params.a_offset) + u64::from(thread.global);
    let a: u32 = load(ctx, binding::OUTPUT, i)?;
    ctx.store(binding::OUTPUT, i, &operation.apply(a, params.value))
}
