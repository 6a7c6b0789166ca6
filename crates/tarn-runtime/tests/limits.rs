//! Runaway/recursion protection tests: both ceilings trip deterministically,
//! abort only the current invocation, and leave the machine usable.

mod common;

use common::Rig;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tarn_runtime::bytecode::BytecodeWriter;
use tarn_runtime::fault::FaultKind;
use tarn_runtime::function::{ClassDescriptor, FunctionBuilder, FunctionDescriptor};
use tarn_runtime::vm::{ExecEnv, ExecLimits, ExecResult, Frame};
use tarn_runtime::{ObjectId, Opcode, Value, ValueKind};

fn native_inc(_env: &mut ExecEnv<'_>, _obj: ObjectId, frame: &mut Frame) -> ExecResult<Value> {
    Ok(Value::Int(frame.local(0)?.as_int().unwrap_or(0) + 1))
}

fn inc_fn() -> Arc<FunctionDescriptor> {
    FunctionBuilder::new("inc")
        .param("x", ValueKind::Int)
        .return_param(ValueKind::Int)
        .native(native_inc)
        .build()
        .unwrap()
}

/// spin() { count = inc(count); spin(); }: unbounded self-recursion that
/// bumps an object field once per body entered.
fn spin_class(inc_ref: u32) -> Arc<ClassDescriptor> {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Let)
        .op(Opcode::InstanceVariable)
        .slot(0)
        .op(Opcode::CallFinal)
        .u32(inc_ref)
        .op(Opcode::InstanceVariable)
        .slot(0)
        .op(Opcode::EndFunctionParms);
    w.op(Opcode::CallByName)
        .string("spin")
        .op(Opcode::EndFunctionParms);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let spin = FunctionBuilder::new("spin").script(w.finish()).build().unwrap();

    Arc::new(
        ClassDescriptor::new("Spinner")
            .with_field("count", ValueKind::Int)
            .with_function(spin),
    )
}

/// forever() { loop {} }: an unconditional backward jump, no recursion.
fn forever_fn() -> Arc<FunctionDescriptor> {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Jump).u32(0);
    w.op(Opcode::Return).op(Opcode::Nothing);
    FunctionBuilder::new("forever").script(w.finish()).build().unwrap()
}

fn noop_fn() -> Arc<FunctionDescriptor> {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Return).op(Opcode::Nothing);
    FunctionBuilder::new("noop").script(w.finish()).build().unwrap()
}

#[test]
fn recursion_ceiling_trips_at_exactly_the_configured_depth() {
    const CEILING: u32 = 5;
    let mut rig = Rig::with_limits(ExecLimits {
        recursion_ceiling: CEILING,
        runaway_ceiling: 1_000_000,
    });
    let inc_ref = rig.host.add_function_ref(inc_fn());
    let class = spin_class(inc_ref);
    let obj = rig.host.spawn(Arc::clone(&class));
    let faults = rig.record_faults();

    let spin = class.find_function("spin").unwrap();
    rig.invoke(obj, &spin, &mut []).unwrap();

    // Exactly `ceiling` bodies started executing; the next one aborted
    // before its first opcode.
    assert_eq!(rig.host.int_field(obj, 0), CEILING as i32);

    let recorded = faults.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, FaultKind::InfiniteLoop);
    assert!(recorded[0].1.contains("recursion"));
}

#[test]
fn runaway_ceiling_aborts_and_resets_the_budget() {
    let mut rig = Rig::with_limits(ExecLimits {
        recursion_ceiling: 250,
        runaway_ceiling: 200,
    });
    let forever = forever_fn();
    let noop = noop_fn();
    let class = Arc::new(
        ClassDescriptor::new("Loops")
            .with_function(Arc::clone(&forever))
            .with_function(Arc::clone(&noop)),
    );
    let obj = rig.host.spawn(class);
    let faults = rig.record_faults();

    rig.invoke(obj, &forever, &mut []).unwrap();

    {
        let recorded = faults.borrow();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, FaultKind::InfiniteLoop);
        assert!(recorded[0].1.contains("runaway"));
    }

    // The counter reset, so an unrelated top-level call runs cleanly.
    assert_eq!(rig.ctx.instructions_dispatched(), 0);
    rig.invoke(obj, &noop, &mut []).unwrap();
    assert_eq!(faults.borrow().len(), 1);
}

#[test]
fn ceiling_abort_zeroes_the_return_value() {
    // spin_ret() -> int { spin_ret(); return 3; }: every completed body
    // returns 3, but the aborted one must yield a zeroed value, and the
    // outermost call still completes with its own return expression.
    let mut w = BytecodeWriter::new();
    w.op(Opcode::CallByName)
        .string("spin_ret")
        .op(Opcode::EndFunctionParms);
    w.op(Opcode::Return).op(Opcode::IntConst).i32(3);
    let spin_ret = FunctionBuilder::new("spin_ret")
        .return_param(ValueKind::Int)
        .script(w.finish())
        .build()
        .unwrap();
    let class = Arc::new(ClassDescriptor::new("SpinRet").with_function(Arc::clone(&spin_ret)));

    let mut rig = Rig::with_limits(ExecLimits {
        recursion_ceiling: 4,
        runaway_ceiling: 1_000_000,
    });
    let obj = rig.host.spawn(class);
    let faults = rig.record_faults();

    let mut params = vec![Value::Int(-1)];
    rig.invoke(obj, &spin_ret, &mut params).unwrap();

    // The outermost body completed normally, so the external caller sees
    // its return expression, not the zeroed inner value.
    assert_eq!(params[0], Value::Int(3));
    assert_eq!(faults.borrow().len(), 1);
}

#[test]
fn counters_reset_for_host_tooling() {
    let mut rig = Rig::with_limits(ExecLimits {
        recursion_ceiling: 2,
        runaway_ceiling: 50,
    });
    let inc_ref = rig.host.add_function_ref(inc_fn());
    let class = spin_class(inc_ref);
    let obj = rig.host.spawn(Arc::clone(&class));

    let spin = class.find_function("spin").unwrap();
    rig.invoke(obj, &spin, &mut []).unwrap();
    assert!(rig.ctx.recursion_depth() > 0);

    rig.ctx.reset();
    assert_eq!(rig.ctx.recursion_depth(), 0);
    assert_eq!(rig.ctx.instructions_dispatched(), 0);
}
