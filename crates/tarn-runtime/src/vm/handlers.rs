//! Core opcode and cast handlers
//!
//! Each handler is a plain `fn` taking the execution environment, the
//! context object, the active frame, and an optional result destination, so
//! handlers can be registered in any order and unit-tested in isolation.
//! The cursor sits just past the opcode byte on entry; handlers consume
//! their inline operands and any operand expressions.

use crate::bytecode::{CastKind, Opcode};
use crate::fault::{FaultEvent, FaultKind};
use crate::value::{ObjectId, Value};
use crate::vm::dispatch::{CastTable, DispatchTable};
use crate::vm::frame::LValue;
use crate::vm::invoke::{interpreter_invoke, recover_null_lvalue};
use crate::vm::{ExecEnv, ExecResult, Frame, ScriptError};

/// Install the core instruction set and primitive casts.
pub fn register_core(opcodes: &mut DispatchTable, casts: &mut CastTable) {
    opcodes.register(Opcode::LocalVariable, op_local_variable);
    opcodes.register(Opcode::InstanceVariable, op_instance_variable);
    opcodes.register(Opcode::LocalOutVariable, op_local_out_variable);
    opcodes.register(Opcode::Let, op_let);
    opcodes.register(Opcode::LetObj, op_let_obj);
    opcodes.register(Opcode::Jump, op_jump);
    opcodes.register(Opcode::JumpIfNot, op_jump_if_not);
    opcodes.register(Opcode::ComputedJump, op_computed_jump);
    opcodes.register(Opcode::PushFlow, op_push_flow);
    opcodes.register(Opcode::PopFlow, op_pop_flow);
    opcodes.register(Opcode::PopFlowIfNot, op_pop_flow_if_not);
    opcodes.register(Opcode::Assert, op_assert);
    opcodes.register(Opcode::Self_, op_self);
    opcodes.register(Opcode::Context, op_context);
    opcodes.register(Opcode::ContextFailSilent, op_context_fail_silent);
    opcodes.register(Opcode::CallByName, op_call_by_name);
    opcodes.register(Opcode::CallFinal, op_call_final);
    opcodes.register(Opcode::IntConst, op_int_const);
    opcodes.register(Opcode::FloatConst, op_float_const);
    opcodes.register(Opcode::ByteConst, op_byte_const);
    opcodes.register(Opcode::IntZero, op_int_zero);
    opcodes.register(Opcode::IntOne, op_int_one);
    opcodes.register(Opcode::True, op_true);
    opcodes.register(Opcode::False, op_false);
    opcodes.register(Opcode::StringConst, op_string_const);
    opcodes.register(Opcode::NameConst, op_name_const);
    opcodes.register(Opcode::ObjectConst, op_object_const);
    opcodes.register(Opcode::NoObject, op_no_object);
    opcodes.register(Opcode::SkipOffsetConst, op_skip_offset_const);
    opcodes.register(Opcode::PrimitiveCast, op_primitive_cast);
    opcodes.register(Opcode::Return, op_return);
    opcodes.register(Opcode::EndFunctionParms, op_end_function_parms);
    opcodes.register(Opcode::Nothing, op_nothing);
    opcodes.register(Opcode::EndOfScript, op_end_of_script);
    opcodes.register(Opcode::Breakpoint, op_breakpoint);
    opcodes.register(Opcode::Tracepoint, op_tracepoint);
    opcodes.register(Opcode::WireTracepoint, op_wire_tracepoint);

    casts.register(CastKind::IntToFloat, cast_int_to_float);
    casts.register(CastKind::FloatToInt, cast_float_to_int);
    casts.register(CastKind::IntToBool, cast_int_to_bool);
    casts.register(CastKind::BoolToInt, cast_bool_to_int);
    casts.register(CastKind::ObjectToBool, cast_object_to_bool);
    casts.register(CastKind::IntToStr, cast_int_to_str);
    casts.register(CastKind::FloatToStr, cast_float_to_str);
}

/// Sentinel for unregistered dispatch slots.
pub fn op_undefined(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let offset = frame.last_offset();
    let opcode = frame.function().code().get(offset).copied().unwrap_or(0);
    let event = FaultEvent::new(
        FaultKind::UnknownOpcode,
        format!("unknown opcode {opcode:#04x}"),
    );
    env.fault(object, frame, &event);
    Err(ScriptError::UnknownOpcode {
        opcode,
        offset,
        function: frame.function_name().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

pub fn op_local_variable(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let slot = frame.read_slot()?;
    frame.most_recent_lvalue = Some(LValue::Local(slot));
    if let Some(d) = dest {
        *d = frame.local(slot)?.clone();
    }
    Ok(())
}

pub fn op_instance_variable(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let field = frame.read_slot()?;
    frame.most_recent_lvalue = Some(LValue::Field { object, field });
    if let Some(d) = dest {
        *d = env.host.field(object, field);
    }
    Ok(())
}

/// Out-parameter read. The slot holds the copied-in caller value during the
/// call; writes propagate to the caller at teardown through the frame's
/// out-param record for this slot.
pub fn op_local_out_variable(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let slot = frame.read_slot()?;
    debug_assert!(
        frame
            .function()
            .param_by_slot(slot)
            .is_some_and(|p| p.is_out()),
        "LocalOutVariable on a non-out slot"
    );
    frame.most_recent_lvalue = Some(LValue::Local(slot));
    if let Some(d) = dest {
        *d = frame.local(slot)?.clone();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

fn write_lvalue(
    env: &mut ExecEnv<'_>,
    frame: &mut Frame,
    lvalue: &LValue,
    value: Value,
) -> ExecResult<()> {
    match lvalue {
        LValue::Local(slot) => frame.set_local(*slot, value),
        LValue::Field { object, field } => {
            env.host.set_field(*object, *field, value);
            Ok(())
        }
        LValue::Scratch => Ok(()),
    }
}

pub fn op_let(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    frame.most_recent_lvalue = None;
    frame.step(env, object, None)?; // evaluate the assignment target
    let lvalue = match frame.most_recent_lvalue.take() {
        Some(lv) => lv,
        None => recover_null_lvalue(
            env,
            object,
            frame,
            "attempt to assign variable through a null reference",
        ),
    };
    let mut value = Value::Nothing;
    frame.step(env, object, Some(&mut value))?;
    write_lvalue(env, frame, &lvalue, value)
}

pub fn op_let_obj(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    frame.most_recent_lvalue = None;
    frame.step(env, object, None)?;
    let lvalue = match frame.most_recent_lvalue.take() {
        Some(lv) => lv,
        None => recover_null_lvalue(
            env,
            object,
            frame,
            "attempt to assign object variable through a null reference",
        ),
    };
    let mut value = Value::Nothing;
    frame.step(env, object, Some(&mut value))?;
    write_lvalue(env, frame, &lvalue, Value::Obj(value.as_object()))
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

pub fn op_jump(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let target = frame.read_code_offset()?;
    checked_jump(env, object, frame, target)
}

pub fn op_jump_if_not(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let target = frame.read_code_offset()?;
    let mut condition = Value::Nothing;
    frame.step(env, object, Some(&mut condition))?;
    if !condition.truthy() {
        checked_jump(env, object, frame, target)?;
    }
    Ok(())
}

pub fn op_computed_jump(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let mut offset = Value::Nothing;
    frame.step(env, object, Some(&mut offset))?;
    let target = offset.as_int().unwrap_or(-1);
    if target < 0 {
        let event = FaultEvent::new(
            FaultKind::FatalError,
            format!("computed jump to invalid offset {target}"),
        );
        env.fault(object, frame, &event);
        return Err(ScriptError::BadJump {
            function: frame.function_name().to_string(),
            target: target as usize,
            len: frame.function().code().len(),
        });
    }
    checked_jump(env, object, frame, target as usize)
}

fn checked_jump(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    target: usize,
) -> ExecResult<()> {
    frame.jump_to(target).map_err(|err| {
        let event = FaultEvent::new(FaultKind::FatalError, err.to_string());
        env.fault(object, frame, &event);
        err
    })
}

pub fn op_push_flow(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let offset = frame.read_u32()?;
    frame.push_flow(offset);
    Ok(())
}

pub fn op_pop_flow(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    pop_flow_and_jump(env, object, frame)
}

pub fn op_pop_flow_if_not(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let mut condition = Value::Nothing;
    frame.step(env, object, Some(&mut condition))?;
    if !condition.truthy() {
        pop_flow_and_jump(env, object, frame)?;
    }
    Ok(())
}

fn pop_flow_and_jump(env: &mut ExecEnv<'_>, object: ObjectId, frame: &mut Frame) -> ExecResult<()> {
    match frame.pop_flow() {
        Some(offset) => checked_jump(env, object, frame, offset as usize),
        None => {
            log::warn!("{}", env.ctx.stack_trace());
            let event =
                FaultEvent::new(FaultKind::FatalError, "tried to pop from an empty flow stack");
            env.fault(object, frame, &event);
            Err(ScriptError::Fatal {
                function: frame.function_name().to_string(),
                detail: "tried to pop from an empty flow stack".to_string(),
            })
        }
    }
}

pub fn op_assert(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let line = frame.read_u16()?;
    let fatal = frame.read_u8()? != 0;
    let mut condition = Value::Nothing;
    frame.step(env, object, Some(&mut condition))?;
    if !condition.truthy() {
        log::warn!("{}", env.ctx.stack_trace());
        if fatal {
            let detail = format!("assertion failed, line {line}");
            let event = FaultEvent::new(FaultKind::FatalError, detail.clone());
            env.fault(object, frame, &event);
            return Err(ScriptError::Fatal {
                function: frame.function_name().to_string(),
                detail,
            });
        }
        log::warn!(
            "assertion failed, line {} in '{}'",
            line,
            frame.function_name()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Context & calls
// ---------------------------------------------------------------------------

pub fn op_self(
    _env: &mut ExecEnv<'_>,
    object: ObjectId,
    _frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    if let Some(d) = dest {
        *d = Value::obj(object);
    }
    Ok(())
}

fn context_impl(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
    fail_silent: bool,
) -> ExecResult<()> {
    let skip = frame.read_code_offset()?;
    let mut target = Value::Nothing;
    frame.step(env, object, Some(&mut target))?;

    match target.as_object() {
        Some(context) if !env.host.is_pending_destroy(context) => {
            // Run the sub-expression against the context object.
            frame.step(env, context, dest)
        }
        _ => {
            if !fail_silent {
                let event = FaultEvent::new(FaultKind::AccessViolation, "accessed a null object");
                env.fault(object, frame, &event);
            }
            frame.most_recent_lvalue = None;
            if let Some(d) = dest {
                *d = Value::Nothing;
            }
            checked_jump(env, object, frame, skip)
        }
    }
}

pub fn op_context(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    context_impl(env, object, frame, dest, false)
}

pub fn op_context_fail_silent(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    context_impl(env, object, frame, dest, true)
}

pub fn op_call_by_name(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let name = frame.read_inline_string()?;
    let function = env
        .host
        .class_of(object)
        .find_function(&name)
        .ok_or_else(|| ScriptError::UnknownFunction {
            function: name.clone(),
            object: env.host.object_name(object),
        })?;
    interpreter_invoke(env, frame, object, function, dest)
}

pub fn op_call_final(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let reference = frame.read_u32()?;
    let function = env
        .host
        .function_ref(reference)
        .ok_or(ScriptError::UnknownFunctionRef { reference })?;
    interpreter_invoke(env, frame, object, function, dest)
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub fn op_int_const(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = frame.read_i32()?;
    if let Some(d) = dest {
        *d = Value::Int(v);
    }
    Ok(())
}

pub fn op_float_const(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = frame.read_f32()?;
    if let Some(d) = dest {
        *d = Value::Float(v);
    }
    Ok(())
}

pub fn op_byte_const(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = frame.read_u8()?;
    if let Some(d) = dest {
        *d = Value::Int(v as i32);
    }
    Ok(())
}

pub fn op_int_zero(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    if let Some(d) = dest {
        *d = Value::Int(0);
    }
    Ok(())
}

pub fn op_int_one(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    if let Some(d) = dest {
        *d = Value::Int(1);
    }
    Ok(())
}

pub fn op_true(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    if let Some(d) = dest {
        *d = Value::Bool(true);
    }
    Ok(())
}

pub fn op_false(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    if let Some(d) = dest {
        *d = Value::Bool(false);
    }
    Ok(())
}

pub fn op_string_const(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let s = frame.read_inline_string()?;
    if let Some(d) = dest {
        *d = Value::str(s);
    }
    Ok(())
}

pub fn op_name_const(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let s = frame.read_inline_string()?;
    if let Some(d) = dest {
        *d = Value::name(&s);
    }
    Ok(())
}

pub fn op_object_const(
    env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let reference = frame.read_u32()?;
    let resolved = env.host.object_ref(reference);
    if let Some(d) = dest {
        *d = Value::Obj(resolved);
    }
    Ok(())
}

pub fn op_no_object(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    if let Some(d) = dest {
        *d = Value::NO_OBJECT;
    }
    Ok(())
}

pub fn op_skip_offset_const(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let offset = frame.read_u32()?;
    if let Some(d) = dest {
        *d = Value::Int(offset as i32);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Casts
// ---------------------------------------------------------------------------

pub fn op_primitive_cast(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let kind = frame.read_u8()?;
    let machine = env.machine;
    machine.casts().dispatch(kind, env, object, frame, dest)
}

fn eval_operand(env: &mut ExecEnv<'_>, object: ObjectId, frame: &mut Frame) -> ExecResult<Value> {
    let mut value = Value::Nothing;
    frame.step(env, object, Some(&mut value))?;
    Ok(value)
}

pub fn cast_int_to_float(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::Float(v.as_int().unwrap_or(0) as f32);
    }
    Ok(())
}

pub fn cast_float_to_int(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::Int(v.as_float().unwrap_or(0.0) as i32);
    }
    Ok(())
}

pub fn cast_int_to_bool(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::Bool(v.as_int().unwrap_or(0) != 0);
    }
    Ok(())
}

pub fn cast_bool_to_int(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::Int(v.as_bool().unwrap_or(false) as i32);
    }
    Ok(())
}

pub fn cast_object_to_bool(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::Bool(v.as_object().is_some());
    }
    Ok(())
}

pub fn cast_int_to_str(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::str(v.as_int().unwrap_or(0).to_string());
    }
    Ok(())
}

pub fn cast_float_to_str(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    dest: Option<&mut Value>,
) -> ExecResult<()> {
    let v = eval_operand(env, object, frame)?;
    if let Some(d) = dest {
        *d = Value::str(v.as_float().unwrap_or(0.0).to_string());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// The interpreter loop consumes the return opcode itself; dispatching it
/// means the stream is malformed (e.g. a bare Return inside an expression).
pub fn op_return(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    Err(ScriptError::MalformedBytecode {
        function: frame.function_name().to_string(),
        detail: format!(
            "return opcode in expression position at {:#06x}",
            frame.last_offset()
        ),
    })
}

/// Parameter binding consumes this marker; as an expression it is a no-op.
pub fn op_end_function_parms(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    Ok(())
}

pub fn op_nothing(
    _env: &mut ExecEnv<'_>,
    _object: ObjectId,
    _frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    Ok(())
}

/// Executing the end-of-script sentinel means control ran past the return
/// opcode: a bytecode/loader integrity bug, not a recoverable condition.
pub fn op_end_of_script(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    let event = FaultEvent::new(
        FaultKind::FatalError,
        format!("execution beyond end of script in '{}'", frame.function_name()),
    );
    env.fault(object, frame, &event);
    Err(ScriptError::RanPastEnd {
        function: frame.function_name().to_string(),
        offset: frame.last_offset(),
    })
}

// ---------------------------------------------------------------------------
// Development
// ---------------------------------------------------------------------------

pub fn op_breakpoint(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    if env.machine.trace_events() {
        env.fault(object, frame, &FaultEvent::breakpoint());
    }
    Ok(())
}

pub fn op_tracepoint(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    if env.machine.trace_events() {
        env.fault(object, frame, &FaultEvent::tracepoint());
    }
    Ok(())
}

pub fn op_wire_tracepoint(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &mut Frame,
    _dest: Option<&mut Value>,
) -> ExecResult<()> {
    if env.machine.trace_events() {
        env.fault(object, frame, &FaultEvent::wire_tracepoint());
    }
    Ok(())
}
