//! Function invocation protocol
//!
//! The single choke point through which every call passes, in two shapes:
//!
//! - [`external_invoke`]: engine-driven. The caller supplies a packed
//!   parameter block; out-parameters and the return value are written back
//!   into it in place.
//! - [`interpreter_invoke`]: script-driven. The caller is another frame
//!   mid-execution, and each parameter expression is evaluated out of the
//!   caller's bytecode stream exactly once.
//!
//! Parameter binding, callspace routing, out-parameter bookkeeping, and the
//! destructor pass all live here so the interpreter loop and the opcode
//! handlers never duplicate them.

use crate::bytecode::Opcode;
use crate::fault::{FaultEvent, FaultKind};
use crate::function::{FunctionBody, FunctionDescriptor};
use crate::value::{ObjectId, Value};
use crate::vm::callspace::route;
use crate::vm::frame::{locals_for, LValue, OutDest};
use crate::vm::interp::{clear_return_value, process_script};
use crate::vm::{ExecEnv, ExecResult, Frame, ScriptError, TraceEntry};
use std::sync::Arc;

/// Invoke `function` on `object` with a packed parameter block.
///
/// `params` must hold exactly the function's parameter slots, already
/// populated with input values. On return, out-parameter slots and the
/// return slot of `params` hold the values the function produced.
///
/// Calling while dev tooling has execution paused is a recoverable no-op;
/// calling on an object marked for destruction is an error.
pub fn external_invoke(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    function: &Arc<FunctionDescriptor>,
    params: &mut [Value],
) -> ExecResult<()> {
    if env.ctx.tool_paused {
        log::debug!(
            "dropping call to '{}': script execution is paused",
            function.name()
        );
        return Ok(());
    }
    if env.host.is_pending_destroy(object) {
        return Err(ScriptError::DestroyedObject {
            function: function.name().to_string(),
            object: env.host.object_name(object),
        });
    }
    if params.len() != function.params_slots() as usize {
        return Err(ScriptError::ParamBlockMismatch {
            function: function.name().to_string(),
            expected: function.params_slots() as usize,
            actual: params.len(),
        });
    }

    // Natives route here; interpreted bodies route inside the interpreter
    // loop so script-driven calls classify exactly once.
    if function.is_native() {
        let callspace = route(env.machine, &*env.host, function, object);
        if callspace.is_remote() {
            env.remote.call_remote(function, object, params);
        }
        if !callspace.is_local() {
            return Ok(());
        }
    } else if function.code().is_empty() {
        // Empty non-native body: a no-op that still zeroes its return slot.
        if let Some(ret) = function.return_param() {
            params[ret.slot as usize] = ret.kind.default_value();
        }
        return Ok(());
    }

    // Scratch locals: the parameter block fills the prefix, the remainder
    // is default-initialized.
    let mut locals = locals_for(function);
    for (slot, value) in params.iter().enumerate() {
        locals[slot] = value.clone();
    }
    let mut frame = Frame::new(object, Arc::clone(function), locals)?;

    // Out-parameters write back into the external block so side effects are
    // visible to the caller.
    for param in function.params() {
        if param.is_out() && !param.is_return() {
            frame.record_out_param(param.slot, OutDest::External(param.slot));
        }
    }

    for (slot, value) in function.first_to_init() {
        frame.set_local(*slot, value.clone())?;
    }

    let ret_slot = function.return_param().map(|p| p.slot as usize);

    let call_result = match function.body() {
        FunctionBody::Native(native) => {
            let object_label = env.host.object_name(object);
            env.ctx.push_frame(TraceEntry {
                function: function.name_arc(),
                object: object_label,
            });
            env.ctx.record_native_call(function.name());
            let result = native(env, object, &mut frame);
            env.ctx.pop_frame();
            result.map(|ret| {
                if let Some(slot) = ret_slot {
                    params[slot] = ret;
                }
            })
        }
        FunctionBody::Script(_) => match ret_slot {
            Some(slot) => process_script(env, &mut frame, Some(&mut params[slot])),
            None => process_script(env, &mut frame, None),
        },
    };

    // Tear the frame down even when the body failed, so refcounted values
    // in scratch storage are released before the error propagates.
    teardown_external(function, &mut frame, params);
    if let Err(err) = &call_result {
        log::error!("abandoning invocation of '{}': {}", function.name(), err);
    }
    call_result
}

/// Teardown for an external invocation: publish out-parameters into the
/// external block, sync destructor-linked value parameters back, and
/// destruct scratch-only locals.
fn teardown_external(function: &FunctionDescriptor, frame: &mut Frame, params: &mut [Value]) {
    for record in frame.take_out_params() {
        if let OutDest::External(slot) = record.dest {
            params[slot as usize] = frame.take_local(record.slot);
        }
    }
    let params_slots = function.params_slots();
    for slot in function.destructor_slots() {
        if slot >= params_slots {
            frame.destruct_local(slot);
        } else if !function.param_by_slot(slot).is_some_and(|p| p.is_out()) {
            // In/out-by-value sync: the callee's current value replaces the
            // caller's copy so the caller destroys the right instance.
            params[slot as usize] = frame.take_local(slot);
        }
    }
}

/// Invoke `function` from within `caller`'s bytecode, evaluating parameter
/// expressions out of the caller's stream.
///
/// Used exclusively by the call opcodes. `dest` receives the return value
/// (or its kind default when the call does not execute locally).
pub fn interpreter_invoke(
    env: &mut ExecEnv<'_>,
    caller: &mut Frame,
    object: ObjectId,
    function: Arc<FunctionDescriptor>,
    mut dest: Option<&mut Value>,
) -> ExecResult<()> {
    let mut callee = Frame::new(object, Arc::clone(&function), locals_for(&function))?;

    // Evaluate the parameter stream exactly once, whatever the callspace
    // decides below: expressions may have side effects and the packed
    // block is reused for both the remote send and the local call.
    bind_params(env, caller, &mut callee, &function)?;

    let body_result = if function.is_native() {
        let callspace = route(env.machine, &*env.host, &function, object);
        if callspace.is_remote() {
            let params = &callee.locals()[..function.params_slots() as usize];
            env.remote.call_remote(&function, object, params);
        }
        if callspace.is_local() {
            let native = match function.body() {
                FunctionBody::Native(native) => *native,
                FunctionBody::Script(_) => unreachable!("native flag with script body"),
            };
            let object_label = env.host.object_name(object);
            env.ctx.push_frame(TraceEntry {
                function: function.name_arc(),
                object: object_label,
            });
            env.ctx.record_native_call(function.name());
            let result = native(env, object, &mut callee);
            env.ctx.pop_frame();
            result.map(|ret| {
                if let Some(d) = dest.take() {
                    *d = ret;
                }
            })
        } else {
            // Absorbed or remote-only: the stream is already consumed, the
            // caller just sees a zeroed result.
            clear_return_value(&function, dest.take());
            Ok(())
        }
    } else {
        for (slot, value) in function.first_to_init() {
            callee.set_local(*slot, value.clone())?;
        }
        process_script(env, &mut callee, dest)
    };

    writeback_out_params(env, caller, &mut callee);
    destruct_non_out(&function, &mut callee);
    body_result
}

/// Resolve `name` on the object's class and invoke it with a packed block.
pub fn invoke_by_name(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    name: &str,
    params: &mut [Value],
) -> ExecResult<()> {
    let function = env.host.class_of(object).find_function(name).ok_or_else(|| {
        ScriptError::UnknownFunction {
            function: name.to_string(),
            object: env.host.object_name(object),
        }
    })?;
    external_invoke(env, object, &function, params)
}

/// Bind one call's parameters from the caller's bytecode stream into the
/// callee frame.
///
/// The return parameter is bound first, since it can appear anywhere in
/// parameter order. Out-parameters are evaluated as lvalues and recorded
/// with the address that evaluation produced, falling back to the callee's
/// own storage when there is none (optional out-parameters). By-value
/// parameters are evaluated directly into their callee slots. Trailing
/// optional parameters with no argument keep their defaults.
fn bind_params(
    env: &mut ExecEnv<'_>,
    caller: &mut Frame,
    callee: &mut Frame,
    function: &FunctionDescriptor,
) -> ExecResult<()> {
    let caller_object = caller.object();

    if let Some(ret) = function.return_param() {
        callee.record_out_param(ret.slot, OutDest::ReturnValue);
    }

    for param in function.params() {
        if param.is_return() {
            continue;
        }
        if caller.peek_u8()? == Opcode::EndFunctionParms as u8 {
            break;
        }
        if param.is_out() {
            caller.most_recent_lvalue = None;
            caller.step(env, caller_object, None)?;
            let dest = match caller.most_recent_lvalue.take() {
                Some(LValue::Local(slot)) => {
                    // Copy the current value in so reads through the
                    // out-parameter observe caller state.
                    callee.set_local(param.slot, caller.local(slot)?.clone())?;
                    OutDest::CallerLocal(slot)
                }
                Some(LValue::Field { object, field }) => {
                    callee.set_local(param.slot, env.host.field(object, field))?;
                    OutDest::CallerField { object, field }
                }
                Some(LValue::Scratch) | None => OutDest::Own,
            };
            callee.record_out_param(param.slot, dest);
        } else {
            caller.step(env, caller_object, Some(callee.local_mut(param.slot)?))?;
        }
    }

    caller.expect_opcode(Opcode::EndFunctionParms)
}

/// Publish out-parameter values to their destinations at teardown.
fn writeback_out_params(env: &mut ExecEnv<'_>, caller: &mut Frame, callee: &mut Frame) {
    for record in callee.take_out_params() {
        match record.dest {
            OutDest::CallerLocal(slot) => {
                let value = callee.take_local(record.slot);
                let _ = caller.set_local(slot, value);
            }
            OutDest::CallerField { object, field } => {
                let value = callee.take_local(record.slot);
                env.host.set_field(object, field, value);
            }
            // The return value was delivered by the return expression; Own
            // records never had a caller destination; External records
            // belong to external invocations and are handled there.
            OutDest::ReturnValue | OutDest::Own | OutDest::External(_) => {}
        }
    }
}

/// Destruct every non-out destructor-linked slot in the callee's locals.
fn destruct_non_out(function: &FunctionDescriptor, callee: &mut Frame) {
    for slot in function.destructor_slots() {
        let is_out = function.param_by_slot(slot).is_some_and(|p| p.is_out());
        if !is_out {
            callee.destruct_local(slot);
        }
    }
}

/// Report an unresolvable assignment target and hand back the scratch
/// lvalue so execution can continue without corrupting unrelated memory.
pub(crate) fn recover_null_lvalue(
    env: &mut ExecEnv<'_>,
    object: ObjectId,
    frame: &Frame,
    detail: &str,
) -> LValue {
    let event = FaultEvent::new(FaultKind::AccessViolation, detail);
    env.fault(object, frame, &event);
    LValue::Scratch
}
