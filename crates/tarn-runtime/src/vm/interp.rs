//! Bytecode interpreter loop
//!
//! Drives one interpreted function body to completion or to a detected
//! fault. The loop steps opcodes until the return opcode, then evaluates
//! the return expression into the caller-visible result slot.
//!
//! Two independent counters protect the host from a runaway script:
//! - the recursion counter trips on unbounded interpreted-to-interpreted
//!   call depth, checked once on entry;
//! - the runaway instruction counter trips on a single body looping
//!   forever, checked before every opcode.
//!
//! A trip aborts only the current invocation: the return slot is zeroed, an
//! `InfiniteLoop` fault is broadcast, and the caller continues normally.

use crate::bytecode::Opcode;
use crate::fault::{FaultEvent, FaultKind};
use crate::function::FunctionDescriptor;
use crate::value::Value;
use crate::vm::callspace::{route, Callspace};
use crate::vm::{ExecEnv, ExecResult, Frame, TraceEntry};

/// Zero/default-construct the return slot, if the function has one.
pub(crate) fn clear_return_value(function: &FunctionDescriptor, dest: Option<&mut Value>) {
    if let Some(d) = dest {
        *d = function
            .return_param()
            .map(|p| p.kind.default_value())
            .unwrap_or(Value::Nothing);
    }
}

/// Execute an interpreted function body in `frame`, writing the final result
/// to `dest`.
///
/// Routes through the callspace first: a remote component sends the already
/// bound parameter block, and without a local component the body is skipped
/// with a zeroed return slot.
pub fn process_script(
    env: &mut ExecEnv<'_>,
    frame: &mut Frame,
    mut dest: Option<&mut Value>,
) -> ExecResult<()> {
    env.ctx.assert_single_thread();

    let function = frame.function_arc();
    let callspace = route(env.machine, &*env.host, &function, frame.object());

    if callspace.contains(Callspace::REMOTE) {
        let params = &frame.locals()[..function.params_slots() as usize];
        env.remote.call_remote(&function, frame.object(), params);
    }

    if !callspace.contains(Callspace::LOCAL) {
        clear_return_value(&function, dest);
        return Ok(());
    }

    // An empty non-native body is a no-op that still zeroes its return slot.
    if function.code().is_empty() {
        clear_return_value(&function, dest);
        return Ok(());
    }

    if !env.ctx.enter_call() {
        let ceiling = env.ctx.limits().recursion_ceiling;
        log::warn!("{}", env.ctx.stack_trace());
        clear_return_value(&function, dest);
        let event = FaultEvent::new(
            FaultKind::InfiniteLoop,
            format!("infinite script recursion ({ceiling} calls) detected"),
        );
        env.fault(frame.object(), frame, &event);
        return Ok(());
    }

    let object_label = env.host.object_name(frame.object());
    env.ctx.push_frame(TraceEntry {
        function: function.name_arc(),
        object: object_label,
    });

    let outcome = execute_body(env, frame, &function, &mut dest);

    env.ctx.pop_frame();

    match outcome {
        Ok(completed) => {
            if completed {
                env.ctx.exit_call();
            }
            // A ceiling trip leaves the recursion counter raised so the
            // whole chain unwinds quickly; host tooling resets it.
            Ok(())
        }
        // Fatal errors broadcast at their origin site and unwind here.
        Err(err) => Err(err),
    }
}

/// Run the opcode loop. Returns Ok(true) on normal completion, Ok(false)
/// when the runaway ceiling aborted the invocation.
fn execute_body(
    env: &mut ExecEnv<'_>,
    frame: &mut Frame,
    function: &FunctionDescriptor,
    dest: &mut Option<&mut Value>,
) -> ExecResult<bool> {
    let object = frame.object();
    let mut scratch = Value::Nothing;

    while frame.peek_u8()? != Opcode::Return as u8 {
        if env.ctx.runaway_tripped() {
            let ceiling = env.ctx.limits().runaway_ceiling;
            log::warn!("{}", env.ctx.stack_trace());
            clear_return_value(function, dest.take());
            let event = FaultEvent::new(
                FaultKind::InfiniteLoop,
                format!("runaway loop detected (over {ceiling} iterations)"),
            );
            env.fault(object, frame, &event);
            env.ctx.reset_runaway();
            return Ok(false);
        }
        frame.step(env, object, Some(&mut scratch))?;
    }

    // Step over the return opcode and evaluate the result expression.
    frame.read_u8()?;
    frame.step(env, object, dest.take())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::BytecodeWriter;
    use crate::function::FunctionBuilder;
    use crate::object::NullRemote;
    use crate::value::{ObjectId, ValueKind};
    use crate::vm::{locals_for, Machine, ScriptError};
    use crate::ClassDescriptor;
    use std::sync::Arc;

    struct BareHost;

    impl crate::object::ObjectModel for BareHost {
        fn class_of(&self, _object: ObjectId) -> Arc<ClassDescriptor> {
            Arc::new(ClassDescriptor::new("Bare"))
        }

        fn object_name(&self, object: ObjectId) -> String {
            object.to_string()
        }

        fn field(&self, _object: ObjectId, _field: u16) -> Value {
            Value::Nothing
        }

        fn set_field(&mut self, _object: ObjectId, _field: u16, _value: Value) {}
    }

    #[test]
    fn empty_body_zeroes_the_return_slot() {
        let function = FunctionBuilder::new("empty")
            .return_param(ValueKind::Int)
            .script(vec![])
            .build()
            .unwrap();
        let machine = Machine::new();
        let mut host = BareHost;
        let mut remote = NullRemote;
        let mut ctx = machine.new_context();
        let mut env = ExecEnv {
            machine: &machine,
            host: &mut host,
            remote: &mut remote,
            ctx: &mut ctx,
        };
        let mut frame =
            Frame::new(ObjectId(0), Arc::clone(&function), locals_for(&function)).unwrap();
        let mut result = Value::Int(99);
        process_script(&mut env, &mut frame, Some(&mut result)).unwrap();
        assert_eq!(result, Value::Int(0));
    }

    #[test]
    fn return_expression_lands_in_dest() {
        let mut w = BytecodeWriter::new();
        w.op(Opcode::Return).op(Opcode::IntConst).i32(17);
        let function = FunctionBuilder::new("seventeen")
            .return_param(ValueKind::Int)
            .script(w.finish())
            .build()
            .unwrap();
        let machine = Machine::new();
        let mut host = BareHost;
        let mut remote = NullRemote;
        let mut ctx = machine.new_context();
        let mut env = ExecEnv {
            machine: &machine,
            host: &mut host,
            remote: &mut remote,
            ctx: &mut ctx,
        };
        let mut frame =
            Frame::new(ObjectId(0), Arc::clone(&function), locals_for(&function)).unwrap();
        let mut result = Value::Nothing;
        process_script(&mut env, &mut frame, Some(&mut result)).unwrap();
        assert_eq!(result, Value::Int(17));
    }

    #[test]
    fn missing_end_marker_is_fatal() {
        // A body that is only a Nothing opcode: the loop peeks past it and
        // runs off the end instead of finding Return.
        let function = FunctionBuilder::new("truncated")
            .script(vec![Opcode::Nothing as u8])
            .build()
            .unwrap();
        let machine = Machine::new();
        let mut host = BareHost;
        let mut remote = NullRemote;
        let mut ctx = machine.new_context();
        let mut env = ExecEnv {
            machine: &machine,
            host: &mut host,
            remote: &mut remote,
            ctx: &mut ctx,
        };
        let mut frame =
            Frame::new(ObjectId(0), Arc::clone(&function), locals_for(&function)).unwrap();
        let err = process_script(&mut env, &mut frame, None).unwrap_err();
        assert!(matches!(err, ScriptError::RanPastEnd { .. }));
    }
}
