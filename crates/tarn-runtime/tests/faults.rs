//! Fault-channel integration tests: dispatch completeness, null-dereference
//! recovery, informational trace events, and fatal error reporting.

mod common;

use common::Rig;
use pretty_assertions::assert_eq;
use std::rc::Rc;
use std::sync::Arc;
use tarn_runtime::bytecode::BytecodeWriter;
use tarn_runtime::fault::{FaultEvent, FaultKind};
use tarn_runtime::function::{ClassDescriptor, FunctionBuilder, FunctionDescriptor};
use tarn_runtime::{Machine, Opcode, ScriptError, Value, ValueKind};
use tarn_config::VmConfig;

fn class_with(function: Arc<FunctionDescriptor>) -> Arc<ClassDescriptor> {
    Arc::new(
        ClassDescriptor::new("Faulty")
            .with_field("health", ValueKind::Int)
            .with_function(function),
    )
}

#[test]
fn startup_reports_a_fully_populated_dispatch_table() {
    let machine = Machine::new();
    let report = machine.startup_report();
    assert!(report.is_clean(), "{report:?}");
    assert!(report.unregistered_opcodes.is_empty());
    assert!(report.unregistered_casts.is_empty());
}

#[test]
fn unknown_opcode_is_fatal_and_broadcast() {
    let mut w = BytecodeWriter::new();
    w.raw(0x0F); // not a defined opcode
    w.op(Opcode::Return).op(Opcode::Nothing);
    let junk = FunctionBuilder::new("junk").script(w.finish()).build().unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&junk)));
    let faults = rig.record_faults();

    let err = rig.invoke(obj, &junk, &mut []).unwrap_err();
    assert!(matches!(err, ScriptError::UnknownOpcode { opcode: 0x0F, .. }));

    let recorded = faults.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, FaultKind::UnknownOpcode);
}

#[test]
fn null_context_recovers_with_one_access_violation() {
    // guarded() { (<null>).health = 7; } compiled as a context expression
    // wrapping the assignment; the null object skips the whole assignment.
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Context);
    let hole = w.placeholder_u32();
    w.op(Opcode::NoObject); // the object expression evaluates to null
    w.op(Opcode::Let)
        .op(Opcode::InstanceVariable)
        .slot(0)
        .op(Opcode::IntConst)
        .i32(7);
    let resume = w.here();
    w.patch_u32(hole, resume);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let guarded = FunctionBuilder::new("guarded").script(w.finish()).build().unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&guarded)));
    let faults = rig.record_faults();

    // The invocation completes; the write never lands.
    rig.invoke(obj, &guarded, &mut []).unwrap();
    assert_eq!(rig.host.int_field(obj, 0), 0);

    let recorded = faults.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, FaultKind::AccessViolation);
}

#[test]
fn fail_silent_context_raises_no_fault() {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::ContextFailSilent);
    let hole = w.placeholder_u32();
    w.op(Opcode::NoObject);
    w.op(Opcode::InstanceVariable).slot(0);
    let resume = w.here();
    w.patch_u32(hole, resume);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let quiet = FunctionBuilder::new("quiet").script(w.finish()).build().unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&quiet)));
    let faults = rig.record_faults();

    rig.invoke(obj, &quiet, &mut []).unwrap();
    assert!(faults.borrow().is_empty());
}

#[test]
fn unaddressable_assignment_target_recovers_with_scratch() {
    // bad_let() { <nothing> = 5; }: the lvalue expression produces no
    // address; the write is discarded and execution continues.
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Let).op(Opcode::Nothing).op(Opcode::IntConst).i32(5);
    w.op(Opcode::Let)
        .op(Opcode::InstanceVariable)
        .slot(0)
        .op(Opcode::IntConst)
        .i32(3);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let bad_let = FunctionBuilder::new("bad_let").script(w.finish()).build().unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&bad_let)));
    let faults = rig.record_faults();

    rig.invoke(obj, &bad_let, &mut []).unwrap();
    // The second assignment still ran.
    assert_eq!(rig.host.int_field(obj, 0), 3);

    let recorded = faults.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, FaultKind::AccessViolation);
}

#[test]
fn trace_opcodes_are_informational_only() {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Breakpoint)
        .op(Opcode::Tracepoint)
        .op(Opcode::WireTracepoint);
    w.op(Opcode::Return).op(Opcode::IntConst).i32(11);
    let traced = FunctionBuilder::new("traced")
        .return_param(ValueKind::Int)
        .script(w.finish())
        .build()
        .unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&traced)));
    let faults = rig.record_faults();

    let mut params = vec![Value::Nothing];
    rig.invoke(obj, &traced, &mut params).unwrap();

    // Execution was not halted by the trace events.
    assert_eq!(params[0], Value::Int(11));
    let kinds: Vec<FaultKind> = faults.borrow().iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            FaultKind::Breakpoint,
            FaultKind::Tracepoint,
            FaultKind::WireTracepoint
        ]
    );
}

#[test]
fn trace_events_can_be_disabled_by_config() {
    let config = VmConfig::from_toml_str("[tooling]\ntrace_events = false\n").unwrap();
    let mut rig = Rig::with_config(&config);

    let mut w = BytecodeWriter::new();
    w.op(Opcode::Breakpoint);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let traced = FunctionBuilder::new("traced").script(w.finish()).build().unwrap();
    let obj = rig.host.spawn(class_with(Arc::clone(&traced)));
    let faults = rig.record_faults();

    rig.invoke(obj, &traced, &mut []).unwrap();
    assert!(faults.borrow().is_empty());
}

#[test]
fn executing_the_end_marker_is_fatal() {
    // A body that is nothing but the end-of-script sentinel: the loop never
    // sees a return opcode and executes the sentinel itself.
    let w = BytecodeWriter::new();
    let broken = FunctionBuilder::new("broken").script(w.finish()).build().unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&broken)));
    let faults = rig.record_faults();

    let err = rig.invoke(obj, &broken, &mut []).unwrap_err();
    assert!(matches!(err, ScriptError::RanPastEnd { .. }));

    let recorded = faults.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, FaultKind::FatalError);
}

#[test]
fn fatal_assert_abandons_the_invocation() {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Assert).u16(12).u8(1).op(Opcode::False);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let checked = FunctionBuilder::new("checked").script(w.finish()).build().unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&checked)));
    let faults = rig.record_faults();

    let err = rig.invoke(obj, &checked, &mut []).unwrap_err();
    assert!(matches!(err, ScriptError::Fatal { .. }));

    let recorded = faults.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, FaultKind::FatalError);
    assert!(recorded[0].1.contains("line 12"));
}

#[test]
fn non_fatal_assert_continues() {
    let mut w = BytecodeWriter::new();
    w.op(Opcode::Assert).u16(3).u8(0).op(Opcode::False);
    w.op(Opcode::Return).op(Opcode::IntConst).i32(1);
    let soft = FunctionBuilder::new("soft")
        .return_param(ValueKind::Int)
        .script(w.finish())
        .build()
        .unwrap();

    let mut rig = Rig::new();
    let obj = rig.host.spawn(class_with(Arc::clone(&soft)));
    let faults = rig.record_faults();

    let mut params = vec![Value::Nothing];
    rig.invoke(obj, &soft, &mut params).unwrap();
    assert_eq!(params[0], Value::Int(1));
    assert!(faults.borrow().is_empty());
}

#[test]
fn unregistered_observer_no_longer_receives_events() {
    let mut rig = Rig::new();
    let hits = Rc::new(std::cell::RefCell::new(0u32));
    let sink = Rc::clone(&hits);
    let id = rig
        .machine
        .register_fault_observer(Rc::new(move |_, _| *sink.borrow_mut() += 1));

    let mut w = BytecodeWriter::new();
    w.op(Opcode::Breakpoint);
    w.op(Opcode::Return).op(Opcode::Nothing);
    let traced = FunctionBuilder::new("traced").script(w.finish()).build().unwrap();
    let obj = rig.host.spawn(class_with(Arc::clone(&traced)));

    rig.invoke(obj, &traced, &mut []).unwrap();
    assert_eq!(*hits.borrow(), 1);

    assert!(rig.machine.unregister_fault_observer(id));
    rig.invoke(obj, &traced, &mut []).unwrap();
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn fault_events_serialize_for_transport() {
    let event = FaultEvent::new(FaultKind::AccessViolation, "accessed a null object");
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "access_violation");
    assert_eq!(json["message"], "accessed a null object");

    let back: FaultEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}
