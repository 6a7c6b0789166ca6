//! Property tests: writer-emitted streams validate cleanly and values
//! survive the full external-invocation round trip.

mod common;

use common::Rig;
use proptest::prelude::*;
use std::sync::Arc;
use tarn_runtime::bytecode::{validate, BytecodeWriter};
use tarn_runtime::function::{ClassDescriptor, FunctionBuilder};
use tarn_runtime::{Opcode, Value, ValueKind};

proptest! {
    #[test]
    fn int_constants_round_trip(v in any::<i32>()) {
        let mut w = BytecodeWriter::new();
        w.op(Opcode::Return).op(Opcode::IntConst).i32(v);
        let f = FunctionBuilder::new("const_int")
            .return_param(ValueKind::Int)
            .script(w.finish())
            .build()
            .unwrap();
        prop_assert!(validate(&f).is_ok());

        let mut rig = Rig::new();
        let class = Arc::new(ClassDescriptor::new("Props").with_function(Arc::clone(&f)));
        let obj = rig.host.spawn(class);
        let mut params = vec![Value::Nothing];
        rig.invoke(obj, &f, &mut params).unwrap();
        prop_assert_eq!(params[0].clone(), Value::Int(v));
    }

    #[test]
    fn parameters_pass_through_unchanged(v in any::<i32>()) {
        let mut w = BytecodeWriter::new();
        w.op(Opcode::Return).op(Opcode::LocalVariable).slot(0);
        let f = FunctionBuilder::new("identity")
            .param("x", ValueKind::Int)
            .return_param(ValueKind::Int)
            .script(w.finish())
            .build()
            .unwrap();

        let mut rig = Rig::new();
        let class = Arc::new(ClassDescriptor::new("Props").with_function(Arc::clone(&f)));
        let obj = rig.host.spawn(class);
        let mut params = vec![Value::Int(v), Value::Nothing];
        rig.invoke(obj, &f, &mut params).unwrap();
        prop_assert_eq!(params[1].clone(), Value::Int(v));
    }

    #[test]
    fn string_constants_round_trip(s in "[a-zA-Z0-9 ]{0,40}") {
        let mut w = BytecodeWriter::new();
        w.op(Opcode::Return).op(Opcode::StringConst).string(&s);
        let f = FunctionBuilder::new("const_str")
            .return_param(ValueKind::Str)
            .script(w.finish())
            .build()
            .unwrap();
        prop_assert!(validate(&f).is_ok());

        let mut rig = Rig::new();
        let class = Arc::new(ClassDescriptor::new("Props").with_function(Arc::clone(&f)));
        let obj = rig.host.spawn(class);
        let mut params = vec![Value::Nothing];
        rig.invoke(obj, &f, &mut params).unwrap();
        prop_assert_eq!(params[0].clone(), Value::str(s));
    }
}
