//! Stack frame: the runtime record of one in-flight function call
//!
//! A frame owns the locals backing one invocation (parameters occupy the
//! slot prefix), the instruction cursor, the out-parameter bindings, and the
//! "most recently evaluated lvalue" cursor that assignment opcodes consult.
//! Frames are created by the invocation protocol, live on the Rust call
//! stack for the dynamic extent of the call, and are torn down when it
//! returns. Nothing about them is shared across invocations.

use crate::function::FunctionDescriptor;
use crate::value::{ObjectId, Value};
use crate::vm::{ExecEnv, ExecResult, ScriptError};
use smallvec::SmallVec;
use std::sync::Arc;

/// An addressable location produced by evaluating an expression for its
/// lvalue. Interpreted relative to the frame that evaluated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LValue {
    /// A local slot of the evaluating frame
    Local(u16),
    /// A field of a host object
    Field { object: ObjectId, field: u16 },
    /// Recovery target after an access violation; writes are discarded
    Scratch,
}

/// Destination of one out-parameter, applied at frame teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutDest {
    /// A local slot of the calling frame
    CallerLocal(u16),
    /// A field of a host object
    CallerField { object: ObjectId, field: u16 },
    /// A slot of the external parameter block
    External(u16),
    /// The caller's result destination; delivered by the return expression
    ReturnValue,
    /// No caller-supplied destination; the callee's own storage suffices
    Own,
}

/// Binding of one out-parameter: the callee slot it lives in during the
/// call, and where its final value goes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutParamRecord {
    pub slot: u16,
    pub dest: OutDest,
}

/// Default-initialized locals storage for a function, sized to its block.
pub fn locals_for(function: &FunctionDescriptor) -> Vec<Value> {
    (0..function.locals_slots())
        .map(|slot| function.slot_kind(slot).default_value())
        .collect()
}

/// One active invocation.
#[derive(Debug)]
pub struct Frame {
    object: ObjectId,
    function: Arc<FunctionDescriptor>,
    /// Byte offset into the bytecode; meaningless for natives
    cursor: usize,
    locals: Vec<Value>,
    out_params: SmallVec<[OutParamRecord; 4]>,
    /// Set by every sub-expression evaluation that produces an address
    pub most_recent_lvalue: Option<LValue>,
    flow_stack: Vec<u32>,
}

impl Frame {
    /// Create a frame over pre-sized locals storage.
    ///
    /// `locals` must already be sized to the function's locals block; the
    /// frame does not allocate it (see [`locals_for`]).
    pub fn new(
        object: ObjectId,
        function: Arc<FunctionDescriptor>,
        locals: Vec<Value>,
    ) -> ExecResult<Self> {
        if locals.len() != function.locals_slots() as usize {
            return Err(ScriptError::ParamBlockMismatch {
                function: function.name().to_string(),
                expected: function.locals_slots() as usize,
                actual: locals.len(),
            });
        }
        Ok(Self {
            object,
            function,
            cursor: 0,
            locals,
            out_params: SmallVec::new(),
            most_recent_lvalue: None,
            flow_stack: Vec::new(),
        })
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn function(&self) -> &FunctionDescriptor {
        &self.function
    }

    pub fn function_arc(&self) -> Arc<FunctionDescriptor> {
        Arc::clone(&self.function)
    }

    pub fn function_name(&self) -> &str {
        self.function.name()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Offset of the most recently read opcode byte, for diagnostics.
    pub fn last_offset(&self) -> usize {
        self.cursor.saturating_sub(1)
    }

    fn code(&self) -> &[u8] {
        self.function.code()
    }

    // -------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------

    /// Execute one opcode: read the opcode byte, advance the cursor, and
    /// dispatch to its handler.
    ///
    /// `object` is the context object handlers operate on (usually the
    /// frame's owner, but context opcodes substitute another object).
    /// A `None` destination evaluates the expression for its lvalue and
    /// side effects only; handlers still consume their operands.
    pub fn step(
        &mut self,
        env: &mut ExecEnv<'_>,
        object: ObjectId,
        dest: Option<&mut Value>,
    ) -> ExecResult<()> {
        env.ctx.tick();
        let byte = self.read_u8()?;
        env.ctx.record_opcode(byte);
        let machine = env.machine;
        machine.opcodes().dispatch(byte, env, object, self, dest)
    }

    // -------------------------------------------------------------------
    // Inline operand readers
    // -------------------------------------------------------------------

    fn overrun(&self) -> ScriptError {
        ScriptError::RanPastEnd {
            function: self.function.name().to_string(),
            offset: self.cursor,
        }
    }

    /// Opcode byte at the cursor, without advancing.
    pub fn peek_u8(&self) -> ExecResult<u8> {
        self.code().get(self.cursor).copied().ok_or_else(|| self.overrun())
    }

    pub fn read_u8(&mut self) -> ExecResult<u8> {
        let v = self.peek_u8()?;
        self.cursor += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> ExecResult<u16> {
        let end = self.cursor + 2;
        let bytes = self.code().get(self.cursor..end).ok_or_else(|| self.overrun())?;
        let v = u16::from_le_bytes([bytes[0], bytes[1]]);
        self.cursor = end;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> ExecResult<u32> {
        let end = self.cursor + 4;
        let bytes = self.code().get(self.cursor..end).ok_or_else(|| self.overrun())?;
        let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.cursor = end;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> ExecResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> ExecResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Local-slot or field-index operand.
    pub fn read_slot(&mut self) -> ExecResult<u16> {
        self.read_u16()
    }

    /// Absolute code-offset operand.
    pub fn read_code_offset(&mut self) -> ExecResult<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// Length-prefixed UTF-8 string operand.
    pub fn read_inline_string(&mut self) -> ExecResult<String> {
        let len = self.read_u16()? as usize;
        let end = self.cursor + len;
        let bytes = self.code().get(self.cursor..end).ok_or_else(|| self.overrun())?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| ScriptError::MalformedBytecode {
                function: self.function.name().to_string(),
                detail: format!("invalid UTF-8 in string operand at {:#06x}", self.cursor),
            })?
            .to_string();
        self.cursor = end;
        Ok(s)
    }

    /// Consume the next opcode byte, which must be `expected`.
    pub fn expect_opcode(&mut self, expected: crate::bytecode::Opcode) -> ExecResult<()> {
        let at = self.cursor;
        let byte = self.read_u8()?;
        if byte != expected as u8 {
            return Err(ScriptError::MalformedBytecode {
                function: self.function.name().to_string(),
                detail: format!(
                    "expected {} at {:#06x}, found {:#04x}",
                    expected.mnemonic(),
                    at,
                    byte
                ),
            });
        }
        Ok(())
    }

    /// Move the cursor to an absolute offset.
    pub fn jump_to(&mut self, offset: usize) -> ExecResult<()> {
        if offset >= self.code().len() {
            return Err(ScriptError::BadJump {
                function: self.function.name().to_string(),
                target: offset,
                len: self.code().len(),
            });
        }
        self.cursor = offset;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Locals
    // -------------------------------------------------------------------

    fn bad_slot(&self, slot: u16) -> ScriptError {
        ScriptError::BadSlot {
            function: self.function.name().to_string(),
            slot,
        }
    }

    pub fn local(&self, slot: u16) -> ExecResult<&Value> {
        self.locals.get(slot as usize).ok_or_else(|| self.bad_slot(slot))
    }

    pub fn local_mut(&mut self, slot: u16) -> ExecResult<&mut Value> {
        if slot as usize >= self.locals.len() {
            return Err(self.bad_slot(slot));
        }
        Ok(&mut self.locals[slot as usize])
    }

    pub fn set_local(&mut self, slot: u16, value: Value) -> ExecResult<()> {
        *self.local_mut(slot)? = value;
        Ok(())
    }

    /// Move a local out, leaving `Nothing` behind.
    pub fn take_local(&mut self, slot: u16) -> Value {
        self.locals
            .get_mut(slot as usize)
            .map(Value::take)
            .unwrap_or(Value::Nothing)
    }

    /// Destruct a local: reset it to `Nothing`, dropping any payload.
    pub fn destruct_local(&mut self, slot: u16) {
        if let Some(v) = self.locals.get_mut(slot as usize) {
            *v = Value::Nothing;
        }
    }

    pub fn locals(&self) -> &[Value] {
        &self.locals
    }

    // -------------------------------------------------------------------
    // Out-parameter records
    // -------------------------------------------------------------------

    /// Append an out-parameter binding. Insertion order is preserved so
    /// positional binding stays correct.
    pub fn record_out_param(&mut self, slot: u16, dest: OutDest) {
        self.out_params.push(OutParamRecord { slot, dest });
    }

    pub fn out_params(&self) -> &[OutParamRecord] {
        &self.out_params
    }

    /// Drain the out-parameter records for teardown.
    pub fn take_out_params(&mut self) -> SmallVec<[OutParamRecord; 4]> {
        std::mem::take(&mut self.out_params)
    }

    // -------------------------------------------------------------------
    // Execution-flow stack
    // -------------------------------------------------------------------

    pub fn push_flow(&mut self, offset: u32) {
        self.flow_stack.push(offset);
    }

    pub fn pop_flow(&mut self) -> Option<u32> {
        self.flow_stack.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionBuilder;
    use crate::value::ValueKind;

    fn script_fn(code: Vec<u8>) -> Arc<FunctionDescriptor> {
        FunctionBuilder::new("frame_test")
            .param("a", ValueKind::Int)
            .local(ValueKind::Str)
            .script(code)
            .build()
            .unwrap()
    }

    #[test]
    fn locals_default_by_kind() {
        let f = script_fn(vec![]);
        let locals = locals_for(&f);
        assert_eq!(locals, vec![Value::Int(0), Value::Str(Arc::new(String::new()))]);
    }

    #[test]
    fn new_rejects_mismatched_storage() {
        let f = script_fn(vec![]);
        let err = Frame::new(ObjectId(0), f, vec![]).unwrap_err();
        assert!(matches!(err, ScriptError::ParamBlockMismatch { .. }));
    }

    #[test]
    fn operand_reads_advance_the_cursor() {
        let f = script_fn(vec![0x07, 0x01, 0x02, 0xAA, 0xBB, 0xCC, 0xDD]);
        let mut frame = Frame::new(ObjectId(0), Arc::clone(&f), locals_for(&f)).unwrap();
        assert_eq!(frame.read_u8().unwrap(), 0x07);
        assert_eq!(frame.read_u16().unwrap(), 0x0201);
        assert_eq!(frame.read_u32().unwrap(), 0xDDCC_BBAA);
        assert_eq!(frame.cursor(), 7);
        assert!(matches!(
            frame.read_u8().unwrap_err(),
            ScriptError::RanPastEnd { .. }
        ));
    }

    #[test]
    fn jump_rejects_out_of_bounds() {
        let f = script_fn(vec![0x00, 0x00]);
        let mut frame = Frame::new(ObjectId(0), Arc::clone(&f), locals_for(&f)).unwrap();
        assert!(frame.jump_to(1).is_ok());
        assert!(matches!(
            frame.jump_to(2).unwrap_err(),
            ScriptError::BadJump { .. }
        ));
    }

    #[test]
    fn out_param_records_preserve_insertion_order() {
        let f = script_fn(vec![]);
        let mut frame = Frame::new(ObjectId(0), Arc::clone(&f), locals_for(&f)).unwrap();
        frame.record_out_param(1, OutDest::Own);
        frame.record_out_param(0, OutDest::CallerLocal(3));
        let recs = frame.take_out_params();
        assert_eq!(recs[0].slot, 1);
        assert_eq!(recs[1].slot, 0);
        assert!(frame.out_params().is_empty());
    }
}
