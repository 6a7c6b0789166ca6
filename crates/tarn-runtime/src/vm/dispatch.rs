//! Opcode and primitive-cast dispatch tables
//!
//! Fixed-size function-pointer tables giving O(1) dispatch from an opcode
//! byte to its handler. Every slot starts at the unknown-opcode sentinel;
//! registration is first-writer-wins in the sense that a second registration
//! for the same slot is recorded as a duplicate (a build misconfiguration,
//! e.g. a plugin colliding with a core opcode) while the newest handler is
//! kept for availability. The startup report surfaces both duplicates and
//! defined-but-unregistered slots.

use crate::bytecode::{CastKind, Opcode, CAST_TABLE_SIZE, OPCODE_TABLE_SIZE};
use crate::fault::{FaultEvent, FaultKind};
use crate::value::{ObjectId, Value};
use crate::vm::handlers::op_undefined;
use crate::vm::{ExecEnv, ExecResult, Frame, ScriptError};
use std::fmt;

/// Handler for one opcode.
///
/// Receives the execution environment, the context object, the active frame
/// (cursor positioned just past the opcode byte), and an optional result
/// destination. A `None` destination means the expression is being evaluated
/// for its lvalue or side effects; the handler must still consume its
/// operands.
pub type OpcodeHandler =
    fn(&mut ExecEnv<'_>, ObjectId, &mut Frame, Option<&mut Value>) -> ExecResult<()>;

/// Handler for one primitive-cast kind; same shape as [`OpcodeHandler`].
pub type CastHandler = OpcodeHandler;

/// Opcode dispatch table.
pub struct DispatchTable {
    handlers: [OpcodeHandler; OPCODE_TABLE_SIZE],
    registered: [bool; OPCODE_TABLE_SIZE],
    duplicates: Vec<u8>,
}

impl DispatchTable {
    /// Every slot starts at the unknown-opcode sentinel, regardless of the
    /// order later registrations arrive in.
    pub fn new() -> Self {
        Self {
            handlers: [op_undefined as OpcodeHandler; OPCODE_TABLE_SIZE],
            registered: [false; OPCODE_TABLE_SIZE],
            duplicates: Vec::new(),
        }
    }

    /// Install a handler. A repeat registration for the same opcode keeps
    /// the newest handler and flags the conflict for startup diagnostics.
    pub fn register(&mut self, op: Opcode, handler: OpcodeHandler) {
        let index = op as usize;
        if self.registered[index] {
            self.duplicates.push(op as u8);
        }
        self.handlers[index] = handler;
        self.registered[index] = true;
    }

    /// Dispatch one opcode byte. Out-of-table bytes are rejected before
    /// indexing and reported exactly like an unregistered slot.
    pub fn dispatch(
        &self,
        byte: u8,
        env: &mut ExecEnv<'_>,
        object: ObjectId,
        frame: &mut Frame,
        dest: Option<&mut Value>,
    ) -> ExecResult<()> {
        if byte as usize >= OPCODE_TABLE_SIZE {
            let event = FaultEvent::new(
                FaultKind::UnknownOpcode,
                format!("opcode byte {byte:#04x} is outside the dispatch table"),
            );
            env.fault(object, frame, &event);
            return Err(ScriptError::UnknownOpcode {
                opcode: byte,
                offset: frame.last_offset(),
                function: frame.function_name().to_string(),
            });
        }
        (self.handlers[byte as usize])(env, object, frame, dest)
    }

    pub fn is_registered(&self, op: Opcode) -> bool {
        self.registered[op as usize]
    }

    /// Opcodes flagged as duplicate registrations, in registration order.
    pub fn duplicates(&self) -> &[u8] {
        &self.duplicates
    }

    /// Defined opcodes whose slot still holds the sentinel. Table bytes with
    /// no opcode assigned to them are intentionally unused and not reported.
    pub fn unregistered(&self) -> Vec<Opcode> {
        Opcode::all()
            .iter()
            .copied()
            .filter(|op| !self.registered[*op as usize])
            .collect()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("registered", &self.registered.iter().filter(|r| **r).count())
            .field("duplicates", &self.duplicates.len())
            .finish()
    }
}

/// Primitive-cast dispatch table; keyed by cast-kind byte.
pub struct CastTable {
    handlers: [CastHandler; CAST_TABLE_SIZE],
    registered: [bool; CAST_TABLE_SIZE],
    duplicates: Vec<u8>,
}

impl CastTable {
    pub fn new() -> Self {
        Self {
            handlers: [op_undefined as CastHandler; CAST_TABLE_SIZE],
            registered: [false; CAST_TABLE_SIZE],
            duplicates: Vec::new(),
        }
    }

    pub fn register(&mut self, kind: CastKind, handler: CastHandler) {
        let index = kind as usize;
        if self.registered[index] {
            self.duplicates.push(kind as u8);
        }
        self.handlers[index] = handler;
        self.registered[index] = true;
    }

    pub fn dispatch(
        &self,
        byte: u8,
        env: &mut ExecEnv<'_>,
        object: ObjectId,
        frame: &mut Frame,
        dest: Option<&mut Value>,
    ) -> ExecResult<()> {
        if byte as usize >= CAST_TABLE_SIZE {
            let event = FaultEvent::new(
                FaultKind::UnknownOpcode,
                format!("cast kind {byte:#04x} is outside the dispatch table"),
            );
            env.fault(object, frame, &event);
            return Err(ScriptError::UnknownOpcode {
                opcode: byte,
                offset: frame.last_offset(),
                function: frame.function_name().to_string(),
            });
        }
        (self.handlers[byte as usize])(env, object, frame, dest)
    }

    pub fn is_registered(&self, kind: CastKind) -> bool {
        self.registered[kind as usize]
    }

    pub fn duplicates(&self) -> &[u8] {
        &self.duplicates
    }

    pub fn unregistered(&self) -> Vec<CastKind> {
        CastKind::all()
            .iter()
            .copied()
            .filter(|kind| !self.registered[*kind as usize])
            .collect()
    }
}

impl Default for CastTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CastTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastTable")
            .field("registered", &self.registered.iter().filter(|r| **r).count())
            .field("duplicates", &self.duplicates.len())
            .finish()
    }
}
