//! Function and class descriptors
//!
//! Descriptors are the read-only, long-lived half of the data model: they are
//! owned by the host's class registry and shared into frames via `Arc`.
//! A function is either native (a Rust fn pointer) or interpreted (an
//! immutable bytecode sequence); both use the same parameter descriptors.

use crate::value::{Value, ValueKind};
use crate::vm::{ExecEnv, ExecResult, Frame};
use crate::ObjectId;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

bitflags! {
    /// Behavior flags for a function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u16 {
        /// Implemented by a native fn pointer rather than bytecode
        const NATIVE = 1 << 0;
        /// At least one parameter is an out or return parameter
        const HAS_OUT_PARMS = 1 << 1;
        /// Participates in callspace routing
        const NET = 1 << 2;
        /// Executes on the server (client sends it there)
        const NET_SERVER = 1 << 3;
        /// Executes on the owning client (server sends it there)
        const NET_CLIENT = 1 << 4;
        /// Executes on the server and every client
        const NET_MULTICAST = 1 << 5;
    }
}

bitflags! {
    /// Flags on a single parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        /// Callee writes back into caller-owned storage
        const OUT = 1 << 0;
        /// The (single) return parameter; implies OUT
        const RETURN = 1 << 1;
        /// May be omitted by the caller
        const OPTIONAL = 1 << 2;
    }
}

/// One parameter of a function, in calling-convention order.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: Arc<str>,
    /// Slot index within the frame's locals (parameters occupy the prefix)
    pub slot: u16,
    pub kind: ValueKind,
    pub flags: ParamFlags,
}

impl ParamDescriptor {
    pub fn is_out(&self) -> bool {
        self.flags.contains(ParamFlags::OUT)
    }

    pub fn is_return(&self) -> bool {
        self.flags.contains(ParamFlags::RETURN)
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(ParamFlags::OPTIONAL)
    }
}

/// Signature of a native function implementation.
///
/// Parameters arrive pre-bound in the frame's locals; the return value is the
/// function's result. Out-parameters are written back through the frame's
/// out-param records by the invocation protocol after the call.
pub type NativeFn = fn(&mut ExecEnv<'_>, ObjectId, &mut Frame) -> ExecResult<Value>;

/// The executable body of a function.
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    Script(Arc<[u8]>),
}

/// Errors raised while building a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("function '{function}' declares more than one return parameter")]
    MultipleReturnParams { function: String },

    #[error("function '{function}' has no body")]
    MissingBody { function: String },

    #[error("function '{function}' declares a parameter after a local")]
    ParamAfterLocal { function: String },

    #[error("function '{function}' carries the NATIVE flag but has a script body")]
    NativeFlagOnScript { function: String },
}

/// Immutable description of a callable function.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    name: Arc<str>,
    flags: FunctionFlags,
    params: Vec<ParamDescriptor>,
    /// Kind of every local slot; parameters occupy the prefix
    slot_kinds: Vec<ValueKind>,
    params_slots: u16,
    /// Locals requiring a non-default initial value, applied after binding
    first_to_init: Vec<(u16, Value)>,
    body: FunctionBody,
}

impl FunctionDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    pub fn is_native(&self) -> bool {
        self.flags.contains(FunctionFlags::NATIVE)
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// Number of parameter slots (prefix of the locals block).
    pub fn params_slots(&self) -> u16 {
        self.params_slots
    }

    /// Total number of local slots, parameters included.
    pub fn locals_slots(&self) -> u16 {
        self.slot_kinds.len() as u16
    }

    pub fn slot_kind(&self, slot: u16) -> ValueKind {
        self.slot_kinds
            .get(slot as usize)
            .copied()
            .unwrap_or(ValueKind::Nothing)
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    /// Bytecode of an interpreted function; empty for natives.
    pub fn code(&self) -> &[u8] {
        match &self.body {
            FunctionBody::Script(code) => code,
            FunctionBody::Native(_) => &[],
        }
    }

    /// The single return parameter, wherever it appears in parameter order.
    pub fn return_param(&self) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.is_return())
    }

    pub fn param_by_slot(&self, slot: u16) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.slot == slot)
    }

    /// Slots whose kind requires explicit cleanup at frame teardown.
    pub fn destructor_slots(&self) -> impl Iterator<Item = u16> + '_ {
        self.slot_kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| kind.needs_destructor())
            .map(|(slot, _)| slot as u16)
    }

    pub fn first_to_init(&self) -> &[(u16, Value)] {
        &self.first_to_init
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Builder for [`FunctionDescriptor`].
///
/// Slots are assigned sequentially: parameters in declaration order, then
/// locals. Out and return parameters automatically set `HAS_OUT_PARMS`.
pub struct FunctionBuilder {
    name: Arc<str>,
    flags: FunctionFlags,
    params: Vec<ParamDescriptor>,
    slot_kinds: Vec<ValueKind>,
    first_to_init: Vec<(u16, Value)>,
    body: Option<FunctionBody>,
}

impl FunctionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            flags: FunctionFlags::empty(),
            params: Vec::new(),
            slot_kinds: Vec::new(),
            first_to_init: Vec::new(),
            body: None,
        }
    }

    pub fn flags(mut self, flags: FunctionFlags) -> Self {
        self.flags |= flags;
        self
    }

    fn push_param(&mut self, name: &str, kind: ValueKind, flags: ParamFlags) {
        let slot = self.slot_kinds.len() as u16;
        self.slot_kinds.push(kind);
        self.params.push(ParamDescriptor {
            name: Arc::from(name),
            slot,
            kind,
            flags,
        });
        if flags.intersects(ParamFlags::OUT | ParamFlags::RETURN) {
            self.flags |= FunctionFlags::HAS_OUT_PARMS;
        }
    }

    /// By-value parameter.
    pub fn param(mut self, name: &str, kind: ValueKind) -> Self {
        self.push_param(name, kind, ParamFlags::empty());
        self
    }

    /// Out parameter (callee writes back into caller storage).
    pub fn out_param(mut self, name: &str, kind: ValueKind) -> Self {
        self.push_param(name, kind, ParamFlags::OUT);
        self
    }

    /// Optional out parameter; falls back to callee-local storage when the
    /// caller supplies no addressable argument.
    pub fn optional_out_param(mut self, name: &str, kind: ValueKind) -> Self {
        self.push_param(name, kind, ParamFlags::OUT | ParamFlags::OPTIONAL);
        self
    }

    /// The return parameter. May be declared at any position.
    pub fn return_param(mut self, kind: ValueKind) -> Self {
        self.push_param("return", kind, ParamFlags::OUT | ParamFlags::RETURN);
        self
    }

    /// Non-parameter local slot.
    pub fn local(mut self, kind: ValueKind) -> Self {
        self.slot_kinds.push(kind);
        self
    }

    /// Local slot with a non-default initial value.
    pub fn local_init(mut self, value: Value) -> Self {
        let slot = self.slot_kinds.len() as u16;
        self.slot_kinds.push(value.kind());
        self.first_to_init.push((slot, value));
        self
    }

    pub fn native(mut self, f: NativeFn) -> Self {
        self.body = Some(FunctionBody::Native(f));
        self.flags |= FunctionFlags::NATIVE;
        self
    }

    pub fn script(mut self, code: Vec<u8>) -> Self {
        self.body = Some(FunctionBody::Script(Arc::from(code)));
        self
    }

    pub fn build(self) -> Result<Arc<FunctionDescriptor>, DescriptorError> {
        let returns = self.params.iter().filter(|p| p.is_return()).count();
        if returns > 1 {
            return Err(DescriptorError::MultipleReturnParams {
                function: self.name.to_string(),
            });
        }
        let body = self.body.ok_or_else(|| DescriptorError::MissingBody {
            function: self.name.to_string(),
        })?;
        let params_slots = self.params.len() as u16;
        // Parameters must occupy the slot prefix in declaration order.
        if self.params.iter().enumerate().any(|(i, p)| p.slot != i as u16) {
            return Err(DescriptorError::ParamAfterLocal {
                function: self.name.to_string(),
            });
        }
        if self.flags.contains(FunctionFlags::NATIVE) && matches!(body, FunctionBody::Script(_)) {
            return Err(DescriptorError::NativeFlagOnScript {
                function: self.name.to_string(),
            });
        }
        Ok(Arc::new(FunctionDescriptor {
            name: self.name,
            flags: self.flags,
            params: self.params,
            slot_kinds: self.slot_kinds,
            params_slots,
            first_to_init: self.first_to_init,
            body,
        }))
    }
}

/// One field of a class, addressed by stable index.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: Arc<str>,
    pub index: u16,
    pub kind: ValueKind,
}

/// Immutable description of a host class: its fields and callable functions.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: Arc<str>,
    fields: Vec<FieldDescriptor>,
    functions: Vec<Arc<FunctionDescriptor>>,
}

impl ClassDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            fields: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_field(mut self, name: &str, kind: ValueKind) -> Self {
        let index = self.fields.len() as u16;
        self.fields.push(FieldDescriptor {
            name: Arc::from(name),
            index,
            kind,
        });
        self
    }

    pub fn with_function(mut self, function: Arc<FunctionDescriptor>) -> Self {
        self.functions.push(function);
        self
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, index: u16) -> Option<&FieldDescriptor> {
        self.fields.get(index as usize)
    }

    /// Late-bound function lookup, as used by by-name call opcodes.
    pub fn find_function(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.functions
            .iter()
            .find(|f| f.name() == name)
            .map(Arc::clone)
    }
}
