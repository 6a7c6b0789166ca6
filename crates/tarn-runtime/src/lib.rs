//! Tarn Runtime - embeddable script virtual machine
//!
//! This library provides a bytecode interpreter designed to live inside a
//! real-time host:
//! - Stack frames with out-parameter marshaling and destructor bookkeeping
//! - O(1) opcode dispatch tables with startup completeness diagnostics
//! - Runaway/recursion protection for interpreted code
//! - Structured fault broadcasting instead of host-level exceptions
//! - Callspace routing for replicated calls (local, remote, or both)
//!
//! The host owns all objects; the VM operates on opaque handles through the
//! [`object::ObjectModel`] trait.

/// Tarn runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod bytecode;
pub mod fault;
pub mod function;
pub mod object;
pub mod value;
pub mod vm;

// Re-export commonly used types
pub use bytecode::{BytecodeWriter, CastKind, Opcode};
pub use fault::{FaultChannel, FaultEvent, FaultKind, FaultSite, ObserverId};
pub use function::{
    ClassDescriptor, DescriptorError, FieldDescriptor, FunctionBuilder, FunctionDescriptor,
    FunctionFlags, NativeFn, ParamDescriptor, ParamFlags,
};
pub use object::{NullRemote, ObjectModel, RemoteSender};
pub use value::{ObjectId, Value, ValueKind};
pub use vm::{
    external_invoke, interpreter_invoke, invoke_by_name, Callspace, ExecContext, ExecEnv,
    ExecLimits, ExecResult, Frame, Machine, NetRole, ScriptError, StartupReport,
};
