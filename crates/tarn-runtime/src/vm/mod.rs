//! The script virtual machine
//!
//! Executes compiled bytecode against host-owned object instances.
//! - `Machine` holds the immutable dispatch tables and the fault channel
//! - `ExecContext` carries the per-call-chain safety counters
//! - `Frame` is the record of one in-flight invocation
//! - `invoke` is the single choke point for external and script-driven calls
//!
//! The machine is single-threaded cooperative within one call chain: no
//! suspension points, no blocking, no internal locking. Thread safety is
//! "one `ExecContext` per thread/call chain"; the dispatch tables are
//! immutable after construction and safely shareable.

pub mod callspace;
pub mod dispatch;
pub mod frame;
pub mod handlers;
pub mod interp;
pub mod invoke;
pub mod profiler;

pub use callspace::{classify, Callspace, NetRole};
pub use dispatch::{CastTable, DispatchTable, OpcodeHandler};
pub use frame::{locals_for, Frame, LValue, OutDest, OutParamRecord};
pub use invoke::{external_invoke, interpreter_invoke, invoke_by_name};
pub use profiler::Profiler;

use crate::bytecode::{CastKind, Opcode};
use crate::fault::{FaultChannel, FaultEvent, FaultObserver, FaultSite, ObserverId};
use crate::object::{ObjectModel, RemoteSender};
use crate::value::ObjectId;
use std::fmt;
use std::sync::Arc;
use tarn_config::{LimitsConfig, NetRoleConfig, VmConfig};
use thiserror::Error;

/// Unrecoverable execution failures.
///
/// Everything here abandons the invocation; recoverable conditions (access
/// violations, ceiling trips) never surface as errors; they are broadcast
/// on the fault channel and execution continues with zeroed values.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("unknown opcode {opcode:#04x} at {offset:#06x} in '{function}'")]
    UnknownOpcode {
        opcode: u8,
        offset: usize,
        function: String,
    },

    #[error("execution beyond end of bytecode in '{function}' at {offset:#06x}")]
    RanPastEnd { function: String, offset: usize },

    #[error("jump target {target:#06x} out of bounds in '{function}' (len {len})")]
    BadJump {
        function: String,
        target: usize,
        len: usize,
    },

    #[error("malformed bytecode in '{function}': {detail}")]
    MalformedBytecode { function: String, detail: String },

    #[error("local slot {slot} out of range in '{function}'")]
    BadSlot { function: String, slot: u16 },

    #[error("function '{function}' not found on {object}")]
    UnknownFunction { function: String, object: String },

    #[error("unresolved function reference {reference:#010x}")]
    UnknownFunctionRef { reference: u32 },

    #[error("cannot invoke '{function}': {object} is pending destroy")]
    DestroyedObject { function: String, object: String },

    #[error("storage size mismatch for '{function}': expected {expected}, got {actual}")]
    ParamBlockMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("fatal script error in '{function}': {detail}")]
    Fatal { function: String, detail: String },
}

/// Result type for VM execution paths.
pub type ExecResult<T> = Result<T, ScriptError>;

/// Safety ceilings bounding one call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Maximum interpreted call depth
    pub recursion_ceiling: u32,
    /// Maximum opcodes dispatched before the current invocation is aborted
    pub runaway_ceiling: u64,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            recursion_ceiling: tarn_config::vm::DEFAULT_RECURSION_CEILING,
            runaway_ceiling: tarn_config::vm::DEFAULT_RUNAWAY_CEILING,
        }
    }
}

impl From<&LimitsConfig> for ExecLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            recursion_ceiling: config.recursion_ceiling,
            runaway_ceiling: config.runaway_ceiling,
        }
    }
}

/// One entry of the diagnostic call stack.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub function: Arc<str>,
    pub object: String,
}

/// Per-call-chain execution state: the recursion and runaway counters, the
/// diagnostic call stack, and tooling toggles.
///
/// One context per thread/call chain; never shared. Host tooling resets the
/// counters at safe points (e.g. when a fresh top-level invocation begins
/// under a debugger).
#[derive(Debug)]
pub struct ExecContext {
    limits: ExecLimits,
    recursion: u32,
    runaway: u64,
    call_stack: Vec<TraceEntry>,
    /// While set, external invocations return without side effects
    pub tool_paused: bool,
    profiler: Option<Profiler>,
    #[cfg(debug_assertions)]
    thread: std::thread::ThreadId,
}

impl ExecContext {
    pub fn new(limits: ExecLimits) -> Self {
        Self {
            limits,
            recursion: 0,
            runaway: 0,
            call_stack: Vec::new(),
            tool_paused: false,
            profiler: None,
            #[cfg(debug_assertions)]
            thread: std::thread::current().id(),
        }
    }

    pub fn limits(&self) -> ExecLimits {
        self.limits
    }

    /// Reset both counters. Called by host tooling at safe points.
    pub fn reset(&mut self) {
        self.recursion = 0;
        self.runaway = 0;
    }

    /// Current interpreted call depth.
    pub fn recursion_depth(&self) -> u32 {
        self.recursion
    }

    /// Opcodes dispatched since the last reset.
    pub fn instructions_dispatched(&self) -> u64 {
        self.runaway
    }

    /// Enter an interpreted body. Returns false when the recursion ceiling
    /// is exceeded; the counter stays incremented until [`reset`](Self::reset)
    /// so the whole runaway chain unwinds quickly.
    pub(crate) fn enter_call(&mut self) -> bool {
        self.recursion += 1;
        self.recursion <= self.limits.recursion_ceiling
    }

    /// Leave an interpreted body that completed normally.
    pub(crate) fn exit_call(&mut self) {
        self.recursion = self.recursion.saturating_sub(1);
    }

    /// Account one dispatched opcode.
    pub(crate) fn tick(&mut self) {
        self.runaway += 1;
    }

    pub(crate) fn runaway_tripped(&self) -> bool {
        self.runaway > self.limits.runaway_ceiling
    }

    /// Give subsequent top-level invocations a fresh instruction budget.
    pub(crate) fn reset_runaway(&mut self) {
        self.runaway = 0;
    }

    pub(crate) fn push_frame(&mut self, entry: TraceEntry) {
        self.call_stack.push(entry);
    }

    pub(crate) fn pop_frame(&mut self) {
        self.call_stack.pop();
    }

    /// Human-readable call stack, outermost frame first.
    pub fn stack_trace(&self) -> String {
        let mut out = String::from("Script call stack:\n");
        for entry in &self.call_stack {
            out.push_str(&format!("\t{} on {}\n", entry.function, entry.object));
        }
        out
    }

    /// Enable per-opcode execution profiling.
    pub fn enable_profiling(&mut self) {
        self.profiler = Some(Profiler::enabled());
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    pub(crate) fn record_opcode(&mut self, byte: u8) {
        if let Some(p) = &mut self.profiler {
            p.record_opcode(byte);
        }
    }

    pub(crate) fn record_native_call(&mut self, function: &str) {
        if let Some(p) = &mut self.profiler {
            p.record_native_call(function);
        }
    }

    /// Object field memory is mutated without locks; the host must drive a
    /// given context from a single thread.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_single_thread(&self) {
        debug_assert_eq!(
            self.thread,
            std::thread::current().id(),
            "ExecContext used from a different thread than it was created on"
        );
    }

    #[cfg(not(debug_assertions))]
    pub(crate) fn assert_single_thread(&self) {}
}

/// Startup diagnostics for the dispatch tables.
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    pub duplicate_opcodes: Vec<u8>,
    pub duplicate_casts: Vec<u8>,
    pub unregistered_opcodes: Vec<Opcode>,
    pub unregistered_casts: Vec<CastKind>,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_opcodes.is_empty()
            && self.duplicate_casts.is_empty()
            && self.unregistered_opcodes.is_empty()
            && self.unregistered_casts.is_empty()
    }

    /// Surface problems through the ambient log. Conditions here are build
    /// misconfigurations, not runtime faults, so startup proceeds.
    pub fn log(&self) {
        for byte in &self.duplicate_opcodes {
            log::warn!("duplicate opcode handler registration for {byte:#04x}");
        }
        for byte in &self.duplicate_casts {
            log::warn!("duplicate cast handler registration for {byte:#04x}");
        }
        for op in &self.unregistered_opcodes {
            log::warn!("opcode {} has no registered handler", op.mnemonic());
        }
        for kind in &self.unregistered_casts {
            log::warn!("cast {} has no registered handler", kind.mnemonic());
        }
    }
}

/// Process-wide interpreter state: dispatch tables, fault channel, network
/// role. Immutable during execution; construct once, share per thread.
pub struct Machine {
    opcodes: DispatchTable,
    casts: CastTable,
    faults: FaultChannel,
    net_role: NetRole,
    limits: ExecLimits,
    trace_events: bool,
}

impl Machine {
    /// Machine with default policy and the core instruction set.
    pub fn new() -> Self {
        Self::with_config(&VmConfig::default())
    }

    pub fn with_config(config: &VmConfig) -> Self {
        let mut opcodes = DispatchTable::new();
        let mut casts = CastTable::new();
        handlers::register_core(&mut opcodes, &mut casts);
        let machine = Self {
            opcodes,
            casts,
            faults: FaultChannel::new(),
            net_role: match config.net.role {
                NetRoleConfig::Standalone => NetRole::Standalone,
                NetRoleConfig::Client => NetRole::Client,
                NetRoleConfig::Server => NetRole::Server,
            },
            limits: ExecLimits::from(&config.limits),
            trace_events: config.tooling.trace_events,
        };
        machine.startup_report().log();
        machine
    }

    pub fn opcodes(&self) -> &DispatchTable {
        &self.opcodes
    }

    pub fn casts(&self) -> &CastTable {
        &self.casts
    }

    pub fn net_role(&self) -> NetRole {
        self.net_role
    }

    pub fn trace_events(&self) -> bool {
        self.trace_events
    }

    pub fn faults(&self) -> &FaultChannel {
        &self.faults
    }

    /// Install an additional opcode handler (e.g. a host extension).
    /// Collisions with an existing registration are flagged in the startup
    /// report, and the newest handler wins.
    pub fn register_opcode(&mut self, op: Opcode, handler: OpcodeHandler) {
        self.opcodes.register(op, handler);
    }

    pub fn register_cast(&mut self, kind: CastKind, handler: OpcodeHandler) {
        self.casts.register(kind, handler);
    }

    pub fn register_fault_observer(&mut self, observer: FaultObserver) -> ObserverId {
        self.faults.register(observer)
    }

    pub fn unregister_fault_observer(&mut self, id: ObserverId) -> bool {
        self.faults.unregister(id)
    }

    /// Gaps and conflicts in the dispatch tables, for the startup hook.
    pub fn startup_report(&self) -> StartupReport {
        StartupReport {
            duplicate_opcodes: self.opcodes.duplicates().to_vec(),
            duplicate_casts: self.casts.duplicates().to_vec(),
            unregistered_opcodes: self.opcodes.unregistered(),
            unregistered_casts: self.casts.unregistered(),
        }
    }

    /// Fresh execution context carrying this machine's configured limits.
    pub fn new_context(&self) -> ExecContext {
        ExecContext::new(self.limits)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("opcodes", &self.opcodes)
            .field("casts", &self.casts)
            .field("net_role", &self.net_role)
            .finish()
    }
}

/// Everything one opcode handler may touch: the immutable machine, the
/// host's object model, the remote sender, and the per-chain counters.
pub struct ExecEnv<'a> {
    pub machine: &'a Machine,
    pub host: &'a mut dyn ObjectModel,
    pub remote: &'a mut dyn RemoteSender,
    pub ctx: &'a mut ExecContext,
}

impl ExecEnv<'_> {
    /// Broadcast a fault at the frame's current position.
    pub fn fault(&self, object: ObjectId, frame: &Frame, event: &FaultEvent) {
        let site = FaultSite {
            object,
            function: frame.function_name(),
            offset: frame.last_offset(),
        };
        self.machine.faults().broadcast(&site, event);
    }
}
