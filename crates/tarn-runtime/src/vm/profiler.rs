//! Execution profiling
//!
//! Optional per-context instrumentation: opcode execution counts and native
//! call counts. Disabled by default; the accounting hooks are no-ops until a
//! host enables profiling on its context.

use std::collections::HashMap;

/// Per-context execution profiler.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    total_instructions: u64,
    opcode_counts: HashMap<u8, u64>,
    native_calls: HashMap<String, u64>,
}

impl Profiler {
    pub fn enabled() -> Self {
        Self::default()
    }

    pub(crate) fn record_opcode(&mut self, byte: u8) {
        self.total_instructions += 1;
        *self.opcode_counts.entry(byte).or_insert(0) += 1;
    }

    pub(crate) fn record_native_call(&mut self, function: &str) {
        *self.native_calls.entry(function.to_string()).or_insert(0) += 1;
    }

    /// Total opcodes dispatched while profiling was enabled.
    pub fn total_instructions(&self) -> u64 {
        self.total_instructions
    }

    pub fn opcode_count(&self, byte: u8) -> u64 {
        self.opcode_counts.get(&byte).copied().unwrap_or(0)
    }

    pub fn native_call_count(&self, function: &str) -> u64 {
        self.native_calls.get(function).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.total_instructions = 0;
        self.opcode_counts.clear();
        self.native_calls.clear();
    }
}
