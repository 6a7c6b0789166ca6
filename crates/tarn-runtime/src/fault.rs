//! Structured fault reporting
//!
//! Faults, breakpoints, and trace events flow through one broadcast channel
//! instead of host-level exceptions. Observers (debuggers, test harnesses)
//! are invoked synchronously in registration order; non-informational faults
//! are additionally logged so headless runs still surface them.

use crate::value::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Kind of a runtime fault event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Development breakpoint opcode hit
    Breakpoint,
    /// Development tracepoint opcode hit
    Tracepoint,
    /// Development wire-tracepoint opcode hit
    WireTracepoint,
    /// An lvalue could not be resolved (e.g. assignment through a null
    /// object reference); recovered locally
    AccessViolation,
    /// Recursion or runaway-instruction ceiling exceeded
    InfiniteLoop,
    /// Unrecoverable script or bytecode-integrity failure
    FatalError,
    /// Dispatch hit an unregistered opcode slot
    UnknownOpcode,
}

impl FaultKind {
    /// Informational events never halt execution at the VM level and are
    /// not logged by the channel itself.
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            FaultKind::Breakpoint | FaultKind::Tracepoint | FaultKind::WireTracepoint
        )
    }
}

/// A single fault event: constructed at the fault site, broadcast, discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub kind: FaultKind,
    pub message: String,
}

impl FaultEvent {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn breakpoint() -> Self {
        Self::new(FaultKind::Breakpoint, "")
    }

    pub fn tracepoint() -> Self {
        Self::new(FaultKind::Tracepoint, "")
    }

    pub fn wire_tracepoint() -> Self {
        Self::new(FaultKind::WireTracepoint, "")
    }
}

impl fmt::Display for FaultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            write!(f, "{:?}: {}", self.kind, self.message)
        }
    }
}

/// Where a fault occurred, borrowed from the active frame for the duration
/// of the broadcast.
#[derive(Debug, Clone)]
pub struct FaultSite<'a> {
    pub object: ObjectId,
    pub function: &'a str,
    /// Byte offset of the faulting opcode
    pub offset: usize,
}

/// Observer callback. Observers run on the faulting thread and may block it
/// (a debugger's prerogative), but must not call back into the machine.
pub type FaultObserver = Rc<dyn Fn(&FaultSite<'_>, &FaultEvent)>;

/// Handle returned by [`FaultChannel::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

/// Broadcast channel for fault events.
#[derive(Default)]
pub struct FaultChannel {
    observers: Vec<(ObserverId, FaultObserver)>,
    next_id: u64,
}

impl FaultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; observers are invoked in registration order.
    pub fn register(&mut self, observer: FaultObserver) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns false if the id is unknown.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Synchronously deliver an event to every observer.
    ///
    /// Iterates a snapshot of the observer list, so the set of observers is
    /// fixed for the duration of one broadcast.
    pub fn broadcast(&self, site: &FaultSite<'_>, event: &FaultEvent) {
        match event.kind {
            FaultKind::Breakpoint | FaultKind::Tracepoint | FaultKind::WireTracepoint => {}
            FaultKind::AccessViolation | FaultKind::InfiniteLoop => {
                log::warn!(
                    "script fault in '{}' at {:#06x} on {}: {}",
                    site.function,
                    site.offset,
                    site.object,
                    event
                );
            }
            FaultKind::FatalError | FaultKind::UnknownOpcode => {
                log::error!(
                    "script fault in '{}' at {:#06x} on {}: {}",
                    site.function,
                    site.offset,
                    site.object,
                    event
                );
            }
        }

        let snapshot: Vec<FaultObserver> = self
            .observers
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in snapshot {
            observer(site, event);
        }
    }
}

impl fmt::Debug for FaultChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultChannel")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn site() -> FaultSite<'static> {
        FaultSite {
            object: ObjectId(1),
            function: "test",
            offset: 0,
        }
    }

    #[test]
    fn observers_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut channel = FaultChannel::new();
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            channel.register(Rc::new(move |_, _| order.borrow_mut().push(tag)));
        }
        channel.broadcast(&site(), &FaultEvent::breakpoint());
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unregister_removes_exactly_one() {
        let hits = Rc::new(RefCell::new(0u32));
        let mut channel = FaultChannel::new();
        let a = {
            let hits = Rc::clone(&hits);
            channel.register(Rc::new(move |_, _| *hits.borrow_mut() += 1))
        };
        let _b = {
            let hits = Rc::clone(&hits);
            channel.register(Rc::new(move |_, _| *hits.borrow_mut() += 1))
        };
        assert!(channel.unregister(a));
        assert!(!channel.unregister(a));
        channel.broadcast(&site(), &FaultEvent::tracepoint());
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn informational_kinds() {
        assert!(FaultKind::Breakpoint.is_informational());
        assert!(FaultKind::WireTracepoint.is_informational());
        assert!(!FaultKind::AccessViolation.is_informational());
        assert!(!FaultKind::FatalError.is_informational());
    }
}
