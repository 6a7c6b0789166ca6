//! Callspace routing
//!
//! Decides, per call, whether a function body executes on this process, is
//! forwarded to the remote peer, or both. Pure classification over the
//! function's net flags, the process network role, and object ownership.
//! No side effects; the invocation protocol performs the actual remote send
//! with the already-evaluated parameter block.

use crate::function::{FunctionDescriptor, FunctionFlags};
use crate::object::ObjectModel;
use crate::value::ObjectId;
use crate::vm::Machine;
use bitflags::bitflags;

bitflags! {
    /// Where a call executes. Empty means absorbed: evaluated for stream
    /// consumption but executed nowhere.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Callspace: u8 {
        const LOCAL = 1 << 0;
        const REMOTE = 1 << 1;
    }
}

impl Callspace {
    pub fn is_local(self) -> bool {
        self.contains(Callspace::LOCAL)
    }

    pub fn is_remote(self) -> bool {
        self.contains(Callspace::REMOTE)
    }

    pub fn is_absorbed(self) -> bool {
        self.is_empty()
    }
}

/// Network role of this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetRole {
    Standalone,
    Client,
    Server,
}

/// Classify a call. Pure function of its inputs.
///
/// - Non-replicated functions, and everything on a standalone process,
///   run locally.
/// - Server-target functions run locally on the server; a client forwards
///   them only for objects it owns, and absorbs them otherwise.
/// - Client-target functions run locally on a client; the server forwards
///   them to the owning peer, or runs them locally when it owns the object
///   itself.
/// - Multicast functions run locally everywhere and are additionally
///   forwarded by the server, the one case that yields Local|Remote.
pub fn classify(function: &FunctionDescriptor, role: NetRole, locally_owned: bool) -> Callspace {
    let flags = function.flags();
    if !flags.contains(FunctionFlags::NET) || role == NetRole::Standalone {
        return Callspace::LOCAL;
    }

    if flags.contains(FunctionFlags::NET_MULTICAST) {
        return match role {
            NetRole::Server => Callspace::LOCAL | Callspace::REMOTE,
            _ => Callspace::LOCAL,
        };
    }

    if flags.contains(FunctionFlags::NET_SERVER) {
        return match role {
            NetRole::Server => Callspace::LOCAL,
            _ if locally_owned => Callspace::REMOTE,
            _ => Callspace::empty(),
        };
    }

    if flags.contains(FunctionFlags::NET_CLIENT) {
        return match role {
            NetRole::Server if locally_owned => Callspace::LOCAL,
            NetRole::Server => Callspace::REMOTE,
            _ => Callspace::LOCAL,
        };
    }

    // Replicated but directionless: execute locally.
    Callspace::LOCAL
}

/// Classify using the live machine and host state.
pub(crate) fn route(
    machine: &Machine,
    host: &dyn ObjectModel,
    function: &FunctionDescriptor,
    object: ObjectId,
) -> Callspace {
    classify(function, machine.net_role(), host.is_locally_owned(object))
}
