//! Host-side collaborator traits
//!
//! The VM owns no objects. Field storage, class registries, and the network
//! transport belong to the embedding host and are reached through these
//! traits. The host guarantees stable field indices for a given class and
//! serializes access so that all script calls against one object happen on
//! one logical thread.

use crate::function::{ClassDescriptor, FunctionDescriptor};
use crate::value::{ObjectId, Value};
use std::sync::Arc;

/// Object model provided by the embedding host.
pub trait ObjectModel {
    /// Class of a live object. Must be stable for the object's lifetime.
    fn class_of(&self, object: ObjectId) -> Arc<ClassDescriptor>;

    /// Human-readable identifier used in diagnostics and stack traces.
    fn object_name(&self, object: ObjectId) -> String;

    /// Read a field by stable index. Unknown indices yield `Nothing`.
    fn field(&self, object: ObjectId, field: u16) -> Value;

    /// Write a field by stable index. Unknown indices are ignored.
    fn set_field(&mut self, object: ObjectId, field: u16, value: Value);

    /// Whether the object is marked for destruction and must not run script.
    fn is_pending_destroy(&self, _object: ObjectId) -> bool {
        false
    }

    /// Whether the local peer owns this object (drives callspace routing).
    fn is_locally_owned(&self, _object: ObjectId) -> bool {
        true
    }

    /// Resolve an inline object reference from bytecode.
    fn object_ref(&self, _reference: u32) -> Option<ObjectId> {
        None
    }

    /// Resolve an inline function reference from bytecode (early-bound calls).
    fn function_ref(&self, _reference: u32) -> Option<Arc<FunctionDescriptor>> {
        None
    }
}

/// Networking layer: fire-and-forget delivery of a call to the remote peer.
///
/// The parameter block is fully evaluated before this is called; the sender
/// must not observe or mutate VM state.
pub trait RemoteSender {
    fn call_remote(&mut self, function: &FunctionDescriptor, object: ObjectId, params: &[Value]);
}

/// Sender for standalone hosts: drops every remote call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRemote;

impl RemoteSender for NullRemote {
    fn call_remote(&mut self, _function: &FunctionDescriptor, _object: ObjectId, _params: &[Value]) {
    }
}
