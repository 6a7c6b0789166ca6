//! Shared test utilities
//!
//! Provides a minimal in-memory object model, a recording remote sender,
//! and a `Rig` bundling machine + host + context so tests can invoke
//! functions without repeating the borrow plumbing.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tarn_runtime::fault::{FaultEvent, FaultKind};
use tarn_runtime::function::{ClassDescriptor, FunctionDescriptor};
use tarn_runtime::object::{ObjectModel, RemoteSender};
use tarn_runtime::vm::{external_invoke, ExecContext, ExecEnv, ExecLimits, Machine};
use tarn_runtime::{ExecResult, ObjectId, Value};
use tarn_config::VmConfig;

/// One host-owned object instance.
struct TestObject {
    class: Arc<ClassDescriptor>,
    fields: Vec<Value>,
    name: String,
    pending_destroy: bool,
    locally_owned: bool,
}

/// In-memory object model for tests.
#[derive(Default)]
pub struct TestHost {
    objects: Vec<TestObject>,
    function_refs: Vec<Arc<FunctionDescriptor>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object of `class` with kind-default fields.
    pub fn spawn(&mut self, class: Arc<ClassDescriptor>) -> ObjectId {
        let fields = class
            .fields()
            .iter()
            .map(|f| f.kind.default_value())
            .collect();
        let id = ObjectId(self.objects.len() as u32);
        let name = format!("{}_{}", class.name(), id.0);
        self.objects.push(TestObject {
            class,
            fields,
            name,
            pending_destroy: false,
            locally_owned: true,
        });
        id
    }

    /// Register a function for early-bound (by-reference) calls.
    pub fn add_function_ref(&mut self, function: Arc<FunctionDescriptor>) -> u32 {
        self.function_refs.push(function);
        (self.function_refs.len() - 1) as u32
    }

    pub fn mark_pending_destroy(&mut self, object: ObjectId) {
        self.objects[object.0 as usize].pending_destroy = true;
    }

    pub fn set_locally_owned(&mut self, object: ObjectId, owned: bool) {
        self.objects[object.0 as usize].locally_owned = owned;
    }

    pub fn int_field(&self, object: ObjectId, field: u16) -> i32 {
        self.field(object, field).as_int().unwrap_or(i32::MIN)
    }
}

impl ObjectModel for TestHost {
    fn class_of(&self, object: ObjectId) -> Arc<ClassDescriptor> {
        Arc::clone(&self.objects[object.0 as usize].class)
    }

    fn object_name(&self, object: ObjectId) -> String {
        self.objects
            .get(object.0 as usize)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| object.to_string())
    }

    fn field(&self, object: ObjectId, field: u16) -> Value {
        self.objects[object.0 as usize]
            .fields
            .get(field as usize)
            .cloned()
            .unwrap_or(Value::Nothing)
    }

    fn set_field(&mut self, object: ObjectId, field: u16, value: Value) {
        if let Some(slot) = self.objects[object.0 as usize]
            .fields
            .get_mut(field as usize)
        {
            *slot = value;
        }
    }

    fn is_pending_destroy(&self, object: ObjectId) -> bool {
        self.objects[object.0 as usize].pending_destroy
    }

    fn is_locally_owned(&self, object: ObjectId) -> bool {
        self.objects[object.0 as usize].locally_owned
    }

    fn object_ref(&self, reference: u32) -> Option<ObjectId> {
        if (reference as usize) < self.objects.len() {
            Some(ObjectId(reference))
        } else {
            None
        }
    }

    fn function_ref(&self, reference: u32) -> Option<Arc<FunctionDescriptor>> {
        self.function_refs.get(reference as usize).map(Arc::clone)
    }
}

/// Remote sender that records every call it is handed.
#[derive(Default)]
pub struct RecordingRemote {
    pub calls: Vec<(String, ObjectId, Vec<Value>)>,
}

impl RemoteSender for RecordingRemote {
    fn call_remote(&mut self, function: &FunctionDescriptor, object: ObjectId, params: &[Value]) {
        self.calls
            .push((function.name().to_string(), object, params.to_vec()));
    }
}

/// Machine + host + remote + context, wired for one test.
pub struct Rig {
    pub machine: Machine,
    pub host: TestHost,
    pub remote: RecordingRemote,
    pub ctx: ExecContext,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(&VmConfig::default())
    }

    pub fn with_config(config: &VmConfig) -> Self {
        let machine = Machine::with_config(config);
        let ctx = machine.new_context();
        Self {
            machine,
            host: TestHost::new(),
            remote: RecordingRemote::default(),
            ctx,
        }
    }

    pub fn with_limits(limits: ExecLimits) -> Self {
        let mut rig = Self::new();
        rig.ctx = ExecContext::new(limits);
        rig
    }

    pub fn env(&mut self) -> ExecEnv<'_> {
        ExecEnv {
            machine: &self.machine,
            host: &mut self.host,
            remote: &mut self.remote,
            ctx: &mut self.ctx,
        }
    }

    pub fn invoke(
        &mut self,
        object: ObjectId,
        function: &Arc<FunctionDescriptor>,
        params: &mut [Value],
    ) -> ExecResult<()> {
        let mut env = self.env();
        external_invoke(&mut env, object, function, params)
    }

    /// Record every broadcast fault as (kind, message).
    pub fn record_faults(&mut self) -> Rc<RefCell<Vec<(FaultKind, String)>>> {
        let log: Rc<RefCell<Vec<(FaultKind, String)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        self.machine
            .register_fault_observer(Rc::new(move |_site, event: &FaultEvent| {
                sink.borrow_mut().push((event.kind, event.message.clone()));
            }));
        log
    }
}
