use crate::global::{FunctionValue, ObjectHandle, Value};
use crate::sandbox::events::ListenerOptions;

/// Environment collaborator giving the sandbox its only path to the real,
/// shared global object and to the unpatched listener operations.
///
/// The real global is injected rather than reached through a process
/// global, so tests substitute a fake by constructing their own handle.
#[derive(Clone)]
pub struct GlobalEnv {
    raw_window: ObjectHandle,
}

impl GlobalEnv {
    pub fn new(raw_window: ObjectHandle) -> Self {
        Self { raw_window }
    }

    /// The unproxied real global object.
    pub fn raw_window(&self) -> &ObjectHandle {
        &self.raw_window
    }

    /// Attach a listener directly to a target's native sink, bypassing any
    /// patched registration surface.
    pub fn raw_add_event_listener(
        &self,
        target: &ObjectHandle,
        event_type: &str,
        listener: &FunctionValue,
        options: ListenerOptions,
    ) {
        target.sink_add(event_type, listener, options);
    }

    /// Detach a listener directly from a target's native sink. Removing a
    /// listener that was never attached is a silent no-op.
    pub fn raw_remove_event_listener(
        &self,
        target: &ObjectHandle,
        event_type: &str,
        listener: &FunctionValue,
    ) {
        target.sink_remove(event_type, listener);
    }
}

/// Rebind receiver semantics: function values come back bound so they
/// always execute against `target`, everything else passes through
/// untouched.
pub fn bind_function_to_raw_target(value: Value, target: &ObjectHandle) -> Value {
    match value {
        Value::Function(function) => Value::Function(function.bind_to(target)),
        other => other,
    }
}
