use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::constants::GLOBAL_KEY_TO_WINDOW;
use crate::env::{bind_function_to_raw_target, GlobalEnv};
use crate::global::{FunctionValue, ObjectHandle, Value};
use crate::location::LocationProxy;

use super::events::{EventRegistry, ListenerOptions};
use super::SandboxContext;

/// The tenant-facing facade over a patched scoped window.
///
/// All child-app access goes through `get`/`set`/`has`/`delete`; the
/// routing between the self-reference, escape, and plain paths is what
/// reconciles strict isolation with the deliberately shared subset of
/// state.
pub struct WindowProxy {
    scoped: ObjectHandle,
    env: GlobalEnv,
    location: Rc<LocationProxy>,
    escape_properties: HashSet<String>,
    escape_keys: Rc<RefCell<HashSet<String>>>,
    custom_properties: RefCell<HashSet<String>>,
    events: EventRegistry,
    self_ref: Weak<WindowProxy>,
}

impl WindowProxy {
    pub(crate) fn install(
        scoped: ObjectHandle,
        sandbox: &SandboxContext,
        events: EventRegistry,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| WindowProxy {
            scoped,
            env: sandbox.env.clone(),
            location: Rc::clone(&sandbox.proxy_location),
            escape_properties: sandbox.escape_properties.clone(),
            escape_keys: Rc::clone(&sandbox.escape_keys),
            custom_properties: RefCell::new(HashSet::new()),
            events,
            self_ref: self_ref.clone(),
        })
    }

    pub fn get(&self, key: &str) -> Value {
        if key == "location" {
            return Value::Location(Rc::clone(&self.location));
        }

        // window/self/top/parent/globalThis resolve to this proxy, never
        // to the backing object or the real global.
        if GLOBAL_KEY_TO_WINDOW.contains(&key) {
            return match self.self_ref.upgrade() {
                Some(proxy) => Value::Window(proxy),
                None => Value::Undefined,
            };
        }

        if self.custom_properties.borrow().contains(key) {
            return self.scoped.get(key);
        }

        bind_function_to_raw_target(self.scoped.get(key), &self.scoped)
    }

    /// Write a property. Always succeeds.
    pub fn set(&self, key: &str, value: Value) {
        // Navigation must affect the real page.
        if key == "location" {
            self.env.raw_window().set(key, value);
            return;
        }

        // The existence check runs strictly before the write: a key the
        // proxy creates is a custom property from then on.
        if !self.scoped.has(key) {
            self.custom_properties.borrow_mut().insert(key.to_string());
        }

        self.scoped.set(key, value.clone());

        if self.escape_properties.contains(key) {
            // Claim the key for cleanup only if the real global did not
            // already own it.
            if !self.env.raw_window().has(key) {
                self.escape_keys.borrow_mut().insert(key.to_string());
            }
            self.env.raw_window().set(key, value);
        }
    }

    /// Own presence on the scoped window only; real-global state never
    /// leaks through existence checks.
    pub fn has(&self, key: &str) -> bool {
        self.scoped.has(key)
    }

    /// Delete a property, cleaning up previously escaped state from the
    /// real global. Deleting a key that does not exist succeeds.
    pub fn delete(&self, key: &str) -> bool {
        if self.scoped.has(key) {
            if self.escape_keys.borrow_mut().remove(key) {
                self.env.raw_window().delete(key);
            }
            return self.scoped.delete(key);
        }
        true
    }

    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: &FunctionValue,
        options: impl Into<ListenerOptions>,
    ) {
        self.events.add(event_type, listener, options.into());
    }

    pub fn remove_event_listener(&self, event_type: &str, listener: &FunctionValue) {
        self.events.remove(event_type, listener);
    }

    pub fn is_custom_property(&self, key: &str) -> bool {
        self.custom_properties.borrow().contains(key)
    }

    /// The backing scoped window. Diagnostic surface.
    pub fn scoped_window(&self) -> &ObjectHandle {
        &self.scoped
    }
}
