use std::rc::Rc;

use tracing::warn;

use crate::constants::SCOPE_WINDOW_ON_EVENT;
use crate::env::{bind_function_to_raw_target, GlobalEnv};
use crate::global::{GetterFn, ObjectHandle, PropertySlot, SetterFn, Value};

use super::special_key::EscapeRegistry;

/// Rewrite the special properties of a tenant's scoped window so reads and
/// writes pass through to the real global.
///
/// Three passes, mirroring the shared-state contract of the host page:
/// exact escape keys are rebound unconditionally; pattern-matched live
/// properties are rebound (functions) or turned into passthrough accessors
/// (everything else, when configurable); every remaining `on*` handler
/// slot is proxied to the real global with the handler's receiver fixed to
/// the scoped window.
pub fn patch_window_property(
    app_name: &str,
    scoped: &ObjectHandle,
    env: &GlobalEnv,
    registry: &EscapeRegistry,
) {
    let raw_window = env.raw_window();

    for key in registry.exact_keys() {
        let raw_value = raw_window.get(key);
        scoped.set(key, bind_function_to_raw_target(raw_value, raw_window));
    }

    for key in scoped.enumerable_own_keys() {
        if registry.matches_pattern(&key) && raw_window.has(&key) {
            patch_escaped_property(scoped, raw_window, &key, app_name);
        }
    }

    for key in scoped.own_keys() {
        if key.starts_with("on") && !SCOPE_WINDOW_ON_EVENT.contains(&key.as_str()) {
            patch_handler_slot(app_name, scoped, raw_window, &key);
        }
    }
}

fn patch_escaped_property(
    scoped: &ObjectHandle,
    raw_window: &ObjectHandle,
    key: &str,
    app_name: &str,
) {
    if let Value::Function(function) = raw_window.get(key) {
        scoped.set(
            key,
            bind_function_to_raw_target(Value::Function(function), raw_window),
        );
        return;
    }

    let Some(descriptor) = scoped.descriptor(key) else {
        return;
    };
    if !descriptor.configurable {
        return;
    }

    let raw_for_get = raw_window.clone();
    let key_for_get = key.to_string();
    let get: Rc<GetterFn> = Rc::new(move || raw_for_get.get(&key_for_get));

    let raw_for_set = raw_window.clone();
    let key_for_set = key.to_string();
    let set: Rc<SetterFn> = Rc::new(move |value| raw_for_set.set(&key_for_set, value));

    let slot = PropertySlot::Accessor {
        get: Some(get),
        set: Some(set),
        configurable: descriptor.configurable,
        enumerable: descriptor.enumerable,
    };
    if let Err(err) = scoped.define_property(key, slot) {
        warn!(
            target = "sandbox",
            app = %app_name,
            key = %key,
            error = %err,
            "failed to escape window property"
        );
    }
}

/// Proxy one `on*` handler slot to the real global.
///
/// Reads always come from the real global. Writes go to the real global
/// with function handlers rebound so their receiver is the scoped window;
/// when the original slot was neither writable nor setter-bearing the
/// setter is omitted and the slot degrades to read-only passthrough.
///
/// Handler slots land on the raw window, so when both the host page and a
/// child app assign the same `on*` handler the last writer wins. Whether
/// the two should coexist, and which fires, is an unresolved question in
/// the host/child contract; no precedence logic is invented here.
fn patch_handler_slot(app_name: &str, scoped: &ObjectHandle, raw_window: &ObjectHandle, key: &str) {
    let (enumerable, settable) = match scoped.descriptor(key) {
        Some(descriptor) => (
            descriptor.enumerable,
            descriptor.writable || descriptor.has_setter,
        ),
        None => (true, true),
    };

    let raw_for_get = raw_window.clone();
    let key_for_get = key.to_string();
    let get: Rc<GetterFn> = Rc::new(move || raw_for_get.get(&key_for_get));

    let set: Option<Rc<SetterFn>> = if settable {
        let raw_for_set = raw_window.clone();
        let scoped_for_set = scoped.clone();
        let key_for_set = key.to_string();
        Some(Rc::new(move |value| {
            raw_for_set.set(
                &key_for_set,
                bind_function_to_raw_target(value, &scoped_for_set),
            );
        }))
    } else {
        None
    };

    let slot = PropertySlot::Accessor {
        get: Some(get),
        set,
        configurable: true,
        enumerable,
    };
    if let Err(err) = scoped.define_property(key, slot) {
        warn!(
            target = "sandbox",
            app = %app_name,
            key = %key,
            error = %err,
            "failed to patch window event handler slot"
        );
    }
}
