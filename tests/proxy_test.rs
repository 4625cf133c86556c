use std::rc::Rc;

use atrium_sandbox::{
    patch_window, FunctionValue, GlobalEnv, LocationProxy, ObjectHandle, SandboxContext, Value,
};

fn make_sandbox() -> (ObjectHandle, SandboxContext) {
    let raw_window = ObjectHandle::new();
    let env = GlobalEnv::new(raw_window.clone());
    let location = LocationProxy::parse("https://tenant.example.com/app").expect("location");
    (raw_window, SandboxContext::new(env, location))
}

#[test]
fn test_new_key_becomes_custom_property() {
    let (raw_window, mut sandbox) = make_sandbox();
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    proxy.set("counter", Value::Number(1.0));

    assert_eq!(proxy.get("counter"), Value::Number(1.0));
    assert!(
        proxy.is_custom_property("counter"),
        "key created through the proxy should be tracked as custom"
    );
    assert!(
        !raw_window.has("counter"),
        "non-escape keys must never leak to the real global"
    );
}

#[test]
fn test_custom_function_reads_back_unbound() {
    let (_raw_window, mut sandbox) = make_sandbox();
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    let helper = FunctionValue::new("helper", |_, _| Value::Undefined);
    proxy.set("helper", Value::Function(helper.clone()));

    let read_back = proxy.get("helper");
    let function = read_back.as_function().expect("function value");
    assert_eq!(function, &helper, "custom property must come back raw");
    assert!(
        !function.is_bound(),
        "custom properties are exempt from receiver rebinding"
    );
}

#[test]
fn test_pre_existing_function_is_rebound_to_scoped_window() {
    let (_raw_window, mut sandbox) = make_sandbox();
    let scoped = ObjectHandle::new();
    scoped.set(
        "getSelection",
        Value::Function(FunctionValue::new("getSelection", |_, _| Value::Undefined)),
    );
    let _effect = patch_window("tenant-a", scoped.clone(), &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    let function = proxy
        .get("getSelection")
        .as_function()
        .cloned()
        .expect("function value");
    assert!(function.is_bound(), "non-custom function reads are rebound");
    assert!(
        function.bound_target().expect("target").ptr_eq(&scoped),
        "receiver must be the scoped window"
    );
}

#[test]
fn test_self_referential_keys_resolve_to_proxy() {
    let (_raw_window, mut sandbox) = make_sandbox();
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    for key in ["window", "self", "globalThis", "top", "parent"] {
        let resolved = proxy.get(key);
        let window = resolved.as_window().unwrap_or_else(|| {
            panic!("{key} should resolve to a window reference");
        });
        assert!(
            Rc::ptr_eq(window, &proxy),
            "{key} must be reference-equal to the proxy itself"
        );
    }
}

#[test]
fn test_location_reads_hit_the_location_proxy() {
    let (raw_window, mut sandbox) = make_sandbox();
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    match proxy.get("location") {
        Value::Location(location) => {
            assert!(Rc::ptr_eq(&location, &sandbox.proxy_location));
            assert_eq!(location.href(), "https://tenant.example.com/app");
        }
        other => panic!("expected location proxy, got {other:?}"),
    }

    // Navigation writes go straight to the real page.
    proxy.set("location", Value::string("https://host.example.com/next"));
    assert_eq!(
        raw_window.get("location"),
        Value::string("https://host.example.com/next")
    );
}

#[test]
fn test_escape_write_mirrors_to_raw_window_and_tracks_ownership() {
    let (raw_window, mut sandbox) = make_sandbox();
    sandbox.escape_properties.insert("sharedFlag".to_string());
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    proxy.set("sharedFlag", Value::Bool(true));

    assert_eq!(raw_window.get("sharedFlag"), Value::Bool(true));
    assert!(
        sandbox.escape_keys.borrow().contains("sharedFlag"),
        "first escape of an unowned key must be tracked for cleanup"
    );

    assert!(proxy.delete("sharedFlag"));
    assert!(
        !raw_window.has("sharedFlag"),
        "teardown of an owned escaped key must clean the real global"
    );
    assert!(!sandbox.escape_keys.borrow().contains("sharedFlag"));
}

#[test]
fn test_escape_never_claims_pre_existing_raw_keys() {
    let (raw_window, mut sandbox) = make_sandbox();
    sandbox.escape_properties.insert("theme".to_string());
    raw_window.set("theme", Value::string("light"));
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    proxy.set("theme", Value::string("dark"));
    assert_eq!(raw_window.get("theme"), Value::string("dark"));
    assert!(
        !sandbox.escape_keys.borrow().contains("theme"),
        "a key the shared scope owned before the tenant touched it is never claimed"
    );

    assert!(proxy.delete("theme"));
    assert!(
        raw_window.has("theme"),
        "deleting a pre-owned key must not touch the real global"
    );
}

#[test]
fn test_has_reflects_scoped_window_only() {
    let (raw_window, mut sandbox) = make_sandbox();
    raw_window.set("hostOnly", Value::Bool(true));
    let scoped = ObjectHandle::new();
    scoped.set("tenantOnly", Value::Bool(true));
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    assert!(proxy.has("tenantOnly"));
    assert!(
        !proxy.has("hostOnly"),
        "existence checks must never forward to the real global"
    );
}

#[test]
fn test_delete_missing_key_is_silent_success() {
    let (_raw_window, mut sandbox) = make_sandbox();
    let scoped = ObjectHandle::new();
    let _effect = patch_window("tenant-a", scoped, &mut sandbox);
    let proxy = sandbox.proxy_window.clone().expect("proxy installed");

    assert!(proxy.delete("neverExisted"));
}
