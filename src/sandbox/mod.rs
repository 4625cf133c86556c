use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::env::GlobalEnv;
use crate::global::ObjectHandle;
use crate::location::LocationProxy;

pub mod events;
pub mod patch;
pub mod proxy;
pub mod special_key;

use events::{EventRegistry, WindowEffect};
use proxy::WindowProxy;
use special_key::EscapeRegistry;

/// Per-tenant sandbox state shared between the lifecycle controller and
/// the window proxy.
pub struct SandboxContext {
    pub env: GlobalEnv,
    pub proxy_location: Rc<LocationProxy>,
    /// Property names whose writes are mirrored onto the real global.
    pub escape_properties: HashSet<String>,
    /// Escaped keys this tenant owns on the real global and must clean up.
    pub escape_keys: Rc<RefCell<HashSet<String>>>,
    pub registry: EscapeRegistry,
    /// Installed by [`patch_window`]; retrieved later by the controller.
    pub proxy_window: Option<Rc<WindowProxy>>,
}

impl SandboxContext {
    pub fn new(env: GlobalEnv, proxy_location: Rc<LocationProxy>) -> Self {
        Self {
            env,
            proxy_location,
            escape_properties: HashSet::new(),
            escape_keys: Rc::new(RefCell::new(HashSet::new())),
            registry: EscapeRegistry::default(),
            proxy_window: None,
        }
    }
}

/// Set up one child app's window: patch special properties, install the
/// proxy onto the sandbox context, wire up listener bookkeeping, and hand
/// the four lifecycle operations back to the controller.
pub fn patch_window(
    app_name: &str,
    scoped_window: ObjectHandle,
    sandbox: &mut SandboxContext,
) -> WindowEffect {
    patch::patch_window_property(app_name, &scoped_window, &sandbox.env, &sandbox.registry);

    let events = EventRegistry::new(scoped_window.clone(), sandbox.env.clone());
    let proxy = WindowProxy::install(scoped_window, sandbox, events.clone());
    sandbox.proxy_window = Some(proxy);

    WindowEffect::new(events)
}
