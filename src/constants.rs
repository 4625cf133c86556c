/// Keys that resolve to the tenant's own window proxy, so sandboxed code
/// walking "up" to its global never escapes to the real one.
pub const GLOBAL_KEY_TO_WINDOW: &[&str] = &["window", "self", "globalThis", "top", "parent"];

/// Event types that belong to the tenant's scoped window. Everything else
/// (resize, popstate, ...) must attach to the real global or it would
/// never fire.
pub const SCOPE_WINDOW_EVENT: &[&str] = &[
    "load",
    "beforeunload",
    "unload",
    "unmount",
    "appstate-change",
    "statechange",
    "mounted",
];

/// `on*` handler slots that stay on the scoped window and are excluded
/// from the handler-slot patch pass.
pub const SCOPE_WINDOW_ON_EVENT: &[&str] = &["onload", "onbeforeunload", "onunload"];
