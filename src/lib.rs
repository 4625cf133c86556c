// Isolation core of the micro-frontend host: scoped window proxy and
// event lifecycle bookkeeping.

pub mod constants;
pub mod env;
pub mod global;
pub mod location;
pub mod sandbox;

// Re-export commonly used types
pub use env::{bind_function_to_raw_target, GlobalEnv};
pub use global::{FunctionValue, GlobalError, ObjectHandle, PropertySlot, Value};
pub use location::LocationProxy;
pub use sandbox::events::{ListenerOptions, WindowEffect};
pub use sandbox::proxy::WindowProxy;
pub use sandbox::special_key::{EscapeRegistry, EscapeRegistryConfig};
pub use sandbox::{patch_window, SandboxContext};
