use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use uuid::Uuid;

use crate::location::LocationProxy;
use crate::sandbox::events::ListenerOptions;
use crate::sandbox::proxy::WindowProxy;

#[derive(Debug, Error)]
pub enum GlobalError {
    #[error("property '{key}' is not configurable")]
    NonConfigurable { key: String },
}

pub type NativeFn = dyn Fn(Option<&ObjectHandle>, &[Value]) -> Value;
pub type GetterFn = dyn Fn() -> Value;
pub type SetterFn = dyn Fn(Value);

struct FunctionInner {
    id: Uuid,
    name: Option<String>,
    callable: Rc<NativeFn>,
    bound_to: Option<ObjectHandle>,
    bound_cache: RefCell<Option<FunctionValue>>,
}

/// A callable value with a stable identity.
///
/// Clones share the identity of the original, so listener bookkeeping that
/// dedupes by function reference keeps working across clones. Binding
/// produces a new function with a new identity, cached on the source so
/// repeated reads of the same property observe the same bound function.
#[derive(Clone)]
pub struct FunctionValue {
    inner: Rc<FunctionInner>,
}

impl FunctionValue {
    pub fn new(
        name: impl Into<String>,
        callable: impl Fn(Option<&ObjectHandle>, &[Value]) -> Value + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(FunctionInner {
                id: Uuid::new_v4(),
                name: Some(name.into()),
                callable: Rc::new(callable),
                bound_to: None,
                bound_cache: RefCell::new(None),
            }),
        }
    }

    pub fn anonymous(callable: impl Fn(Option<&ObjectHandle>, &[Value]) -> Value + 'static) -> Self {
        Self {
            inner: Rc::new(FunctionInner {
                id: Uuid::new_v4(),
                name: None,
                callable: Rc::new(callable),
                bound_to: None,
                bound_cache: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn bound_target(&self) -> Option<ObjectHandle> {
        self.inner.bound_to.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.bound_to.is_some()
    }

    /// Constructor-cased functions keep their prototype semantics and are
    /// never rebound, matching the host page's bind utility.
    fn looks_like_constructor(&self) -> bool {
        self.inner
            .name
            .as_deref()
            .and_then(|name| name.chars().next())
            .map_or(false, |first| first.is_ascii_uppercase())
    }

    /// Produce a clone of this function whose receiver is fixed to `target`.
    ///
    /// Already-bound functions and constructors are returned as-is. The
    /// bound clone is cached so two reads of the same property yield the
    /// same function.
    pub fn bind_to(&self, target: &ObjectHandle) -> FunctionValue {
        if self.is_bound() || self.looks_like_constructor() {
            return self.clone();
        }

        if let Some(cached) = self.inner.bound_cache.borrow().as_ref() {
            let same_target = cached
                .inner
                .bound_to
                .as_ref()
                .map_or(false, |bound| bound.ptr_eq(target));
            if same_target {
                return cached.clone();
            }
        }

        let bound = FunctionValue {
            inner: Rc::new(FunctionInner {
                id: Uuid::new_v4(),
                name: self.inner.name.clone(),
                callable: Rc::clone(&self.inner.callable),
                bound_to: Some(target.clone()),
                bound_cache: RefCell::new(None),
            }),
        };
        *self.inner.bound_cache.borrow_mut() = Some(bound.clone());
        bound
    }

    /// Invoke the function. A bound receiver always wins over the caller's.
    pub fn call(&self, this: Option<&ObjectHandle>, args: &[Value]) -> Value {
        let receiver = self.inner.bound_to.as_ref().or(this);
        (self.inner.callable)(receiver, args)
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

/// A value stored on a global object.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(FunctionValue),
    Location(Rc<LocationProxy>),
    Window(Rc<WindowProxy>),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_window(&self) -> Option<&Rc<WindowProxy>> {
        match self {
            Value::Window(window) => Some(window),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Location(a), Value::Location(b)) => Rc::ptr_eq(a, b),
            (Value::Window(a), Value::Window(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value:?}"),
            Value::Function(function) => write!(f, "{function:?}"),
            Value::Location(location) => write!(f, "Location({})", location.href()),
            Value::Window(_) => write!(f, "Window"),
        }
    }
}

/// One property slot: either plain data or an accessor pair.
#[derive(Clone)]
pub enum PropertySlot {
    Data {
        value: Value,
        writable: bool,
        configurable: bool,
        enumerable: bool,
    },
    Accessor {
        get: Option<Rc<GetterFn>>,
        set: Option<Rc<SetterFn>>,
        configurable: bool,
        enumerable: bool,
    },
}

impl PropertySlot {
    pub fn data(value: Value) -> Self {
        PropertySlot::Data {
            value,
            writable: true,
            configurable: true,
            enumerable: true,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            PropertySlot::Data { configurable, .. } => *configurable,
            PropertySlot::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn enumerable(&self) -> bool {
        match self {
            PropertySlot::Data { enumerable, .. } => *enumerable,
            PropertySlot::Accessor { enumerable, .. } => *enumerable,
        }
    }
}

/// Flag view of a property slot, for patch-time decisions.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescription {
    pub configurable: bool,
    pub enumerable: bool,
    pub writable: bool,
    pub has_getter: bool,
    pub has_setter: bool,
    pub is_accessor: bool,
}

/// Backing store of a global object: named property slots plus the native
/// listener sink a real event target would hold. The sink is only mutated
/// through the raw listener operations on [`crate::env::GlobalEnv`].
pub struct GlobalObject {
    properties: HashMap<String, PropertySlot>,
    key_order: Vec<String>,
    sink: HashMap<String, Vec<(FunctionValue, ListenerOptions)>>,
}

impl GlobalObject {
    fn new() -> Self {
        Self {
            properties: HashMap::new(),
            key_order: Vec::new(),
            sink: HashMap::new(),
        }
    }
}

/// Shared handle to a [`GlobalObject`].
///
/// Getter and setter closures run after the internal borrow is released, so
/// accessors installed by the patcher may freely read or write other
/// objects (or this one).
#[derive(Clone)]
pub struct ObjectHandle(Rc<RefCell<GlobalObject>>);

impl Default for ObjectHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectHandle {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(GlobalObject::new())))
    }

    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, key: &str) -> Value {
        let slot = self.0.borrow().properties.get(key).cloned();
        match slot {
            None => Value::Undefined,
            Some(PropertySlot::Data { value, .. }) => value,
            Some(PropertySlot::Accessor { get, .. }) => {
                get.map_or(Value::Undefined, |getter| getter())
            }
        }
    }

    /// Write a value. Accessor slots run their setter (or silently drop the
    /// write when none exists); non-writable data slots silently drop the
    /// write, matching the permissive semantics of a real global object.
    pub fn set(&self, key: &str, value: Value) {
        enum Write {
            Store,
            Setter(Rc<SetterFn>),
            Drop,
        }

        let action = {
            let object = self.0.borrow();
            match object.properties.get(key) {
                None => Write::Store,
                Some(PropertySlot::Data { writable: true, .. }) => Write::Store,
                Some(PropertySlot::Data { writable: false, .. }) => Write::Drop,
                Some(PropertySlot::Accessor { set: Some(setter), .. }) => {
                    Write::Setter(Rc::clone(setter))
                }
                Some(PropertySlot::Accessor { set: None, .. }) => Write::Drop,
            }
        };

        match action {
            Write::Store => {
                let mut object = self.0.borrow_mut();
                let has_data_slot =
                    matches!(object.properties.get(key), Some(PropertySlot::Data { .. }));
                if has_data_slot {
                    // Replace the value only; the slot keeps its flags.
                    if let Some(PropertySlot::Data {
                        value: existing, ..
                    }) = object.properties.get_mut(key)
                    {
                        *existing = value;
                    }
                } else {
                    object.key_order.push(key.to_string());
                    object
                        .properties
                        .insert(key.to_string(), PropertySlot::data(value));
                }
            }
            Write::Setter(setter) => setter(value),
            Write::Drop => {}
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.borrow().properties.contains_key(key)
    }

    /// Delete a property. Missing keys succeed; non-configurable slots
    /// refuse, as a real global would.
    pub fn delete(&self, key: &str) -> bool {
        let mut object = self.0.borrow_mut();
        let configurable = match object.properties.get(key) {
            None => return true,
            Some(slot) => slot.configurable(),
        };
        if !configurable {
            return false;
        }
        object.properties.remove(key);
        object.key_order.retain(|existing| existing != key);
        true
    }

    /// Install or replace a property slot. Fails when the existing slot is
    /// not configurable.
    pub fn define_property(&self, key: &str, slot: PropertySlot) -> Result<(), GlobalError> {
        let mut object = self.0.borrow_mut();
        let existing = object.properties.get(key).map(PropertySlot::configurable);
        match existing {
            Some(false) => Err(GlobalError::NonConfigurable {
                key: key.to_string(),
            }),
            Some(true) => {
                object.properties.insert(key.to_string(), slot);
                Ok(())
            }
            None => {
                object.key_order.push(key.to_string());
                object.properties.insert(key.to_string(), slot);
                Ok(())
            }
        }
    }

    /// Own property names in insertion order.
    pub fn own_keys(&self) -> Vec<String> {
        self.0.borrow().key_order.clone()
    }

    pub fn enumerable_own_keys(&self) -> Vec<String> {
        let object = self.0.borrow();
        object
            .key_order
            .iter()
            .filter(|key| {
                object
                    .properties
                    .get(key.as_str())
                    .map_or(false, PropertySlot::enumerable)
            })
            .cloned()
            .collect()
    }

    pub fn descriptor(&self, key: &str) -> Option<PropertyDescription> {
        let object = self.0.borrow();
        object.properties.get(key).map(|slot| match slot {
            PropertySlot::Data {
                writable,
                configurable,
                enumerable,
                ..
            } => PropertyDescription {
                configurable: *configurable,
                enumerable: *enumerable,
                writable: *writable,
                has_getter: false,
                has_setter: false,
                is_accessor: false,
            },
            PropertySlot::Accessor {
                get,
                set,
                configurable,
                enumerable,
            } => PropertyDescription {
                configurable: *configurable,
                enumerable: *enumerable,
                writable: false,
                has_getter: get.is_some(),
                has_setter: set.is_some(),
                is_accessor: true,
            },
        })
    }

    pub(crate) fn sink_add(
        &self,
        event_type: &str,
        listener: &FunctionValue,
        options: ListenerOptions,
    ) {
        let mut object = self.0.borrow_mut();
        let entries = object.sink.entry(event_type.to_string()).or_default();
        entries.push((listener.clone(), options));
    }

    pub(crate) fn sink_remove(&self, event_type: &str, listener: &FunctionValue) {
        let mut object = self.0.borrow_mut();
        if let Some(entries) = object.sink.get_mut(event_type) {
            entries.retain(|(existing, _)| existing != listener);
            if entries.is_empty() {
                object.sink.remove(event_type);
            }
        }
    }

    /// Number of listeners the native target currently holds for a type.
    pub fn sink_listener_count(&self, event_type: &str) -> usize {
        self.0
            .borrow()
            .sink
            .get(event_type)
            .map_or(0, |entries| entries.len())
    }

    pub fn sink_has_listener(&self, event_type: &str, listener: &FunctionValue) -> bool {
        self.0
            .borrow()
            .sink
            .get(event_type)
            .map_or(false, |entries| {
                entries.iter().any(|(existing, _)| existing == listener)
            })
    }

    pub fn sink_listener_options(
        &self,
        event_type: &str,
        listener: &FunctionValue,
    ) -> Option<ListenerOptions> {
        self.0.borrow().sink.get(event_type).and_then(|entries| {
            entries
                .iter()
                .find(|(existing, _)| existing == listener)
                .map(|(_, options)| *options)
        })
    }
}
