use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::constants::SCOPE_WINDOW_EVENT;
use crate::env::GlobalEnv;
use crate::global::{FunctionValue, ObjectHandle};

/// Registration options carried with every tracked listener so that
/// re-attachment after a snapshot is option-faithful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerOptions {
    #[serde(default)]
    pub capture: bool,
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub passive: bool,
}

impl ListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }
}

// The boolean shorthand of the DOM registration contract.
impl From<bool> for ListenerOptions {
    fn from(capture: bool) -> Self {
        Self {
            capture,
            ..Self::default()
        }
    }
}

type ListenerMap = HashMap<String, Vec<(FunctionValue, ListenerOptions)>>;

struct EventState {
    scoped: ObjectHandle,
    env: GlobalEnv,
    /// Everything currently attached through the sandbox.
    listeners: ListenerMap,
    /// Listeners captured by `record`, awaiting `rebuild` or `reset`.
    snapshot: ListenerMap,
}

fn event_target(state: &EventState, event_type: &str) -> ObjectHandle {
    if SCOPE_WINDOW_EVENT.contains(&event_type) {
        state.scoped.clone()
    } else {
        state.env.raw_window().clone()
    }
}

/// Listener bookkeeping shared between the tenant-facing window proxy and
/// the controller-facing [`WindowEffect`].
#[derive(Clone)]
pub(crate) struct EventRegistry {
    state: Rc<RefCell<EventState>>,
}

impl EventRegistry {
    pub(crate) fn new(scoped: ObjectHandle, env: GlobalEnv) -> Self {
        Self {
            state: Rc::new(RefCell::new(EventState {
                scoped,
                env,
                listeners: HashMap::new(),
                snapshot: HashMap::new(),
            })),
        }
    }

    /// Register a listener: recorded in the registry keyed by type, then
    /// attached to the scoped window or the real global depending on
    /// whether the event type is tenant-local.
    pub(crate) fn add(&self, event_type: &str, listener: &FunctionValue, options: ListenerOptions) {
        let (env, target) = {
            let mut state = self.state.borrow_mut();
            let entries = state.listeners.entry(event_type.to_string()).or_default();
            match entries
                .iter_mut()
                .find(|(existing, _)| existing == listener)
            {
                Some(entry) => entry.1 = options,
                None => entries.push((listener.clone(), options)),
            }
            (state.env.clone(), event_target(&state, event_type))
        };
        env.raw_add_event_listener(&target, event_type, listener, options);
    }

    /// Remove a listener. The removal is forwarded to the routed target
    /// even when the registry had no record of it.
    pub(crate) fn remove(&self, event_type: &str, listener: &FunctionValue) {
        let (env, target) = {
            let mut state = self.state.borrow_mut();
            if let Some(entries) = state.listeners.get_mut(event_type) {
                entries.retain(|(existing, _)| existing != listener);
                if entries.is_empty() {
                    state.listeners.remove(event_type);
                }
            }
            (state.env.clone(), event_target(&state, event_type))
        };
        env.raw_remove_event_listener(&target, event_type, listener);
    }

    /// Discard the captured snapshot. Live listeners are untouched.
    pub(crate) fn reset(&self) {
        self.state.borrow_mut().snapshot.clear();
    }

    /// Merge every live listener into the snapshot. Additive: a prior
    /// uncommitted snapshot for the same type is kept and unioned, since
    /// record can legitimately run twice before the next rebuild (manual
    /// unmount of a pre-rendered or kept-alive umd app).
    pub(crate) fn record(&self) {
        let mut state = self.state.borrow_mut();
        let EventState {
            listeners,
            snapshot,
            ..
        } = &mut *state;
        for (event_type, entries) in listeners.iter() {
            if entries.is_empty() {
                continue;
            }
            let cached = snapshot.entry(event_type.clone()).or_default();
            for (listener, options) in entries {
                if !cached.iter().any(|(existing, _)| existing == listener) {
                    cached.push((listener.clone(), *options));
                }
            }
        }
    }

    /// Re-attach every snapshot entry through the public registration
    /// path, with its originally recorded options, then discard the
    /// snapshot. Sequencing record/rebuild pairs is the lifecycle
    /// controller's contract: rebuilding on top of still-attached
    /// listeners duplicates them at the native target.
    pub(crate) fn rebuild(&self) {
        let pending: Vec<(String, Vec<(FunctionValue, ListenerOptions)>)> = self
            .state
            .borrow()
            .snapshot
            .iter()
            .map(|(event_type, entries)| (event_type.clone(), entries.clone()))
            .collect();

        for (event_type, entries) in pending {
            for (listener, options) in entries {
                self.add(&event_type, &listener, options);
            }
        }

        self.reset();
    }

    /// Detach everything live from its routed target (raw removal, the
    /// registry itself is being torn down) and empty the registry.
    pub(crate) fn release(&self) {
        let (env, removals) = {
            let mut state = self.state.borrow_mut();
            let env = state.env.clone();
            let mut removals = Vec::new();
            for (event_type, entries) in state.listeners.iter() {
                let target = event_target(&state, event_type);
                for (listener, _) in entries {
                    removals.push((target.clone(), event_type.clone(), listener.clone()));
                }
            }
            state.listeners.clear();
            (env, removals)
        };

        for (target, event_type, listener) in removals {
            env.raw_remove_event_listener(&target, &event_type, &listener);
        }
    }

    pub(crate) fn live_listener_count(&self, event_type: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub(crate) fn snapshot_listener_count(&self, event_type: &str) -> usize {
        self.state
            .borrow()
            .snapshot
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

/// The four lifecycle operations handed back to the lifecycle controller.
///
/// The controller composes them per app-lifecycle policy: plain unmount
/// calls `release` only; persistent (umd) unmount calls `record` and later
/// `rebuild` on remount; pre-render and keep-alive suspension use the same
/// record/rebuild pairing. Platform timers are deliberately outside this
/// subsystem.
pub struct WindowEffect {
    events: EventRegistry,
}

impl WindowEffect {
    pub(crate) fn new(events: EventRegistry) -> Self {
        Self { events }
    }

    pub fn reset(&self) {
        self.events.reset();
    }

    pub fn record(&self) {
        self.events.record();
    }

    pub fn rebuild(&self) {
        self.events.rebuild();
    }

    pub fn release(&self) {
        self.events.release();
    }

    /// Listeners currently tracked for a type. Diagnostic surface.
    pub fn live_listener_count(&self, event_type: &str) -> usize {
        self.events.live_listener_count(event_type)
    }

    /// Listeners captured for a type and not yet rebuilt.
    pub fn snapshot_listener_count(&self, event_type: &str) -> usize {
        self.events.snapshot_listener_count(event_type)
    }
}
