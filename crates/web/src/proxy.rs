//! Recording and readonly proxies
//!
//! Middleware written against a callback contract communicates through
//! property mutation and method invocation on handle objects it is given,
//! not through return values. These proxies are the stand-ins for those
//! handles: explicit recorder objects that observe every effect without
//! performing any real operation.
//!
//! [`RecordingProxy`] is a cursor into a virtual object graph. Descending
//! with [`prop`](RecordingProxy::prop) or [`index`](RecordingProxy::index)
//! extends a dotted path; assignments and invocations are logged against
//! that path in a [`ChangeSet`] shared by all cursors cloned from the same
//! root. `proxy.prop("z").prop("ee").prop("g").call(...)` records under
//! `"z.ee.g"`, and numeric indices join the path like any other segment.
//!
//! [`ReadonlyProxy`] wraps a snapshot of a real object: reads fall through
//! to the snapshot unless a prior write shadowed the property, and writes
//! only ever land in the shadow map, never in the snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

/// Everything a foreign middleware did to a recording proxy: the last value
/// assigned to each dotted path, and every argument list of every invocation
/// in call order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    pub sets: HashMap<String, Value>,
    pub calls: HashMap<String, Vec<Vec<Value>>>,
}

/// A path cursor recording assignments and invocations into a shared
/// [`ChangeSet`]. Cheap to clone; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingProxy {
    path: Vec<String>,
    log: Arc<Mutex<ChangeSet>>,
}

impl RecordingProxy {
    pub fn new() -> Self {
        Default::default()
    }

    /// Descends into a property, returning a cursor one path segment deeper.
    pub fn prop(&self, name: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(name.into());
        Self { path, log: Arc::clone(&self.log) }
    }

    /// Descends into a numeric index; recorded like any named segment.
    pub fn index(&self, index: usize) -> Self {
        self.prop(index.to_string())
    }

    /// Records an assignment of `value` to the property `name` under the
    /// current path. The last write to a path wins.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        let key = self.prop(name).path.join(".");
        self.lock().sets.insert(key, value.into());
    }

    /// Records an invocation of the current path with `args`, appended in
    /// call order.
    pub fn call(&self, args: Vec<Value>) {
        let key = self.path.join(".");
        self.lock().calls.entry(key).or_default().push(args);
    }

    /// Snapshots everything recorded so far.
    pub fn changes(&self) -> ChangeSet {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChangeSet> {
        self.log.lock().expect("recording log poisoned")
    }
}

/// A read-through wrapper around an object snapshot that shadows writes
/// instead of applying them.
#[derive(Debug, Clone)]
pub struct ReadonlyProxy {
    target: Arc<Map<String, Value>>,
    shadow: Arc<Mutex<HashMap<String, Value>>>,
}

impl ReadonlyProxy {
    /// Wraps `target`. A non-object value wraps as an empty snapshot.
    pub fn new(target: Value) -> Self {
        let target = match target {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { target: Arc::new(target), shadow: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Reads a property: a shadowed write if one exists, the underlying
    /// value otherwise.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(shadowed) = self.lock().get(name) {
            return Some(shadowed.clone());
        }
        self.target.get(name).cloned()
    }

    /// Writes a property into the shadow map; the wrapped object is never
    /// mutated.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.lock().insert(name.into(), value.into());
    }

    /// The writes recorded so far, keyed by property name.
    pub fn changes(&self) -> HashMap<String, Value> {
        self.lock().clone()
    }

    /// The wrapped snapshot, unaffected by any writes.
    pub fn target(&self) -> &Map<String, Value> {
        &self.target
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.shadow.lock().expect("shadow map poisoned")
    }
}
