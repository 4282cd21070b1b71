//! Object registry: stable ids mapped to native capability objects.
//!
//! Each capability type declares a static [`MemberDescriptor`] table. The
//! registry reads it exactly once, at registration, and freezes it; the
//! dispatcher only ever consults the frozen copy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use woda_common::{BridgeError, CapabilityError};

use crate::ipc::{Outbound, Value};
use crate::relay::EventEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Method,
    Event,
}

/// One callable method or emittable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: &'static str,
    pub kind: MemberKind,
    /// Parameter names, in call order.
    pub params: &'static [&'static str],
}

impl MemberDescriptor {
    pub const fn method(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: MemberKind::Method,
            params,
        }
    }

    pub const fn event(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: MemberKind::Event,
            params,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_method(&self) -> bool {
        self.kind == MemberKind::Method
    }

    fn manifest_entry(&self) -> Value {
        json!({ "name": self.name, "params": self.params })
    }
}

/// A native object reachable from script.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    /// The full member table. Read once at registration.
    fn members(&self) -> &'static [MemberDescriptor];

    /// Run a method. `args` has already been checked against the method's
    /// arity. Errors become the response's `error` field.
    async fn invoke(
        &self,
        member: &str,
        args: Vec<Value>,
        events: &EventEmitter,
    ) -> Result<Value, CapabilityError>;

    /// Wait for background work the object started on its own. Called once
    /// during bridge shutdown, while events can still be delivered.
    async fn shutdown(&self) {}
}

/// Registry entry. Immutable after registration.
pub struct RegisteredObject {
    id: String,
    members: Vec<MemberDescriptor>,
    capability: Arc<dyn Capability>,
    emitter: EventEmitter,
}

impl RegisteredObject {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| m.kind == MemberKind::Method)
    }

    pub fn events(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| m.kind == MemberKind::Event)
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub(crate) fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }
}

/// Maps object ids to registered capability objects.
pub struct ObjectRegistry {
    objects: RwLock<HashMap<String, Arc<RegisteredObject>>>,
    outbound: UnboundedSender<Outbound>,
}

impl ObjectRegistry {
    pub(crate) fn new(outbound: UnboundedSender<Outbound>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            outbound,
        }
    }

    /// Register `capability` under `id`, subscribing to each of its events.
    pub fn register(
        &self,
        id: impl Into<String>,
        capability: Arc<dyn Capability>,
    ) -> Result<(), BridgeError> {
        let id = id.into();
        let mut objects = self.write();
        if objects.contains_key(&id) {
            return Err(BridgeError::DuplicateId(id));
        }

        let members = capability.members().to_vec();
        let emitter = EventEmitter::subscribe(&id, &members, self.outbound.clone());
        let entry = RegisteredObject {
            id: id.clone(),
            members,
            capability,
            emitter,
        };

        info!(
            object = %id,
            methods = entry.methods().count(),
            events = entry.events().count(),
            "object registered"
        );
        objects.insert(id, Arc::new(entry));
        Ok(())
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<RegisteredObject>, BridgeError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownObject(id.to_string()))
    }

    /// Remove `id` and detach its event subscriptions. Returns false if the
    /// id was not registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.write().remove(id);
        match removed {
            Some(entry) => {
                entry.emitter.detach();
                debug!(object = %id, "object unregistered");
                true
            }
            None => false,
        }
    }

    /// Let every object finish its own background work.
    pub async fn drain(&self) {
        let entries: Vec<Arc<RegisteredObject>> = self.read().values().cloned().collect();
        for entry in entries {
            entry.capability.shutdown().await;
        }
    }

    /// Unregister everything. Used during shutdown.
    pub fn unregister_all(&self) {
        for id in self.ids() {
            self.unregister(&id);
        }
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// `{id: {"methods": [...], "events": [...]}}` for the script bootstrap.
    pub fn manifest(&self) -> Value {
        let objects = self.read();
        let mut manifest = serde_json::Map::new();
        for (id, entry) in objects.iter() {
            let methods: Vec<Value> = entry.methods().map(|m| m.manifest_entry()).collect();
            let events: Vec<Value> = entry.events().map(|m| m.manifest_entry()).collect();
            manifest.insert(id.clone(), json!({ "methods": methods, "events": events }));
        }
        Value::Object(manifest)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<RegisteredObject>>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<RegisteredObject>>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    struct Echo;

    const ECHO_MEMBERS: &[MemberDescriptor] = &[
        MemberDescriptor::method("echo", &["value"]),
        MemberDescriptor::event("echoed", &["value"]),
    ];

    #[async_trait]
    impl Capability for Echo {
        fn members(&self) -> &'static [MemberDescriptor] {
            ECHO_MEMBERS
        }

        async fn invoke(
            &self,
            _member: &str,
            mut args: Vec<Value>,
            events: &EventEmitter,
        ) -> Result<Value, CapabilityError> {
            let value = args.pop().unwrap_or(Value::Null);
            events.emit("echoed", vec![value.clone()]);
            Ok(value)
        }
    }

    fn registry() -> (ObjectRegistry, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ObjectRegistry::new(tx), rx)
    }

    #[test]
    fn register_and_resolve() {
        let (reg, _rx) = registry();
        reg.register("echo", Arc::new(Echo)).unwrap();
        let entry = reg.resolve("echo").unwrap();
        assert_eq!(entry.id(), "echo");
        assert_eq!(entry.methods().count(), 1);
        assert_eq!(entry.events().count(), 1);
        assert_eq!(entry.member("echo").unwrap().arity(), 1);
    }

    #[test]
    fn duplicate_id_rejected() {
        let (reg, _rx) = registry();
        reg.register("echo", Arc::new(Echo)).unwrap();
        let err = reg.register("echo", Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateId(id) if id == "echo"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_object_rejected() {
        let (reg, _rx) = registry();
        assert!(matches!(
            reg.resolve("ghost"),
            Err(BridgeError::UnknownObject(_))
        ));
    }

    #[test]
    fn unregister_detaches_events() {
        let (reg, mut rx) = registry();
        reg.register("echo", Arc::new(Echo)).unwrap();
        let emitter = reg.resolve("echo").unwrap().emitter().clone();

        assert!(reg.unregister("echo"));
        assert!(!reg.unregister("echo"));
        assert!(reg.is_empty());
        assert!(!emitter.emit("echoed", vec![Value::Null]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reregister_after_unregister() {
        let (reg, _rx) = registry();
        reg.register("echo", Arc::new(Echo)).unwrap();
        reg.unregister("echo");
        assert!(reg.register("echo", Arc::new(Echo)).is_ok());
    }

    #[test]
    fn manifest_lists_methods_and_events() {
        let (reg, _rx) = registry();
        reg.register("echo", Arc::new(Echo)).unwrap();
        let manifest = reg.manifest();
        assert_eq!(
            manifest["echo"]["methods"],
            json!([{"name": "echo", "params": ["value"]}])
        );
        assert_eq!(
            manifest["echo"]["events"],
            json!([{"name": "echoed", "params": ["value"]}])
        );
    }

    #[test]
    fn ids_are_sorted() {
        let (reg, _rx) = registry();
        reg.register("b", Arc::new(Echo)).unwrap();
        reg.register("a", Arc::new(Echo)).unwrap();
        assert_eq!(reg.ids(), vec!["a".to_string(), "b".to_string()]);
        reg.unregister_all();
        assert!(reg.is_empty());
    }
}
