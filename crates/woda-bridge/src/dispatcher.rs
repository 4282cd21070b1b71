//! Routes inbound frames to registered capability objects.
//!
//! Typed invocations get exactly one response each. Legacy tagged payloads
//! (`{"type": ...}`) go through a route table onto the same capability
//! methods and get no response. Malformed frames are logged and dropped.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use futures_util::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use woda_common::{BridgeError, CapabilityError};

use crate::ipc::{Inbound, Invocation, Outbound, Response, TaggedMessage, Value};
use crate::registry::ObjectRegistry;

#[derive(Debug, Clone)]
struct TaggedRoute {
    object: String,
    member: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ObjectRegistry>,
    outbound: UnboundedSender<Outbound>,
    routes: Arc<RwLock<HashMap<String, TaggedRoute>>>,
    tasks: TaskTracker,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<ObjectRegistry>, outbound: UnboundedSender<Outbound>) -> Self {
        Self {
            registry,
            outbound,
            routes: Arc::new(RwLock::new(HashMap::new())),
            tasks: TaskTracker::new(),
        }
    }

    /// Send tagged payloads of type `kind` to `object.member`, passing the
    /// whole payload as the single argument.
    pub fn route_tagged(
        &self,
        kind: impl Into<String>,
        object: impl Into<String>,
        member: impl Into<String>,
    ) {
        let route = TaggedRoute {
            object: object.into(),
            member: member.into(),
        };
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind.into(), route);
    }

    /// Handle one raw inbound frame. Must be called from inside a tokio
    /// runtime; each call runs as its own task, so responses may complete
    /// out of order.
    pub fn handle(&self, raw: &str) {
        let inbound = match Inbound::parse(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(body_len = raw.len(), error = %e, "inbound frame rejected");
                return;
            }
        };

        let this = self.clone();
        match inbound {
            Inbound::Invoke(invocation) => {
                debug!(object = %invocation.object, member = %invocation.member, "invocation received");
                self.tasks.spawn(async move {
                    let response = this.invoke(invocation).await;
                    this.respond(response);
                });
            }
            Inbound::Tagged(message) => {
                debug!(kind = %message.kind, "tagged payload received");
                self.tasks.spawn(async move {
                    this.dispatch_tagged(message).await;
                });
            }
        }
    }

    /// Resolve and run one invocation, producing its response.
    pub async fn invoke(&self, invocation: Invocation) -> Response {
        let Invocation {
            request_id,
            object,
            member,
            args,
        } = invocation;

        match self.call(&object, &member, args).await {
            Ok(result) => Response::ok(request_id, result),
            Err(message) => {
                warn!(object = %object, member = %member, error = %message, "invocation failed");
                Response::err(request_id, message)
            }
        }
    }

    async fn call(&self, object: &str, member: &str, args: Vec<Value>) -> Result<Value, String> {
        let entry = self.registry.resolve(object).map_err(|e| e.to_string())?;

        let descriptor = entry.member(member).ok_or_else(|| {
            BridgeError::UnknownMember {
                object: object.to_string(),
                member: member.to_string(),
            }
            .to_string()
        })?;
        if !descriptor.is_method() {
            return Err(BridgeError::NotAMethod {
                object: object.to_string(),
                member: member.to_string(),
            }
            .to_string());
        }
        if args.len() != descriptor.arity() {
            return Err(BridgeError::ArityMismatch {
                member: member.to_string(),
                expected: descriptor.arity(),
                params: descriptor.params.join(", "),
                got: args.len(),
            }
            .to_string());
        }

        let call = entry.capability().invoke(member, args, entry.emitter());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result.map_err(|e: CapabilityError| e.to_string()),
            Err(_) => Err(format!("{object}.{member} failed unexpectedly")),
        }
    }

    async fn dispatch_tagged(&self, message: TaggedMessage) {
        let route = self
            .routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message.kind)
            .cloned();

        let Some(route) = route else {
            info!(kind = %message.kind, "unknown tagged payload type, ignoring");
            return;
        };

        if let Err(e) = self
            .call(&route.object, &route.member, vec![message.to_value()])
            .await
        {
            warn!(kind = %message.kind, error = %e, "tagged payload failed");
        }
    }

    fn respond(&self, response: Response) {
        if self.outbound.send(Outbound::Response(response)).is_err() {
            warn!("outbound queue closed; response dropped");
        }
    }

    /// Number of invocations still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Stop accepting work and wait for in-flight invocations to finish.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}
