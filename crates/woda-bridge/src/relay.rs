//! Signal relay: forwards capability events onto the outbound queue.
//!
//! Each registered object gets one [`EventEmitter`] holding a subscription per
//! declared event, created once at registration. Firing never blocks: the
//! message goes onto an unbounded FIFO drained by the outbox, so events of the
//! same (object, member) pair keep their firing order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

use crate::ipc::{EventMessage, Outbound, Value};
use crate::registry::{MemberDescriptor, MemberKind};

struct Subscription {
    attached: AtomicBool,
}

/// Handle a capability uses to fire its declared events.
#[derive(Clone)]
pub struct EventEmitter {
    object_id: Arc<str>,
    subscriptions: Arc<HashMap<&'static str, Subscription>>,
    outbound: UnboundedSender<Outbound>,
}

impl EventEmitter {
    /// Subscribe to every event in `members`.
    pub(crate) fn subscribe(
        object_id: &str,
        members: &[MemberDescriptor],
        outbound: UnboundedSender<Outbound>,
    ) -> Self {
        let subscriptions = members
            .iter()
            .filter(|m| m.kind == MemberKind::Event)
            .map(|m| {
                (
                    m.name,
                    Subscription {
                        attached: AtomicBool::new(true),
                    },
                )
            })
            .collect();
        Self {
            object_id: Arc::from(object_id),
            subscriptions: Arc::new(subscriptions),
            outbound,
        }
    }

    /// An emitter not attached to any bridge. Fired events land on the
    /// returned receiver; used to drive a capability directly.
    pub fn standalone(
        object_id: &str,
        members: &[MemberDescriptor],
    ) -> (Self, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::subscribe(object_id, members, tx), rx)
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Fire `member` with its raw arguments. Returns whether the event was
    /// queued; every rejection is logged.
    pub fn emit(&self, member: &str, args: Vec<Value>) -> bool {
        let Some(sub) = self.subscriptions.get(member) else {
            warn!(object = %self.object_id, member, "event not declared; dropped");
            return false;
        };
        if !sub.attached.load(Ordering::Acquire) {
            warn!(object = %self.object_id, member, "event fired after unregister; dropped");
            return false;
        }

        let message = EventMessage {
            object: self.object_id.to_string(),
            member: member.to_string(),
            payload: normalize_args(args),
        };

        match self.outbound.send(Outbound::Event(message)) {
            Ok(()) => {
                debug!(object = %self.object_id, member, "event queued");
                true
            }
            Err(_) => {
                error!(object = %self.object_id, member, "outbound queue closed; event lost");
                false
            }
        }
    }

    /// Detach every subscription. Later firings are dropped with a warning.
    pub(crate) fn detach(&self) {
        for sub in self.subscriptions.values() {
            sub.attached.store(false, Ordering::Release);
        }
    }
}

/// Zero args become `null`, one arg is passed through, more become a list.
pub fn normalize_args(mut args: Vec<Value>) -> Value {
    match args.len() {
        0 => Value::Null,
        1 => args.pop().unwrap_or(Value::Null),
        _ => Value::Array(args),
    }
}
