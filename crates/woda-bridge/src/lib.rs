//! Native RPC bridge between untrusted page script and privileged
//! capability objects.
//!
//! Provides:
//! - An object registry with static member tables (methods and events)
//! - A dispatcher for typed invocations and legacy tagged payloads
//! - A signal relay that turns capability events into outbound frames
//! - An outbox that queues frames while the transport is unavailable
//! - A bounded worker pool for blocking I/O
//! - Optional `wry` glue (feature `webview`)

mod bridge;
pub mod dispatcher;
pub mod ipc;
pub mod outbox;
pub mod registry;
pub mod relay;
pub mod transport;
#[cfg(feature = "webview")]
pub mod webview;
pub mod worker;

pub use bridge::{Bridge, BridgeOptions};
pub use dispatcher::Dispatcher;
pub use ipc::{ErrorInfo, EventMessage, Inbound, Invocation, Outbound, Response, TaggedMessage, Value};
pub use registry::{Capability, MemberDescriptor, MemberKind, ObjectRegistry, RegisteredObject};
pub use relay::{normalize_args, EventEmitter};
pub use transport::{ChannelTransport, FrameReceiver, Transport};
pub use worker::WorkerPool;
