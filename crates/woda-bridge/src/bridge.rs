use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use woda_common::BridgeError;

use crate::dispatcher::Dispatcher;
use crate::ipc;
use crate::outbox::Outbox;
use crate::registry::{Capability, ObjectRegistry};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// How often frames refused by the transport are retried.
    pub retry_interval: Duration,
    /// Cap on frames held while the transport refuses them.
    pub max_pending: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(250),
            max_pending: 10_000,
        }
    }
}

/// Registry, dispatcher and outbox wired to one transport.
pub struct Bridge {
    registry: Arc<ObjectRegistry>,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    outbox: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Build the bridge and spawn its outbox. Must be called from inside a
    /// tokio runtime.
    pub fn start(transport: Arc<dyn Transport>, options: BridgeOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(ObjectRegistry::new(tx.clone()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), tx);
        let shutdown = CancellationToken::new();

        let outbox = Outbox::new(rx, transport, options.retry_interval, options.max_pending);
        let handle = tokio::spawn(outbox.run(shutdown.clone()));

        debug!(retry_ms = options.retry_interval.as_millis() as u64, "bridge started");
        Self {
            registry,
            dispatcher,
            shutdown,
            outbox: Some(handle),
        }
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn register(
        &self,
        id: impl Into<String>,
        capability: Arc<dyn Capability>,
    ) -> Result<(), BridgeError> {
        self.registry.register(id, capability)
    }

    /// Handle one raw inbound frame.
    pub fn handle(&self, raw: &str) {
        self.dispatcher.handle(raw);
    }

    /// Script bootstrap for everything registered so far.
    pub fn init_script(&self) -> String {
        ipc::init_script(&self.registry.manifest())
    }

    /// Finish in-flight calls and capability background work, detach every object and flush the outbox.
    pub async fn shutdown(mut self) {
        self.dispatcher.shutdown().await;
        self.registry.drain().await;
        self.registry.unregister_all();
        self.shutdown.cancel();
        if let Some(handle) = self.outbox.take() {
            let _ = handle.await;
        }
        info!("bridge stopped");
    }
}
