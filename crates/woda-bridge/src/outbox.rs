//! Single writer to the transport.
//!
//! Responses and events share one FIFO. Frames the transport refuses stay in
//! a pending queue and are retried in order, so nothing is dropped while the
//! page is reloading or not yet listening. The queue is capped; past the cap
//! the oldest frames are discarded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::ipc::Outbound;
use crate::transport::Transport;

pub struct Outbox {
    rx: UnboundedReceiver<Outbound>,
    transport: Arc<dyn Transport>,
    pending: VecDeque<String>,
    max_pending: usize,
    dropped: usize,
    retry_interval: Duration,
}

impl Outbox {
    pub fn new(
        rx: UnboundedReceiver<Outbound>,
        transport: Arc<dyn Transport>,
        retry_interval: Duration,
        max_pending: usize,
    ) -> Self {
        Self {
            rx,
            transport,
            pending: VecDeque::new(),
            max_pending: max_pending.max(1),
            dropped: 0,
            retry_interval,
        }
    }

    /// Deliver frames until `shutdown` fires or every sender is gone.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(frame) => self.enqueue(&frame),
                    None => break,
                },
                _ = retry.tick(), if !self.pending.is_empty() => {
                    self.flush();
                }
                () = shutdown.cancelled() => {
                    while let Ok(frame) = self.rx.try_recv() {
                        self.enqueue(&frame);
                    }
                    break;
                }
            }
        }

        self.flush();
        if !self.pending.is_empty() {
            error!(
                count = self.pending.len(),
                "outbox stopped with undelivered frames"
            );
        }
    }

    fn enqueue(&mut self, frame: &Outbound) {
        self.pending.push_back(frame.to_json());
        if self.flush() == 0 && self.pending.len() > self.max_pending {
            self.pending.pop_front();
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                error!(
                    dropped = self.dropped,
                    cap = self.max_pending,
                    "outbox full, dropping oldest frames"
                );
            }
        }
    }

    /// Send pending frames in order, stopping at the first refusal.
    /// Returns how many were delivered.
    pub fn flush(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(frame) = self.pending.front() {
            match self.transport.send(frame) {
                Ok(()) => {
                    self.pending.pop_front();
                    delivered += 1;
                    if self.dropped > 0 {
                        warn!(dropped = self.dropped, "transport back after dropping frames");
                        self.dropped = 0;
                    }
                }
                Err(e) => {
                    if delivered == 0 {
                        debug!(pending = self.pending.len(), error = %e, "transport unavailable, holding frames");
                    } else {
                        warn!(pending = self.pending.len(), error = %e, "transport refused frame mid-flush");
                    }
                    break;
                }
            }
        }
        delivered
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Frames discarded since the transport last accepted one.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
