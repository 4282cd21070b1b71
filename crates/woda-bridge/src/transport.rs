//! Outbound side of the duplex channel to the script environment.
//!
//! The inbound side needs no trait: hosts hand raw frames to
//! [`crate::Dispatcher::handle`].

use std::collections::VecDeque;
use std::fmt::Display;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};
use woda_common::BridgeError;

/// Sink for serialized outbound frames. Only the outbox calls `send`.
pub trait Transport: Send + Sync {
    /// Deliver one frame. An error means the frame was not delivered and
    /// will be retried.
    fn send(&self, frame: &str) -> Result<(), BridgeError>;
}

/// Transport backed by an in-process channel. The receiving half is drained
/// by whatever owns the real page (a webview host, a socket writer, a test).
pub struct ChannelTransport {
    tx: UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: &str) -> Result<(), BridgeError> {
        self.tx
            .send(frame.to_string())
            .map_err(|_| BridgeError::TransportClosed)
    }
}

/// Receiving end of a [`ChannelTransport`] as seen by a page host. Frames
/// the page could not take are held and offered again, ahead of newer ones,
/// on the next delivery.
pub struct FrameReceiver {
    rx: UnboundedReceiver<String>,
    retry: VecDeque<String>,
    max_retry: usize,
}

impl FrameReceiver {
    pub fn new(rx: UnboundedReceiver<String>, max_retry: usize) -> Self {
        Self {
            rx,
            retry: VecDeque::new(),
            max_retry: max_retry.max(1),
        }
    }

    /// Offer held frames, then new ones, to `send` in order. Stops at the
    /// first failure and keeps that frame and everything after it.
    /// Returns how many were delivered.
    pub fn deliver<E: Display>(&mut self, mut send: impl FnMut(&str) -> Result<(), E>) -> usize {
        while let Ok(frame) = self.rx.try_recv() {
            self.retry.push_back(frame);
        }
        if self.retry.len() > self.max_retry {
            let excess = self.retry.len() - self.max_retry;
            self.retry.drain(..excess);
            error!(dropped = excess, "page frame backlog full, dropped oldest frames");
        }

        let mut delivered = 0;
        while let Some(frame) = self.retry.front() {
            match send(frame) {
                Ok(()) => {
                    self.retry.pop_front();
                    delivered += 1;
                }
                Err(e) => {
                    debug!(held = self.retry.len(), error = %e, "page refused frame, holding");
                    break;
                }
            }
        }
        delivered
    }

    /// Frames waiting for the next delivery.
    pub fn held(&self) -> usize {
        self.retry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_transport_delivers() {
        let (transport, mut rx) = ChannelTransport::new();
        transport.send("{\"a\":1}").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn channel_transport_closed_after_receiver_drop() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);
        assert!(matches!(
            transport.send("x"),
            Err(BridgeError::TransportClosed)
        ));
    }

    #[test]
    fn refused_frames_are_retried_first() {
        let (transport, rx) = ChannelTransport::new();
        let mut frames = FrameReceiver::new(rx, 100);
        transport.send("1").unwrap();
        transport.send("2").unwrap();

        let mut page = Vec::new();
        let delivered = frames.deliver(|frame| {
            if frame == "2" {
                return Err("page reloading");
            }
            page.push(frame.to_string());
            Ok(())
        });
        assert_eq!(delivered, 1);
        assert_eq!(frames.held(), 1);

        transport.send("3").unwrap();
        let delivered = frames.deliver(|frame| {
            page.push(frame.to_string());
            Ok::<(), &str>(())
        });
        assert_eq!(delivered, 2);
        assert_eq!(page, vec!["1", "2", "3"]);
        assert_eq!(frames.held(), 0);
    }

    #[test]
    fn backlog_is_capped() {
        let (transport, rx) = ChannelTransport::new();
        let mut frames = FrameReceiver::new(rx, 2);
        for n in 0..4 {
            transport.send(&n.to_string()).unwrap();
        }
        assert_eq!(frames.deliver(|_| Err("closed")), 0);
        assert_eq!(frames.held(), 2);

        let mut page = Vec::new();
        frames.deliver(|frame| {
            page.push(frame.to_string());
            Ok::<(), &str>(())
        });
        assert_eq!(page, vec!["2", "3"]);
    }
}
