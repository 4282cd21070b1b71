//! Line-framed transport over a byte sink.

use std::io::{ErrorKind, Stdout, Write};
use std::sync::Mutex;

use woda_bridge::Transport;
use woda_common::BridgeError;

/// Writes each frame followed by a newline and flushes.
pub struct LineTransport<W> {
    out: Mutex<W>,
}

pub type StdoutTransport = LineTransport<Stdout>;

impl<W: Write + Send> LineTransport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl StdoutTransport {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Transport for LineTransport<W> {
    fn send(&self, frame: &str) -> Result<(), BridgeError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{frame}")
            .and_then(|()| out.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe => BridgeError::TransportClosed,
                _ => BridgeError::Transport(e.to_string()),
            })
    }
}
