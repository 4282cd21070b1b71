//! Hosting the bridge inside a `wry` webview.
//!
//! IPC bodies posted by the page are queued for the event loop; the event
//! loop hands them to the dispatcher and pushes outbound frames back with
//! `evaluate_script`. `wry::WebView` is not `Send`, so both ends stay on the
//! thread that owns the webview.

use std::sync::{Arc, Mutex};

use tracing::debug;
use wry::WebViewBuilder;

use crate::dispatcher::Dispatcher;
use crate::ipc::js_receive;
use crate::transport::FrameReceiver;

/// Inbound IPC bodies waiting for the event loop.
pub type IpcInbox = Arc<Mutex<Vec<String>>>;

/// Install the bridge bootstrap and an IPC handler that queues bodies.
pub fn attach_bridge<'a>(
    builder: WebViewBuilder<'a>,
    init_script: &str,
    inbox: IpcInbox,
) -> WebViewBuilder<'a> {
    builder
        .with_initialization_script(init_script)
        .with_ipc_handler(move |request| {
            let body = request.body().to_string();
            debug!(body_len = body.len(), "IPC message from page");
            inbox.lock().unwrap_or_else(|e| e.into_inner()).push(body);
        })
}

/// Hand every queued IPC body to the dispatcher.
pub fn dispatch_inbox(inbox: &IpcInbox, dispatcher: &Dispatcher) -> usize {
    let bodies = std::mem::take(&mut *inbox.lock().unwrap_or_else(|e| e.into_inner()));
    for body in &bodies {
        dispatcher.handle(body);
    }
    bodies.len()
}

/// Evaluate waiting frames in the page. A frame the page refuses is kept,
/// with everything behind it, for the next call.
pub fn deliver_frames(webview: &wry::WebView, frames: &mut FrameReceiver) -> usize {
    frames.deliver(|frame| webview.evaluate_script(&js_receive(frame)))
}
