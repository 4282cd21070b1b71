//! Code execution capability exposed as `codeExecutor`.
//!
//! Snippets run in a fresh interpreter process with the privileges of the
//! host. There is no sandboxing of the evaluated code.

pub mod interpreter;
pub mod sanitize;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use woda_bridge::{Capability, EventEmitter, MemberDescriptor, Value, WorkerPool};
use woda_common::CapabilityError;

use crate::download::PdfDownloader;
use interpreter::Interpreter;
use sanitize::clean_snippet;

pub const OBJECT_ID: &str = "codeExecutor";

pub const MEMBERS: &[MemberDescriptor] = &[
    MemberDescriptor::method("execute", &["code"]),
    MemberDescriptor::method("executeSignal", &["message"]),
    MemberDescriptor::event("codeResultReady", &["output"]),
];

#[derive(Clone)]
pub struct CodeExecutor {
    interpreter: Interpreter,
    downloads: PdfDownloader,
    workers: WorkerPool,
}

impl CodeExecutor {
    pub fn new(interpreter: Interpreter, downloads: PdfDownloader, workers: WorkerPool) -> Self {
        Self {
            interpreter,
            downloads,
            workers,
        }
    }

    /// Clean and evaluate `code`, then emit exactly one `codeResultReady`
    /// carrying stdout or the failure reason. Returns the same text.
    pub async fn execute(&self, code: &str, events: &EventEmitter) -> String {
        let snippet = clean_snippet(code);
        let interpreter = self.interpreter.clone();
        debug!(
            code_len = snippet.len(),
            program = interpreter.program(),
            "evaluating snippet"
        );

        let output = match self.workers.run(move || interpreter.run(&snippet)).await {
            Ok(Ok(stdout)) => stdout,
            Ok(Err(CapabilityError::Evaluation(reason))) => reason,
            Ok(Err(e)) | Err(e) => e.to_string(),
        };

        events.emit("codeResultReady", vec![Value::from(output.clone())]);
        output
    }

    /// Generic `{type, ...fields}` entry point. Unknown types and
    /// non-object messages are logged and ignored; nothing here fails.
    pub async fn execute_signal(&self, message: &Value, events: &EventEmitter) {
        let Some(fields) = message.as_object() else {
            info!("Received from script: {message}");
            return;
        };

        match fields.get("type").and_then(Value::as_str) {
            Some("executePython") => {
                let code = fields.get("code").and_then(Value::as_str).unwrap_or_default();
                self.execute(code, events).await;
            }
            Some("downloadPDF") => match self.downloads.download(fields).await {
                Ok(Some(path)) => info!(path = %path.display(), "PDF download complete"),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Error saving PDF"),
            },
            _ => warn!("Received unknown type from script: {message}"),
        }
    }
}

#[async_trait]
impl Capability for CodeExecutor {
    fn members(&self) -> &'static [MemberDescriptor] {
        MEMBERS
    }

    async fn invoke(
        &self,
        member: &str,
        args: Vec<Value>,
        events: &EventEmitter,
    ) -> Result<Value, CapabilityError> {
        match member {
            "execute" => {
                let code = args.first().and_then(Value::as_str).ok_or_else(|| {
                    CapabilityError::InvalidArgument("code must be a string".into())
                })?;
                self.execute(code, events).await;
            }
            "executeSignal" => {
                let message = args.first().unwrap_or(&Value::Null);
                self.execute_signal(message, events).await;
            }
            other => {
                return Err(CapabilityError::InvalidArgument(format!(
                    "no such method: {other}"
                )))
            }
        }
        Ok(Value::Null)
    }
}
