//! Wire protocol between page-side script and the native bridge.
//!
//! Messages flow in both directions as JSON text frames:
//! - **Script -> native**: invocations (`requestId`/`object`/`member`/`args`)
//!   and legacy tagged payloads (`{"type": ..., ...fields}`).
//! - **Native -> script**: responses correlated by `requestId`, and events
//!   (`object`/`member`/`payload`) relayed from capability objects.

use serde::{Deserialize, Serialize};
use serde_json::Map;
use woda_common::BridgeError;

/// Values carried across the bridge. Binary payloads travel as base64
/// data-URI strings.
pub type Value = serde_json::Value;

/// A typed call from script to a registered object's method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(rename = "requestId")]
    pub request_id: Value,
    pub object: String,
    pub member: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Human-readable failure attached to a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

/// Exactly one per [`Invocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "requestId")]
    pub request_id: Value,
    pub result: Value,
    pub error: Option<ErrorInfo>,
}

impl Response {
    pub fn ok(request_id: Value, result: Value) -> Self {
        Self {
            request_id,
            result,
            error: None,
        }
    }

    pub fn err(request_id: Value, message: impl Into<String>) -> Self {
        Self {
            request_id,
            result: Value::Null,
            error: Some(ErrorInfo {
                message: message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// An event fired by a registered object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub object: String,
    pub member: String,
    pub payload: Value,
}

/// Legacy `{"type": ..., ...fields}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TaggedMessage {
    /// The whole message as a single JSON object, `type` included.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("type".into(), Value::String(self.kind.clone()));
        Value::Object(map)
    }
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Invoke(Invocation),
    Tagged(TaggedMessage),
}

impl Inbound {
    /// Parse a raw frame. Anything that is neither a well-formed invocation
    /// nor a tagged payload is a [`BridgeError::MalformedMessage`].
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::MalformedMessage(format!("invalid JSON: {e}")))?;

        let obj = value
            .as_object()
            .ok_or_else(|| BridgeError::MalformedMessage("frame is not a JSON object".into()))?;

        if !obj.contains_key("object") && obj.get("type").is_some_and(Value::is_string) {
            return serde_json::from_value(value)
                .map(Inbound::Tagged)
                .map_err(|e| BridgeError::MalformedMessage(e.to_string()));
        }

        serde_json::from_value(value)
            .map(Inbound::Invoke)
            .map_err(|e| BridgeError::MalformedMessage(e.to_string()))
    }
}

/// Any frame travelling from native to script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Response(Response),
    Event(EventMessage),
}

impl Outbound {
    pub fn to_json(&self) -> String {
        // Both variants are plain structs of JSON values.
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}

/// JavaScript bootstrap that builds one proxy object per registered id.
///
/// `manifest` is the registry manifest; `__WODA_MANIFEST__` in the template
/// is replaced with it. Outbound frames are delivered by evaluating
/// [`js_receive`] in the page.
const INIT_SCRIPT_TEMPLATE: &str = r#"
(function() {
    var manifest = __WODA_MANIFEST__;
    var pending = {};
    var listeners = {};
    var nextId = 1;

    function post(frame) {
        window.ipc.postMessage(JSON.stringify(frame));
    }

    function makeProxy(objectId, spec) {
        var proxy = {};
        spec.methods.forEach(function(m) {
            proxy[m.name] = function() {
                var args = Array.prototype.slice.call(arguments);
                var requestId = nextId++;
                return new Promise(function(resolve, reject) {
                    pending[requestId] = { resolve: resolve, reject: reject };
                    post({ requestId: requestId, object: objectId, member: m.name, args: args });
                });
            };
        });
        spec.events.forEach(function(e) {
            var key = objectId + "." + e.name;
            listeners[key] = [];
            proxy[e.name] = {
                connect: function(cb) { listeners[key].push(cb); return true; },
                disconnect: function(cb) {
                    var idx = listeners[key].indexOf(cb);
                    if (idx !== -1) listeners[key].splice(idx, 1);
                    return true;
                }
            };
        });
        return proxy;
    }

    window.woda = window.woda || {};
    window.woda.objects = {};
    Object.keys(manifest).forEach(function(id) {
        window.woda.objects[id] = makeProxy(id, manifest[id]);
    });

    window.woda.send = function(type, fields) {
        var frame = Object.assign({}, fields || {}, { type: type });
        post(frame);
    };

    window.woda._receive = function(frame) {
        if (frame.requestId !== undefined && pending[frame.requestId]) {
            var p = pending[frame.requestId];
            delete pending[frame.requestId];
            if (frame.error) { p.reject(new Error(frame.error.message)); }
            else { p.resolve(frame.result); }
            return;
        }
        var cbs = listeners[frame.object + "." + frame.member] || [];
        cbs.forEach(function(cb) {
            if (Array.isArray(frame.payload)) { cb.apply(null, frame.payload); }
            else { cb(frame.payload); }
        });
    };
})();
"#;

/// Render the init script for a registry manifest.
pub fn init_script(manifest: &Value) -> String {
    let manifest_json = serde_json::to_string(manifest).unwrap_or_else(|_| "{}".to_string());
    INIT_SCRIPT_TEMPLATE.replace("__WODA_MANIFEST__", &manifest_json)
}

/// JS snippet that hands one outbound frame to the page.
pub fn js_receive(frame_json: &str) -> String {
    format!("window.woda._receive({frame_json});")
}
