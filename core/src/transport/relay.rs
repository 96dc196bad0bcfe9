//! Cross-origin script relay transport.
//!
//! # Design
//! The relay cannot read a response; it can only inject a script and wait
//! for that script to call a global function by name. `CallbackTable` is
//! that global namespace: each in-flight relay owns exactly one token, which
//! maps to a one-shot completion slot. Invoking a token consumes the slot,
//! and clearing it drops the slot, so any later call for the same token is
//! a no-op. Tokens come from v4 UUIDs and are never reused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::document::Document;
use crate::error::DispatchError;
use crate::query::{append_query, Params};
use crate::request::{FailureCode, Payload, RequestSpec};
use crate::transport::{Completion, Started, Transport, TransportHandle};

const TOKEN_PREFIX: &str = "relay_";
const TOKEN_ATTEMPTS: usize = 4;

/// Token → pending completion slot, shared by every relay request.
#[derive(Debug, Clone, Default)]
pub struct CallbackTable {
    slots: Arc<Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table.
    pub fn global() -> &'static CallbackTable {
        static GLOBAL: OnceLock<CallbackTable> = OnceLock::new();
        GLOBAL.get_or_init(CallbackTable::new)
    }

    /// Claim `token`. Fails if it is already live.
    pub fn register(&self, token: &str) -> Result<oneshot::Receiver<serde_json::Value>, DispatchError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(token) {
            return Err(DispatchError::RelayTokenInUse(token.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(token.to_string(), tx);
        Ok(rx)
    }

    /// Claim a freshly generated token.
    pub fn register_fresh(&self) -> Result<(String, oneshot::Receiver<serde_json::Value>), DispatchError> {
        for _ in 0..TOKEN_ATTEMPTS {
            let token = new_token();
            match self.register(&token) {
                Ok(rx) => return Ok((token, rx)),
                Err(DispatchError::RelayTokenInUse(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(DispatchError::RelayTokenExhausted)
    }

    /// Call the function registered under `token`.
    ///
    /// Returns `false`, with no other effect, if the token is not live.
    pub fn invoke(&self, token: &str, value: serde_json::Value) -> bool {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
        match slot {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Retire `token`. Clearing a retired token does nothing.
    pub fn clear(&self, token: &str) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    pub fn is_live(&self, token: &str) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_token() -> String {
    format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple())
}

/// Transport B: one-shot, non-abortable script relay.
#[derive(Clone)]
pub struct RelayTransport {
    document: Arc<dyn Document>,
    globals: CallbackTable,
}

impl std::fmt::Debug for RelayTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayTransport")
            .field("globals", &self.globals)
            .finish_non_exhaustive()
    }
}

impl RelayTransport {
    pub fn new(document: Arc<dyn Document>, globals: CallbackTable) -> Self {
        Self { document, globals }
    }

    pub fn globals(&self) -> &CallbackTable {
        &self.globals
    }
}

impl Transport for RelayTransport {
    fn start(&self, spec: &RequestSpec) -> Result<Started, DispatchError> {
        let (token, rx) = self.globals.register_fresh()?;

        let mut query = Params::new().with(spec.relay_param.as_str(), token.as_str());
        if let Some(body) = &spec.body {
            for (key, value) in body.iter() {
                query.insert(key, value.clone());
            }
        }
        let src = append_query(spec.target().unwrap_or_default(), &query);
        debug!(%token, %src, "relay request");
        let script = self.document.append_script(&src);

        let completion = Box::pin(async move {
            match rx.await {
                Ok(value) => Completion::Success(Payload::Json(value)),
                // the slot was retracted; only the timeout can settle now
                Err(_) => std::future::pending().await,
            }
        });
        Ok(Started {
            handle: TransportHandle::Relay { token, script },
            completion,
        })
    }

    fn release(&self, handle: TransportHandle) {
        if let TransportHandle::Relay { token, script } = handle {
            self.globals.clear(&token);
            self.document.remove_script(script);
        }
    }

    fn timeout_code(&self) -> FailureCode {
        FailureCode::RelayTimeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ScriptId;
    use std::collections::HashSet;

    #[derive(Default)]
    struct RecordingDocument {
        scripts: Mutex<HashMap<ScriptId, String>>,
    }

    impl Document for RecordingDocument {
        fn append_script(&self, src: &str) -> ScriptId {
            let mut scripts = self.scripts.lock().unwrap();
            let id = ScriptId(scripts.len() as u64 + 1);
            scripts.insert(id, src.to_string());
            id
        }

        fn remove_script(&self, id: ScriptId) {
            self.scripts.lock().unwrap().remove(&id);
        }
    }

    #[test]
    fn register_rejects_live_token() {
        let table = CallbackTable::new();
        let _rx = table.register("relay_x").unwrap();
        assert!(matches!(
            table.register("relay_x"),
            Err(DispatchError::RelayTokenInUse(_))
        ));
    }

    #[test]
    fn invoke_is_single_shot() {
        let table = CallbackTable::new();
        let mut rx = table.register("relay_y").unwrap();
        assert!(table.invoke("relay_y", serde_json::json!(1)));
        assert!(!table.invoke("relay_y", serde_json::json!(2)));
        assert_eq!(rx.try_recv().unwrap(), serde_json::json!(1));
    }

    #[test]
    fn invoke_after_clear_is_a_no_op() {
        let table = CallbackTable::new();
        let _rx = table.register("relay_z").unwrap();
        table.clear("relay_z");
        table.clear("relay_z");
        assert!(!table.invoke("relay_z", serde_json::json!(null)));
        assert!(table.is_empty());
    }

    #[test]
    fn fresh_tokens_are_distinct() {
        let table = CallbackTable::new();
        let mut seen = HashSet::new();
        let mut receivers = Vec::new();
        for _ in 0..500 {
            let (token, rx) = table.register_fresh().unwrap();
            assert!(token.starts_with("relay_"));
            assert_eq!(token.len(), "relay_".len() + 32);
            assert!(seen.insert(token));
            receivers.push(rx);
        }
        assert_eq!(table.len(), 500);
    }

    #[test]
    fn start_injects_token_and_body_into_script_url() {
        let document = Arc::new(RecordingDocument::default());
        let transport = RelayTransport::new(document.clone(), CallbackTable::new());
        let spec = RequestSpec::new("http://api.test/lookup")
            .relay_param("cb")
            .data(Params::new().with("q", "cat"));

        let started = transport.start(&spec).unwrap();
        let TransportHandle::Relay { token, script } = started.handle.clone() else {
            panic!("expected relay handle");
        };
        let src = document.scripts.lock().unwrap()[&script].clone();
        assert_eq!(src, format!("http://api.test/lookup?cb={token}&q=cat"));
        assert!(transport.globals().is_live(&token));
    }

    #[tokio::test]
    async fn invoked_callback_completes_with_json_payload() {
        let document = Arc::new(RecordingDocument::default());
        let transport = RelayTransport::new(document, CallbackTable::new());
        let started = transport.start(&RequestSpec::new("/relay")).unwrap();
        let TransportHandle::Relay { token, .. } = &started.handle else {
            panic!("expected relay handle");
        };
        assert!(transport.globals().invoke(token, serde_json::json!({"ok": true})));
        assert_eq!(
            started.completion.await,
            Completion::Success(Payload::Json(serde_json::json!({"ok": true})))
        );
    }

    #[test]
    fn release_clears_callback_and_script() {
        let document = Arc::new(RecordingDocument::default());
        let transport = RelayTransport::new(document.clone(), CallbackTable::new());
        let started = transport.start(&RequestSpec::new("/relay")).unwrap();
        let handle = started.handle.clone();
        transport.release(handle.clone());
        transport.release(handle);
        assert!(transport.globals().is_empty());
        assert!(document.scripts.lock().unwrap().is_empty());
    }
}
