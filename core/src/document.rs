//! Script resources for the relay transport.
//!
//! # Design
//! `Document` stands in for the page the relay injects script elements
//! into. Appending a script starts fetching its source; when the body
//! arrives it is "executed", which for a relay script means calling the
//! named callback on the `CallbackTable` with the JSON argument. Removing a
//! script only detaches it: there is no way to abort the fetch, so a late
//! body still executes and relies on the table to ignore a retired name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::transport::relay::CallbackTable;

/// Identifies one attached script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId(pub u64);

/// Where relay scripts are attached.
pub trait Document: Send + Sync {
    /// Attach a script whose source is `src` and start loading it.
    fn append_script(&self, src: &str) -> ScriptId;

    /// Detach a script. Unknown ids are ignored.
    fn remove_script(&self, id: ScriptId);
}

/// A `Document` that loads scripts over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDocument {
    client: reqwest::Client,
    globals: CallbackTable,
    scripts: Arc<Mutex<HashMap<ScriptId, String>>>,
    next_id: Arc<AtomicU64>,
}

impl HttpDocument {
    pub fn new(client: reqwest::Client, globals: CallbackTable) -> Self {
        Self {
            client,
            globals,
            scripts: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sources of the scripts currently attached.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl Document for HttpDocument {
    fn append_script(&self, src: &str) -> ScriptId {
        let id = ScriptId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, src.to_string());

        let client = self.client.clone();
        let globals = self.globals.clone();
        let src = src.to_string();
        tokio::spawn(async move {
            let body = match client.get(&src).send().await {
                Ok(response) if response.status().is_success() => response.text().await,
                Ok(response) => {
                    debug!(status = %response.status(), %src, "relay script failed to load");
                    return;
                }
                Err(e) => {
                    debug!(error = %e, %src, "relay script failed to load");
                    return;
                }
            };
            match body {
                Ok(body) => {
                    execute_script(&globals, &body);
                }
                Err(e) => debug!(error = %e, %src, "relay script body unreadable"),
            }
        });
        id
    }

    fn remove_script(&self, id: ScriptId) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Run a relay script body against `globals`.
///
/// Returns whether a live callback received the value.
pub fn execute_script(globals: &CallbackTable, body: &str) -> bool {
    let Some((name, argument)) = parse_script(body) else {
        warn!("malformed relay script dropped");
        return false;
    };
    let value = match serde_json::from_str(argument) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, callback = name, "relay script argument is not JSON");
            return false;
        }
    };
    let delivered = globals.invoke(name, value);
    if !delivered {
        debug!(callback = name, "relay script called a retired callback");
    }
    delivered
}

/// Split `name(<argument>)` with an optional trailing `;`.
pub fn parse_script(body: &str) -> Option<(&str, &str)> {
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    let body = body.strip_suffix(')')?;
    let open = body.find('(')?;
    let name = body[..open].trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    valid.then(|| (name, body[open + 1..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_script_splits_name_and_argument() {
        assert_eq!(
            parse_script(r#"relay_ab({"ok":true});"#),
            Some(("relay_ab", r#"{"ok":true}"#))
        );
        assert_eq!(parse_script("  cb ( 1 )  \n"), Some(("cb", "1")));
    }

    #[test]
    fn parse_script_rejects_other_code() {
        assert_eq!(parse_script("not a call"), None);
        assert_eq!(parse_script("(1)"), None);
        assert_eq!(parse_script("a b(1)"), None);
    }

    #[test]
    fn execute_script_delivers_to_live_callback() {
        let globals = CallbackTable::new();
        let mut rx = globals.register("cb_1").unwrap();
        assert!(execute_script(&globals, r#"cb_1({"n":1})"#));
        assert_eq!(rx.try_recv().unwrap(), serde_json::json!({"n": 1}));
        assert!(!globals.is_live("cb_1"));
    }

    #[test]
    fn execute_script_ignores_unknown_callback_and_bad_json() {
        let globals = CallbackTable::new();
        let _rx = globals.register("cb_2").unwrap();
        assert!(!execute_script(&globals, "other(1)"));
        assert!(!execute_script(&globals, "cb_2({broken)"));
        assert!(globals.is_live("cb_2"));
    }

    #[tokio::test]
    async fn remove_script_detaches_only_that_script() {
        let doc = HttpDocument::new(reqwest::Client::new(), CallbackTable::new());
        let a = doc.append_script("http://127.0.0.1:1/a.js");
        let b = doc.append_script("http://127.0.0.1:1/b.js");
        assert_ne!(a, b);
        doc.remove_script(a);
        doc.remove_script(a);
        assert_eq!(doc.scripts(), vec!["http://127.0.0.1:1/b.js".to_string()]);
    }
}
