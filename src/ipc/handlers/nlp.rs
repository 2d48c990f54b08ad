use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{require_store, today};
use crate::ipc::types::{AppState, Request};
use crate::nlp::{Interpreter, Outcome};
use crate::store::RecordStore;
use serde_json::json;

/// Voice input arrives here already transcribed; it is handled exactly like
/// typed text.
fn nlp_run(store: &RecordStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let text = params
        .get("text")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing text"))?;
    let outcome = Interpreter::new(store, today()).run(text)?;
    Ok(match outcome {
        Outcome::Status(s) => json!({
            "kind": "status",
            "ok": s.ok,
            "message": s.message
        }),
        Outcome::Fragment(fragment) => json!({
            "kind": "fragment",
            "fragment": fragment
        }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "nlp.run" => require_store(state).and_then(|s| nlp_run(s, &req.params)),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
