//! Gateway to the SDO AJAX service.
//!
//! The Moodle backend exposes a batch-call endpoint: the request body is a
//! list of `{index, methodname, args}` entries and the `sesskey` rides in
//! the query string alongside an `info` echo of the method name. This crate
//! always sends single-element batches. Responses come back either as a
//! matching list envelope or, from some singular methods, as a bare object;
//! both shapes carry an `error` field that must be inspected before the
//! payload is trusted.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::session::Session;

#[derive(Debug, Serialize)]
struct RpcCall<'a, A> {
    index: u32,
    methodname: &'a str,
    args: A,
}

/// JSON-RPC style gateway bound to an authenticated session.
#[derive(Debug, Clone)]
pub struct AjaxGateway {
    session: Session,
    service_url: String,
}

impl AjaxGateway {
    /// Build a gateway on the authenticator's session and endpoints.
    pub fn new(auth: &Authenticator) -> Self {
        Self {
            session: auth.session().clone(),
            service_url: auth.endpoints().ajax_service_url(),
        }
    }

    /// Invoke `method` with `args` and return the decoded envelope.
    ///
    /// A non-success HTTP status or a truthy `error` field in either
    /// envelope shape is an error; the payload is returned untouched
    /// otherwise.
    pub async fn call<A: Serialize>(&self, sesskey: &str, method: &str, args: A) -> Result<Value> {
        debug!("ajax call: {method}");
        let body = [RpcCall {
            index: 0,
            methodname: method,
            args,
        }];
        let query = [("sesskey", sesskey), ("info", method)];
        let page = self
            .session
            .post_json(&self.service_url, &query, &body)
            .await?
            .require_success()?;
        let envelope: Value = serde_json::from_str(&page.body)?;
        if let Some(message) = envelope_error(&envelope) {
            return Err(Error::Remote(message));
        }
        Ok(envelope)
    }
}

/// Pull a truthy `error` out of either envelope shape.
///
/// List envelopes report per-call errors on their first element; object
/// envelopes carry the field directly. `null`, `false`, `0` and the empty
/// string all mean "no error".
fn envelope_error(envelope: &Value) -> Option<String> {
    let item = match envelope {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let error = item.get("error")?;
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        // Moodle pairs a bare `error: true` with an `exception` object.
        Value::Bool(true) => Some(
            item.pointer("/exception/message")
                .and_then(Value::as_str)
                .unwrap_or("error reported without a message")
                .to_string(),
        ),
        other => Some(other.to_string()),
    }
}
