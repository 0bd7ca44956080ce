//! Two-stage request validation.
//!
//! Stage one (shape) decides whether a frame is a request at all. Stage two
//! (payload) checks that the request carries what its kind needs. Neither
//! stage touches the registry.

use serde_json::Value;

use crate::errors::ProtocolError;
use crate::ids::IdentityId;
use crate::protocol::RequestKind;

/// A request that passed both checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// What the client asked for.
    pub kind: RequestKind,
    /// The identity named by `userId`.
    pub target: IdentityId,
}

/// Parse a text frame into JSON. Anything unparseable is malformed.
pub fn parse_frame(text: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(text).map_err(|_| ProtocolError::MalformedRequest)
}

/// Shape check: an object whose `type` is a known request kind and whose
/// `userId`, when present, is a string.
pub fn check_shape(frame: &Value) -> Result<RequestKind, ProtocolError> {
    let obj = frame.as_object().ok_or(ProtocolError::MalformedRequest)?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(RequestKind::from_wire)
        .ok_or(ProtocolError::MalformedRequest)?;
    match obj.get("userId") {
        None | Some(Value::Null | Value::String(_)) => Ok(kind),
        Some(_) => Err(ProtocolError::MalformedRequest),
    }
}

/// Payload check for a frame that already passed [`check_shape`].
///
/// Subscribe and Unsubscribe need a non-empty `userId`; CountSubscribers only
/// needs it present.
pub fn check_payload(kind: RequestKind, frame: &Value) -> Result<IdentityId, ProtocolError> {
    let target = frame
        .get("userId")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField)?;
    match kind {
        RequestKind::Subscribe | RequestKind::Unsubscribe if target.is_empty() => {
            Err(ProtocolError::MissingField)
        }
        _ => Ok(IdentityId::from_raw(target)),
    }
}

/// Run both checks over a raw text frame.
pub fn validate(text: &str) -> Result<Request, ProtocolError> {
    let frame = parse_frame(text)?;
    let kind = check_shape(&frame)?;
    let target = check_payload(kind, &frame)?;
    Ok(Request { kind, target })
}
