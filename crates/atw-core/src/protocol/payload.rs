//! Typed inner payloads and their classification.
//!
//! The inner payload is the decrypted JSON object inside an envelope's
//! `pack` field.  Outbound payloads are built by the `*_request` functions;
//! inbound payloads are classified by their `t` tag into [`InboundPayload`].
//!
//! Classification is deliberately forgiving: an unrecognized tag becomes
//! [`InboundPayload::Unknown`] rather than an error, so the router can log
//! and move on.  Only a missing tag or a known tag with a broken body is an
//! error.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::status::{zip_patch, StatusPatch};

/// Errors produced while classifying an inbound payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload object has no `t` type tag.
    #[error("payload has no type tag")]
    MissingType,

    /// A recognized payload type failed to parse.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// ── Outbound payload builders ─────────────────────────────────────────────────

/// The key-binding handshake request.
pub fn bind_request(mac: &str) -> Value {
    json!({"mac": mac, "t": "bind", "uid": 0})
}

/// A full or partial status poll for the given wire codes.
pub fn status_request(mac: &str, cols: &[&str]) -> Value {
    json!({"mac": mac, "t": "status", "cols": cols})
}

/// A command setting the given code/value pairs, in matching order.
pub fn command_request(mac: &str, opt: &[&str], p: &[i64]) -> Value {
    json!({"mac": mac, "t": "cmd", "opt": opt, "p": p})
}

// ── Inbound payload types ─────────────────────────────────────────────────────

/// Successful bind reply carrying the device-specific session key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BindOk {
    #[serde(default)]
    pub mac: String,
    pub key: String,
}

/// Unsolicited telemetry broadcast: wire codes and values zipped by position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Telemetry {
    pub cols: Vec<String>,
    pub dat: Vec<Value>,
}

impl Telemetry {
    /// Zips `cols` and `dat` positionally into a status patch.
    pub fn to_patch(&self) -> StatusPatch {
        zip_patch(&self.cols, &self.dat)
    }
}

/// Command acknowledgment: echoes the codes set, with values in `p` or, for
/// single-field commands on some firmware, a lone scalar in `val`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandAck {
    pub opt: Vec<String>,
    #[serde(default)]
    pub p: Option<Vec<Value>>,
    #[serde(default)]
    pub val: Option<Value>,
}

impl CommandAck {
    /// Zips the acknowledged codes with their values into a status patch.
    ///
    /// Codes without a matching value are ignored, same as unknown codes.
    pub fn to_patch(&self) -> StatusPatch {
        let values: Vec<Value> = match (&self.p, &self.val) {
            (Some(p), _) => p.clone(),
            (None, Some(Value::Array(vals))) => vals.clone(),
            (None, Some(scalar)) => vec![scalar.clone()],
            (None, None) => Vec::new(),
        };
        zip_patch(&self.opt, &values)
    }
}

/// Device identity broadcast, sent in reply to a discovery scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceInfo {
    pub mac: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub ver: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A classified inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    BindOk(BindOk),
    Telemetry(Telemetry),
    CommandAck(CommandAck),
    DeviceInfo(DeviceInfo),
    /// A type tag this client does not handle; carried for logging.
    Unknown(String),
}

/// Classifies a decrypted payload by its `t` tag.
///
/// # Errors
///
/// Returns [`PayloadError::MissingType`] when the tag is absent and
/// [`PayloadError::Malformed`] when a recognized type has a broken body.
pub fn classify(payload: &Value) -> Result<InboundPayload, PayloadError> {
    let tag = payload
        .get("t")
        .and_then(Value::as_str)
        .ok_or(PayloadError::MissingType)?;

    match tag {
        "bindok" => parse("bindok", payload).map(InboundPayload::BindOk),
        "dat" => parse("dat", payload).map(InboundPayload::Telemetry),
        "res" => parse("res", payload).map(InboundPayload::CommandAck),
        "dev" => parse("dev", payload).map(InboundPayload::DeviceInfo),
        other => Ok(InboundPayload::Unknown(other.to_string())),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(
    kind: &'static str,
    payload: &Value,
) -> Result<T, PayloadError> {
    serde_json::from_value(payload.clone()).map_err(|source| PayloadError::Malformed { kind, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::FieldValue;

    #[test]
    fn test_bind_request_shape() {
        let payload = bind_request("f4911e000000");
        assert_eq!(
            payload,
            json!({"mac": "f4911e000000", "t": "bind", "uid": 0})
        );
    }

    #[test]
    fn test_status_request_preserves_code_order() {
        let payload = status_request("f4911e000000", &["Pow", "Mod", "WatBoxTemSet"]);
        assert_eq!(payload["t"], "status");
        assert_eq!(payload["cols"], json!(["Pow", "Mod", "WatBoxTemSet"]));
    }

    #[test]
    fn test_command_request_pairs_codes_and_values_in_order() {
        let payload = command_request("f4911e000000", &["Pow", "Mod"], &[1, 4]);
        assert_eq!(payload["opt"], json!(["Pow", "Mod"]));
        assert_eq!(payload["p"], json!([1, 4]));
    }

    #[test]
    fn test_classify_bindok() {
        let payload = json!({"t": "bindok", "mac": "f4911e000000", "key": "0123456789abcdef"});
        match classify(&payload).expect("classify") {
            InboundPayload::BindOk(b) => {
                assert_eq!(b.key, "0123456789abcdef");
                assert_eq!(b.mac, "f4911e000000");
            }
            other => panic!("expected BindOk, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_telemetry_and_zip() {
        let payload = json!({"t": "dat", "cols": ["Pow", "Mod"], "dat": [1, 4]});
        match classify(&payload).expect("classify") {
            InboundPayload::Telemetry(t) => {
                let patch = t.to_patch();
                assert_eq!(patch.get("Pow"), Some(&FieldValue::Int(1)));
                assert_eq!(patch.get("Mod"), Some(&FieldValue::Int(4)));
            }
            other => panic!("expected Telemetry, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_command_ack_with_value_array() {
        let payload = json!({"t": "res", "opt": ["Pow", "Mod"], "p": [1, 0]});
        match classify(&payload).expect("classify") {
            InboundPayload::CommandAck(ack) => {
                let patch = ack.to_patch();
                assert_eq!(patch.get("Pow"), Some(&FieldValue::Int(1)));
                assert_eq!(patch.get("Mod"), Some(&FieldValue::Int(0)));
            }
            other => panic!("expected CommandAck, got {other:?}"),
        }
    }

    #[test]
    fn test_command_ack_with_scalar_val_pairs_with_sole_code() {
        let ack = CommandAck {
            opt: vec!["HeWatOutTemSet".to_string()],
            p: None,
            val: Some(json!(22)),
        };
        let patch = ack.to_patch();
        assert_eq!(patch.get("HeWatOutTemSet"), Some(&FieldValue::Int(22)));
    }

    #[test]
    fn test_command_ack_extra_codes_without_values_are_dropped() {
        let ack = CommandAck {
            opt: vec!["Pow".to_string(), "Mod".to_string()],
            p: None,
            val: Some(json!(1)),
        };
        let patch = ack.to_patch();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("Pow"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_classify_device_info_with_sparse_metadata() {
        let payload = json!({"t": "dev", "mac": "f4911e000000", "brand": "gree"});
        match classify(&payload).expect("classify") {
            InboundPayload::DeviceInfo(info) => {
                assert_eq!(info.mac, "f4911e000000");
                assert_eq!(info.brand.as_deref(), Some("gree"));
                assert_eq!(info.model, None);
            }
            other => panic!("expected DeviceInfo, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown_type_is_not_an_error() {
        let payload = json!({"t": "heartbeat"});
        match classify(&payload).expect("classify") {
            InboundPayload::Unknown(tag) => assert_eq!(tag, "heartbeat"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_missing_tag_is_an_error() {
        let payload = json!({"cols": ["Pow"], "dat": [1]});
        assert!(matches!(classify(&payload), Err(PayloadError::MissingType)));
    }

    #[test]
    fn test_classify_broken_known_type_is_an_error() {
        // `dat` without its value array must not classify.
        let payload = json!({"t": "dat", "cols": ["Pow"]});
        assert!(matches!(
            classify(&payload),
            Err(PayloadError::Malformed { kind: "dat", .. })
        ));
    }
}
