// Prediction requests as JSON

use heartline_pipeline::{Cell, RawRecord};
use serde_json::{Map, Value};

use crate::error::IoError;

/// One decoded prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<String>,
    pub record: RawRecord,
}

/// Parse a request document.
///
/// Accepted shapes:
/// - a flat object of field → value (`{"age": 63, "sex": 1, ...}`);
/// - an envelope `{"id": "...", "record": {...}}`.
///
/// Numbers, numeric strings and textual categories are kept as given;
/// `null` becomes a missing value. Booleans map to 0 / 1.
pub fn parse_request(text: &str) -> Result<Request, IoError> {
    let value: Value = serde_json::from_str(text).map_err(|e| IoError::Request(e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(IoError::Request("expected a JSON object".into()));
    };

    match obj.remove("record") {
        Some(Value::Object(fields)) => {
            let id = match obj.remove("id") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s),
                Some(Value::Number(n)) => Some(n.to_string()),
                Some(other) => return Err(IoError::Request(format!("'id' must be a string, got {other}"))),
            };
            Ok(Request {
                id,
                record: record_from(fields)?,
            })
        }
        Some(other) => Err(IoError::Request(format!("'record' must be an object, got {other}"))),
        None => Ok(Request {
            id: None,
            record: record_from(obj)?,
        }),
    }
}

/// Parse a JSON array of requests (one per element) or a single request.
pub fn parse_requests(text: &str) -> Result<Vec<Request>, IoError> {
    let value: Value = serde_json::from_str(text).map_err(|e| IoError::Request(e.to_string()))?;
    match value {
        Value::Array(items) => items.iter().map(|item| parse_request(&item.to_string())).collect(),
        _ => Ok(vec![parse_request(text)?]),
    }
}

fn record_from(fields: Map<String, Value>) -> Result<RawRecord, IoError> {
    let mut record = RawRecord::new();
    for (name, value) in fields {
        let cell = match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::from(i64::from(b)),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Cell::Number(f),
                None => return Err(IoError::Request(format!("field '{name}': {n} is not representable"))),
            },
            Value::String(s) => Cell::Text(s),
            other => {
                return Err(IoError::Request(format!(
                    "field '{name}' must be a number, string or null, got {other}"
                )))
            }
        };
        record.insert(name, cell);
    }
    Ok(record)
}
