use serde_json::Value;
use tracing::warn;

use super::PeriodRecord;

/// The payload shapes the period endpoints are known to answer with. They
/// are classified up front, in this order, instead of probing fields ad hoc;
/// anything else is `Unrecognized` and normalizes to an empty list.
enum PayloadShape<'a> {
    /// The payload is itself an array of period entries.
    Sequence(&'a [Value]),
    /// `{ "success": true, "years": [...] }`
    SuccessWrapped(&'a [Value]),
    /// `{ "years": [...] }` without a success flag.
    Years(&'a [Value]),
    /// `{ "data": [...] }`
    Data(&'a [Value]),
    Unrecognized,
}

fn classify(payload: &Value) -> PayloadShape<'_> {
    if let Some(items) = payload.as_array() {
        return PayloadShape::Sequence(items);
    }
    let success = payload.get("success").and_then(Value::as_bool) == Some(true);
    if let Some(years) = payload.get("years").and_then(Value::as_array) {
        if success {
            return PayloadShape::SuccessWrapped(years);
        }
        return PayloadShape::Years(years);
    }
    if let Some(data) = payload.get("data").and_then(Value::as_array) {
        return PayloadShape::Data(data);
    }
    PayloadShape::Unrecognized
}

/// Convert an arbitrary period payload into a uniform record list.
///
/// Malformed elements are dropped, not errors; input order is preserved and
/// duplicate ids are kept as received.
pub fn normalize(payload: &Value) -> Vec<PeriodRecord> {
    let items = match classify(payload) {
        PayloadShape::Sequence(items)
        | PayloadShape::SuccessWrapped(items)
        | PayloadShape::Years(items)
        | PayloadShape::Data(items) => items,
        PayloadShape::Unrecognized => {
            warn!("unrecognized period payload shape, treating as empty");
            return Vec::new();
        }
    };

    items.iter().filter_map(record_from).collect()
}

/// Stringify a scalar the way the original wire format does. Objects,
/// arrays, booleans and nulls are not valid id/label material.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn record_from(item: &Value) -> Option<PeriodRecord> {
    let record = match item {
        Value::String(_) | Value::Number(_) => {
            let s = scalar_to_string(item)?;
            PeriodRecord {
                id: s.clone(),
                label: s,
            }
        }
        Value::Object(fields) => {
            let id = fields.get("id").and_then(scalar_to_string);
            let label = fields
                .get("period")
                .and_then(scalar_to_string)
                .or_else(|| fields.get("year").and_then(scalar_to_string));
            match (id, label) {
                (Some(id), Some(label)) => PeriodRecord { id, label },
                (Some(id), None) => PeriodRecord {
                    label: id.clone(),
                    id,
                },
                (None, Some(label)) => PeriodRecord {
                    id: label.clone(),
                    label,
                },
                (None, None) => return None,
            }
        }
        _ => return None,
    };

    if record.id.is_empty() {
        return None;
    }
    Some(record)
}
