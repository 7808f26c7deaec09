//! Record file format
//!
//! One record per file, as a JSON object:
//!
//! ```text
//! {
//!   "id": 17,
//!   "checksum": 2882343476,
//!   "fields": [
//!     { "name": "$TYPE_LABEL", "kind": "long",        "value": 3 },
//!     { "name": "name",        "kind": "string",      "value": "Ada" },
//!     { "name": "kids",        "kind": "[reference]", "value": ["people/births/4"] }
//!   ]
//! }
//! ```
//!
//! Fields appear in insertion order. The type label, when present, is
//! written first under the reserved name. The checksum is CRC32 over the
//! serialized `fields` array; a mismatch on read is a construction failure.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::errors::{RecordError, RecordResult};
use super::lxp::{Record, TYPE_LABEL};
use super::value::{ElementKind, ScalarKind, TypedList, Value, REFERENCE_TAG};
use crate::reference::StoreReference;

#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    id: u64,
    checksum: u32,
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldEntry {
    name: String,
    kind: String,
    value: Json,
}

/// Computes the CRC32 checksum of a byte slice.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes `record` under `id`.
///
/// The id is passed explicitly so a failed write never leaves a record
/// holding an id it was not stored under.
pub fn encode(record: &Record, id: u64) -> RecordResult<Vec<u8>> {
    let mut fields = Vec::with_capacity(record.len() + 1);
    if let Some(label) = record.type_label() {
        fields.push(FieldEntry {
            name: TYPE_LABEL.to_string(),
            kind: ScalarKind::Long.name().to_string(),
            value: Json::from(label),
        });
    }
    for (name, value) in record.iter() {
        fields.push(FieldEntry {
            name: name.to_string(),
            kind: value.kind_tag(),
            value: value_to_json(name, value)?,
        });
    }

    let body = serde_json::to_vec(&fields).map_err(|e| RecordError::Serialization(e.to_string()))?;
    let file = RecordFile {
        id,
        checksum: compute_checksum(&body),
        fields,
    };
    serde_json::to_vec_pretty(&file).map_err(|e| RecordError::Serialization(e.to_string()))
}

/// Deserializes a record file.
pub fn decode(data: &[u8]) -> RecordResult<Record> {
    let file: RecordFile = serde_json::from_slice(data)
        .map_err(|e| RecordError::Construction(format!("invalid record file: {}", e)))?;

    let body = serde_json::to_vec(&file.fields)
        .map_err(|e| RecordError::Construction(e.to_string()))?;
    let computed = compute_checksum(&body);
    if computed != file.checksum {
        return Err(RecordError::ChecksumMismatch {
            stored: file.checksum,
            computed,
        });
    }

    let mut record = Record::with_id(file.id);
    for entry in file.fields {
        if entry.name == TYPE_LABEL {
            let label = entry.value.as_u64().ok_or_else(|| {
                RecordError::Construction(format!("type label is not an id: {}", entry.value))
            })?;
            record.set_type_label(label);
            continue;
        }
        if entry.name.is_empty() || record.contains_key(&entry.name) {
            return Err(RecordError::Construction(format!(
                "illegal or duplicate field name '{}'",
                entry.name
            )));
        }
        let value = json_to_value(&entry.name, &entry.kind, &entry.value)?;
        record.push_decoded(entry.name, value);
    }
    Ok(record)
}

fn value_to_json(field: &str, value: &Value) -> RecordResult<Json> {
    Ok(match value {
        Value::String(s) => Json::from(s.as_str()),
        Value::Int(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(RecordError::Serialization(format!(
                    "field '{}' holds a non-finite double",
                    field
                )));
            }
            Json::from(*d)
        }
        Value::Boolean(b) => Json::from(*b),
        Value::Reference(r) => Json::from(r.encode()),
        Value::List(list) => Json::Array(
            list.iter()
                .map(|item| value_to_json(field, item))
                .collect::<RecordResult<Vec<_>>>()?,
        ),
    })
}

fn json_to_value(field: &str, kind: &str, json: &Json) -> RecordResult<Value> {
    if let Some(inner) = kind.strip_prefix('[').and_then(|k| k.strip_suffix(']')) {
        let element = element_kind(field, inner)?;
        let items = json.as_array().ok_or_else(|| bad_value(field, kind, json))?;
        let mut list = TypedList::new(element);
        for item in items {
            let value = json_to_value(field, inner, item)?;
            list.push(value)
                .map_err(|e| RecordError::Construction(format!("field '{}': {}", field, e)))?;
        }
        return Ok(Value::List(list));
    }

    match element_kind(field, kind)? {
        ElementKind::Reference => {
            let encoded = json.as_str().ok_or_else(|| bad_value(field, kind, json))?;
            StoreReference::parse(encoded)
                .map(Value::Reference)
                .map_err(|e| RecordError::Construction(format!("field '{}': {}", field, e)))
        }
        ElementKind::Scalar(scalar) => {
            let value = match scalar {
                ScalarKind::String => json.as_str().map(|s| Value::String(s.to_string())),
                ScalarKind::Int => json
                    .as_i64()
                    .and_then(|i| i32::try_from(i).ok())
                    .map(Value::Int),
                ScalarKind::Long => json.as_i64().map(Value::Long),
                ScalarKind::Double => json.as_f64().map(Value::Double),
                ScalarKind::Boolean => json.as_bool().map(Value::Boolean),
            };
            value.ok_or_else(|| bad_value(field, kind, json))
        }
    }
}

fn element_kind(field: &str, kind: &str) -> RecordResult<ElementKind> {
    if kind == REFERENCE_TAG {
        return Ok(ElementKind::Reference);
    }
    ScalarKind::from_name(kind)
        .map(ElementKind::Scalar)
        .ok_or_else(|| RecordError::Construction(format!("field '{}' has unknown kind '{}'", field, kind)))
}

fn bad_value(field: &str, kind: &str, json: &Json) -> RecordError {
    RecordError::Construction(format!(
        "field '{}' of kind {} holds {}",
        field, kind, json
    ))
}
