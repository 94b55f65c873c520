//! JSON documents as repository entities.
//!
//! Every top-level array element becomes one [`JsonRecord`]. Field kinds are
//! inferred from the data, so any scalar reachable by a dotted path can be
//! filtered and sorted on.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use query_core::{FieldKind, FieldSet, Value};
use repokit::{Entity, Record, Timestamps};
use serde_json::{Map, Value as Json};

pub type Kinds = Arc<HashMap<String, FieldKind>>;

#[derive(Clone, Debug)]
pub struct JsonRecord {
    id: String,
    ts: Timestamps,
    body: Map<String, Json>,
    kinds: Kinds,
}

impl JsonRecord {
    pub fn into_json(self) -> Json {
        Json::Object(self.body)
    }
}

impl Entity for JsonRecord {
    type Id = String;
    const NAME: &'static str = "Record";

    fn id(&self) -> &String {
        &self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.ts
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.ts
    }
}

impl Record for JsonRecord {
    fn field(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.body.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        let kind = self.kinds.get(path).copied().unwrap_or(FieldKind::String);
        Some(to_value(kind, current))
    }
}

fn to_value(kind: FieldKind, json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        // mixed columns are declared as strings; keep values in that kind
        Json::Bool(_) | Json::Number(_) if kind == FieldKind::String => {
            Value::String(json.to_string())
        }
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) if kind == FieldKind::I64 => Value::I64(i),
            _ => n.as_f64().map_or(Value::Null, Value::F64),
        },
        Json::String(s) => Value::parse(kind, s).unwrap_or_else(|| Value::String(s.clone())),
        Json::Array(_) | Json::Object(_) => Value::String(json.to_string()),
    }
}

fn infer_kind(json: &Json) -> Option<FieldKind> {
    Some(match json {
        Json::Null | Json::Array(_) | Json::Object(_) => return None,
        Json::Bool(_) => FieldKind::Bool,
        Json::Number(n) if n.is_i64() => FieldKind::I64,
        Json::Number(_) => FieldKind::F64,
        Json::String(s) => [FieldKind::DateTimeUtc, FieldKind::Date, FieldKind::Uuid]
            .into_iter()
            .find(|kind| Value::parse(*kind, s).is_some())
            .unwrap_or(FieldKind::String),
    })
}

/// Merge two observations of the same field; integers widen to floats and
/// anything else inconsistent falls back to string.
fn unify(a: FieldKind, b: FieldKind) -> FieldKind {
    match (a, b) {
        _ if a == b => a,
        (FieldKind::I64, FieldKind::F64) | (FieldKind::F64, FieldKind::I64) => FieldKind::F64,
        _ => FieldKind::String,
    }
}

fn collect_kinds(prefix: &str, object: &Map<String, Json>, kinds: &mut HashMap<String, FieldKind>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Json::Object(nested) = value {
            collect_kinds(&path, nested, kinds);
            continue;
        }
        if let Some(kind) = infer_kind(value) {
            kinds
                .entry(path)
                .and_modify(|k| *k = unify(*k, kind))
                .or_insert(kind);
        }
    }
}

fn timestamp(body: &Map<String, Json>, key: &str) -> Option<DateTime<Utc>> {
    let raw = body.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parsed data set: the records plus the field whitelist inferred from them.
pub struct Dataset {
    pub records: Vec<JsonRecord>,
    pub fields: FieldSet,
}

/// Parse a JSON array of objects. `id` defaults to the array position;
/// `createdAt`, `updatedAt` and `deletedAt` populate the audit timestamps.
pub fn load(text: &str) -> Result<Dataset> {
    let json: Json = serde_json::from_str(text).context("data is not valid JSON")?;
    let Json::Array(rows) = json else {
        bail!("data must be a JSON array of objects");
    };

    let mut objects = Vec::with_capacity(rows.len());
    let mut kinds = HashMap::new();
    for (i, row) in rows.into_iter().enumerate() {
        let Json::Object(body) = row else {
            bail!("row {i} is not a JSON object");
        };
        collect_kinds("", &body, &mut kinds);
        objects.push(body);
    }

    let fields = kinds
        .iter()
        .fold(FieldSet::new(), |set, (path, kind)| set.insert(path.clone(), *kind));
    let kinds: Kinds = Arc::new(kinds);

    let records = objects
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let id = match body.get("id") {
                Some(Json::String(s)) => s.clone(),
                Some(Json::Number(n)) => n.to_string(),
                _ => i.to_string(),
            };
            let ts = Timestamps {
                created_at: timestamp(&body, "createdAt").unwrap_or_default(),
                updated_at: timestamp(&body, "updatedAt"),
                deleted_at: timestamp(&body, "deletedAt"),
            };
            JsonRecord {
                id,
                ts,
                body,
                kinds: kinds.clone(),
            }
        })
        .collect();

    Ok(Dataset { records, fields })
}
