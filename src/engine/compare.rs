//! Domain comparators — field-by-field diff of desired vs live state.
//!
//! Each [`Domain`] binds one comparator, selected by the provider's declared
//! domain. Domain comparators walk the domain's well-known collection and
//! look the live counterpart up by resource identity; when the desired
//! snapshot lacks that collection, the generic whole-snapshot comparator
//! runs instead. Malformed items (non-object entries, missing identity)
//! degrade to "no drift for that item" — the comparator never fails.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::flatten::{flatten, get};
use crate::model::Domain;

/// A difference found by a comparator, before fingerprinting and dedup.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub resource_type: String,
    pub resource_id: String,
    pub field_path: String,
    pub expected: Value,
    pub actual: Value,
}

/// Diff two snapshots for one domain. Emission order follows desired-state
/// traversal order; no sorting is applied.
pub fn diff(domain: Domain, desired: &Value, live: &Value) -> Vec<Candidate> {
    let collection = collection_key(domain);
    match desired.get(collection).and_then(Value::as_array) {
        Some(items) => collection_diff(domain, items, live),
        None => generic_diff(domain, desired, live),
    }
}

fn collection_key(domain: Domain) -> &'static str {
    match domain {
        Domain::Cloud => "resources",
        Domain::Cluster => "deployments",
        Domain::Messaging => "topics",
    }
}

/// Compare each declared item against its live counterpart, keyed by
/// resource identity. A missing counterpart compares every declared field
/// against null.
fn collection_diff(domain: Domain, desired_items: &[Value], live: &Value) -> Vec<Candidate> {
    let live_index: HashMap<String, &Map<String, Value>> = live
        .get(collection_key(domain))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|obj| identity(domain, obj).map(|id| (id, obj)))
                .collect()
        })
        .unwrap_or_default();

    let mut out = Vec::new();
    for item in desired_items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let Some(id) = identity(domain, obj) else {
            continue;
        };
        let rtype = resource_type(domain, obj);

        let flat_desired = flatten(&declared_fields(domain, obj));
        let flat_live = live_index
            .get(&id)
            .map(|&counterpart| flatten(&declared_fields(domain, counterpart)))
            .unwrap_or_default();

        for (path, expected) in flat_desired {
            let actual = get(&flat_live, &path).cloned().unwrap_or(Value::Null);
            if expected != actual {
                out.push(Candidate {
                    resource_type: rtype.clone(),
                    resource_id: id.clone(),
                    field_path: path,
                    expected,
                    actual,
                });
            }
        }
    }
    out
}

/// Whole-snapshot fallback: flatten both trees and diff key-by-key.
/// Missing-in-live counts as a mismatch against null.
fn generic_diff(domain: Domain, desired: &Value, live: &Value) -> Vec<Candidate> {
    let snapshot_id = format!("{domain}_state");
    let flat_live = flatten(live);
    flatten(desired)
        .into_iter()
        .filter_map(|(path, expected)| {
            let actual = get(&flat_live, &path).cloned().unwrap_or(Value::Null);
            if expected == actual {
                return None;
            }
            Some(Candidate {
                resource_type: snapshot_id.clone(),
                resource_id: snapshot_id.clone(),
                field_path: path,
                expected,
                actual,
            })
        })
        .collect()
}

fn identity(domain: Domain, obj: &Map<String, Value>) -> Option<String> {
    match domain {
        Domain::Cloud => ["address", "id", "name"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        Domain::Cluster => {
            let name = obj.get("name").and_then(Value::as_str)?;
            let namespace = obj
                .get("namespace")
                .and_then(Value::as_str)
                .unwrap_or("default");
            Some(format!("{namespace}/{name}"))
        }
        Domain::Messaging => obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn resource_type(domain: Domain, obj: &Map<String, Value>) -> String {
    match domain {
        Domain::Cloud => obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("cloud_resource")
            .to_string(),
        Domain::Cluster => "deployment".to_string(),
        Domain::Messaging => "topic".to_string(),
    }
}

/// The fields of an item that count as declared state — identity and
/// provider metadata are not drift-comparable.
fn declared_fields(domain: Domain, obj: &Map<String, Value>) -> Value {
    match domain {
        Domain::Cloud => {
            // Terraform-style items carry their attributes under "values".
            if let Some(values @ Value::Object(_)) = obj.get("values") {
                return values.clone();
            }
            strip_keys(obj, &["type", "name", "address", "id", "provider", "mode"])
        }
        Domain::Cluster => strip_keys(obj, &["name", "namespace"]),
        Domain::Messaging => strip_keys(obj, &["name"]),
    }
}

fn strip_keys(obj: &Map<String, Value>, keys: &[&str]) -> Value {
    let mut out = obj.clone();
    for key in keys {
        out.remove(*key);
    }
    Value::Object(out)
}
