use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingItem {
    pub key: String,
    pub value: Value,
}

pub fn flatten(map: &Map<String, Value>) -> Vec<SettingItem> {
    let mut out = Vec::new();
    flatten_into(map, "", &mut out);
    out
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Vec<SettingItem>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(inner, &path, out),
            leaf => out.push(SettingItem {
                key: path,
                value: leaf.clone(),
            }),
        }
    }
}

pub fn unflatten(items: &[SettingItem]) -> Map<String, Value> {
    let mut root = Map::new();
    for item in items {
        set(&mut root, &item.key, item.value.clone());
    }
    root
}

pub fn get<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let first = parts.next()?;
    let mut current = root.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub fn get_or<'a>(root: &'a Map<String, Value>, key: &str, fallback: &'a Value) -> &'a Value {
    get(root, key).unwrap_or(fallback)
}

pub fn set(root: &mut Map<String, Value>, key: &str, value: Value) {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut current = root;
    for part in parents {
        let slot = current
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(inner) = slot else {
            return;
        };
        current = inner;
    }
    current.insert((*last).to_string(), value);
}
