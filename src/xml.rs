//! Q-Net XML → JSON flattening.
//!
//! The government endpoints disagree on casing and nesting, so we do not map
//! onto typed structs here. Instead every document becomes a plain
//! `serde_json::Value`:
//!   - element with non-empty text → that text (string)
//!   - element with child elements → object keyed by tag name
//!   - repeated sibling tags       → array, in document order
//!   - attributes                  → object under `@attributes`
//!   - empty element               → ""
//!
//! Downstream modules (taxonomy, schedule) read records out of this shape.

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::error::AppResult;

/// Reserved key for element attributes; cannot collide with a tag name.
pub const ATTRIBUTES_KEY: &str = "@attributes";

/// Parse and flatten a whole document. The root element's tag becomes the
/// single top-level key, e.g. `{"response": {"header": ..., "body": ...}}`.
pub fn flatten_xml(text: &str) -> AppResult<Value> {
  let doc = Document::parse(text)?;
  let root = doc.root_element();
  let mut top = Map::new();
  top.insert(root.tag_name().name().to_string(), flatten_element(root));
  Ok(Value::Object(top))
}

fn flatten_element(node: Node<'_, '_>) -> Value {
  let mut obj = Map::new();

  let attrs: Map<String, Value> = node
    .attributes()
    .map(|a| (a.name().to_string(), Value::String(a.value().to_string())))
    .collect();
  if !attrs.is_empty() {
    obj.insert(ATTRIBUTES_KEY.to_string(), Value::Object(attrs));
  }

  let mut text: Option<String> = None;
  for child in node.children() {
    if child.is_text() {
      let t = child.text().unwrap_or_default().trim();
      if !t.is_empty() {
        text = Some(t.to_string());
      }
      continue;
    }
    if !child.is_element() {
      continue;
    }

    let key = child.tag_name().name().to_string();
    let value = flatten_element(child);
    match obj.get_mut(&key) {
      Some(Value::Array(seq)) => seq.push(value),
      Some(existing) => {
        let first = existing.take();
        *existing = Value::Array(vec![first, value]);
      }
      None => {
        obj.insert(key, value);
      }
    }
  }

  if let Some(t) = text {
    return Value::String(t);
  }
  if obj.is_empty() {
    return Value::String(String::new());
  }
  Value::Object(obj)
}

/// Item paths in the order we try them. Q-Net wraps lists as
/// `response/body/items/item`, but some proxies hand us a trimmed document.
const ITEM_PATHS: &[&[&str]] = &[
  &["response", "body", "items", "item"],
  &["body", "items", "item"],
  &["items", "item"],
  &["item"],
];

/// Pull the repeated `<item>` records out of a flattened document.
///
/// A single item arrives unwrapped (object) and many arrive as an array; both
/// come back as a list. Missing items yield an empty list, not an error.
pub fn items_of(doc: &Value) -> Vec<Map<String, Value>> {
  for path in ITEM_PATHS {
    if let Some(found) = lookup(doc, path) {
      return as_records(found);
    }
  }
  Vec::new()
}

fn lookup<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
  path.iter().try_fold(doc, |cur, key| cur.get(*key))
}

fn as_records(v: &Value) -> Vec<Map<String, Value>> {
  match v {
    Value::Array(seq) => seq
      .iter()
      .filter_map(|x| x.as_object().cloned())
      .collect(),
    Value::Object(m) => vec![m.clone()],
    _ => Vec::new(),
  }
}

/// `(code, message)` from whichever envelope the service answered with:
/// `response/header` for normal replies, or
/// `OpenAPI_ServiceResponse/cmmMsgHeader` for gateway errors (bad or
/// unregistered service key, quota), which still come back as HTTP 200.
pub fn result_header(doc: &Value) -> Option<(String, String)> {
  if let Some(header) = lookup(doc, &["response", "header"]) {
    let code = header.get("resultCode")?.as_str()?.to_string();
    return Some((code, text_of(header, &["resultMsg"])));
  }
  let header = lookup(doc, &["OpenAPI_ServiceResponse", "cmmMsgHeader"])?;
  let code = header
    .get("returnReasonCode")
    .and_then(Value::as_str)
    .filter(|c| !c.is_empty())
    .unwrap_or("99")
    .to_string();
  Some((code, text_of(header, &["returnAuthMsg", "errMsg"])))
}

fn text_of(header: &Value, keys: &[&str]) -> String {
  keys
    .iter()
    .find_map(|k| header.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
    .unwrap_or_default()
    .to_string()
}

/// Whether the document looks like a Q-Net list reply at all: a `response`
/// root or one of the item paths.
pub fn is_list_document(doc: &Value) -> bool {
  doc.get("response").is_some() || ITEM_PATHS.iter().any(|p| lookup(doc, p).is_some())
}
