//! Qualification taxonomy: broad field (대직무분야) → mid field (중직무분야) → subject (종목).
//!
//! Input is the flattened `getList` response; output is three derived views
//! (broad fields, mid fields of one broad field, filtered subjects) plus an
//! the filter-state container the taxonomy endpoint replays its query into.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One exam subject as listed by the qualification registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationItem {
  pub code: String,
  pub name: String,
  pub broad_field_code: String,
  pub broad_field_name: String,
  pub mid_field_code: String,
  pub mid_field_name: String,
}

// Accepted source keys per field, first present wins.
const CODE_KEYS: &[&str] = &["jmcd", "jmCd", "code"];
const NAME_KEYS: &[&str] = &["jmfldnm", "jmFldNm", "jmNm", "name"];
const BROAD_CODE_KEYS: &[&str] = &["obligfldcd", "obligFldCd"];
const BROAD_NAME_KEYS: &[&str] = &["obligfldnm", "obligFldNm"];
const MID_CODE_KEYS: &[&str] = &["mdobligfldcd", "mdObligFldCd"];
const MID_NAME_KEYS: &[&str] = &["mdobligfldnm", "mdObligFldNm"];

/// First alias holding a non-empty string or a number. Numbers are rendered
/// as text since Q-Net codes are occasionally emitted unquoted by JSON relays.
fn pick_code(record: &Map<String, Value>, keys: &[&str]) -> String {
  keys
    .iter()
    .find_map(|k| match record.get(*k) {
      Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
      Some(Value::Number(n)) => Some(n.to_string()),
      _ => None,
    })
    .unwrap_or_default()
}

/// First alias holding a non-empty string. Names are text only.
fn pick_text(record: &Map<String, Value>, keys: &[&str]) -> String {
  keys
    .iter()
    .find_map(|k| match record.get(*k) {
      Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
      _ => None,
    })
    .unwrap_or_default()
}

impl QualificationItem {
  /// Build from a flattened record. Records without a subject code are skipped.
  pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
    let code = pick_code(record, CODE_KEYS);
    if code.is_empty() {
      return None;
    }
    Some(Self {
      code,
      name: pick_text(record, NAME_KEYS),
      broad_field_code: pick_code(record, BROAD_CODE_KEYS),
      broad_field_name: pick_text(record, BROAD_NAME_KEYS),
      mid_field_code: pick_code(record, MID_CODE_KEYS),
      mid_field_name: pick_text(record, MID_NAME_KEYS),
    })
  }
}

pub fn items_from_records(records: &[Map<String, Value>]) -> Vec<QualificationItem> {
  records.iter().filter_map(QualificationItem::from_record).collect()
}

/// A (code, name) category pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
  pub code: String,
  pub name: String,
}

/// Derived indexes over a fetched list. Read-only once built.
#[derive(Clone, Debug, Default)]
pub struct TaxonomyIndex {
  items: Vec<QualificationItem>,
}

impl TaxonomyIndex {
  pub fn new(items: Vec<QualificationItem>) -> Self {
    Self { items }
  }

  #[cfg(test)]
  pub fn items(&self) -> &[QualificationItem] {
    &self.items
  }

  /// Distinct broad fields, sorted by name.
  pub fn broad_fields(&self) -> Vec<Field> {
    distinct_sorted(
      self.items
        .iter()
        .map(|i| (i.broad_field_code.as_str(), i.broad_field_name.as_str())),
    )
  }

  /// Distinct mid fields under `broad_code`, sorted by name.
  pub fn mid_fields(&self, broad_code: &str) -> Vec<Field> {
    distinct_sorted(
      self.items
        .iter()
        .filter(|i| i.broad_field_code == broad_code)
        .map(|i| (i.mid_field_code.as_str(), i.mid_field_name.as_str())),
    )
  }

  /// Subjects matching every given criterion. `search` is a case-insensitive
  /// substring match against the subject name or code.
  pub fn filter(&self, broad: Option<&str>, mid: Option<&str>, search: Option<&str>) -> Vec<QualificationItem> {
    let needle = search
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_lowercase);

    self.items
      .iter()
      .filter(|i| broad.map_or(true, |b| i.broad_field_code == b))
      .filter(|i| mid.map_or(true, |m| i.mid_field_code == m))
      .filter(|i| match &needle {
        Some(n) => i.name.to_lowercase().contains(n) || i.code.to_lowercase().contains(n),
        None => true,
      })
      .cloned()
      .collect()
  }

  pub fn find(&self, code: &str) -> Option<&QualificationItem> {
    self.items.iter().find(|i| i.code == code)
  }
}

/// Dedup by code keeping encounter order; a later record can only fill a
/// name the first one left empty. Then stable-sort by case-folded name.
fn distinct_sorted<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<Field> {
  let mut out: Vec<Field> = Vec::new();
  for (code, name) in pairs {
    if code.is_empty() {
      continue;
    }
    match out.iter_mut().find(|f| f.code == code) {
      Some(f) if f.name.is_empty() => f.name = name.to_string(),
      Some(_) => {}
      None => out.push(Field { code: code.to_string(), name: name.to_string() }),
    }
  }
  out.sort_by_cached_key(|f| f.name.to_lowercase());
  out
}

/// Current selection in the subject picker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyFilter {
  pub broad: Option<String>,
  pub mid: Option<String>,
  pub search: String,
}

#[derive(Clone, Debug)]
pub enum FilterEvent {
  SelectBroad(String),
  SelectMid(String),
  Search(String),
}

impl TaxonomyFilter {
  /// `(state, event) -> state`. Narrowing a parent level clears its children.
  pub fn apply(self, event: FilterEvent) -> Self {
    match event {
      FilterEvent::SelectBroad(code) => Self { broad: non_empty(code), mid: None, ..self },
      FilterEvent::SelectMid(code) => Self { mid: non_empty(code), ..self },
      FilterEvent::Search(text) => Self { search: text, ..self },
    }
  }

  pub fn subjects(&self, index: &TaxonomyIndex) -> Vec<QualificationItem> {
    index.filter(self.broad.as_deref(), self.mid.as_deref(), Some(&self.search))
  }

  pub fn mid_fields(&self, index: &TaxonomyIndex) -> Vec<Field> {
    self.broad.as_deref().map(|b| index.mid_fields(b)).unwrap_or_default()
  }
}

fn non_empty(s: String) -> Option<String> {
  if s.trim().is_empty() { None } else { Some(s) }
}
