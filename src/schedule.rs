//! Exam-schedule field mapping.
//!
//! Q-Net schedule records come with camelCase on some endpoints and
//! lowercase on others, and populate a different subset of dates per
//! qualification grade. `SLOTS` below is the single source of truth for
//! which source keys feed which display row.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One logical exam-lifecycle event.
pub struct Slot {
  pub label: &'static str,
  pub keys: &'static [&'static str],
  /// Paired end-date keys; an empty slice means a single-day event.
  pub end_keys: &'static [&'static str],
}

/// Exam-lifecycle order: written registration → written exam → written pass →
/// practical registration → practical exam → final pass.
pub const SLOTS: &[Slot] = &[
  Slot {
    label: "필기시험원서접수기간",
    keys: &["docRegStartDt", "docregstartdt"],
    end_keys: &["docRegEndDt", "docregenddt"],
  },
  Slot {
    label: "필기시험기간",
    keys: &["docExamStartDt", "docexamstartdt", "docExamDt", "docexamdt"],
    end_keys: &["docExamEndDt", "docexamenddt"],
  },
  Slot {
    label: "필기합격발표일",
    keys: &["docPassDt", "docpassdt"],
    end_keys: &[],
  },
  Slot {
    label: "실기시험원서접수기간",
    keys: &["pracRegStartDt", "pracregstartdt"],
    end_keys: &["pracRegEndDt", "pracregenddt"],
  },
  Slot {
    label: "실기시험기간",
    keys: &["pracExamStartDt", "pracexamstartdt"],
    end_keys: &["pracExamEndDt", "pracexamenddt"],
  },
  Slot {
    label: "최종합격발표일",
    keys: &["pracPassDt", "pracpassdt"],
    end_keys: &[],
  },
];

/// Labels for fields that are not part of a canonical slot. Matched
/// case-insensitively; untranslated keys are shown as-is.
const EXTRA_LABELS: &[(&str, &str)] = &[
  ("implyy", "시행년도"),
  ("implseq", "시행회차"),
  ("qualgbcd", "자격구분코드"),
  ("qualgbnm", "자격구분"),
  ("jmcd", "종목코드"),
  ("jmnm", "종목명"),
  ("jmfldnm", "종목명"),
  ("seriescd", "계열코드"),
  ("seriesnm", "계열명"),
  ("docsubmitstartdt", "응시자격서류제출시작일"),
  ("docsubmitentdt", "응시자격서류제출종료일"),
  ("docsubmitenddt", "응시자격서류제출종료일"),
  ("fee", "응시수수료"),
  ("contents", "수수료내용"),
];

const DESCRIPTION_KEYS: &[&str] = &["description", "implSeqNm", "implseqnm"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
  pub label: String,
  pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleView {
  pub title: String,
  pub rows: Vec<ScheduleRow>,
}

/// `YYYYMMDD` → `YYYY년 MM월 DD일`; anything else passes through unchanged.
pub fn format_date(s: &str) -> String {
  if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
    format!("{}년 {}월 {}일", &s[0..4], &s[4..6], &s[6..8])
  } else {
    s.to_string()
  }
}

/// Display text of a scalar; empty strings count as absent.
fn scalar(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => {
      let t = s.trim();
      if t.is_empty() { None } else { Some(t.to_string()) }
    }
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn first_present<'a>(
  record: &Map<String, Value>,
  keys: &[&'a str],
  consumed: &HashSet<String>,
) -> Option<(&'a str, String)> {
  keys.iter().find_map(|k| {
    if consumed.contains(*k) {
      return None;
    }
    record.get(*k).and_then(scalar).map(|v| (*k, v))
  })
}

fn is_end_key(key: &str) -> bool {
  SLOTS.iter().any(|s| s.end_keys.contains(&key))
}

fn extra_label(key: &str) -> String {
  let lower = key.to_lowercase();
  EXTRA_LABELS
    .iter()
    .find(|(k, _)| *k == lower)
    .map(|(_, label)| label.to_string())
    .unwrap_or_else(|| key.to_string())
}

/// Title for one schedule record; `position` is 0-based within its list.
fn title_of(record: &Map<String, Value>, position: usize, consumed: &mut HashSet<String>) -> String {
  if let Some((key, v)) = first_present(record, DESCRIPTION_KEYS, consumed) {
    consumed.insert(key.to_string());
    return v;
  }
  let year = record.get("implYy").and_then(scalar);
  let seq = record.get("implSeq").and_then(scalar);
  if let (Some(y), Some(s)) = (year, seq) {
    consumed.insert("implYy".into());
    consumed.insert("implSeq".into());
    return format!("{y}년 제{s}회");
  }
  format!("Item #{}", position + 1)
}

/// Map one record to display rows. No source key is emitted twice and a
/// successfully paired end date never appears on its own.
pub fn map_schedule(record: &Map<String, Value>, position: usize) -> ScheduleView {
  let mut consumed: HashSet<String> = HashSet::new();
  let title = title_of(record, position, &mut consumed);
  let mut rows = Vec::new();

  for slot in SLOTS {
    let Some((key, start)) = first_present(record, slot.keys, &consumed) else {
      continue;
    };
    consumed.insert(key.to_string());

    let value = match first_present(record, slot.end_keys, &consumed) {
      Some((end_key, end)) => {
        consumed.insert(end_key.to_string());
        format!("{} ~ {}", format_date(&start), format_date(&end))
      }
      None => format_date(&start),
    };
    rows.push(ScheduleRow { label: slot.label.to_string(), value });
  }

  // Everything else, in the record's own order.
  for (key, v) in record {
    if consumed.contains(key) || is_end_key(key) || DESCRIPTION_KEYS.contains(&key.as_str()) {
      continue;
    }
    if let Some(value) = scalar(v) {
      rows.push(ScheduleRow { label: extra_label(key), value: format_date(&value) });
    }
  }

  ScheduleView { title, rows }
}

pub fn map_schedules(records: &[Map<String, Value>]) -> Vec<ScheduleView> {
  records
    .iter()
    .enumerate()
    .map(|(i, r)| map_schedule(r, i))
    .collect()
}

/// Typed view of one sitting, raw `YYYYMMDD` strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSchedule {
  pub description: Option<String>,
  pub written_registration_start: Option<String>,
  pub written_registration_end: Option<String>,
  pub written_exam: Option<String>,
  pub written_pass_announcement: Option<String>,
  pub practical_registration_start: Option<String>,
  pub practical_registration_end: Option<String>,
  pub practical_exam_start: Option<String>,
  pub practical_exam_end: Option<String>,
  pub final_pass_announcement: Option<String>,
}

impl ExamSchedule {
  pub fn from_record(record: &Map<String, Value>) -> Self {
    let none = HashSet::new();
    let get = |keys: &[&str]| first_present(record, keys, &none).map(|(_, v)| v);
    Self {
      description: get(DESCRIPTION_KEYS),
      written_registration_start: get(SLOTS[0].keys),
      written_registration_end: get(SLOTS[0].end_keys),
      written_exam: get(SLOTS[1].keys),
      written_pass_announcement: get(SLOTS[2].keys),
      practical_registration_start: get(SLOTS[3].keys),
      practical_registration_end: get(SLOTS[3].end_keys),
      practical_exam_start: get(SLOTS[4].keys),
      practical_exam_end: get(SLOTS[4].end_keys),
      final_pass_announcement: get(SLOTS[5].keys),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn rec(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
  }

  #[test]
  fn registration_range_is_paired_and_end_hidden() {
    let view = map_schedule(&rec(json!({"docRegStartDt": "20250101", "docRegEndDt": "20250110"})), 0);
    assert_eq!(
      view.rows,
      vec![ScheduleRow {
        label: "필기시험원서접수기간".into(),
        value: "2025년 01월 01일 ~ 2025년 01월 10일".into(),
      }]
    );
  }

  #[test]
  fn missing_end_date_shows_start_only() {
    let view = map_schedule(&rec(json!({"docexamstartdt": "20250301", "docexamenddt": ""})), 0);
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].value, "2025년 03월 01일");
    assert!(!view.rows[0].value.contains('~'));
  }

  #[test]
  fn slots_follow_lifecycle_order_regardless_of_input_order() {
    let view = map_schedule(
      &rec(json!({
        "pracpassdt": "20250912",
        "docPassDt": "20250611",
        "pracExamStartDt": "20250719",
        "pracExamEndDt": "20250806",
        "docregstartdt": "20250513",
        "docregenddt": "20250516",
      })),
      0,
    );
    let labels: Vec<&str> = view.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, ["필기시험원서접수기간", "필기합격발표일", "실기시험기간", "최종합격발표일"]);
    assert_eq!(view.rows[2].value, "2025년 07월 19일 ~ 2025년 08월 06일");
  }

  #[test]
  fn leftover_fields_are_translated_in_encounter_order() {
    let view = map_schedule(
      &rec(json!({
        "implYy": "2025",
        "docExamDt": "20250601",
        "qualgbNm": "국가기술자격",
        "customFlag": "Y",
        "nested": {"x": 1},
        "fee": 19400,
      })),
      3,
    );
    assert_eq!(view.title, "Item #4");
    let rows: Vec<(&str, &str)> = view.rows.iter().map(|r| (r.label.as_str(), r.value.as_str())).collect();
    assert_eq!(
      rows,
      [
        ("필기시험기간", "2025년 06월 01일"),
        ("시행년도", "2025"),
        ("자격구분", "국가기술자격"),
        ("customFlag", "Y"),
        ("응시수수료", "19400"),
      ]
    );
  }

  #[test]
  fn unpaired_end_dates_are_never_shown_alone() {
    let view = map_schedule(&rec(json!({"docRegEndDt": "20250110", "pracexamenddt": "20250806"})), 0);
    assert!(view.rows.is_empty());
  }

  #[test]
  fn title_prefers_description_then_round() {
    let a = map_schedule(&rec(json!({"description": "2025년 정기 기사 1회", "implYy": "2025"})), 0);
    assert_eq!(a.title, "2025년 정기 기사 1회");
    assert!(a.rows.iter().all(|r| r.value != "2025년 정기 기사 1회"));

    let b = map_schedule(&rec(json!({"implYy": "2025", "implSeq": "2"})), 0);
    assert_eq!(b.title, "2025년 제2회");
    assert!(b.rows.is_empty());
  }

  #[test]
  fn format_date_only_touches_eight_digits() {
    assert_eq!(format_date("20250101"), "2025년 01월 01일");
    assert_eq!(format_date("2025-01-01"), "2025-01-01");
    assert_eq!(format_date("202501011"), "202501011");
    assert_eq!(format_date(""), "");
  }

  #[test]
  fn typed_schedule_uses_alias_table() {
    let s = ExamSchedule::from_record(&rec(json!({
      "implSeqNm": "2025년 정기 기사 2회",
      "docexamdt": "20250601",
      "pracExamStartDt": "20250719",
    })));
    assert_eq!(s.description.as_deref(), Some("2025년 정기 기사 2회"));
    assert_eq!(s.written_exam.as_deref(), Some("20250601"));
    assert_eq!(s.practical_exam_start.as_deref(), Some("20250719"));
    assert_eq!(s.final_pass_announcement, None);
  }
}
