//! Study-plan request validation and prompt composition.
//!
//! The prompt carries two generated blocks: a schedule summary built from
//! the selected sitting, and a study-period block counting the days from
//! the chosen start date to each exam.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Prompts;
use crate::error::{AppError, AppResult};
use crate::schedule::{format_date, ExamSchedule};
use crate::util::fill_template;

pub const NO_SCHEDULE_INFO: &str = "일정 정보가 제공되지 않았습니다.";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct StudyPlanRequest {
  #[serde(default)]
  pub subject: String,
  #[serde(default)]
  pub exam_schedule: Map<String, Value>,
  #[serde(default)]
  pub start_date: String,
}

impl StudyPlanRequest {
  pub fn validate(&self) -> AppResult<()> {
    if self.subject.trim().is_empty() {
      return Err(AppError::Validation("시험 종목(subject)은 필수입니다.".into()));
    }
    Ok(())
  }
}

pub fn build_schedule_info(s: &ExamSchedule) -> String {
  let d = |v: &Option<String>| format_date(v.as_deref().unwrap_or(""));
  let mut out = String::new();
  if s.written_registration_start.is_some() {
    out += &format!(
      "필기시험 원서접수: {} ~ {}\n",
      d(&s.written_registration_start),
      d(&s.written_registration_end)
    );
  }
  if s.written_exam.is_some() {
    out += &format!("필기시험 일자: {}\n", d(&s.written_exam));
  }
  if s.written_pass_announcement.is_some() {
    out += &format!("필기시험 합격자 발표: {}\n", d(&s.written_pass_announcement));
  }
  if s.practical_registration_start.is_some() {
    out += &format!(
      "실기시험 원서접수: {} ~ {}\n",
      d(&s.practical_registration_start),
      d(&s.practical_registration_end)
    );
  }
  if s.practical_exam_start.is_some() {
    out += &format!("실기시험 기간: {} ~ {}\n", d(&s.practical_exam_start), d(&s.practical_exam_end));
  }
  if s.final_pass_announcement.is_some() {
    out += &format!("최종 합격자 발표: {}\n", d(&s.final_pass_announcement));
  }
  out
}

fn exam_day(raw: &Option<String>) -> Option<NaiveDate> {
  raw.as_deref().and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y%m%d").ok())
}

/// Start date (`YYYY-MM-DD`) and days left until each exam. Unparseable
/// dates yield an empty block; the plan is still generated without it.
pub fn study_period_info(s: &ExamSchedule, start_date: &str) -> String {
  let start_date = start_date.trim();
  if start_date.is_empty() {
    return String::new();
  }
  let start = match NaiveDate::parse_from_str(start_date, "%Y-%m-%d") {
    Ok(d) => d,
    Err(e) => {
      warn!(target: "qpass_backend", %start_date, error = %e, "Ignoring unparseable start date");
      return String::new();
    }
  };
  let written = exam_day(&s.written_exam);
  let practical = exam_day(&s.practical_exam_start);
  if written.is_none() && practical.is_none() {
    return String::new();
  }

  let mut out = format!("\n공부 시작일: {}\n", start.format("%Y년 %m월 %d일"));
  if let Some(day) = written {
    out += &format!("필기시험까지 남은 기간: {}일\n", (day - start).num_days());
  }
  if let Some(day) = practical {
    out += &format!("실기시험까지 남은 기간: {}일\n", (day - start).num_days());
  }
  out
}

pub fn compose_prompt(prompts: &Prompts, req: &StudyPlanRequest) -> String {
  let schedule = ExamSchedule::from_record(&req.exam_schedule);
  let schedule_info = build_schedule_info(&schedule);
  let schedule_info = if schedule_info.is_empty() { NO_SCHEDULE_INFO.to_string() } else { schedule_info };
  let period = study_period_info(&schedule, &req.start_date);
  debug!(target: "qpass_backend", subject = %req.subject, has_period = !period.is_empty(), "Composed study-plan prompt");
  fill_template(
    &prompts.study_plan_user_template,
    &[
      ("subject", req.subject.trim()),
      ("schedule_info", schedule_info.trim_end()),
      ("study_period_info", &period),
    ],
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record() -> Map<String, Value> {
    json!({
      "implYy": "2025", "implSeq": "1",
      "docRegStartDt": "20250113", "docRegEndDt": "20250116",
      "docExamDt": "20250215",
      "docPassDt": "20250312",
      "pracExamStartDt": "20250419", "pracExamEndDt": "20250509",
      "pracPassDt": "20250613"
    })
    .as_object()
    .cloned()
    .unwrap()
  }

  #[test]
  fn schedule_summary_lists_present_slots() {
    let info = build_schedule_info(&ExamSchedule::from_record(&record()));
    assert!(info.contains("필기시험 원서접수: 2025년 01월 13일 ~ 2025년 01월 16일"));
    assert!(info.contains("필기시험 일자: 2025년 02월 15일"));
    assert!(info.contains("실기시험 기간: 2025년 04월 19일 ~ 2025년 05월 09일"));
    assert!(info.contains("최종 합격자 발표: 2025년 06월 13일"));
    assert!(!info.contains("실기시험 원서접수"));
  }

  #[test]
  fn days_until_each_exam() {
    let s = ExamSchedule::from_record(&record());
    let info = study_period_info(&s, "2025-01-01");
    assert!(info.contains("공부 시작일: 2025년 01월 01일"));
    assert!(info.contains("필기시험까지 남은 기간: 45일"));
    assert!(info.contains("실기시험까지 남은 기간: 108일"));
    assert_eq!(study_period_info(&s, "01/01/2025"), "");
    assert_eq!(study_period_info(&s, ""), "");
  }

  #[test]
  fn prompt_without_schedule_says_so() {
    let req = StudyPlanRequest { subject: "정보처리기사".into(), ..Default::default() };
    let p = compose_prompt(&Prompts::default(), &req);
    assert!(p.contains("시험 종목: 정보처리기사"));
    assert!(p.contains(NO_SCHEDULE_INFO));
    assert!(!p.contains("{study_period_info}"));
  }

  #[test]
  fn blank_subject_is_rejected() {
    let req = StudyPlanRequest { subject: "  ".into(), ..Default::default() };
    assert!(matches!(req.validate(), Err(AppError::Validation(_))));
  }
}
