//! Q-Net OpenAPI client.
//!
//! Two services: the exam-information service (schedules, fees) and the
//! national-qualification list service. Both speak XML; `request` hands the
//! raw status + body back so the proxy routes can pass them through, and the
//! `fetch_*` helpers flatten and normalize for our own endpoints.

use std::time::Duration;

use reqwest::header::USER_AGENT;
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::taxonomy::{items_from_records, QualificationItem};
use crate::util::trunc_for_log;
use crate::xml::{flatten_xml, is_list_document, items_of, result_header};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QnetOp {
  /// 기술사
  PeList,
  /// 기능장
  McList,
  /// 기사, 산업기사
  EList,
  /// 기능사
  CList,
  /// 종목별 응시수수료
  FeeList,
  /// 종목별 시행일정
  JmList,
  /// 국가기술자격 종목 목록
  QualificationList,
}

impl QnetOp {
  pub fn endpoint(self) -> &'static str {
    match self {
      QnetOp::PeList => "getPEList",
      QnetOp::McList => "getMCList",
      QnetOp::EList => "getEList",
      QnetOp::CList => "getCList",
      QnetOp::FeeList => "getFeeList",
      QnetOp::JmList => "getJMList",
      QnetOp::QualificationList => "getList",
    }
  }

  pub fn requires_jm_cd(self) -> bool {
    matches!(self, QnetOp::FeeList | QnetOp::JmList)
  }
}

/// Korean message shown when `jmCd` is missing.
pub const JM_CD_REQUIRED: &str = "종목코드(jmCd)는 필수 입력값입니다.";

#[derive(Clone)]
pub struct QnetClient {
  client: reqwest::Client,
  test_info_api: String,
  qualification_api: String,
  service_key: Option<String>,
}

impl QnetClient {
  pub fn new(cfg: &ServerConfig) -> AppResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Self {
      client,
      test_info_api: cfg.qnet_test_info_api.clone(),
      qualification_api: cfg.qnet_qualification_api.clone(),
      service_key: cfg.qnet_service_key.clone(),
    })
  }

  pub fn has_service_key(&self) -> bool {
    self.service_key.is_some()
  }

  fn url_for(&self, op: QnetOp) -> String {
    let base = match op {
      QnetOp::QualificationList => &self.qualification_api,
      _ => &self.test_info_api,
    };
    format!("{}/{}", base.trim_end_matches('/'), op.endpoint())
  }

  /// Raw upstream call. Empty params are dropped; `jmCd` is validated for
  /// the operations that need it before anything goes on the wire.
  #[instrument(level = "info", skip(self, params), fields(endpoint = op.endpoint()))]
  pub async fn request(&self, op: QnetOp, params: &[(&str, Option<String>)]) -> AppResult<(u16, String)> {
    let mut query: Vec<(&str, String)> = params
      .iter()
      .filter_map(|(k, v)| {
        v.as_ref()
          .map(|s| s.trim())
          .filter(|s| !s.is_empty())
          .map(|s| (*k, s.to_string()))
      })
      .collect();

    if op.requires_jm_cd() && !query.iter().any(|(k, _)| *k == "jmCd") {
      return Err(AppError::Validation(JM_CD_REQUIRED.into()));
    }

    let url = self.url_for(op);
    info!(target: "qnet", %url, params = ?query, "Requesting Q-Net API");
    if let Some(key) = &self.service_key {
      query.insert(0, ("serviceKey", key.clone()));
    } else {
      warn!(target: "qnet", "QNET_SERVICE_KEY not set; upstream will likely reject the call");
    }

    let res = self.client.get(&url)
      .header(USER_AGENT, "qpass-backend/0.1")
      .query(&query)
      .send()
      .await
      .map_err(|e| {
        error!(target: "qnet", error = %e, "Q-Net request failed");
        AppError::upstream("qnet", e.to_string())
      })?;

    let status = res.status().as_u16();
    let body = res.text().await.map_err(|e| AppError::upstream("qnet", e.to_string()))?;
    info!(target: "qnet", status, len = body.len(), "Q-Net API response");

    let abnormal = (body.contains("resultCode") && !body.contains("<resultCode>00</resultCode>"))
      || body.contains("<returnReasonCode>");
    if abnormal {
      warn!(target: "qnet", preview = %trunc_for_log(&body, 500), "Q-Net reported a non-normal result");
    }
    Ok((status, body))
  }

  /// Call, require 2xx, flatten, and check the result header. Gateway error
  /// envelopes and documents that are not list replies are errors, so they
  /// never reach the cache as an empty list.
  async fn fetch_records(&self, op: QnetOp, params: &[(&str, Option<String>)]) -> AppResult<Vec<Map<String, Value>>> {
    let (status, body) = self.request(op, params).await?;
    if !(200..300).contains(&status) {
      return Err(AppError::upstream("qnet", format!("HTTP {status}: {}", trunc_for_log(&body, 200))));
    }
    records_from_body(&body)
  }

  pub async fn fetch_qualifications(&self) -> AppResult<Vec<QualificationItem>> {
    let records = self.fetch_records(QnetOp::QualificationList, &[]).await?;
    let items = items_from_records(&records);
    info!(target: "qnet", records = records.len(), items = items.len(), "Qualification list normalized");
    Ok(items)
  }

  /// Schedule records for one subject. `getJMList` takes only `jmCd` and
  /// answers with every sitting it knows; `year` narrows them afterwards.
  pub async fn fetch_schedules(&self, jm_cd: &str, year: Option<&str>) -> AppResult<Vec<Map<String, Value>>> {
    let records = self.fetch_records(QnetOp::JmList, &[("jmCd", Some(jm_cd.to_string()))]).await?;
    let total = records.len();
    let records = match year {
      Some(y) => filter_by_year(records, y),
      None => records,
    };
    info!(target: "qnet", %jm_cd, year = ?year, total, kept = records.len(), "Schedules fetched");
    Ok(records)
  }
}

pub fn records_from_body(body: &str) -> AppResult<Vec<Map<String, Value>>> {
  let doc = flatten_xml(body)?;
  match result_header(&doc) {
    Some((code, msg)) if code != "00" => {
      Err(AppError::upstream("qnet", format!("resultCode {code}: {msg}")))
    }
    None if !is_list_document(&doc) => Err(AppError::upstream(
      "qnet",
      format!("unrecognized response: {}", trunc_for_log(body, 200)),
    )),
    _ => Ok(items_of(&doc)),
  }
}

const YEAR_KEYS: &[&str] = &["implYy", "implyy"];

/// Keep sittings of `year`. Records that carry no year at all are kept.
pub fn filter_by_year(records: Vec<Map<String, Value>>, year: &str) -> Vec<Map<String, Value>> {
  records
    .into_iter()
    .filter(|r| {
      let found = YEAR_KEYS.iter().find_map(|k| match r.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
      });
      found.map_or(true, |y| y == year)
    })
    .collect()
}
