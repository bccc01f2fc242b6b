//! Normalized exam data: qualification list, taxonomy views, display schedules.
//! Q-Net results are served from the 7-day cache when possible.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  Json,
};
use chrono::Datelike;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::cache::{schedule_key, QUALIFICATIONS_KEY};
use crate::error::{AppError, AppResult};
use crate::protocol::{ScheduleOut, ScheduleQuery, TaxonomyOut, TaxonomyQuery};
use crate::qnet::JM_CD_REQUIRED;
use crate::schedule::map_schedules;
use crate::state::AppState;
use crate::taxonomy::{FilterEvent, QualificationItem, TaxonomyFilter, TaxonomyIndex};

async fn load_qualifications(state: &AppState) -> AppResult<Vec<QualificationItem>> {
  state
    .cache
    .get_or_fetch(QUALIFICATIONS_KEY, || state.qnet.fetch_qualifications())
    .await
}

#[instrument(level = "info", skip(state))]
pub async fn qualifications(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<QualificationItem>>> {
  let items = load_qualifications(&state).await?;
  info!(target: "qpass_backend", count = items.len(), "Qualifications served");
  Ok(Json(items))
}

#[instrument(level = "info", skip(state))]
pub async fn qualification(
  State(state): State<Arc<AppState>>,
  Path(code): Path<String>,
) -> AppResult<Json<QualificationItem>> {
  let index = TaxonomyIndex::new(load_qualifications(&state).await?);
  index
    .find(code.trim())
    .cloned()
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("종목코드 {code}에 해당하는 종목이 없습니다.")))
}

/// Query parameters replayed as filter events, parent level first.
pub fn filter_from_query(q: TaxonomyQuery) -> TaxonomyFilter {
  let mut filter = TaxonomyFilter::default();
  if let Some(b) = q.broad {
    filter = filter.apply(FilterEvent::SelectBroad(b));
  }
  if let Some(m) = q.mid {
    filter = filter.apply(FilterEvent::SelectMid(m));
  }
  if let Some(s) = q.search {
    filter = filter.apply(FilterEvent::Search(s));
  }
  filter
}

pub fn taxonomy_view(index: &TaxonomyIndex, filter: &TaxonomyFilter) -> TaxonomyOut {
  TaxonomyOut {
    broad_fields: index.broad_fields(),
    mid_fields: filter.mid_fields(index),
    subjects: filter.subjects(index),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn taxonomy(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TaxonomyQuery>,
) -> AppResult<Json<TaxonomyOut>> {
  let index = TaxonomyIndex::new(load_qualifications(&state).await?);
  let filter = filter_from_query(q);
  Ok(Json(taxonomy_view(&index, &filter)))
}

#[instrument(level = "info", skip(state))]
pub async fn schedules(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ScheduleQuery>,
) -> AppResult<Json<Vec<ScheduleOut>>> {
  let jm_cd = q
    .jm_cd
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .ok_or_else(|| AppError::Validation(JM_CD_REQUIRED.into()))?;
  let year = q
    .year
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| chrono::Local::now().year().to_string());

  let key = schedule_key(&jm_cd, &year);
  let records: Vec<Map<String, Value>> = state
    .cache
    .get_or_fetch(&key, || state.qnet.fetch_schedules(&jm_cd, Some(year.as_str())))
    .await?;

  let out: Vec<ScheduleOut> = map_schedules(&records)
    .into_iter()
    .zip(records)
    .map(|(view, record)| ScheduleOut { view, record })
    .collect();
  info!(target: "qpass_backend", %jm_cd, %year, sittings = out.len(), "Schedules served");
  Ok(Json(out))
}
