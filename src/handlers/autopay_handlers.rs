// handlers/autopay_handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::Result;
use crate::models::autopay::{
    AutoPayCreate, AutoPayResponse, AutoPayRunResult, AutoPayStatus, AutoPayTag, AutoPayUpdate,
};
use crate::models::query::{Pagination, SortOrder};
use crate::models::user::Identity;
use crate::services::autopay_service::{self, AutoPayFilter, AutoPaySortBy};
use crate::state::AppState;

use super::{caller_user_id, Paginated};

pub async fn create_autopay(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<AutoPayCreate>,
) -> Result<Json<AutoPayResponse>> {
    payload.validate()?;
    let user_id = caller_user_id(identity)?;
    let autopay = autopay_service::create_autopay(&state, user_id, &payload).await?;
    Ok(Json(autopay.into()))
}

pub async fn get_autopay(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(autopay_id): Path<String>,
) -> Result<Json<AutoPayResponse>> {
    let user_id = caller_user_id(identity)?;
    let autopay = autopay_service::get_autopay(
        &state.db,
        ObjectId::parse_str(&autopay_id)?,
        Some(user_id),
    )
    .await?;
    Ok(Json(autopay.into()))
}

pub async fn update_autopay(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(autopay_id): Path<String>,
    Json(payload): Json<AutoPayUpdate>,
) -> Result<Json<AutoPayResponse>> {
    let user_id = caller_user_id(identity)?;
    let autopay = autopay_service::update_autopay(
        &state.db,
        ObjectId::parse_str(&autopay_id)?,
        Some(user_id),
        &payload,
    )
    .await?;
    Ok(Json(autopay.into()))
}

pub async fn delete_autopay(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(autopay_id): Path<String>,
) -> Result<Json<Value>> {
    let user_id = caller_user_id(identity)?;
    autopay_service::delete_autopay(&state.db, ObjectId::parse_str(&autopay_id)?, Some(user_id))
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoPayQuery {
    pub user_id: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<AutoPayStatus>,
    pub tag: Option<AutoPayTag>,
    pub due_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort_by: AutoPaySortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl AutoPayQuery {
    fn into_filter(self, forced_user: Option<ObjectId>) -> Result<AutoPayFilter> {
        let user_id = match forced_user {
            Some(id) => Some(id),
            None => self
                .user_id
                .as_deref()
                .map(ObjectId::parse_str)
                .transpose()?,
        };

        Ok(AutoPayFilter {
            user_id,
            phone_number: self.phone_number,
            status: self.status,
            tag: self.tag,
            due_before: self.due_before,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            pagination: Pagination::from_params(self.page, self.size),
        })
    }
}

pub async fn get_my_autopays(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<AutoPayQuery>,
) -> Result<Json<Paginated<AutoPayResponse>>> {
    let user_id = caller_user_id(identity)?;
    let filter = query.into_filter(Some(user_id))?;
    let pagination = filter.pagination;

    let (autopays, total) = autopay_service::list_autopays(&state.db, &filter).await?;
    let items = autopays.into_iter().map(AutoPayResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

pub async fn admin_get_autopays(
    State(state): State<AppState>,
    Query(query): Query<AutoPayQuery>,
) -> Result<Json<Paginated<AutoPayResponse>>> {
    let filter = query.into_filter(None)?;
    let pagination = filter.pagination;

    let (autopays, total) = autopay_service::list_autopays(&state.db, &filter).await?;
    let items = autopays.into_iter().map(AutoPayResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

// Admin trigger for the due-rule batch. Returns one result row per rule.
pub async fn process_due(
    State(state): State<AppState>,
) -> Result<Json<Vec<AutoPayRunResult>>> {
    let results = autopay_service::process_due_autopays(&state).await?;
    Ok(Json(results))
}
