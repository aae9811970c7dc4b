// handlers/recharge_handlers.rs
use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use validator::Validate;

use crate::errors::Result;
use crate::models::active_plan::{ActivePlanResponse, ActivePlanStatus};
use crate::models::query::{Pagination, SortOrder};
use crate::models::transaction::{
    PaymentMethod, ServiceType, TransactionCategory, TransactionResponse, TransactionSource,
    TransactionStatus, TransactionType,
};
use crate::models::user::Identity;
use crate::services::ledger::{self, TransactionFilter, TransactionSortBy};
use crate::services::lifecycle::{self, ActivePlanFilter, ActivePlanSortBy};
use crate::services::recharge_service::{self, RechargeRequest, WalletTopupRequest};
use crate::state::AppState;

use super::{caller_user_id, Paginated};

// Subscribe the target phone number to a plan, paying from the caller's
// wallet or an external method.
pub async fn recharge(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<RechargeRequest>,
) -> Result<Json<TransactionResponse>> {
    payload.validate()?;
    let payer_id = caller_user_id(identity)?;
    let txn = recharge_service::subscribe_plan(&state, payer_id, &payload).await?;
    Ok(Json(txn))
}

pub async fn wallet_topup(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<WalletTopupRequest>,
) -> Result<Json<TransactionResponse>> {
    payload.validate()?;
    let payer_id = caller_user_id(identity)?;
    let txn = recharge_service::wallet_topup(&state, payer_id, &payload).await?;
    Ok(Json(txn))
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub user_id: Option<String>,
    pub category: Option<TransactionCategory>,
    pub txn_type: Option<TransactionType>,
    pub service_type: Option<ServiceType>,
    pub source: Option<TransactionSource>,
    pub status: Option<TransactionStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub from_phone_number: Option<String>,
    pub from_phone_number_like: Option<String>,
    pub to_phone_number: Option<String>,
    pub to_phone_number_like: Option<String>,
    pub payment_reference_like: Option<String>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub created_at_start: Option<DateTime<Utc>>,
    pub created_at_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort_by: TransactionSortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl TransactionQuery {
    fn into_filter(self, forced_user: Option<ObjectId>) -> Result<TransactionFilter> {
        let user_id = match forced_user {
            Some(id) => Some(id),
            None => self
                .user_id
                .as_deref()
                .map(ObjectId::parse_str)
                .transpose()?,
        };

        Ok(TransactionFilter {
            user_id,
            category: self.category,
            txn_type: self.txn_type,
            service_type: self.service_type,
            source: self.source,
            status: self.status,
            payment_method: self.payment_method,
            from_phone_number: self.from_phone_number,
            from_phone_number_like: self.from_phone_number_like,
            to_phone_number: self.to_phone_number,
            to_phone_number_like: self.to_phone_number_like,
            payment_reference_like: self.payment_reference_like,
            amount_min: self.amount_min,
            amount_max: self.amount_max,
            created_at_start: self.created_at_start,
            created_at_end: self.created_at_end,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            pagination: Pagination::from_params(self.page, self.size),
        })
    }
}

// Own transaction history; the user_id filter is pinned to the caller.
pub async fn get_my_transactions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Paginated<TransactionResponse>>> {
    let user_id = caller_user_id(identity)?;
    let filter = query.into_filter(Some(user_id))?;
    let pagination = filter.pagination;

    let (transactions, total) = ledger::list_transactions(&state.db, &filter).await?;
    let items = transactions.into_iter().map(TransactionResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

pub async fn admin_get_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Paginated<TransactionResponse>>> {
    let filter = query.into_filter(None)?;
    let pagination = filter.pagination;

    let (transactions, total) = ledger::list_transactions(&state.db, &filter).await?;
    let items = transactions.into_iter().map(TransactionResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivePlanQuery {
    pub user_id: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_like: Option<String>,
    pub plan_id: Option<String>,
    pub status: Option<ActivePlanStatus>,
    pub valid_from_start: Option<DateTime<Utc>>,
    pub valid_from_end: Option<DateTime<Utc>>,
    pub valid_to_start: Option<DateTime<Utc>>,
    pub valid_to_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort_by: ActivePlanSortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl ActivePlanQuery {
    fn into_filter(self, forced_user: Option<ObjectId>) -> Result<ActivePlanFilter> {
        let user_id = match forced_user {
            Some(id) => Some(id),
            None => self
                .user_id
                .as_deref()
                .map(ObjectId::parse_str)
                .transpose()?,
        };

        Ok(ActivePlanFilter {
            user_id,
            phone_number: self.phone_number,
            phone_number_like: self.phone_number_like,
            plan_id: self.plan_id.as_deref().map(ObjectId::parse_str).transpose()?,
            status: self.status,
            valid_from_start: self.valid_from_start,
            valid_from_end: self.valid_from_end,
            valid_to_start: self.valid_to_start,
            valid_to_end: self.valid_to_end,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            pagination: Pagination::from_params(self.page, self.size),
        })
    }
}

pub async fn get_my_active_plans(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ActivePlanQuery>,
) -> Result<Json<Paginated<ActivePlanResponse>>> {
    let user_id = caller_user_id(identity)?;
    let filter = query.into_filter(Some(user_id))?;
    let pagination = filter.pagination;

    let (plans, total) = lifecycle::list_active_plans(&state.client, &state.db, &filter).await?;
    let items = plans.into_iter().map(ActivePlanResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

pub async fn admin_get_active_plans(
    State(state): State<AppState>,
    Query(query): Query<ActivePlanQuery>,
) -> Result<Json<Paginated<ActivePlanResponse>>> {
    let filter = query.into_filter(None)?;
    let pagination = filter.pagination;

    let (plans, total) = lifecycle::list_active_plans(&state.client, &state.db, &filter).await?;
    let items = plans.into_iter().map(ActivePlanResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_user_overrides_query_user_id() {
        let forced = ObjectId::new();
        let query = TransactionQuery {
            user_id: Some(ObjectId::new().to_hex()),
            ..Default::default()
        };
        let filter = query.into_filter(Some(forced)).unwrap();
        assert_eq!(filter.user_id, Some(forced));
    }

    #[test]
    fn admin_query_user_id_is_parsed() {
        let target = ObjectId::new();
        let query = TransactionQuery {
            user_id: Some(target.to_hex()),
            ..Default::default()
        };
        let filter = query.into_filter(None).unwrap();
        assert_eq!(filter.user_id, Some(target));

        let bad = TransactionQuery {
            user_id: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(bad.into_filter(None).is_err());
    }

    #[test]
    fn pagination_params_flow_through() {
        let query = ActivePlanQuery {
            page: Some(2),
            size: Some(5),
            ..Default::default()
        };
        let filter = query.into_filter(None).unwrap();
        assert_eq!(filter.pagination, Pagination::Page { page: 2, size: 5 });
    }
}
