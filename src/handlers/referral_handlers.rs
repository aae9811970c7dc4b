// handlers/referral_handlers.rs
use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::errors::Result;
use crate::models::query::{Pagination, SortOrder};
use crate::models::referral::{ReferralRewardResponse, ReferralRewardStatus};
use crate::models::user::Identity;
use crate::services::referral_service::{self, ReferralFilter, ReferralSortBy};
use crate::state::AppState;

use super::{caller_user_id, Paginated};

#[derive(Debug, Default, Deserialize)]
pub struct ReferralQuery {
    pub user_id: Option<String>,
    pub status: Option<ReferralRewardStatus>,
    #[serde(default)]
    pub sort_by: ReferralSortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl ReferralQuery {
    fn into_filter(self, forced_party: Option<ObjectId>) -> Result<ReferralFilter> {
        let party = match forced_party {
            Some(id) => Some(id),
            None => self
                .user_id
                .as_deref()
                .map(ObjectId::parse_str)
                .transpose()?,
        };

        Ok(ReferralFilter {
            party,
            status: self.status,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            pagination: Pagination::from_params(self.page, self.size),
        })
    }
}

// Rewards where the caller is either the referrer or the referred user.
pub async fn get_my_referrals(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ReferralQuery>,
) -> Result<Json<Paginated<ReferralRewardResponse>>> {
    let user_id = caller_user_id(identity)?;
    let filter = query.into_filter(Some(user_id))?;
    let pagination = filter.pagination;

    let (rewards, total) = referral_service::list_referral_rewards(&state.db, &filter).await?;
    let items = rewards.into_iter().map(ReferralRewardResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}

pub async fn admin_get_referrals(
    State(state): State<AppState>,
    Query(query): Query<ReferralQuery>,
) -> Result<Json<Paginated<ReferralRewardResponse>>> {
    let filter = query.into_filter(None)?;
    let pagination = filter.pagination;

    let (rewards, total) = referral_service::list_referral_rewards(&state.db, &filter).await?;
    let items = rewards.into_iter().map(ReferralRewardResponse::from).collect();

    Ok(Json(Paginated::new(items, total, pagination)))
}
