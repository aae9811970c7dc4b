// models/active_plan.rs
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Lifecycle states of a subscription instance. `expired` is terminal;
/// records are never deleted, only transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePlanStatus {
    Active,
    Queued,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePlan {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub plan_id: ObjectId,
    pub phone_number: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub valid_from: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub valid_to: DateTime<Utc>,

    pub status: ActivePlanStatus,
}

#[derive(Debug, Serialize)]
pub struct ActivePlanResponse {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub phone_number: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub status: ActivePlanStatus,
}

impl From<ActivePlan> for ActivePlanResponse {
    fn from(plan: ActivePlan) -> Self {
        ActivePlanResponse {
            id: plan.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: plan.user_id.to_hex(),
            plan_id: plan.plan_id.to_hex(),
            phone_number: plan.phone_number,
            valid_from: plan.valid_from,
            valid_to: plan.valid_to,
            status: plan.status,
        }
    }
}
