// models/autopay.rs
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPayStatus {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPayTag {
    Onetime,
    Regular,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPay {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub plan_id: ObjectId,
    pub phone_number: String,
    pub status: AutoPayStatus,
    pub tag: AutoPayTag,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub next_due_date: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AutoPayCreate {
    pub plan_id: String,
    #[validate(length(min = 10, message = "phone number too short"))]
    pub phone_number: String,
    pub status: AutoPayStatus,
    pub tag: AutoPayTag,
    pub next_due_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AutoPayUpdate {
    pub plan_id: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<AutoPayStatus>,
    pub tag: Option<AutoPayTag>,
    pub next_due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AutoPayResponse {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub phone_number: String,
    pub status: AutoPayStatus,
    pub tag: AutoPayTag,
    pub next_due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<AutoPay> for AutoPayResponse {
    fn from(ap: AutoPay) -> Self {
        AutoPayResponse {
            id: ap.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: ap.user_id.to_hex(),
            plan_id: ap.plan_id.to_hex(),
            phone_number: ap.phone_number,
            status: ap.status,
            tag: ap.tag,
            next_due_date: ap.next_due_date,
            created_at: ap.created_at,
        }
    }
}

/// Per-rule outcome of a batch processing pass. One rule failing never
/// aborts the rest of the batch.
#[derive(Debug, Serialize)]
pub struct AutoPayRunResult {
    pub autopay_id: String,
    pub status: AutoPayRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPayRunStatus {
    Success,
    Failed,
}
