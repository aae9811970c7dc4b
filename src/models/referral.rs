// models/referral.rs
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::opt_datetime;

/// `pending` rows are created at signup by the onboarding flow; this service
/// only ever moves them to `earned`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralRewardStatus {
    Pending,
    Earned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralReward {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub referrer_id: ObjectId,
    pub referred_id: ObjectId,
    pub reward_amount: f64,
    pub status: ReferralRewardStatus,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "opt_datetime", skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReferralRewardResponse {
    pub id: String,
    pub referrer_id: String,
    pub referred_id: String,
    pub reward_amount: f64,
    pub status: ReferralRewardStatus,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl From<ReferralReward> for ReferralRewardResponse {
    fn from(reward: ReferralReward) -> Self {
        ReferralRewardResponse {
            id: reward.id.map(|id| id.to_hex()).unwrap_or_default(),
            referrer_id: reward.referrer_id.to_hex(),
            referred_id: reward.referred_id.to_hex(),
            reward_amount: reward.reward_amount,
            status: reward.status,
            created_at: reward.created_at,
            claimed_at: reward.claimed_at,
        }
    }
}
