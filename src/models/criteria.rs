// models/criteria.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::opt_datetime;

/// Structured eligibility rule set attached to a plan or an offer.
/// `conditions` gate the purchase, `rewards` describe discount/cashback terms
/// (offers only; a plan's `rewards` block is ignored).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<CriteriaConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<RewardRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaConditions {
    #[serde(default, with = "opt_datetime", skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, with = "opt_datetime", skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicable_sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_plan_groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Flat,
    Percentage,
}

/// Discount/cashback terms. Only flat rules are evaluated; percentage rules
/// exist in stored documents but are not computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<RewardType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashback_type: Option<RewardType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashback_value: Option<f64>,
}
