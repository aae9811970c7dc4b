use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Prepaid,
    Postpaid,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Prepaid => "prepaid",
            UserType::Postpaid => "postpaid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Blocked,
    Deactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: String,
    pub referral_code: Option<String>,
    pub referee_code: Option<String>,
    pub user_type: Option<UserType>,
    pub status: UserStatus,
    pub wallet_balance: f64,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Caller identity resolved once at the auth boundary and carried as a
/// concrete type from there on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    User(ObjectId),
    Admin(ObjectId),
}

impl Identity {
    pub fn user_id(&self) -> Option<ObjectId> {
        match self {
            Identity::User(id) => Some(*id),
            Identity::Admin(_) => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin(_))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub phone: String,
    pub exp: usize,
}
