// models/transaction.rs
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Wallet,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Prepaid,
    Postpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Recharge,
    WalletTopup,
    Refund,
    ReferralReward,
    OfferCashback,
    Autopay,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSource::Recharge => "recharge",
            TransactionSource::WalletTopup => "wallet_topup",
            TransactionSource::Refund => "refund",
            TransactionSource::ReferralReward => "referral_reward",
            TransactionSource::OfferCashback => "offer_cashback",
            TransactionSource::Autopay => "autopay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Success,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "UPI")]
    Upi,
    Card,
    NetBanking,
    Wallet,
}

/// One ledger entry. Never mutated or deleted after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,

    pub category: TransactionCategory,
    pub txn_type: TransactionType,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_phone_number: Option<String>,

    pub source: TransactionSource,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_transaction_id: Option<String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub category: TransactionCategory,
    pub txn_type: TransactionType,
    pub amount: f64,
    pub service_type: Option<ServiceType>,
    pub plan_id: Option<String>,
    pub offer_id: Option<String>,
    pub from_phone_number: Option<String>,
    pub to_phone_number: Option<String>,
    pub source: TransactionSource,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(txn: Transaction) -> Self {
        TransactionResponse {
            id: txn.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: txn.user_id.map(|id| id.to_hex()),
            category: txn.category,
            txn_type: txn.txn_type,
            amount: txn.amount,
            service_type: txn.service_type,
            plan_id: txn.plan_id.map(|id| id.to_hex()),
            offer_id: txn.offer_id.map(|id| id.to_hex()),
            from_phone_number: txn.from_phone_number,
            to_phone_number: txn.to_phone_number,
            source: txn.source,
            status: txn.status,
            payment_method: txn.payment_method,
            payment_transaction_id: txn.payment_transaction_id,
            created_at: txn.created_at,
        }
    }
}
