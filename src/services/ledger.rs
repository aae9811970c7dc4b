// services/ledger.rs
//
// Append-only transaction ledger plus the wallet balance operations that
// must stay in the same session as their ledger entries. Nothing in here
// updates or deletes a transaction document after insert.

use chrono::{DateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::{ClientSession, Collection, Database};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::query::{like_regex, Pagination, SortOrder};
use crate::models::transaction::{
    PaymentMethod, ServiceType, Transaction, TransactionCategory, TransactionSource,
    TransactionStatus, TransactionType,
};
use crate::models::user::User;

const TRANSACTIONS: &str = "transactions";
const USERS: &str = "users";

/// Ledger entry fields supplied by the caller; id, timestamp and the
/// payment reference are generated at insert time.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Option<ObjectId>,
    pub category: TransactionCategory,
    pub txn_type: TransactionType,
    pub amount: f64,
    pub service_type: Option<ServiceType>,
    pub plan_id: Option<ObjectId>,
    pub offer_id: Option<ObjectId>,
    pub from_phone_number: Option<String>,
    pub to_phone_number: Option<String>,
    pub source: TransactionSource,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference_prefix: Option<&'static str>,
}

pub fn payment_reference(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Insert one ledger entry within the caller's session. Amounts are
/// non-negative by contract; direction is carried by `txn_type`.
pub async fn append_transaction(
    db: &Database,
    session: &mut ClientSession,
    new: NewTransaction,
) -> Result<Transaction> {
    if new.amount < 0.0 {
        return Err(AppError::invalid_data("transaction amount must be non-negative"));
    }

    let record = Transaction {
        id: Some(ObjectId::new()),
        user_id: new.user_id,
        category: new.category,
        txn_type: new.txn_type,
        amount: new.amount,
        service_type: new.service_type,
        plan_id: new.plan_id,
        offer_id: new.offer_id,
        from_phone_number: new.from_phone_number,
        to_phone_number: new.to_phone_number,
        source: new.source,
        status: new.status,
        payment_method: new.payment_method,
        payment_transaction_id: new.payment_reference_prefix.map(payment_reference),
        created_at: Utc::now(),
    };

    let collection: Collection<Transaction> = db.collection(TRANSACTIONS);
    collection.insert_one(&record).session(&mut *session).await?;

    Ok(record)
}

/// Debit a wallet inside the caller's session. The balance guard sits in
/// the update filter, so two concurrent debits can never race the balance
/// below zero.
pub async fn debit_wallet(
    db: &Database,
    session: &mut ClientSession,
    user_id: ObjectId,
    amount: f64,
) -> Result<()> {
    if amount < 0.0 {
        return Err(AppError::invalid_data("debit amount must be non-negative"));
    }

    let users: Collection<User> = db.collection(USERS);
    let result = users
        .update_one(
            doc! { "_id": user_id, "wallet_balance": { "$gte": amount } },
            doc! { "$inc": { "wallet_balance": -amount } },
        )
        .session(&mut *session)
        .await?;

    if result.matched_count == 0 {
        let exists = users
            .find_one(doc! { "_id": user_id })
            .session(&mut *session)
            .await?;
        return match exists {
            Some(_) => Err(AppError::InsufficientFunds),
            None => Err(AppError::UserNotFound(user_id.to_hex())),
        };
    }

    Ok(())
}

pub async fn credit_wallet(
    db: &Database,
    session: &mut ClientSession,
    user_id: ObjectId,
    amount: f64,
) -> Result<()> {
    if amount < 0.0 {
        return Err(AppError::invalid_data("credit amount must be non-negative"));
    }

    let users: Collection<User> = db.collection(USERS);
    let result = users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$inc": { "wallet_balance": amount } },
        )
        .session(&mut *session)
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::UserNotFound(user_id.to_hex()));
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSortBy {
    #[default]
    CreatedAt,
    Amount,
}

impl TransactionSortBy {
    fn field(&self) -> &'static str {
        match self {
            TransactionSortBy::CreatedAt => "created_at",
            TransactionSortBy::Amount => "amount",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<ObjectId>,
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
    pub sort_by: TransactionSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

pub fn filter_document(f: &TransactionFilter) -> Result<Document> {
    let mut filter = Document::new();

    if let Some(user_id) = f.user_id {
        filter.insert("user_id", user_id);
    }
    if let Some(category) = &f.category {
        filter.insert("category", to_bson(category)?);
    }
    if let Some(txn_type) = &f.txn_type {
        filter.insert("txn_type", to_bson(txn_type)?);
    }
    if let Some(service_type) = &f.service_type {
        filter.insert("service_type", to_bson(service_type)?);
    }
    if let Some(source) = &f.source {
        filter.insert("source", to_bson(source)?);
    }
    if let Some(status) = &f.status {
        filter.insert("status", to_bson(status)?);
    }
    if let Some(payment_method) = &f.payment_method {
        filter.insert("payment_method", to_bson(payment_method)?);
    }

    if let Some(phone) = &f.from_phone_number {
        filter.insert("from_phone_number", phone);
    }
    if let Some(fragment) = &f.from_phone_number_like {
        filter.insert("from_phone_number", like_regex(fragment));
    }
    if let Some(phone) = &f.to_phone_number {
        filter.insert("to_phone_number", phone);
    }
    if let Some(fragment) = &f.to_phone_number_like {
        filter.insert("to_phone_number", like_regex(fragment));
    }
    if let Some(fragment) = &f.payment_reference_like {
        filter.insert("payment_transaction_id", like_regex(fragment));
    }

    if f.amount_min.is_some() || f.amount_max.is_some() {
        let mut range = Document::new();
        if let Some(min) = f.amount_min {
            range.insert("$gte", min);
        }
        if let Some(max) = f.amount_max {
            range.insert("$lte", max);
        }
        filter.insert("amount", range);
    }

    if f.created_at_start.is_some() || f.created_at_end.is_some() {
        let mut range = Document::new();
        if let Some(start) = f.created_at_start {
            range.insert("$gte", mongodb::bson::DateTime::from_chrono(start));
        }
        if let Some(end) = f.created_at_end {
            // end date inclusive: everything before the following midnight
            let next_midnight = (end.date_naive() + chrono::Days::new(1))
                .and_time(NaiveTime::MIN)
                .and_utc();
            range.insert("$lt", mongodb::bson::DateTime::from_chrono(next_midnight));
        }
        filter.insert("created_at", range);
    }

    Ok(filter)
}

/// List ledger entries with filtering, sorting and pagination. Returns the
/// page plus the total match count.
pub async fn list_transactions(
    db: &Database,
    f: &TransactionFilter,
) -> Result<(Vec<Transaction>, u64)> {
    let collection: Collection<Transaction> = db.collection(TRANSACTIONS);
    let filter = filter_document(f)?;

    let total = collection.count_documents(filter.clone()).await?;

    let sort = doc! { f.sort_by.field(): f.sort_order.direction() };
    let mut find = collection.find(filter).sort(sort);
    if let Pagination::Page { .. } = f.pagination {
        find = find.skip(f.pagination.skip());
        if let Some(limit) = f.pagination.limit() {
            find = find.limit(limit);
        }
    }

    let cursor = find.await?;
    let transactions: Vec<Transaction> = cursor.try_collect().await?;

    Ok((transactions, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let f = TransactionFilter::default();
        let doc = filter_document(&f).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn enum_filters_serialize_to_wire_strings() {
        let f = TransactionFilter {
            category: Some(TransactionCategory::Wallet),
            txn_type: Some(TransactionType::Debit),
            source: Some(TransactionSource::WalletTopup),
            status: Some(TransactionStatus::Success),
            payment_method: Some(PaymentMethod::Upi),
            ..Default::default()
        };
        let doc = filter_document(&f).unwrap();
        assert_eq!(doc.get_str("category").unwrap(), "wallet");
        assert_eq!(doc.get_str("txn_type").unwrap(), "debit");
        assert_eq!(doc.get_str("source").unwrap(), "wallet_topup");
        assert_eq!(doc.get_str("status").unwrap(), "success");
        assert_eq!(doc.get_str("payment_method").unwrap(), "UPI");
    }

    #[test]
    fn amount_range_builds_a_single_range_document() {
        let f = TransactionFilter {
            amount_min: Some(100.0),
            amount_max: Some(500.0),
            ..Default::default()
        };
        let doc = filter_document(&f).unwrap();
        let range = doc.get_document("amount").unwrap();
        assert_eq!(range.get_f64("$gte").unwrap(), 100.0);
        assert_eq!(range.get_f64("$lte").unwrap(), 500.0);
    }

    #[test]
    fn created_at_end_is_inclusive_to_end_of_day() {
        let end = "2026-03-15T10:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let f = TransactionFilter {
            created_at_end: Some(end),
            ..Default::default()
        };
        let doc = filter_document(&f).unwrap();
        let range = doc.get_document("created_at").unwrap();
        let bound = range.get_datetime("$lt").unwrap().to_chrono();
        assert_eq!(bound, "2026-03-16T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn substring_filters_use_case_insensitive_regex() {
        let f = TransactionFilter {
            to_phone_number_like: Some("9876".to_string()),
            payment_reference_like: Some("PYMT_".to_string()),
            ..Default::default()
        };
        let doc = filter_document(&f).unwrap();
        let phone = doc.get_document("to_phone_number").unwrap();
        assert_eq!(phone.get_str("$regex").unwrap(), "9876");
        let reference = doc.get_document("payment_transaction_id").unwrap();
        assert_eq!(reference.get_str("$regex").unwrap(), "PYMT_");
    }

    #[test]
    fn payment_references_carry_prefix_and_are_unique() {
        let a = payment_reference("PYMT");
        let b = payment_reference("PYMT");
        assert!(a.starts_with("PYMT_"));
        assert_ne!(a, b);
    }
}
