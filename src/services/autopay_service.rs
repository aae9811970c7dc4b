// services/autopay_service.rs
//
// AutoPay rule CRUD plus the due-rule processor. The processor pays each
// due rule through the same purchase path as a manual recharge; failures
// are recorded per rule and never abort the batch.

use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::{Collection, Database};
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::autopay::{
    AutoPay, AutoPayCreate, AutoPayRunResult, AutoPayRunStatus, AutoPayStatus, AutoPayTag,
    AutoPayUpdate,
};
use crate::models::query::{Pagination, SortOrder};
use crate::models::transaction::{PaymentMethod, TransactionSource};
use crate::services::lifecycle::DEFAULT_VALIDITY_DAYS;
use crate::services::recharge_service::{
    self, subscribe_plan, ActivationMode, RechargeRequest,
};
use crate::state::AppState;

const AUTOPAYS: &str = "autopays";

// ---------- CRUD ----------

pub async fn create_autopay(
    state: &AppState,
    user_id: ObjectId,
    payload: &AutoPayCreate,
) -> Result<AutoPay> {
    let plan_id = ObjectId::parse_str(&payload.plan_id)?;
    // reject rules pointing at retired plans or unknown users up front
    recharge_service::get_plan_by_id(&state.db, plan_id).await?;
    recharge_service::get_user_by_id(&state.db, user_id).await?;

    let record = AutoPay {
        id: Some(ObjectId::new()),
        user_id,
        plan_id,
        phone_number: payload.phone_number.clone(),
        status: payload.status,
        tag: payload.tag,
        next_due_date: payload.next_due_date,
        created_at: Utc::now(),
    };

    let collection: Collection<AutoPay> = db_collection(&state.db);
    collection.insert_one(&record).await?;

    Ok(record)
}

pub async fn get_autopay(
    db: &Database,
    autopay_id: ObjectId,
    owner: Option<ObjectId>,
) -> Result<AutoPay> {
    let mut filter = doc! { "_id": autopay_id };
    if let Some(owner) = owner {
        filter.insert("user_id", owner);
    }

    let collection: Collection<AutoPay> = db_collection(db);
    collection
        .find_one(filter)
        .await?
        .ok_or(AppError::AutoPayNotFound)
}

pub async fn update_autopay(
    db: &Database,
    autopay_id: ObjectId,
    owner: Option<ObjectId>,
    payload: &AutoPayUpdate,
) -> Result<AutoPay> {
    let mut set = Document::new();
    if let Some(plan_id) = &payload.plan_id {
        set.insert("plan_id", ObjectId::parse_str(plan_id)?);
    }
    if let Some(phone) = &payload.phone_number {
        set.insert("phone_number", phone);
    }
    if let Some(status) = &payload.status {
        set.insert("status", to_bson(status)?);
    }
    if let Some(tag) = &payload.tag {
        set.insert("tag", to_bson(tag)?);
    }
    if let Some(next_due) = payload.next_due_date {
        set.insert("next_due_date", mongodb::bson::DateTime::from_chrono(next_due));
    }
    if set.is_empty() {
        return get_autopay(db, autopay_id, owner).await;
    }

    let mut filter = doc! { "_id": autopay_id };
    if let Some(owner) = owner {
        filter.insert("user_id", owner);
    }

    let collection: Collection<AutoPay> = db_collection(db);
    let result = collection.update_one(filter, doc! { "$set": set }).await?;
    if result.matched_count == 0 {
        return Err(AppError::AutoPayNotFound);
    }

    get_autopay(db, autopay_id, owner).await
}

pub async fn delete_autopay(
    db: &Database,
    autopay_id: ObjectId,
    owner: Option<ObjectId>,
) -> Result<()> {
    let mut filter = doc! { "_id": autopay_id };
    if let Some(owner) = owner {
        filter.insert("user_id", owner);
    }

    let collection: Collection<AutoPay> = db_collection(db);
    let result = collection.delete_one(filter).await?;
    if result.deleted_count == 0 {
        return Err(AppError::AutoPayNotFound);
    }
    Ok(())
}

// ---------- Listing ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPaySortBy {
    #[default]
    NextDueDate,
    CreatedAt,
}

impl AutoPaySortBy {
    fn field(&self) -> &'static str {
        match self {
            AutoPaySortBy::NextDueDate => "next_due_date",
            AutoPaySortBy::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoPayFilter {
    pub user_id: Option<ObjectId>,
    pub phone_number: Option<String>,
    pub status: Option<AutoPayStatus>,
    pub tag: Option<AutoPayTag>,
    pub due_before: Option<DateTime<Utc>>,
    pub sort_by: AutoPaySortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

pub fn autopay_filter_document(f: &AutoPayFilter) -> Result<Document> {
    let mut filter = Document::new();

    if let Some(user_id) = f.user_id {
        filter.insert("user_id", user_id);
    }
    if let Some(phone) = &f.phone_number {
        filter.insert("phone_number", phone);
    }
    if let Some(status) = &f.status {
        filter.insert("status", to_bson(status)?);
    }
    if let Some(tag) = &f.tag {
        filter.insert("tag", to_bson(tag)?);
    }
    if let Some(due_before) = f.due_before {
        filter.insert(
            "next_due_date",
            doc! { "$lte": mongodb::bson::DateTime::from_chrono(due_before) },
        );
    }

    Ok(filter)
}

pub async fn list_autopays(db: &Database, f: &AutoPayFilter) -> Result<(Vec<AutoPay>, u64)> {
    let collection: Collection<AutoPay> = db_collection(db);
    let filter = autopay_filter_document(f)?;

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
    let autopays: Vec<AutoPay> = cursor.try_collect().await?;

    Ok((autopays, total))
}

// ---------- Batch processor ----------

/// Enabled regular rules whose next due date has arrived. Onetime rules are
/// never picked up by the batch.
pub fn due_filter(now: DateTime<Utc>) -> Document {
    doc! {
        "status": "enabled",
        "tag": "regular",
        "next_due_date": { "$lte": mongodb::bson::DateTime::from_chrono(now) },
    }
}

/// After a successful run, a regular rule comes due again when the purchased
/// plan runs out.
pub fn advance_due_date(now: DateTime<Utc>, plan_validity: Option<i64>) -> DateTime<Utc> {
    now + Duration::days(plan_validity.unwrap_or(DEFAULT_VALIDITY_DAYS))
}

/// Pay every due rule from the owner's wallet. Each rule is processed
/// independently; a failed one is reported in its result row and the batch
/// moves on.
pub async fn process_due_autopays(state: &AppState) -> Result<Vec<AutoPayRunResult>> {
    let now = Utc::now();
    let collection: Collection<AutoPay> = db_collection(&state.db);

    let cursor = collection
        .find(due_filter(now))
        .sort(doc! { "next_due_date": 1 })
        .await?;
    let due: Vec<AutoPay> = cursor.try_collect().await?;

    info!("Processing {} due autopay rule(s)", due.len());

    let mut results = Vec::with_capacity(due.len());
    for rule in due {
        let autopay_id = rule.id.map(|id| id.to_hex()).unwrap_or_default();
        match process_one(state, &rule, now).await {
            Ok(tx_id) => results.push(AutoPayRunResult {
                autopay_id,
                status: AutoPayRunStatus::Success,
                tx_id: Some(tx_id),
                error: None,
            }),
            Err(e) => {
                warn!("Autopay {} failed: {}", autopay_id, e);
                results.push(AutoPayRunResult {
                    autopay_id,
                    status: AutoPayRunStatus::Failed,
                    tx_id: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(results)
}

async fn process_one(state: &AppState, rule: &AutoPay, now: DateTime<Utc>) -> Result<String> {
    let plan = recharge_service::get_plan_by_id(&state.db, rule.plan_id).await?;

    let request = RechargeRequest {
        phone_number: rule.phone_number.clone(),
        plan_id: rule.plan_id.to_hex(),
        offer_id: None,
        payment_method: PaymentMethod::Wallet,
        source: TransactionSource::Autopay,
        activation_mode: Some(ActivationMode::Activate),
    };

    let txn = subscribe_plan(state, rule.user_id, &request).await?;

    // only advance the schedule once the purchase has committed
    let collection: Collection<AutoPay> = db_collection(&state.db);
    collection
        .update_one(
            doc! { "_id": rule.id },
            doc! { "$set": {
                "next_due_date": mongodb::bson::DateTime::from_chrono(
                    advance_due_date(now, plan.validity),
                ),
            }},
        )
        .await?;

    Ok(txn.id)
}

fn db_collection(db: &Database) -> Collection<AutoPay> {
    db.collection(AUTOPAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_filter_targets_enabled_regular_rules() {
        let filter = due_filter(Utc::now());
        assert_eq!(filter.get_str("status").unwrap(), "enabled");
        assert_eq!(filter.get_str("tag").unwrap(), "regular");
        assert!(filter
            .get_document("next_due_date")
            .unwrap()
            .contains_key("$lte"));
    }

    #[test]
    fn due_date_advances_by_plan_validity() {
        let now = Utc::now();
        assert_eq!(advance_due_date(now, Some(84)), now + Duration::days(84));
        assert_eq!(advance_due_date(now, None), now + Duration::days(30));
    }

    #[test]
    fn status_and_tag_filters_serialize_to_wire_strings() {
        let f = AutoPayFilter {
            status: Some(AutoPayStatus::Disabled),
            tag: Some(AutoPayTag::Onetime),
            ..Default::default()
        };
        let doc = autopay_filter_document(&f).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "disabled");
        assert_eq!(doc.get_str("tag").unwrap(), "onetime");
    }
}
