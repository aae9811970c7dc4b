// services/lifecycle.rs
//
// Per (user, phone number) plan state machine: queued -> active -> expired.
// At most one record may be `active` per pair at any instant; the
// expire-and-promote sweep plus the status decision below run inside the
// purchase transaction, so concurrent purchases on the same number cannot
// both observe "no active plan".

use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::{Client, ClientSession, Collection, Database};
use tracing::info;

use crate::errors::Result;
use crate::models::active_plan::{ActivePlan, ActivePlanStatus};
use crate::models::query::{like_regex, Pagination, SortOrder};
use crate::services::txn;

const ACTIVE_PLANS: &str = "active_plans";

pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Status for a newly purchased plan. `force_queue` wins over everything;
/// otherwise the purchase activates unless an active record is in the way
/// and the caller did not force activation.
pub fn decide_plan_status(
    has_active: bool,
    force_queue: bool,
    force_activate: bool,
) -> ActivePlanStatus {
    if force_queue {
        return ActivePlanStatus::Queued;
    }
    if !has_active || force_activate {
        return ActivePlanStatus::Active;
    }
    ActivePlanStatus::Queued
}

pub fn validity_window(
    now: DateTime<Utc>,
    validity_days: Option<i64>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let days = validity_days.unwrap_or(DEFAULT_VALIDITY_DAYS);
    (now, now + Duration::days(days))
}

/// Expire overdue active records, then promote the earliest eligible queued
/// record if no active one remains. Session-scoped; runs before every new
/// purchase on the phone number.
pub async fn expire_and_promote(
    db: &Database,
    session: &mut ClientSession,
    user_id: ObjectId,
    phone_number: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let collection: Collection<ActivePlan> = db.collection(ACTIVE_PLANS);
    let now_bson = mongodb::bson::DateTime::from_chrono(now);

    collection
        .update_many(
            doc! {
                "user_id": user_id,
                "phone_number": phone_number,
                "status": "active",
                "valid_to": { "$lt": now_bson },
            },
            doc! { "$set": { "status": "expired" } },
        )
        .session(&mut *session)
        .await?;

    let has_active = collection
        .find_one(doc! {
            "user_id": user_id,
            "phone_number": phone_number,
            "status": "active",
        })
        .session(&mut *session)
        .await?
        .is_some();

    if !has_active {
        // FIFO by valid_from among queued records that have become due
        let next = collection
            .find_one(doc! {
                "user_id": user_id,
                "phone_number": phone_number,
                "status": "queued",
                "valid_from": { "$lte": now_bson },
            })
            .sort(doc! { "valid_from": 1 })
            .session(&mut *session)
            .await?;

        if let Some(next_plan) = next {
            collection
                .update_one(
                    doc! { "_id": next_plan.id },
                    doc! { "$set": { "status": "active" } },
                )
                .session(&mut *session)
                .await?;
            info!(
                "Promoted queued plan {} to active for {}",
                next_plan.id.map(|id| id.to_hex()).unwrap_or_default(),
                phone_number
            );
        }
    }

    Ok(())
}

pub async fn has_active_plan(
    db: &Database,
    session: &mut ClientSession,
    user_id: ObjectId,
    phone_number: &str,
) -> Result<bool> {
    let collection: Collection<ActivePlan> = db.collection(ACTIVE_PLANS);
    let found = collection
        .find_one(doc! {
            "user_id": user_id,
            "phone_number": phone_number,
            "status": "active",
        })
        .session(&mut *session)
        .await?;
    Ok(found.is_some())
}

pub async fn insert_active_plan(
    db: &Database,
    session: &mut ClientSession,
    user_id: ObjectId,
    plan_id: ObjectId,
    phone_number: &str,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    status: ActivePlanStatus,
) -> Result<ActivePlan> {
    let record = ActivePlan {
        id: Some(ObjectId::new()),
        user_id,
        plan_id,
        phone_number: phone_number.to_string(),
        valid_from,
        valid_to,
        status,
    };

    let collection: Collection<ActivePlan> = db.collection(ACTIVE_PLANS);
    collection.insert_one(&record).session(&mut *session).await?;

    Ok(record)
}

/// Run the expire-and-promote sweep in its own transaction, with bounded
/// retry on transient conflicts. Used by listing paths that want fresh
/// state outside a purchase.
pub async fn sweep_phone(
    client: &Client,
    db: &Database,
    user_id: ObjectId,
    phone_number: &str,
) -> Result<()> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut session = client.start_session().await?;
        session.start_transaction().await?;

        match expire_and_promote(db, &mut session, user_id, phone_number, Utc::now()).await {
            Ok(()) => {
                txn::commit_with_retry(&mut session).await?;
                return Ok(());
            }
            Err(e) => {
                txn::abort_quietly(&mut session).await;
                if txn::is_transient(&e) && attempts < txn::MAX_TXN_RETRIES {
                    continue;
                }
                return Err(e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePlanSortBy {
    ValidFrom,
    #[default]
    ValidTo,
}

impl ActivePlanSortBy {
    fn field(&self) -> &'static str {
        match self {
            ActivePlanSortBy::ValidFrom => "valid_from",
            ActivePlanSortBy::ValidTo => "valid_to",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivePlanFilter {
    pub user_id: Option<ObjectId>,
    pub phone_number: Option<String>,
    pub phone_number_like: Option<String>,
    pub plan_id: Option<ObjectId>,
    pub status: Option<ActivePlanStatus>,
    pub valid_from_start: Option<DateTime<Utc>>,
    pub valid_from_end: Option<DateTime<Utc>>,
    pub valid_to_start: Option<DateTime<Utc>>,
    pub valid_to_end: Option<DateTime<Utc>>,
    pub sort_by: ActivePlanSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

pub fn active_plan_filter_document(f: &ActivePlanFilter) -> Result<Document> {
    let mut filter = Document::new();

    if let Some(user_id) = f.user_id {
        filter.insert("user_id", user_id);
    }
    if let Some(phone) = &f.phone_number {
        filter.insert("phone_number", phone);
    }
    if let Some(fragment) = &f.phone_number_like {
        filter.insert("phone_number", like_regex(fragment));
    }
    if let Some(plan_id) = f.plan_id {
        filter.insert("plan_id", plan_id);
    }
    if let Some(status) = &f.status {
        filter.insert("status", to_bson(status)?);
    }

    for (field, start, end) in [
        ("valid_from", f.valid_from_start, f.valid_from_end),
        ("valid_to", f.valid_to_start, f.valid_to_end),
    ] {
        if start.is_some() || end.is_some() {
            let mut range = Document::new();
            if let Some(start) = start {
                range.insert("$gte", mongodb::bson::DateTime::from_chrono(start));
            }
            if let Some(end) = end {
                range.insert("$lte", mongodb::bson::DateTime::from_chrono(end));
            }
            filter.insert(field, range);
        }
    }

    Ok(filter)
}

/// List active-plan records. Exact-phone queries sweep the lifecycle first
/// so the listing reflects current state.
pub async fn list_active_plans(
    client: &Client,
    db: &Database,
    f: &ActivePlanFilter,
) -> Result<(Vec<ActivePlan>, u64)> {
    if let Some(phone) = &f.phone_number {
        let users: Collection<crate::models::user::User> = db.collection("users");
        if let Some(user) = users.find_one(doc! { "phone_number": phone }).await? {
            if let Some(user_id) = user.id {
                sweep_phone(client, db, user_id, phone).await?;
            }
        }
    }

    let collection: Collection<ActivePlan> = db.collection(ACTIVE_PLANS);
    let filter = active_plan_filter_document(f)?;

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
    let plans: Vec<ActivePlan> = cursor.try_collect().await?;

    Ok((plans, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_queue_always_queues() {
        assert_eq!(decide_plan_status(false, true, false), ActivePlanStatus::Queued);
        assert_eq!(decide_plan_status(true, true, true), ActivePlanStatus::Queued);
    }

    #[test]
    fn activates_when_nothing_is_active() {
        assert_eq!(decide_plan_status(false, false, false), ActivePlanStatus::Active);
    }

    #[test]
    fn force_activate_overrides_existing_active_plan() {
        assert_eq!(decide_plan_status(true, false, true), ActivePlanStatus::Active);
    }

    #[test]
    fn queues_behind_an_existing_active_plan() {
        assert_eq!(decide_plan_status(true, false, false), ActivePlanStatus::Queued);
    }

    #[test]
    fn validity_defaults_to_thirty_days() {
        let now = Utc::now();
        let (from, to) = validity_window(now, None);
        assert_eq!(from, now);
        assert_eq!(to, now + Duration::days(30));

        let (_, to) = validity_window(now, Some(28));
        assert_eq!(to, now + Duration::days(28));
    }

    #[test]
    fn status_filter_serializes_to_wire_string() {
        let f = ActivePlanFilter {
            status: Some(ActivePlanStatus::Queued),
            ..Default::default()
        };
        let doc = active_plan_filter_document(&f).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "queued");
    }

    #[test]
    fn validity_ranges_build_range_documents() {
        let now = Utc::now();
        let f = ActivePlanFilter {
            valid_to_start: Some(now),
            ..Default::default()
        };
        let doc = active_plan_filter_document(&f).unwrap();
        assert!(doc.get_document("valid_to").unwrap().contains_key("$gte"));
    }
}
