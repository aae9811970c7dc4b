// services/referral_service.rs
//
// One-shot referral rewards. The pending row is created at signup by the
// onboarding flow; this service converts it to `earned` at most once and
// credits the referrer's wallet with a paired ledger entry, all inside the
// caller's purchase transaction.

use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::{ClientSession, Collection, Database};
use tracing::info;

use crate::errors::Result;
use crate::models::query::{Pagination, SortOrder};
use crate::models::referral::{ReferralReward, ReferralRewardStatus};
use crate::models::transaction::{
    TransactionCategory, TransactionSource, TransactionStatus, TransactionType,
};
use crate::models::user::{User, UserStatus};
use crate::services::ledger::{self, NewTransaction};

const REFERRAL_REWARDS: &str = "referral_rewards";

/// Ordered hard preconditions: both accounts active, and the referred user
/// actually signed up with this referrer's code.
pub fn referral_preconditions(referrer: &User, referred: &User) -> bool {
    if referrer.status != UserStatus::Active || referred.status != UserStatus::Active {
        return false;
    }
    match (&referrer.referral_code, &referred.referee_code) {
        (Some(referral_code), Some(referee_code)) => referral_code == referee_code,
        _ => false,
    }
}

/// Claim the pending reward for (referrer, referred) if eligible. Returns
/// `None` without mutating anything when any precondition fails, when no
/// pending row exists, or when the reward was already earned — a repeat call
/// after success is a no-op, never a double credit.
pub async fn claim_if_eligible(
    db: &Database,
    session: &mut ClientSession,
    referrer: &User,
    referred: &User,
    default_reward_amount: f64,
) -> Result<Option<ReferralReward>> {
    if !referral_preconditions(referrer, referred) {
        return Ok(None);
    }

    let (referrer_id, referred_id) = match (referrer.id, referred.id) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(None),
    };

    let collection: Collection<ReferralReward> = db.collection(REFERRAL_REWARDS);
    let existing = collection
        .find_one(doc! { "referrer_id": referrer_id, "referred_id": referred_id })
        .sort(doc! { "created_at": -1 })
        .session(&mut *session)
        .await?;

    let reward = match existing {
        Some(reward) if reward.status == ReferralRewardStatus::Pending => reward,
        _ => return Ok(None),
    };

    let claimed_at = Utc::now();
    // status guard in the filter keeps a concurrent claim from double firing
    let result = collection
        .update_one(
            doc! { "_id": reward.id, "status": "pending" },
            doc! { "$set": {
                "status": "earned",
                "claimed_at": mongodb::bson::DateTime::from_chrono(claimed_at),
            }},
        )
        .session(&mut *session)
        .await?;

    if result.modified_count == 0 {
        return Ok(None);
    }

    let amount = if reward.reward_amount > 0.0 {
        reward.reward_amount
    } else {
        default_reward_amount
    };

    ledger::credit_wallet(db, session, referrer_id, amount).await?;
    ledger::append_transaction(
        db,
        session,
        NewTransaction {
            user_id: Some(referrer_id),
            category: TransactionCategory::Wallet,
            txn_type: TransactionType::Credit,
            amount,
            service_type: None,
            plan_id: None,
            offer_id: None,
            from_phone_number: None,
            to_phone_number: Some(referrer.phone_number.clone()),
            source: TransactionSource::ReferralReward,
            status: TransactionStatus::Success,
            payment_method: None,
            payment_reference_prefix: Some("RFRL"),
        },
    )
    .await?;

    info!(
        "Referral reward of {} earned by {} for referring {}",
        amount,
        referrer_id.to_hex(),
        referred_id.to_hex()
    );

    Ok(Some(ReferralReward {
        status: ReferralRewardStatus::Earned,
        claimed_at: Some(claimed_at),
        reward_amount: amount,
        ..reward
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralSortBy {
    #[default]
    CreatedAt,
    RewardAmount,
}

impl ReferralSortBy {
    fn field(&self) -> &'static str {
        match self {
            ReferralSortBy::CreatedAt => "created_at",
            ReferralSortBy::RewardAmount => "reward_amount",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferralFilter {
    /// Matches rewards where the user is either side of the referral.
    pub party: Option<ObjectId>,
    pub status: Option<ReferralRewardStatus>,
    pub sort_by: ReferralSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

pub fn referral_filter_document(f: &ReferralFilter) -> Result<Document> {
    let mut filter = Document::new();

    if let Some(party) = f.party {
        filter.insert(
            "$or",
            vec![
                doc! { "referrer_id": party },
                doc! { "referred_id": party },
            ],
        );
    }
    if let Some(status) = &f.status {
        filter.insert("status", to_bson(status)?);
    }

    Ok(filter)
}

pub async fn list_referral_rewards(
    db: &Database,
    f: &ReferralFilter,
) -> Result<(Vec<ReferralReward>, u64)> {
    let collection: Collection<ReferralReward> = db.collection(REFERRAL_REWARDS);
    let filter = referral_filter_document(f)?;

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
    let rewards: Vec<ReferralReward> = cursor.try_collect().await?;

    Ok((rewards, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserType;

    fn user(status: UserStatus, referral_code: Option<&str>, referee_code: Option<&str>) -> User {
        User {
            id: Some(ObjectId::new()),
            name: None,
            email: None,
            phone_number: "9876543210".to_string(),
            referral_code: referral_code.map(String::from),
            referee_code: referee_code.map(String::from),
            user_type: Some(UserType::Prepaid),
            status,
            wallet_balance: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matching_codes_between_active_users_pass() {
        let referrer = user(UserStatus::Active, Some("REF123"), None);
        let referred = user(UserStatus::Active, Some("OTHER"), Some("REF123"));
        assert!(referral_preconditions(&referrer, &referred));
    }

    #[test]
    fn inactive_accounts_are_rejected() {
        let referrer = user(UserStatus::Blocked, Some("REF123"), None);
        let referred = user(UserStatus::Active, None, Some("REF123"));
        assert!(!referral_preconditions(&referrer, &referred));

        let referrer = user(UserStatus::Active, Some("REF123"), None);
        let referred = user(UserStatus::Deactive, None, Some("REF123"));
        assert!(!referral_preconditions(&referrer, &referred));
    }

    #[test]
    fn mismatched_or_missing_codes_are_rejected() {
        let referrer = user(UserStatus::Active, Some("REF123"), None);
        let referred = user(UserStatus::Active, None, Some("REF999"));
        assert!(!referral_preconditions(&referrer, &referred));

        let referred = user(UserStatus::Active, None, None);
        assert!(!referral_preconditions(&referrer, &referred));

        let referrer = user(UserStatus::Active, None, None);
        let referred = user(UserStatus::Active, None, Some("REF123"));
        assert!(!referral_preconditions(&referrer, &referred));
    }

    #[test]
    fn party_filter_matches_either_side() {
        let party = ObjectId::new();
        let f = ReferralFilter {
            party: Some(party),
            status: Some(ReferralRewardStatus::Earned),
            ..Default::default()
        };
        let doc = referral_filter_document(&f).unwrap();
        assert_eq!(doc.get_array("$or").unwrap().len(), 2);
        assert_eq!(doc.get_str("status").unwrap(), "earned");
    }
}
