// services/recharge_service.rs
//
// The subscribe / wallet-topup flows. A purchase either fully commits
// (active-plan record + ledger entries + optional cashback + optional
// referral claim) or fully fails and mutates nothing; the whole sequence
// runs in one session transaction with bounded retry on transient
// conflicts.

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::{ClientSession, Collection, Database};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::offer::Offer;
use crate::models::plan::{Plan, PlanType};
use crate::models::transaction::{
    PaymentMethod, ServiceType, TransactionCategory, TransactionResponse, TransactionSource,
    TransactionStatus, TransactionType,
};
use crate::models::user::User;
use crate::services::criteria::{calculate_reward, evaluate_criteria, PurchaseContext};
use crate::services::ledger::{self, NewTransaction};
use crate::services::lifecycle::{self, decide_plan_status, validity_window};
use crate::services::notification_service::notify_best_effort;
use crate::services::referral_service;
use crate::services::txn;
use crate::state::AppState;

const USERS: &str = "users";
const PLANS: &str = "plans";
const OFFERS: &str = "offers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    Activate,
    Queue,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RechargeRequest {
    #[validate(length(min = 10, message = "phone number too short"))]
    pub phone_number: String,
    pub plan_id: String,
    pub offer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub source: TransactionSource,
    pub activation_mode: Option<ActivationMode>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WalletTopupRequest {
    pub phone_number: Option<String>,
    #[validate(range(min = 0.01, message = "amount must be positive"))]
    pub amount: f64,
    pub payment_method: PaymentMethod,
}

// ---------- Lookups ----------

pub async fn get_user_by_phone(db: &Database, phone: &str) -> Result<User> {
    let users: Collection<User> = db.collection(USERS);
    users
        .find_one(doc! { "phone_number": phone })
        .await?
        .ok_or_else(|| AppError::UserNotFound(phone.to_string()))
}

pub async fn get_user_by_id(db: &Database, user_id: ObjectId) -> Result<User> {
    let users: Collection<User> = db.collection(USERS);
    users
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::UserNotFound(user_id.to_hex()))
}

/// Active-only plan lookup.
pub async fn get_plan_by_id(db: &Database, plan_id: ObjectId) -> Result<Plan> {
    let plans: Collection<Plan> = db.collection(PLANS);
    plans
        .find_one(doc! { "_id": plan_id, "status": "active" })
        .await?
        .ok_or(AppError::PlanNotFound)
}

/// Active-only offer lookup.
pub async fn get_offer_by_id(db: &Database, offer_id: ObjectId) -> Result<Offer> {
    let offers: Collection<Offer> = db.collection(OFFERS);
    offers
        .find_one(doc! { "_id": offer_id, "status": "active" })
        .await?
        .ok_or(AppError::OfferNotFound)
}

// ---------- Pure purchase math ----------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurchaseQuote {
    pub plan_amount: f64,
    pub discount: f64,
    pub cashback: f64,
    /// Amount actually debited: plan price minus discount, never negative.
    pub payable: f64,
}

/// Validate eligibility and price the purchase. Rejects before any state
/// mutation when criteria fail.
pub fn quote_purchase(
    plan: &Plan,
    offer: Option<&Offer>,
    target_user: &User,
    source: TransactionSource,
    now: DateTime<Utc>,
) -> Result<PurchaseQuote> {
    if plan.price < 0 {
        return Err(AppError::invalid_data("Plan price not defined"));
    }
    let plan_amount = plan.price as f64;

    let context = PurchaseContext {
        amount: plan_amount,
        user_type: target_user.user_type.map(|t| t.as_str().to_string()),
        is_new_user: false,
        source: source.as_str().to_string(),
        plan_group_name: plan.group_name.clone(),
    };

    if !evaluate_criteria(plan.criteria.as_ref(), &context, now) {
        return Err(AppError::criteria("User does not meet plan criteria"));
    }
    if let Some(offer) = offer {
        if !evaluate_criteria(offer.criteria.as_ref(), &context, now) {
            return Err(AppError::criteria("Offer criteria not satisfied"));
        }
    }

    let (discount, cashback) = match offer.and_then(|o| o.criteria.as_ref()) {
        Some(criteria) => calculate_reward(criteria, plan_amount),
        None => (0.0, 0.0),
    };

    Ok(PurchaseQuote {
        plan_amount,
        discount,
        cashback,
        payable: plan_amount - discount,
    })
}

/// Pre-flight balance check. The authoritative guard is the filtered
/// `$inc` in `ledger::debit_wallet`; this exists to fail fast with a clear
/// reason before any writes happen.
pub fn ensure_wallet_funds(balance: f64, amount: f64) -> Result<()> {
    if balance < amount {
        return Err(AppError::InsufficientFunds);
    }
    Ok(())
}

// ---------- Subscribe ----------

pub async fn subscribe_plan(
    state: &AppState,
    payer_id: ObjectId,
    request: &RechargeRequest,
) -> Result<TransactionResponse> {
    let db = &state.db;

    let payer = get_user_by_id(db, payer_id).await?;
    let target_user = get_user_by_phone(db, &request.phone_number).await?;

    let plan = get_plan_by_id(db, ObjectId::parse_str(&request.plan_id)?).await?;
    let offer = match &request.offer_id {
        Some(offer_id) => Some(get_offer_by_id(db, ObjectId::parse_str(offer_id)?).await?),
        None => None,
    };

    let quote = quote_purchase(&plan, offer.as_ref(), &target_user, request.source, Utc::now())?;

    if request.payment_method == PaymentMethod::Wallet {
        ensure_wallet_funds(payer.wallet_balance, quote.payable)?;
    }

    let plan_id = plan.id.ok_or(AppError::PlanNotFound)?;
    let target_id = target_user.id.ok_or_else(|| {
        AppError::UserNotFound(request.phone_number.clone())
    })?;

    let force_queue = request.activation_mode == Some(ActivationMode::Queue);
    let force_activate = request.activation_mode == Some(ActivationMode::Activate);

    let mut attempts = 0;
    let (txn_record, valid_to) = loop {
        attempts += 1;
        let mut session = state.client.start_session().await?;
        session.start_transaction().await?;

        match subscribe_in_session(
            db,
            &mut session,
            &payer,
            payer_id,
            &target_user,
            target_id,
            &plan,
            plan_id,
            offer.as_ref(),
            &quote,
            request,
            force_queue,
            force_activate,
            state.referral_reward_amount,
        )
        .await
        {
            Ok(outcome) => {
                txn::commit_with_retry(&mut session).await?;
                break outcome;
            }
            Err(e) => {
                txn::abort_quietly(&mut session).await;
                if txn::is_transient(&e) && attempts < txn::MAX_TXN_RETRIES {
                    continue;
                }
                if attempts >= txn::MAX_TXN_RETRIES && txn::is_transient(&e) {
                    return Err(AppError::TransactionConflict);
                }
                return Err(e);
            }
        }
    };

    info!(
        "✅ Recharge of {} completed for {} (txn {})",
        quote.payable, request.phone_number, txn_record.id
    );

    // Notifications are outside the transaction; a failure here never rolls
    // back the committed purchase.
    let description = format!(
        "Recharge for Rs.{} is done for mobile number {} on {}. Plan details - plan name: {}, plan type: {:?}, validity: {} price: {}",
        quote.plan_amount,
        request.phone_number,
        Utc::now(),
        plan.plan_name,
        plan.plan_type,
        plan.validity.unwrap_or(lifecycle::DEFAULT_VALIDITY_DAYS),
        plan.price,
    );
    notify_best_effort(db, &description, target_id, None).await;

    let reminder = format!("Bill is on due for mobile number {}", request.phone_number);
    notify_best_effort(db, &reminder, target_id, Some(valid_to - Duration::days(1))).await;

    Ok(txn_record)
}

#[allow(clippy::too_many_arguments)]
async fn subscribe_in_session(
    db: &Database,
    session: &mut ClientSession,
    payer: &User,
    payer_id: ObjectId,
    target_user: &User,
    target_id: ObjectId,
    plan: &Plan,
    plan_id: ObjectId,
    offer: Option<&Offer>,
    quote: &PurchaseQuote,
    request: &RechargeRequest,
    force_queue: bool,
    force_activate: bool,
    referral_reward_amount: f64,
) -> Result<(TransactionResponse, DateTime<Utc>)> {
    let now = Utc::now();

    // Activate any queued plan first, then decide where the new one lands.
    lifecycle::expire_and_promote(db, session, target_id, &request.phone_number, now).await?;
    let has_active =
        lifecycle::has_active_plan(db, session, target_id, &request.phone_number).await?;
    let plan_status = decide_plan_status(has_active, force_queue, force_activate);

    if request.payment_method == PaymentMethod::Wallet {
        ledger::debit_wallet(db, session, payer_id, quote.payable).await?;
    }

    let (valid_from, valid_to) = validity_window(now, plan.validity);
    lifecycle::insert_active_plan(
        db,
        session,
        target_id,
        plan_id,
        &request.phone_number,
        valid_from,
        valid_to,
        plan_status,
    )
    .await?;

    let service_type = match plan.plan_type {
        PlanType::Prepaid => ServiceType::Prepaid,
        PlanType::Postpaid => ServiceType::Postpaid,
    };

    let txn_record = ledger::append_transaction(
        db,
        session,
        NewTransaction {
            user_id: Some(payer_id),
            category: TransactionCategory::Service,
            txn_type: TransactionType::Debit,
            amount: quote.payable,
            service_type: Some(service_type),
            plan_id: Some(plan_id),
            offer_id: offer.and_then(|o| o.id),
            from_phone_number: Some(payer.phone_number.clone()),
            to_phone_number: Some(request.phone_number.clone()),
            source: request.source,
            status: TransactionStatus::Success,
            payment_method: Some(request.payment_method),
            payment_reference_prefix: Some("PYMT"),
        },
    )
    .await?;

    if quote.cashback > 0.0 {
        ledger::credit_wallet(db, session, target_id, quote.cashback).await?;
        ledger::append_transaction(
            db,
            session,
            NewTransaction {
                user_id: Some(target_id),
                category: TransactionCategory::Wallet,
                txn_type: TransactionType::Credit,
                amount: quote.cashback,
                service_type: None,
                plan_id: Some(plan_id),
                offer_id: offer.and_then(|o| o.id),
                from_phone_number: None,
                to_phone_number: Some(target_user.phone_number.clone()),
                source: TransactionSource::OfferCashback,
                status: TransactionStatus::Success,
                payment_method: None,
                payment_reference_prefix: Some("CSHB"),
            },
        )
        .await?;
    }

    // First qualifying purchase by a referred user settles the pending
    // referral reward in the same transaction.
    if let Some(referee_code) = &payer.referee_code {
        let users: Collection<User> = db.collection(USERS);
        let referrer = users
            .find_one(doc! { "referral_code": referee_code })
            .session(&mut *session)
            .await?;
        if let Some(referrer) = referrer {
            referral_service::claim_if_eligible(
                db,
                session,
                &referrer,
                payer,
                referral_reward_amount,
            )
            .await?;
        }
    }

    Ok((txn_record.into(), valid_to))
}

// ---------- Wallet top-up ----------

pub async fn wallet_topup(
    state: &AppState,
    payer_id: ObjectId,
    request: &WalletTopupRequest,
) -> Result<TransactionResponse> {
    let db = &state.db;

    let payer = get_user_by_id(db, payer_id).await?;
    let target_phone = request
        .phone_number
        .clone()
        .unwrap_or_else(|| payer.phone_number.clone());
    let target_user = get_user_by_phone(db, &target_phone).await?;
    let target_id = target_user
        .id
        .ok_or_else(|| AppError::UserNotFound(target_phone.clone()))?;

    if request.payment_method == PaymentMethod::Wallet {
        ensure_wallet_funds(payer.wallet_balance, request.amount)?;
    }

    let mut attempts = 0;
    let txn_record = loop {
        attempts += 1;
        let mut session = state.client.start_session().await?;
        session.start_transaction().await?;

        let outcome = async {
            if request.payment_method == PaymentMethod::Wallet {
                ledger::debit_wallet(db, &mut session, payer_id, request.amount).await?;
            }
            ledger::credit_wallet(db, &mut session, target_id, request.amount).await?;

            ledger::append_transaction(
                db,
                &mut session,
                NewTransaction {
                    user_id: Some(payer_id),
                    category: TransactionCategory::Wallet,
                    txn_type: TransactionType::Credit,
                    amount: request.amount,
                    service_type: None,
                    plan_id: None,
                    offer_id: None,
                    from_phone_number: Some(payer.phone_number.clone()),
                    to_phone_number: Some(target_phone.clone()),
                    source: TransactionSource::WalletTopup,
                    status: TransactionStatus::Success,
                    payment_method: Some(request.payment_method),
                    payment_reference_prefix: Some("TOPUP"),
                },
            )
            .await
        }
        .await;

        match outcome {
            Ok(record) => {
                txn::commit_with_retry(&mut session).await?;
                break record;
            }
            Err(e) => {
                txn::abort_quietly(&mut session).await;
                if txn::is_transient(&e) && attempts < txn::MAX_TXN_RETRIES {
                    continue;
                }
                return Err(e);
            }
        }
    };

    info!("✅ Wallet top-up of {} for {}", request.amount, target_phone);

    let description = format!(
        "Recharge for Rs.{} is done for mobile number {} on {}.",
        request.amount,
        target_phone,
        Utc::now()
    );
    notify_best_effort(db, &description, target_id, None).await;

    Ok(txn_record.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::criteria::{Criteria, CriteriaConditions, RewardRule, RewardType};
    use crate::models::offer::OfferStatus;
    use crate::models::plan::PlanStatus;
    use crate::models::user::{UserStatus, UserType};

    fn plan(price: i64, criteria: Option<Criteria>) -> Plan {
        Plan {
            id: Some(ObjectId::new()),
            plan_name: "Unlimited 84".to_string(),
            validity: Some(84),
            most_popular: false,
            plan_type: PlanType::Prepaid,
            group_name: Some("unlimited".to_string()),
            description: None,
            criteria,
            price,
            status: PlanStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn offer(criteria: Criteria) -> Offer {
        Offer {
            id: Some(ObjectId::new()),
            offer_name: "Festive 50".to_string(),
            offer_validity: Some(7),
            is_special: false,
            criteria: Some(criteria),
            description: None,
            status: OfferStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn user() -> User {
        User {
            id: Some(ObjectId::new()),
            name: Some("Asha".to_string()),
            email: None,
            phone_number: "9876543210".to_string(),
            referral_code: None,
            referee_code: None,
            user_type: Some(UserType::Prepaid),
            status: UserStatus::Active,
            wallet_balance: 500.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn plain_purchase_pays_full_price() {
        let quote = quote_purchase(
            &plan(300, None),
            None,
            &user(),
            TransactionSource::Recharge,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(quote.payable, 300.0);
        assert_eq!(quote.discount, 0.0);
        assert_eq!(quote.cashback, 0.0);
    }

    #[test]
    fn flat_discount_reduces_payable() {
        let o = offer(Criteria {
            conditions: None,
            rewards: Some(RewardRule {
                discount_type: Some(RewardType::Flat),
                discount_value: Some(50.0),
                ..Default::default()
            }),
        });
        let quote = quote_purchase(
            &plan(300, None),
            Some(&o),
            &user(),
            TransactionSource::Recharge,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(quote.payable, 250.0);
    }

    #[test]
    fn oversized_discount_never_goes_negative() {
        let o = offer(Criteria {
            conditions: None,
            rewards: Some(RewardRule {
                discount_type: Some(RewardType::Flat),
                discount_value: Some(400.0),
                ..Default::default()
            }),
        });
        let quote = quote_purchase(
            &plan(300, None),
            Some(&o),
            &user(),
            TransactionSource::Recharge,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(quote.discount, 300.0);
        assert_eq!(quote.payable, 0.0);
    }

    #[test]
    fn failing_plan_criteria_rejects_before_any_mutation() {
        let p = plan(
            300,
            Some(Criteria {
                conditions: Some(CriteriaConditions {
                    user_type: Some(vec!["postpaid".to_string()]),
                    ..Default::default()
                }),
                rewards: None,
            }),
        );
        let err = quote_purchase(&p, None, &user(), TransactionSource::Recharge, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::CriteriaNotMet(_)));
    }

    #[test]
    fn failing_offer_criteria_is_a_distinct_rejection() {
        let o = offer(Criteria {
            conditions: Some(CriteriaConditions {
                min_amount: Some(500.0),
                ..Default::default()
            }),
            rewards: None,
        });
        let err = quote_purchase(
            &plan(300, None),
            Some(&o),
            &user(),
            TransactionSource::Recharge,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::CriteriaNotMet(_)));
    }

    #[test]
    fn insufficient_funds_precheck() {
        assert!(ensure_wallet_funds(100.0, 300.0).is_err());
        assert!(ensure_wallet_funds(300.0, 300.0).is_ok());
        assert!(ensure_wallet_funds(500.0, 300.0).is_ok());
    }
}
