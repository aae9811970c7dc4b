// services/criteria.rs
//
// Pure eligibility and reward evaluation. No I/O here; everything the
// decision needs arrives in the purchase context.

use chrono::{DateTime, Utc};

use crate::models::criteria::{Criteria, RewardType};

/// Everything about the purchase the eligibility rules can look at.
#[derive(Debug, Clone)]
pub struct PurchaseContext {
    pub amount: f64,
    pub user_type: Option<String>,
    pub is_new_user: bool,
    pub source: String,
    pub plan_group_name: Option<String>,
}

/// All present conditions must hold. Absent criteria (or an absent
/// `conditions` block) means always eligible.
pub fn evaluate_criteria(
    criteria: Option<&Criteria>,
    context: &PurchaseContext,
    now: DateTime<Utc>,
) -> bool {
    let cond = match criteria.and_then(|c| c.conditions.as_ref()) {
        Some(cond) => cond,
        None => return true,
    };

    if let Some(valid_from) = cond.valid_from {
        if valid_from > now {
            return false;
        }
    }
    if let Some(valid_to) = cond.valid_to {
        if valid_to < now {
            return false;
        }
    }

    if let Some(min_amount) = cond.min_amount {
        if context.amount < min_amount {
            return false;
        }
    }

    if let Some(user_types) = &cond.user_type {
        match &context.user_type {
            Some(ut) if user_types.contains(ut) => {}
            _ => return false,
        }
    }

    if cond.is_new_user.unwrap_or(false) && !context.is_new_user {
        return false;
    }

    if let Some(sources) = &cond.applicable_sources {
        if !sources.contains(&context.source) {
            return false;
        }
    }

    if let Some(groups) = &cond.valid_plan_groups {
        match &context.plan_group_name {
            Some(group) if groups.contains(group) => {}
            _ => return false,
        }
    }

    true
}

/// Derive `(discount, cashback)` from an offer's reward rule. Only flat
/// rules are evaluated; percentage rules are stored but never computed.
/// Discount is capped at the plan amount so the payable amount can never go
/// negative. Cashback is paid from wallet credit and has no cap.
pub fn calculate_reward(criteria: &Criteria, plan_amount: f64) -> (f64, f64) {
    let mut discount = 0.0;
    let mut cashback = 0.0;

    if let Some(rewards) = &criteria.rewards {
        if rewards.discount_type == Some(RewardType::Flat) {
            discount = rewards.discount_value.unwrap_or(0.0);
        }
        if rewards.cashback_type == Some(RewardType::Flat) {
            cashback = rewards.cashback_value.unwrap_or(0.0);
        }
    }

    (discount.min(plan_amount), cashback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::criteria::{CriteriaConditions, RewardRule};
    use chrono::Duration;

    fn context() -> PurchaseContext {
        PurchaseContext {
            amount: 300.0,
            user_type: Some("prepaid".to_string()),
            is_new_user: false,
            source: "recharge".to_string(),
            plan_group_name: Some("unlimited".to_string()),
        }
    }

    fn with_conditions(cond: CriteriaConditions) -> Criteria {
        Criteria {
            conditions: Some(cond),
            rewards: None,
        }
    }

    #[test]
    fn absent_criteria_is_always_eligible() {
        let now = Utc::now();
        assert!(evaluate_criteria(None, &context(), now));
        let empty = Criteria::default();
        assert!(evaluate_criteria(Some(&empty), &context(), now));
    }

    #[test]
    fn validity_window_bounds_eligibility() {
        let now = Utc::now();
        let open = with_conditions(CriteriaConditions {
            valid_from: Some(now - Duration::days(1)),
            valid_to: Some(now + Duration::days(1)),
            ..Default::default()
        });
        assert!(evaluate_criteria(Some(&open), &context(), now));

        let not_started = with_conditions(CriteriaConditions {
            valid_from: Some(now + Duration::hours(1)),
            ..Default::default()
        });
        assert!(!evaluate_criteria(Some(&not_started), &context(), now));

        let ended = with_conditions(CriteriaConditions {
            valid_to: Some(now - Duration::hours(1)),
            ..Default::default()
        });
        assert!(!evaluate_criteria(Some(&ended), &context(), now));
    }

    #[test]
    fn min_amount_rejects_cheaper_purchases() {
        let now = Utc::now();
        let criteria = with_conditions(CriteriaConditions {
            min_amount: Some(500.0),
            ..Default::default()
        });
        assert!(!evaluate_criteria(Some(&criteria), &context(), now));

        let mut ctx = context();
        ctx.amount = 500.0;
        assert!(evaluate_criteria(Some(&criteria), &ctx, now));
    }

    #[test]
    fn user_type_must_be_in_allowed_set() {
        let now = Utc::now();
        let criteria = with_conditions(CriteriaConditions {
            user_type: Some(vec!["postpaid".to_string()]),
            ..Default::default()
        });
        assert!(!evaluate_criteria(Some(&criteria), &context(), now));

        let mut ctx = context();
        ctx.user_type = Some("postpaid".to_string());
        assert!(evaluate_criteria(Some(&criteria), &ctx, now));

        // users with no type fail a user_type condition
        ctx.user_type = None;
        assert!(!evaluate_criteria(Some(&criteria), &ctx, now));
    }

    #[test]
    fn new_user_flag_rejects_existing_users() {
        let now = Utc::now();
        let criteria = with_conditions(CriteriaConditions {
            is_new_user: Some(true),
            ..Default::default()
        });
        assert!(!evaluate_criteria(Some(&criteria), &context(), now));

        let mut ctx = context();
        ctx.is_new_user = true;
        assert!(evaluate_criteria(Some(&criteria), &ctx, now));
    }

    #[test]
    fn source_and_plan_group_sets_are_enforced() {
        let now = Utc::now();
        let criteria = with_conditions(CriteriaConditions {
            applicable_sources: Some(vec!["autopay".to_string()]),
            valid_plan_groups: Some(vec!["unlimited".to_string()]),
            ..Default::default()
        });
        assert!(!evaluate_criteria(Some(&criteria), &context(), now));

        let mut ctx = context();
        ctx.source = "autopay".to_string();
        assert!(evaluate_criteria(Some(&criteria), &ctx, now));

        // a plan with no group fails a plan-group condition
        ctx.plan_group_name = None;
        assert!(!evaluate_criteria(Some(&criteria), &ctx, now));
    }

    #[test]
    fn flat_rewards_are_computed() {
        let criteria = Criteria {
            conditions: None,
            rewards: Some(RewardRule {
                discount_type: Some(RewardType::Flat),
                discount_value: Some(50.0),
                cashback_type: Some(RewardType::Flat),
                cashback_value: Some(20.0),
            }),
        };
        assert_eq!(calculate_reward(&criteria, 300.0), (50.0, 20.0));
    }

    #[test]
    fn discount_is_capped_at_plan_amount() {
        let criteria = Criteria {
            conditions: None,
            rewards: Some(RewardRule {
                discount_type: Some(RewardType::Flat),
                discount_value: Some(400.0),
                ..Default::default()
            }),
        };
        let (discount, cashback) = calculate_reward(&criteria, 300.0);
        assert_eq!(discount, 300.0);
        assert_eq!(cashback, 0.0);
    }

    #[test]
    fn percentage_rules_are_not_evaluated() {
        let criteria = Criteria {
            conditions: None,
            rewards: Some(RewardRule {
                discount_type: Some(RewardType::Percentage),
                discount_value: Some(10.0),
                cashback_type: Some(RewardType::Percentage),
                cashback_value: Some(5.0),
            }),
        };
        assert_eq!(calculate_reward(&criteria, 300.0), (0.0, 0.0));
    }

    #[test]
    fn cashback_is_not_capped_by_plan_price() {
        let criteria = Criteria {
            conditions: None,
            rewards: Some(RewardRule {
                cashback_type: Some(RewardType::Flat),
                cashback_value: Some(1000.0),
                ..Default::default()
            }),
        };
        assert_eq!(calculate_reward(&criteria, 300.0), (0.0, 1000.0));
    }
}
