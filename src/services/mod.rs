pub(crate) mod autopay_service;
pub(crate) mod criteria;
pub(crate) mod ledger;
pub(crate) mod lifecycle;
pub(crate) mod notification_service;
pub(crate) mod recharge_service;
pub(crate) mod referral_service;
pub(crate) mod txn;
