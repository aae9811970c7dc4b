pub(crate) mod autopay_handlers;
pub(crate) mod recharge_handlers;
pub(crate) mod referral_handlers;

use mongodb::bson::oid::ObjectId;
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::query::Pagination;
use crate::models::user::Identity;

/// Standard page envelope for list endpoints.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let (page, size) = pagination.meta(total);
        Paginated {
            items,
            total,
            page,
            size,
            pages: pagination.pages(total),
        }
    }
}

/// Routes acting on "my" data need a concrete user id; an admin token has
/// no implied user to act for.
pub fn caller_user_id(identity: Identity) -> Result<ObjectId> {
    identity.user_id().ok_or(AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_envelope_carries_pagination_meta() {
        let p = Pagination::from_params(Some(2), Some(10));
        let page = Paginated::new(vec![1, 2, 3], 23, p);
        assert_eq!(page.page, 2);
        assert_eq!(page.size, 10);
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, 23);
    }

    #[test]
    fn admin_identity_has_no_acting_user() {
        let id = ObjectId::new();
        assert!(caller_user_id(Identity::Admin(id)).is_err());
        assert_eq!(caller_user_id(Identity::User(id)).unwrap(), id);
    }
}
