use axum::{routing::get, Router};

use crate::handlers::referral_handlers;
use crate::state::AppState;

pub fn referral_routes() -> Router<AppState> {
    Router::new().route("/referrals/history", get(referral_handlers::get_my_referrals))
}

pub fn admin_referral_routes() -> Router<AppState> {
    Router::new().route("/referrals", get(referral_handlers::admin_get_referrals))
}
