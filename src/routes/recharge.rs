use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::recharge_handlers;
use crate::state::AppState;

pub fn recharge_routes() -> Router<AppState> {
    Router::new()
        .route("/recharge/subscribe", post(recharge_handlers::recharge))
        .route("/recharge/wallet-topup", post(recharge_handlers::wallet_topup))
        .route("/recharge/transactions", get(recharge_handlers::get_my_transactions))
        .route("/recharge/active-plans", get(recharge_handlers::get_my_active_plans))
}

pub fn admin_recharge_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(recharge_handlers::admin_get_transactions))
        .route("/active-plans", get(recharge_handlers::admin_get_active_plans))
}
