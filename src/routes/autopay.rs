use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::autopay_handlers;
use crate::state::AppState;

pub fn autopay_routes() -> Router<AppState> {
    Router::new()
        .route("/autopay", post(autopay_handlers::create_autopay))
        .route("/autopay", get(autopay_handlers::get_my_autopays))
        .route("/autopay/:autopay_id", get(autopay_handlers::get_autopay))
        .route("/autopay/:autopay_id", put(autopay_handlers::update_autopay))
        .route("/autopay/:autopay_id", delete(autopay_handlers::delete_autopay))
}

pub fn admin_autopay_routes() -> Router<AppState> {
    Router::new()
        .route("/autopay", get(autopay_handlers::admin_get_autopays))
        .route("/autopay/process-due", post(autopay_handlers::process_due))
}
