pub(crate) mod autopay;
pub(crate) mod recharge;
pub(crate) mod referral;

use axum::{middleware, Router};

use crate::middleware::auth;
use crate::state::AppState;

/// Everything under /api. User routes authenticate; /api/admin additionally
/// requires the admin role.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let user_routes = Router::new()
        .merge(recharge::recharge_routes())
        .merge(autopay::autopay_routes())
        .merge(referral::referral_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let admin_routes = Router::new()
        .merge(recharge::admin_recharge_routes())
        .merge(autopay::admin_autopay_routes())
        .merge(referral::admin_referral_routes())
        .layer(middleware::from_fn(auth::require_admin))
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware));

    user_routes.nest("/admin", admin_routes)
}
