use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mongodb::bson::oid::ObjectId;

use crate::errors::AppError;
use crate::models::user::{Claims, Identity};
use crate::state::AppState;

/// Decode the bearer token and stash a resolved [`Identity`] in request
/// extensions. Handlers downstream take `Extension<Identity>` and never see
/// raw claims.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

    let decoding_key = DecodingKey::from_secret(state.jwt_secret.as_ref());

    let token_data = decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

    let identity = resolve_identity(&token_data.claims)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Reject non-admin callers. Layered after [`auth_middleware`] on admin
/// routes.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing identity".to_string()))?;

    if !identity.is_admin() {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn resolve_identity(claims: &Claims) -> Result<Identity, AppError> {
    let id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| AppError::AuthError("Malformed subject claim".to_string()))?;

    match claims.role.as_str() {
        "admin" => Ok(Identity::Admin(id)),
        "user" => Ok(Identity::User(id)),
        other => Err(AppError::AuthError(format!("Unknown role: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            role: role.to_string(),
            phone: "9876543210".to_string(),
            exp: 2_000_000_000,
        }
    }

    #[test]
    fn roles_map_to_tagged_identities() {
        let id = ObjectId::new();
        let user = resolve_identity(&claims(&id.to_hex(), "user")).unwrap();
        assert_eq!(user, Identity::User(id));
        assert!(!user.is_admin());

        let admin = resolve_identity(&claims(&id.to_hex(), "admin")).unwrap();
        assert_eq!(admin, Identity::Admin(id));
        assert!(admin.is_admin());
    }

    #[test]
    fn bad_subject_or_role_is_rejected() {
        let id = ObjectId::new();
        assert!(resolve_identity(&claims("not-an-oid", "user")).is_err());
        assert!(resolve_identity(&claims(&id.to_hex(), "superuser")).is_err());
    }
}
