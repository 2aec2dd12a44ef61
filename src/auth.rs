//! Stateless bearer credentials.
//!
//! A token is `base64url(claims) "." base64url(hmac_sha256(secret, part1))`. Issuing tokens
//! to end users is the identity provider's job; this service only verifies them and resolves
//! the caller against the user store.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    AppState,
    config::Config,
    db::now_sec,
    entities::user,
    error::{AppError, AppResult},
    models::Role,
};

type HmacSha256 = Hmac<Sha256>;

const MAX_TOKEN_LEN: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub role: Role,
    pub exp: i64,
}

pub fn issue_token(secret: &str, user_id: i32, role: Role, ttl_hours: i64) -> AppResult<String> {
    let claims = Claims { sub: user_id, role, exp: now_sec() + ttl_hours * 3_600 };
    let payload = serde_json::to_vec(&claims).map_err(anyhow::Error::new)?;
    let payload_part = URL_SAFE_NO_PAD.encode(payload);
    let sig_part = URL_SAFE_NO_PAD.encode(sign(secret, &payload_part)?);
    Ok(format!("{payload_part}.{sig_part}"))
}

pub fn verify_token(secret: &str, token: &str) -> AppResult<Claims> {
    let invalid = || AppError::unauthorized("Invalid token");

    if token.len() > MAX_TOKEN_LEN {
        return Err(invalid());
    }
    let (payload_part, sig_part) = token.split_once('.').ok_or_else(invalid)?;

    let sig = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| invalid())?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("hmac key: {e}"))?;
    mac.update(payload_part.as_bytes());
    mac.verify_slice(&sig).map_err(|_| invalid())?;

    let payload = URL_SAFE_NO_PAD.decode(payload_part).map_err(|_| invalid())?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;

    if claims.exp <= now_sec() {
        return Err(AppError::unauthorized("Token expired"));
    }
    Ok(claims)
}

/// Mints a token for an existing user, carrying the role stored for them.
pub async fn token_for_user(
    db: &DatabaseConnection,
    config: &Config,
    user_id: i32,
) -> AppResult<String> {
    let user = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    issue_token(&config.token_secret, user.id, Role::from_db(&user.role), config.token_ttl_hours)
}

fn sign(secret: &str, payload_part: &str) -> AppResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("hmac key: {e}"))?;
    mac.update(payload_part.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Unauthorized"))
}

/// A caller whose token verified and who still exists in the user store.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: user::Model,
    pub role: Role,
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = verify_token(&state.config.token_secret, token)?;

        // the stored role wins over whatever the token was minted with
        let user = user::Entity::find_by_id(claims.sub)
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::unauthorized("Unauthorized - Please login"))?;
        let role = Role::from_db(&user.role);

        tracing::debug!(user_id = user.id, role = role.as_str(), "authenticated caller");
        Ok(AuthUser { user, role })
    }
}

#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        if caller.role != Role::Admin {
            return Err(AppError::forbidden("Forbidden - Admin access required"));
        }
        Ok(AdminUser(caller))
    }
}

/// Like [`AuthUser`], but a missing or rejected credential yields `None` instead of a 401.
#[derive(Clone, Debug)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(caller) => Ok(MaybeAuthUser(Some(caller))),
            Err(AppError::Unauthorized(_)) => Ok(MaybeAuthUser(None)),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_verify() {
        let token = issue_token(SECRET, 7, Role::Admin, 1).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = issue_token("other-secret", 7, Role::User, 1).unwrap();
        let err = verify_token(SECRET, &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn rejects_tampered_claims() {
        let token = issue_token(SECRET, 7, Role::User, 1).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged = Claims { sub: 7, role: Role::Admin, exp: now_sec() + 3_600 };
        let forged_part = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let err = verify_token(SECRET, &format!("{forged_part}.{sig}")).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn rejects_expired_tokens() {
        let token = issue_token(SECRET, 7, Role::User, -1).unwrap();
        let err = verify_token(SECRET, &token).unwrap_err();
        assert_eq!(err.to_string(), "Token expired");
    }

    #[tokio::test]
    async fn tokens_for_stored_users_carry_their_role() {
        let db = crate::testutil::test_db().await;
        let config = crate::testutil::test_config();
        let admin = crate::testutil::seed_user(&db, "root@example.com", "ADMIN").await;

        let token = token_for_user(&db, &config, admin.id).await.unwrap();
        let claims = verify_token(&config.token_secret, &token).unwrap();
        assert_eq!(claims.sub, admin.id);
        assert_eq!(claims.role, Role::Admin);

        let err = token_for_user(&db, &config, 404).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn rejects_garbage() {
        for token in ["", "abc", "a.b.c", "!!!.???"] {
            assert!(verify_token(SECRET, token).is_err(), "{token}");
        }
    }
}
