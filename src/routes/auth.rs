use axum::Json;
use serde_json::{Value, json};

use crate::{auth::AuthUser, models::UserProfile};

pub async fn me(caller: AuthUser) -> Json<Value> {
    Json(json!({ "user": UserProfile::from(caller.user) }))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;

    use crate::{
        auth::issue_token,
        models::Role,
        testutil::{SECRET, TestApp},
    };

    #[tokio::test]
    async fn me_resolves_the_caller() {
        let app = TestApp::new().await;
        let user = app.user("a@example.com", "ADMIN").await;

        let (status, v) = app.call(Method::GET, "/auth/me", Some(&user.token), None).await;
        assert_eq!(status, 200);
        assert_eq!(v["user"]["email"], "a@example.com");
        assert_eq!(v["user"]["role"], "ADMIN");
        assert_eq!(v["user"]["id"], user.model.id);
    }

    #[tokio::test]
    async fn rejects_deleted_users_and_expired_tokens() {
        let app = TestApp::new().await;

        let ghost = issue_token(SECRET, 777, Role::User, 1).unwrap();
        let (status, _) = app.call(Method::GET, "/auth/me", Some(&ghost), None).await;
        assert_eq!(status, 401);

        let user = app.user("a@example.com", "USER").await;
        let expired = issue_token(SECRET, user.model.id, Role::User, -1).unwrap();
        let (status, v) = app.call(Method::GET, "/auth/me", Some(&expired), None).await;
        assert_eq!(status, 401);
        assert_eq!(v["error"], "Token expired");
    }
}
