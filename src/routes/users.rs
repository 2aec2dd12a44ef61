use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::AppResult,
    models::{ProfileUpdate, UserPatch},
    users,
};

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = body?;
    let user = users::update_profile(&state.db, caller.id(), req.name).await?;
    Ok(Json(json!({ "message": "Name updated successfully", "user": user })))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "users": users::list_users(&state.db).await? })))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    Ok(Json(json!({ "user": users::get_user(&state.db, id).await? })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let Json(patch) = body?;
    let user = users::update_user(&state.db, id, patch).await?;
    tracing::info!(admin_id = admin.id(), user_id = id, "admin edited user");
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    users::delete_user(&state.db, admin.id(), id).await?;
    tracing::info!(admin_id = admin.id(), user_id = id, "admin deleted user");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

pub async fn promote(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let user = users::promote(&state.db, id).await?;
    Ok(Json(json!({ "message": "User promoted to admin successfully", "user": user })))
}

pub async fn demote(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let user = users::demote(&state.db, admin.id(), id).await?;
    Ok(Json(json!({ "message": "User demoted to regular user successfully", "user": user })))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use crate::testutil::{self, TestApp};

    #[tokio::test]
    async fn profile_rename() {
        let app = TestApp::new().await;
        let user = app.user("a@example.com", "USER").await;
        let token = Some(user.token.as_str());

        let body = json!({ "name": "  Ada Lovelace " });
        let (status, v) = app.call(Method::PATCH, "/user/profile", token, Some(body)).await;
        assert_eq!(status, 200);
        assert_eq!(v["user"]["name"], "Ada Lovelace");

        let body = json!({ "name": "  " });
        let (status, v) = app.call(Method::PATCH, "/user/profile", token, Some(body)).await;
        assert_eq!(status, 400);
        assert_eq!(v["error"], "Name cannot be empty");

        let body = json!({ "name": "Eve" });
        let (status, _) = app.call(Method::PATCH, "/user/profile", None, Some(body)).await;
        assert_eq!(status, 401);

        let (_, v) = app.call(Method::GET, "/auth/me", token, None).await;
        assert_eq!(v["user"]["name"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn user_admin_requires_admin() {
        let app = TestApp::new().await;
        let user = app.user("a@example.com", "USER").await;

        for (method, uri) in [
            (Method::GET, "/admin/users"),
            (Method::GET, "/admin/users/1"),
            (Method::DELETE, "/admin/users/1"),
            (Method::POST, "/admin/users/1/promote"),
        ] {
            let (status, _) = app.call(method, uri, Some(&user.token), None).await;
            assert_eq!(status, 403, "{uri}");
        }
    }

    #[tokio::test]
    async fn promote_demote_and_delete() {
        let app = TestApp::new().await;
        let admin = app.user("root@example.com", "ADMIN").await;
        let user = app.user("a@example.com", "USER").await;
        let token = Some(admin.token.as_str());

        let (status, v) = app.call(Method::GET, "/admin/users", token, None).await;
        assert_eq!(status, 200);
        assert_eq!(v["users"].as_array().map(Vec::len), Some(2));

        let promote = format!("/admin/users/{}/promote", user.model.id);
        let (status, v) = app.call(Method::POST, &promote, token, None).await;
        assert_eq!(status, 200);
        assert_eq!(v["user"]["role"], "ADMIN");

        // the promoted user's stored role is honoured without a new token
        let (status, _) = app.call(Method::GET, "/admin/users", Some(&user.token), None).await;
        assert_eq!(status, 200);

        let (status, v) = app.call(Method::POST, &promote, token, None).await;
        assert_eq!(status, 400);
        assert_eq!(v["error"], "User is already an admin");

        let demote = format!("/admin/users/{}/demote", user.model.id);
        let (status, _) = app.call(Method::POST, &demote, token, None).await;
        assert_eq!(status, 200);
        let (status, _) = app.call(Method::GET, "/admin/users", Some(&user.token), None).await;
        assert_eq!(status, 403);

        let own = format!("/admin/users/{}", admin.model.id);
        let (status, v) = app.call(Method::DELETE, &own, token, None).await;
        assert_eq!(status, 400);
        assert_eq!(v["error"], "You cannot delete your own account");

        let patch = json!({ "name": null, "email": "root@example.com" });
        let uri = format!("/admin/users/{}", user.model.id);
        let (status, v) = app.call(Method::PATCH, &uri, token, Some(patch)).await;
        assert_eq!(status, 409);
        assert_eq!(v["error"], "Email already in use");

        let (status, _) = app.call(Method::DELETE, &uri, token, None).await;
        assert_eq!(status, 200);
        let (status, _) = app.call(Method::GET, &uri, token, None).await;
        assert_eq!(status, 404);
        let (status, _) = app.call(Method::GET, "/auth/me", Some(&user.token), None).await;
        assert_eq!(status, 401);
    }

    #[tokio::test]
    async fn deleting_a_rater_updates_the_film() {
        let app = TestApp::new().await;
        let admin = app.user("root@example.com", "ADMIN").await;
        let a = app.user("a@example.com", "USER").await;
        let b = app.user("b@example.com", "USER").await;
        let film = testutil::seed_film(&app.db, "Heat").await;

        for (user, value) in [(&a, 1), (&b, 4)] {
            let body = json!({ "filmId": film.id, "value": value });
            app.call(Method::POST, "/ratings", Some(&user.token), Some(body)).await;
        }

        let uri = format!("/admin/users/{}", a.model.id);
        let (status, _) = app.call(Method::DELETE, &uri, Some(&admin.token), None).await;
        assert_eq!(status, 200);

        let (_, v) = app.call(Method::GET, &format!("/films/{}", film.id), None, None).await;
        assert_eq!(v["averageRating"], 4.0);
        assert_eq!(v["totalRatings"], 1);
        assert_eq!(v["counts"]["ratings"], 1);
    }
}
