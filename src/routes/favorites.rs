use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde_json::{Value, json};

use super::require_film_id;
use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    error::AppResult,
    favorites,
    models::{FavoriteView, FilmIdParam},
};

pub async fn list(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> AppResult<Json<Vec<FavoriteView>>> {
    Ok(Json(favorites::list(&state.db, caller.id()).await?))
}

pub async fn add(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    body: Result<Json<FilmIdParam>, JsonRejection>,
) -> AppResult<(StatusCode, Json<FavoriteView>)> {
    let Json(req) = body?;
    let film_id = require_film_id(req.film_id)?;
    let favorite = favorites::add(&state.db, caller.id(), film_id).await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    body: Result<Json<FilmIdParam>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = body?;
    let film_id = require_film_id(req.film_id)?;
    favorites::remove(&state.db, caller.id(), film_id).await?;
    Ok(Json(json!({ "message": "Removed from favorites" })))
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(caller): MaybeAuthUser,
    query: Result<Query<FilmIdParam>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Some(caller) = caller else {
        return Ok(Json(json!({ "isFavorite": false })));
    };
    let Query(q) = query?;
    let film_id = require_film_id(q.film_id)?;
    let is_favorite = favorites::is_favorite(&state.db, caller.id(), film_id).await?;
    Ok(Json(json!({ "isFavorite": is_favorite })))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use crate::testutil::{self, TestApp};

    #[tokio::test]
    async fn favorite_round_trip() {
        let app = TestApp::new().await;
        let user = app.user("a@example.com", "USER").await;
        let film = testutil::seed_film(&app.db, "Heat").await;
        let body = json!({ "filmId": film.id });
        let check = format!("/favorites/check?filmId={}", film.id);

        let (status, _) =
            app.call(Method::POST, "/favorites", Some(&user.token), Some(body.clone())).await;
        assert_eq!(status, 201);
        let (status, v) =
            app.call(Method::POST, "/favorites", Some(&user.token), Some(body.clone())).await;
        assert_eq!(status, 409);
        assert_eq!(v["error"], "Film already in favorites");

        let (_, v) = app.call(Method::GET, &check, Some(&user.token), None).await;
        assert_eq!(v["isFavorite"], true);

        let (status, v) = app.call(Method::GET, "/favorites", Some(&user.token), None).await;
        assert_eq!(status, 200);
        assert_eq!(v[0]["film"]["title"], "Heat");

        let (status, _) =
            app.call(Method::DELETE, "/favorites", Some(&user.token), Some(body.clone())).await;
        assert_eq!(status, 200);
        let (status, _) =
            app.call(Method::DELETE, "/favorites", Some(&user.token), Some(body)).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn check_without_credential_is_false() {
        let app = TestApp::new().await;
        let (status, v) = app.call(Method::GET, "/favorites/check?filmId=1", None, None).await;
        assert_eq!(status, 200);
        assert_eq!(v, json!({ "isFavorite": false }));

        let (status, v) =
            app.call(Method::GET, "/favorites/check?filmId=1", Some("junk"), None).await;
        assert_eq!(status, 200);
        assert_eq!(v["isFavorite"], false);
    }
}
