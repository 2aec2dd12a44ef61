mod admin;
mod auth;
mod comments;
mod favorites;
mod films;
mod ratings;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/films", get(admin::list_films).post(admin::create_film))
        .route("/films/stats", get(admin::film_stats))
        .route(
            "/films/{id}",
            get(admin::film_detail).patch(admin::update_film).delete(admin::delete_film),
        )
        .route("/films/{id}/recompute", post(admin::recompute_film))
        .route("/comments", get(admin::list_comments))
        .route("/comments/{id}", delete(admin::delete_comment))
        .route("/users", get(users::list))
        .route("/users/{id}", get(users::get).patch(users::update).delete(users::delete))
        .route("/users/{id}/promote", post(users::promote))
        .route("/users/{id}/demote", post(users::demote));

    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/user/profile", patch(users::update_profile))
        .route("/films", get(films::list))
        .route("/films/{id}", get(films::get))
        .route("/films/{id}/ratings/distribution", get(ratings::distribution))
        .route("/genres", get(films::genres))
        .route("/directors", get(films::directors))
        .route("/languages", get(films::languages))
        .route("/ratings", get(ratings::mine).post(ratings::rate))
        .route("/ratings/{id}", delete(ratings::remove))
        .route("/comments", get(comments::list).post(comments::create))
        .route(
            "/comments/{id}",
            get(comments::get).put(comments::update).delete(comments::remove),
        )
        .route("/favorites", get(favorites::list).post(favorites::add).delete(favorites::remove))
        .route("/favorites/check", get(favorites::check))
        .nest("/admin", admin)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
}

fn require_film_id(film_id: Option<i32>) -> crate::error::AppResult<i32> {
    film_id.ok_or_else(|| crate::error::AppError::invalid("Film ID is required"))
}
