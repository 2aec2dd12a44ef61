use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde_json::{Value, json};

use super::require_film_id;
use crate::{
    AppState,
    auth::AuthUser,
    comments,
    error::AppResult,
    models::{CommentEdit, CommentView, FilmIdParam, NewComment},
};

pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FilmIdParam>, QueryRejection>,
) -> AppResult<Json<Vec<CommentView>>> {
    let Query(q) = query?;
    let film_id = require_film_id(q.film_id)?;
    Ok(Json(comments::list_for_film(&state.db, film_id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    body: Result<Json<NewComment>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let Json(req) = body?;
    let comment = comments::create_comment(&state.db, caller.id(), req.film_id, req.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<CommentView>> {
    let Path(id) = id?;
    Ok(Json(comments::get_comment(&state.db, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<CommentEdit>, JsonRejection>,
) -> AppResult<Json<CommentView>> {
    let Path(id) = id?;
    let Json(req) = body?;
    Ok(Json(comments::update_comment(&state.db, caller.id(), id, req.content).await?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    comments::delete_comment(&state.db, caller.id(), id).await?;
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
