use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use serde_json::{Value, json};

use crate::{
    AppState, catalog,
    error::AppResult,
    models::{FilmPage, FilmQuery, FilmWithCounts},
};

pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FilmQuery>, QueryRejection>,
) -> AppResult<Json<FilmPage>> {
    let Query(q) = query?;
    let page = catalog::list_films(&state.db, &q).await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<FilmWithCounts>> {
    let Path(id) = id?;
    Ok(Json(catalog::get_film(&state.db, id).await?))
}

pub async fn genres(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "genres": catalog::genres(&state.db).await? })))
}

pub async fn directors(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "directors": catalog::directors(&state.db).await? })))
}

pub async fn languages(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "languages": catalog::languages(&state.db).await? })))
}
