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
    error::{AppError, AppResult},
    models::{FilmIdParam, RateRequest, RatingDistribution, RatingDto},
    ratings::RatingValue,
};

pub async fn rate(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    body: Result<Json<RateRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(req) = body?;
    let film_id = require_film_id(req.film_id)?;
    let value = req
        .value
        .as_ref()
        .ok_or_else(|| AppError::invalid("Rating value must be an integer between 1 and 5"))
        .and_then(RatingValue::from_json)?;

    let outcome = state.ratings.upsert_rating(caller.id(), film_id, value).await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "Rating added successfully")
    } else {
        (StatusCode::OK, "Rating updated successfully")
    };
    Ok((
        status,
        Json(json!({
            "message": message,
            "rating": RatingDto::from(outcome.rating),
            "filmStats": outcome.stats,
        })),
    ))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let stats = state.ratings.delete_rating(caller.id(), id).await?;
    Ok(Json(json!({ "message": "Rating deleted successfully", "filmStats": stats })))
}

pub async fn mine(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    query: Result<Query<FilmIdParam>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(q) = query?;
    let film_id = require_film_id(q.film_id)?;
    let rating = state.ratings.rating_for(caller.id(), film_id).await?.map(RatingDto::from);
    Ok(Json(json!({ "rating": rating })))
}

pub async fn distribution(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<RatingDistribution>> {
    let Path(id) = id?;
    Ok(Json(state.ratings.distribution(id).await?))
}
