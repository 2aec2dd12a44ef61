//! Keeps every film's `average_rating` / `total_ratings` equal to the mean and count of its
//! rating rows.
//!
//! Each mutation writes the rating row and recomputes the aggregate from the full row set in
//! the same transaction, so a failed recompute rolls the rating write back with it.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, info};

use crate::{
    db::now_sec,
    entities::{film, rating, user},
    error::{AppError, AppResult},
    models::{FilmStats, RatingDistribution},
};

const VALUE_ERROR: &str = "Rating value must be an integer between 1 and 5";

/// A star value in `1..=5`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RatingValue(i32);

impl RatingValue {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 5;

    pub fn new(value: i64) -> AppResult<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as i32))
        } else {
            Err(AppError::invalid(VALUE_ERROR))
        }
    }

    /// Accepts JSON integers, and floats with no fractional part (`4.0`).
    pub fn from_json(value: &serde_json::Value) -> AppResult<Self> {
        let serde_json::Value::Number(n) = value else {
            return Err(AppError::invalid(VALUE_ERROR));
        };
        match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Self::new(i),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e9 => Self::new(f as i64),
            _ => Err(AppError::invalid(VALUE_ERROR)),
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct RatingOutcome {
    pub rating: rating::Model,
    pub stats: FilmStats,
    pub created: bool,
}

#[derive(Clone)]
pub struct RatingAggregator {
    db: DatabaseConnection,
}

impl RatingAggregator {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn upsert_rating(
        &self,
        user_id: i32,
        film_id: i32,
        value: RatingValue,
    ) -> AppResult<RatingOutcome> {
        debug!(user_id, film_id, value = value.get(), "upserting rating");

        let txn = self.db.begin().await?;

        user::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        film::Entity::find_by_id(film_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Film not found"))?;

        let existing = rating::Entity::find()
            .filter(rating::Column::UserId.eq(user_id))
            .filter(rating::Column::FilmId.eq(film_id))
            .one(&txn)
            .await?;

        let now = now_sec();
        let created = existing.is_none();
        let rating = match existing {
            Some(row) => {
                let mut model: rating::ActiveModel = row.into();
                model.value = Set(value.get());
                model.updated_at = Set(now);
                model.update(&txn).await?
            },
            None => {
                rating::ActiveModel {
                    id: Default::default(),
                    user_id: Set(user_id),
                    film_id: Set(film_id),
                    value: Set(value.get()),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            },
        };

        let stats = recompute_film_stats(&txn, film_id).await?;
        txn.commit().await?;

        info!(
            user_id,
            film_id,
            rating_id = rating.id,
            created,
            average = stats.average_rating,
            total = stats.total_ratings,
            "rating saved"
        );
        Ok(RatingOutcome { rating, stats, created })
    }

    pub async fn delete_rating(&self, user_id: i32, rating_id: i32) -> AppResult<FilmStats> {
        debug!(user_id, rating_id, "deleting rating");

        let txn = self.db.begin().await?;

        let row = rating::Entity::find_by_id(rating_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Rating not found"))?;
        if row.user_id != user_id {
            return Err(AppError::forbidden("Forbidden: You can only delete your own ratings"));
        }

        rating::Entity::delete_by_id(row.id).exec(&txn).await?;
        let stats = recompute_film_stats(&txn, row.film_id).await?;
        txn.commit().await?;

        info!(
            user_id,
            rating_id,
            film_id = row.film_id,
            total = stats.total_ratings,
            "rating deleted"
        );
        Ok(stats)
    }

    pub async fn rating_for(&self, user_id: i32, film_id: i32) -> AppResult<Option<rating::Model>> {
        let row = rating::Entity::find()
            .filter(rating::Column::UserId.eq(user_id))
            .filter(rating::Column::FilmId.eq(film_id))
            .one(&self.db)
            .await?;
        Ok(row)
    }

    /// Re-derives a film's aggregate from its rating rows. Safe to run at any time.
    pub async fn recompute(&self, film_id: i32) -> AppResult<FilmStats> {
        let txn = self.db.begin().await?;
        let stats = recompute_film_stats(&txn, film_id).await?;
        txn.commit().await?;
        info!(
            film_id,
            average = stats.average_rating,
            total = stats.total_ratings,
            "aggregate recomputed"
        );
        Ok(stats)
    }

    pub async fn distribution(&self, film_id: i32) -> AppResult<RatingDistribution> {
        film::Entity::find_by_id(film_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Film not found"))?;
        let values = film_rating_values(&self.db, film_id).await?;
        Ok(distribution_of(&values))
    }
}

/// A film's ratings with their authors, newest first.
pub async fn ratings_with_users(
    db: &DatabaseConnection,
    film_id: i32,
) -> AppResult<Vec<(rating::Model, Option<user::Model>)>> {
    let rows = rating::Entity::find()
        .filter(rating::Column::FilmId.eq(film_id))
        .find_also_related(user::Entity)
        .order_by_desc(rating::Column::CreatedAt)
        .order_by_desc(rating::Column::Id)
        .all(db)
        .await?;
    Ok(rows)
}

pub async fn recompute_film_stats<C: ConnectionTrait>(
    conn: &C,
    film_id: i32,
) -> AppResult<FilmStats> {
    let values = film_rating_values(conn, film_id).await?;
    let stats = stats_of(&values);

    let res = film::Entity::update_many()
        .col_expr(film::Column::AverageRating, Expr::value(stats.average_rating))
        .col_expr(film::Column::TotalRatings, Expr::value(stats.total_ratings))
        .filter(film::Column::Id.eq(film_id))
        .exec(conn)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found("Film not found"));
    }

    Ok(stats)
}

async fn film_rating_values<C: ConnectionTrait>(conn: &C, film_id: i32) -> AppResult<Vec<i32>> {
    let values = rating::Entity::find()
        .select_only()
        .column(rating::Column::Value)
        .filter(rating::Column::FilmId.eq(film_id))
        .into_tuple::<i32>()
        .all(conn)
        .await?;
    Ok(values)
}

pub fn stats_of(values: &[i32]) -> FilmStats {
    if values.is_empty() {
        return FilmStats { average_rating: 0.0, total_ratings: 0 };
    }
    let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
    FilmStats {
        average_rating: round2(sum as f64 / values.len() as f64),
        total_ratings: values.len() as i32,
    }
}

pub fn distribution_of(values: &[i32]) -> RatingDistribution {
    let mut dist: RatingDistribution =
        (RatingValue::MIN..=RatingValue::MAX).map(|v| (v, 0)).collect();
    for v in values {
        if let Some(n) = dist.get_mut(v) {
            *n += 1;
        }
    }
    dist
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
