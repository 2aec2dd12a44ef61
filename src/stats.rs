use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
    sea_query::Expr,
};
use serde::Serialize;

use crate::{
    entities::{comment, favorite, film, rating},
    error::AppResult,
    ratings::round2,
};

const TOP_N: u64 = 5;
/// Films need this many ratings before they can rank as best rated.
const BEST_RATED_MIN_RATINGS: i32 = 5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_films: u64,
    pub total_ratings: u64,
    pub total_comments: u64,
    pub average_ratings_per_film: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedFilm {
    pub id: i32,
    pub title: String,
    pub average_rating: f64,
    pub total_ratings: i32,
    pub poster_path: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountedFilm {
    pub id: i32,
    pub title: String,
    pub poster_path: Option<String>,
    pub count: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilm {
    pub id: i32,
    pub title: String,
    pub created_at: i64,
    pub poster_path: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub overview: Overview,
    pub most_rated_films: Vec<RatedFilm>,
    pub best_rated_films: Vec<RatedFilm>,
    pub most_commented_films: Vec<CountedFilm>,
    pub most_favorited_films: Vec<CountedFilm>,
    pub recent_films: Vec<RecentFilm>,
}

impl From<film::Model> for RatedFilm {
    fn from(f: film::Model) -> Self {
        Self {
            id: f.id,
            title: f.title,
            average_rating: f.average_rating,
            total_ratings: f.total_ratings,
            poster_path: f.poster_path,
        }
    }
}

pub async fn catalog_stats(db: &DatabaseConnection) -> AppResult<CatalogStats> {
    let (total_films, total_ratings, total_comments) = futures::try_join!(
        film::Entity::find().count(db),
        rating::Entity::find().count(db),
        comment::Entity::find().count(db),
    )?;

    let most_rated = film::Entity::find()
        .order_by_desc(film::Column::TotalRatings)
        .order_by_desc(film::Column::Id)
        .limit(TOP_N)
        .all(db);
    let best_rated = film::Entity::find()
        .filter(film::Column::TotalRatings.gte(BEST_RATED_MIN_RATINGS))
        .order_by_desc(film::Column::AverageRating)
        .order_by_desc(film::Column::TotalRatings)
        .limit(TOP_N)
        .all(db);
    let recent = film::Entity::find()
        .order_by_desc(film::Column::CreatedAt)
        .order_by_desc(film::Column::Id)
        .limit(TOP_N)
        .all(db);
    let (most_rated, best_rated, recent) = futures::try_join!(most_rated, best_rated, recent)?;

    let most_commented = top_by_count(
        db,
        comment::Entity::find()
            .select_only()
            .column(comment::Column::FilmId)
            .column_as(Expr::col(comment::Column::Id).count(), "n")
            .group_by(comment::Column::FilmId)
            .order_by(Expr::cust("n"), Order::Desc)
            .limit(TOP_N)
            .into_tuple::<(i32, i64)>()
            .all(db)
            .await?,
    )
    .await?;

    let most_favorited = top_by_count(
        db,
        favorite::Entity::find()
            .select_only()
            .column(favorite::Column::FilmId)
            .column_as(Expr::col(favorite::Column::Id).count(), "n")
            .group_by(favorite::Column::FilmId)
            .order_by(Expr::cust("n"), Order::Desc)
            .limit(TOP_N)
            .into_tuple::<(i32, i64)>()
            .all(db)
            .await?,
    )
    .await?;

    let average_ratings_per_film =
        if total_films > 0 { round2(total_ratings as f64 / total_films as f64) } else { 0.0 };

    Ok(CatalogStats {
        overview: Overview { total_films, total_ratings, total_comments, average_ratings_per_film },
        most_rated_films: most_rated.into_iter().map(RatedFilm::from).collect(),
        best_rated_films: best_rated.into_iter().map(RatedFilm::from).collect(),
        most_commented_films: most_commented,
        most_favorited_films: most_favorited,
        recent_films: recent
            .into_iter()
            .map(|f| RecentFilm {
                id: f.id,
                title: f.title,
                created_at: f.created_at,
                poster_path: f.poster_path,
            })
            .collect(),
    })
}

/// Resolves `(film_id, count)` pairs, already in rank order, to film summaries.
async fn top_by_count(
    db: &DatabaseConnection,
    ranked: Vec<(i32, i64)>,
) -> AppResult<Vec<CountedFilm>> {
    let ids: Vec<i32> = ranked.iter().map(|(id, _)| *id).collect();
    let films = film::Entity::find().filter(film::Column::Id.is_in(ids)).all(db).await?;

    Ok(ranked
        .into_iter()
        .filter_map(|(id, count)| {
            films.iter().find(|f| f.id == id).map(|f| CountedFilm {
                id,
                title: f.title.clone(),
                poster_path: f.poster_path.clone(),
                count,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        comments, favorites,
        ratings::{RatingAggregator, RatingValue},
        testutil,
    };

    #[tokio::test]
    async fn empty_catalog() {
        let db = testutil::test_db().await;
        let stats = catalog_stats(&db).await.unwrap();
        assert_eq!(stats.overview.total_films, 0);
        assert_eq!(stats.overview.average_ratings_per_film, 0.0);
        assert!(stats.most_rated_films.is_empty());
        assert!(stats.most_commented_films.is_empty());
    }

    #[tokio::test]
    async fn ranks_films() {
        let db = testutil::test_db().await;
        let heat = testutil::seed_film(&db, "Heat").await;
        let thief = testutil::seed_film(&db, "Thief").await;
        let ronin = testutil::seed_film(&db, "Ronin").await;

        let agg = RatingAggregator::new(db.clone());
        for i in 0..5 {
            let user = testutil::seed_user(&db, &format!("u{i}@example.com"), "USER").await;
            agg.upsert_rating(user.id, heat.id, RatingValue::new(4).unwrap()).await.unwrap();
            if i < 2 {
                agg.upsert_rating(user.id, thief.id, RatingValue::new(5).unwrap()).await.unwrap();
                favorites::add(&db, user.id, ronin.id).await.unwrap();
            }
            comments::create_comment(&db, user.id, Some(thief.id), Some("hm".into()))
                .await
                .unwrap();
        }

        let stats = catalog_stats(&db).await.unwrap();
        assert_eq!(stats.overview.total_films, 3);
        assert_eq!(stats.overview.total_ratings, 7);
        assert_eq!(stats.overview.total_comments, 5);
        assert_eq!(stats.overview.average_ratings_per_film, 2.33);

        assert_eq!(stats.most_rated_films[0].id, heat.id);
        // thief has the higher mean but too few ratings to qualify
        assert_eq!(stats.best_rated_films.len(), 1);
        assert_eq!(stats.best_rated_films[0].id, heat.id);
        assert_eq!(stats.most_commented_films[0].id, thief.id);
        assert_eq!(stats.most_commented_films[0].count, 5);
        assert_eq!(stats.most_favorited_films[0].id, ronin.id);
        assert_eq!(stats.most_favorited_films[0].count, 2);
        assert_eq!(stats.recent_films.len(), 3);
    }
}
