use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::AdminUser,
    catalog, comments,
    error::AppResult,
    models::{CommentView, FilmPatch, FilmWithCounts, NewFilm, RatingDistribution, UserSummary},
    ratings::{distribution_of, ratings_with_users},
    stats::{self, CatalogStats},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub value: i32,
    pub user: Option<UserSummary>,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmStatistics {
    pub rating_distribution: RatingDistribution,
    pub total_comments: u64,
    pub total_ratings: u64,
    pub total_favorites: u64,
}

#[derive(Debug, Serialize)]
pub struct FilmDetail {
    #[serde(flatten)]
    pub film: FilmWithCounts,
    pub ratings: Vec<RatingEntry>,
    pub comments: Vec<CommentView>,
    pub statistics: FilmStatistics,
}

pub async fn list_films(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "films": catalog::all_films(&state.db).await? })))
}

pub async fn create_film(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    body: Result<Json<NewFilm>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(req) = body?;
    let film = catalog::create_film(&state.db, req).await?;
    tracing::info!(admin_id = admin.id(), film_id = film.film.id, "admin created film");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Film created successfully", "film": film })),
    ))
}

pub async fn film_detail(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let film = catalog::get_film(&state.db, id).await?;
    let ratings = ratings_with_users(&state.db, id).await?;
    let comments = comments::list_for_film(&state.db, id).await?;

    let values: Vec<i32> = ratings.iter().map(|(r, _)| r.value).collect();
    let statistics = FilmStatistics {
        rating_distribution: distribution_of(&values),
        total_comments: film.counts.comments,
        total_ratings: film.counts.ratings,
        total_favorites: film.counts.favorites,
    };
    let ratings = ratings
        .into_iter()
        .map(|(r, u)| RatingEntry {
            value: r.value,
            user: u.map(UserSummary::from),
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(json!({ "film": FilmDetail { film, ratings, comments, statistics } })))
}

pub async fn update_film(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<FilmPatch>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let Json(patch) = body?;
    let film = catalog::update_film(&state.db, id, patch).await?;
    Ok(Json(json!({ "message": "Film updated successfully", "film": film })))
}

pub async fn delete_film(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    catalog::delete_film(&state.db, id).await?;
    tracing::info!(admin_id = admin.id(), film_id = id, "admin deleted film");
    Ok(Json(json!({ "message": "Film deleted successfully" })))
}

pub async fn recompute_film(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    let stats = state.ratings.recompute(id).await?;
    Ok(Json(json!({ "filmStats": stats })))
}

pub async fn film_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<CatalogStats>> {
    Ok(Json(stats::catalog_stats(&state.db).await?))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<Value>> {
    Ok(Json(json!({ "comments": comments::list_all(&state.db).await? })))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    comments::remove_comment(&state.db, id).await?;
    tracing::info!(admin_id = admin.id(), comment_id = id, "admin removed comment");
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use crate::testutil::{self, TestApp};

    #[tokio::test]
    async fn non_admins_are_forbidden() {
        let app = TestApp::new().await;
        let user = app.user("a@example.com", "USER").await;

        for (method, uri) in [
            (Method::GET, "/admin/films"),
            (Method::GET, "/admin/films/stats"),
            (Method::GET, "/admin/comments"),
            (Method::DELETE, "/admin/films/1"),
        ] {
            let (status, v) = app.call(method, uri, Some(&user.token), None).await;
            assert_eq!(status, 403, "{uri}");
            assert_eq!(v["error"], "Forbidden - Admin access required");
        }

        let (status, _) = app.call(Method::GET, "/admin/films", None, None).await;
        assert_eq!(status, 401);
    }

    #[tokio::test]
    async fn manage_catalog() {
        let app = TestApp::new().await;
        let admin = app.user("root@example.com", "ADMIN").await;
        let token = Some(admin.token.as_str());

        let body = json!({
            "title": "Heat",
            "releaseDate": "1995-12-15",
            "genres": ["Crime", "Drama"],
            "tmdbId": 949,
        });
        let (status, v) = app.call(Method::POST, "/admin/films", token, Some(body.clone())).await;
        assert_eq!(status, 201);
        assert_eq!(v["film"]["totalRatings"], 0);
        let id = v["film"]["id"].clone();

        let (status, _) = app.call(Method::POST, "/admin/films", token, Some(body)).await;
        assert_eq!(status, 409);

        let (status, _) =
            app.call(Method::POST, "/admin/films", token, Some(json!({ "title": "" }))).await;
        assert_eq!(status, 400);

        let uri = format!("/admin/films/{id}");
        let patch = json!({ "runtime": 170, "averageRating": 4.9, "totalRatings": 99 });
        let (status, v) = app.call(Method::PATCH, &uri, token, Some(patch)).await;
        assert_eq!(status, 200);
        assert_eq!(v["film"]["runtime"], 170);
        assert_eq!(v["film"]["averageRating"], 0.0);
        assert_eq!(v["film"]["totalRatings"], 0);

        let (status, v) = app.call(Method::GET, &uri, token, None).await;
        assert_eq!(status, 200);
        assert_eq!(v["film"]["statistics"]["ratingDistribution"]["5"], 0);

        let (status, _) = app.call(Method::DELETE, &uri, token, None).await;
        assert_eq!(status, 200);
        let (status, _) = app.call(Method::GET, &uri, token, None).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn detail_and_recompute_reflect_ratings() {
        let app = TestApp::new().await;
        let admin = app.user("root@example.com", "ADMIN").await;
        let user = app.user("a@example.com", "USER").await;
        let film = testutil::seed_film(&app.db, "Heat").await;

        let body = json!({ "filmId": film.id, "value": 4 });
        app.call(Method::POST, "/ratings", Some(&user.token), Some(body)).await;

        let uri = format!("/admin/films/{}", film.id);
        let (_, v) = app.call(Method::GET, &uri, Some(&admin.token), None).await;
        let detail = &v["film"];
        assert_eq!(detail["statistics"]["ratingDistribution"]["4"], 1);
        assert_eq!(detail["statistics"]["totalRatings"], 1);
        assert_eq!(detail["ratings"][0]["user"]["email"], "a@example.com");

        let uri = format!("/admin/films/{}/recompute", film.id);
        let (status, v) = app.call(Method::POST, &uri, Some(&admin.token), None).await;
        assert_eq!(status, 200);
        assert_eq!(v["filmStats"], json!({ "averageRating": 4.0, "totalRatings": 1 }));
    }

    #[tokio::test]
    async fn moderate_comments() {
        let app = TestApp::new().await;
        let admin = app.user("root@example.com", "ADMIN").await;
        let user = app.user("a@example.com", "USER").await;
        let film = testutil::seed_film(&app.db, "Heat").await;

        let body = json!({ "filmId": film.id, "content": "spam" });
        let (_, v) = app.call(Method::POST, "/comments", Some(&user.token), Some(body)).await;
        let id = v["id"].clone();

        let (status, v) = app.call(Method::GET, "/admin/comments", Some(&admin.token), None).await;
        assert_eq!(status, 200);
        assert_eq!(v["comments"][0]["film"]["title"], "Heat");

        let uri = format!("/admin/comments/{id}");
        let (status, _) = app.call(Method::DELETE, &uri, Some(&admin.token), None).await;
        assert_eq!(status, 200);
        let (status, _) = app.call(Method::DELETE, &uri, Some(&admin.token), None).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn stats_overview() {
        let app = TestApp::new().await;
        let admin = app.user("root@example.com", "ADMIN").await;
        testutil::seed_film(&app.db, "Heat").await;

        let (status, v) =
            app.call(Method::GET, "/admin/films/stats", Some(&admin.token), None).await;
        assert_eq!(status, 200);
        assert_eq!(v["overview"]["totalFilms"], 1);
        assert_eq!(v["recentFilms"][0]["title"], "Heat");
    }
}
