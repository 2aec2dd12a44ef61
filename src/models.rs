use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::{comment, favorite, film, rating, user};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Unknown stored roles never grant admin rights.
    pub fn from_db(role: &str) -> Self {
        match role {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// The denormalized rating aggregate materialized on a film.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmStats {
    pub average_rating: f64,
    pub total_ratings: i32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FilmCounts {
    pub comments: u64,
    pub ratings: u64,
    pub favorites: u64,
}

/// Number of ratings per star value, always keyed 1 through 5.
pub type RatingDistribution = BTreeMap<i32, u64>;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmDto {
    pub id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub tmdb_id: Option<i32>,
    pub average_rating: f64,
    pub total_ratings: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<film::Model> for FilmDto {
    fn from(m: film::Model) -> Self {
        let genres = m.genre_list();
        Self {
            id: m.id,
            title: m.title,
            overview: m.overview,
            release_date: m.release_date,
            runtime: m.runtime,
            genres,
            director: m.director,
            original_language: m.original_language,
            poster_path: m.poster_path,
            backdrop_path: m.backdrop_path,
            tmdb_id: m.tmdb_id,
            average_rating: m.average_rating,
            total_ratings: m.total_ratings,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FilmWithCounts {
    #[serde(flatten)]
    pub film: FilmDto,
    pub counts: FilmCounts,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmPage {
    pub count: usize,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
    pub films: Vec<FilmWithCounts>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingDto {
    pub id: i32,
    pub user_id: i32,
    pub film_id: i32,
    pub value: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<rating::Model> for RatingDto {
    fn from(m: rating::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            film_id: m.film_id,
            value: m.value,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
}

impl From<user::Model> for UserSummary {
    fn from(m: user::Model) -> Self {
        Self { id: m.id, name: m.name, email: m.email }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: i64,
}

impl From<user::Model> for UserProfile {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            role: Role::from_db(&m.role),
            email: m.email,
            name: m.name,
            created_at: m.created_at,
        }
    }
}

/// A user as the admin console sees it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<user::Model> for UserView {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            role: Role::from_db(&m.role),
            email: m.email,
            name: m.name,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UserCounts {
    pub comments: u64,
    pub ratings: u64,
    pub favorites: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserWithCounts {
    #[serde(flatten)]
    pub user: UserView,
    pub counts: UserCounts,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmRef {
    pub id: i32,
    pub title: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    pub user_id: i32,
    pub film_id: i32,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub film: Option<FilmRef>,
}

impl CommentView {
    pub fn new(m: comment::Model, user: Option<user::Model>) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            film_id: m.film_id,
            content: m.content,
            created_at: m.created_at,
            updated_at: m.updated_at,
            user: user.map(UserSummary::from),
            film: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteView {
    pub id: i32,
    pub user_id: i32,
    pub film_id: i32,
    pub created_at: i64,
    pub film: Option<FilmDto>,
}

impl FavoriteView {
    pub fn new(m: favorite::Model, film: Option<film::Model>) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            film_id: m.film_id,
            created_at: m.created_at,
            film: film.map(FilmDto::from),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    pub film_id: Option<i32>,
    /// Kept loose so non-numeric values surface as a validation error.
    pub value: Option<serde_json::Value>,
}

/// `filmId` carried either in a query string or a JSON body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmIdParam {
    pub film_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub film_id: Option<i32>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentEdit {
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub language: Option<String>,
    pub year: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFilm {
    pub title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub director: Option<String>,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub tmdb_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
}

/// Admin edit of a user. `name: null` clears the display name.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    pub role: Option<String>,
}

/// Partial film update. The outer `Option` tells "absent" from "set to null".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub overview: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub release_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub runtime: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub genres: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub director: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub original_language: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub poster_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub backdrop_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub tmdb_id: Option<Option<i32>>,
}

fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: FilmPatch =
            serde_json::from_str(r#"{"overview": null, "runtime": 120}"#).unwrap();
        assert_eq!(patch.overview, Some(None));
        assert_eq!(patch.runtime, Some(Some(120)));
        assert_eq!(patch.director, None);
        assert_eq!(patch.title, None);
    }

    #[test]
    fn film_stats_serialize_camel_case() {
        let stats = FilmStats { average_rating: 4.5, total_ratings: 2 };
        let v = serde_json::to_value(stats).unwrap();
        assert_eq!(v, serde_json::json!({ "averageRating": 4.5, "totalRatings": 2 }));
    }

    #[test]
    fn unknown_roles_are_plain_users() {
        assert_eq!(Role::from_db("ADMIN"), Role::Admin);
        assert_eq!(Role::from_db("USER"), Role::User);
        assert_eq!(Role::from_db("root"), Role::User);
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
    }
}
