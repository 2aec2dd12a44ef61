use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "films")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub overview: Option<String>,
    /// ISO calendar date, `YYYY-MM-DD`.
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Json,
    pub director: Option<String>,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[sea_orm(unique)]
    pub tmdb_id: Option<i32>,
    /// Mean of this film's rating values, rounded to two decimals.
    #[sea_orm(column_type = "Double")]
    pub average_rating: f64,
    pub total_ratings: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rating::Entity")]
    Ratings,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorites,
}

impl Related<super::rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ratings.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorites.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn genre_list(&self) -> Vec<String> {
        serde_json::from_value(self.genres.clone()).unwrap_or_default()
    }
}
