use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use tracing::info;

use crate::{
    db::now_sec,
    entities::{favorite, film},
    error::{AppError, AppResult},
    models::FavoriteView,
};

pub async fn list(db: &DatabaseConnection, user_id: i32) -> AppResult<Vec<FavoriteView>> {
    let rows = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .find_also_related(film::Entity)
        .order_by_desc(favorite::Column::CreatedAt)
        .order_by_desc(favorite::Column::Id)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|(f, film)| FavoriteView::new(f, film)).collect())
}

async fn find(
    db: &DatabaseConnection,
    user_id: i32,
    film_id: i32,
) -> AppResult<Option<favorite::Model>> {
    let row = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::FilmId.eq(film_id))
        .one(db)
        .await?;
    Ok(row)
}

pub async fn add(db: &DatabaseConnection, user_id: i32, film_id: i32) -> AppResult<FavoriteView> {
    let film = film::Entity::find_by_id(film_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Film not found"))?;

    if find(db, user_id, film_id).await?.is_some() {
        return Err(AppError::conflict("Film already in favorites"));
    }

    let row = insert(db, user_id, film_id).await?;

    info!(user_id, film_id, "favorite added");
    Ok(FavoriteView::new(row, Some(film)))
}

/// The unique (user, film) index settles concurrent adds that both passed the lookup.
async fn insert(db: &DatabaseConnection, user_id: i32, film_id: i32) -> AppResult<favorite::Model> {
    favorite::ActiveModel {
        id: Default::default(),
        user_id: Set(user_id),
        film_id: Set(film_id),
        created_at: Set(now_sec()),
    }
    .insert(db)
    .await
    .map_err(|err: DbErr| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::conflict("Film already in favorites")
        },
        _ => err.into(),
    })
}

pub async fn remove(db: &DatabaseConnection, user_id: i32, film_id: i32) -> AppResult<()> {
    let row = find(db, user_id, film_id)
        .await?
        .ok_or_else(|| AppError::not_found("Favorite not found"))?;
    favorite::Entity::delete_by_id(row.id).exec(db).await?;
    info!(user_id, film_id, "favorite removed");
    Ok(())
}

pub async fn is_favorite(db: &DatabaseConnection, user_id: i32, film_id: i32) -> AppResult<bool> {
    Ok(find(db, user_id, film_id).await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn add_check_remove() {
        let db = testutil::test_db().await;
        let user = testutil::seed_user(&db, "a@example.com", "USER").await;
        let film = testutil::seed_film(&db, "Heat").await;

        assert!(!is_favorite(&db, user.id, film.id).await.unwrap());

        let fav = add(&db, user.id, film.id).await.unwrap();
        assert_eq!(fav.film.as_ref().map(|f| f.title.as_str()), Some("Heat"));
        assert!(is_favorite(&db, user.id, film.id).await.unwrap());
        assert!(matches!(add(&db, user.id, film.id).await, Err(AppError::Conflict(_))));

        let listed = list(&db, user.id).await.unwrap();
        assert_eq!(listed.len(), 1);

        remove(&db, user.id, film.id).await.unwrap();
        assert!(matches!(remove(&db, user.id, film.id).await, Err(AppError::NotFound(_))));
        assert!(list(&db, user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let db = testutil::test_db().await;
        let user = testutil::seed_user(&db, "a@example.com", "USER").await;
        let film = testutil::seed_film(&db, "Heat").await;

        insert(&db, user.id, film.id).await.unwrap();
        let err = insert(&db, user.id, film.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(list(&db, user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_film_is_not_found() {
        let db = testutil::test_db().await;
        let user = testutil::seed_user(&db, "a@example.com", "USER").await;
        assert!(matches!(add(&db, user.id, 42).await, Err(AppError::NotFound(_))));
    }
}
