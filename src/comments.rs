use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::{
    db::now_sec,
    entities::{comment, film, user},
    error::{AppError, AppResult},
    models::{CommentView, FilmRef},
};

fn clean_content(content: Option<String>) -> AppResult<String> {
    let content = content.ok_or_else(|| AppError::invalid("Content is required"))?;
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::invalid("Comment content cannot be empty"));
    }
    Ok(content.to_string())
}

pub async fn list_for_film(db: &DatabaseConnection, film_id: i32) -> AppResult<Vec<CommentView>> {
    let rows = comment::Entity::find()
        .filter(comment::Column::FilmId.eq(film_id))
        .find_also_related(user::Entity)
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_desc(comment::Column::Id)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|(c, u)| CommentView::new(c, u)).collect())
}

/// Every comment on the site, newest first, with its film attached.
pub async fn list_all(db: &DatabaseConnection) -> AppResult<Vec<CommentView>> {
    let rows = comment::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_desc(comment::Column::Id)
        .all(db)
        .await?;

    let film_ids: Vec<i32> = rows.iter().map(|(c, _)| c.film_id).collect();
    let titles: HashMap<i32, String> = film::Entity::find()
        .filter(film::Column::Id.is_in(film_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|f| (f.id, f.title))
        .collect();

    Ok(rows
        .into_iter()
        .map(|(c, u)| {
            let film = titles.get(&c.film_id).map(|t| FilmRef { id: c.film_id, title: t.clone() });
            CommentView { film, ..CommentView::new(c, u) }
        })
        .collect())
}

pub async fn get_comment(db: &DatabaseConnection, id: i32) -> AppResult<CommentView> {
    let (c, u) = comment::Entity::find_by_id(id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    Ok(CommentView::new(c, u))
}

pub async fn create_comment(
    db: &DatabaseConnection,
    user_id: i32,
    film_id: Option<i32>,
    content: Option<String>,
) -> AppResult<CommentView> {
    let film_id = film_id.ok_or_else(|| AppError::invalid("Film ID is required"))?;
    let content = clean_content(content)?;

    film::Entity::find_by_id(film_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Film not found"))?;

    let now = now_sec();
    let row = comment::ActiveModel {
        id: Default::default(),
        user_id: Set(user_id),
        film_id: Set(film_id),
        content: Set(content),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(comment_id = row.id, user_id, film_id, "comment created");
    get_comment(db, row.id).await
}

async fn owned_comment(
    db: &DatabaseConnection,
    user_id: i32,
    id: i32,
    verb: &str,
) -> AppResult<comment::Model> {
    let row = comment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    if row.user_id != user_id {
        return Err(AppError::forbidden(format!("You can only {verb} your own comments")));
    }
    Ok(row)
}

pub async fn update_comment(
    db: &DatabaseConnection,
    user_id: i32,
    id: i32,
    content: Option<String>,
) -> AppResult<CommentView> {
    let content = clean_content(content)?;
    let row = owned_comment(db, user_id, id, "update").await?;

    let mut model: comment::ActiveModel = row.into();
    model.content = Set(content);
    model.updated_at = Set(now_sec());
    model.update(db).await?;

    info!(comment_id = id, user_id, "comment updated");
    get_comment(db, id).await
}

pub async fn delete_comment(db: &DatabaseConnection, user_id: i32, id: i32) -> AppResult<()> {
    let row = owned_comment(db, user_id, id, "delete").await?;
    comment::Entity::delete_by_id(row.id).exec(db).await?;
    info!(comment_id = id, user_id, "comment deleted");
    Ok(())
}

/// Moderation delete, no ownership check.
pub async fn remove_comment(db: &DatabaseConnection, id: i32) -> AppResult<()> {
    let res = comment::Entity::delete_by_id(id).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found("Comment not found"));
    }
    info!(comment_id = id, "comment removed by moderator");
    Ok(())
}
