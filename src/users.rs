//! User administration and self-service profile edits.
//!
//! Accounts themselves are provisioned by the identity layer; this module only edits and
//! removes them. Removing a user drops their ratings, so every film they rated gets its
//! aggregate recomputed in the same transaction.

use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};
use tracing::info;

use crate::{
    db::now_sec,
    entities::{comment, favorite, rating, user},
    error::{AppError, AppResult},
    models::{Role, UserCounts, UserPatch, UserView, UserWithCounts},
    ratings::recompute_film_stats,
};

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    matches!(domain.rsplit_once('.'), Some((host, tld)) if !host.is_empty() && !tld.is_empty())
}

pub async fn find_user(db: &DatabaseConnection, id: i32) -> AppResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn list_users(db: &DatabaseConnection) -> AppResult<Vec<UserWithCounts>> {
    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .all(db)
        .await?;
    with_counts(db, users).await
}

pub async fn get_user(db: &DatabaseConnection, id: i32) -> AppResult<UserWithCounts> {
    let found = find_user(db, id).await?;
    let mut out = with_counts(db, vec![found]).await?;
    out.pop().ok_or_else(|| AppError::not_found("User not found"))
}

async fn with_counts(
    db: &DatabaseConnection,
    users: Vec<user::Model>,
) -> AppResult<Vec<UserWithCounts>> {
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let counts = counts_by_user(db, &ids).await?;
    Ok(users
        .into_iter()
        .map(|u| {
            let counts = counts.get(&u.id).copied().unwrap_or_default();
            UserWithCounts { user: UserView::from(u), counts }
        })
        .collect())
}

async fn counts_by_user(
    db: &DatabaseConnection,
    ids: &[i32],
) -> AppResult<HashMap<i32, UserCounts>> {
    let mut out: HashMap<i32, UserCounts> = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }

    let (comments, ratings, favorites) = futures::try_join!(
        comment::Entity::find()
            .select_only()
            .column(comment::Column::UserId)
            .column_as(Expr::col(comment::Column::Id).count(), "n")
            .filter(comment::Column::UserId.is_in(ids.to_vec()))
            .group_by(comment::Column::UserId)
            .into_tuple::<(i32, i64)>()
            .all(db),
        rating::Entity::find()
            .select_only()
            .column(rating::Column::UserId)
            .column_as(Expr::col(rating::Column::Id).count(), "n")
            .filter(rating::Column::UserId.is_in(ids.to_vec()))
            .group_by(rating::Column::UserId)
            .into_tuple::<(i32, i64)>()
            .all(db),
        favorite::Entity::find()
            .select_only()
            .column(favorite::Column::UserId)
            .column_as(Expr::col(favorite::Column::Id).count(), "n")
            .filter(favorite::Column::UserId.is_in(ids.to_vec()))
            .group_by(favorite::Column::UserId)
            .into_tuple::<(i32, i64)>()
            .all(db),
    )?;

    for (id, n) in comments {
        out.entry(id).or_default().comments = n as u64;
    }
    for (id, n) in ratings {
        out.entry(id).or_default().ratings = n as u64;
    }
    for (id, n) in favorites {
        out.entry(id).or_default().favorites = n as u64;
    }
    Ok(out)
}

/// Admin edit of email, display name and role.
pub async fn update_user(
    db: &DatabaseConnection,
    id: i32,
    patch: UserPatch,
) -> AppResult<UserView> {
    let existing = find_user(db, id).await?;
    let mut model: user::ActiveModel = existing.clone().into();

    if let Some(email) = patch.email {
        let email = email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AppError::invalid("Invalid email address"));
        }
        if email != existing.email {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(db)
                .await?
                .is_some();
            if taken {
                return Err(AppError::conflict("Email already in use"));
            }
        }
        model.email = Set(email);
    }

    if let Some(name) = patch.name {
        model.name = Set(name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()));
    }

    if let Some(role) = patch.role {
        let role = Role::parse(&role)
            .ok_or_else(|| AppError::invalid("Invalid role. Must be USER or ADMIN"))?;
        model.role = Set(role.as_str().to_string());
    }

    model.updated_at = Set(now_sec());
    let updated = model.update(db).await?;
    info!(user_id = id, "user updated");
    Ok(UserView::from(updated))
}

async fn set_role(
    db: &DatabaseConnection,
    existing: user::Model,
    role: Role,
) -> AppResult<UserView> {
    let mut model: user::ActiveModel = existing.into();
    model.role = Set(role.as_str().to_string());
    model.updated_at = Set(now_sec());
    Ok(UserView::from(model.update(db).await?))
}

pub async fn promote(db: &DatabaseConnection, id: i32) -> AppResult<UserView> {
    let existing = find_user(db, id).await?;
    if Role::from_db(&existing.role) == Role::Admin {
        return Err(AppError::invalid("User is already an admin"));
    }
    let view = set_role(db, existing, Role::Admin).await?;
    info!(user_id = id, "user promoted to admin");
    Ok(view)
}

pub async fn demote(db: &DatabaseConnection, acting_admin: i32, id: i32) -> AppResult<UserView> {
    let existing = find_user(db, id).await?;
    if Role::from_db(&existing.role) == Role::User {
        return Err(AppError::invalid("User is already a regular user"));
    }
    if acting_admin == id {
        return Err(AppError::invalid("You cannot demote yourself"));
    }
    let view = set_role(db, existing, Role::User).await?;
    info!(user_id = id, "admin demoted to user");
    Ok(view)
}

/// Deletes a user with their ratings, comments and favorites, and re-derives the aggregate of
/// every film they had rated. Returns the ids of those films.
pub async fn delete_user(
    db: &DatabaseConnection,
    acting_admin: i32,
    id: i32,
) -> AppResult<Vec<i32>> {
    let txn = db.begin().await?;

    user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if acting_admin == id {
        return Err(AppError::invalid("You cannot delete your own account"));
    }

    let rated: BTreeSet<i32> = rating::Entity::find()
        .select_only()
        .column(rating::Column::FilmId)
        .filter(rating::Column::UserId.eq(id))
        .into_tuple::<i32>()
        .all(&txn)
        .await?
        .into_iter()
        .collect();

    rating::Entity::delete_many().filter(rating::Column::UserId.eq(id)).exec(&txn).await?;
    comment::Entity::delete_many().filter(comment::Column::UserId.eq(id)).exec(&txn).await?;
    favorite::Entity::delete_many().filter(favorite::Column::UserId.eq(id)).exec(&txn).await?;
    user::Entity::delete_by_id(id).exec(&txn).await?;

    for film_id in &rated {
        recompute_film_stats(&txn, *film_id).await?;
    }
    txn.commit().await?;

    info!(user_id = id, films_recomputed = rated.len(), "user deleted");
    Ok(rated.into_iter().collect())
}

/// Sets the caller's own display name.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: i32,
    name: Option<String>,
) -> AppResult<UserView> {
    let name = name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::invalid("Name cannot be empty"));
    }

    let mut model: user::ActiveModel = find_user(db, user_id).await?.into();
    model.name = Set(Some(name.to_string()));
    model.updated_at = Set(now_sec());
    let updated = model.update(db).await?;
    info!(user_id, "profile name updated");
    Ok(UserView::from(updated))
}
