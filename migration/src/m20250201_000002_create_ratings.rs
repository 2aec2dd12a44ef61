use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250201_000001_create_users_and_films::{Films, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ratings::Table)
                    .if_not_exists()
                    .col(pk_auto(Ratings::Id))
                    .col(integer(Ratings::UserId))
                    .col(integer(Ratings::FilmId))
                    .col(integer(Ratings::Value))
                    .col(big_integer(Ratings::CreatedAt))
                    .col(big_integer(Ratings::UpdatedAt))
                    .check(Expr::col(Ratings::Value).between(1, 5))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ratings_user")
                            .from(Ratings::Table, Ratings::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ratings_film")
                            .from(Ratings::Table, Ratings::FilmId)
                            .to(Films::Table, Films::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // one rating per (user, film)
        manager
            .create_index(
                Index::create()
                    .name("idx_ratings_user_film_unique")
                    .table(Ratings::Table)
                    .col(Ratings::UserId)
                    .col(Ratings::FilmId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ratings_film")
                    .table(Ratings::Table)
                    .col(Ratings::FilmId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Ratings::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Ratings {
    Table,
    Id,
    UserId,
    FilmId,
    Value,
    CreatedAt,
    UpdatedAt,
}
