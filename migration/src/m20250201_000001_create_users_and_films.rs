use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_uniq(Users::Email))
                    .col(string_null(Users::Name))
                    .col(string(Users::Role).default("USER"))
                    .col(big_integer(Users::CreatedAt))
                    .col(big_integer(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Films::Table)
                    .if_not_exists()
                    .col(pk_auto(Films::Id))
                    .col(string(Films::Title))
                    .col(text_null(Films::Overview))
                    .col(string_null(Films::ReleaseDate))
                    .col(integer_null(Films::Runtime))
                    .col(json(Films::Genres))
                    .col(string_null(Films::Director))
                    .col(string_null(Films::OriginalLanguage))
                    .col(string_null(Films::PosterPath))
                    .col(string_null(Films::BackdropPath))
                    .col(integer_null(Films::TmdbId).unique_key())
                    .col(double(Films::AverageRating).default(0.0))
                    .col(integer(Films::TotalRatings).default(0))
                    .col(big_integer(Films::CreatedAt))
                    .col(big_integer(Films::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_created_at")
                    .table(Films::Table)
                    .col(Films::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_average_rating")
                    .table(Films::Table)
                    .col(Films::AverageRating)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Films::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    Name,
    Role,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Films {
    Table,
    Id,
    Title,
    Overview,
    ReleaseDate,
    Runtime,
    Genres,
    Director,
    OriginalLanguage,
    PosterPath,
    BackdropPath,
    TmdbId,
    AverageRating,
    TotalRatings,
    CreatedAt,
    UpdatedAt,
}
