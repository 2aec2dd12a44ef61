pub use sea_orm_migration::prelude::*;

mod m20250201_000001_create_users_and_films;
mod m20250201_000002_create_ratings;
mod m20250203_000001_create_comments_and_favorites;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250201_000001_create_users_and_films::Migration),
            Box::new(m20250201_000002_create_ratings::Migration),
            Box::new(m20250203_000001_create_comments_and_favorites::Migration),
        ]
    }
}
