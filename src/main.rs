mod auth;
mod catalog;
mod comments;
mod config;
mod db;
mod entities;
mod error;
mod favorites;
mod models;
mod ratings;
mod routes;
mod stats;
#[cfg(test)]
mod testutil;
mod users;

use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;

use crate::{config::Config, ratings::RatingAggregator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub ratings: RatingAggregator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reelrate=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url).await?;

    // `reelrate issue-token <user-id>` mints a bearer token for an existing user
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("issue-token") {
        let user_id: i32 = args
            .next()
            .context("usage: reelrate issue-token <user-id>")?
            .parse()
            .context("user id")?;
        let token = auth::token_for_user(&db, &config, user_id).await?;
        println!("{token}");
        return Ok(());
    }

    let ratings = RatingAggregator::new(db.clone());

    let state = Arc::new(AppState { config: config.clone(), db, ratings });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
