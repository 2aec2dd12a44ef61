use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    AppState,
    auth::issue_token,
    config::Config,
    db::{self, now_sec},
    entities::{film, user},
    models::Role,
    ratings::RatingAggregator,
};

pub const SECRET: &str = "test-secret";

pub async fn test_db() -> DatabaseConnection {
    db::connect_and_migrate("sqlite::memory:").await.expect("in-memory database")
}

pub fn test_config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        token_secret: SECRET.to_string(),
        token_ttl_hours: 1,
    }
}

pub async fn seed_user(db: &DatabaseConnection, email: &str, role: &str) -> user::Model {
    let now = now_sec();
    user::ActiveModel {
        id: Default::default(),
        email: Set(email.to_string()),
        name: Set(Some(email.split('@').next().unwrap_or(email).to_string())),
        role: Set(role.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed user")
}

pub async fn seed_film(db: &DatabaseConnection, title: &str) -> film::Model {
    let now = now_sec();
    film::ActiveModel {
        id: Default::default(),
        title: Set(title.to_string()),
        overview: Set(None),
        release_date: Set(None),
        runtime: Set(None),
        genres: Set(serde_json::json!([])),
        director: Set(None),
        original_language: Set(None),
        poster_path: Set(None),
        backdrop_path: Set(None),
        tmdb_id: Set(None),
        average_rating: Set(0.0),
        total_ratings: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed film")
}

pub struct TestUser {
    pub model: user::Model,
    pub token: String,
}

pub struct TestApp {
    pub db: DatabaseConnection,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = test_db().await;
        let state = Arc::new(AppState {
            config: Arc::new(test_config()),
            db: db.clone(),
            ratings: RatingAggregator::new(db.clone()),
        });
        Self { db, router: crate::routes::router(state) }
    }

    pub async fn user(&self, email: &str, role: &str) -> TestUser {
        let model = seed_user(&self.db, email, role).await;
        let token = issue_token(SECRET, model.id, Role::from_db(role), 1).unwrap();
        TestUser { model, token }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
