use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, info};

use crate::{
    db::now_sec,
    entities::{comment, favorite, film, rating},
    error::{AppError, AppResult},
    models::{FilmCounts, FilmDto, FilmPage, FilmPatch, FilmQuery, FilmWithCounts, NewFilm},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SortKey {
    AverageRating,
    TotalRatings,
    CreatedAt,
}

impl SortKey {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("averageRating") => SortKey::AverageRating,
            Some("totalRatings") => SortKey::TotalRatings,
            _ => SortKey::CreatedAt,
        }
    }

    fn column(self) -> film::Column {
        match self {
            SortKey::AverageRating => film::Column::AverageRating,
            SortKey::TotalRatings => film::Column::TotalRatings,
            SortKey::CreatedAt => film::Column::CreatedAt,
        }
    }
}

fn parse_order(s: Option<&str>) -> Order {
    match s {
        Some(o) if o.eq_ignore_ascii_case("asc") => Order::Asc,
        _ => Order::Desc,
    }
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn filter_condition(q: &FilmQuery) -> AppResult<Condition> {
    let mut cond = Condition::all();

    // sqlite LIKE is case-insensitive for ASCII
    if let Some(search) = non_blank(&q.search) {
        cond = cond.add(
            Condition::any()
                .add(film::Column::Title.contains(search))
                .add(film::Column::Overview.contains(search))
                .add(film::Column::Director.contains(search)),
        );
    }

    if let Some(genre) = non_blank(&q.genre) {
        cond = cond.add(Expr::cust_with_values(
            "EXISTS (SELECT 1 FROM json_each(films.genres) WHERE json_each.value = ?)",
            [genre],
        ));
    }

    if let Some(director) = non_blank(&q.director) {
        cond = cond.add(film::Column::Director.contains(director));
    }

    if let Some(language) = non_blank(&q.language) {
        cond = cond.add(film::Column::OriginalLanguage.eq(language));
    }

    if let Some(year) = non_blank(&q.year) {
        let year: i16 = year.parse().map_err(|_| AppError::invalid("year must be a number"))?;
        cond = cond.add(film::Column::ReleaseDate.starts_with(format!("{year:04}-")));
    }

    Ok(cond)
}

pub async fn list_films(db: &DatabaseConnection, q: &FilmQuery) -> AppResult<FilmPage> {
    let page = q.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::invalid("page must be at least 1"));
    }
    if q.limit == Some(0) {
        return Err(AppError::invalid("limit must be at least 1"));
    }

    let sort = SortKey::parse(q.sort_by.as_deref());
    let order = parse_order(q.order.as_deref());

    let select: Select<film::Entity> = film::Entity::find()
        .filter(filter_condition(q)?)
        .order_by(sort.column(), order.clone())
        .order_by(film::Column::Id, order);

    let total = select.clone().count(db).await?;

    // `page` only matters once a `limit` is given
    let (films, total_pages) = match q.limit {
        Some(limit) => {
            // sqlite binds integers as i64
            let fits = |n: u64| i64::try_from(n).is_ok();
            let offset = (page - 1)
                .checked_mul(limit)
                .filter(|o| fits(*o) && fits(limit))
                .ok_or_else(|| AppError::invalid("page out of range"))?;
            let films = select.limit(limit).offset(offset).all(db).await?;
            (films, total.div_ceil(limit))
        },
        None => (select.all(db).await?, 1),
    };

    debug!(total, page, returned = films.len(), "listed films");

    let films = with_counts(db, films).await?;
    Ok(FilmPage { count: films.len(), total, page, total_pages, films })
}

pub async fn get_film(db: &DatabaseConnection, id: i32) -> AppResult<FilmWithCounts> {
    let film = find_film(db, id).await?;
    let mut out = with_counts(db, vec![film]).await?;
    out.pop().ok_or_else(|| AppError::not_found("Film not found"))
}

pub async fn find_film(db: &DatabaseConnection, id: i32) -> AppResult<film::Model> {
    film::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Film not found"))
}

pub async fn all_films(db: &DatabaseConnection) -> AppResult<Vec<FilmWithCounts>> {
    let films = film::Entity::find()
        .order_by_desc(film::Column::CreatedAt)
        .order_by_desc(film::Column::Id)
        .all(db)
        .await?;
    with_counts(db, films).await
}

pub async fn with_counts(
    db: &DatabaseConnection,
    films: Vec<film::Model>,
) -> AppResult<Vec<FilmWithCounts>> {
    let ids: Vec<i32> = films.iter().map(|f| f.id).collect();
    let counts = counts_by_film(db, &ids).await?;
    Ok(films
        .into_iter()
        .map(|f| {
            let counts = counts.get(&f.id).copied().unwrap_or_default();
            FilmWithCounts { film: FilmDto::from(f), counts }
        })
        .collect())
}

async fn counts_by_film(
    db: &DatabaseConnection,
    ids: &[i32],
) -> AppResult<HashMap<i32, FilmCounts>> {
    let mut out: HashMap<i32, FilmCounts> = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }

    let comments: Vec<(i32, i64)> = comment::Entity::find()
        .select_only()
        .column(comment::Column::FilmId)
        .column_as(Expr::col(comment::Column::Id).count(), "n")
        .filter(comment::Column::FilmId.is_in(ids.to_vec()))
        .group_by(comment::Column::FilmId)
        .into_tuple()
        .all(db)
        .await?;
    for (id, n) in comments {
        out.entry(id).or_default().comments = n as u64;
    }

    let ratings: Vec<(i32, i64)> = rating::Entity::find()
        .select_only()
        .column(rating::Column::FilmId)
        .column_as(Expr::col(rating::Column::Id).count(), "n")
        .filter(rating::Column::FilmId.is_in(ids.to_vec()))
        .group_by(rating::Column::FilmId)
        .into_tuple()
        .all(db)
        .await?;
    for (id, n) in ratings {
        out.entry(id).or_default().ratings = n as u64;
    }

    let favorites: Vec<(i32, i64)> = favorite::Entity::find()
        .select_only()
        .column(favorite::Column::FilmId)
        .column_as(Expr::col(favorite::Column::Id).count(), "n")
        .filter(favorite::Column::FilmId.is_in(ids.to_vec()))
        .group_by(favorite::Column::FilmId)
        .into_tuple()
        .all(db)
        .await?;
    for (id, n) in favorites {
        out.entry(id).or_default().favorites = n as u64;
    }

    Ok(out)
}

pub async fn genres(db: &DatabaseConnection) -> AppResult<Vec<String>> {
    let films = film::Entity::find().all(db).await?;
    let set: BTreeSet<String> = films.iter().flat_map(|f| f.genre_list()).collect();
    Ok(set.into_iter().collect())
}

pub async fn directors(db: &DatabaseConnection) -> AppResult<Vec<String>> {
    distinct_text(db, film::Column::Director).await
}

pub async fn languages(db: &DatabaseConnection) -> AppResult<Vec<String>> {
    distinct_text(db, film::Column::OriginalLanguage).await
}

async fn distinct_text(db: &DatabaseConnection, col: film::Column) -> AppResult<Vec<String>> {
    let values: Vec<Option<String>> =
        film::Entity::find().select_only().column(col).into_tuple().all(db).await?;
    let set: BTreeSet<String> = values
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Ok(set.into_iter().collect())
}

fn normalize_date(raw: Option<String>) -> AppResult<Option<String>> {
    let Some(raw) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    // accept full timestamps too; only the calendar date is kept
    let date_part = raw.get(..10).unwrap_or(&raw);
    let date: jiff::civil::Date =
        date_part.parse().map_err(|_| AppError::invalid(format!("Invalid release date: {raw}")))?;
    Ok(Some(date.to_string()))
}

fn blank_to_none(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn genres_json(genres: Vec<String>) -> serde_json::Value {
    let genres: Vec<String> =
        genres.into_iter().map(|g| g.trim().to_string()).filter(|g| !g.is_empty()).collect();
    serde_json::Value::from(genres)
}

async fn ensure_tmdb_id_free<C: sea_orm::ConnectionTrait>(
    conn: &C,
    tmdb_id: i32,
    except: Option<i32>,
) -> AppResult<()> {
    let mut query = film::Entity::find().filter(film::Column::TmdbId.eq(tmdb_id));
    if let Some(id) = except {
        query = query.filter(film::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(AppError::conflict("Film with this TMDB ID already exists"));
    }
    Ok(())
}

pub async fn create_film(db: &DatabaseConnection, req: NewFilm) -> AppResult<FilmWithCounts> {
    let title = blank_to_none(req.title).ok_or_else(|| AppError::invalid("Title is required"))?;
    let release_date = normalize_date(req.release_date)?;

    let txn = db.begin().await?;
    if let Some(tmdb_id) = req.tmdb_id {
        ensure_tmdb_id_free(&txn, tmdb_id, None).await?;
    }

    let now = now_sec();
    let film = film::ActiveModel {
        id: Default::default(),
        title: Set(title),
        overview: Set(blank_to_none(req.overview)),
        release_date: Set(release_date),
        runtime: Set(req.runtime),
        genres: Set(genres_json(req.genres.unwrap_or_default())),
        director: Set(blank_to_none(req.director)),
        original_language: Set(blank_to_none(req.original_language)),
        poster_path: Set(blank_to_none(req.poster_path)),
        backdrop_path: Set(blank_to_none(req.backdrop_path)),
        tmdb_id: Set(req.tmdb_id),
        average_rating: Set(0.0),
        total_ratings: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(film_id = film.id, title = %film.title, "film created");
    Ok(FilmWithCounts { film: film.into(), counts: FilmCounts::default() })
}

/// Applies metadata edits. The rating aggregate is never writable from here.
pub async fn update_film(
    db: &DatabaseConnection,
    id: i32,
    patch: FilmPatch,
) -> AppResult<FilmWithCounts> {
    let txn = db.begin().await?;
    let existing = film::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Film not found"))?;

    let mut model: film::ActiveModel = existing.into();

    if let Some(title) = patch.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::invalid("Title cannot be empty"));
        }
        model.title = Set(title);
    }
    if let Some(overview) = patch.overview {
        model.overview = Set(blank_to_none(overview));
    }
    if let Some(date) = patch.release_date {
        model.release_date = Set(normalize_date(date)?);
    }
    if let Some(runtime) = patch.runtime {
        model.runtime = Set(runtime);
    }
    if let Some(genres) = patch.genres {
        model.genres = Set(genres_json(genres.unwrap_or_default()));
    }
    if let Some(director) = patch.director {
        model.director = Set(blank_to_none(director));
    }
    if let Some(lang) = patch.original_language {
        model.original_language = Set(blank_to_none(lang));
    }
    if let Some(poster) = patch.poster_path {
        model.poster_path = Set(blank_to_none(poster));
    }
    if let Some(backdrop) = patch.backdrop_path {
        model.backdrop_path = Set(blank_to_none(backdrop));
    }
    if let Some(tmdb_id) = patch.tmdb_id {
        if let Some(tmdb_id) = tmdb_id {
            ensure_tmdb_id_free(&txn, tmdb_id, Some(id)).await?;
        }
        model.tmdb_id = Set(tmdb_id);
    }
    model.updated_at = Set(now_sec());

    model.update(&txn).await?;
    txn.commit().await?;

    info!(film_id = id, "film updated");
    get_film(db, id).await
}

pub async fn delete_film(db: &DatabaseConnection, id: i32) -> AppResult<()> {
    let txn = db.begin().await?;
    film::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Film not found"))?;

    rating::Entity::delete_many().filter(rating::Column::FilmId.eq(id)).exec(&txn).await?;
    comment::Entity::delete_many().filter(comment::Column::FilmId.eq(id)).exec(&txn).await?;
    favorite::Entity::delete_many().filter(favorite::Column::FilmId.eq(id)).exec(&txn).await?;
    film::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!(film_id = id, "film deleted");
    Ok(())
}
