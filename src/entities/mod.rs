pub mod comment;
pub mod favorite;
pub mod film;
pub mod rating;
pub mod user;
