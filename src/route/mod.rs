pub mod admin;
pub mod auth;
pub mod docs;
pub mod model;
pub mod recipe;
pub mod stats;
pub mod user;
