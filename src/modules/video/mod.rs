use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(handler::generate_video))
        .route("/status/{id}", get(handler::get_status))
        .route("/feed", get(handler::get_feed))
}
