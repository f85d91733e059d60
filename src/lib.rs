pub mod analytics;
pub mod api;
pub mod app;
pub mod config;
pub mod cursor;
pub mod models;
pub mod redirect;
pub mod shortener;
pub mod state;
pub mod storage;
