pub mod error;
pub mod handlers;
pub mod routes;
pub mod static_files;

pub use error::ApiError;
