//! Short code generation and the link operations built on it.

pub mod codegen;
pub mod service;

pub use codegen::{generate_code, ALPHABET};
pub use service::{ServiceError, Shortened, Shortener};
