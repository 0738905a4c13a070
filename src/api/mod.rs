//! OpenF1 API surface: resource models and typed accessors.

pub mod client;
pub mod models;

pub use client::OpenF1Client;
pub use models::*;
