pub mod client;
pub mod handlers;
pub mod models;

pub use client::ApiClient;
