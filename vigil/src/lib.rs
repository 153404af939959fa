pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod models;
pub mod processing;
pub mod scrape;
pub mod search;
pub mod services;
