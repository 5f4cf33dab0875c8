pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod id_generator;
pub mod lock;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
