pub mod auth;
pub mod config;
pub mod database;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod services;
pub mod state;
