pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod store;
