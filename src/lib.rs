pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod notify;
pub mod scheduler;
pub mod testing;
pub mod types;
