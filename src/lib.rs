pub mod app;
pub mod auth;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod processor;
pub mod routes;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub const VERSION: &str = "0.1.0";
