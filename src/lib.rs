//! VulnFusion storage layer: entity declarations, startup schema
//! reconciliation and the SQLite-backed [`db::Database`] handle.

pub mod cli;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod schema;
