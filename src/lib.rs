//! Competitive hotel-rate intelligence
//!
//! This library provides the core of rate-scout: the search job state
//! machine, progress tracking, scraped price ingestion with bundle handling,
//! price change history, trend analytics and cross-environment replication.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
