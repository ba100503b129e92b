//! # Task Catalog
//!
//! Recurring task definitions persisted with SQLx, cron rule evaluation for
//! their due times, and a small Tokio runner that executes what is due.
pub mod config;
pub mod cron;
pub mod db;
pub mod domain;
pub mod errors;
pub mod registry;
pub mod scheduler;
pub mod service;
