pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod grid;
pub mod memory;
pub mod models;
pub mod routes;
pub mod schedule;
pub mod seed;
pub mod state;
pub mod store;
