pub mod app;
pub mod billing_loop;
pub mod config;
pub mod db;
pub mod setup;
