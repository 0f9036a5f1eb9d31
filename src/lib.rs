pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod server;
pub mod storage;
