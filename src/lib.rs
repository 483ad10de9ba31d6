pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod rcon;
pub mod scheduler;
pub mod storage;
pub mod utils;
