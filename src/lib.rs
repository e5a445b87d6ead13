pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod prompt;
pub mod resolve;
pub mod search;
pub mod util;
pub mod wait;
