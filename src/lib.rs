pub mod chart;
pub mod client;
pub mod color;
pub mod config;
pub mod error;
pub mod map;
pub mod render;
pub mod resolve;
pub mod server;
pub mod spatial;
pub mod store;
pub mod types;
