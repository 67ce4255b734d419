pub mod analysis;
pub mod collector;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod flow;
pub mod logging;
pub mod resolve;
pub mod store;
pub mod template;
