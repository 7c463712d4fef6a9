pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod ollama;
pub mod session;
pub mod storage;
pub mod task_api;
pub mod ticket_api;
