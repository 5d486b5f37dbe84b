// Conversation engine: store, delivery simulator, projections and view state
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod projector;
pub mod random;
pub mod scheduler;
pub mod simulator;
pub mod source;
pub mod store;

// Re-export main types for convenience
pub use client::ChatClient;
pub use error::{ChatError, ChatResult};
pub use models::*;
