// Core modules
pub mod api;
pub mod config;
pub mod content;
pub mod control_loop;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod models;
pub mod mood;
pub mod scheduler;
pub mod strategy;

// Re-export commonly used types
pub use control_loop::{ControlLoop, LoopExit, TickOutcome};
pub use error::BotError;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
