pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod llm;
pub mod printer;
pub mod process;
pub mod role;
pub mod stats;
pub mod telemetry;
pub mod tui;
pub mod utils;
