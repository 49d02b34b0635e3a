//! Mpaia: assistant routing and scheduled messaging core.

pub mod assistant;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod memory;

#[cfg(test)]
mod testing;
