pub mod cli;
pub mod config;
pub mod draw;
pub mod error;
pub mod game;
pub mod notify;
pub mod pipeline;
pub mod predict;
pub mod reconcile;
pub mod source;
pub mod stats;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};
