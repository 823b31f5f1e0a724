pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod io;
pub mod manager;
pub mod message;
pub mod observer;
pub mod paths;
pub mod state;
pub mod task;
pub mod types;

pub use error::{HiveError, Result};
