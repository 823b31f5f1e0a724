pub mod auth;
pub mod error;
pub mod routing;
pub mod store;

pub use error::{InboxError, Result};
